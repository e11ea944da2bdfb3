//! DMA controller.
//!
//! Grounded on `original_source/src/dma_controller.hpp`'s `handle_dma`: a
//! write-hook fires on the control word, and a rising `ON` bit drives one
//! programmed block copy using `Memory`'s unchecked accessors so the
//! transfer never re-enters the MMIO write-hook table it's itself firing
//! from.

use lc32_core::{SimError, SimResult};
use lc32_memory::Memory;

const DMA_ON: u32 = 1 << 31;
const DMA_IRQ: u32 = 1 << 30;
const DMA_TIMING_MASK: u32 = 0x3 << 28;
const DMA_REPEAT_UNUSED: u32 = 1 << 25;
const DMA_WIDTH: u32 = 1 << 26;
const DMA_DST_MODE_SHIFT: u32 = 21;
const DMA_SRC_MODE_SHIFT: u32 = 23;
const DMA_NUM_TRANSFERS_MASK: u32 = 0xFFFF;

/// Register the DMA controller's write hook at the control word.
///
/// `source_addr`/`dest_addr`/`control_addr` must be the three consecutive
/// 4-byte-aligned words `spec.md` §3 describes.
pub fn install(memory: &mut Memory, source_addr: u32, dest_addr: u32, control_addr: u32) -> SimResult<()> {
    memory.add_write_hook(
        control_addr,
        Box::new(move |mem, _addr, _old, new| {
            if new & DMA_ON == 0 {
                return Ok(new);
            }
            let source = mem.read_unchecked::<u32>(source_addr);
            let dest = mem.read_unchecked::<u32>(dest_addr);
            run(mem, source, dest, new)?;
            mem.write_unchecked::<u32>(source_addr, 0);
            mem.write_unchecked::<u32>(dest_addr, 0);
            Ok(0)
        }),
    )
}

fn run(mem: &mut Memory, source: u32, dest: u32, control: u32) -> SimResult<()> {
    if control & DMA_TIMING_MASK != 0 {
        return Err(SimError::DmaTimingUnsupported);
    }
    if control & DMA_IRQ != 0 {
        return Err(SimError::DmaIrqUnsupported);
    }
    let _ = DMA_REPEAT_UNUSED; // repeat only matters for unsupported deferred timings

    let width: u32 = if control & DMA_WIDTH != 0 { 4 } else { 2 };
    let num_transfers = control & DMA_NUM_TRANSFERS_MASK;
    let total_bytes = num_transfers.saturating_mul(width);

    let mut dst_mode = (control >> DMA_DST_MODE_SHIFT) & 0x3;
    if dst_mode == 3 {
        dst_mode = 0; // "reset" only differs under deferred timings, which we reject above
    }
    let src_mode = (control >> DMA_SRC_MODE_SHIFT) & 0x3;

    let src_step = step_for_mode(src_mode)?;
    let dst_step = step_for_mode(dst_mode)?;

    check_bounds(mem, source, src_step, total_bytes)?;
    check_bounds(mem, dest, dst_step, total_bytes)?;

    prefault(mem, source, src_step, total_bytes);
    prefault(mem, dest, dst_step, total_bytes);

    let (mut s, mut d) = (source, dest);
    for _ in 0..num_transfers {
        if width == 4 {
            let word: u32 = mem.read_unchecked(s);
            mem.write_unchecked(d, word);
        } else {
            let half: u16 = mem.read_unchecked(s);
            mem.write_unchecked(d, half);
        }
        s = s.wrapping_add((src_step * width as i32) as u32);
        d = d.wrapping_add((dst_step * width as i32) as u32);
    }
    Ok(())
}

/// Returns the per-unit step direction: `1` (increment), `-1` (decrement),
/// or `0` (fixed).
fn step_for_mode(mode: u32) -> SimResult<i32> {
    match mode {
        0 => Ok(1),
        1 => Ok(-1),
        2 => Ok(0),
        _ => Err(SimError::DmaInvalidMode),
    }
}

fn check_bounds(mem: &Memory, addr: u32, step: i32, total_bytes: u32) -> SimResult<()> {
    if u64::from(addr) >= mem.len() {
        return Err(SimError::DmaBounds);
    }
    match step.cmp(&0) {
        std::cmp::Ordering::Greater => {
            if mem.len() - u64::from(addr) < u64::from(total_bytes) {
                return Err(SimError::DmaBounds);
            }
        }
        std::cmp::Ordering::Less => {
            if u64::from(addr) < u64::from(total_bytes) {
                return Err(SimError::DmaBounds);
            }
        }
        std::cmp::Ordering::Equal => {}
    }
    Ok(())
}

fn prefault(mem: &mut Memory, addr: u32, step: i32, total_bytes: u32) {
    let page_size = mem.config().page_size;
    match step.cmp(&0) {
        std::cmp::Ordering::Greater => {
            let start_page = addr / page_size;
            let end_page = addr.saturating_add(total_bytes) / page_size;
            for page in start_page..=end_page {
                mem.ensure_page_initialized(page * page_size);
            }
        }
        std::cmp::Ordering::Less => {
            let start_page = addr / page_size;
            let end_page = addr.saturating_sub(total_bytes) / page_size;
            let mut page = start_page;
            loop {
                mem.ensure_page_initialized(page * page_size);
                if page == end_page {
                    break;
                }
                page -= 1;
            }
        }
        std::cmp::Ordering::Equal => {
            mem.ensure_page_initialized((addr / page_size) * page_size);
        }
    }
}
