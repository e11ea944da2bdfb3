//! Wall-clock device.
//!
//! `spec.md` §6 fixes one MMIO wire format out of the several incompatible
//! ones in `original_source/src/clock.hpp` (a single `REG_CURRTIME_ADDR`
//! returning `time(NULL)` plus an always-zero high-res stub): a `status`
//! word whose write triggers a sample, and separate `millis`/`seconds`
//! registers holding the sampled value until the next trigger. All three
//! hooks close over the same `Rc<Cell<_>>` pair; this is safe because
//! `spec.md` §5 guarantees MMIO hooks only ever run on the main thread.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use lc32_core::SimResult;
use lc32_memory::Memory;

/// Register the clock's three MMIO words.
///
/// `status_addr` is write-triggered (any write samples the wall clock and
/// resets status to 0); `millis_addr`/`seconds_addr` are read-only and
/// return the most recent sample (both start at zero, before any sample).
pub fn install(
    memory: &mut Memory,
    status_addr: u32,
    millis_addr: u32,
    seconds_addr: u32,
) -> SimResult<()> {
    let millis = Rc::new(Cell::new(0u32));
    let seconds = Rc::new(Cell::new(0u32));

    let (w_millis, w_seconds) = (Rc::clone(&millis), Rc::clone(&seconds));
    memory.add_write_hook(
        status_addr,
        Box::new(move |_mem, _addr, _old, _new| {
            let (s, m) = sample();
            w_seconds.set(s);
            w_millis.set(m);
            Ok(0)
        }),
    )?;

    let r_millis = Rc::clone(&millis);
    memory.add_read_hook(millis_addr, Box::new(move |_mem, _addr| Ok(r_millis.get())))?;

    let r_seconds = Rc::clone(&seconds);
    memory.add_read_hook(seconds_addr, Box::new(move |_mem, _addr| Ok(r_seconds.get())))?;

    Ok(())
}

/// Sample the wall clock as `(seconds_since_epoch, millis_within_second)`.
fn sample() -> (u32, u32) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_secs() as u32, now.subsec_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc32_memory::MemoryConfig;

    fn clock_memory() -> Memory {
        let config = MemoryConfig {
            size: 0x10000,
            page_size: 256,
            user_space_min: 0,
            user_space_max: 0xFFFF,
            io_space_min: 0xF000,
        };
        Memory::new(config, 1)
    }

    #[test]
    fn sample_populates_seconds_and_millis() {
        let mut mem = clock_memory();
        install(&mut mem, 0xF010, 0xF014, 0xF018).unwrap();
        assert_eq!(mem.read::<u32>(0xF014).unwrap(), 0);
        assert_eq!(mem.read::<u32>(0xF018).unwrap(), 0);

        mem.write::<u32>(0xF010, 0).unwrap();
        assert!(mem.read::<u32>(0xF018).unwrap() > 0);
    }
}
