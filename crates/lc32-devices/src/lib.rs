//! MMIO peripherals living above a machine's `io_space_min`: the DMA block
//! copier, the wall clock, the RNG read port, the guest filesystem bridge,
//! and the scanline/keypad registers the scanline scheduler drives directly.
//!
//! Grounded on `original_source/src/iodevice.hpp`'s per-device MMIO address
//! constants (`REG_VCOUNT_ADDR`, `REG_KEYINPUT_ADDR`, `DMA_CONTROLLER_ADDR`,
//! `VIDEO_BUFFER_ADDR`). The ranges the distilled spec lists for the DMA
//! block and the clock block overlap byte-for-byte (DMA `destination`/
//! `control` land on the same words as clock `status`/`millis`); this is
//! resolved as an open question by laying the five device register blocks
//! out back-to-back in the order the source lists them, starting the clock
//! immediately after DMA's three words instead of two words into them (see
//! `DESIGN.md`).

pub mod clock;
pub mod dma;
pub mod filesystem;
pub mod input;
pub mod rng;

/// Current scanline, read-only (u16).
pub const REG_VCOUNT_ADDR: u32 = 0xF000_0000;
/// Inverted button bitmask, read-only (u16). Bit clear means pressed.
pub const REG_KEYINPUT_ADDR: u32 = 0xF000_0002;

/// DMA source/destination/control, three consecutive u32 words.
pub const DMA_SOURCE_ADDR: u32 = 0xF000_000C;
pub const DMA_DEST_ADDR: u32 = 0xF000_0010;
pub const DMA_CONTROL_ADDR: u32 = 0xF000_0014;

/// Clock status/millis/seconds, three consecutive u32 words immediately
/// following the DMA block.
pub const CLOCK_STATUS_ADDR: u32 = 0xF000_0018;
pub const CLOCK_MILLIS_ADDR: u32 = 0xF000_001C;
pub const CLOCK_SECONDS_ADDR: u32 = 0xF000_0020;

/// RNG read port, immediately following the clock block.
pub const RNG_ADDR: u32 = 0xF000_0024;

/// Filesystem controller: mode/fd word followed by data1/data2/data3.
pub const FS_CONTROLLER_ADDR: u32 = 0xF000_0028;

/// Base of the guest video buffer (`width * height` BGR555 u16 pixels).
pub const VIDEO_BUFFER_ADDR: u32 = 0xFC00_0000;

/// Button order backing [`REG_KEYINPUT_ADDR`]'s bitmask, low bit first —
/// matches `spec.md` §6's ten named keybinds.
pub const BUTTON_ORDER: [&str; 10] =
    ["a", "b", "select", "start", "right", "left", "up", "down", "r", "l"];

/// Pack a set of currently-pressed buttons into the inverted `KEYINPUT`
/// bitmask (bit clear means pressed, matching a real keypad register).
#[must_use]
pub fn pack_keyinput(pressed: &[bool; 10]) -> u16 {
    let mut mask = 0xFFFFu16;
    for (i, &is_pressed) in pressed.iter().enumerate() {
        if is_pressed {
            mask &= !(1 << i);
        }
    }
    mask
}

/// Register every fixed-address MMIO peripheral (DMA, clock, RNG,
/// filesystem bridge) onto `memory`. `VCOUNT`/`KEYINPUT` are not hooks here:
/// the scanline scheduler writes/reads them as plain words each tick.
pub fn install_all(
    memory: &mut lc32_memory::Memory,
    rng_seed: u32,
    logger: lc32_core::Logger,
) -> lc32_core::SimResult<()> {
    dma::install(memory, DMA_SOURCE_ADDR, DMA_DEST_ADDR, DMA_CONTROL_ADDR)?;
    clock::install(memory, CLOCK_STATUS_ADDR, CLOCK_MILLIS_ADDR, CLOCK_SECONDS_ADDR)?;
    rng::install(memory, RNG_ADDR, rng_seed)?;
    filesystem::install(memory, FS_CONTROLLER_ADDR, logger)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyinput_clears_bit_for_pressed_button() {
        let mut pressed = [false; 10];
        pressed[0] = true; // "a"
        pressed[7] = true; // "down"
        let mask = pack_keyinput(&pressed);
        assert_eq!(mask & 1, 0);
        assert_eq!(mask & (1 << 7), 0);
        assert_eq!(mask & (1 << 1), 1 << 1);
    }

    #[test]
    fn keyinput_all_released_is_all_ones() {
        assert_eq!(pack_keyinput(&[false; 10]), 0xFFFF);
    }

    #[test]
    fn device_register_blocks_do_not_overlap() {
        let addrs = [
            REG_VCOUNT_ADDR,
            REG_KEYINPUT_ADDR,
            DMA_SOURCE_ADDR,
            DMA_DEST_ADDR,
            DMA_CONTROL_ADDR,
            CLOCK_STATUS_ADDR,
            CLOCK_MILLIS_ADDR,
            CLOCK_SECONDS_ADDR,
            RNG_ADDR,
            FS_CONTROLLER_ADDR,
        ];
        for i in 0..addrs.len() {
            for j in (i + 1)..addrs.len() {
                assert_ne!(addrs[i], addrs[j], "address collision at index {i}/{j}");
            }
        }
    }

    #[test]
    fn install_all_wires_every_device() {
        use lc32_memory::{Memory, MemoryConfig};
        let config = MemoryConfig {
            size: 0x1_0000_0000,
            page_size: 4096,
            user_space_min: 0,
            user_space_max: u32::MAX,
            io_space_min: 0xF000_0000,
        };
        let mut mem = Memory::new(config, 1);
        install_all(&mut mem, 7, lc32_core::Logger::default()).unwrap();

        let a: u32 = mem.read(RNG_ADDR).unwrap();
        let b: u32 = mem.read(RNG_ADDR).unwrap();
        assert_ne!(a, b, "RNG hook not wired");

        mem.write::<u32>(CLOCK_STATUS_ADDR, 0).unwrap();
        assert!(mem.read::<u32>(CLOCK_SECONDS_ADDR).unwrap() > 0, "clock hook not wired");
    }
}
