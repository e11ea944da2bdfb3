//! Top-level machine assembly and the scanline scheduler.
//!
//! Grounded on `emu_nes::Nes`: one struct owning the CPU, the bus (here,
//! `Memory` plus the devices wired onto it), and a `run_frame`-shaped entry
//! point the binary crate drives. `spec.md` §4.7 describes the scheduler;
//! `spec.md` §5 assigns it to the single main/executor thread that also owns
//! `Memory`.

use lc32_core::{Lcg, Observable, SimResult, Value};
use lc32_cpu::{InputSource, Registers, Simulator, StepOutcome};
use lc32_devices::{self, pack_keyinput};
use lc32_elf::ElfImage;
use lc32_memory::Memory;

use crate::config::Config;

/// Sink for the per-scanline raster output and the per-frame input poll.
/// Kept narrow — "upload scanline of pixels", "present frame", "poll input"
/// — exactly the three operations `spec.md` §1 assigns to the out-of-scope
/// rendering backend, so `lc32-machine` never depends on `winit`/`pixels`.
pub trait DisplaySink {
    /// Upload one scanline's worth of `BGR555` pixels. Returns `false` if
    /// the window has been closed and the run should end.
    fn update_scanline(&mut self, line: u32, pixels: &[u16]) -> bool;

    /// Present the accumulated frame. Called once per frame, after every
    /// in-range scanline has been uploaded.
    fn present(&mut self);

    /// Poll which of the ten keypad buttons are currently held, in
    /// `lc32_devices::BUTTON_ORDER` order.
    fn poll_input(&mut self) -> [bool; 10];
}

/// Outcome of driving one frame (or, in headless mode, the whole program).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Halted,
    WindowClosed,
}

/// The assembled LC-3.2 system: memory, CPU, and the MMIO devices wired
/// onto it, plus the scanline timing parameters from `Config`.
pub struct Machine {
    memory: Memory,
    cpu: Simulator,
    width: u32,
    height: u32,
    vblank_length: u32,
    instructions_per_scanline: u32,
}

impl Machine {
    /// Build a machine from a parsed ELF image and configuration.
    ///
    /// Seeding order mirrors `original_source/src/sim.cpp`'s constructor:
    /// registers are drawn from the top-level seed first, then memory's
    /// sub-seed, then the RNG device's sub-seed — `srand(seed); regs[] =
    /// rand(); mem.set_seed(rand());` rendered as three draws from one
    /// `Lcg` instead of three calls into global `rand()` state.
    pub fn new(
        elf: &ElfImage,
        config: &Config,
        seed: u32,
        input: Box<dyn InputSource + Send>,
        logger: lc32_core::Logger,
    ) -> SimResult<Self> {
        let mut lcg = Lcg::new(seed);
        let registers = Registers::new(&mut lcg, elf.entry);

        let mem_seed = lcg.next_u32();
        let mut memory = Memory::new(config.memory.to_memory_config(), mem_seed);

        for seg in &elf.segments {
            memory.load_segment(seg.vaddr, seg.file_offset, seg.file_size, seg.mem_size, &mut |off, buf| {
                elf.read_chunk(off, buf)
            })?;
        }

        let rng_seed = lcg.next_u32();
        lc32_devices::install_all(&mut memory, rng_seed, logger)?;

        let cpu = Simulator::new(registers, input, logger);

        Ok(Self {
            memory,
            cpu,
            width: config.display.width,
            height: config.display.height,
            vblank_length: config.display.vblank_length,
            instructions_per_scanline: config.display.instructions_per_scanline,
        })
    }

    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.cpu.registers
    }

    /// Run one frame against `display`: per scanline, write `VCOUNT`,
    /// sample input into `KEYINPUT`, execute the scanline's instruction
    /// quantum, then (for on-screen lines) upload the scanline to the sink.
    pub fn run_frame(&mut self, display: &mut dyn DisplaySink) -> SimResult<FrameOutcome> {
        let total_lines = self.height + self.vblank_length;
        for line in 0..total_lines {
            self.memory.write::<u16>(lc32_devices::REG_VCOUNT_ADDR, line as u16)?;

            let pressed = display.poll_input();
            self.memory
                .write::<u16>(lc32_devices::REG_KEYINPUT_ADDR, pack_keyinput(&pressed))?;

            if self.run_quantum()? == StepOutcome::Halted {
                return Ok(FrameOutcome::Halted);
            }

            if line < self.height {
                let pixels = self.read_scanline(line);
                if !display.update_scanline(line, &pixels) {
                    return Ok(FrameOutcome::WindowClosed);
                }
            }
        }
        display.present();
        Ok(FrameOutcome::Continue)
    }

    /// Run to completion with no display backend: no `VCOUNT` write, no
    /// scanline callback (`spec.md` §4.7: "headless mode skips the display
    /// callback and vcount write and runs steps until halt").
    pub fn run_headless(&mut self) -> SimResult<()> {
        loop {
            if self.cpu.step(&mut self.memory)? == StepOutcome::Halted {
                return Ok(());
            }
        }
    }

    fn run_quantum(&mut self) -> SimResult<StepOutcome> {
        for _ in 0..self.instructions_per_scanline {
            match self.cpu.step(&mut self.memory)? {
                StepOutcome::Continued => {}
                StepOutcome::Halted => return Ok(StepOutcome::Halted),
            }
        }
        Ok(StepOutcome::Continued)
    }

    fn read_scanline(&self, line: u32) -> Vec<u16> {
        let row_addr = lc32_devices::VIDEO_BUFFER_ADDR + line * self.width * 2;
        let bytes = self.memory.raw_slice(row_addr, self.width as usize * 2);
        bytes.chunks_exact(2).map(|p| u16::from_le_bytes([p[0], p[1]])).collect()
    }
}

impl Observable for Machine {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            self.registers().query(rest)
        } else if let Some(rest) = path.strip_prefix("memory.") {
            let addr = rest
                .strip_prefix("0x")
                .or_else(|| rest.strip_prefix("0X"))
                .map_or_else(|| rest.parse().ok(), |hex| u32::from_str_radix(hex, 16).ok());
            addr.map(|a| Value::U8(self.memory.raw_slice(a, 1)[0]))
        } else {
            match path {
                "halted" => Some(self.is_halted().into()),
                _ => self.registers().query(path),
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &["cpu.<register_paths>", "memory.<address>", "halted"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc32_core::Logger;

    struct NullInput;
    impl InputSource for NullInput {
        fn poll(&mut self) -> SimResult<u8> {
            Ok(b'x')
        }
    }

    struct HeadlessSink;
    impl DisplaySink for HeadlessSink {
        fn update_scanline(&mut self, _line: u32, _pixels: &[u16]) -> bool {
            true
        }
        fn present(&mut self) {}
        fn poll_input(&mut self) -> [bool; 10] {
            [false; 10]
        }
    }

    fn halt_elf() -> Vec<u8> {
        // One PT_LOAD segment at 0x3000 containing `TRAP 0x25` (HALT).
        let entry = 0x3000_u32;
        let phoff = 52_u32;
        let mut data = vec![0u8; 52];
        data[0..4].copy_from_slice(&[0x7f, b'E', b'L', b'F']);
        data[4] = 1; // ELFCLASS32
        data[5] = 1; // ELFDATA2LSB
        data[6] = 1; // EV_CURRENT
        data[16..18].copy_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        data[24..28].copy_from_slice(&entry.to_le_bytes());
        data[28..32].copy_from_slice(&phoff.to_le_bytes());
        data[42..44].copy_from_slice(&32u16.to_le_bytes());
        data[44..46].copy_from_slice(&1u16.to_le_bytes());

        let file_offset = phoff + 32;
        let mut ph = vec![0u8; 32];
        ph[0..4].copy_from_slice(&1u32.to_le_bytes()); // PT_LOAD
        ph[4..8].copy_from_slice(&file_offset.to_le_bytes());
        ph[8..12].copy_from_slice(&entry.to_le_bytes());
        ph[16..20].copy_from_slice(&2u32.to_le_bytes());
        ph[20..24].copy_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&ph);
        data.extend_from_slice(&0b1111_0000_0010_0101u16.to_le_bytes());
        data
    }

    fn test_config() -> Config {
        // Memory keeps the full default 4 GiB address space: the fixed
        // device and video-buffer addresses (`lc32_devices`) live near the
        // top of the 32-bit range, so a machine can't shrink its backing
        // store without also relocating those constants.
        let mut config = Config::default();
        config.display.width = 4;
        config.display.height = 2;
        config.display.vblank_length = 1;
        config.display.instructions_per_scanline = 4;
        config
    }

    #[test]
    fn run_headless_halts_on_trap() {
        let elf = ElfImage::parse(halt_elf()).unwrap();
        let config = test_config();
        let mut machine =
            Machine::new(&elf, &config, 42, Box::new(NullInput), Logger::default()).unwrap();
        machine.run_headless().unwrap();
        assert!(machine.is_halted());
    }

    #[test]
    fn run_frame_reports_halted() {
        let elf = ElfImage::parse(halt_elf()).unwrap();
        let config = test_config();
        let mut machine =
            Machine::new(&elf, &config, 42, Box::new(NullInput), Logger::default()).unwrap();
        let mut sink = HeadlessSink;
        assert_eq!(machine.run_frame(&mut sink).unwrap(), FrameOutcome::Halted);
    }

    #[test]
    fn observable_halted_flag() {
        let elf = ElfImage::parse(halt_elf()).unwrap();
        let config = test_config();
        let machine =
            Machine::new(&elf, &config, 42, Box::new(NullInput), Logger::default()).unwrap();
        assert_eq!(machine.query("halted"), Some(Value::Bool(false)));
    }
}
