//! Machine assembly: wires `lc32-memory`, `lc32-cpu`, and `lc32-devices`
//! together behind one `Machine` type, plus the JSON `Config` that drives it
//! and the scanline scheduler described in `spec.md` §4.7.
//!
//! Grounded on `emu_nes::{nes, bus, config}`: a machine crate that owns
//! assembly and timing, leaving CPU core semantics and device MMIO logic to
//! their own crates.

pub mod config;
mod machine;

pub use config::Config;
pub use machine::{DisplaySink, FrameOutcome, Machine};
