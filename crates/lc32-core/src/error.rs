//! Simulator error type.
//!
//! Mirrors the `SimulatorException` hierarchy in the original C++
//! implementation (`exceptions.hpp`), but as a flat enum rather than a
//! class hierarchy — every failure kind in one place, matched exhaustively
//! at the call site that needs to react to it (the scanline scheduler).

use std::fmt;

/// Every way the simulator can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// A `u16`/`u32` access was not aligned to its own size.
    UnalignedAccess { addr: u32, alignment: u32 },
    /// An access fell outside `[user_min, user_max]`.
    Segfault { addr: u32 },
    /// A second hook was registered at an address that already had one.
    DuplicateHook { addr: u32 },
    /// The top 4 bits of an instruction word did not decode to a known kind.
    UnknownOpcode { bits: u16 },
    /// `RTI` was executed; interrupts are not implemented.
    UnimplementedInstruction { mnemonic: &'static str },
    /// `step()` was called after `HALT`.
    Halted,
    /// `TRAP` with a vector outside the known set.
    UnknownTrap { vector: u8 },
    /// The `CRASH` trap vector was executed.
    CrashTrap,
    /// DMA was armed with a timing mode other than `NOW`.
    DmaTimingUnsupported,
    /// DMA was armed with the IRQ bit set.
    DmaIrqUnsupported,
    /// DMA source or destination mode bits did not decode.
    DmaInvalidMode,
    /// DMA increment/decrement would run off either end of memory.
    DmaBounds,
    /// The ELF file failed a header/magic/class/version/type check.
    ElfInvalid { reason: String },
    /// A program header index was out of range.
    ElfRange { index: u16, phnum: u16 },
    /// The terminal could not be put into (or restored from) raw mode.
    TerminalConfig { reason: String },
    /// The display backend failed to initialize.
    DisplayInit { reason: String },
    /// The input queue's producer thread has exited and no more input will
    /// ever arrive.
    InputClosed,
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnalignedAccess { addr, alignment } => {
                write!(f, "address {addr:#010x} is not {alignment}-byte aligned")
            }
            Self::Segfault { addr } => write!(f, "segmentation fault at {addr:#010x}"),
            Self::DuplicateHook { addr } => {
                write!(f, "an MMIO hook is already registered at {addr:#010x}")
            }
            Self::UnknownOpcode { bits } => {
                write!(f, "unknown opcode in instruction word {bits:#06x}")
            }
            Self::UnimplementedInstruction { mnemonic } => {
                write!(f, "{mnemonic}: unimplemented instruction")
            }
            Self::Halted => write!(f, "step() called on a halted simulator"),
            Self::UnknownTrap { vector } => write!(f, "unknown TRAP vector {vector:#04x}"),
            Self::CrashTrap => write!(f, "encountered CRASH trap"),
            Self::DmaTimingUnsupported => write!(f, "DMA timing modes other than NOW are not supported"),
            Self::DmaIrqUnsupported => write!(f, "DMA IRQ completion is not supported"),
            Self::DmaInvalidMode => write!(f, "DMA source/destination mode bits are invalid"),
            Self::DmaBounds => write!(f, "DMA transfer would run past the end of memory"),
            Self::ElfInvalid { reason } => write!(f, "invalid ELF file: {reason}"),
            Self::ElfRange { index, phnum } => {
                write!(f, "program header index {index} out of range (phnum = {phnum})")
            }
            Self::TerminalConfig { reason } => write!(f, "terminal configuration failed: {reason}"),
            Self::DisplayInit { reason } => write!(f, "display initialization failed: {reason}"),
            Self::InputClosed => write!(f, "input stream closed; no more characters will arrive"),
        }
    }
}

impl std::error::Error for SimError {}

pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_address_in_hex() {
        let err = SimError::Segfault { addr: 0xDEAD_0000 };
        assert_eq!(err.to_string(), "segmentation fault at 0xdead0000");
    }

    #[test]
    fn is_std_error() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        assert_error(&SimError::Halted);
    }
}
