//! The LC-3.2 register file.
//!
//! Eight general-purpose words, the program counter, and the 3-bit `NZP`
//! condition code. Construction seeds every register and the CC from the
//! shared LCG (`spec.md` §3: "registers and CC are seeded from a
//! deterministic PRNG to force programs to initialize their state") rather
//! than zeroing them, which would let a guest program that forgets to
//! initialize a register pass by accident.

use lc32_core::{Lcg, Observable, Value};

const QUERY_PATHS: [&str; 10] = ["r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7", "pc", "cc"];

/// Condition-code bit for "negative" (bit 2).
pub const CC_N: u8 = 0b100;
/// Condition-code bit for "zero" (bit 1).
pub const CC_Z: u8 = 0b010;
/// Condition-code bit for "positive" (bit 0).
pub const CC_P: u8 = 0b001;

/// The LC-3.2 register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub r: [u32; 8],
    pub pc: u32,
    /// Exactly one of [`CC_N`], [`CC_Z`], [`CC_P`] is ever set.
    pub cc: u8,
}

impl Registers {
    /// Build a register file with every general-purpose register and the
    /// CC seeded from `lcg`, and `pc` set to the ELF entry point.
    #[must_use]
    pub fn new(lcg: &mut Lcg, entry: u32) -> Self {
        let mut r = [0u32; 8];
        for slot in &mut r {
            *slot = lcg.next_u32();
        }
        let cc = match lcg.next_u32() % 3 {
            0 => CC_N,
            1 => CC_Z,
            _ => CC_P,
        };
        Self { r, pc: entry, cc }
    }

    /// Update the condition code from a 32-bit destination value: negative
    /// if bit 31 is set, zero if the value is zero, else positive.
    pub fn set_cc(&mut self, value: u32) {
        self.cc = if value & 0x8000_0000 != 0 {
            CC_N
        } else if value == 0 {
            CC_Z
        } else {
            CC_P
        };
    }
}

impl Observable for Registers {
    fn query(&self, path: &str) -> Option<Value> {
        match path {
            "r0" => Some(self.r[0].into()),
            "r1" => Some(self.r[1].into()),
            "r2" => Some(self.r[2].into()),
            "r3" => Some(self.r[3].into()),
            "r4" => Some(self.r[4].into()),
            "r5" => Some(self.r[5].into()),
            "r6" => Some(self.r[6].into()),
            "r7" => Some(self.r[7].into()),
            "pc" => Some(self.pc.into()),
            "cc" => Some(Value::String(format!(
                "{}{}{}",
                if self.cc & CC_N != 0 { "N" } else { "-" },
                if self.cc & CC_Z != 0 { "Z" } else { "-" },
                if self.cc & CC_P != 0 { "P" } else { "-" },
            ))),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &QUERY_PATHS
    }
}
