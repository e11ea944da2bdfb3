//! RNG read port.
//!
//! Grounded on `original_source/src/rng.hpp`'s `RNG` device, which serves
//! `std::random_device` output from a single read-only address. The portable
//! rendition serves words from `lc32_core::Lcg` instead of a host entropy
//! source — nothing downstream needs cryptographic randomness, and a guest
//! program reading this port is already outside what `spec.md` treats as
//! deterministic (the page-init and register-seed LCGs are the ones tests
//! depend on being reproducible).

use lc32_core::Lcg;
use lc32_memory::Memory;

/// Register the RNG read hook at `addr`, seeded from `seed`.
pub fn install(memory: &mut Memory, addr: u32, seed: u32) -> lc32_core::SimResult<()> {
    let mut lcg = Lcg::new(seed);
    memory.add_read_hook(addr, Box::new(move |_mem, _addr| Ok(lcg.next_u32())))
}
