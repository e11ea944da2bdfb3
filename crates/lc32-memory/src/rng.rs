//! Deterministic per-page pseudo-random byte generator.
//!
//! Derives a page's fill bytes from `lc32_core::Lcg`, reseeded with
//! `seed XOR page_index` per page — the same "sub-seed per page" structure
//! as the original implementation's `memory.cpp` page fill, just built on
//! the shared portable generator instead of libc's `rand()`.

use lc32_core::Lcg;

/// Generates the fill bytes for one memory page.
pub struct PagePrng(Lcg);

impl PagePrng {
    #[must_use]
    pub const fn new(seed: u32, page_index: u32) -> Self {
        Self(Lcg::new(seed ^ page_index))
    }

    /// Advance the generator and return the next byte.
    pub fn next_byte(&mut self) -> u8 {
        self.0.next_byte()
    }
}
