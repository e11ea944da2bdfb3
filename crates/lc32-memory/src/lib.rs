//! Lazy-paged 32-bit address space.
//!
//! A flat byte store with deterministic per-page initialization (so an
//! uninitialized guest read is reproducible across hosts instead of being
//! whatever `Vec::with_capacity` happens to leave behind), typed aligned
//! access, and an MMIO hook table consulted only above `io_space_min` — the
//! same two-tier design as the original implementation's `Memory` class
//! (`memory.hpp`/`memory.cpp`), ported from "friend-access C++ struct" to
//! "hooks borrow `&mut Memory` explicitly" per `spec.md` §9's note on
//! avoiding process-wide mutable singletons.
//!
//! Modeled structurally on `emu-core::Bus`: one owner of the backing bytes,
//! a narrow typed read/write contract, and device callbacks reached only on
//! the slow path.

use std::collections::HashMap;

use lc32_core::{SimError, SimResult};

mod rng;
mod word;

pub use rng::PagePrng;
pub use word::MemWord;

/// Sizing and address-space-overlay parameters for a [`Memory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Size of the backing byte store, in bytes.
    pub size: u64,
    /// Page granularity for lazy initialization; must be a multiple of 4.
    pub page_size: u32,
    pub user_space_min: u32,
    pub user_space_max: u32,
    pub io_space_min: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            size: 0x1_0000_0000,
            page_size: 4096,
            user_space_min: 0,
            user_space_max: u32::MAX,
            io_space_min: 0xF000_0000,
        }
    }
}

/// A 32-bit-aligned MMIO read hook: given the memory (so it can reach back
/// into devices' own state via whatever it closed over) and the aligned
/// address, returns the 32-bit word to serve.
pub type ReadHook = Box<dyn FnMut(&mut Memory, u32) -> SimResult<u32>>;

/// A 32-bit-aligned MMIO write hook: given the memory, the aligned address,
/// the pre-write word, and the word that a naive write would have produced,
/// returns the word that is actually stored.
pub type WriteHook = Box<dyn FnMut(&mut Memory, u32, u32, u32) -> SimResult<u32>>;

/// A function that fills a buffer with the loader's file bytes for a
/// `PT_LOAD` segment. Kept generic over the loader so this crate never
/// depends on `lc32-elf`.
pub type SegmentReader<'a> = dyn FnMut(u32, &mut [u8]) -> SimResult<()> + 'a;

/// A lazily-initialized, MMIO-capable byte store.
pub struct Memory {
    data: Vec<u8>,
    page_initialized: Vec<bool>,
    config: MemoryConfig,
    seed: u32,
    read_hooks: HashMap<u32, ReadHook>,
    write_hooks: HashMap<u32, WriteHook>,
}

impl Memory {
    /// Construct a `Memory` of the given configuration, seeded for
    /// deterministic page initialization.
    #[must_use]
    pub fn new(config: MemoryConfig, seed: u32) -> Self {
        let page_count = config.size.div_ceil(u64::from(config.page_size)) as usize;
        Self {
            data: vec![0u8; config.size as usize],
            page_initialized: vec![false; page_count],
            config,
            seed,
            read_hooks: HashMap::new(),
            write_hooks: HashMap::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &MemoryConfig {
        &self.config
    }

    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.seed
    }

    fn page_index(&self, addr: u32) -> usize {
        (u64::from(addr) / u64::from(self.config.page_size)) as usize
    }

    /// Initialize the page containing `addr` if it has not been touched
    /// yet. Public so DMA and the filesystem bridge can pre-fault pages
    /// before an unchecked transfer, per `spec.md` §4.4 step 6.
    pub fn ensure_page_initialized(&mut self, addr: u32) {
        let page = self.page_index(addr);
        if self.page_initialized[page] {
            return;
        }
        let page_size = self.config.page_size as usize;
        let start = page * page_size;
        let end = (start + page_size).min(self.data.len());
        let mut prng = PagePrng::new(self.seed, page as u32);
        for byte in &mut self.data[start..end] {
            *byte = prng.next_byte();
        }
        self.page_initialized[page] = true;
    }

    fn check_bounds(&self, addr: u32, width: u32) -> SimResult<()> {
        if addr < self.config.user_space_min || addr > self.config.user_space_max {
            return Err(SimError::Segfault { addr });
        }
        if (addr as u64) + u64::from(width) > self.data.len() as u64 {
            return Err(SimError::Segfault { addr });
        }
        Ok(())
    }

    fn check_alignment(addr: u32, width: u32) -> SimResult<()> {
        if width > 1 && addr % width != 0 {
            return Err(SimError::UnalignedAccess { addr, alignment: width });
        }
        Ok(())
    }

    /// Register an MMIO read hook at a 4-byte-aligned address.
    pub fn add_read_hook(&mut self, aligned_addr: u32, hook: ReadHook) -> SimResult<()> {
        if self.read_hooks.contains_key(&aligned_addr) {
            return Err(SimError::DuplicateHook { addr: aligned_addr });
        }
        self.read_hooks.insert(aligned_addr, hook);
        Ok(())
    }

    /// Register an MMIO write hook at a 4-byte-aligned address.
    pub fn add_write_hook(&mut self, aligned_addr: u32, hook: WriteHook) -> SimResult<()> {
        if self.write_hooks.contains_key(&aligned_addr) {
            return Err(SimError::DuplicateHook { addr: aligned_addr });
        }
        self.write_hooks.insert(aligned_addr, hook);
        Ok(())
    }

    fn raw_read_u32(&self, aligned_addr: u32) -> u32 {
        let start = aligned_addr as usize;
        u32::from_le_bytes(self.data[start..start + 4].try_into().unwrap())
    }

    fn raw_write_u32(&mut self, aligned_addr: u32, word: u32) {
        let start = aligned_addr as usize;
        self.data[start..start + 4].copy_from_slice(&word.to_le_bytes());
    }

    /// Typed, checked read. Fails on misalignment, out-of-range address, or
    /// a propagated hook error; otherwise always succeeds (the page is
    /// lazily initialized first).
    pub fn read<T: MemWord>(&mut self, addr: u32) -> SimResult<T> {
        Self::check_alignment(addr, T::WIDTH)?;
        self.check_bounds(addr, T::WIDTH)?;
        self.ensure_page_initialized(addr);

        if addr >= self.config.io_space_min {
            let aligned = addr & !3;
            if let Some(mut hook) = self.read_hooks.remove(&aligned) {
                let result = hook(self, aligned);
                self.read_hooks.insert(aligned, hook);
                let word = result?;
                let offset = (addr - aligned) as usize;
                return Ok(T::from_bytes(&word.to_le_bytes()[offset..offset + T::WIDTH as usize]));
            }
        }

        let start = addr as usize;
        Ok(T::from_bytes(&self.data[start..start + T::WIDTH as usize]))
    }

    /// Typed, checked write. Symmetric to [`Memory::read`].
    pub fn write<T: MemWord>(&mut self, addr: u32, val: T) -> SimResult<()> {
        Self::check_alignment(addr, T::WIDTH)?;
        self.check_bounds(addr, T::WIDTH)?;
        self.ensure_page_initialized(addr);

        if addr >= self.config.io_space_min {
            let aligned = addr & !3;
            if let Some(mut hook) = self.write_hooks.remove(&aligned) {
                let old_word = self.raw_read_u32(aligned);
                let mut new_bytes = old_word.to_le_bytes();
                let offset = (addr - aligned) as usize;
                new_bytes[offset..offset + T::WIDTH as usize].copy_from_slice(&val.to_bytes()[..T::WIDTH as usize]);
                let new_word = u32::from_le_bytes(new_bytes);

                let result = hook(self, aligned, old_word, new_word);
                self.write_hooks.insert(aligned, hook);
                let final_word = result?;
                self.raw_write_u32(aligned, final_word);
                return Ok(());
            }
        }

        let start = addr as usize;
        let bytes = val.to_bytes();
        self.data[start..start + T::WIDTH as usize].copy_from_slice(&bytes[..T::WIDTH as usize]);
        Ok(())
    }

    /// Read bypassing alignment, bounds, and MMIO-hook checks. Callers
    /// (DMA, the filesystem bridge) are responsible for their own bounds
    /// reasoning and for calling [`Memory::ensure_page_initialized`] first.
    #[must_use]
    pub fn read_unchecked<T: MemWord>(&self, addr: u32) -> T {
        let start = addr as usize;
        T::from_bytes(&self.data[start..start + T::WIDTH as usize])
    }

    /// Write bypassing alignment, bounds, and MMIO-hook checks.
    pub fn write_unchecked<T: MemWord>(&mut self, addr: u32, val: T) {
        let start = addr as usize;
        let bytes = val.to_bytes();
        self.data[start..start + T::WIDTH as usize].copy_from_slice(&bytes[..T::WIDTH as usize]);
    }

    /// Raw byte access for components (the display sink) that need a view
    /// over a fixed-size region rather than a single typed word.
    #[must_use]
    pub fn raw_slice(&self, addr: u32, len: usize) -> &[u8] {
        let start = addr as usize;
        &self.data[start..start + len]
    }

    /// Mutable counterpart of [`Memory::raw_slice`], used by the filesystem
    /// bridge to copy host file contents directly into guest memory.
    pub fn raw_slice_mut(&mut self, addr: u32, len: usize) -> &mut [u8] {
        let start = addr as usize;
        &mut self.data[start..start + len]
    }

    /// Total length of the backing byte store.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Load a `PT_LOAD` segment: fault in every touched page, copy
    /// `min(file_size, mem_size)` bytes via `read_chunk`, and zero the
    /// trailing `mem_size - file_size` bytes (BSS).
    pub fn load_segment(
        &mut self,
        vaddr: u32,
        file_offset: u32,
        file_size: u32,
        mem_size: u32,
        read_chunk: &mut SegmentReader<'_>,
    ) -> SimResult<()> {
        let copy_len = file_size.min(mem_size);
        let page_size = self.config.page_size;
        let mut page = vaddr / page_size;
        let last_page = (vaddr + mem_size.saturating_sub(1)) / page_size;
        while page <= last_page {
            self.ensure_page_initialized(page * page_size);
            page += 1;
        }

        let mut buf = vec![0u8; copy_len as usize];
        read_chunk(file_offset, &mut buf)?;
        let start = vaddr as usize;
        self.data[start..start + copy_len as usize].copy_from_slice(&buf);

        let bss_start = start + copy_len as usize;
        let bss_end = vaddr as usize + mem_size as usize;
        for b in &mut self.data[bss_start..bss_end] {
            *b = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_memory() -> Memory {
        let config = MemoryConfig {
            size: 0x10000,
            page_size: 256,
            user_space_min: 0,
            user_space_max: 0xFFFF,
            io_space_min: 0xF000,
        };
        Memory::new(config, 42)
    }

    #[test]
    fn deterministic_init_is_repeatable() {
        let mut a = small_memory();
        let mut b = small_memory();
        for addr in [0u32, 1, 255, 256, 511] {
            assert_eq!(
                a.read::<u8>(addr).unwrap(),
                b.read::<u8>(addr).unwrap(),
                "mismatch at {addr:#x}"
            );
        }
    }

    #[test]
    fn unaligned_access_fails() {
        let mut mem = small_memory();
        assert!(matches!(
            mem.write::<u16>(1, 0),
            Err(SimError::UnalignedAccess { .. })
        ));
        assert!(matches!(
            mem.write::<u32>(2, 0),
            Err(SimError::UnalignedAccess { .. })
        ));
    }

    #[test]
    fn aligned_round_trip() {
        let mut mem = small_memory();
        mem.write::<u32>(0x100, 0xCAFE_BABE).unwrap();
        assert_eq!(mem.read::<u32>(0x100).unwrap(), 0xCAFE_BABE);
        mem.write::<u16>(0x104, 0x1234).unwrap();
        assert_eq!(mem.read::<u16>(0x104).unwrap(), 0x1234);
    }

    #[test]
    fn little_endian_byte_order() {
        let mut mem = small_memory();
        mem.write::<u32>(0x200, 0x1122_3344).unwrap();
        assert_eq!(mem.read::<u8>(0x200).unwrap(), 0x44);
        assert_eq!(mem.read::<u8>(0x201).unwrap(), 0x33);
        assert_eq!(mem.read::<u8>(0x202).unwrap(), 0x22);
        assert_eq!(mem.read::<u8>(0x203).unwrap(), 0x11);
    }

    #[test]
    fn segfault_outside_user_space() {
        let mut mem = small_memory();
        assert!(matches!(
            mem.read::<u8>(0x1_0000),
            Err(SimError::Segfault { .. })
        ));
    }

    #[test]
    fn read_hook_extracts_subfield() {
        let mut mem = small_memory();
        mem.add_read_hook(0xF000, Box::new(|_mem, _addr| Ok(0xDEAD_BEEF)))
            .unwrap();
        assert_eq!(mem.read::<u16>(0xF000).unwrap(), 0xBEEF);
        assert_eq!(mem.read::<u16>(0xF002).unwrap(), 0xDEAD);
    }

    #[test]
    fn write_hook_sees_old_and_new_word() {
        let mut mem = small_memory();
        mem.write_unchecked::<u32>(0xF000, 0x0000_0000);
        mem.add_write_hook(
            0xF000,
            Box::new(|_mem, _addr, old, new| {
                assert_eq!(old, 0);
                Ok(new)
            }),
        )
        .unwrap();
        mem.write::<u16>(0xF000, 0xBEEF).unwrap();
        assert_eq!(mem.read_unchecked::<u32>(0xF000), 0x0000_BEEF);
    }

    #[test]
    fn duplicate_hook_rejected() {
        let mut mem = small_memory();
        mem.add_read_hook(0xF000, Box::new(|_m, _a| Ok(0))).unwrap();
        assert!(matches!(
            mem.add_read_hook(0xF000, Box::new(|_m, _a| Ok(0))),
            Err(SimError::DuplicateHook { .. })
        ));
    }

    #[test]
    fn load_segment_zero_fills_bss() {
        let mut mem = small_memory();
        mem.load_segment(0x300, 0, 4, 16, &mut |_off, buf| {
            buf.copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
            Ok(())
        })
        .unwrap();
        assert_eq!(mem.read::<u32>(0x300).unwrap(), 0xEFBE_ADDE);
        for addr in (0x304..0x310).step_by(4) {
            assert_eq!(mem.read::<u32>(addr).unwrap(), 0);
        }
    }

    #[test]
    fn unchecked_access_skips_checks() {
        let mut mem = small_memory();
        mem.write_unchecked::<u32>(1, 0x1234_5678);
        assert_eq!(mem.read_unchecked::<u32>(1), 0x1234_5678);
    }
}
