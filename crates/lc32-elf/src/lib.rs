//! 32-bit little-endian ELF loader.
//!
//! Parses just enough of the ELF32 format to find `PT_LOAD` segments in a
//! statically linked `ET_EXEC` executable: the header, the program header
//! table, and nothing else (no sections, no relocations, no dynamic
//! linking — all out of scope per `spec.md` §1).
//!
//! Modeled on `emu-nes::cartridge`'s iNES parser: validate a fixed-size
//! header, return a `Result` with a descriptive reason, and expose the
//! parsed segments through a narrow, loader-agnostic interface so that
//! `lc32-memory` never needs to know this crate exists.

use lc32_core::{SimError, SimResult};

const EI_MAG: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELFCLASS32: u8 = 1;
const ELFDATA2LSB: u8 = 1;
const EV_CURRENT: u8 = 1;
const ET_EXEC: u16 = 2;
const PT_LOAD: u32 = 1;

const EHDR_SIZE: usize = 52;
const PHDR_SIZE: usize = 32;

/// A single `PT_LOAD` program header, reduced to what `Memory::load_segment`
/// needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSegment {
    pub vaddr: u32,
    pub file_offset: u32,
    pub file_size: u32,
    pub mem_size: u32,
}

/// A parsed ELF32 executable image.
///
/// Holds the whole file in memory (small embedded binaries; no reason to
/// stream from disk) but exposes reads through [`ElfImage::read_chunk`] so
/// callers never reach into the raw buffer directly — this is the "loader"
/// collaborator interface `spec.md` §1 describes.
#[derive(Debug)]
pub struct ElfImage {
    data: Vec<u8>,
    pub entry: u32,
    pub segments: Vec<LoadSegment>,
}

impl ElfImage {
    /// Parse an in-memory ELF32 file.
    pub fn parse(data: Vec<u8>) -> SimResult<Self> {
        if data.len() < EHDR_SIZE {
            return Err(SimError::ElfInvalid {
                reason: format!("file too short for an ELF header ({} bytes)", data.len()),
            });
        }
        if data[0..4] != EI_MAG {
            return Err(SimError::ElfInvalid {
                reason: "bad magic (expected \\x7fELF)".to_string(),
            });
        }
        if data[4] != ELFCLASS32 {
            return Err(SimError::ElfInvalid {
                reason: "not a 32-bit (ELFCLASS32) object".to_string(),
            });
        }
        if data[5] != ELFDATA2LSB {
            return Err(SimError::ElfInvalid {
                reason: "not little-endian (ELFDATA2LSB); big-endian guests are unsupported"
                    .to_string(),
            });
        }
        if data[6] != EV_CURRENT {
            return Err(SimError::ElfInvalid {
                reason: "unsupported ELF version".to_string(),
            });
        }

        let e_type = u16::from_le_bytes([data[16], data[17]]);
        if e_type != ET_EXEC {
            return Err(SimError::ElfInvalid {
                reason: format!(
                    "unsupported e_type {e_type}; only ET_EXEC (statically linked) is supported"
                ),
            });
        }

        let entry = read_u32(&data, 24)?;
        let phoff = read_u32(&data, 28)? as usize;
        let phentsize = read_u16(&data, 42)? as usize;
        let phnum = read_u16(&data, 44)?;

        if phentsize < PHDR_SIZE {
            return Err(SimError::ElfInvalid {
                reason: format!("program header entry size {phentsize} smaller than expected"),
            });
        }

        let mut segments = Vec::new();
        for i in 0..phnum {
            let off = phoff + (i as usize) * phentsize;
            if off + PHDR_SIZE > data.len() {
                return Err(SimError::ElfRange { index: i, phnum });
            }
            let p_type = read_u32(&data, off)?;
            if p_type != PT_LOAD {
                continue;
            }
            let file_offset = read_u32(&data, off + 4)?;
            let vaddr = read_u32(&data, off + 8)?;
            let file_size = read_u32(&data, off + 16)?;
            let mem_size = read_u32(&data, off + 20)?;
            segments.push(LoadSegment {
                vaddr,
                file_offset,
                file_size,
                mem_size,
            });
        }

        Ok(Self {
            data,
            entry,
            segments,
        })
    }

    /// Read `buf.len()` bytes from the file starting at `file_offset`,
    /// truncating to however much of the file actually remains (the
    /// caller, `Memory::load_segment`, is responsible for zeroing the tail
    /// when `file_size < mem_size`).
    pub fn read_chunk(&self, file_offset: u32, buf: &mut [u8]) -> SimResult<()> {
        let start = file_offset as usize;
        let available = self.data.len().saturating_sub(start);
        let n = buf.len().min(available);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        for b in &mut buf[n..] {
            *b = 0;
        }
        Ok(())
    }
}

fn read_u16(data: &[u8], off: usize) -> SimResult<u16> {
    data.get(off..off + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| SimError::ElfInvalid {
            reason: "truncated header".to_string(),
        })
}

fn read_u32(data: &[u8], off: usize) -> SimResult<u32> {
    data.get(off..off + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| SimError::ElfInvalid {
            reason: "truncated header".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_elf(entry: u32, segments: &[(u32, u32, u32, u32)]) -> Vec<u8> {
        let phoff = EHDR_SIZE as u32;
        let mut data = vec![0u8; EHDR_SIZE];
        data[0..4].copy_from_slice(&EI_MAG);
        data[4] = ELFCLASS32;
        data[5] = ELFDATA2LSB;
        data[6] = EV_CURRENT;
        data[16..18].copy_from_slice(&ET_EXEC.to_le_bytes());
        data[24..28].copy_from_slice(&entry.to_le_bytes());
        data[28..32].copy_from_slice(&phoff.to_le_bytes());
        data[42..44].copy_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
        data[44..46].copy_from_slice(&(segments.len() as u16).to_le_bytes());

        let mut file_cursor = phoff as usize + segments.len() * PHDR_SIZE;
        for &(vaddr, file_size, mem_size, _pad) in segments {
            let mut ph = vec![0u8; PHDR_SIZE];
            ph[0..4].copy_from_slice(&PT_LOAD.to_le_bytes());
            let file_offset = file_cursor as u32;
            ph[4..8].copy_from_slice(&file_offset.to_le_bytes());
            ph[8..12].copy_from_slice(&vaddr.to_le_bytes());
            ph[16..20].copy_from_slice(&file_size.to_le_bytes());
            ph[20..24].copy_from_slice(&mem_size.to_le_bytes());
            data.extend_from_slice(&ph);
            file_cursor += file_size as usize;
        }
        for &(_vaddr, file_size, _mem_size, fill) in segments {
            data.extend(std::iter::repeat_n(fill as u8, file_size as usize));
        }
        data
    }

    #[test]
    fn parses_entry_and_one_segment() {
        let data = make_elf(0x3000_0000, &[(0x3000_0000, 16, 32, 0xAB)]);
        let elf = ElfImage::parse(data).expect("parse failed");
        assert_eq!(elf.entry, 0x3000_0000);
        assert_eq!(elf.segments.len(), 1);
        assert_eq!(elf.segments[0].vaddr, 0x3000_0000);
        assert_eq!(elf.segments[0].file_size, 16);
        assert_eq!(elf.segments[0].mem_size, 32);
    }

    #[test]
    fn read_chunk_zero_fills_past_eof() {
        let data = make_elf(0, &[(0x1000, 4, 4, 0xFF)]);
        let elf = ElfImage::parse(data).expect("parse failed");
        let seg = elf.segments[0];
        let mut buf = [0xAAu8; 8];
        elf.read_chunk(seg.file_offset, &mut buf).unwrap();
        assert_eq!(&buf[0..4], &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(&buf[4..8], &[0, 0, 0, 0]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut data = vec![0u8; EHDR_SIZE];
        data[0..4].copy_from_slice(b"\x00BAD");
        assert!(ElfImage::parse(data).is_err());
    }

    #[test]
    fn rejects_non_exec_type() {
        let mut data = make_elf(0, &[]);
        // ET_DYN = 3
        data[16..18].copy_from_slice(&3u16.to_le_bytes());
        assert!(ElfImage::parse(data).is_err());
    }

    #[test]
    fn rejects_too_short_file() {
        assert!(ElfImage::parse(vec![0u8; 4]).is_err());
    }
}
