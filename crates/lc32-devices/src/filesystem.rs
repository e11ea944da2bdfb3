//! Guest syscall bridge (the newlib-style "filesystem controller").
//!
//! Grounded on `original_source/src/filesystem.cpp`'s `sim_open`/`sim_read`/
//! `sim_write`/`sim_seek`/`sim_close`, restructured around `spec.md` §4.5's
//! single four-word MMIO command register instead of the original's
//! per-syscall C++ methods invoked directly from `sim.cpp`. Flag bits are
//! `original_source/src/lc32_flags.hpp`'s `LC32_O_*`/`LC32_S_*` constants.
//!
//! Wire protocol (a from-scratch choice among the several incompatible
//! variants `SPEC_FULL.md` §4 notes the source carries): the guest writes
//! `data1`/`data2`/`data3` with the operation's arguments, then writes a
//! non-zero `mode` (the low 16 bits of the combined mode/fd word, `fd` the
//! high 16 when an op needs one). The bridge dispatches synchronously,
//! writes the primary return value into `data1` and (only when that value
//! signals failure) the guest errno into `data2`, then clears `mode` back
//! to off so the guest can poll it.
//!
//! | mode | op     | data1 (in)   | data2 (in)    | data3 (in) | data1 (out)   | data2 (out) |
//! |------|--------|--------------|---------------|------------|---------------|-------------|
//! | 1    | OPEN   | path ptr     | flags         | mode bits  | fd or -1      | errno       |
//! | 2    | CLOSE  | -            | -             | -          | 0 or -1       | errno       |
//! | 3    | READ   | -            | buf ptr       | count      | n or -1       | errno       |
//! | 4    | WRITE  | -            | buf ptr       | count      | n or -1       | errno       |
//! | 5    | SEEK   | -            | offset (i32)  | whence     | new off or -1 | errno       |
//! | 6    | FSTAT  | -            | guest_stat ptr| -          | 0 or -1       | errno       |
//! | 7    | ISATTY | -            | -             | -          | 1 or 0        | errno       |
//! | 8    | LINK   | old path ptr | new path ptr  | -          | 0 or -1       | errno       |
//! | 9    | UNLINK | path ptr     | -             | -          | 0 or -1       | errno       |
//! | 10   | MKDIR  | path ptr     | mode bits     | -          | 0 or -1       | errno       |
//!
//! `fd` (for ops 2–7) is carried in the high half of the mode/fd word itself.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;

use lc32_core::{Logger, SimResult};
use lc32_memory::Memory;

/// Size in bytes of the guest `stat` layout (`spec.md` §6).
pub const GUEST_STAT_SIZE: usize = 64;

const LC32_O_ACCMODE: u32 = 0x3;
const LC32_O_WRONLY: u32 = 1;
const LC32_O_RDWR: u32 = 2;
const LC32_O_APPEND: u32 = 0x0008;
const LC32_O_CREAT: u32 = 0x0200;
const LC32_O_TRUNC: u32 = 0x0400;

const SEEK_SET: u32 = 0;
const SEEK_CUR: u32 = 1;
const SEEK_END: u32 = 2;

const EBADF: u32 = 9;
const EFAULT: u32 = 14;
const EINVAL: u32 = 22;
const ENOSYS: u32 = 88;
const EOVERFLOW_GUEST: u32 = 139;

/// Translate a host `errno` (from `std::io::Error::raw_os_error`) into the
/// guest newlib-style errno. Values `1..=34` are the POSIX.1 basics and
/// agree between glibc and newlib; above that the two diverge and need an
/// explicit entry, falling back to `ENOSYS` with a warning (`spec.md` §4.5).
fn translate_errno(host_errno: i32, logger: &Logger) -> u32 {
    match host_errno {
        1..=34 => host_errno as u32,
        libc::EOVERFLOW => EOVERFLOW_GUEST,
        libc::ENOSYS => ENOSYS,
        other => {
            logger.warn(format!("unmapped host errno {other}; surfacing ENOSYS to guest"));
            ENOSYS
        }
    }
}

/// One guest-visible open-file slot. stdin/stdout/stderr occupy 0/1/2 and
/// are never actually closed on the host side (`spec.md` §3).
enum Slot {
    Std(std::os::unix::io::RawFd),
    Open(File),
    Closed,
}

struct FileTable {
    files: Vec<Slot>,
}

impl FileTable {
    fn new() -> Self {
        Self {
            files: vec![
                Slot::Std(libc::STDIN_FILENO),
                Slot::Std(libc::STDOUT_FILENO),
                Slot::Std(libc::STDERR_FILENO),
            ],
        }
    }

    fn raw_fd(&self, fd: u16) -> Result<std::os::unix::io::RawFd, u32> {
        match self.files.get(fd as usize) {
            Some(Slot::Std(raw)) => Ok(*raw),
            Some(Slot::Open(file)) => Ok(file.as_raw_fd()),
            Some(Slot::Closed) | None => Err(EBADF),
        }
    }

    fn push(&mut self, file: File) -> u16 {
        self.files.push(Slot::Open(file));
        (self.files.len() - 1) as u16
    }
}

/// Register the filesystem bridge's write hook at the mode/fd control word.
/// `control_addr` must be 4-byte aligned; `data1`/`data2`/`data3` occupy the
/// three consecutive words that follow it.
pub fn install(memory: &mut Memory, control_addr: u32, logger: Logger) -> SimResult<()> {
    let data1_addr = control_addr + 4;
    let data2_addr = control_addr + 8;
    let data3_addr = control_addr + 12;
    let mut table = FileTable::new();

    memory.add_write_hook(
        control_addr,
        Box::new(move |mem, _addr, _old, new| {
            let mode = (new & 0xFFFF) as u16;
            if mode == 0 {
                return Ok(new);
            }
            let fd = (new >> 16) as u16;
            let data1 = mem.read_unchecked::<u32>(data1_addr);
            let data2 = mem.read_unchecked::<u32>(data2_addr);
            let data3 = mem.read_unchecked::<u32>(data3_addr);

            if let Some((result, errno)) = dispatch(&mut table, mem, mode, fd, data1, data2, data3, &logger) {
                mem.write_unchecked::<u32>(data1_addr, result as u32);
                mem.write_unchecked::<u32>(data2_addr, errno);
            }
            Ok(0)
        }),
    )
}

#[allow(clippy::too_many_arguments)]
fn dispatch(
    table: &mut FileTable,
    mem: &mut Memory,
    mode: u16,
    fd: u16,
    data1: u32,
    data2: u32,
    data3: u32,
    logger: &Logger,
) -> Option<(i32, u32)> {
    match mode {
        1 => Some(do_open(table, mem, data1, data2, data3, logger)),
        2 => Some(do_close(table, fd)),
        3 => Some(do_read(table, mem, fd, data2, data3, logger)),
        4 => Some(do_write(table, mem, fd, data2, data3, logger)),
        5 => Some(do_seek(table, fd, data2 as i32, data3, logger)),
        6 => Some(do_fstat(table, mem, fd, data2, logger)),
        7 => Some(do_isatty(table, fd)),
        8 => Some(do_link(mem, data1, data2, logger)),
        9 => Some(do_unlink(mem, data1, logger)),
        10 => Some(do_mkdir(mem, data1, data2, logger)),
        // unknown mode: leave data1/data2 unchanged per spec.md §4.5
        _ => None,
    }
}

fn read_guest_cstr(mem: &Memory, ptr: u32) -> Option<String> {
    let mut bytes = Vec::new();
    let mut addr = ptr;
    loop {
        let b = mem.raw_slice(addr, 1)[0];
        if b == 0 {
            break;
        }
        bytes.push(b);
        addr = addr.wrapping_add(1);
        if bytes.len() > 4096 {
            return None; // runaway guest pointer; treat as a fault
        }
    }
    String::from_utf8(bytes).ok()
}

fn do_open(
    table: &mut FileTable,
    mem: &mut Memory,
    path_ptr: u32,
    flags: u32,
    create_mode: u32,
    logger: &Logger,
) -> (i32, u32) {
    let Some(path) = read_guest_cstr(mem, path_ptr) else {
        return (-1, EFAULT);
    };
    logger.debug(format!("OPEN {path:?} flags={flags:#x} mode={create_mode:#o}"));

    let access = flags & LC32_O_ACCMODE;
    let mut opts = OpenOptions::new();
    opts.read(access != LC32_O_WRONLY)
        .write(access == LC32_O_WRONLY || access == LC32_O_RDWR)
        .append(flags & LC32_O_APPEND != 0)
        .create(flags & LC32_O_CREAT != 0)
        .truncate(flags & LC32_O_TRUNC != 0)
        .mode(create_mode);

    match opts.open(&path) {
        Ok(file) => (i32::from(table.push(file)), 0),
        Err(e) => (-1, translate_errno(e.raw_os_error().unwrap_or(libc::EIO), logger)),
    }
}

fn do_close(table: &mut FileTable, fd: u16) -> (i32, u32) {
    let Some(slot) = table.files.get_mut(fd as usize) else {
        return (-1, EBADF);
    };
    match slot {
        Slot::Closed => (-1, EBADF),
        Slot::Std(_) => {
            *slot = Slot::Closed; // never close the underlying host stdio fd
            (0, 0)
        }
        Slot::Open(_) => {
            *slot = Slot::Closed; // drops the File, closing the host fd
            (0, 0)
        }
    }
}

fn do_read(table: &mut FileTable, mem: &mut Memory, fd: u16, ptr: u32, count: u32, logger: &Logger) -> (i32, u32) {
    match table.files.get_mut(fd as usize) {
        Some(Slot::Open(file)) => {
            let mut buf = vec![0u8; count as usize];
            match file.read(&mut buf) {
                Ok(n) => {
                    mem.raw_slice_mut(ptr, n).copy_from_slice(&buf[..n]);
                    (n as i32, 0)
                }
                Err(e) => (-1, translate_errno(e.raw_os_error().unwrap_or(libc::EIO), logger)),
            }
        }
        Some(Slot::Std(raw)) if *raw == libc::STDIN_FILENO => {
            let mut buf = vec![0u8; count as usize];
            match std::io::stdin().read(&mut buf) {
                Ok(n) => {
                    mem.raw_slice_mut(ptr, n).copy_from_slice(&buf[..n]);
                    (n as i32, 0)
                }
                Err(e) => (-1, translate_errno(e.raw_os_error().unwrap_or(libc::EIO), logger)),
            }
        }
        Some(Slot::Std(_)) => (-1, EBADF), // stdout/stderr are write-only
        Some(Slot::Closed) | None => (-1, EBADF),
    }
}

fn do_write(table: &mut FileTable, mem: &mut Memory, fd: u16, ptr: u32, count: u32, logger: &Logger) -> (i32, u32) {
    let bytes = mem.raw_slice(ptr, count as usize).to_vec();
    match table.files.get_mut(fd as usize) {
        Some(Slot::Open(file)) => match file.write(&bytes) {
            Ok(n) => (n as i32, 0),
            Err(e) => (-1, translate_errno(e.raw_os_error().unwrap_or(libc::EIO), logger)),
        },
        Some(Slot::Std(raw)) if *raw == libc::STDOUT_FILENO => write_host(&mut std::io::stdout(), &bytes, logger),
        Some(Slot::Std(raw)) if *raw == libc::STDERR_FILENO => write_host(&mut std::io::stderr(), &bytes, logger),
        Some(Slot::Std(_)) => (-1, EBADF), // stdin is read-only
        Some(Slot::Closed) | None => (-1, EBADF),
    }
}

fn write_host(sink: &mut impl Write, bytes: &[u8], logger: &Logger) -> (i32, u32) {
    match sink.write(bytes) {
        Ok(n) => (n as i32, 0),
        Err(e) => (-1, translate_errno(e.raw_os_error().unwrap_or(libc::EIO), logger)),
    }
}

fn do_seek(table: &mut FileTable, fd: u16, offset: i32, whence: u32, logger: &Logger) -> (i32, u32) {
    let Some(Slot::Open(file)) = table.files.get_mut(fd as usize) else {
        return (-1, EBADF);
    };
    let pos = match whence {
        SEEK_SET => SeekFrom::Start(offset as u64),
        SEEK_CUR => SeekFrom::Current(i64::from(offset)),
        SEEK_END => SeekFrom::End(i64::from(offset)),
        _ => return (-1, EINVAL),
    };

    let Ok(old_pos) = file.stream_position() else {
        return (-1, EBADF);
    };
    match file.seek(pos) {
        Ok(new_pos) if new_pos > i64::from(i32::MAX) as u64 => {
            // Rewind: the guest's seek result would not fit in a signed
            // 32-bit offset (spec.md §4.5, scenario S5).
            let _ = file.seek(SeekFrom::Start(old_pos));
            (-1, EOVERFLOW_GUEST)
        }
        Ok(new_pos) => (new_pos as i32, 0),
        Err(e) => (-1, translate_errno(e.raw_os_error().unwrap_or(libc::EIO), logger)),
    }
}

fn do_isatty(table: &mut FileTable, fd: u16) -> (i32, u32) {
    match table.raw_fd(fd) {
        Ok(raw) => {
            let is_tty = unsafe { libc::isatty(raw) } != 0;
            (i32::from(is_tty), 0)
        }
        Err(errno) => (-1, errno),
    }
}

fn do_link(mem: &Memory, old_ptr: u32, new_ptr: u32, logger: &Logger) -> (i32, u32) {
    let (Some(old), Some(new)) = (read_guest_cstr(mem, old_ptr), read_guest_cstr(mem, new_ptr)) else {
        return (-1, EFAULT);
    };
    match std::fs::hard_link(&old, &new) {
        Ok(()) => (0, 0),
        Err(e) => (-1, translate_errno(e.raw_os_error().unwrap_or(libc::EIO), logger)),
    }
}

fn do_unlink(mem: &Memory, path_ptr: u32, logger: &Logger) -> (i32, u32) {
    let Some(path) = read_guest_cstr(mem, path_ptr) else {
        return (-1, EFAULT);
    };
    match std::fs::remove_file(&path) {
        Ok(()) => (0, 0),
        Err(e) => (-1, translate_errno(e.raw_os_error().unwrap_or(libc::EIO), logger)),
    }
}

fn do_mkdir(mem: &Memory, path_ptr: u32, mode: u32, logger: &Logger) -> (i32, u32) {
    let Some(path) = read_guest_cstr(mem, path_ptr) else {
        return (-1, EFAULT);
    };
    let c_path = match std::ffi::CString::new(path) {
        Ok(p) => p,
        Err(_) => return (-1, EFAULT),
    };
    let rc = unsafe { libc::mkdir(c_path.as_ptr(), mode) };
    if rc == 0 {
        (0, 0)
    } else {
        (-1, translate_errno(std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO), logger))
    }
}

/// Fit `value` into a `u16`, or `None` if it would be truncated.
fn fits_u16(value: u64) -> Option<u16> {
    u16::try_from(value).ok()
}

/// Fit `value` into a `u32`, or `None` if it would be truncated.
fn fits_u32(value: u64) -> Option<u32> {
    u32::try_from(value).ok()
}

fn do_fstat(table: &mut FileTable, mem: &mut Memory, fd: u16, guest_stat_ptr: u32, logger: &Logger) -> (i32, u32) {
    let raw = match table.raw_fd(fd) {
        Ok(raw) => raw,
        Err(errno) => return (-1, errno),
    };

    // SAFETY: `raw` is a valid, currently-open fd owned by `table`; we only
    // read its metadata and never take ownership.
    let metadata = match unsafe { file_metadata_from_raw(raw) } {
        Ok(m) => m,
        Err(e) => return (-1, translate_errno(e.raw_os_error().unwrap_or(libc::EIO), logger)),
    };

    match pack_guest_stat(&metadata) {
        Ok(bytes) => {
            mem.raw_slice_mut(guest_stat_ptr, GUEST_STAT_SIZE).copy_from_slice(&bytes);
            (0, 0)
        }
        Err(errno) => (-1, errno),
    }
}

/// # Safety
/// `raw` must name a currently-valid, open file descriptor; the returned
/// `File` is leaked via `mem::forget` so the fd is never double-closed.
unsafe fn file_metadata_from_raw(raw: std::os::unix::io::RawFd) -> std::io::Result<std::fs::Metadata> {
    use std::os::unix::io::FromRawFd;
    let file = unsafe { File::from_raw_fd(raw) };
    let result = file.metadata();
    std::mem::forget(file);
    result
}

fn pack_guest_stat(meta: &std::fs::Metadata) -> Result<[u8; GUEST_STAT_SIZE], u32> {
    let mut buf = [0u8; GUEST_STAT_SIZE];

    let dev = fits_u16(meta.dev()).ok_or(EOVERFLOW_GUEST)?;
    let ino = fits_u16(meta.ino()).unwrap_or(0); // st_ino silently becomes 0 on overflow (spec.md §4.5)
    let mode = meta.mode();
    let nlink = fits_u16(meta.nlink()).ok_or(EOVERFLOW_GUEST)?;
    let uid = fits_u16(u64::from(meta.uid())).ok_or(EOVERFLOW_GUEST)?;
    let gid = fits_u16(u64::from(meta.gid())).ok_or(EOVERFLOW_GUEST)?;
    let rdev = fits_u16(meta.rdev()).ok_or(EOVERFLOW_GUEST)?;
    let size = fits_u32(meta.size()).ok_or(EOVERFLOW_GUEST)?;
    let blksize = fits_u32(meta.blksize()).ok_or(EOVERFLOW_GUEST)?;
    let blocks = fits_u32(meta.blocks()).ok_or(EOVERFLOW_GUEST)?;

    buf[0..2].copy_from_slice(&dev.to_le_bytes());
    buf[2..4].copy_from_slice(&ino.to_le_bytes());
    buf[4..8].copy_from_slice(&mode.to_le_bytes());
    buf[8..10].copy_from_slice(&nlink.to_le_bytes());
    buf[10..12].copy_from_slice(&uid.to_le_bytes());
    buf[12..14].copy_from_slice(&gid.to_le_bytes());
    buf[14..16].copy_from_slice(&rdev.to_le_bytes());
    buf[16..20].copy_from_slice(&size.to_le_bytes());

    write_split_time(&mut buf[20..32], meta.atime(), meta.atime_nsec());
    write_split_time(&mut buf[32..44], meta.mtime(), meta.mtime_nsec());
    write_split_time(&mut buf[44..56], meta.ctime(), meta.ctime_nsec());

    buf[56..60].copy_from_slice(&blksize.to_le_bytes());
    buf[60..64].copy_from_slice(&blocks.to_le_bytes());

    Ok(buf)
}

/// Write a `{sec_lo, sec_hi, nsec}` triple (12 bytes) into `out`.
fn write_split_time(out: &mut [u8], sec: i64, nsec: i64) {
    let sec = sec as u64;
    out[0..4].copy_from_slice(&(sec as u32).to_le_bytes());
    out[4..8].copy_from_slice(&((sec >> 32) as u32).to_le_bytes());
    out[8..12].copy_from_slice(&(nsec as u32).to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc32_memory::MemoryConfig;
    use std::io::Write as _;

    fn fs_memory() -> Memory {
        let config = MemoryConfig {
            size: 0x20000,
            page_size: 256,
            user_space_min: 0,
            user_space_max: 0x1FFFF,
            io_space_min: 0xF000,
        };
        let mut mem = Memory::new(config, 1);
        install(&mut mem, 0xF020, Logger::default()).unwrap();
        mem
    }

    fn write_cstr(mem: &mut Memory, addr: u32, s: &str) {
        for (i, b) in s.bytes().enumerate() {
            mem.write::<u8>(addr + i as u32, b).unwrap();
        }
        mem.write::<u8>(addr + s.len() as u32, 0).unwrap();
    }

    #[test]
    fn open_read_write_close_round_trip() {
        let mut mem = fs_memory();
        let tmp = std::env::temp_dir().join(format!("lc32sim-test-{}", std::process::id()));
        write_cstr(&mut mem, 0x1000, tmp.to_str().unwrap());

        // OPEN(path, O_RDWR|O_CREAT|O_TRUNC, 0o644)
        mem.write::<u32>(0xF024, 0x1000).unwrap();
        mem.write::<u32>(0xF028, LC32_O_RDWR | LC32_O_CREAT | LC32_O_TRUNC).unwrap();
        mem.write::<u32>(0xF02C, 0o644).unwrap();
        mem.write::<u32>(0xF020, 1).unwrap();
        let fd = mem.read::<u32>(0xF024).unwrap() as u16;
        assert_eq!(mem.read::<u32>(0xF028).unwrap(), 0);
        assert!(fd >= 3);

        // WRITE(fd, ptr=0x1100, count)
        write_cstr(&mut mem, 0x1100, "hi");
        mem.write::<u32>(0xF028, 0x1100).unwrap();
        mem.write::<u32>(0xF02C, 2).unwrap();
        mem.write::<u32>(0xF020, u32::from(4u16) | (u32::from(fd) << 16)).unwrap();
        assert_eq!(mem.read::<u32>(0xF024).unwrap(), 2);

        // CLOSE(fd)
        mem.write::<u32>(0xF020, u32::from(2u16) | (u32::from(fd) << 16)).unwrap();
        assert_eq!(mem.read::<u32>(0xF024).unwrap(), 0);

        let _ = std::fs::remove_file(&tmp);
    }

    #[test]
    fn seek_overflow_rolls_back() {
        let mut mem = fs_memory();
        let tmp = std::env::temp_dir().join(format!("lc32sim-test-seek-{}", std::process::id()));
        write_cstr(&mut mem, 0x1000, tmp.to_str().unwrap());

        mem.write::<u32>(0xF024, 0x1000).unwrap();
        mem.write::<u32>(0xF028, LC32_O_RDWR | LC32_O_CREAT | LC32_O_TRUNC).unwrap();
        mem.write::<u32>(0xF02C, 0o644).unwrap();
        mem.write::<u32>(0xF020, 1).unwrap();
        let fd = mem.read::<u32>(0xF024).unwrap() as u16;

        // SEEK(fd, 0x70000000, SET) twice.
        mem.write::<u32>(0xF028, 0x7000_0000).unwrap();
        mem.write::<u32>(0xF02C, SEEK_SET).unwrap();
        mem.write::<u32>(0xF020, u32::from(5u16) | (u32::from(fd) << 16)).unwrap();
        assert_eq!(mem.read::<u32>(0xF028).unwrap(), 0);

        mem.write::<u32>(0xF028, 0x7000_0000).unwrap();
        mem.write::<u32>(0xF02C, SEEK_SET).unwrap();
        mem.write::<u32>(0xF020, u32::from(5u16) | (u32::from(fd) << 16)).unwrap();
        assert_eq!(mem.read::<u32>(0xF028).unwrap(), EOVERFLOW_GUEST);
        assert_eq!(mem.read::<u32>(0xF024).unwrap() as i32, -1);

        mem.write::<u32>(0xF020, u32::from(2u16) | (u32::from(fd) << 16)).unwrap();
        let _ = std::fs::remove_file(&tmp);
    }

    #[test]
    fn close_on_bad_fd_is_ebadf() {
        let mut mem = fs_memory();
        mem.write::<u32>(0xF020, u32::from(2u16) | (99u32 << 16)).unwrap();
        assert_eq!(mem.read::<u32>(0xF024).unwrap() as i32, -1);
        assert_eq!(mem.read::<u32>(0xF028).unwrap(), EBADF);
    }

    #[test]
    fn mode_zero_leaves_state_unchanged() {
        let mut mem = fs_memory();
        mem.write::<u32>(0xF024, 0xDEAD_BEEF).unwrap();
        mem.write::<u32>(0xF020, 0).unwrap();
        assert_eq!(mem.read::<u32>(0xF024).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn unmapped_mode_leaves_data_words_unchanged() {
        let mut mem = fs_memory();
        mem.write::<u32>(0xF024, 0xDEAD_BEEF).unwrap();
        mem.write::<u32>(0xF028, 0xCAFE_F00D).unwrap();
        // mode=99 has no dispatch arm (modes 1..=10 are the only known ops).
        mem.write::<u32>(0xF020, 99).unwrap();
        assert_eq!(mem.read::<u32>(0xF024).unwrap(), 0xDEAD_BEEF);
        assert_eq!(mem.read::<u32>(0xF028).unwrap(), 0xCAFE_F00D);
    }
}
