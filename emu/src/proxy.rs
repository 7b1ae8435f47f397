//! Syscall proxy.
//!
//! The environment-call bridge: reads the syscall number from a7 and the
//! arguments from a0..a6, performs the operation on the host, and writes
//! the result back to a0. Only the small set the reference runtime needs is
//! recognized; an unknown number is fatal. `exit` is surfaced as a terminal
//! outcome carrying the guest's code rather than terminating the host
//! process, so the outer program owns process exit.

use tracing::debug;

use rvproxy_isa::Isa;

use crate::hart::{reg, Hart};
use crate::mem::{page_size, round_up};

/// Linux RISC-V syscall numbers handled by the proxy.
pub mod sysno {
    pub const CLOSE: u64 = 57;
    pub const WRITE: u64 = 64;
    pub const FSTAT: u64 = 80;
    pub const EXIT: u64 = 93;
    pub const BRK: u64 = 214;
}

/// What the stepper should do after the proxy returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallOutcome {
    /// Resume the guest at the next instruction.
    Resume,
    /// The guest requested exit with this code.
    Exit(i32),
}

/// Dispatch one environment call.
///
/// Panics on an unknown syscall number: this core makes no attempt to
/// continue a guest whose runtime assumptions it does not meet.
pub fn proxy_syscall<P: Isa>(hart: &mut Hart<P>) -> SyscallOutcome {
    match hart.x(reg::A7) {
        sysno::CLOSE => sys_close(hart),
        sysno::WRITE => sys_write(hart),
        sysno::FSTAT => sys_fstat(hart),
        sysno::EXIT => return SyscallOutcome::Exit(hart.x(reg::A0) as i32),
        sysno::BRK => sys_brk(hart),
        n => panic!("unknown syscall: {n}"),
    }
    SyscallOutcome::Resume
}

fn sys_close<P: Isa>(hart: &mut Hart<P>) {
    let ret = unsafe { libc::close(hart.x(reg::A0) as i32) };
    hart.set_xr(reg::A0, ret as i64 as u64);
}

fn sys_write<P: Isa>(hart: &mut Hart<P>) {
    let fd = hart.x(reg::A0) as i32;
    let buf = hart.x(reg::A1) & Hart::<P>::addr_mask();
    let len = hart.x(reg::A2) & Hart::<P>::addr_mask();
    let ret = unsafe { libc::write(fd, buf as usize as *const libc::c_void, len as usize) };
    hart.set_xr(reg::A0, ret as i64 as u64);
}

fn sys_fstat<P: Isa>(hart: &mut Hart<P>) {
    let fd = hart.x(reg::A0) as i32;
    let mut host: libc::stat = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::fstat(fd, &mut host) };
    if ret == 0 {
        let addr = hart.x(reg::A1) & Hart::<P>::addr_mask();
        write_abi_stat::<P>(addr, &host);
    }
    hart.set_xr(reg::A0, ret as i64 as u64);
}

/// `struct stat` in the guest ABI, RV64 field widths.
#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
struct AbiStat64 {
    dev: u64,
    ino: u64,
    mode: u32,
    nlink: u32,
    uid: u32,
    gid: u32,
    rdev: u64,
    __pad1: u64,
    size: i64,
    blksize: i32,
    __pad2: i32,
    blocks: i64,
    atime: i64,
    atime_nsec: u64,
    mtime: i64,
    mtime_nsec: u64,
    ctime: i64,
    ctime_nsec: u64,
    __unused4: u32,
    __unused5: u32,
}

/// `struct stat` in the guest ABI, RV32 field widths.
#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
struct AbiStat32 {
    dev: u32,
    ino: u32,
    mode: u32,
    nlink: u32,
    uid: u32,
    gid: u32,
    rdev: u32,
    __pad1: u32,
    size: i32,
    blksize: i32,
    __pad2: i32,
    blocks: i32,
    atime: i32,
    atime_nsec: u32,
    mtime: i32,
    mtime_nsec: u32,
    ctime: i32,
    ctime_nsec: u32,
    __unused4: u32,
    __unused5: u32,
}

/// Fixed field-by-field translation of the host `stat` into the guest's
/// layout at `addr`.
fn write_abi_stat<P: Isa>(addr: u64, host: &libc::stat) {
    if P::XLEN == 64 {
        let abi = AbiStat64 {
            dev: host.st_dev as u64,
            ino: host.st_ino as u64,
            mode: host.st_mode as u32,
            nlink: host.st_nlink as u32,
            uid: host.st_uid as u32,
            gid: host.st_gid as u32,
            rdev: host.st_rdev as u64,
            size: host.st_size as i64,
            blksize: host.st_blksize as i32,
            blocks: host.st_blocks as i64,
            atime: host.st_atime as i64,
            atime_nsec: host.st_atime_nsec as u64,
            mtime: host.st_mtime as i64,
            mtime_nsec: host.st_mtime_nsec as u64,
            ctime: host.st_ctime as i64,
            ctime_nsec: host.st_ctime_nsec as u64,
            ..AbiStat64::default()
        };
        unsafe { (addr as usize as *mut AbiStat64).write_unaligned(abi) }
    } else {
        let abi = AbiStat32 {
            dev: host.st_dev as u32,
            ino: host.st_ino as u32,
            mode: host.st_mode as u32,
            nlink: host.st_nlink as u32,
            uid: host.st_uid as u32,
            gid: host.st_gid as u32,
            rdev: host.st_rdev as u32,
            size: host.st_size as i32,
            blksize: host.st_blksize as i32,
            blocks: host.st_blocks as i32,
            atime: host.st_atime as i32,
            atime_nsec: host.st_atime_nsec as u32,
            mtime: host.st_mtime as i32,
            mtime_nsec: host.st_mtime_nsec as u32,
            ctime: host.st_ctime as i32,
            ctime_nsec: host.st_ctime_nsec as u32,
            ..AbiStat32::default()
        };
        unsafe { (addr as usize as *mut AbiStat32).write_unaligned(abi) }
    }
}

/// Extend the program break.
///
/// Rounds both the current heap end and the requested address up to page
/// granularity. A request the heap already covers returns the requested
/// address unchanged; growth maps the delta as anonymous pages and records
/// the segment for teardown. On mapping failure a0 becomes `-ENOMEM` and
/// `heap_end` is left alone.
fn sys_brk<P: Isa>(hart: &mut Hart<P>) {
    let new_addr = hart.x(reg::A0) & Hart::<P>::addr_mask();
    let page = page_size();
    let curr_heap_end = round_up(hart.heap_end, page);
    let new_heap_end = round_up(new_addr, page);

    if hart.heap_end >= new_heap_end || new_heap_end == curr_heap_end {
        hart.set_xr(reg::A0, new_addr);
        return;
    }

    match hart.mem.map_anon(curr_heap_end, (new_heap_end - curr_heap_end) as usize) {
        Ok(()) => {
            if hart.emulator_debug() {
                debug!("brk: mmap: 0x{curr_heap_end:016x} - 0x{new_heap_end:016x} +R+W");
            }
            hart.heap_end = new_heap_end;
            hart.set_xr(reg::A0, new_addr);
        }
        Err(err) => {
            debug!("brk: error: mmap: {err}");
            hart.set_xr(reg::A0, -(libc::ENOMEM as i64) as u64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvproxy_isa::Rv64Imafdc;

    #[test]
    fn exit_is_surfaced_not_executed() {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.set_xr(reg::A7, sysno::EXIT);
        hart.set_xr(reg::A0, 42);
        assert_eq!(proxy_syscall(&mut hart), SyscallOutcome::Exit(42));
    }

    #[test]
    fn write_to_dev_null_passes_through() {
        let path = std::ffi::CString::new("/dev/null").unwrap();
        let fd = unsafe { libc::open(path.as_ptr(), libc::O_WRONLY) };
        assert!(fd >= 0);

        let msg = b"hello";
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.set_xr(reg::A7, sysno::WRITE);
        hart.set_xr(reg::A0, fd as u64);
        hart.set_xr(reg::A1, msg.as_ptr() as u64);
        hart.set_xr(reg::A2, msg.len() as u64);
        assert_eq!(proxy_syscall(&mut hart), SyscallOutcome::Resume);
        assert_eq!(hart.x(reg::A0), msg.len() as u64);

        hart.set_xr(reg::A7, sysno::CLOSE);
        hart.set_xr(reg::A0, fd as u64);
        assert_eq!(proxy_syscall(&mut hart), SyscallOutcome::Resume);
        assert_eq!(hart.x(reg::A0), 0);
    }

    #[test]
    fn fstat_fills_the_abi_layout() {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        let mut buf = [0u8; std::mem::size_of::<AbiStat64>()];
        hart.set_xr(reg::A7, sysno::FSTAT);
        hart.set_xr(reg::A0, 1);
        hart.set_xr(reg::A1, buf.as_mut_ptr() as u64);
        assert_eq!(proxy_syscall(&mut hart), SyscallOutcome::Resume);
        assert_eq!(hart.x(reg::A0), 0);
        // mode lives at byte offset 16 and must be non-zero for stdout
        let mode = u32::from_le_bytes(buf[16..20].try_into().unwrap());
        assert_ne!(mode, 0);
    }

    #[test]
    fn bad_fd_returns_negative() {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.set_xr(reg::A7, sysno::CLOSE);
        hart.set_xr(reg::A0, u32::MAX as u64);
        proxy_syscall(&mut hart);
        assert_eq!(hart.x(reg::A0) as i64, -1);
    }
}
