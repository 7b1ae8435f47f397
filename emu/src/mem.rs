//! Guest memory.
//!
//! The guest address space is the host's own virtual address space: guest
//! addresses are used directly as host pointers. [`GuestMemory`] is the thin
//! seam every guest access goes through, so an address-translation stage
//! could later be inserted without touching the executor. It also owns the
//! list of host mappings made on behalf of the guest and releases them on
//! drop.
//!
//! Callers must only touch addresses inside mapped segments; a stray guest
//! access faults in host terms, exactly as it would on hardware with no MMU
//! between the two.

use std::io;

/// Host page size.
pub fn page_size() -> u64 {
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as u64 }
}

/// Round `value` up to a multiple of `align` (a power of two).
pub fn round_up(value: u64, align: u64) -> u64 {
    (value + align - 1) & !(align - 1)
}

/// Direct-mapped guest memory plus the segments mapped for the guest.
#[derive(Debug, Default)]
pub struct GuestMemory {
    segments: Vec<(u64, usize)>,
}

impl GuestMemory {
    pub fn new() -> Self {
        Self { segments: Vec::new() }
    }

    /// Segments currently tracked, as (base, length) pairs.
    pub fn segments(&self) -> &[(u64, usize)] {
        &self.segments
    }

    /// Map anonymous read-write pages at a fixed guest address and track
    /// them for teardown.
    pub fn map_anon(&mut self, addr: u64, len: usize) -> io::Result<()> {
        let p = unsafe {
            libc::mmap(
                addr as *mut libc::c_void,
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_FIXED | libc::MAP_ANONYMOUS | libc::MAP_PRIVATE,
                -1,
                0,
            )
        };
        if p == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        self.segments.push((addr, len));
        Ok(())
    }

    /// Map a file-backed segment at a fixed guest address and track it.
    /// `addr` and `offset` must be congruent modulo the page size.
    pub fn map_file(
        &mut self,
        addr: u64,
        len: usize,
        prot: i32,
        fd: i32,
        offset: u64,
    ) -> io::Result<()> {
        let p = unsafe {
            libc::mmap(
                addr as *mut libc::c_void,
                len,
                prot,
                libc::MAP_FIXED | libc::MAP_PRIVATE,
                fd,
                offset as libc::off_t,
            )
        };
        if p == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        self.segments.push((addr, len));
        Ok(())
    }

    #[inline]
    pub fn read_u8(&self, addr: u64) -> u8 {
        unsafe { (addr as usize as *const u8).read_unaligned() }
    }

    #[inline]
    pub fn read_u16(&self, addr: u64) -> u16 {
        u16::from_le_bytes(unsafe { (addr as usize as *const [u8; 2]).read_unaligned() })
    }

    #[inline]
    pub fn read_u32(&self, addr: u64) -> u32 {
        u32::from_le_bytes(unsafe { (addr as usize as *const [u8; 4]).read_unaligned() })
    }

    #[inline]
    pub fn read_u64(&self, addr: u64) -> u64 {
        u64::from_le_bytes(unsafe { (addr as usize as *const [u8; 8]).read_unaligned() })
    }

    #[inline]
    pub fn write_u8(&mut self, addr: u64, value: u8) {
        unsafe { (addr as usize as *mut u8).write_unaligned(value) }
    }

    #[inline]
    pub fn write_u16(&mut self, addr: u64, value: u16) {
        unsafe { (addr as usize as *mut [u8; 2]).write_unaligned(value.to_le_bytes()) }
    }

    #[inline]
    pub fn write_u32(&mut self, addr: u64, value: u32) {
        unsafe { (addr as usize as *mut [u8; 4]).write_unaligned(value.to_le_bytes()) }
    }

    #[inline]
    pub fn write_u64(&mut self, addr: u64, value: u64) {
        unsafe { (addr as usize as *mut [u8; 8]).write_unaligned(value.to_le_bytes()) }
    }

    /// Fetch one variable-length instruction.
    ///
    /// Optimistically reads a 32-bit little-endian word; the low bits then
    /// select masking down to 16 bits or pulling further bytes for the 48-
    /// and 64-bit encodings. Unknown length classes return a raw word of 0
    /// (which decodes as illegal) and length 8.
    pub fn fetch_inst(&self, addr: u64) -> (u64, usize) {
        let mut inst = self.read_u32(addr) as u64;
        if (inst & 0b11) != 0b11 {
            (inst & 0xffff, 2)
        } else if (inst & 0b11100) != 0b11100 {
            (inst, 4)
        } else if (inst & 0b111111) == 0b011111 {
            inst |= (self.read_u16(addr + 4) as u64) << 32;
            (inst, 6)
        } else if (inst & 0b1111111) == 0b0111111 {
            inst |= (self.read_u32(addr + 4) as u64) << 32;
            (inst, 8)
        } else {
            (0, 8)
        }
    }
}

impl Drop for GuestMemory {
    fn drop(&mut self) {
        for &(addr, len) in &self.segments {
            unsafe {
                libc::munmap(addr as *mut libc::c_void, len);
            }
        }
    }
}
