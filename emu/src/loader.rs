//! ELF image loading.
//!
//! Only the slice of ELF this core needs: the identification bytes, the
//! entry point and the program headers, for little-endian RISC-V
//! executables of either class. `PT_LOAD` segments are mapped file-backed
//! at their link-time virtual addresses (guest memory is direct-mapped);
//! the tail beyond `p_filesz` is zeroed and backed by anonymous pages. A
//! parse problem is an error the caller reports; a mapping failure during
//! setup is fatal, matching the error policy of the rest of the core.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::io::AsRawFd;
use std::path::Path;

use tracing::debug;

use rvproxy_isa::Isa;

use crate::hart::{reg, Hart};
use crate::mem::{page_size, round_up};

/// Stack placement: 16 MiB ending at 0x78000000, initial sp 8 bytes below
/// the top.
pub const STACK_TOP: u64 = 0x7800_0000;
pub const STACK_SIZE: u64 = 0x0100_0000;

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const EM_RISCV: u16 = 243;
const PT_LOAD: u32 = 1;

const PF_X: u32 = 1;
const PF_W: u32 = 2;
const PF_R: u32 = 4;

/// Word width of the executable, selecting the processor variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

/// One program header, widened to 64-bit fields for both classes.
#[derive(Debug, Clone, Copy)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
}

/// Parsed ELF headers; no segment data is read here.
#[derive(Debug)]
pub struct ElfImage {
    pub class: ElfClass,
    pub entry: u64,
    pub phdrs: Vec<ProgramHeader>,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("i/o error reading executable: {0}")]
    Io(#[from] io::Error),
    #[error("not an ELF executable")]
    BadMagic,
    #[error("unsupported ELF class {0}")]
    BadClass(u8),
    #[error("executable is not little-endian")]
    BadEndianness,
    #[error("not a RISC-V executable (machine {0})")]
    BadMachine(u16),
}

impl ElfImage {
    /// Read and validate the ELF and program headers of `path`.
    pub fn read_headers(path: &Path) -> Result<Self, LoadError> {
        let mut file = File::open(path)?;
        let mut ident = [0u8; 16];
        file.read_exact(&mut ident)?;
        if ident[0..4] != ELF_MAGIC {
            return Err(LoadError::BadMagic);
        }
        if ident[5] != ELFDATA2LSB {
            return Err(LoadError::BadEndianness);
        }
        let class = match ident[4] {
            ELFCLASS32 => ElfClass::Elf32,
            ELFCLASS64 => ElfClass::Elf64,
            other => return Err(LoadError::BadClass(other)),
        };

        // e_type(2) e_machine(2) e_version(4), then class-dependent layout
        let mut rest = [0u8; 48];
        file.read_exact(&mut rest[..if class == ElfClass::Elf64 { 48 } else { 36 }])?;
        let machine = u16::from_le_bytes([rest[2], rest[3]]);
        if machine != EM_RISCV {
            return Err(LoadError::BadMachine(machine));
        }

        let (entry, phoff, phentsize, phnum) = match class {
            ElfClass::Elf64 => (
                u64::from_le_bytes(rest[8..16].try_into().unwrap()),
                u64::from_le_bytes(rest[16..24].try_into().unwrap()),
                u16::from_le_bytes(rest[38..40].try_into().unwrap()),
                u16::from_le_bytes(rest[40..42].try_into().unwrap()),
            ),
            ElfClass::Elf32 => (
                u32::from_le_bytes(rest[8..12].try_into().unwrap()) as u64,
                u32::from_le_bytes(rest[12..16].try_into().unwrap()) as u64,
                u16::from_le_bytes(rest[26..28].try_into().unwrap()),
                u16::from_le_bytes(rest[28..30].try_into().unwrap()),
            ),
        };

        let mut phdrs = Vec::with_capacity(phnum as usize);
        let mut buf = vec![0u8; phentsize as usize];
        for i in 0..phnum {
            file.seek(SeekFrom::Start(phoff + i as u64 * phentsize as u64))?;
            file.read_exact(&mut buf)?;
            phdrs.push(parse_phdr(class, &buf));
        }

        Ok(ElfImage { class, entry, phdrs })
    }
}

fn parse_phdr(class: ElfClass, b: &[u8]) -> ProgramHeader {
    match class {
        ElfClass::Elf64 => ProgramHeader {
            p_type: u32::from_le_bytes(b[0..4].try_into().unwrap()),
            p_flags: u32::from_le_bytes(b[4..8].try_into().unwrap()),
            p_offset: u64::from_le_bytes(b[8..16].try_into().unwrap()),
            p_vaddr: u64::from_le_bytes(b[16..24].try_into().unwrap()),
            p_filesz: u64::from_le_bytes(b[32..40].try_into().unwrap()),
            p_memsz: u64::from_le_bytes(b[40..48].try_into().unwrap()),
        },
        ElfClass::Elf32 => ProgramHeader {
            p_type: u32::from_le_bytes(b[0..4].try_into().unwrap()),
            p_flags: u32::from_le_bytes(b[24..28].try_into().unwrap()),
            p_offset: u32::from_le_bytes(b[4..8].try_into().unwrap()) as u64,
            p_vaddr: u32::from_le_bytes(b[8..12].try_into().unwrap()) as u64,
            p_filesz: u32::from_le_bytes(b[16..20].try_into().unwrap()) as u64,
            p_memsz: u32::from_le_bytes(b[20..24].try_into().unwrap()) as u64,
        },
    }
}

fn prot_bits(p_flags: u32) -> i32 {
    let mut prot = 0;
    if p_flags & PF_R != 0 {
        prot |= libc::PROT_READ;
    }
    if p_flags & PF_W != 0 {
        prot |= libc::PROT_WRITE;
    }
    if p_flags & PF_X != 0 {
        prot |= libc::PROT_EXEC;
    }
    prot
}

fn prot_name(p_flags: u32) -> String {
    let mut s = String::new();
    s.push_str(if p_flags & PF_R != 0 { "+R" } else { "-R" });
    s.push_str(if p_flags & PF_W != 0 { "+W" } else { "-W" });
    s.push_str(if p_flags & PF_X != 0 { "+X" } else { "-X" });
    s
}

/// Map every `PT_LOAD` segment of `image` into the hart's address space,
/// map the stack, and point pc/sp/heap bounds at their initial values.
///
/// Panics if a mapping cannot be established; there is nothing sensible to
/// do without the guest's address space in place.
pub fn load_image<P: Isa>(hart: &mut Hart<P>, path: &Path, image: &ElfImage) {
    let file = File::open(path)
        .unwrap_or_else(|e| panic!("map_load_segment: error: open: {}: {e}", path.display()));
    for phdr in &image.phdrs {
        if phdr.p_type == PT_LOAD {
            map_load_segment(hart, &file, phdr);
        }
    }
    map_stack(hart);
    hart.pc = image.entry;
}

fn map_load_segment<P: Isa>(hart: &mut Hart<P>, file: &File, phdr: &ProgramHeader) {
    let page = page_size();
    // p_vaddr and p_offset are congruent modulo the page size; align both
    // down so the kernel accepts the fixed file mapping.
    let map_base = phdr.p_vaddr & !(page - 1);
    let off_base = phdr.p_offset & !(page - 1);
    let head = phdr.p_vaddr - map_base;
    let file_len = (head + phdr.p_filesz) as usize;

    if file_len > 0 {
        hart.mem
            .map_file(map_base, file_len, prot_bits(phdr.p_flags), file.as_raw_fd(), off_base)
            .unwrap_or_else(|e| panic!("map_load_segment: error: mmap: {e}"));
    }

    // Zero the bss: clear the mapped tail past p_filesz, then back any
    // remaining pages with anonymous zero pages.
    let seg_end = phdr.p_vaddr + phdr.p_memsz;
    if phdr.p_memsz > phdr.p_filesz {
        let zero_from = phdr.p_vaddr + phdr.p_filesz;
        let mapped_end = round_up(map_base + file_len as u64, page);
        if phdr.p_flags & PF_W != 0 {
            let clear_to = mapped_end.min(seg_end);
            for addr in zero_from..clear_to {
                hart.mem.write_u8(addr, 0);
            }
        }
        if seg_end > mapped_end {
            hart.mem
                .map_anon(mapped_end, (round_up(seg_end, page) - mapped_end) as usize)
                .unwrap_or_else(|e| panic!("map_load_segment: error: mmap: {e}"));
        }
    }

    if hart.heap_begin < seg_end {
        hart.heap_begin = seg_end;
        hart.heap_end = seg_end;
    }

    if hart.emulator_debug() {
        debug!(
            "elf: mmap: 0x{:016x} - 0x{:016x} {}",
            phdr.p_vaddr,
            seg_end,
            prot_name(phdr.p_flags)
        );
    }
}

/// Map the single guest stack and set the stack pointer.
fn map_stack<P: Isa>(hart: &mut Hart<P>) {
    hart.mem
        .map_anon(STACK_TOP - STACK_SIZE, STACK_SIZE as usize)
        .unwrap_or_else(|e| panic!("map_stack: error: mmap: {e}"));
    hart.set_xr(reg::SP, STACK_TOP - 0x8);

    if hart.emulator_debug() {
        debug!("sp : mmap: 0x{:016x} - 0x{:016x} +R+W", STACK_TOP - STACK_SIZE, STACK_TOP);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// Build a minimal ELF64 with one PT_LOAD segment.
    fn tiny_elf64(entry: u64, vaddr: u64, code: &[u8]) -> Vec<u8> {
        let mut e = Vec::new();
        // ehdr
        e.extend_from_slice(&ELF_MAGIC);
        e.push(ELFCLASS64);
        e.push(ELFDATA2LSB);
        e.push(1); // version
        e.extend_from_slice(&[0; 9]); // abi + padding
        e.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        e.extend_from_slice(&EM_RISCV.to_le_bytes());
        e.extend_from_slice(&1u32.to_le_bytes()); // version
        e.extend_from_slice(&entry.to_le_bytes());
        e.extend_from_slice(&64u64.to_le_bytes()); // phoff
        e.extend_from_slice(&0u64.to_le_bytes()); // shoff
        e.extend_from_slice(&0u32.to_le_bytes()); // flags
        e.extend_from_slice(&64u16.to_le_bytes()); // ehsize
        e.extend_from_slice(&56u16.to_le_bytes()); // phentsize
        e.extend_from_slice(&1u16.to_le_bytes()); // phnum
        e.extend_from_slice(&[0u8; 6]); // shentsize/shnum/shstrndx
        assert_eq!(e.len(), 64);
        // phdr
        let offset = 0x1000u64;
        e.extend_from_slice(&PT_LOAD.to_le_bytes());
        e.extend_from_slice(&(PF_R | PF_X).to_le_bytes());
        e.extend_from_slice(&offset.to_le_bytes());
        e.extend_from_slice(&vaddr.to_le_bytes());
        e.extend_from_slice(&vaddr.to_le_bytes()); // paddr
        e.extend_from_slice(&(code.len() as u64).to_le_bytes());
        e.extend_from_slice(&(code.len() as u64).to_le_bytes());
        e.extend_from_slice(&0x1000u64.to_le_bytes()); // align
        e.resize(offset as usize, 0);
        e.extend_from_slice(code);
        e
    }

    fn write_temp(name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path =
            std::env::temp_dir().join(format!("rvproxy-loader-{}-{name}", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(bytes).unwrap();
        path
    }

    #[test]
    fn parses_a_minimal_image() {
        let code = [0x73, 0x00, 0x00, 0x00]; // ecall
        let bytes = tiny_elf64(0x10000, 0x10000, &code);
        let path = write_temp("minimal", &bytes);
        let image = ElfImage::read_headers(&path).unwrap();
        assert_eq!(image.class, ElfClass::Elf64);
        assert_eq!(image.entry, 0x10000);
        assert_eq!(image.phdrs.len(), 1);
        assert_eq!(image.phdrs[0].p_type, PT_LOAD);
        assert_eq!(image.phdrs[0].p_vaddr, 0x10000);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn rejects_non_elf() {
        let path = write_temp("script", b"#!/bin/sh\n");
        assert!(matches!(ElfImage::read_headers(&path), Err(LoadError::BadMagic)));
        let _ = std::fs::remove_file(path);
    }
}
