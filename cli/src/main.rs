//! `rvproxy`: run a statically linked RISC-V executable against the host,
//! forwarding its system calls.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rvproxy_emu::loader::{load_image, ElfImage};
use rvproxy_emu::{flag, Hart, Runner, StepStatus};
use rvproxy_isa::{
    Isa, IsaExt, Rv32Ima, Rv32Imac, Rv32Imafd, Rv32Imafdc, Rv64Ima, Rv64Imac, Rv64Imafd,
    Rv64Imafdc,
};
use rvproxy_emu::ElfClass;

/// Exit code for usage errors, --help included.
const EXIT_USAGE: i32 = 9;
/// Exit codes for guest breakpoint / illegal instruction, following the
/// shell convention of 128 + signal.
const EXIT_BREAK: i32 = 128 + 5;
const EXIT_ILLEGAL: i32 = 128 + 4;

#[derive(Parser, Debug)]
#[command(name = "rvproxy", about = "User-mode RISC-V proxy emulator", disable_version_flag = true)]
struct Args {
    /// Print approximate host text/heap/stack addresses before load
    #[arg(short = 'm', long = "memory-debug")]
    memory_debug: bool,

    /// Enable mapping-trace debug output
    #[arg(short = 'd', long = "emulator-debug")]
    emulator_debug: bool,

    /// ISA extensions (IMA, IMAC, IMAFD, IMAFDC)
    #[arg(short = 'i', long = "isa", default_value = "IMAFDC")]
    isa: String,

    /// Dump integer registers before each instruction
    #[arg(short = 'r', long = "log-registers")]
    log_registers: bool,

    /// Disassemble each instruction before execution
    #[arg(short = 'l', long = "log-instructions")]
    log_instructions: bool,

    /// RISC-V ELF executable
    elf_file: PathBuf,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            process::exit(EXIT_USAGE);
        }
    };

    let ext: IsaExt = match args.isa.parse() {
        Ok(ext) => ext,
        Err(err) => {
            eprintln!("rvproxy: {err}");
            process::exit(EXIT_USAGE);
        }
    };

    let default_level = if args.emulator_debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.memory_debug {
        memory_info();
    }

    match emulate(&args, ext) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("rvproxy: {err:#}");
            process::exit(1);
        }
    }
}

/// Select the processor variant from the ELF class and the requested
/// extension set, then run the guest. The hot loop is monomorphized per
/// variant; this is the only runtime dispatch over profiles.
fn emulate(args: &Args, ext: IsaExt) -> Result<i32> {
    let image = ElfImage::read_headers(&args.elf_file)
        .with_context(|| format!("loading {}", args.elf_file.display()))?;

    let code = match (image.class, ext) {
        (ElfClass::Elf32, IsaExt::Ima) => start::<Rv32Ima>(args, &image),
        (ElfClass::Elf32, IsaExt::Imac) => start::<Rv32Imac>(args, &image),
        (ElfClass::Elf32, IsaExt::Imafd) => start::<Rv32Imafd>(args, &image),
        (ElfClass::Elf32, IsaExt::Imafdc) => start::<Rv32Imafdc>(args, &image),
        (ElfClass::Elf64, IsaExt::Ima) => start::<Rv64Ima>(args, &image),
        (ElfClass::Elf64, IsaExt::Imac) => start::<Rv64Imac>(args, &image),
        (ElfClass::Elf64, IsaExt::Imafd) => start::<Rv64Imafd>(args, &image),
        (ElfClass::Elf64, IsaExt::Imafdc) => start::<Rv64Imafdc>(args, &image),
    };
    Ok(code)
}

/// Instantiate the hart, map the image and the stack, and step the guest
/// until it halts. Mapped segments are released when the hart drops.
fn start<P: Isa>(args: &Args, image: &ElfImage) -> i32 {
    let mut hart: Hart<P> = Hart::new();
    hart.flags = if args.emulator_debug { flag::EMULATOR_DEBUG } else { 0 };
    hart.log_registers = args.log_registers;
    hart.log_instructions = args.log_instructions;

    load_image(&mut hart, &args.elf_file, image);

    let mut runner = Runner::new(hart);
    match runner.run() {
        StepStatus::Exit(code) => code,
        StepStatus::Break => EXIT_BREAK,
        StepStatus::Illegal => EXIT_ILLEGAL,
        StepStatus::Completed => unreachable!("run() only returns terminal statuses"),
    }
}

/// Approximate location of host text, heap and stack, for eyeballing the
/// address-space layout against the guest's fixed mappings.
fn memory_info() {
    let text = memory_info as usize;
    let heap = Box::new(0u8);
    let stack = &text as *const _ as usize;
    eprintln!("text : ~0x{text:016x}");
    eprintln!("heap : ~0x{:016x}", &*heap as *const u8 as usize);
    eprintln!("stack: ~0x{stack:016x}");
}
