//! User-mode RISC-V emulation core.
//!
//! Loads a statically linked RISC-V executable into the host's own address
//! space (guest addresses are host pointers), then runs it to completion on
//! the caller's thread: fetch, cached decode, execute, and a syscall proxy
//! that forwards a minimal set of environment calls to the host OS. Exactly
//! one hart; no MMU, no privileged mode.

pub mod cache;
pub mod exec;
pub mod fpu;
pub mod hart;
pub mod loader;
pub mod mem;
pub mod proxy;
pub mod runner;

pub use cache::{DecodeCache, DECODE_CACHE_SIZE};
pub use exec::exec_inst;
pub use hart::{flag, reg, Hart};
pub use loader::{ElfClass, ElfImage, LoadError, STACK_SIZE, STACK_TOP};
pub use mem::GuestMemory;
pub use proxy::{proxy_syscall, sysno, SyscallOutcome};
pub use runner::{Runner, StepStatus};
