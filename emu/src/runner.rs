//! Stepper: the outer execution loop.
//!
//! Per step: fetch, decode-cache lookup (decode + decompress + optional
//! pseudo recognition on miss), optional logging, execute, and environment
//! call handling on executor fall-through. A batch retires `count`
//! instructions unless the guest exits, hits a breakpoint, or reaches an
//! illegal instruction first.

use rvproxy_isa::{
    decode_inst, decompress_inst, disasm, recognize_pseudo, DecodedInst, Isa, Op, IREG_NAMES,
};

use crate::cache::DecodeCache;
use crate::exec::exec_inst;
use crate::hart::Hart;
use crate::proxy::{proxy_syscall, SyscallOutcome};

/// Result of a step batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The whole batch retired; keep going.
    Completed,
    /// The guest exited with this code.
    Exit(i32),
    /// The guest executed ebreak.
    Break,
    /// An illegal instruction was reached (diagnostic already printed).
    Illegal,
}

/// Owns the hart and its decode cache and runs the guest.
pub struct Runner<P: Isa> {
    pub hart: Hart<P>,
    cache: DecodeCache,
}

impl<P: Isa> Runner<P> {
    pub fn new(hart: Hart<P>) -> Self {
        Self { hart, cache: DecodeCache::new() }
    }

    /// Retire up to `count` instructions.
    pub fn step(&mut self, count: usize) -> StepStatus {
        let mut dec = DecodedInst::default();
        let mut retired = 0;
        while retired < count {
            let (inst, inst_len) = self.hart.mem.fetch_inst(self.hart.pc);
            match self.cache.lookup(inst) {
                Some(hit) => dec = hit,
                None => {
                    decode_inst::<P>(&mut dec, inst);
                    if P::RVC {
                        decompress_inst::<P>(&mut dec);
                    }
                    if !self.hart.no_pseudo() {
                        recognize_pseudo(&mut dec);
                    }
                    self.cache.insert(inst, dec);
                }
            }

            if self.hart.log_registers {
                self.print_int_registers();
            }
            if self.hart.log_instructions {
                self.print_disassembly(&dec);
            }

            if exec_inst(&dec, &mut self.hart, inst_len) {
                self.hart.instret += 1;
                retired += 1;
                continue;
            }
            match dec.op {
                Op::ECALL => {
                    match proxy_syscall(&mut self.hart) {
                        SyscallOutcome::Exit(code) => return StepStatus::Exit(code),
                        SyscallOutcome::Resume => {}
                    }
                    let next = self.hart.pc.wrapping_add(inst_len as u64);
                    self.hart.set_pc(next);
                    self.hart.instret += 1;
                    retired += 1;
                }
                Op::EBREAK => {
                    eprintln!(
                        "breakpoint: pc=0x{:x} inst={}",
                        self.hart.pc,
                        self.format_inst(self.hart.pc)
                    );
                    return StepStatus::Break;
                }
                _ => {
                    eprintln!(
                        "illegal instruction: pc=0x{:x} inst={}",
                        self.hart.pc,
                        self.format_inst(self.hart.pc)
                    );
                    return StepStatus::Illegal;
                }
            }
        }
        StepStatus::Completed
    }

    /// Run the guest to a terminal status in batches.
    pub fn run(&mut self) -> StepStatus {
        loop {
            match self.step(1024) {
                StepStatus::Completed => {}
                status => return status,
            }
        }
    }

    /// Raw instruction bytes at `pc`, printed at the width of the encoding.
    fn format_inst(&self, pc: u64) -> String {
        let (inst, inst_len) = self.hart.mem.fetch_inst(pc);
        match inst_len {
            2 | 4 => format!("0x{inst:08x}"),
            6 => format!("0x{inst:012x}"),
            8 => format!("0x{inst:016x}"),
            _ => "(invalid)".to_string(),
        }
    }

    /// One `core N: pc (raw) disassembly` line.
    fn print_disassembly(&self, dec: &DecodedInst) {
        let args = disasm(dec);
        let raw = self.format_inst(self.hart.pc);
        if P::XLEN == 32 {
            println!("core {:3}: 0x{:08x} ({}) {:<30}", self.hart.hart_id, self.hart.pc, raw, args);
        } else {
            println!(
                "core {:3}: 0x{:016x} ({}) {:<30}",
                self.hart.hart_id, self.hart.pc, raw, args
            );
        }
    }

    /// Dump the integer register file, four registers per line.
    fn print_int_registers(&self) {
        for (i, name) in IREG_NAMES.iter().enumerate() {
            let sep = if (i + 1) % 4 == 0 { "\n" } else { " " };
            if P::XLEN == 32 {
                print!("{:<4}: 0x{:08x}{}", name, self.hart.x(i) as u32, sep);
            } else {
                print!("{:<4}: 0x{:016x}{}", name, self.hart.x(i), sep);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvproxy_isa::Rv64Imafdc;

    fn runner_with_code(code: &[u8]) -> (Runner<Rv64Imafdc>, u64) {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        let base = code.as_ptr() as u64;
        hart.pc = base;
        (Runner::new(hart), base)
    }

    #[test]
    fn retires_a_batch() {
        // addi x1, x0, 5; addi x2, x1, 1
        let code: Vec<u8> = [0x00500093u32, 0x00108113]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect();
        let (mut runner, base) = runner_with_code(&code);
        assert_eq!(runner.step(2), StepStatus::Completed);
        assert_eq!(runner.hart.get_x(1), 5);
        assert_eq!(runner.hart.get_x(2), 6);
        assert_eq!(runner.hart.pc, base + 8);
        assert_eq!(runner.hart.instret, 2);
    }

    #[test]
    fn illegal_word_terminates_the_batch() {
        let code = [0u8; 4];
        let (mut runner, _) = runner_with_code(&code);
        assert_eq!(runner.step(16), StepStatus::Illegal);
    }

    #[test]
    fn ebreak_is_a_breakpoint() {
        let code = 0x00100073u32.to_le_bytes();
        let (mut runner, _) = runner_with_code(&code);
        assert_eq!(runner.step(1), StepStatus::Break);
    }

    #[test]
    fn cache_hits_preserve_behavior() {
        // the same instruction word executed twice: second time from cache
        let code: Vec<u8> = [0x00108093u32, 0x00108093]
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .collect();
        let (mut runner, _) = runner_with_code(&code);
        assert_eq!(runner.step(2), StepStatus::Completed);
        assert_eq!(runner.hart.get_x(1), 2);
    }
}
