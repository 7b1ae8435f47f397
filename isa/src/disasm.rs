//! Minimal disassembly for the instruction log.
//!
//! Prints the mnemonic and operands with ABI register names. This backs the
//! `--log-instructions` output; it is not a full-fidelity disassembler.

use crate::codec::Codec;
use crate::inst::DecodedInst;
use crate::opcode::Op;

/// ABI names of the integer registers.
pub const IREG_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// ABI names of the floating-point registers.
pub const FREG_NAMES: [&str; 32] = [
    "ft0", "ft1", "ft2", "ft3", "ft4", "ft5", "ft6", "ft7", "fs0", "fs1", "fa0", "fa1", "fa2",
    "fa3", "fa4", "fa5", "fa6", "fa7", "fs2", "fs3", "fs4", "fs5", "fs6", "fs7", "fs8", "fs9",
    "fs10", "fs11", "ft8", "ft9", "ft10", "ft11",
];

fn x(r: u8) -> &'static str {
    IREG_NAMES[(r & 31) as usize]
}

fn f(r: u8) -> &'static str {
    FREG_NAMES[(r & 31) as usize]
}

fn fence_mask(m: u8) -> String {
    let mut s = String::new();
    if m & 8 != 0 {
        s.push('i');
    }
    if m & 4 != 0 {
        s.push('o');
    }
    if m & 2 != 0 {
        s.push('r');
    }
    if m & 1 != 0 {
        s.push('w');
    }
    if s.is_empty() {
        s.push('0');
    }
    s
}

/// Which operand slots hold floating-point registers for this opcode.
fn float_slots(op: Op) -> (bool, bool, bool) {
    use Op::*;
    match op {
        FLW | FLD => (true, false, false),
        FSW | FSD => (false, false, true),
        FMADD_S | FMSUB_S | FNMSUB_S | FNMADD_S | FMADD_D | FMSUB_D | FNMSUB_D | FNMADD_D
        | FADD_S | FSUB_S | FMUL_S | FDIV_S | FADD_D | FSUB_D | FMUL_D | FDIV_D | FSGNJ_S
        | FSGNJN_S | FSGNJX_S | FSGNJ_D | FSGNJN_D | FSGNJX_D | FMIN_S | FMAX_S | FMIN_D
        | FMAX_D | FSQRT_S | FSQRT_D | FCVT_S_D | FCVT_D_S => (true, true, true),
        FLE_S | FLT_S | FEQ_S | FLE_D | FLT_D | FEQ_D => (false, true, true),
        FCVT_W_S | FCVT_WU_S | FCVT_L_S | FCVT_LU_S | FCVT_W_D | FCVT_WU_D | FCVT_L_D
        | FCVT_LU_D | FMV_X_S | FMV_X_D | FCLASS_S | FCLASS_D => (false, true, false),
        FCVT_S_W | FCVT_S_WU | FCVT_S_L | FCVT_S_LU | FCVT_D_W | FCVT_D_WU | FCVT_D_L
        | FCVT_D_LU | FMV_S_X | FMV_D_X => (true, false, false),
        _ => (false, false, false),
    }
}

/// Render one decoded instruction.
pub fn disasm(dec: &DecodedInst) -> String {
    let name = dec.op.name();
    let (fd, fs1, fs2) = float_slots(dec.op);
    let rd = if fd { f(dec.rd) } else { x(dec.rd) };
    let rs1 = if fs1 { f(dec.rs1) } else { x(dec.rs1) };
    let rs2 = if fs2 { f(dec.rs2) } else { x(dec.rs2) };
    let imm = dec.imm;

    match dec.codec {
        Codec::None | Codec::CNone => name.to_string(),
        Codec::U => format!("{} {}, 0x{:x}", name, rd, (imm as u32) >> 12),
        Codec::Uj | Codec::CjJal => format!("{name} {rd}, {imm}"),
        Codec::Cj | Codec::POff => format!("{name} {imm}"),
        Codec::I | Codec::Ci | Codec::CiLi | Codec::CbImm | Codec::Ci16sp | Codec::Ciw => {
            if is_load(dec.op) || dec.op == Op::JALR {
                format!("{name} {rd}, {imm}({rs1})")
            } else {
                format!("{name} {rd}, {rs1}, {imm}")
            }
        }
        Codec::ClW | Codec::ClD | Codec::CiLwSp | Codec::CiLdSp => {
            format!("{name} {rd}, {imm}({rs1})")
        }
        Codec::ISh5 | Codec::ISh6 | Codec::CiSh6 | Codec::CbSh6 => {
            format!("{name} {rd}, {rs1}, {imm}")
        }
        Codec::ICsr => format!("{} {}, 0x{:x}, {}", name, rd, imm, rs1),
        Codec::ICsrI => format!("{} {}, 0x{:x}, {}", name, rd, imm, dec.rs1),
        Codec::S | Codec::CsW | Codec::CsD | Codec::CssSwSp | Codec::CssSdSp => {
            format!("{name} {rs2}, {imm}({rs1})")
        }
        Codec::Sb | Codec::Cb => format!("{name} {rs1}, {rs2}, {imm}"),
        Codec::R | Codec::Cr | Codec::CrMv | Codec::Ca => {
            format!("{name} {rd}, {rs1}, {rs2}")
        }
        Codec::R2 | Codec::R2M => format!("{name} {rd}, {rs1}"),
        Codec::RM => format!("{name} {rd}, {rs1}, {rs2}"),
        Codec::R4M => {
            let rs3 = if fd { f(dec.rs3) } else { x(dec.rs3) };
            format!("{name} {rd}, {rs1}, {rs2}, {rs3}")
        }
        Codec::RA => {
            if matches!(dec.op, Op::LR_W | Op::LR_D) {
                format!("{name} {rd}, ({rs1})")
            } else {
                format!("{name} {rd}, {rs2}, ({rs1})")
            }
        }
        Codec::IFence => {
            format!("{} {}, {}", name, fence_mask(dec.pred), fence_mask(dec.succ))
        }
        Codec::CrJr | Codec::CrJalr => format!("{name} {rs1}"),
        Codec::CiLui => format!("{} {}, 0x{:x}", name, rd, (imm as u32) >> 12),
        Codec::PRdRs1 => format!("{name} {rd}, {rs1}"),
        Codec::PRdRs2 => format!("{name} {rd}, {rs2}"),
        Codec::PRs1Off => format!("{name} {rs1}, {imm}"),
        Codec::PRs2Off => format!("{name} {rs2}, {imm}"),
        Codec::PRs1 => format!("{name} {rs1}"),
    }
}

fn is_load(op: Op) -> bool {
    matches!(
        op,
        Op::LB | Op::LH | Op::LW | Op::LBU | Op::LHU | Op::LWU | Op::LD | Op::FLW | Op::FLD
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_inst;
    use crate::decompress::decompress_inst;
    use crate::profile::{Isa, Rv64Imafdc};
    use crate::pseudo::recognize_pseudo;

    fn dis<P: Isa>(inst: u64, pseudo: bool) -> String {
        let mut dec = DecodedInst::default();
        decode_inst::<P>(&mut dec, inst);
        decompress_inst::<P>(&mut dec);
        if pseudo {
            recognize_pseudo(&mut dec);
        }
        disasm(&dec)
    }

    #[test]
    fn formats_basic_forms() {
        assert_eq!(dis::<Rv64Imafdc>(0x00500093, false), "addi ra, zero, 5");
        assert_eq!(dis::<Rv64Imafdc>(0x00812403, false), "lw s0, 8(sp)");
        assert_eq!(dis::<Rv64Imafdc>(0x00812423, false), "sw s0, 8(sp)");
        assert_eq!(dis::<Rv64Imafdc>(0x0ff0000f, false), "fence iorw, iorw");
    }

    #[test]
    fn formats_pseudo_forms() {
        assert_eq!(dis::<Rv64Imafdc>(0x00000013, true), "nop");
        assert_eq!(dis::<Rv64Imafdc>(0x00008067, true), "ret");
        assert_eq!(dis::<Rv64Imafdc>(0x00000463, true), "beqz zero, 8");
    }

    #[test]
    fn formats_expanded_compressed() {
        // c.addi x1, 1 prints as its expansion
        assert_eq!(dis::<Rv64Imafdc>(0x0085, false), "addi ra, ra, 1");
    }
}
