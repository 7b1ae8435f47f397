//! Instruction encoder.
//!
//! The inverse of the decoder for the 32-bit encodings: rebuilds the raw
//! word from an opcode template (all fixed bits) plus the operand fields
//! selected by the codec. Compressed and pseudo forms have no 32-bit
//! template of their own and report an error; re-encode their canonical
//! expansion instead.

use crate::codec::Codec;
use crate::inst::DecodedInst;
use crate::opcode::Op;

/// Error returned for forms with no 32-bit encoding.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("opcode {0:?} has no 32-bit encoding")]
    NoEncoding(Op),
}

/// Re-encode a decoded instruction. For every decoded form the decoder can
/// produce from a 32-bit word, `encode_inst(decode(w)) == w` bit for bit.
pub fn encode_inst(dec: &DecodedInst) -> Result<u64, EncodeError> {
    let template = opcode_template(dec.op).ok_or(EncodeError::NoEncoding(dec.op))?;
    let rd = (dec.rd as u32) << 7;
    let rs1 = (dec.rs1 as u32) << 15;
    let rs2 = (dec.rs2 as u32) << 20;
    let imm = dec.imm as u32;
    let word = match dec.codec {
        Codec::None => template,
        Codec::U => template | rd | (imm & 0xffff_f000),
        Codec::Uj => template | rd | enc_j(imm),
        Codec::I => template | rd | rs1 | ((imm & 0xfff) << 20),
        Codec::ISh5 => template | rd | rs1 | ((imm & 0x1f) << 20),
        Codec::ISh6 => template | rd | rs1 | ((imm & 0x3f) << 20),
        Codec::ICsr | Codec::ICsrI => template | rd | rs1 | ((imm & 0xfff) << 20),
        Codec::S => template | rs1 | rs2 | enc_s(imm),
        Codec::Sb => template | rs1 | rs2 | enc_b(imm),
        Codec::R => template | rd | rs1 | rs2,
        Codec::R2 => template | rd | rs1,
        Codec::R2M => template | rd | rs1 | ((dec.rm as u32) << 12),
        Codec::RM => template | rd | rs1 | rs2 | ((dec.rm as u32) << 12),
        Codec::R4M => {
            template | rd | rs1 | rs2 | ((dec.rs3 as u32) << 27) | ((dec.rm as u32) << 12)
        }
        Codec::RA => {
            template | rd | rs1 | rs2 | ((dec.aq as u32) << 26) | ((dec.rl as u32) << 25)
        }
        Codec::IFence => template | ((dec.pred as u32) << 24) | ((dec.succ as u32) << 20),
        _ => return Err(EncodeError::NoEncoding(dec.op)),
    };
    Ok(word as u64)
}

fn enc_s(imm: u32) -> u32 {
    (((imm >> 5) & 0x7f) << 25) | ((imm & 0x1f) << 7)
}

fn enc_b(imm: u32) -> u32 {
    (((imm >> 12) & 1) << 31)
        | (((imm >> 5) & 0x3f) << 25)
        | (((imm >> 1) & 0xf) << 8)
        | (((imm >> 11) & 1) << 7)
}

fn enc_j(imm: u32) -> u32 {
    (((imm >> 20) & 1) << 31)
        | (((imm >> 1) & 0x3ff) << 21)
        | (((imm >> 11) & 1) << 20)
        | (((imm >> 12) & 0xff) << 12)
}

/// Fixed bits of each 32-bit encoding: base opcode, funct fields and any
/// hard-wired register selectors. `None` for opcodes with no 32-bit form.
fn opcode_template(op: Op) -> Option<u32> {
    use Op::*;
    let t = match op {
        LUI => 0x37,
        AUIPC => 0x17,
        JAL => 0x6f,
        JALR => 0x67,
        BEQ => 0x63,
        BNE => 0x63 | (1 << 12),
        BLT => 0x63 | (4 << 12),
        BGE => 0x63 | (5 << 12),
        BLTU => 0x63 | (6 << 12),
        BGEU => 0x63 | (7 << 12),
        LB => 0x03,
        LH => 0x03 | (1 << 12),
        LW => 0x03 | (2 << 12),
        LD => 0x03 | (3 << 12),
        LBU => 0x03 | (4 << 12),
        LHU => 0x03 | (5 << 12),
        LWU => 0x03 | (6 << 12),
        SB => 0x23,
        SH => 0x23 | (1 << 12),
        SW => 0x23 | (2 << 12),
        SD => 0x23 | (3 << 12),
        ADDI => 0x13,
        SLTI => 0x13 | (2 << 12),
        SLTIU => 0x13 | (3 << 12),
        XORI => 0x13 | (4 << 12),
        ORI => 0x13 | (6 << 12),
        ANDI => 0x13 | (7 << 12),
        SLLI => 0x13 | (1 << 12),
        SRLI => 0x13 | (5 << 12),
        SRAI => 0x13 | (5 << 12) | 0x4000_0000,
        ADD => 0x33,
        SUB => 0x33 | 0x4000_0000,
        SLL => 0x33 | (1 << 12),
        SLT => 0x33 | (2 << 12),
        SLTU => 0x33 | (3 << 12),
        XOR => 0x33 | (4 << 12),
        SRL => 0x33 | (5 << 12),
        SRA => 0x33 | (5 << 12) | 0x4000_0000,
        OR => 0x33 | (6 << 12),
        AND => 0x33 | (7 << 12),
        FENCE => 0x0f,
        FENCE_I => 0x0f | (1 << 12),
        ECALL => 0x73,
        EBREAK => 0x73 | (1 << 20),
        ADDIW => 0x1b,
        SLLIW => 0x1b | (1 << 12),
        SRLIW => 0x1b | (5 << 12),
        SRAIW => 0x1b | (5 << 12) | 0x4000_0000,
        ADDW => 0x3b,
        SUBW => 0x3b | 0x4000_0000,
        SLLW => 0x3b | (1 << 12),
        SRLW => 0x3b | (5 << 12),
        SRAW => 0x3b | (5 << 12) | 0x4000_0000,
        MUL => 0x33 | (1 << 25),
        MULH => 0x33 | (1 << 12) | (1 << 25),
        MULHSU => 0x33 | (2 << 12) | (1 << 25),
        MULHU => 0x33 | (3 << 12) | (1 << 25),
        DIV => 0x33 | (4 << 12) | (1 << 25),
        DIVU => 0x33 | (5 << 12) | (1 << 25),
        REM => 0x33 | (6 << 12) | (1 << 25),
        REMU => 0x33 | (7 << 12) | (1 << 25),
        MULW => 0x3b | (1 << 25),
        DIVW => 0x3b | (4 << 12) | (1 << 25),
        DIVUW => 0x3b | (5 << 12) | (1 << 25),
        REMW => 0x3b | (6 << 12) | (1 << 25),
        REMUW => 0x3b | (7 << 12) | (1 << 25),
        LR_W => 0x2f | (2 << 12) | (0x02 << 27),
        SC_W => 0x2f | (2 << 12) | (0x03 << 27),
        AMOSWAP_W => 0x2f | (2 << 12) | (0x01 << 27),
        AMOADD_W => 0x2f | (2 << 12),
        AMOXOR_W => 0x2f | (2 << 12) | (0x04 << 27),
        AMOOR_W => 0x2f | (2 << 12) | (0x08 << 27),
        AMOAND_W => 0x2f | (2 << 12) | (0x0c << 27),
        AMOMIN_W => 0x2f | (2 << 12) | (0x10 << 27),
        AMOMAX_W => 0x2f | (2 << 12) | (0x14 << 27),
        AMOMINU_W => 0x2f | (2 << 12) | (0x18 << 27),
        AMOMAXU_W => 0x2f | (2 << 12) | (0x1c << 27),
        LR_D => 0x2f | (3 << 12) | (0x02 << 27),
        SC_D => 0x2f | (3 << 12) | (0x03 << 27),
        AMOSWAP_D => 0x2f | (3 << 12) | (0x01 << 27),
        AMOADD_D => 0x2f | (3 << 12),
        AMOXOR_D => 0x2f | (3 << 12) | (0x04 << 27),
        AMOOR_D => 0x2f | (3 << 12) | (0x08 << 27),
        AMOAND_D => 0x2f | (3 << 12) | (0x0c << 27),
        AMOMIN_D => 0x2f | (3 << 12) | (0x10 << 27),
        AMOMAX_D => 0x2f | (3 << 12) | (0x14 << 27),
        AMOMINU_D => 0x2f | (3 << 12) | (0x18 << 27),
        AMOMAXU_D => 0x2f | (3 << 12) | (0x1c << 27),
        CSRRW => 0x73 | (1 << 12),
        CSRRS => 0x73 | (2 << 12),
        CSRRC => 0x73 | (3 << 12),
        CSRRWI => 0x73 | (5 << 12),
        CSRRSI => 0x73 | (6 << 12),
        CSRRCI => 0x73 | (7 << 12),
        FLW => 0x07 | (2 << 12),
        FLD => 0x07 | (3 << 12),
        FSW => 0x27 | (2 << 12),
        FSD => 0x27 | (3 << 12),
        FMADD_S => 0x43,
        FMSUB_S => 0x47,
        FNMSUB_S => 0x4b,
        FNMADD_S => 0x4f,
        FMADD_D => 0x43 | (1 << 25),
        FMSUB_D => 0x47 | (1 << 25),
        FNMSUB_D => 0x4b | (1 << 25),
        FNMADD_D => 0x4f | (1 << 25),
        FADD_S => 0x53,
        FSUB_S => 0x53 | (0x04 << 25),
        FMUL_S => 0x53 | (0x08 << 25),
        FDIV_S => 0x53 | (0x0c << 25),
        FADD_D => 0x53 | (0x01 << 25),
        FSUB_D => 0x53 | (0x05 << 25),
        FMUL_D => 0x53 | (0x09 << 25),
        FDIV_D => 0x53 | (0x0d << 25),
        FSGNJ_S => 0x53 | (0x10 << 25),
        FSGNJN_S => 0x53 | (0x10 << 25) | (1 << 12),
        FSGNJX_S => 0x53 | (0x10 << 25) | (2 << 12),
        FSGNJ_D => 0x53 | (0x11 << 25),
        FSGNJN_D => 0x53 | (0x11 << 25) | (1 << 12),
        FSGNJX_D => 0x53 | (0x11 << 25) | (2 << 12),
        FMIN_S => 0x53 | (0x14 << 25),
        FMAX_S => 0x53 | (0x14 << 25) | (1 << 12),
        FMIN_D => 0x53 | (0x15 << 25),
        FMAX_D => 0x53 | (0x15 << 25) | (1 << 12),
        FSQRT_S => 0x53 | (0x2c << 25),
        FSQRT_D => 0x53 | (0x2d << 25),
        FCVT_S_D => 0x53 | (0x20 << 25) | (1 << 20),
        FCVT_D_S => 0x53 | (0x21 << 25),
        FLE_S => 0x53 | (0x50 << 25),
        FLT_S => 0x53 | (0x50 << 25) | (1 << 12),
        FEQ_S => 0x53 | (0x50 << 25) | (2 << 12),
        FLE_D => 0x53 | (0x51 << 25),
        FLT_D => 0x53 | (0x51 << 25) | (1 << 12),
        FEQ_D => 0x53 | (0x51 << 25) | (2 << 12),
        FCVT_W_S => 0x53 | (0x60 << 25),
        FCVT_WU_S => 0x53 | (0x60 << 25) | (1 << 20),
        FCVT_L_S => 0x53 | (0x60 << 25) | (2 << 20),
        FCVT_LU_S => 0x53 | (0x60 << 25) | (3 << 20),
        FCVT_W_D => 0x53 | (0x61 << 25),
        FCVT_WU_D => 0x53 | (0x61 << 25) | (1 << 20),
        FCVT_L_D => 0x53 | (0x61 << 25) | (2 << 20),
        FCVT_LU_D => 0x53 | (0x61 << 25) | (3 << 20),
        FCVT_S_W => 0x53 | (0x68 << 25),
        FCVT_S_WU => 0x53 | (0x68 << 25) | (1 << 20),
        FCVT_S_L => 0x53 | (0x68 << 25) | (2 << 20),
        FCVT_S_LU => 0x53 | (0x68 << 25) | (3 << 20),
        FCVT_D_W => 0x53 | (0x69 << 25),
        FCVT_D_WU => 0x53 | (0x69 << 25) | (1 << 20),
        FCVT_D_L => 0x53 | (0x69 << 25) | (2 << 20),
        FCVT_D_LU => 0x53 | (0x69 << 25) | (3 << 20),
        FMV_X_S => 0x53 | (0x70 << 25),
        FCLASS_S => 0x53 | (0x70 << 25) | (1 << 12),
        FMV_S_X => 0x53 | (0x78 << 25),
        FMV_X_D => 0x53 | (0x71 << 25),
        FCLASS_D => 0x53 | (0x71 << 25) | (1 << 12),
        FMV_D_X => 0x53 | (0x79 << 25),
        _ => return None,
    };
    Some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_inst;
    use crate::profile::Rv64Imafdc;

    fn round_trip(word: u32) {
        let mut dec = DecodedInst::default();
        decode_inst::<Rv64Imafdc>(&mut dec, word as u64);
        assert_ne!(dec.op, Op::ILLEGAL, "word {word:#010x} should decode");
        let back = encode_inst(&dec).unwrap();
        assert_eq!(back, word as u64, "round trip of {word:#010x}");
    }

    #[test]
    fn round_trip_samples() {
        round_trip(0x00500093); // addi x1, x0, 5
        round_trip(0x002081b3); // add x3, x1, x2
        round_trip(0x40b50533); // sub x10, x10, x11
        round_trip(0xfe0008e3); // beq x0, x0, -16
        round_trip(0x0080006f); // jal x0, +8
        round_trip(0x00812403); // lw x8, 8(x2)
        round_trip(0x00812423); // sw x8, 8(x2)
        round_trip(0x0ff0000f); // fence iorw, iorw
        round_trip(0x00000073); // ecall
        round_trip(0x00100073); // ebreak
        round_trip(0x02a31313); // slli x6, x6, 42
        round_trip(0x1002b2af); // lr.d x5, (x5)
        round_trip(0x18c2b5af); // sc.d x11, x12, (x5)
        round_trip(0x00533053); // fadd.s f0, f6, f5, rm=3
        round_trip(0xd2227553); // fcvt.d.l f10, x4, rm=7
        round_trip(0x003100c3); // fmadd.s f1, f2, f3, f0
        round_trip(0x34202573); // csrrs x10, 0x342, x0
    }

    #[test]
    fn compressed_has_no_direct_encoding() {
        let mut dec = DecodedInst::default();
        decode_inst::<Rv64Imafdc>(&mut dec, 0x0085); // c.addi x1, 1
        assert!(encode_inst(&dec).is_err());
    }
}
