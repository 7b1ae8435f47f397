//! Two-phase instruction decoder.
//!
//! Phase one maps raw bits to a unique [`Op`] under the extension switches of
//! the selected [`Isa`] profile, yielding [`Op::ILLEGAL`] when no live rule
//! matches. Phase two extracts the operand fields selected by the opcode's
//! codec and materializes every immediate form into the single sign-extended
//! `imm` field.
//!
//! Decoding is total and deterministic: for any `(raw word, profile)` pair it
//! writes only the decoded slot and has no other effect.

use crate::codec::Codec;
use crate::inst::DecodedInst;
use crate::opcode::Op;
use crate::profile::Isa;

/// Instruction length implied by the low bits of a raw encoding.
///
/// Variable-length scheme: `aa != 11` is 16-bit, `bbb11` with `bbb != 111`
/// is 32-bit, `011111` is 48-bit, `0111111` is 64-bit. Returns 0 for the
/// patterns beyond 64 bits.
pub fn inst_length(inst: u64) -> usize {
    if (inst & 0b11) != 0b11 {
        2
    } else if (inst & 0b11100) != 0b11100 {
        4
    } else if (inst & 0b111111) == 0b011111 {
        6
    } else if (inst & 0b1111111) == 0b0111111 {
        8
    } else {
        0
    }
}

/// Decode a raw instruction word into `dec`, overwriting every field.
pub fn decode_inst<P: Isa>(dec: &mut DecodedInst, inst: u64) {
    let op = decode_op::<P>(inst);
    *dec = DecodedInst { inst, op, codec: op.codec(), ..DecodedInst::default() };
    decode_operands(dec);
}

/// Phase one: opcode recognition.
fn decode_op<P: Isa>(inst: u64) -> Op {
    if (inst & 0b11) != 0b11 {
        if P::RVC {
            decode_op_16::<P>(inst as u16)
        } else {
            Op::ILLEGAL
        }
    } else {
        // 48- and 64-bit encodings have no opcodes assigned and fall out of
        // every arm below.
        decode_op_32::<P>(inst as u32)
    }
}

fn decode_op_32<P: Isa>(i: u32) -> Op {
    let rv64 = P::XLEN == 64;
    let rd = (i >> 7) & 0x1f;
    let rs1 = (i >> 15) & 0x1f;
    let rs2 = (i >> 20) & 0x1f;
    let funct3 = (i >> 12) & 0x7;
    let funct7 = (i >> 25) & 0x7f;

    match i & 0x7f {
        // LOAD
        0x03 => match funct3 {
            0b000 => Op::LB,
            0b001 => Op::LH,
            0b010 => Op::LW,
            0b011 if rv64 => Op::LD,
            0b100 => Op::LBU,
            0b101 => Op::LHU,
            0b110 if rv64 => Op::LWU,
            _ => Op::ILLEGAL,
        },
        // LOAD-FP
        0x07 => match funct3 {
            0b010 if P::RVF => Op::FLW,
            0b011 if P::RVD => Op::FLD,
            _ => Op::ILLEGAL,
        },
        // MISC-MEM
        0x0f => match funct3 {
            0b000 if rd == 0 && rs1 == 0 && (i >> 28) == 0 => Op::FENCE,
            0b001 if rd == 0 && rs1 == 0 && (i >> 20) == 0 => Op::FENCE_I,
            _ => Op::ILLEGAL,
        },
        // OP-IMM
        0x13 => match funct3 {
            0b000 => Op::ADDI,
            0b001 => {
                let hi = if rv64 { (i >> 26) & 0x3f } else { funct7 };
                if hi == 0 {
                    Op::SLLI
                } else {
                    Op::ILLEGAL
                }
            }
            0b010 => Op::SLTI,
            0b011 => Op::SLTIU,
            0b100 => Op::XORI,
            0b101 => {
                let hi = if rv64 { (i >> 26) & 0x3f } else { funct7 };
                match hi {
                    0b000000 => Op::SRLI,
                    h if h == (if rv64 { 0b010000 } else { 0b0100000 }) => Op::SRAI,
                    _ => Op::ILLEGAL,
                }
            }
            0b110 => Op::ORI,
            0b111 => Op::ANDI,
            _ => Op::ILLEGAL,
        },
        // AUIPC
        0x17 => Op::AUIPC,
        // OP-IMM-32
        0x1b if rv64 => match funct3 {
            0b000 => Op::ADDIW,
            0b001 if funct7 == 0 => Op::SLLIW,
            0b101 => match funct7 {
                0b0000000 => Op::SRLIW,
                0b0100000 => Op::SRAIW,
                _ => Op::ILLEGAL,
            },
            _ => Op::ILLEGAL,
        },
        // STORE
        0x23 => match funct3 {
            0b000 => Op::SB,
            0b001 => Op::SH,
            0b010 => Op::SW,
            0b011 if rv64 => Op::SD,
            _ => Op::ILLEGAL,
        },
        // STORE-FP
        0x27 => match funct3 {
            0b010 if P::RVF => Op::FSW,
            0b011 if P::RVD => Op::FSD,
            _ => Op::ILLEGAL,
        },
        // AMO
        0x2f if P::RVA => {
            let funct5 = i >> 27;
            match funct3 {
                0b010 => match funct5 {
                    0b00010 if rs2 == 0 => Op::LR_W,
                    0b00011 => Op::SC_W,
                    0b00001 => Op::AMOSWAP_W,
                    0b00000 => Op::AMOADD_W,
                    0b00100 => Op::AMOXOR_W,
                    0b01000 => Op::AMOOR_W,
                    0b01100 => Op::AMOAND_W,
                    0b10000 => Op::AMOMIN_W,
                    0b10100 => Op::AMOMAX_W,
                    0b11000 => Op::AMOMINU_W,
                    0b11100 => Op::AMOMAXU_W,
                    _ => Op::ILLEGAL,
                },
                0b011 if rv64 => match funct5 {
                    0b00010 if rs2 == 0 => Op::LR_D,
                    0b00011 => Op::SC_D,
                    0b00001 => Op::AMOSWAP_D,
                    0b00000 => Op::AMOADD_D,
                    0b00100 => Op::AMOXOR_D,
                    0b01000 => Op::AMOOR_D,
                    0b01100 => Op::AMOAND_D,
                    0b10000 => Op::AMOMIN_D,
                    0b10100 => Op::AMOMAX_D,
                    0b11000 => Op::AMOMINU_D,
                    0b11100 => Op::AMOMAXU_D,
                    _ => Op::ILLEGAL,
                },
                _ => Op::ILLEGAL,
            }
        }
        // OP
        0x33 => match (funct3, funct7) {
            (0b000, 0b0000000) => Op::ADD,
            (0b000, 0b0100000) => Op::SUB,
            (0b001, 0b0000000) => Op::SLL,
            (0b010, 0b0000000) => Op::SLT,
            (0b011, 0b0000000) => Op::SLTU,
            (0b100, 0b0000000) => Op::XOR,
            (0b101, 0b0000000) => Op::SRL,
            (0b101, 0b0100000) => Op::SRA,
            (0b110, 0b0000000) => Op::OR,
            (0b111, 0b0000000) => Op::AND,
            (0b000, 0b0000001) if P::RVM => Op::MUL,
            (0b001, 0b0000001) if P::RVM => Op::MULH,
            (0b010, 0b0000001) if P::RVM => Op::MULHSU,
            (0b011, 0b0000001) if P::RVM => Op::MULHU,
            (0b100, 0b0000001) if P::RVM => Op::DIV,
            (0b101, 0b0000001) if P::RVM => Op::DIVU,
            (0b110, 0b0000001) if P::RVM => Op::REM,
            (0b111, 0b0000001) if P::RVM => Op::REMU,
            _ => Op::ILLEGAL,
        },
        // LUI
        0x37 => Op::LUI,
        // OP-32
        0x3b if rv64 => match (funct3, funct7) {
            (0b000, 0b0000000) => Op::ADDW,
            (0b000, 0b0100000) => Op::SUBW,
            (0b001, 0b0000000) => Op::SLLW,
            (0b101, 0b0000000) => Op::SRLW,
            (0b101, 0b0100000) => Op::SRAW,
            (0b000, 0b0000001) if P::RVM => Op::MULW,
            (0b100, 0b0000001) if P::RVM => Op::DIVW,
            (0b101, 0b0000001) if P::RVM => Op::DIVUW,
            (0b110, 0b0000001) if P::RVM => Op::REMW,
            (0b111, 0b0000001) if P::RVM => Op::REMUW,
            _ => Op::ILLEGAL,
        },
        // MADD / MSUB / NMSUB / NMADD
        0x43 => match (i >> 25) & 0x3 {
            0b00 if P::RVF => Op::FMADD_S,
            0b01 if P::RVD => Op::FMADD_D,
            _ => Op::ILLEGAL,
        },
        0x47 => match (i >> 25) & 0x3 {
            0b00 if P::RVF => Op::FMSUB_S,
            0b01 if P::RVD => Op::FMSUB_D,
            _ => Op::ILLEGAL,
        },
        0x4b => match (i >> 25) & 0x3 {
            0b00 if P::RVF => Op::FNMSUB_S,
            0b01 if P::RVD => Op::FNMSUB_D,
            _ => Op::ILLEGAL,
        },
        0x4f => match (i >> 25) & 0x3 {
            0b00 if P::RVF => Op::FNMADD_S,
            0b01 if P::RVD => Op::FNMADD_D,
            _ => Op::ILLEGAL,
        },
        // OP-FP
        0x53 => decode_op_fp::<P>(funct3, rs2, funct7),
        // BRANCH
        0x63 => match funct3 {
            0b000 => Op::BEQ,
            0b001 => Op::BNE,
            0b100 => Op::BLT,
            0b101 => Op::BGE,
            0b110 => Op::BLTU,
            0b111 => Op::BGEU,
            _ => Op::ILLEGAL,
        },
        // JALR
        0x67 => {
            if funct3 == 0 {
                Op::JALR
            } else {
                Op::ILLEGAL
            }
        }
        // JAL
        0x6f => Op::JAL,
        // SYSTEM
        0x73 => match funct3 {
            0b000 => match i >> 20 {
                0 if rd == 0 && rs1 == 0 => Op::ECALL,
                1 if rd == 0 && rs1 == 0 => Op::EBREAK,
                _ => Op::ILLEGAL,
            },
            0b001 if P::RVS => Op::CSRRW,
            0b010 if P::RVS => Op::CSRRS,
            0b011 if P::RVS => Op::CSRRC,
            0b101 if P::RVS => Op::CSRRWI,
            0b110 if P::RVS => Op::CSRRSI,
            0b111 if P::RVS => Op::CSRRCI,
            _ => Op::ILLEGAL,
        },
        _ => Op::ILLEGAL,
    }
}

fn decode_op_fp<P: Isa>(funct3: u32, rs2: u32, funct7: u32) -> Op {
    let rv64 = P::XLEN == 64;
    match funct7 {
        0x00 if P::RVF => Op::FADD_S,
        0x04 if P::RVF => Op::FSUB_S,
        0x08 if P::RVF => Op::FMUL_S,
        0x0c if P::RVF => Op::FDIV_S,
        0x01 if P::RVD => Op::FADD_D,
        0x05 if P::RVD => Op::FSUB_D,
        0x09 if P::RVD => Op::FMUL_D,
        0x0d if P::RVD => Op::FDIV_D,
        0x10 if P::RVF => match funct3 {
            0b000 => Op::FSGNJ_S,
            0b001 => Op::FSGNJN_S,
            0b010 => Op::FSGNJX_S,
            _ => Op::ILLEGAL,
        },
        0x11 if P::RVD => match funct3 {
            0b000 => Op::FSGNJ_D,
            0b001 => Op::FSGNJN_D,
            0b010 => Op::FSGNJX_D,
            _ => Op::ILLEGAL,
        },
        0x14 if P::RVF => match funct3 {
            0b000 => Op::FMIN_S,
            0b001 => Op::FMAX_S,
            _ => Op::ILLEGAL,
        },
        0x15 if P::RVD => match funct3 {
            0b000 => Op::FMIN_D,
            0b001 => Op::FMAX_D,
            _ => Op::ILLEGAL,
        },
        0x20 if P::RVD && rs2 == 1 => Op::FCVT_S_D,
        0x21 if P::RVD && rs2 == 0 => Op::FCVT_D_S,
        0x2c if P::RVF && rs2 == 0 => Op::FSQRT_S,
        0x2d if P::RVD && rs2 == 0 => Op::FSQRT_D,
        0x50 if P::RVF => match funct3 {
            0b010 => Op::FEQ_S,
            0b001 => Op::FLT_S,
            0b000 => Op::FLE_S,
            _ => Op::ILLEGAL,
        },
        0x51 if P::RVD => match funct3 {
            0b010 => Op::FEQ_D,
            0b001 => Op::FLT_D,
            0b000 => Op::FLE_D,
            _ => Op::ILLEGAL,
        },
        0x60 if P::RVF => match rs2 {
            0b00000 => Op::FCVT_W_S,
            0b00001 => Op::FCVT_WU_S,
            0b00010 if rv64 => Op::FCVT_L_S,
            0b00011 if rv64 => Op::FCVT_LU_S,
            _ => Op::ILLEGAL,
        },
        0x61 if P::RVD => match rs2 {
            0b00000 => Op::FCVT_W_D,
            0b00001 => Op::FCVT_WU_D,
            0b00010 if rv64 => Op::FCVT_L_D,
            0b00011 if rv64 => Op::FCVT_LU_D,
            _ => Op::ILLEGAL,
        },
        0x68 if P::RVF => match rs2 {
            0b00000 => Op::FCVT_S_W,
            0b00001 => Op::FCVT_S_WU,
            0b00010 if rv64 => Op::FCVT_S_L,
            0b00011 if rv64 => Op::FCVT_S_LU,
            _ => Op::ILLEGAL,
        },
        0x69 if P::RVD => match rs2 {
            0b00000 => Op::FCVT_D_W,
            0b00001 => Op::FCVT_D_WU,
            0b00010 if rv64 => Op::FCVT_D_L,
            0b00011 if rv64 => Op::FCVT_D_LU,
            _ => Op::ILLEGAL,
        },
        0x70 if P::RVF && rs2 == 0 => match funct3 {
            0b000 => Op::FMV_X_S,
            0b001 => Op::FCLASS_S,
            _ => Op::ILLEGAL,
        },
        0x71 if P::RVD && rs2 == 0 => match funct3 {
            0b000 if rv64 => Op::FMV_X_D,
            0b001 => Op::FCLASS_D,
            _ => Op::ILLEGAL,
        },
        0x78 if P::RVF && rs2 == 0 && funct3 == 0 => Op::FMV_S_X,
        0x79 if P::RVD && rv64 && rs2 == 0 && funct3 == 0 => Op::FMV_D_X,
        _ => Op::ILLEGAL,
    }
}

fn decode_op_16<P: Isa>(c: u16) -> Op {
    // The all-zero halfword is the canonical illegal instruction.
    if c == 0 {
        return Op::ILLEGAL;
    }

    let rv64 = P::XLEN == 64;
    let rd = (c >> 7) & 0x1f;
    let rs2 = (c >> 2) & 0x1f;
    let funct3 = (c >> 13) & 0x7;
    let bit12 = (c >> 12) & 1;

    match c & 0b11 {
        // Quadrant 0
        0b00 => match funct3 {
            0b000 => {
                // nzuimm == 0 is reserved
                if (c >> 5) & 0xff == 0 {
                    Op::ILLEGAL
                } else {
                    Op::C_ADDI4SPN
                }
            }
            0b001 if P::RVD => Op::C_FLD,
            0b010 => Op::C_LW,
            0b011 if rv64 => Op::C_LD,
            0b011 if P::RVF => Op::C_FLW,
            0b101 if P::RVD => Op::C_FSD,
            0b110 => Op::C_SW,
            0b111 if rv64 => Op::C_SD,
            0b111 if P::RVF => Op::C_FSW,
            _ => Op::ILLEGAL,
        },
        // Quadrant 1
        0b01 => match funct3 {
            0b000 => {
                if rd == 0 {
                    Op::C_NOP
                } else {
                    Op::C_ADDI
                }
            }
            0b001 => {
                if rv64 {
                    if rd == 0 {
                        Op::ILLEGAL
                    } else {
                        Op::C_ADDIW
                    }
                } else {
                    Op::C_JAL
                }
            }
            0b010 => Op::C_LI,
            0b011 => {
                // imm == 0 is reserved for both forms
                if bit12 == 0 && (c >> 2) & 0x1f == 0 {
                    Op::ILLEGAL
                } else if rd == 2 {
                    Op::C_ADDI16SP
                } else {
                    Op::C_LUI
                }
            }
            0b100 => match (c >> 10) & 0x3 {
                0b00 => {
                    if !rv64 && bit12 != 0 {
                        Op::ILLEGAL
                    } else {
                        Op::C_SRLI
                    }
                }
                0b01 => {
                    if !rv64 && bit12 != 0 {
                        Op::ILLEGAL
                    } else {
                        Op::C_SRAI
                    }
                }
                0b10 => Op::C_ANDI,
                0b11 => match (bit12, (c >> 5) & 0x3) {
                    (0, 0b00) => Op::C_SUB,
                    (0, 0b01) => Op::C_XOR,
                    (0, 0b10) => Op::C_OR,
                    (0, 0b11) => Op::C_AND,
                    (1, 0b00) if rv64 => Op::C_SUBW,
                    (1, 0b01) if rv64 => Op::C_ADDW,
                    _ => Op::ILLEGAL,
                },
                _ => unreachable!(),
            },
            0b101 => Op::C_J,
            0b110 => Op::C_BEQZ,
            0b111 => Op::C_BNEZ,
            _ => unreachable!(),
        },
        // Quadrant 2
        0b10 => match funct3 {
            0b000 => {
                if !rv64 && bit12 != 0 {
                    Op::ILLEGAL
                } else {
                    Op::C_SLLI
                }
            }
            0b001 if P::RVD => Op::C_FLDSP,
            0b010 => {
                if rd == 0 {
                    Op::ILLEGAL
                } else {
                    Op::C_LWSP
                }
            }
            0b011 if rv64 => {
                if rd == 0 {
                    Op::ILLEGAL
                } else {
                    Op::C_LDSP
                }
            }
            0b011 if P::RVF => Op::C_FLWSP,
            0b100 => {
                if bit12 == 0 {
                    if rs2 == 0 {
                        if rd == 0 {
                            Op::ILLEGAL
                        } else {
                            Op::C_JR
                        }
                    } else {
                        Op::C_MV
                    }
                } else if rd == 0 && rs2 == 0 {
                    Op::C_EBREAK
                } else if rs2 == 0 {
                    Op::C_JALR
                } else {
                    Op::C_ADD
                }
            }
            0b101 if P::RVD => Op::C_FSDSP,
            0b110 => Op::C_SWSP,
            0b111 if rv64 => Op::C_SDSP,
            0b111 if P::RVF => Op::C_FSWSP,
            _ => Op::ILLEGAL,
        },
        _ => Op::ILLEGAL,
    }
}

/// Phase two: operand extraction, selected by codec.
fn decode_operands(dec: &mut DecodedInst) {
    let i = dec.inst as u32;
    let c = dec.inst as u16;
    match dec.codec {
        Codec::None | Codec::CNone => {}
        Codec::U => {
            dec.rd = rd(i);
            dec.imm = (i & 0xffff_f000) as i32;
        }
        Codec::Uj => {
            dec.rd = rd(i);
            dec.imm = imm_j(i);
        }
        Codec::I => {
            dec.rd = rd(i);
            dec.rs1 = rs1(i);
            dec.imm = (i as i32) >> 20;
        }
        Codec::ISh5 => {
            dec.rd = rd(i);
            dec.rs1 = rs1(i);
            dec.imm = ((i >> 20) & 0x1f) as i32;
        }
        Codec::ISh6 => {
            dec.rd = rd(i);
            dec.rs1 = rs1(i);
            dec.imm = ((i >> 20) & 0x3f) as i32;
        }
        Codec::ICsr | Codec::ICsrI => {
            // For the immediate forms rs1 carries the zero-extended 5-bit
            // value rather than a register index.
            dec.rd = rd(i);
            dec.rs1 = rs1(i);
            dec.imm = ((i >> 20) & 0xfff) as i32;
        }
        Codec::S => {
            dec.rs1 = rs1(i);
            dec.rs2 = rs2(i);
            dec.imm = imm_s(i);
        }
        Codec::Sb => {
            dec.rs1 = rs1(i);
            dec.rs2 = rs2(i);
            dec.imm = imm_b(i);
        }
        Codec::R => {
            dec.rd = rd(i);
            dec.rs1 = rs1(i);
            dec.rs2 = rs2(i);
        }
        Codec::R2 => {
            dec.rd = rd(i);
            dec.rs1 = rs1(i);
        }
        Codec::R2M => {
            dec.rd = rd(i);
            dec.rs1 = rs1(i);
            dec.rm = ((i >> 12) & 0x7) as u8;
        }
        Codec::RM => {
            dec.rd = rd(i);
            dec.rs1 = rs1(i);
            dec.rs2 = rs2(i);
            dec.rm = ((i >> 12) & 0x7) as u8;
        }
        Codec::R4M => {
            dec.rd = rd(i);
            dec.rs1 = rs1(i);
            dec.rs2 = rs2(i);
            dec.rs3 = (i >> 27) as u8;
            dec.rm = ((i >> 12) & 0x7) as u8;
        }
        Codec::RA => {
            dec.rd = rd(i);
            dec.rs1 = rs1(i);
            dec.rs2 = rs2(i);
            dec.aq = (i >> 26) & 1 != 0;
            dec.rl = (i >> 25) & 1 != 0;
        }
        Codec::IFence => {
            dec.pred = ((i >> 24) & 0xf) as u8;
            dec.succ = ((i >> 20) & 0xf) as u8;
        }
        Codec::Ciw => {
            dec.rd = creg(c >> 2);
            dec.rs1 = 2;
            dec.imm = imm_ciw(c);
        }
        Codec::ClW => {
            dec.rd = creg(c >> 2);
            dec.rs1 = creg(c >> 7);
            dec.imm = imm_clw(c);
        }
        Codec::ClD => {
            dec.rd = creg(c >> 2);
            dec.rs1 = creg(c >> 7);
            dec.imm = imm_cld(c);
        }
        Codec::CsW => {
            dec.rs1 = creg(c >> 7);
            dec.rs2 = creg(c >> 2);
            dec.imm = imm_clw(c);
        }
        Codec::CsD => {
            dec.rs1 = creg(c >> 7);
            dec.rs2 = creg(c >> 2);
            dec.imm = imm_cld(c);
        }
        Codec::Ci => {
            dec.rd = ((c >> 7) & 0x1f) as u8;
            dec.rs1 = dec.rd;
            dec.imm = imm_ci(c);
        }
        Codec::CiLi => {
            dec.rd = ((c >> 7) & 0x1f) as u8;
            dec.rs1 = 0;
            dec.imm = imm_ci(c);
        }
        Codec::CiLui => {
            dec.rd = ((c >> 7) & 0x1f) as u8;
            dec.imm = imm_ci_lui(c);
        }
        Codec::Ci16sp => {
            dec.rd = 2;
            dec.rs1 = 2;
            dec.imm = imm_ci16sp(c);
        }
        Codec::CiSh6 => {
            dec.rd = ((c >> 7) & 0x1f) as u8;
            dec.rs1 = dec.rd;
            dec.imm = imm_cshamt(c);
        }
        Codec::CbSh6 => {
            dec.rd = creg(c >> 7);
            dec.rs1 = dec.rd;
            dec.imm = imm_cshamt(c);
        }
        Codec::CbImm => {
            dec.rd = creg(c >> 7);
            dec.rs1 = dec.rd;
            dec.imm = imm_ci(c);
        }
        Codec::CiLwSp => {
            dec.rd = ((c >> 7) & 0x1f) as u8;
            dec.rs1 = 2;
            dec.imm = imm_ci_lwsp(c);
        }
        Codec::CiLdSp => {
            dec.rd = ((c >> 7) & 0x1f) as u8;
            dec.rs1 = 2;
            dec.imm = imm_ci_ldsp(c);
        }
        Codec::CssSwSp => {
            dec.rs1 = 2;
            dec.rs2 = ((c >> 2) & 0x1f) as u8;
            dec.imm = imm_css_swsp(c);
        }
        Codec::CssSdSp => {
            dec.rs1 = 2;
            dec.rs2 = ((c >> 2) & 0x1f) as u8;
            dec.imm = imm_css_sdsp(c);
        }
        Codec::Cj => {
            dec.rd = 0;
            dec.imm = imm_cj(c);
        }
        Codec::CjJal => {
            dec.rd = 1;
            dec.imm = imm_cj(c);
        }
        Codec::Cb => {
            dec.rs1 = creg(c >> 7);
            dec.rs2 = 0;
            dec.imm = imm_cb(c);
        }
        Codec::Cr => {
            dec.rd = ((c >> 7) & 0x1f) as u8;
            dec.rs1 = dec.rd;
            dec.rs2 = ((c >> 2) & 0x1f) as u8;
        }
        Codec::CrMv => {
            dec.rd = ((c >> 7) & 0x1f) as u8;
            dec.rs1 = 0;
            dec.rs2 = ((c >> 2) & 0x1f) as u8;
        }
        Codec::CrJr => {
            dec.rd = 0;
            dec.rs1 = ((c >> 7) & 0x1f) as u8;
            dec.imm = 0;
        }
        Codec::CrJalr => {
            dec.rd = 1;
            dec.rs1 = ((c >> 7) & 0x1f) as u8;
            dec.imm = 0;
        }
        Codec::Ca => {
            dec.rd = creg(c >> 7);
            dec.rs1 = dec.rd;
            dec.rs2 = creg(c >> 2);
        }
        // Pseudoinstruction codecs never come out of the decoder; they are
        // installed by the recognizer after operands are already in place.
        Codec::PRdRs1
        | Codec::PRdRs2
        | Codec::PRs1Off
        | Codec::PRs2Off
        | Codec::POff
        | Codec::PRs1 => {}
    }
}

#[inline]
fn rd(i: u32) -> u8 {
    ((i >> 7) & 0x1f) as u8
}

#[inline]
fn rs1(i: u32) -> u8 {
    ((i >> 15) & 0x1f) as u8
}

#[inline]
fn rs2(i: u32) -> u8 {
    ((i >> 20) & 0x1f) as u8
}

/// 3-bit compressed register field to full index (x8-x15).
#[inline]
fn creg(field: u16) -> u8 {
    8 + (field & 0x7) as u8
}

/// Sign-extend the low `bits` bits of `v`.
#[inline]
fn sext(v: u32, bits: u32) -> i32 {
    ((v << (32 - bits)) as i32) >> (32 - bits)
}

fn imm_s(i: u32) -> i32 {
    let v = ((i >> 25) << 5) | ((i >> 7) & 0x1f);
    sext(v, 12)
}

fn imm_b(i: u32) -> i32 {
    let v = (((i >> 31) & 1) << 12)
        | (((i >> 7) & 1) << 11)
        | (((i >> 25) & 0x3f) << 5)
        | (((i >> 8) & 0xf) << 1);
    sext(v, 13)
}

fn imm_j(i: u32) -> i32 {
    let v = (((i >> 31) & 1) << 20)
        | (((i >> 12) & 0xff) << 12)
        | (((i >> 20) & 1) << 11)
        | (((i >> 21) & 0x3ff) << 1);
    sext(v, 21)
}

fn imm_ci(c: u16) -> i32 {
    let v = ((((c >> 12) & 1) << 5) | ((c >> 2) & 0x1f)) as u32;
    sext(v, 6)
}

fn imm_ciw(c: u16) -> i32 {
    let v = ((((c >> 7) & 0xf) << 6)
        | (((c >> 11) & 0x3) << 4)
        | (((c >> 5) & 1) << 3)
        | (((c >> 6) & 1) << 2)) as u32;
    v as i32
}

fn imm_clw(c: u16) -> i32 {
    let v = ((((c >> 10) & 0x7) << 3) | (((c >> 6) & 1) << 2) | (((c >> 5) & 1) << 6)) as u32;
    v as i32
}

fn imm_cld(c: u16) -> i32 {
    let v = ((((c >> 10) & 0x7) << 3) | (((c >> 5) & 0x3) << 6)) as u32;
    v as i32
}

fn imm_ci_lui(c: u16) -> i32 {
    let v = ((((c >> 12) & 1) as u32) << 17) | ((((c >> 2) & 0x1f) as u32) << 12);
    sext(v, 18)
}

fn imm_ci16sp(c: u16) -> i32 {
    let v = ((((c >> 12) & 1) << 9)
        | (((c >> 3) & 0x3) << 7)
        | (((c >> 5) & 1) << 6)
        | (((c >> 2) & 1) << 5)
        | (((c >> 6) & 1) << 4)) as u32;
    sext(v, 10)
}

fn imm_cshamt(c: u16) -> i32 {
    ((((c >> 12) & 1) << 5) | ((c >> 2) & 0x1f)) as i32
}

fn imm_ci_lwsp(c: u16) -> i32 {
    ((((c >> 12) & 1) << 5) | (((c >> 4) & 0x7) << 2) | (((c >> 2) & 0x3) << 6)) as i32
}

fn imm_ci_ldsp(c: u16) -> i32 {
    ((((c >> 12) & 1) << 5) | (((c >> 5) & 0x3) << 3) | (((c >> 2) & 0x7) << 6)) as i32
}

fn imm_css_swsp(c: u16) -> i32 {
    ((((c >> 9) & 0xf) << 2) | (((c >> 7) & 0x3) << 6)) as i32
}

fn imm_css_sdsp(c: u16) -> i32 {
    ((((c >> 10) & 0x7) << 3) | (((c >> 7) & 0x7) << 6)) as i32
}

fn imm_cj(c: u16) -> i32 {
    let v = ((((c >> 12) & 1) << 11)
        | (((c >> 8) & 1) << 10)
        | (((c >> 9) & 0x3) << 8)
        | (((c >> 6) & 1) << 7)
        | (((c >> 7) & 1) << 6)
        | (((c >> 2) & 1) << 5)
        | (((c >> 11) & 1) << 4)
        | (((c >> 3) & 0x7) << 1)) as u32;
    sext(v, 12)
}

fn imm_cb(c: u16) -> i32 {
    let v = ((((c >> 12) & 1) << 8)
        | (((c >> 5) & 0x3) << 6)
        | (((c >> 2) & 1) << 5)
        | (((c >> 10) & 0x3) << 3)
        | (((c >> 3) & 0x3) << 1)) as u32;
    sext(v, 9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Rv32Imafdc, Rv64Ima, Rv64Imafdc};

    fn decode<P: Isa>(inst: u64) -> DecodedInst {
        let mut dec = DecodedInst::default();
        decode_inst::<P>(&mut dec, inst);
        dec
    }

    #[test]
    fn length_classes() {
        assert_eq!(inst_length(0x0001), 2);
        assert_eq!(inst_length(0x00500093), 4);
        assert_eq!(inst_length(0x001f), 6);
        assert_eq!(inst_length(0x003f), 8);
        assert_eq!(inst_length(0x007f), 0);
    }

    #[test]
    fn decode_addi() {
        // addi x1, x0, 5
        let dec = decode::<Rv64Imafdc>(0x00500093);
        assert_eq!(dec.op, Op::ADDI);
        assert_eq!(dec.rd, 1);
        assert_eq!(dec.rs1, 0);
        assert_eq!(dec.imm, 5);
    }

    #[test]
    fn decode_is_deterministic() {
        let mut a = DecodedInst::default();
        let mut b = DecodedInst::default();
        decode_inst::<Rv64Imafdc>(&mut a, 0x00533423);
        decode_inst::<Rv64Imafdc>(&mut b, 0x00533423);
        assert_eq!(a, b);
    }

    #[test]
    fn decode_zero_is_illegal() {
        assert_eq!(decode::<Rv64Imafdc>(0).op, Op::ILLEGAL);
        assert_eq!(decode::<Rv32Imafdc>(0).op, Op::ILLEGAL);
    }

    #[test]
    fn extension_gating() {
        // c.addi x1, 1 decodes only with C enabled
        assert_eq!(decode::<Rv64Imafdc>(0x0085).op, Op::C_ADDI);
        assert_eq!(decode::<Rv64Ima>(0x0085).op, Op::ILLEGAL);
        // flw needs F
        let flw = 0x0000a007; // flw f0, 0(x1)
        assert_eq!(decode::<Rv64Imafdc>(flw as u64).op, Op::FLW);
        assert_eq!(decode::<Rv64Ima>(flw as u64).op, Op::ILLEGAL);
    }

    #[test]
    fn decode_branch_immediate() {
        // beq x0, x0, +8 -> imm[12|10:5]=0, imm[4:1]=0b0100, imm[11]=0
        let beq = 0x00000463u32;
        let dec = decode::<Rv64Imafdc>(beq as u64);
        assert_eq!(dec.op, Op::BEQ);
        assert_eq!(dec.imm, 8);
    }

    #[test]
    fn decode_compressed_addi_materializes_expanded_operands() {
        // c.addi x1, 1 = 0x0085
        let dec = decode::<Rv64Imafdc>(0x0085);
        assert_eq!(dec.op, Op::C_ADDI);
        assert_eq!(dec.rd, 1);
        assert_eq!(dec.rs1, 1);
        assert_eq!(dec.imm, 1);
        assert_eq!(dec.inst, 0x0085);
    }

    #[test]
    fn decode_compressed_negative_immediate() {
        // c.addi x10, -1 = funct3 000, rd=10, imm=-1 (bit12=1, bits6:2=11111)
        let c: u16 = 0b000_1_01010_11111_01;
        let dec = decode::<Rv64Imafdc>(c as u64);
        assert_eq!(dec.op, Op::C_ADDI);
        assert_eq!(dec.rd, 10);
        assert_eq!(dec.imm, -1);
    }

    #[test]
    fn decode_c_addi4spn() {
        // c.addi4spn x8, sp, 16: nzuimm=16 -> imm[5:4]=01 at bits 12:11
        let c: u16 = 0b000_01000000_000_00;
        let dec = decode::<Rv64Imafdc>(c as u64);
        assert_eq!(dec.op, Op::C_ADDI4SPN);
        assert_eq!(dec.rd, 8);
        assert_eq!(dec.rs1, 2);
        assert_eq!(dec.imm, 16);
    }

    #[test]
    fn decode_c_lwsp() {
        // c.lwsp x5, 12(sp): funct3=010, rd=5, offset 12 -> bits[6:4]=011
        let c: u16 = 0b010_0_00101_01100_10;
        let dec = decode::<Rv64Imafdc>(c as u64);
        assert_eq!(dec.op, Op::C_LWSP);
        assert_eq!(dec.rd, 5);
        assert_eq!(dec.rs1, 2);
        assert_eq!(dec.imm, 12);
    }

    #[test]
    fn decode_c_jr_and_mv() {
        // c.jr x1 = 0x8082
        let dec = decode::<Rv64Imafdc>(0x8082);
        assert_eq!(dec.op, Op::C_JR);
        assert_eq!(dec.rd, 0);
        assert_eq!(dec.rs1, 1);
        // c.mv x10, x11 = 0x852e
        let dec = decode::<Rv64Imafdc>(0x852e);
        assert_eq!(dec.op, Op::C_MV);
        assert_eq!(dec.rd, 10);
        assert_eq!(dec.rs1, 0);
        assert_eq!(dec.rs2, 11);
    }

    #[test]
    fn rv32_rejects_rv64_shift_range() {
        // slli x1, x1, 32 is only encodable on RV64
        let slli32 = (32u32 << 20) | (1 << 15) | (0b001 << 12) | (1 << 7) | 0x13;
        assert_eq!(decode::<Rv64Imafdc>(slli32 as u64).op, Op::SLLI);
        assert_eq!(decode::<Rv32Imafdc>(slli32 as u64).op, Op::ILLEGAL);
    }

    #[test]
    fn fence_requires_clean_high_bits() {
        let fence = 0x0ff0000f; // fence iorw, iorw
        let dec = decode::<Rv64Imafdc>(fence as u64);
        assert_eq!(dec.op, Op::FENCE);
        assert_eq!(dec.pred, 0xf);
        assert_eq!(dec.succ, 0xf);
        // non-zero fm field is not a plain fence
        assert_eq!(decode::<Rv64Imafdc>(0x8ff0000f).op, Op::ILLEGAL);
    }

    #[test]
    fn ecall_ebreak() {
        assert_eq!(decode::<Rv64Imafdc>(0x00000073).op, Op::ECALL);
        assert_eq!(decode::<Rv64Imafdc>(0x00100073).op, Op::EBREAK);
    }
}
