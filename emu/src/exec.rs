//! Instruction executor.
//!
//! A single dispatch on the decoded opcode; every arm updates registers,
//! the program counter and memory per the ISA. Returns `true` when the
//! instruction was handled and `false` on fall-through, which the stepper
//! resolves: `ecall` goes to the syscall proxy, `ebreak` halts, anything
//! else is an illegal-instruction event.
//!
//! Pseudoinstructions execute exactly as their canonical forms: the
//! recognizer only rewrites the opcode while the operand fields keep their
//! encoded values (a `beqz` still carries `rs2 == x0`), so every pseudo arm
//! simply aliases its canonical arm.

use rvproxy_isa::{DecodedInst, Isa, Op};

use crate::fpu::{self, FpCmp, FpOp};
use crate::hart::Hart;

/// CSR numbers understood by this user-mode core.
mod csr {
    pub const FFLAGS: i32 = 0x001;
    pub const FRM: i32 = 0x002;
    pub const FCSR: i32 = 0x003;
    pub const CYCLE: i32 = 0xc00;
    pub const TIME: i32 = 0xc01;
    pub const INSTRET: i32 = 0xc02;
    pub const CYCLEH: i32 = 0xc80;
    pub const TIMEH: i32 = 0xc81;
    pub const INSTRETH: i32 = 0xc82;
}

/// Execute one decoded instruction against `hart`.
///
/// `inst_len` is the byte length of the fetched encoding; non-control arms
/// advance the pc by it, control transfers compute their own target.
pub fn exec_inst<P: Isa>(dec: &DecodedInst, hart: &mut Hart<P>, inst_len: usize) -> bool {
    use Op::*;

    let next = hart.pc.wrapping_add(inst_len as u64);
    let rd = dec.rd;
    let rs1 = dec.rs1;
    let rs2 = dec.rs2;
    let imm = dec.imm as i64 as u64;
    let rv64 = P::XLEN == 64;
    let shmask = (P::XLEN - 1) as u64;

    match dec.op {
        // --- integer computational ---
        LUI => {
            hart.set_x(rd, imm);
            hart.pc = next;
        }
        AUIPC => {
            hart.set_x(rd, hart.pc.wrapping_add(imm));
            hart.pc = next;
        }
        ADDI | MV | NOP => {
            hart.set_x(rd, hart.get_x(rs1).wrapping_add(imm));
            hart.pc = next;
        }
        SLTI => {
            hart.set_x(rd, ((hart.get_x(rs1) as i64) < imm as i64) as u64);
            hart.pc = next;
        }
        SLTIU | SEQZ => {
            hart.set_x(rd, (hart.get_x(rs1) < imm) as u64);
            hart.pc = next;
        }
        XORI | NOT => {
            hart.set_x(rd, hart.get_x(rs1) ^ imm);
            hart.pc = next;
        }
        ORI => {
            hart.set_x(rd, hart.get_x(rs1) | imm);
            hart.pc = next;
        }
        ANDI => {
            hart.set_x(rd, hart.get_x(rs1) & imm);
            hart.pc = next;
        }
        SLLI => {
            hart.set_x(rd, hart.get_x(rs1) << (imm & shmask));
            hart.pc = next;
        }
        SRLI => {
            let v = if rv64 {
                hart.get_x(rs1) >> (imm & 63)
            } else {
                ((hart.get_x(rs1) as u32) >> (imm & 31)) as u64
            };
            hart.set_x(rd, v);
            hart.pc = next;
        }
        SRAI => {
            let v = if rv64 {
                ((hart.get_x(rs1) as i64) >> (imm & 63)) as u64
            } else {
                ((hart.get_x(rs1) as i32) >> (imm & 31)) as u64
            };
            hart.set_x(rd, v);
            hart.pc = next;
        }
        ADD => {
            hart.set_x(rd, hart.get_x(rs1).wrapping_add(hart.get_x(rs2)));
            hart.pc = next;
        }
        SUB | NEG => {
            hart.set_x(rd, hart.get_x(rs1).wrapping_sub(hart.get_x(rs2)));
            hart.pc = next;
        }
        SLL => {
            hart.set_x(rd, hart.get_x(rs1) << (hart.get_x(rs2) & shmask));
            hart.pc = next;
        }
        SLT | SLTZ | SGTZ => {
            hart.set_x(rd, ((hart.get_x(rs1) as i64) < hart.get_x(rs2) as i64) as u64);
            hart.pc = next;
        }
        SLTU | SNEZ => {
            hart.set_x(rd, (hart.get_x(rs1) < hart.get_x(rs2)) as u64);
            hart.pc = next;
        }
        XOR => {
            hart.set_x(rd, hart.get_x(rs1) ^ hart.get_x(rs2));
            hart.pc = next;
        }
        SRL => {
            let sh = hart.get_x(rs2) & shmask;
            let v = if rv64 {
                hart.get_x(rs1) >> sh
            } else {
                ((hart.get_x(rs1) as u32) >> sh) as u64
            };
            hart.set_x(rd, v);
            hart.pc = next;
        }
        SRA => {
            let sh = hart.get_x(rs2) & shmask;
            let v = if rv64 {
                ((hart.get_x(rs1) as i64) >> sh) as u64
            } else {
                ((hart.get_x(rs1) as i32) >> sh) as u64
            };
            hart.set_x(rd, v);
            hart.pc = next;
        }
        OR => {
            hart.set_x(rd, hart.get_x(rs1) | hart.get_x(rs2));
            hart.pc = next;
        }
        AND => {
            hart.set_x(rd, hart.get_x(rs1) & hart.get_x(rs2));
            hart.pc = next;
        }

        // --- rv64 word forms ---
        ADDIW | SEXT_W => {
            hart.set_x(rd, (hart.get_x(rs1).wrapping_add(imm) as i32) as i64 as u64);
            hart.pc = next;
        }
        SLLIW => {
            hart.set_x(rd, (((hart.get_x(rs1) as u32) << (imm & 31)) as i32) as i64 as u64);
            hart.pc = next;
        }
        SRLIW => {
            hart.set_x(rd, (((hart.get_x(rs1) as u32) >> (imm & 31)) as i32) as i64 as u64);
            hart.pc = next;
        }
        SRAIW => {
            hart.set_x(rd, ((hart.get_x(rs1) as i32) >> (imm & 31)) as i64 as u64);
            hart.pc = next;
        }
        ADDW => {
            let v = (hart.get_x(rs1) as i32).wrapping_add(hart.get_x(rs2) as i32);
            hart.set_x(rd, v as i64 as u64);
            hart.pc = next;
        }
        SUBW | NEGW => {
            let v = (hart.get_x(rs1) as i32).wrapping_sub(hart.get_x(rs2) as i32);
            hart.set_x(rd, v as i64 as u64);
            hart.pc = next;
        }
        SLLW => {
            let sh = hart.get_x(rs2) & 31;
            hart.set_x(rd, (((hart.get_x(rs1) as u32) << sh) as i32) as i64 as u64);
            hart.pc = next;
        }
        SRLW => {
            let sh = hart.get_x(rs2) & 31;
            hart.set_x(rd, (((hart.get_x(rs1) as u32) >> sh) as i32) as i64 as u64);
            hart.pc = next;
        }
        SRAW => {
            let sh = hart.get_x(rs2) & 31;
            hart.set_x(rd, ((hart.get_x(rs1) as i32) >> sh) as i64 as u64);
            hart.pc = next;
        }

        // --- control transfer ---
        JAL | J => {
            let target = hart.pc.wrapping_add(imm);
            hart.set_x(rd, next);
            hart.set_pc(target);
        }
        JALR | JR | RET => {
            let target = hart.get_x(rs1).wrapping_add(imm) & !1;
            hart.set_x(rd, next);
            hart.set_pc(target);
        }
        BEQ | BEQZ => {
            let taken = hart.get_x(rs1) == hart.get_x(rs2);
            branch(hart, taken, imm, next);
        }
        BNE | BNEZ => {
            let taken = hart.get_x(rs1) != hart.get_x(rs2);
            branch(hart, taken, imm, next);
        }
        BLT | BLTZ | BGTZ => {
            let taken = (hart.get_x(rs1) as i64) < hart.get_x(rs2) as i64;
            branch(hart, taken, imm, next);
        }
        BGE | BGEZ | BLEZ => {
            let taken = (hart.get_x(rs1) as i64) >= hart.get_x(rs2) as i64;
            branch(hart, taken, imm, next);
        }
        BLTU => {
            let taken = hart.get_x(rs1) < hart.get_x(rs2);
            branch(hart, taken, imm, next);
        }
        BGEU => {
            let taken = hart.get_x(rs1) >= hart.get_x(rs2);
            branch(hart, taken, imm, next);
        }

        // --- loads and stores (little-endian, misalignment allowed) ---
        LB => {
            let v = hart.mem.read_u8(hart.ea(rs1, dec.imm)) as i8 as i64 as u64;
            hart.set_x(rd, v);
            hart.pc = next;
        }
        LH => {
            let v = hart.mem.read_u16(hart.ea(rs1, dec.imm)) as i16 as i64 as u64;
            hart.set_x(rd, v);
            hart.pc = next;
        }
        LW => {
            let v = hart.mem.read_u32(hart.ea(rs1, dec.imm)) as i32 as i64 as u64;
            hart.set_x(rd, v);
            hart.pc = next;
        }
        LBU => {
            let v = hart.mem.read_u8(hart.ea(rs1, dec.imm)) as u64;
            hart.set_x(rd, v);
            hart.pc = next;
        }
        LHU => {
            let v = hart.mem.read_u16(hart.ea(rs1, dec.imm)) as u64;
            hart.set_x(rd, v);
            hart.pc = next;
        }
        LWU => {
            let v = hart.mem.read_u32(hart.ea(rs1, dec.imm)) as u64;
            hart.set_x(rd, v);
            hart.pc = next;
        }
        LD => {
            let v = hart.mem.read_u64(hart.ea(rs1, dec.imm));
            hart.set_x(rd, v);
            hart.pc = next;
        }
        SB => {
            hart.mem.write_u8(hart.ea(rs1, dec.imm), hart.get_x(rs2) as u8);
            hart.pc = next;
        }
        SH => {
            hart.mem.write_u16(hart.ea(rs1, dec.imm), hart.get_x(rs2) as u16);
            hart.pc = next;
        }
        SW => {
            hart.mem.write_u32(hart.ea(rs1, dec.imm), hart.get_x(rs2) as u32);
            hart.pc = next;
        }
        SD => {
            hart.mem.write_u64(hart.ea(rs1, dec.imm), hart.get_x(rs2));
            hart.pc = next;
        }

        // --- fences: no-ops in a single-hart, strongly-ordered core ---
        FENCE | FENCE_I => {
            hart.pc = next;
        }

        // --- M extension ---
        MUL => {
            hart.set_x(rd, hart.get_x(rs1).wrapping_mul(hart.get_x(rs2)));
            hart.pc = next;
        }
        MULH => {
            let v = if rv64 {
                (((hart.get_x(rs1) as i64 as i128) * (hart.get_x(rs2) as i64 as i128)) >> 64)
                    as u64
            } else {
                (((hart.get_x(rs1) as i64) * (hart.get_x(rs2) as i64)) >> 32) as u64
            };
            hart.set_x(rd, v);
            hart.pc = next;
        }
        MULHSU => {
            let v = if rv64 {
                (((hart.get_x(rs1) as i64 as i128)
                    * (hart.get_x(rs2) as u128 as i128))
                    >> 64) as u64
            } else {
                (((hart.get_x(rs1) as i64) * (hart.get_x(rs2) as u32 as i64)) >> 32) as u64
            };
            hart.set_x(rd, v);
            hart.pc = next;
        }
        MULHU => {
            let v = if rv64 {
                (((hart.get_x(rs1) as u128) * (hart.get_x(rs2) as u128)) >> 64) as u64
            } else {
                (((hart.get_x(rs1) as u32 as u64) * (hart.get_x(rs2) as u32 as u64)) >> 32) as u64
            };
            hart.set_x(rd, v);
            hart.pc = next;
        }
        DIV => {
            let a = hart.get_x(rs1) as i64;
            let b = hart.get_x(rs2) as i64;
            let v = if b == 0 {
                u64::MAX
            } else if rv64 && a == i64::MIN && b == -1 {
                a as u64
            } else if !rv64 && a == i32::MIN as i64 && b == -1 {
                a as u64
            } else {
                a.wrapping_div(b) as u64
            };
            hart.set_x(rd, v);
            hart.pc = next;
        }
        DIVU => {
            let v = if rv64 {
                let b = hart.get_x(rs2);
                if b == 0 {
                    u64::MAX
                } else {
                    hart.get_x(rs1) / b
                }
            } else {
                let b = hart.get_x(rs2) as u32;
                if b == 0 {
                    u64::MAX
                } else {
                    ((hart.get_x(rs1) as u32) / b) as u64
                }
            };
            hart.set_x(rd, v);
            hart.pc = next;
        }
        REM => {
            let a = hart.get_x(rs1) as i64;
            let b = hart.get_x(rs2) as i64;
            let v = if b == 0 {
                a as u64
            } else if (rv64 && a == i64::MIN || !rv64 && a == i32::MIN as i64) && b == -1 {
                0
            } else {
                a.wrapping_rem(b) as u64
            };
            hart.set_x(rd, v);
            hart.pc = next;
        }
        REMU => {
            let v = if rv64 {
                let b = hart.get_x(rs2);
                if b == 0 {
                    hart.get_x(rs1)
                } else {
                    hart.get_x(rs1) % b
                }
            } else {
                let b = hart.get_x(rs2) as u32;
                if b == 0 {
                    hart.get_x(rs1)
                } else {
                    ((hart.get_x(rs1) as u32) % b) as u64
                }
            };
            hart.set_x(rd, v);
            hart.pc = next;
        }
        MULW => {
            let v = (hart.get_x(rs1) as i32).wrapping_mul(hart.get_x(rs2) as i32);
            hart.set_x(rd, v as i64 as u64);
            hart.pc = next;
        }
        DIVW => {
            let a = hart.get_x(rs1) as i32;
            let b = hart.get_x(rs2) as i32;
            let v = if b == 0 {
                -1i64 as u64
            } else if a == i32::MIN && b == -1 {
                a as i64 as u64
            } else {
                (a.wrapping_div(b)) as i64 as u64
            };
            hart.set_x(rd, v);
            hart.pc = next;
        }
        DIVUW => {
            let a = hart.get_x(rs1) as u32;
            let b = hart.get_x(rs2) as u32;
            let v = if b == 0 { -1i64 as u64 } else { ((a / b) as i32) as i64 as u64 };
            hart.set_x(rd, v);
            hart.pc = next;
        }
        REMW => {
            let a = hart.get_x(rs1) as i32;
            let b = hart.get_x(rs2) as i32;
            let v = if b == 0 {
                a as i64 as u64
            } else if a == i32::MIN && b == -1 {
                0
            } else {
                (a.wrapping_rem(b)) as i64 as u64
            };
            hart.set_x(rd, v);
            hart.pc = next;
        }
        REMUW => {
            let a = hart.get_x(rs1) as u32;
            let b = hart.get_x(rs2) as u32;
            let v = if b == 0 { (a as i32) as i64 as u64 } else { ((a % b) as i32) as i64 as u64 };
            hart.set_x(rd, v);
            hart.pc = next;
        }

        // --- A extension ---
        // The reservation is only bookkeeping in this single-hart core: sc
        // always succeeds but still writes rd per the ISA.
        LR_W => {
            let addr = hart.ea(rs1, 0);
            let v = hart.mem.read_u32(addr) as i32 as i64 as u64;
            hart.reservation = Some(addr);
            hart.set_x(rd, v);
            hart.pc = next;
        }
        SC_W => {
            let addr = hart.ea(rs1, 0);
            hart.mem.write_u32(addr, hart.get_x(rs2) as u32);
            hart.reservation = None;
            hart.set_x(rd, 0);
            hart.pc = next;
        }
        AMOSWAP_W | AMOADD_W | AMOXOR_W | AMOOR_W | AMOAND_W | AMOMIN_W | AMOMAX_W
        | AMOMINU_W | AMOMAXU_W => {
            let addr = hart.ea(rs1, 0);
            let old = hart.mem.read_u32(addr);
            let src = hart.get_x(rs2) as u32;
            let new = match dec.op {
                AMOSWAP_W => src,
                AMOADD_W => old.wrapping_add(src),
                AMOXOR_W => old ^ src,
                AMOOR_W => old | src,
                AMOAND_W => old & src,
                AMOMIN_W => (old as i32).min(src as i32) as u32,
                AMOMAX_W => (old as i32).max(src as i32) as u32,
                AMOMINU_W => old.min(src),
                AMOMAXU_W => old.max(src),
                _ => unreachable!(),
            };
            hart.mem.write_u32(addr, new);
            hart.set_x(rd, old as i32 as i64 as u64);
            hart.pc = next;
        }
        LR_D => {
            let addr = hart.ea(rs1, 0);
            let v = hart.mem.read_u64(addr);
            hart.reservation = Some(addr);
            hart.set_x(rd, v);
            hart.pc = next;
        }
        SC_D => {
            let addr = hart.ea(rs1, 0);
            hart.mem.write_u64(addr, hart.get_x(rs2));
            hart.reservation = None;
            hart.set_x(rd, 0);
            hart.pc = next;
        }
        AMOSWAP_D | AMOADD_D | AMOXOR_D | AMOOR_D | AMOAND_D | AMOMIN_D | AMOMAX_D
        | AMOMINU_D | AMOMAXU_D => {
            let addr = hart.ea(rs1, 0);
            let old = hart.mem.read_u64(addr);
            let src = hart.get_x(rs2);
            let new = match dec.op {
                AMOSWAP_D => src,
                AMOADD_D => old.wrapping_add(src),
                AMOXOR_D => old ^ src,
                AMOOR_D => old | src,
                AMOAND_D => old & src,
                AMOMIN_D => (old as i64).min(src as i64) as u64,
                AMOMAX_D => (old as i64).max(src as i64) as u64,
                AMOMINU_D => old.min(src),
                AMOMAXU_D => old.max(src),
                _ => unreachable!(),
            };
            hart.mem.write_u64(addr, new);
            hart.set_x(rd, old);
            hart.pc = next;
        }

        // --- CSR family ---
        CSRRW | CSRRS | CSRRC | CSRRWI | CSRRSI | CSRRCI => {
            return exec_csr(dec, hart, next);
        }

        // --- F/D loads and stores ---
        FLW => {
            let bits = hart.mem.read_u32(hart.ea(rs1, dec.imm));
            hart.set_f32(rd, bits);
            hart.pc = next;
        }
        FSW => {
            hart.mem.write_u32(hart.ea(rs1, dec.imm), hart.get_f32(rs2));
            hart.pc = next;
        }
        FLD => {
            let bits = hart.mem.read_u64(hart.ea(rs1, dec.imm));
            hart.set_f64(rd, bits);
            hart.pc = next;
        }
        FSD => {
            hart.mem.write_u64(hart.ea(rs1, dec.imm), hart.get_f64(rs2));
            hart.pc = next;
        }

        // --- F/D arithmetic, dispatched to the floating unit ---
        FADD_S | FSUB_S | FMUL_S | FDIV_S | FSQRT_S | FMIN_S | FMAX_S | FSGNJ_S | FSGNJN_S
        | FSGNJX_S | FMADD_S | FMSUB_S | FNMSUB_S | FNMADD_S => {
            let rm = resolve_rm(hart, dec.rm);
            let op = fp_op_tag(dec.op);
            let (bits, flags) = fpu::f32_op(
                op,
                hart.get_f32(rs1),
                hart.get_f32(rs2),
                hart.get_f32(dec.rs3),
                rm,
            );
            hart.set_f32(rd, bits);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FADD_D | FSUB_D | FMUL_D | FDIV_D | FSQRT_D | FMIN_D | FMAX_D | FSGNJ_D | FSGNJN_D
        | FSGNJX_D | FMADD_D | FMSUB_D | FNMSUB_D | FNMADD_D => {
            let rm = resolve_rm(hart, dec.rm);
            let op = fp_op_tag(dec.op);
            let (bits, flags) = fpu::f64_op(
                op,
                hart.get_f64(rs1),
                hart.get_f64(rs2),
                hart.get_f64(dec.rs3),
                rm,
            );
            hart.set_f64(rd, bits);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FEQ_S | FLT_S | FLE_S => {
            let cmp = match dec.op {
                FEQ_S => FpCmp::Eq,
                FLT_S => FpCmp::Lt,
                _ => FpCmp::Le,
            };
            let (v, flags) = fpu::f32_cmp(cmp, hart.get_f32(rs1), hart.get_f32(rs2));
            hart.set_x(rd, v as u64);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FEQ_D | FLT_D | FLE_D => {
            let cmp = match dec.op {
                FEQ_D => FpCmp::Eq,
                FLT_D => FpCmp::Lt,
                _ => FpCmp::Le,
            };
            let (v, flags) = fpu::f64_cmp(cmp, hart.get_f64(rs1), hart.get_f64(rs2));
            hart.set_x(rd, v as u64);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCLASS_S => {
            let v = fpu::f32_class(hart.get_f32(rs1));
            hart.set_x(rd, v);
            hart.pc = next;
        }
        FCLASS_D => {
            let v = fpu::f64_class(hart.get_f64(rs1));
            hart.set_x(rd, v);
            hart.pc = next;
        }

        // --- F/D conversions and moves ---
        FCVT_W_S => {
            let (v, flags) = fpu::f32_to_i32(hart.get_f32(rs1), resolve_rm(hart, dec.rm));
            hart.set_x(rd, v as i64 as u64);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_WU_S => {
            let (v, flags) = fpu::f32_to_u32(hart.get_f32(rs1), resolve_rm(hart, dec.rm));
            hart.set_x(rd, v as i32 as i64 as u64);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_L_S => {
            let (v, flags) = fpu::f32_to_i64(hart.get_f32(rs1), resolve_rm(hart, dec.rm));
            hart.set_x(rd, v as u64);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_LU_S => {
            let (v, flags) = fpu::f32_to_u64(hart.get_f32(rs1), resolve_rm(hart, dec.rm));
            hart.set_x(rd, v);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_W_D => {
            let (v, flags) = fpu::f64_to_i32(hart.get_f64(rs1), resolve_rm(hart, dec.rm));
            hart.set_x(rd, v as i64 as u64);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_WU_D => {
            let (v, flags) = fpu::f64_to_u32(hart.get_f64(rs1), resolve_rm(hart, dec.rm));
            hart.set_x(rd, v as i32 as i64 as u64);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_L_D => {
            let (v, flags) = fpu::f64_to_i64(hart.get_f64(rs1), resolve_rm(hart, dec.rm));
            hart.set_x(rd, v as u64);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_LU_D => {
            let (v, flags) = fpu::f64_to_u64(hart.get_f64(rs1), resolve_rm(hart, dec.rm));
            hart.set_x(rd, v);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_S_W => {
            let (bits, flags) = fpu::i32_to_f32(hart.get_x(rs1) as i32);
            hart.set_f32(rd, bits);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_S_WU => {
            let (bits, flags) = fpu::u32_to_f32(hart.get_x(rs1) as u32);
            hart.set_f32(rd, bits);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_S_L => {
            let (bits, flags) = fpu::i64_to_f32(hart.get_x(rs1) as i64);
            hart.set_f32(rd, bits);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_S_LU => {
            let (bits, flags) = fpu::u64_to_f32(hart.get_x(rs1));
            hart.set_f32(rd, bits);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_D_W => {
            let (bits, flags) = fpu::i32_to_f64(hart.get_x(rs1) as i32);
            hart.set_f64(rd, bits);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_D_WU => {
            let (bits, flags) = fpu::u32_to_f64(hart.get_x(rs1) as u32);
            hart.set_f64(rd, bits);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_D_L => {
            let (bits, flags) = fpu::i64_to_f64(hart.get_x(rs1) as i64);
            hart.set_f64(rd, bits);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_D_LU => {
            let (bits, flags) = fpu::u64_to_f64(hart.get_x(rs1));
            hart.set_f64(rd, bits);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_S_D => {
            let (bits, flags) = fpu::f64_to_f32(hart.get_f64(rs1), resolve_rm(hart, dec.rm));
            hart.set_f32(rd, bits);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FCVT_D_S => {
            let (bits, flags) = fpu::f32_to_f64(hart.get_f32(rs1));
            hart.set_f64(rd, bits);
            hart.raise_fflags(flags);
            hart.pc = next;
        }
        FMV_X_S => {
            hart.set_x(rd, hart.get_f32(rs1) as i32 as i64 as u64);
            hart.pc = next;
        }
        FMV_S_X => {
            hart.set_f32(rd, hart.get_x(rs1) as u32);
            hart.pc = next;
        }
        FMV_X_D => {
            hart.set_x(rd, hart.get_f64(rs1));
            hart.pc = next;
        }
        FMV_D_X => {
            hart.set_f64(rd, hart.get_x(rs1));
            hart.pc = next;
        }

        // ecall and ebreak fall through to the stepper; illegal and any
        // compressed opcode left unexpanded do the same.
        _ => return false,
    }
    true
}

#[inline]
fn branch<P: Isa>(hart: &mut Hart<P>, taken: bool, imm: u64, next: u64) {
    if taken {
        let target = hart.pc.wrapping_add(imm);
        hart.set_pc(target);
    } else {
        hart.pc = next;
    }
}

/// Dynamic rounding mode resolution: 0b111 selects frm from fcsr.
#[inline]
fn resolve_rm<P: Isa>(hart: &Hart<P>, rm: u8) -> u8 {
    if rm == 0b111 {
        hart.frm()
    } else {
        rm
    }
}

fn fp_op_tag(op: Op) -> FpOp {
    match op {
        Op::FADD_S | Op::FADD_D => FpOp::Add,
        Op::FSUB_S | Op::FSUB_D => FpOp::Sub,
        Op::FMUL_S | Op::FMUL_D => FpOp::Mul,
        Op::FDIV_S | Op::FDIV_D => FpOp::Div,
        Op::FSQRT_S | Op::FSQRT_D => FpOp::Sqrt,
        Op::FMIN_S | Op::FMIN_D => FpOp::Min,
        Op::FMAX_S | Op::FMAX_D => FpOp::Max,
        Op::FSGNJ_S | Op::FSGNJ_D => FpOp::Sgnj,
        Op::FSGNJN_S | Op::FSGNJN_D => FpOp::Sgnjn,
        Op::FSGNJX_S | Op::FSGNJX_D => FpOp::Sgnjx,
        Op::FMADD_S | Op::FMADD_D => FpOp::Madd,
        Op::FMSUB_S | Op::FMSUB_D => FpOp::Msub,
        Op::FNMSUB_S | Op::FNMSUB_D => FpOp::Nmsub,
        Op::FNMADD_S | Op::FNMADD_D => FpOp::Nmadd,
        _ => unreachable!("not a floating arithmetic opcode"),
    }
}

/// CSR read-modify-write. Returns `false` (illegal) for unknown CSRs and
/// writes to the read-only counters.
fn exec_csr<P: Isa>(dec: &DecodedInst, hart: &mut Hart<P>, next: u64) -> bool {
    use Op::*;

    let num = dec.imm;
    let old = match num {
        csr::FFLAGS => (hart.fcsr & 0x1f) as u64,
        csr::FRM => ((hart.fcsr >> 5) & 0x7) as u64,
        csr::FCSR => (hart.fcsr & 0xff) as u64,
        csr::CYCLE | csr::TIME | csr::INSTRET => hart.instret,
        csr::CYCLEH | csr::TIMEH | csr::INSTRETH if P::XLEN == 32 => hart.instret >> 32,
        _ => return false,
    };

    // rs1 carries the source register for the register forms and the
    // zero-extended 5-bit value for the immediate forms.
    let operand = match dec.op {
        CSRRW | CSRRS | CSRRC => hart.get_x(dec.rs1),
        _ => dec.rs1 as u64,
    };

    let write = match dec.op {
        CSRRW | CSRRWI => Some(operand),
        CSRRS | CSRRSI if dec.rs1 != 0 => Some(old | operand),
        CSRRC | CSRRCI if dec.rs1 != 0 => Some(old & !operand),
        _ => None,
    };

    if let Some(value) = write {
        match num {
            csr::FFLAGS => hart.fcsr = (hart.fcsr & !0x1f) | (value as u32 & 0x1f),
            csr::FRM => hart.fcsr = (hart.fcsr & !0xe0) | ((value as u32 & 0x7) << 5),
            csr::FCSR => hart.fcsr = value as u32 & 0xff,
            // user counters are read-only
            _ => return false,
        }
    }

    hart.set_x(dec.rd, old);
    hart.pc = next;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rvproxy_isa::{decode_inst, decompress_inst, Rv32Imafdc, Rv64Imafdc};

    fn run<P: Isa>(hart: &mut Hart<P>, word: u64) -> bool {
        let mut dec = DecodedInst::default();
        decode_inst::<P>(&mut dec, word);
        decompress_inst::<P>(&mut dec);
        let len = if word & 0b11 == 0b11 { 4 } else { 2 };
        exec_inst(&dec, hart, len)
    }

    #[test]
    fn addi_writes_and_advances() {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.pc = 0x1000;
        assert!(run(&mut hart, 0x00500093)); // addi x1, x0, 5
        assert_eq!(hart.get_x(1), 5);
        assert_eq!(hart.pc, 0x1004);
    }

    #[test]
    fn writes_to_x0_are_discarded() {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        assert!(run(&mut hart, 0x00500013)); // addi x0, x0, 5
        assert_eq!(hart.get_x(0), 0);
    }

    #[test]
    fn branch_taken_and_not_taken() {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.pc = 0x1000;
        assert!(run(&mut hart, 0x00000463)); // beq x0, x0, +8
        assert_eq!(hart.pc, 0x1008);

        hart.pc = 0x1000;
        hart.set_x(1, 1);
        assert!(run(&mut hart, 0x00008463)); // beq x1, x0, +8 (not taken)
        assert_eq!(hart.pc, 0x1004);
    }

    #[test]
    fn jalr_masks_target_low_bit() {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.pc = 0x1000;
        hart.set_x(1, 0x2001);
        assert!(run(&mut hart, 0x00008067)); // jalr x0, 0(x1)
        assert_eq!(hart.pc, 0x2000);
    }

    #[test]
    fn rv32_add_wraps_at_32_bits() {
        let mut hart: Hart<Rv32Imafdc> = Hart::new();
        hart.set_x(1, 0xffff_ffff);
        hart.set_x(2, 1);
        assert!(run(&mut hart, 0x002081b3)); // add x3, x1, x2
        assert_eq!(hart.get_x(3), 0);
    }

    #[test]
    fn rv64_addw_sign_extends() {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.set_x(1, 0x7fff_ffff);
        hart.set_x(2, 1);
        assert!(run(&mut hart, 0x002081bb)); // addw x3, x1, x2
        assert_eq!(hart.get_x(3), 0xffff_ffff_8000_0000);
    }

    #[test]
    fn shift_amounts_are_masked() {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.set_x(1, 1);
        hart.set_x(2, 64); // masked to 0
        assert!(run(&mut hart, 0x002091b3)); // sll x3, x1, x2
        assert_eq!(hart.get_x(3), 1);
    }

    #[test]
    fn division_edge_cases() {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.set_x(1, 7);
        hart.set_x(2, 0);
        assert!(run(&mut hart, 0x0220c1b3)); // div x3, x1, x2
        assert_eq!(hart.get_x(3), u64::MAX);
        assert!(run(&mut hart, 0x0220e1b3)); // rem x3, x1, x2
        assert_eq!(hart.get_x(3), 7);

        hart.set_x(1, i64::MIN as u64);
        hart.set_x(2, -1i64 as u64);
        assert!(run(&mut hart, 0x0220c1b3)); // div x3, x1, x2 (overflow)
        assert_eq!(hart.get_x(3), i64::MIN as u64);
    }

    #[test]
    fn loads_are_little_endian() {
        let data: [u8; 4] = [0x78, 0x56, 0x34, 0x12];
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.set_x(3, data.as_ptr() as u64);
        assert!(run(&mut hart, 0x0001a103)); // lw x2, 0(x3)
        assert_eq!(hart.get_x(2), 0x12345678);
    }

    #[test]
    fn signed_load_sign_extends() {
        let data: [u8; 4] = [0xff, 0xff, 0xff, 0xff];
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.set_x(3, data.as_ptr() as u64);
        assert!(run(&mut hart, 0x0001a103)); // lw x2, 0(x3)
        assert_eq!(hart.get_x(2), u64::MAX);
        assert!(run(&mut hart, 0x0001e103)); // lwu x2, 0(x3)
        assert_eq!(hart.get_x(2), 0xffff_ffff);
    }

    #[test]
    fn store_then_load_round_trip() {
        let mut buf = [0u8; 8];
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.set_x(3, buf.as_mut_ptr() as u64);
        hart.set_x(2, 0xdead_beef_cafe_f00d);
        assert!(run(&mut hart, 0x0021b023)); // sd x2, 0(x3)
        assert!(run(&mut hart, 0x0001b083)); // ld x1, 0(x3)
        assert_eq!(hart.get_x(1), 0xdead_beef_cafe_f00d);
        assert_eq!(buf[0], 0x0d);
    }

    #[test]
    fn amoadd_read_modify_write() {
        let mut cell = 5u32.to_le_bytes();
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.set_x(5, cell.as_mut_ptr() as u64);
        hart.set_x(6, 3);
        assert!(run(&mut hart, 0x0062a3af)); // amoadd.w x7, x6, (x5)
        assert_eq!(hart.get_x(7), 5);
        assert_eq!(u32::from_le_bytes(cell), 8);
    }

    #[test]
    fn sc_reports_success() {
        let mut cell = [0u8; 4];
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.set_x(5, cell.as_mut_ptr() as u64);
        hart.set_x(6, 9);
        assert!(run(&mut hart, 0x1002a3af)); // lr.w x7, (x5)
        assert_eq!(hart.reservation, Some(hart.get_x(5)));
        assert!(run(&mut hart, 0x1862a3af)); // sc.w x7, x6, (x5)
        assert_eq!(hart.get_x(7), 0);
        assert_eq!(u32::from_le_bytes(cell), 9);
        assert_eq!(hart.reservation, None);
    }

    #[test]
    fn ecall_falls_through() {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        assert!(!run(&mut hart, 0x00000073)); // ecall
        assert!(!run(&mut hart, 0x00100073)); // ebreak
        assert!(!run(&mut hart, 0)); // illegal
    }

    #[test]
    fn compressed_addi_executes_as_addi() {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.pc = 0x1000;
        for _ in 0..10 {
            assert!(run(&mut hart, 0x0085)); // c.addi x1, 1
        }
        assert_eq!(hart.get_x(1), 10);
        assert_eq!(hart.pc, 0x1000 + 20);
    }

    #[test]
    fn float_add_via_unit() {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.set_f32(1, 1.5f32.to_bits());
        hart.set_f32(2, 2.5f32.to_bits());
        // fadd.s f3, f1, f2, rne
        assert!(run(&mut hart, 0x002081d3));
        assert_eq!(f32::from_bits(hart.get_f32(3)), 4.0);
    }

    #[test]
    fn fcsr_round_trip_via_csr_ops() {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.set_x(1, 0b010); // frm = rdn
        // csrrw x2, frm, x1
        assert!(run(&mut hart, 0x00209173));
        assert_eq!(hart.frm(), 0b010);
        assert_eq!(hart.get_x(2), 0);
        // unknown csr is illegal
        assert!(!run(&mut hart, 0x7c009173)); // csrrw x2, 0x7c0, x1
    }

    #[test]
    fn csr_counter_reads() {
        let mut hart: Hart<Rv64Imafdc> = Hart::new();
        hart.instret = 42;
        // csrrs x5, instret, x0 (read-only access, no write)
        assert!(run(&mut hart, 0xc02022f3));
        assert_eq!(hart.get_x(5), 42);
    }
}
