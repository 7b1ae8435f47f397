//! Operand-encoding tags.
//!
//! The codec of an instruction is determined entirely by its opcode (see
//! [`Op::codec`](crate::Op::codec)) and selects which operand fields of a
//! [`DecodedInst`](crate::DecodedInst) are meaningful and how its immediate
//! was assembled. Compressed codecs materialize the operands of the expanded
//! 32-bit form (implicit registers included), so decompression only has to
//! swap the opcode.

/// Operand-encoding tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// No operands (ecall, ebreak, fence.i).
    None,
    /// rd, 20-bit upper immediate already shifted into position (lui, auipc).
    U,
    /// rd, 21-bit pc-relative jump offset (jal).
    Uj,
    /// rd, rs1, 12-bit signed immediate (loads, jalr, addi family).
    I,
    /// rd, rs1, 5-bit shift amount (slliw, srliw, sraiw).
    ISh5,
    /// rd, rs1, 6-bit shift amount (slli, srli, srai).
    ISh6,
    /// rd, rs1, CSR number in the immediate (csrrw, csrrs, csrrc).
    ICsr,
    /// rd, zero-extended 5-bit value in rs1, CSR number in the immediate
    /// (csrrwi, csrrsi, csrrci).
    ICsrI,
    /// rs1, rs2, 12-bit signed store offset.
    S,
    /// rs1, rs2, 13-bit signed branch offset.
    Sb,
    /// rd, rs1, rs2.
    R,
    /// rd, rs1 (fmv.x.s, fclass, fmv.s.x and friends).
    R2,
    /// rd, rs1, rounding mode; rs2 is part of the opcode (fsqrt, fcvt).
    R2M,
    /// rd, rs1, rs2, rounding mode (fadd, fsub, fmul, fdiv).
    RM,
    /// rd, rs1, rs2, rs3, rounding mode (fused multiply-add family).
    R4M,
    /// rd, rs1, rs2, aq, rl (atomics; rs2 reads as zero for lr).
    RA,
    /// pred and succ ordering masks (fence).
    IFence,

    // Compressed codecs. Operand fields hold the expanded form.
    /// c.addi4spn: rd', rs1 = sp, scaled non-zero immediate.
    Ciw,
    /// c.lw / c.flw: rd', rs1', word-scaled offset.
    ClW,
    /// c.ld / c.fld: rd', rs1', doubleword-scaled offset.
    ClD,
    /// c.sw / c.fsw: rs1', rs2', word-scaled offset.
    CsW,
    /// c.sd / c.fsd: rs1', rs2', doubleword-scaled offset.
    CsD,
    /// c.addi / c.addiw / c.nop: rd, rs1 = rd, 6-bit signed immediate.
    Ci,
    /// c.li: rd, rs1 = x0, 6-bit signed immediate.
    CiLi,
    /// c.lui: rd, immediate shifted into the upper-immediate position.
    CiLui,
    /// c.addi16sp: rd = rs1 = sp, 16-byte-scaled immediate.
    Ci16sp,
    /// c.slli: rd, rs1 = rd, 6-bit shift amount.
    CiSh6,
    /// c.srli / c.srai: rd' = rs1', 6-bit shift amount.
    CbSh6,
    /// c.andi: rd' = rs1', 6-bit signed immediate.
    CbImm,
    /// c.lwsp / c.flwsp: rd, rs1 = sp, word-scaled offset.
    CiLwSp,
    /// c.ldsp / c.fldsp: rd, rs1 = sp, doubleword-scaled offset.
    CiLdSp,
    /// c.swsp / c.fswsp: rs1 = sp, rs2, word-scaled offset.
    CssSwSp,
    /// c.sdsp / c.fsdsp: rs1 = sp, rs2, doubleword-scaled offset.
    CssSdSp,
    /// c.j: rd = x0, 12-bit jump offset.
    Cj,
    /// c.jal: rd = ra, 12-bit jump offset.
    CjJal,
    /// c.beqz / c.bnez: rs1', rs2 = x0, 9-bit branch offset.
    Cb,
    /// c.add: rd, rs1 = rd, rs2.
    Cr,
    /// c.mv: rd, rs1 = x0, rs2.
    CrMv,
    /// c.jr: rd = x0, rs1, zero immediate.
    CrJr,
    /// c.jalr: rd = ra, rs1, zero immediate.
    CrJalr,
    /// c.sub / c.xor / c.or / c.and / c.subw / c.addw: rd' = rs1', rs2'.
    Ca,
    /// c.ebreak.
    CNone,

    // Pseudoinstruction codecs, used only for formatting.
    /// rd, rs1 (mv, not, sext.w, seqz).
    PRdRs1,
    /// rd, rs2 (neg, negw, snez, sgtz).
    PRdRs2,
    /// rs1, branch offset (beqz, bnez, bgez, bltz).
    PRs1Off,
    /// rs2, branch offset (blez, bgtz).
    PRs2Off,
    /// jump offset only (j).
    POff,
    /// rs1 only (jr).
    PRs1,
}

impl Codec {
    /// True for the codecs produced from 16-bit encodings.
    pub fn is_compressed(self) -> bool {
        matches!(
            self,
            Codec::Ciw
                | Codec::ClW
                | Codec::ClD
                | Codec::CsW
                | Codec::CsD
                | Codec::Ci
                | Codec::CiLi
                | Codec::CiLui
                | Codec::Ci16sp
                | Codec::CiSh6
                | Codec::CbSh6
                | Codec::CbImm
                | Codec::CiLwSp
                | Codec::CiLdSp
                | Codec::CssSwSp
                | Codec::CssSdSp
                | Codec::Cj
                | Codec::CjJal
                | Codec::Cb
                | Codec::Cr
                | Codec::CrMv
                | Codec::CrJr
                | Codec::CrJalr
                | Codec::Ca
                | Codec::CNone
        )
    }
}
