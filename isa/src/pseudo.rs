//! Pseudoinstruction recognition.
//!
//! A decoded (and decompressed) instruction is matched against an ordered
//! list of candidate rewrites for its opcode; each candidate carries a
//! constraint list over the operand fields. The first candidate whose whole
//! list holds rewrites the opcode and refreshes the codec. Operand fields
//! are untouched, so a recognized pseudo executes exactly like its
//! canonical form; recognition is a logging affordance only and callers may
//! skip it.

use crate::inst::DecodedInst;
use crate::opcode::Op;

/// Operand-field predicate used by the rewrite tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    RdEq0,
    Rs1Eq0,
    Rs1EqRa,
    Rs2Eq0,
    ImmEq0,
    ImmEq1,
    ImmEqM1,
}

impl Constraint {
    fn holds(self, dec: &DecodedInst) -> bool {
        match self {
            Constraint::RdEq0 => dec.rd == 0,
            Constraint::Rs1Eq0 => dec.rs1 == 0,
            Constraint::Rs1EqRa => dec.rs1 == 1,
            Constraint::Rs2Eq0 => dec.rs2 == 0,
            Constraint::ImmEq0 => dec.imm == 0,
            Constraint::ImmEq1 => dec.imm == 1,
            Constraint::ImmEqM1 => dec.imm == -1,
        }
    }
}

/// Candidate rewrites for an opcode, in match order.
fn rules(op: Op) -> &'static [(Op, &'static [Constraint])] {
    use Constraint::*;
    match op {
        Op::ADDI => &[
            (Op::NOP, &[RdEq0, Rs1Eq0, ImmEq0]),
            (Op::MV, &[ImmEq0]),
        ],
        Op::XORI => &[(Op::NOT, &[ImmEqM1])],
        Op::SUB => &[(Op::NEG, &[Rs1Eq0])],
        Op::SUBW => &[(Op::NEGW, &[Rs1Eq0])],
        Op::ADDIW => &[(Op::SEXT_W, &[ImmEq0])],
        Op::SLTIU => &[(Op::SEQZ, &[ImmEq1])],
        Op::SLTU => &[(Op::SNEZ, &[Rs1Eq0])],
        Op::SLT => &[
            (Op::SLTZ, &[Rs2Eq0]),
            (Op::SGTZ, &[Rs1Eq0]),
        ],
        Op::BEQ => &[(Op::BEQZ, &[Rs2Eq0])],
        Op::BNE => &[(Op::BNEZ, &[Rs2Eq0])],
        Op::BGE => &[
            (Op::BLEZ, &[Rs1Eq0]),
            (Op::BGEZ, &[Rs2Eq0]),
        ],
        Op::BLT => &[
            (Op::BGTZ, &[Rs1Eq0]),
            (Op::BLTZ, &[Rs2Eq0]),
        ],
        Op::JAL => &[(Op::J, &[RdEq0])],
        Op::JALR => &[
            (Op::RET, &[RdEq0, Rs1EqRa, ImmEq0]),
            (Op::JR, &[RdEq0, ImmEq0]),
        ],
        _ => &[],
    }
}

/// Rewrite `dec` to a pseudo form when a constraint set matches. Returns
/// whether a rewrite happened.
pub fn recognize_pseudo(dec: &mut DecodedInst) -> bool {
    for (pseudo, constraints) in rules(dec.op) {
        if constraints.iter().all(|c| c.holds(dec)) {
            dec.op = *pseudo;
            dec.codec = pseudo.codec();
            return true;
        }
    }
    false
}
