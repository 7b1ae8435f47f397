//! In-place expansion of compressed opcodes.
//!
//! Works on an already decoded instruction: if the opcode has an expansion
//! for the profile's xlen, swap in the 32-bit opcode and refresh the codec.
//! Operand fields are untouched because the decoder already materialized
//! them in expanded form; `inst` keeps the original 16-bit pattern for
//! logging.

use crate::inst::DecodedInst;
use crate::opcode::Op;
use crate::profile::Isa;

/// Expand `dec.op` if it is a compressed opcode; otherwise leave `dec`
/// unchanged.
pub fn decompress_inst<P: Isa>(dec: &mut DecodedInst) {
    let expanded = if P::XLEN == 64 {
        dec.op.decompress_rv64()
    } else {
        dec.op.decompress_rv32()
    };
    if expanded != Op::ILLEGAL {
        dec.op = expanded;
        dec.codec = expanded.codec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_inst;
    use crate::profile::{Rv32Imafdc, Rv64Imafdc};

    #[test]
    fn c_addi_expands_to_addi() {
        let mut dec = DecodedInst::default();
        decode_inst::<Rv64Imafdc>(&mut dec, 0x0085); // c.addi x1, 1
        decompress_inst::<Rv64Imafdc>(&mut dec);
        assert_eq!(dec.op, Op::ADDI);
        assert_eq!(dec.codec, Op::ADDI.codec());
        assert_eq!(dec.rd, 1);
        assert_eq!(dec.rs1, 1);
        assert_eq!(dec.imm, 1);
        // the raw compressed pattern survives for logging
        assert_eq!(dec.inst, 0x0085);
    }

    #[test]
    fn c_jal_is_rv32_only() {
        let mut dec = DecodedInst::default();
        decode_inst::<Rv32Imafdc>(&mut dec, 0x2001); // c.jal +0
        assert_eq!(dec.op, Op::C_JAL);
        decompress_inst::<Rv32Imafdc>(&mut dec);
        assert_eq!(dec.op, Op::JAL);
        assert_eq!(dec.rd, 1);
    }

    #[test]
    fn non_compressed_unchanged() {
        let mut dec = DecodedInst::default();
        decode_inst::<Rv64Imafdc>(&mut dec, 0x00500093);
        let before = dec;
        decompress_inst::<Rv64Imafdc>(&mut dec);
        assert_eq!(dec, before);
    }
}
