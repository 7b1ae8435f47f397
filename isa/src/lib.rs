//! RISC-V instruction set support.
//!
//! Decoding of the RV32/RV64 I, M, A, F, D and C extensions into a flat
//! [`DecodedInst`] form, expansion of compressed encodings, recognition of
//! pseudoinstructions, re-encoding and a minimal disassembler. Everything is
//! parameterized by a zero-sized [`Isa`] profile so users monomorphize per
//! processor variant.

pub mod codec;
pub mod decode;
pub mod decompress;
pub mod disasm;
pub mod encode;
pub mod inst;
pub mod opcode;
pub mod profile;
pub mod pseudo;

pub use codec::Codec;
pub use decode::{decode_inst, inst_length};
pub use decompress::decompress_inst;
pub use disasm::{disasm, FREG_NAMES, IREG_NAMES};
pub use encode::{encode_inst, EncodeError};
pub use inst::DecodedInst;
pub use opcode::Op;
pub use profile::{
    Isa, IsaExt, ParseIsaError, Rv32Ima, Rv32Imac, Rv32Imafd, Rv32Imafdc, Rv64Ima, Rv64Imac,
    Rv64Imafd, Rv64Imafdc,
};
pub use pseudo::recognize_pseudo;
