//! Decoder integration tests: totality, determinism, compressed expansion
//! and the encode round trip, swept over deterministic random words.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rvproxy_isa::{
    decode_inst, decompress_inst, encode_inst, inst_length, DecodedInst, Isa, Op, Rv32Imafdc,
    Rv64Imafdc,
};

fn decode<P: Isa>(word: u64) -> DecodedInst {
    let mut dec = DecodedInst::default();
    decode_inst::<P>(&mut dec, word);
    dec
}

#[test]
fn decode_is_total_and_deterministic() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    for _ in 0..200_000 {
        let word: u64 = rng.gen::<u32>() as u64;
        let a = decode::<Rv64Imafdc>(word);
        let b = decode::<Rv64Imafdc>(word);
        assert_eq!(a, b);
        let c = decode::<Rv32Imafdc>(word);
        let d = decode::<Rv32Imafdc>(word);
        assert_eq!(c, d);
    }
}

#[test]
fn length_agrees_with_class() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x1e57);
    for _ in 0..100_000 {
        let word: u64 = rng.gen();
        let len = inst_length(word);
        assert!(matches!(len, 0 | 2 | 4 | 6 | 8));
        match word & 0b11 {
            0b11 => assert_ne!(len, 2),
            _ => assert_eq!(len, 2),
        }
    }
}

#[test]
fn encode_round_trips_every_decodable_32bit_word() {
    // Decode then re-encode must reproduce the raw word bit for bit for all
    // non-compressed encodings the decoder accepts.
    let mut rng = ChaCha8Rng::seed_from_u64(0xb17);
    let mut checked = 0u32;
    for _ in 0..500_000 {
        let word: u32 = rng.gen::<u32>() | 0b11; // force the 32-bit class
        if (word & 0b11100) == 0b11100 {
            continue;
        }
        let dec = decode::<Rv64Imafdc>(word as u64);
        if dec.op == Op::ILLEGAL {
            continue;
        }
        let back = encode_inst(&dec).expect("decoded 32-bit forms re-encode");
        assert_eq!(back, word as u64, "round trip of {word:#010x} ({:?})", dec.op);
        checked += 1;
    }
    assert!(checked > 1_000, "sweep should hit plenty of legal encodings");
}

#[test]
fn compressed_expansion_matches_32bit_equivalent() {
    // c.addi x1, 1 expands to addi x1, x1, 1
    let mut dec = decode::<Rv64Imafdc>(0x0085);
    decompress_inst::<Rv64Imafdc>(&mut dec);
    let expanded = decode::<Rv64Imafdc>(0x00108093); // addi x1, x1, 1
    assert_eq!(dec.op, expanded.op);
    assert_eq!(dec.rd, expanded.rd);
    assert_eq!(dec.rs1, expanded.rs1);
    assert_eq!(dec.imm, expanded.imm);

    // c.lwsp x5, 12(sp) expands to lw x5, 12(x2)
    let mut dec = decode::<Rv64Imafdc>(0x42b2);
    decompress_inst::<Rv64Imafdc>(&mut dec);
    assert_eq!(dec.op, Op::LW);
    assert_eq!(dec.rd, 5);
    assert_eq!(dec.rs1, 2);
    assert_eq!(dec.imm, 12);

    // c.j +16 expands to jal x0, 16
    let mut dec = decode::<Rv64Imafdc>(0xa811);
    decompress_inst::<Rv64Imafdc>(&mut dec);
    assert_eq!(dec.op, Op::JAL);
    assert_eq!(dec.rd, 0);
    assert_eq!(dec.imm, 16);
}

#[test]
fn every_compressed_decode_expands_or_stays_put() {
    // Sweep all 16-bit patterns: whenever the decoder produces a compressed
    // opcode, decompression must yield a non-compressed opcode with its
    // codec refreshed, and the raw halfword must survive in `inst`.
    for word in 1u64..0x10000 {
        if word & 0b11 == 0b11 {
            continue;
        }
        let mut dec = decode::<Rv64Imafdc>(word);
        if dec.op == Op::ILLEGAL {
            continue;
        }
        assert!(dec.op.is_compressed());
        decompress_inst::<Rv64Imafdc>(&mut dec);
        assert!(!dec.op.is_compressed(), "no rv64 expansion for {word:#06x}");
        assert_eq!(dec.codec, dec.op.codec());
        assert_eq!(dec.inst, word);
    }
}
