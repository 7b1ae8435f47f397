//! End-to-end scenarios: guest code in host buffers driven through the
//! full fetch → decode → cache → execute → proxy pipeline.

use rvproxy_emu::hart::reg;
use rvproxy_emu::{exec_inst, proxy_syscall, sysno, Hart, Runner, StepStatus, SyscallOutcome};
use rvproxy_isa::{decode_inst, decompress_inst, recognize_pseudo, DecodedInst, Isa, Rv64Imafdc};

fn code_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn runner_at(code: &[u8]) -> Runner<Rv64Imafdc> {
    let mut hart: Hart<Rv64Imafdc> = Hart::new();
    hart.pc = code.as_ptr() as u64;
    Runner::new(hart)
}

#[test]
fn guest_exit_code_is_surfaced() {
    // addi a0, x0, 5; addi a7, x0, 93; ecall
    let code = code_bytes(&[0x00500513, 0x05d00893, 0x00000073]);
    let mut runner = runner_at(&code);
    assert_eq!(runner.run(), StepStatus::Exit(5));
    assert_eq!(runner.hart.instret, 2);
}

#[test]
fn compressed_addi_retires_ten_times() {
    let mut code = Vec::new();
    for _ in 0..10 {
        code.extend_from_slice(&0x0085u16.to_le_bytes()); // c.addi x1, 1
    }
    let base = code.as_ptr() as u64;
    let mut hart: Hart<Rv64Imafdc> = Hart::new();
    hart.pc = base;
    let mut runner = Runner::new(hart);
    assert_eq!(runner.step(10), StepStatus::Completed);
    assert_eq!(runner.hart.get_x(1), 10);
    assert_eq!(runner.hart.pc, base + 20);
}

#[test]
fn load_word_little_endian() {
    let data: [u8; 4] = [0x78, 0x56, 0x34, 0x12];
    // lw x2, 0(x3)
    let code = code_bytes(&[0x0001a103]);
    let mut runner = runner_at(&code);
    runner.hart.set_x(3, data.as_ptr() as u64);
    assert_eq!(runner.step(1), StepStatus::Completed);
    assert_eq!(runner.hart.get_x(2), 0x12345678);
}

#[test]
fn branch_taken_moves_pc_by_offset() {
    // beq x0, x0, +8 then two nops at the fall-through
    let code = code_bytes(&[0x00000463, 0x00000013, 0x00000013]);
    let base = code.as_ptr() as u64;
    let mut runner = runner_at(&code);
    assert_eq!(runner.step(1), StepStatus::Completed);
    assert_eq!(runner.hart.pc, base + 8);
}

#[test]
fn brk_extends_the_heap() {
    let heap = 0x5000_0000u64;
    let mut hart: Hart<Rv64Imafdc> = Hart::new();
    hart.heap_begin = heap;
    hart.heap_end = heap;
    hart.set_xr(reg::A7, sysno::BRK);
    hart.set_xr(reg::A0, heap + 0x10000);
    assert_eq!(proxy_syscall(&mut hart), SyscallOutcome::Resume);
    assert_eq!(hart.x(reg::A0), heap + 0x10000);
    assert_eq!(hart.heap_end, heap + 0x10000);

    // the newly mapped pages are usable guest memory
    hart.mem.write_u64(heap + 0x8000, 0x1122334455667788);
    assert_eq!(hart.mem.read_u64(heap + 0x8000), 0x1122334455667788);

    // a request the heap already covers changes nothing
    hart.set_xr(reg::A7, sysno::BRK);
    hart.set_xr(reg::A0, heap + 0x8000);
    assert_eq!(proxy_syscall(&mut hart), SyscallOutcome::Resume);
    assert_eq!(hart.heap_end, heap + 0x10000);
    assert_eq!(hart.x(reg::A0), heap + 0x8000);
}

#[test]
fn illegal_instruction_stops_the_run() {
    let code = [0u8; 4];
    let mut runner = runner_at(&code);
    assert_eq!(runner.run(), StepStatus::Illegal);
}

/// Reference pipeline without the decode cache, for the coherence check.
fn run_uncached<P: Isa>(hart: &mut Hart<P>, count: usize) {
    let mut dec = DecodedInst::default();
    for _ in 0..count {
        let (inst, inst_len) = hart.mem.fetch_inst(hart.pc);
        decode_inst::<P>(&mut dec, inst);
        if P::RVC {
            decompress_inst::<P>(&mut dec);
        }
        recognize_pseudo(&mut dec);
        assert!(exec_inst(&dec, hart, inst_len));
    }
}

#[test]
fn cached_and_uncached_execution_agree() {
    // a loop-free mix of alu ops, branches and compressed forms, with
    // repeated instruction words to force cache hits
    let program: Vec<u32> = vec![
        0x00500093, // addi x1, x0, 5
        0x00108133, // add x2, x1, x1
        0x00500093, // addi x1, x0, 5 (cache hit)
        0x002081b3, // add x3, x1, x2
        0x0021a233, // slt x4, x3, x2
        0x40208233, // sub x4, x1, x2
        0x00209293, // slli x5, x1, 2
    ];
    let code = code_bytes(&program);
    let n = program.len();

    let mut cached = runner_at(&code);
    assert_eq!(cached.step(n), StepStatus::Completed);

    let mut hart: Hart<Rv64Imafdc> = Hart::new();
    hart.pc = code.as_ptr() as u64;
    run_uncached(&mut hart, n);

    for r in 0..32u8 {
        assert_eq!(cached.hart.get_x(r), hart.get_x(r), "register x{r}");
    }
    assert_eq!(cached.hart.pc, hart.pc);
}
