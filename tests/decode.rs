//! Field extraction and scattered-immediate reassembly on a RISC-V
//! store instruction, exercised through constant folding.
use bitloom::prelude::*;

/// `sw rs2, imm(rs1)` with imm[11:5] = 0b1000000, imm[4:0] = 0b00001.
const SW_ENCODING: u128 = 0b1000000_00001_00010_010_00001_0100011;

#[test]
fn store_fields_decode() {
    let instr = Bit::constant(32, SW_ENCODING);
    assert_eq!(instr.bits(6, 0).as_const(), Some(0b0100011));
    assert_eq!(instr.bits(14, 12).as_const(), Some(0b010));
    assert_eq!(instr.bits(24, 20).as_const(), Some(1), "rs2");
    assert_eq!(instr.bits(19, 15).as_const(), Some(2), "rs1");
}

#[test]
fn scattered_immediate_reassembles() {
    let instr = Bit::constant(32, SW_ENCODING);
    let imm_hi = instr.bits(31, 25);
    let imm_lo = instr.bits(11, 7);
    let imm = imm_hi.concat(&imm_lo);
    assert_eq!(imm.width(), 12);
    assert_eq!(imm.as_const(), Some(0b1000000_00001));
    // Sign-extended to a full word, the immediate is negative.
    assert_eq!(
        imm.sign_extend(32).as_const(),
        Some(0xFFFF_F801),
    );
}

#[test]
fn opcode_dispatch_selects_exactly_one_branch() {
    let instr = Bit::constant(32, SW_ENCODING);
    let opcode = instr.bits(6, 0);
    let is_add = opcode
        .eq(&Bit::constant(7, 0b0110011))
        .and(&instr.bits(14, 12).eq(&Bit::constant(3, 0b000)));
    let is_addi = opcode
        .eq(&Bit::constant(7, 0b0010011))
        .and(&instr.bits(14, 12).eq(&Bit::constant(3, 0b000)));
    let is_sw = opcode
        .eq(&Bit::constant(7, 0b0100011))
        .and(&instr.bits(14, 12).eq(&Bit::constant(3, 0b010)));
    assert_eq!(is_add.as_const(), Some(0));
    assert_eq!(is_addi.as_const(), Some(0));
    assert_eq!(is_sw.as_const(), Some(1));
}

#[test]
fn factorial_folds_through_a_multiply_chain() {
    let mut acc = Bit::constant(32, 1);
    for n in 1..=10u128 {
        acc = acc * Bit::constant(32, n);
    }
    assert_eq!(acc.as_const(), Some(3_628_800));
}
