//! Per-instruction scenarios: registers, memory, SREG, PC and cycles after
//! a single step.

use atmel_avr8::flags::{self, C, H, I, N, S, V};
use atmel_avr8::memory::{self, EIND, RAMPZ, SREG};
use atmel_avr8::{Cpu, CpuConfig};

const SRAM: usize = 8192;

/// CPU with `words` of flash, `program` loaded at 0.
fn cpu_with_flash(words: usize, program: &[u16]) -> Cpu {
    let config = CpuConfig::default().with_sram_bytes(SRAM);
    let mut cpu = Cpu::with_config(&vec![0; words], config).unwrap();
    cpu.load_program_words(program).unwrap();
    cpu
}

/// 32 Kwords of flash, 16-bit return addresses.
fn cpu(program: &[u16]) -> Cpu {
    cpu_with_flash(0x8000, program)
}

/// 128 Kwords of flash, 22-bit return addresses.
fn cpu_22bit(program: &[u16]) -> Cpu {
    cpu_with_flash(0x2_0000, program)
}

fn step(cpu: &mut Cpu) {
    cpu.step().unwrap();
}

// === Arithmetic ===

#[test]
fn test_adc_with_carry_in() {
    let mut cpu = cpu(&[0x1c01]); // ADC r0, r1
    cpu.set_register(0, 10);
    cpu.set_register(1, 20);
    cpu.set_sreg(C);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 1);
    assert_eq!(cpu.cycles(), 1);
    assert_eq!(cpu.register(0), 31);
    assert_eq!(cpu.sreg(), 0, "carry consumed and cleared");
}

#[test]
fn test_adc_overflow_to_zero() {
    let mut cpu = cpu(&[0x1c01]); // ADC r0, r1
    cpu.set_register(0, 10);
    cpu.set_register(1, 245);
    cpu.set_sreg(C);
    step(&mut cpu);
    assert_eq!(cpu.register(0), 0);
    assert_eq!(cpu.sreg(), H | flags::Z | C);
}

#[test]
fn test_add_overflow_to_zero() {
    let mut cpu = cpu(&[0x0c01]); // ADD r0, r1
    cpu.set_register(0, 11);
    cpu.set_register(1, 245);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 1);
    assert_eq!(cpu.cycles(), 1);
    assert_eq!(cpu.register(0), 0);
    assert_eq!(cpu.sreg(), H | flags::Z | C);
}

#[test]
fn test_add_ignores_carry_in() {
    let mut cpu = cpu(&[0x0c01]); // ADD r0, r1
    cpu.set_register(0, 11);
    cpu.set_register(1, 4);
    cpu.set_sreg(C | I);
    step(&mut cpu);
    assert_eq!(cpu.register(0), 15);
    assert_eq!(cpu.sreg(), I, "I survives, C recomputed");
}

#[test]
fn test_sub_borrow() {
    let mut cpu = cpu(&[0x1801]); // SUB r0, r1
    cpu.set_register(0, 0);
    cpu.set_register(1, 10);
    step(&mut cpu);
    assert_eq!(cpu.register(0), 246);
    assert_eq!(cpu.sreg(), H | S | N | C);
}

#[test]
fn test_sbc_with_carry_in() {
    let mut cpu = cpu(&[0x0801]); // SBC r0, r1
    cpu.set_register(0, 0);
    cpu.set_register(1, 10);
    cpu.set_sreg(C);
    step(&mut cpu);
    assert_eq!(cpu.register(0), 245);
    assert_eq!(cpu.sreg(), H | S | N | C);
}

#[test]
fn test_sbci_keeps_interrupt_flag() {
    let mut cpu = cpu(&[0x4073]); // SBCI r23, 3
    cpu.set_register(23, 3);
    cpu.set_sreg(I | C);
    step(&mut cpu);
    assert_eq!(cpu.register(23), 0xff);
    assert_eq!(cpu.sreg(), I | H | S | N | C);
}

#[test]
fn test_neg() {
    let mut cpu = cpu(&[0x9541]); // NEG r20
    cpu.set_register(20, 0x56);
    step(&mut cpu);
    assert_eq!(cpu.register(20), 0xaa);
    assert_eq!(cpu.sreg(), H | S | N | C);
}

#[test]
fn test_inc_into_sign_bit() {
    let mut cpu = cpu(&[0x9453]); // INC r5
    cpu.set_register(5, 0x7f);
    step(&mut cpu);
    assert_eq!(cpu.register(5), 0x80);
    assert_eq!(cpu.sreg(), N | V);
}

#[test]
fn test_inc_wraps_to_zero() {
    let mut cpu = cpu(&[0x9453]); // INC r5
    cpu.set_register(5, 0xff);
    cpu.set_sreg(C);
    step(&mut cpu);
    assert_eq!(cpu.register(5), 0);
    assert_eq!(cpu.sreg(), flags::Z | C, "INC leaves C alone");
}

#[test]
fn test_dec_out_of_sign_bit() {
    let mut cpu = cpu(&[0x940a]); // DEC r0
    cpu.set_register(0, 0x80);
    step(&mut cpu);
    assert_eq!(cpu.register(0), 0x7f);
    assert_eq!(cpu.sreg(), V | S);
}

#[test]
fn test_com_sets_carry() {
    let mut cpu = cpu(&[0x9400]); // COM r0
    cpu.set_register(0, 0x5a);
    step(&mut cpu);
    assert_eq!(cpu.register(0), 0xa5);
    assert_eq!(cpu.sreg(), S | N | C);
}

// === Compare ===

#[test]
fn test_cp_equal_sets_zero() {
    let mut cpu = cpu(&[0x1401]); // CP r0, r1
    cpu.set_register(0, 0x42);
    cpu.set_register(1, 0x42);
    step(&mut cpu);
    assert_eq!(cpu.register(0), 0x42, "CP does not write back");
    assert_eq!(cpu.sreg(), flags::Z);
}

#[test]
fn test_cpc_borrow_through_zero() {
    let mut cpu = cpu(&[0x0581]); // CPC r24, r1
    cpu.set_register(24, 0);
    cpu.set_register(1, 0);
    cpu.set_sreg(I | C);
    step(&mut cpu);
    assert_eq!(cpu.sreg(), I | H | S | N | C);
}

#[test]
fn test_cpc_zero_flag_is_sticky() {
    // CP r0, r2 ; CPC r1, r3 comparing 0x0001 against 0x0000
    let mut cpu = cpu(&[0x1402, 0x0413]);
    cpu.set_register(0, 1);
    step(&mut cpu);
    assert_eq!(cpu.sreg() & flags::Z, 0);
    step(&mut cpu);
    assert_eq!(cpu.sreg() & flags::Z, 0, "high bytes equal but low bytes differed");

    // Equal 16-bit values keep Z through the chain.
    let mut cpu = self::cpu(&[0x1402, 0x0413]);
    cpu.set_register(1, 1);
    cpu.set_register(3, 1);
    step(&mut cpu);
    step(&mut cpu);
    assert_eq!(cpu.sreg(), flags::Z);
}

#[test]
fn test_cpi() {
    let mut cpu = cpu(&[0x30a9]); // CPI r26, 9
    cpu.set_register(26, 8);
    step(&mut cpu);
    assert_eq!(cpu.register(26), 8);
    assert_eq!(cpu.sreg(), H | S | N | C);
}

#[test]
fn test_cpse_skips_two_word_instruction() {
    // CPSE r2, r3 ; CALL 0x10 ; NOP
    let mut cpu = cpu(&[0x1023, 0x940e, 0x0008, 0x0000]);
    cpu.set_register(2, 10);
    cpu.set_register(3, 10);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 3);
    assert_eq!(cpu.cycles(), 3);
}

#[test]
fn test_cpse_no_skip_when_different() {
    let mut cpu = cpu(&[0x1023, 0x0000]);
    cpu.set_register(2, 10);
    cpu.set_register(3, 11);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 1);
    assert_eq!(cpu.cycles(), 1);
}

// === Logic and shifts ===

#[test]
fn test_eor_clears_register_keeps_carry() {
    let mut cpu = cpu(&[0x2455]); // EOR r5, r5 (CLR r5)
    cpu.set_register(5, 0x33);
    cpu.set_sreg(C | V);
    step(&mut cpu);
    assert_eq!(cpu.register(5), 0);
    assert_eq!(cpu.sreg(), flags::Z | C, "V cleared, C untouched");
}

#[test]
fn test_ror_shifts_into_carry() {
    let mut cpu = cpu(&[0x9407]); // ROR r0
    cpu.set_register(0, 0x11);
    step(&mut cpu);
    assert_eq!(cpu.register(0), 0x08);
    assert_eq!(cpu.sreg(), S | V | C);
}

#[test]
fn test_ror_rotates_carry_in() {
    let mut cpu = cpu(&[0x9407]); // ROR r0
    cpu.set_register(0, 0x02);
    cpu.set_sreg(C);
    step(&mut cpu);
    assert_eq!(cpu.register(0), 0x81);
    assert_eq!(cpu.sreg(), N | V);
}

#[test]
fn test_asr_keeps_sign() {
    let mut cpu = cpu(&[0x9405]); // ASR r0
    cpu.set_register(0, 0x81);
    step(&mut cpu);
    assert_eq!(cpu.register(0), 0xc0);
    assert_eq!(cpu.sreg(), S | N | C);
}

#[test]
fn test_swap() {
    let mut cpu = cpu(&[0x9412]); // SWAP r1
    cpu.set_register(1, 0xa5);
    step(&mut cpu);
    assert_eq!(cpu.register(1), 0x5a);
    assert_eq!(cpu.cycles(), 1);
}

#[test]
fn test_movw() {
    let mut cpu = cpu(&[0x01db]); // MOVW r26, r22
    cpu.set_register(22, 0x34);
    cpu.set_register(23, 0x12);
    step(&mut cpu);
    assert_eq!(cpu.register(26), 0x34);
    assert_eq!(cpu.register(27), 0x12);
}

// === Multiply ===

#[test]
fn test_mul() {
    let mut cpu = cpu(&[0x9c56]); // MUL r5, r6
    cpu.set_register(5, 100);
    cpu.set_register(6, 5);
    step(&mut cpu);
    assert_eq!(cpu.data().read_u16_le(0), 500);
    assert_eq!(cpu.sreg(), 0);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_mul_sets_carry_from_bit_15() {
    let mut cpu = cpu(&[0x9c56]); // MUL r5, r6
    cpu.set_register(5, 200);
    cpu.set_register(6, 200);
    step(&mut cpu);
    assert_eq!(cpu.data().read_u16_le(0), 40000);
    assert_eq!(cpu.sreg(), C);
}

#[test]
fn test_mul_zero() {
    let mut cpu = cpu(&[0x9c56]); // MUL r5, r6
    cpu.set_register(5, 0);
    cpu.set_register(6, 9);
    step(&mut cpu);
    assert_eq!(cpu.data().read_u16_le(0), 0);
    assert_eq!(cpu.sreg(), flags::Z);
}

#[test]
fn test_muls() {
    let mut cpu = cpu(&[0x0223]); // MULS r18, r19
    cpu.set_register(18, (-5i8) as u8);
    cpu.set_register(19, 100);
    step(&mut cpu);
    assert_eq!(cpu.data().read_u16_le(0) as i16, -500);
    assert_eq!(cpu.sreg(), C);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_mulsu() {
    let mut cpu = cpu(&[0x0301]); // MULSU r16, r17
    cpu.set_register(16, (-5i8) as u8);
    cpu.set_register(17, 200);
    step(&mut cpu);
    assert_eq!(cpu.data().read_u16_le(0) as i16, -1000);
    assert_eq!(cpu.sreg(), C);
}

// === Branches and jumps ===

#[test]
fn test_breq_taken() {
    let mut cpu = cpu(&[0xf011]); // BREQ .+4
    cpu.set_sreg(flags::Z);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 3);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_rjmp() {
    let mut cpu = cpu(&[0xc001]); // RJMP .+2
    step(&mut cpu);
    assert_eq!(cpu.pc(), 2);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_jmp() {
    let mut cpu = cpu(&[0x940c, 0x005c]); // JMP 0xb8
    step(&mut cpu);
    assert_eq!(cpu.pc(), 0x5c);
    assert_eq!(cpu.cycles(), 3);
}

#[test]
fn test_jmp_to_zero_from_byte_image() {
    let mut cpu = Cpu::from_bytes(&[0x0c, 0x94, 0x00, 0x00], SRAM).unwrap();
    step(&mut cpu);
    assert_eq!(cpu.pc(), 0);
    assert_eq!(cpu.cycles(), 3);
}

#[test]
fn test_ijmp() {
    let mut cpu = cpu(&[0x9409]); // IJMP
    cpu.data_mut().write_u16_le(memory::Z, 0x1040);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 0x1040);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_eijmp() {
    let mut cpu = cpu_22bit(&[0x9419]); // EIJMP
    cpu.data_mut()[EIND] = 1;
    cpu.data_mut().write_u16_le(memory::Z, 0x1040);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 0x1_1040);
    assert_eq!(cpu.cycles(), 2);
}

// === Calls and returns ===

#[test]
fn test_call() {
    let mut cpu = cpu(&[0x940e, 0x005c]); // CALL 0xb8
    cpu.set_sp(150);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 0x5c);
    assert_eq!(cpu.cycles(), 4);
    assert_eq!(cpu.data()[150], 2, "return address low byte");
    assert_eq!(cpu.data()[149], 0, "return address high byte");
    assert_eq!(cpu.sp(), 148);
}

#[test]
fn test_call_22bit_pushes_three_bytes() {
    let mut cpu = cpu_22bit(&[0x940e, 0x005c]); // CALL 0xb8
    cpu.set_sp(150);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 0x5c);
    assert_eq!(cpu.cycles(), 5);
    assert_eq!(cpu.data()[150], 2);
    assert_eq!(cpu.sp(), 147);
}

#[test]
fn test_rcall() {
    let mut cpu = cpu(&[0xd003]); // RCALL .+6
    cpu.set_sp(0x80);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 4);
    assert_eq!(cpu.cycles(), 3);
    assert_eq!(cpu.data()[0x80], 1);
    assert_eq!(cpu.sp(), 0x7e);
}

#[test]
fn test_icall() {
    let mut cpu = cpu(&[0x9509]); // ICALL
    cpu.set_sp(0x80);
    cpu.data_mut().write_u16_le(memory::Z, 0x2020);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 0x2020);
    assert_eq!(cpu.cycles(), 3);
    assert_eq!(cpu.data()[0x80], 1);
    assert_eq!(cpu.sp(), 0x7e);
}

#[test]
fn test_icall_22bit() {
    let mut cpu = cpu_22bit(&[0x9509]); // ICALL
    cpu.set_sp(0x80);
    cpu.data_mut().write_u16_le(memory::Z, 0x2020);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 0x2020);
    assert_eq!(cpu.cycles(), 4);
    assert_eq!(cpu.sp(), 0x7d);
}

#[test]
fn test_eicall_wraps_into_small_flash() {
    let mut cpu = cpu(&[0x9519]); // EICALL
    cpu.set_sp(0x80);
    cpu.data_mut()[EIND] = 1;
    cpu.data_mut().write_u16_le(memory::Z, 0x1234);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 0x1234);
    assert_eq!(cpu.cycles(), 4);
    assert_eq!(cpu.data()[0x80], 1);
    assert_eq!(cpu.sp(), 0x7d, "EICALL always pushes three bytes");
}

#[test]
fn test_ret() {
    let mut cpu = cpu(&[0x9508]); // RET
    cpu.set_sp(0x90);
    cpu.data_mut()[0x92] = 16;
    step(&mut cpu);
    assert_eq!(cpu.pc(), 16);
    assert_eq!(cpu.cycles(), 4);
    assert_eq!(cpu.sp(), 0x92);
}

#[test]
fn test_ret_22bit() {
    let mut cpu = cpu_22bit(&[0x9508]); // RET
    cpu.set_sp(0x90);
    cpu.data_mut()[0x91] = 0x01;
    cpu.data_mut()[0x92] = 0x00;
    cpu.data_mut()[0x93] = 0x16;
    step(&mut cpu);
    assert_eq!(cpu.pc(), 0x1_0016);
    assert_eq!(cpu.cycles(), 5);
    assert_eq!(cpu.sp(), 0x93);
}

#[test]
fn test_reti_enables_interrupts() {
    let mut cpu = cpu(&[0x9518]); // RETI
    cpu.set_sp(0xc0);
    cpu.data_mut()[0xc2] = 200;
    step(&mut cpu);
    assert_eq!(cpu.pc(), 200);
    assert_eq!(cpu.cycles(), 4);
    assert_eq!(cpu.sp(), 0xc2);
    assert_eq!(cpu.sreg(), I);
}

#[test]
fn test_call_then_ret_round_trip() {
    // 0: CALL 4 ; 2: NOP ; 3: NOP ; 4: RET
    let mut cpu = cpu(&[0x940e, 0x0004, 0x0000, 0x0000, 0x9508]);
    let sp = cpu.sp();
    step(&mut cpu);
    assert_eq!(cpu.pc(), 4);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 2);
    assert_eq!(cpu.sp(), sp);
    assert_eq!(cpu.cycles(), 8);
}

// === Loads and stores ===

#[test]
fn test_ldi() {
    let mut cpu = cpu(&[0xef0f]); // LDI r16, 0xff
    step(&mut cpu);
    assert_eq!(cpu.register(16), 0xff);
    assert_eq!(cpu.cycles(), 1);
}

#[test]
fn test_lds() {
    let mut cpu = cpu(&[0x9050, 0x0150]); // LDS r5, 0x150
    cpu.data_mut()[0x150] = 0x7a;
    step(&mut cpu);
    assert_eq!(cpu.register(5), 0x7a);
    assert_eq!(cpu.pc(), 2);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_sts() {
    let mut cpu = cpu(&[0x93f0, 0x0151]); // STS 0x151, r31
    cpu.set_register(31, 0x80);
    step(&mut cpu);
    assert_eq!(cpu.data()[0x151], 0x80);
    assert_eq!(cpu.pc(), 2);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_ld_x() {
    let mut cpu = cpu(&[0x901c]); // LD r1, X
    cpu.data_mut().write_u16_le(memory::X, 0xc0);
    cpu.data_mut()[0xc0] = 0x15;
    step(&mut cpu);
    assert_eq!(cpu.register(1), 0x15);
    assert_eq!(cpu.data().read_u16_le(memory::X), 0xc0);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_ld_z_post_increment() {
    let mut cpu = cpu(&[0x9051]); // LD r5, Z+
    cpu.data_mut().write_u16_le(memory::Z, 0x80);
    cpu.data_mut()[0x80] = 0xee;
    step(&mut cpu);
    assert_eq!(cpu.register(5), 0xee);
    assert_eq!(cpu.data().read_u16_le(memory::Z), 0x81);
}

#[test]
fn test_ldd_y_displacement() {
    let mut cpu = cpu(&[0x804a]); // LDD r4, Y+2
    cpu.data_mut().write_u16_le(memory::Y, 0x80);
    cpu.data_mut()[0x82] = 0x33;
    step(&mut cpu);
    assert_eq!(cpu.register(4), 0x33);
    assert_eq!(cpu.data().read_u16_le(memory::Y), 0x80, "displacement leaves Y alone");
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_st_y_pre_decrement() {
    let mut cpu = cpu(&[0x927a]); // ST -Y, r7
    cpu.set_register(7, 0x98);
    cpu.data_mut().write_u16_le(memory::Y, 0x91);
    step(&mut cpu);
    assert_eq!(cpu.data()[0x90], 0x98);
    assert_eq!(cpu.data().read_u16_le(memory::Y), 0x90);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_std_z_max_displacement() {
    let mut cpu = cpu(&[0xae57]); // STD Z+63, r5
    cpu.set_register(5, 0x4f);
    cpu.data_mut().write_u16_le(memory::Z, 0x100);
    step(&mut cpu);
    assert_eq!(cpu.data()[0x13f], 0x4f);
}

#[test]
fn test_lpm() {
    let mut cpu = cpu_22bit(&[0x95c8]); // LPM
    cpu.set_program_word(0x40, 0xa0);
    cpu.data_mut().write_u16_le(memory::Z, 0x80);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 1);
    assert_eq!(cpu.cycles(), 3);
    assert_eq!(cpu.register(0), 0xa0);
    assert_eq!(cpu.data().read_u16_le(memory::Z), 0x80);
}

#[test]
fn test_lpm_post_increment() {
    let mut cpu = cpu(&[0x9025]); // LPM r2, Z+
    cpu.set_program_byte(0x101, 0x55);
    cpu.data_mut().write_u16_le(memory::Z, 0x101);
    step(&mut cpu);
    assert_eq!(cpu.register(2), 0x55);
    assert_eq!(cpu.data().read_u16_le(memory::Z), 0x102);
    assert_eq!(cpu.program_word(0x80), 0x5500);
}

#[test]
fn test_elpm() {
    let mut cpu = cpu_22bit(&[0x95d8]); // ELPM
    cpu.data_mut()[memory::Z] = 0x50;
    cpu.data_mut()[RAMPZ] = 0x2;
    cpu.set_program_byte(0x2_0050, 0x62);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 1);
    assert_eq!(cpu.cycles(), 3);
    assert_eq!(cpu.register(0), 0x62);
}

#[test]
fn test_elpm_register() {
    let mut cpu = cpu_22bit(&[0x9056]); // ELPM r5, Z
    cpu.data_mut()[memory::Z] = 0x11;
    cpu.data_mut()[RAMPZ] = 0x1;
    cpu.set_program_byte(0x1_0011, 0x99);
    step(&mut cpu);
    assert_eq!(cpu.cycles(), 3);
    assert_eq!(cpu.register(5), 0x99);
}

#[test]
fn test_elpm_post_increment_carries_into_rampz() {
    let mut cpu = cpu_22bit(&[0x9067]); // ELPM r6, Z+
    cpu.data_mut().write_u16_le(memory::Z, 0xffff);
    cpu.data_mut()[RAMPZ] = 0x2;
    cpu.set_program_byte(0x2_ffff, 0x22);
    step(&mut cpu);
    assert_eq!(cpu.register(6), 0x22);
    assert_eq!(cpu.data().read_u16_le(memory::Z), 0);
    assert_eq!(cpu.data()[RAMPZ], 3);
}

#[test]
fn test_elpm_post_increment_wraps_rampz() {
    let mut cpu = cpu_22bit(&[0x9067]); // ELPM r6, Z+
    cpu.data_mut().write_u16_le(memory::Z, 0xffff);
    cpu.data_mut()[RAMPZ] = 0x3;
    step(&mut cpu);
    assert_eq!(cpu.data()[RAMPZ], 0);
}

#[test]
fn test_push() {
    let mut cpu = cpu(&[0x92bf]); // PUSH r11
    cpu.set_register(11, 0x2a);
    cpu.set_sp(0xff);
    step(&mut cpu);
    assert_eq!(cpu.data()[0xff], 0x2a);
    assert_eq!(cpu.sp(), 0xfe);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_pop() {
    let mut cpu = cpu(&[0x91af]); // POP r26
    cpu.set_sp(0xff);
    cpu.data_mut()[0x100] = 0x1a;
    step(&mut cpu);
    assert_eq!(cpu.register(26), 0x1a);
    assert_eq!(cpu.sp(), 0x100);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_xch() {
    let mut cpu = cpu(&[0x9354]); // XCH Z, r21
    cpu.set_register(21, 0xa1);
    cpu.data_mut().write_u16_le(memory::Z, 0x50);
    cpu.data_mut()[0x50] = 0xb9;
    step(&mut cpu);
    assert_eq!(cpu.register(21), 0xb9);
    assert_eq!(cpu.data()[0x50], 0xa1);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_lac() {
    let mut cpu = cpu(&[0x9336]); // LAC Z, r19
    cpu.set_register(19, 0x02);
    cpu.data_mut().write_u16_le(memory::Z, 0x100);
    cpu.data_mut()[0x100] = 0x96;
    step(&mut cpu);
    assert_eq!(cpu.register(19), 0x96);
    assert_eq!(cpu.data()[0x100], 0x94);
}

#[test]
fn test_las() {
    let mut cpu = cpu(&[0x9315]); // LAS Z, r17
    cpu.set_register(17, 0x11);
    cpu.data_mut().write_u16_le(memory::Z, 0x80);
    cpu.data_mut()[0x80] = 0x44;
    step(&mut cpu);
    assert_eq!(cpu.register(17), 0x44);
    assert_eq!(cpu.data()[0x80], 0x55);
}

#[test]
fn test_lat() {
    let mut cpu = cpu(&[0x9207]); // LAT Z, r0
    cpu.set_register(0, 0x33);
    cpu.data_mut().write_u16_le(memory::Z, 0x80);
    cpu.data_mut()[0x80] = 0x66;
    step(&mut cpu);
    assert_eq!(cpu.register(0), 0x66);
    assert_eq!(cpu.data()[0x80], 0x55);
}

// === I/O ===

#[test]
fn test_in_reads_sreg() {
    let mut cpu = cpu(&[0xb70f]); // IN r16, 0x3f
    cpu.set_sreg(0x1b);
    step(&mut cpu);
    assert_eq!(cpu.register(16), 0x1b);
    assert_eq!(cpu.cycles(), 1);
}

#[test]
fn test_out_writes_io_space() {
    let mut cpu = cpu(&[0xbe1f]); // OUT 0x3f, r1
    cpu.set_register(1, 0x5a);
    step(&mut cpu);
    assert_eq!(cpu.data()[0x5f], 0x5a);
    assert_eq!(cpu.sreg(), 0x5a);
}

#[test]
fn test_out_runs_write_hook() {
    let mut cpu = cpu(&[0xbe1f]); // OUT 0x3f, r1
    cpu.set_register(1, 0x80);
    cpu.set_write_hook(SREG, |cpu, access| {
        cpu.data_mut()[access.addr] = access.value | 0x01;
        true
    });
    step(&mut cpu);
    assert_eq!(cpu.sreg(), 0x81);
}

#[test]
fn test_cbi() {
    let mut cpu = cpu(&[0x9865]); // CBI 0x0c, 5
    cpu.data_mut()[0x2c] = 0xff;
    step(&mut cpu);
    assert_eq!(cpu.data()[0x2c], 0xdf);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_sbis_skips_when_set() {
    let mut cpu = cpu(&[0x9b18, 0x0000, 0x0000]); // SBIS 0x03, 0
    cpu.data_mut()[0x23] = 0x01;
    step(&mut cpu);
    assert_eq!(cpu.pc(), 2);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_sbic_skips_when_clear() {
    let mut cpu = cpu(&[0x9918, 0x0000, 0x0000]); // SBIC 0x03, 0
    step(&mut cpu);
    assert_eq!(cpu.pc(), 2);
    assert_eq!(cpu.cycles(), 2);
}

#[test]
fn test_sbic_reads_through_hook() {
    let mut cpu = cpu(&[0x9918, 0x0000, 0x0000]); // SBIC 0x03, 0
    cpu.set_read_hook(0x23, |_, _| 0x01);
    step(&mut cpu);
    assert_eq!(cpu.pc(), 1, "hooked pin reads high, no skip");
    assert_eq!(cpu.cycles(), 1);
}

// === SREG bit instructions ===

#[test]
fn test_sei_and_clc() {
    let mut cpu = cpu(&[0x9478, 0x9488]); // SEI ; CLC
    cpu.set_sreg(C);
    step(&mut cpu);
    assert_eq!(cpu.sreg(), I | C);
    assert!(cpu.interrupts_enabled());
    step(&mut cpu);
    assert_eq!(cpu.sreg(), I);
}

#[test]
fn test_bst_and_bld() {
    let mut cpu = cpu(&[0xfa13, 0xf826]); // BST r1, 3 ; BLD r2, 6
    cpu.set_register(1, 0x08);
    step(&mut cpu);
    assert_eq!(cpu.sreg(), flags::T);
    step(&mut cpu);
    assert_eq!(cpu.register(2), 0x40);
}

// === Miscellaneous ===

#[test]
fn test_break_sleep_nop_cost_one_cycle() {
    let mut cpu = cpu(&[0x9598, 0x9588, 0x0000]); // BREAK ; SLEEP ; NOP
    for expected in 1..=3 {
        step(&mut cpu);
        assert_eq!(cpu.pc(), expected);
        assert_eq!(cpu.cycles(), u64::from(expected));
    }
}
