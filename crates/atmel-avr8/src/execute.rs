//! Instruction semantics.
//!
//! `execute` applies one decoded instruction. The step epilogue that
//! follows (PC + 1, one cycle) is not part of it, so every cost below is
//! the instruction's cycle count minus one, and every absolute jump lands
//! one word before its target.

use crate::Cpu;
use crate::flags::{self, C, I, N, T, V, Z};
use crate::instruction::{Indirect, Instruction, Pointer, is_two_word};
use crate::memory::{EIND, RAMPZ, SREG};

/// SREG bits left untouched by each instruction group.
const KEEP_TI: u8 = flags::T | I;
const KEEP_HTI: u8 = flags::H | T | I;
const KEEP_HTIC: u8 = flags::H | T | I | C;
const KEEP_MUL: u8 = !(Z | C);

impl Cpu {
    fn reg_pair(&self, r: u8) -> u16 {
        self.data.read_u16_le(u16::from(r))
    }

    fn set_reg_pair(&mut self, r: u8, value: u16) {
        self.data.write_u16_le(u16::from(r), value);
    }

    fn flag(&self, flag: u8) -> bool {
        self.status().is_set(flag)
    }

    fn update_flags(&mut self, keep: u8, flags: u8) {
        self.data[SREG] = self.status().merge(keep, flags).0;
    }

    fn pointer(&self, pointer: Pointer) -> u16 {
        self.data.read_u16_le(pointer.address())
    }

    fn set_pointer(&mut self, pointer: Pointer, value: u16) {
        self.data.write_u16_le(pointer.address(), value);
    }

    /// Resolve an indirect operand, applying any pointer update.
    fn indirect_address(&mut self, pointer: Pointer, mode: Indirect) -> u16 {
        let base = self.pointer(pointer);
        match mode {
            Indirect::Plain => base,
            Indirect::PostIncrement => {
                self.set_pointer(pointer, base.wrapping_add(1));
                base
            }
            Indirect::PreDecrement => {
                let addr = base.wrapping_sub(1);
                self.set_pointer(pointer, addr);
                addr
            }
            Indirect::Displacement(q) => base.wrapping_add(u16::from(q)),
        }
    }

    /// Skip the next instruction, one or two words long.
    fn skip_next(&mut self) {
        let words = if is_two_word(self.program.word(self.pc + 1)) { 2 } else { 1 };
        self.pc += words;
        self.cycles += u64::from(words);
    }

    fn jump_absolute(&mut self, target: u32) {
        self.pc = self.wrap_pc(i64::from(target) - 1);
    }

    fn jump_relative(&mut self, offset: i64) {
        self.pc = self.wrap_pc(i64::from(self.pc) + offset);
    }

    /// Call cost beyond the epilogue, one more on 22-bit parts.
    fn call_cost(&self, base: u64) -> u64 {
        if self.pc22_bits() { base + 1 } else { base }
    }

    fn extended_z(&self) -> u32 {
        u32::from(self.data[EIND]) << 16 | u32::from(self.pointer(Pointer::Z))
    }

    fn multiply_result(&mut self, product: u16, res: u16) {
        self.set_reg_pair(0, res);
        self.update_flags(KEEP_MUL, flags::multiply(res, product));
        self.cycles += 1;
    }

    fn compare(&mut self, d: u8, r: u8) -> u8 {
        let res = d.wrapping_sub(r);
        self.update_flags(KEEP_TI, flags::sub(d, r, res));
        res
    }

    fn compare_with_carry(&mut self, d: u8, r: u8) -> u8 {
        let res = d.wrapping_sub(r).wrapping_sub(u8::from(self.flag(C)));
        let sreg = self.sreg();
        self.update_flags(KEEP_TI, flags::sub_with_carry(d, r, res, sreg));
        res
    }

    fn program_load(&mut self, d: u8, addr: u32) {
        let value = self.program.byte(addr);
        self.set_register(d, value);
        self.cycles += 2;
    }

    pub(crate) fn execute(&mut self, instruction: Instruction) {
        match instruction {
            Instruction::Adc { d, r } => {
                let (dv, rv) = (self.register(d), self.register(r));
                let res = dv.wrapping_add(rv).wrapping_add(u8::from(self.flag(C)));
                self.set_register(d, res);
                self.update_flags(KEEP_TI, flags::add(dv, rv, res));
            }
            Instruction::Add { d, r } => {
                let (dv, rv) = (self.register(d), self.register(r));
                let res = dv.wrapping_add(rv);
                self.set_register(d, res);
                self.update_flags(KEEP_TI, flags::add(dv, rv, res));
            }
            Instruction::Adiw { d, k } => {
                let value = self.reg_pair(d);
                let res = value.wrapping_add(u16::from(k));
                self.set_reg_pair(d, res);
                let f = word_flags(res)
                    | bit(!value & res & 0x8000 != 0, V)
                    | bit(!res & value & 0x8000 != 0, C);
                self.update_flags(KEEP_HTI, flags::with_sign(f));
                self.cycles += 1;
            }
            Instruction::And { d, r } => {
                let res = self.register(d) & self.register(r);
                self.set_register(d, res);
                self.update_flags(KEEP_HTIC, flags::logic(res));
            }
            Instruction::Andi { d, k } => {
                let res = self.register(d) & k;
                self.set_register(d, res);
                self.update_flags(KEEP_HTIC, flags::logic(res));
            }
            Instruction::Asr { d } => {
                let value = self.register(d);
                let res = (value >> 1) | (value & 0x80);
                self.set_register(d, res);
                self.update_flags(KEEP_HTI, flags::shift_right(res, value & 1 != 0));
            }
            Instruction::Bclr { s } => {
                self.data[SREG] &= !(1 << s);
            }
            Instruction::Bld { d, b } => {
                let mask = 1 << b;
                let value = self.register(d);
                let res = if self.flag(T) { value | mask } else { value & !mask };
                self.set_register(d, res);
            }
            Instruction::Brbc { s, k } => {
                if self.sreg() & (1 << s) == 0 {
                    self.jump_relative(i64::from(k));
                    self.cycles += 1;
                }
            }
            Instruction::Brbs { s, k } => {
                if self.sreg() & (1 << s) != 0 {
                    self.jump_relative(i64::from(k));
                    self.cycles += 1;
                }
            }
            Instruction::Bset { s } => {
                self.data[SREG] |= 1 << s;
            }
            Instruction::Bst { d, b } => {
                let set = self.register(d) & (1 << b) != 0;
                let mut status = self.status();
                status.set_if(T, set);
                self.set_sreg(status.0);
            }
            Instruction::Call { k } => {
                self.push_return_address(self.pc + 2, self.pc22_bits());
                self.jump_absolute(k);
                self.cycles += self.call_cost(3);
            }
            Instruction::Cbi { a, b } => {
                let addr = u16::from(a) + 32;
                let mask = 1 << b;
                let value = self.read_data(addr);
                self.write_data_masked(addr, value & !mask, mask);
                self.cycles += 1;
            }
            Instruction::Com { d } => {
                let res = !self.register(d);
                self.set_register(d, res);
                self.update_flags(KEEP_HTI, flags::logic(res) | C);
            }
            Instruction::Cp { d, r } => {
                let (dv, rv) = (self.register(d), self.register(r));
                self.compare(dv, rv);
            }
            Instruction::Cpc { d, r } => {
                let (dv, rv) = (self.register(d), self.register(r));
                self.compare_with_carry(dv, rv);
            }
            Instruction::Cpi { d, k } => {
                let dv = self.register(d);
                self.compare(dv, k);
            }
            Instruction::Cpse { d, r } => {
                if self.register(d) == self.register(r) {
                    self.skip_next();
                }
            }
            Instruction::Dec { d } => {
                let value = self.register(d);
                let res = value.wrapping_sub(1);
                self.set_register(d, res);
                let f = byte_flags(res) | bit(value == 0x80, V);
                self.update_flags(KEEP_HTIC, flags::with_sign(f));
            }
            Instruction::Eicall => {
                self.push_return_address(self.pc + 1, true);
                self.jump_absolute(self.extended_z());
                self.cycles += 3;
            }
            Instruction::Eijmp => {
                self.jump_absolute(self.extended_z());
                self.cycles += 1;
            }
            Instruction::Elpm { d, post_increment } => {
                let z = self.pointer(Pointer::Z);
                let rampz = self.data[RAMPZ];
                self.program_load(d, u32::from(rampz) << 16 | u32::from(z));
                if post_increment {
                    let next = z.wrapping_add(1);
                    self.set_pointer(Pointer::Z, next);
                    if next == 0 {
                        let pages = (self.program.byte_len() >> 16) as u32;
                        self.data[RAMPZ] = if pages == 0 {
                            0
                        } else {
                            ((u32::from(rampz) + 1) % pages) as u8
                        };
                    }
                }
            }
            Instruction::Eor { d, r } => {
                let res = self.register(d) ^ self.register(r);
                self.set_register(d, res);
                self.update_flags(KEEP_HTIC, flags::logic(res));
            }
            Instruction::Fmul { d, r } => {
                let product = u16::from(self.register(d)) * u16::from(self.register(r));
                self.multiply_result(product, product << 1);
            }
            Instruction::Fmuls { d, r } => {
                let product = (i16::from(self.register(d) as i8) * i16::from(self.register(r) as i8)) as u16;
                self.multiply_result(product, product << 1);
            }
            Instruction::Fmulsu { d, r } => {
                let product = (i16::from(self.register(d) as i8) * i16::from(self.register(r))) as u16;
                self.multiply_result(product, product << 1);
            }
            Instruction::Icall => {
                self.push_return_address(self.pc + 1, self.pc22_bits());
                self.jump_absolute(u32::from(self.pointer(Pointer::Z)));
                self.cycles += self.call_cost(2);
            }
            Instruction::Ijmp => {
                self.jump_absolute(u32::from(self.pointer(Pointer::Z)));
                self.cycles += 1;
            }
            Instruction::In { d, a } => {
                let value = self.read_data(u16::from(a) + 32);
                self.set_register(d, value);
            }
            Instruction::Inc { d } => {
                let value = self.register(d);
                let res = value.wrapping_add(1);
                self.set_register(d, res);
                let f = byte_flags(res) | bit(value == 0x7f, V);
                self.update_flags(KEEP_HTIC, flags::with_sign(f));
            }
            Instruction::Jmp { k } => {
                self.jump_absolute(k);
                self.cycles += 2;
            }
            Instruction::Lac { d } => {
                self.read_modify_exchange(d, |mem, reg| mem & !reg);
            }
            Instruction::Las { d } => {
                self.read_modify_exchange(d, |mem, reg| mem | reg);
            }
            Instruction::Lat { d } => {
                self.read_modify_exchange(d, |mem, reg| mem ^ reg);
            }
            Instruction::Ld { d, pointer, mode } => {
                let addr = self.indirect_address(pointer, mode);
                let value = self.read_data(addr);
                self.set_register(d, value);
                self.cycles += 1;
            }
            Instruction::Ldi { d, k } => {
                self.set_register(d, k);
            }
            Instruction::Lds { d, k } => {
                let value = self.read_data(k);
                self.set_register(d, value);
                self.pc += 1;
                self.cycles += 1;
            }
            Instruction::Lpm { d, post_increment } => {
                let z = self.pointer(Pointer::Z);
                self.program_load(d, u32::from(z));
                if post_increment {
                    self.set_pointer(Pointer::Z, z.wrapping_add(1));
                }
            }
            Instruction::Lsr { d } => {
                let value = self.register(d);
                let res = value >> 1;
                self.set_register(d, res);
                self.update_flags(KEEP_HTI, flags::shift_right(res, value & 1 != 0));
            }
            Instruction::Mov { d, r } => {
                let value = self.register(r);
                self.set_register(d, value);
            }
            Instruction::Movw { d, r } => {
                let value = self.reg_pair(r);
                self.set_reg_pair(d, value);
            }
            Instruction::Mul { d, r } => {
                let product = u16::from(self.register(d)) * u16::from(self.register(r));
                self.multiply_result(product, product);
            }
            Instruction::Muls { d, r } => {
                let product = (i16::from(self.register(d) as i8) * i16::from(self.register(r) as i8)) as u16;
                self.multiply_result(product, product);
            }
            Instruction::Mulsu { d, r } => {
                let product = (i16::from(self.register(d) as i8) * i16::from(self.register(r))) as u16;
                self.multiply_result(product, product);
            }
            Instruction::Neg { d } => {
                let value = self.register(d);
                let res = 0u8.wrapping_sub(value);
                self.set_register(d, res);
                self.update_flags(KEEP_TI, flags::sub(0, value, res));
            }
            Instruction::Nop
            | Instruction::Break
            | Instruction::Sleep
            | Instruction::Spm { .. }
            | Instruction::Unknown(_) => {}
            Instruction::Or { d, r } => {
                let res = self.register(d) | self.register(r);
                self.set_register(d, res);
                self.update_flags(KEEP_HTIC, flags::logic(res));
            }
            Instruction::Ori { d, k } => {
                let res = self.register(d) | k;
                self.set_register(d, res);
                self.update_flags(KEEP_HTIC, flags::logic(res));
            }
            Instruction::Out { a, r } => {
                let value = self.register(r);
                self.write_data(u16::from(a) + 32, value);
            }
            Instruction::Pop { d } => {
                let sp = self.sp().wrapping_add(1);
                self.set_sp(sp);
                let value = self.data[sp];
                self.set_register(d, value);
                self.cycles += 1;
            }
            Instruction::Push { r } => {
                let sp = self.sp();
                self.data[sp] = self.register(r);
                self.set_sp(sp.wrapping_sub(1));
                self.cycles += 1;
            }
            Instruction::Rcall { k } => {
                self.push_return_address(self.pc + 1, self.pc22_bits());
                self.jump_relative(i64::from(k));
                self.cycles += self.call_cost(2);
            }
            Instruction::Ret => {
                let ret = self.pop_return_address();
                self.jump_absolute(ret);
                self.cycles += self.call_cost(3);
            }
            Instruction::Reti => {
                let ret = self.pop_return_address();
                self.jump_absolute(ret);
                self.cycles += self.call_cost(3);
                self.data[SREG] |= I;
            }
            Instruction::Rjmp { k } => {
                self.jump_relative(i64::from(k));
                self.cycles += 1;
            }
            Instruction::Ror { d } => {
                let value = self.register(d);
                let res = (value >> 1) | (u8::from(self.flag(C)) << 7);
                self.set_register(d, res);
                self.update_flags(KEEP_HTI, flags::shift_right(res, value & 1 != 0));
            }
            Instruction::Sbc { d, r } => {
                let (dv, rv) = (self.register(d), self.register(r));
                let res = self.compare_with_carry(dv, rv);
                self.set_register(d, res);
            }
            Instruction::Sbci { d, k } => {
                let dv = self.register(d);
                let res = self.compare_with_carry(dv, k);
                self.set_register(d, res);
            }
            Instruction::Sbi { a, b } => {
                let addr = u16::from(a) + 32;
                let mask = 1 << b;
                let value = self.read_data(addr);
                self.write_data_masked(addr, value | mask, mask);
                self.cycles += 1;
            }
            Instruction::Sbic { a, b } => {
                if self.read_data(u16::from(a) + 32) & (1 << b) == 0 {
                    self.skip_next();
                }
            }
            Instruction::Sbis { a, b } => {
                if self.read_data(u16::from(a) + 32) & (1 << b) != 0 {
                    self.skip_next();
                }
            }
            Instruction::Sbiw { d, k } => {
                let value = self.reg_pair(d);
                let res = value.wrapping_sub(u16::from(k));
                self.set_reg_pair(d, res);
                let f = word_flags(res)
                    | bit(value & !res & 0x8000 != 0, V)
                    | bit(res & !value & 0x8000 != 0, C);
                self.update_flags(KEEP_HTI, flags::with_sign(f));
                self.cycles += 1;
            }
            Instruction::Sbrc { r, b } => {
                if self.register(r) & (1 << b) == 0 {
                    self.skip_next();
                }
            }
            Instruction::Sbrs { r, b } => {
                if self.register(r) & (1 << b) != 0 {
                    self.skip_next();
                }
            }
            Instruction::St { pointer, mode, r } => {
                let value = self.register(r);
                let addr = self.indirect_address(pointer, mode);
                self.write_data(addr, value);
                self.cycles += 1;
            }
            Instruction::Sts { k, r } => {
                let value = self.register(r);
                self.write_data(k, value);
                self.pc += 1;
                self.cycles += 1;
            }
            Instruction::Sub { d, r } => {
                let (dv, rv) = (self.register(d), self.register(r));
                let res = self.compare(dv, rv);
                self.set_register(d, res);
            }
            Instruction::Subi { d, k } => {
                let dv = self.register(d);
                let res = self.compare(dv, k);
                self.set_register(d, res);
            }
            Instruction::Swap { d } => {
                let value = self.register(d);
                self.set_register(d, value.rotate_left(4));
            }
            Instruction::Wdr => self.watchdog_reset(),
            Instruction::Xch { d } => {
                let z = self.pointer(Pointer::Z);
                let value = self.data[z];
                self.data[z] = self.register(d);
                self.set_register(d, value);
                self.cycles += 1;
            }
        }
    }

    /// LAC/LAS/LAT: store `op(memory, register)` at Z, load the old memory
    /// byte into the register.
    fn read_modify_exchange(&mut self, d: u8, op: impl FnOnce(u8, u8) -> u8) {
        let z = self.pointer(Pointer::Z);
        let value = self.read_data(z);
        let reg = self.register(d);
        self.write_data(z, op(value, reg));
        self.set_register(d, value);
        self.cycles += 1;
    }
}

const fn bit(condition: bool, flag: u8) -> u8 {
    if condition { flag } else { 0 }
}

/// N and Z of an 8-bit result.
const fn byte_flags(res: u8) -> u8 {
    bit(res & 0x80 != 0, N) | bit(res == 0, Z)
}

/// N and Z of a 16-bit result.
const fn word_flags(res: u16) -> u8 {
    bit(res & 0x8000 != 0, N) | bit(res == 0, Z)
}
