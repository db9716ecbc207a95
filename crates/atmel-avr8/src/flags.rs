//! AVR status register (SREG).
//!
//! SREG is memory-mapped at data address 95. Arithmetic instructions
//! recompute the low six flags from their operands and result; T and I are
//! only touched by the bit-transfer and interrupt instructions.

/// Carry flag.
pub const C: u8 = 0x01;

/// Zero flag.
pub const Z: u8 = 0x02;

/// Negative flag - bit 7 of the result.
pub const N: u8 = 0x04;

/// Two's complement overflow flag.
pub const V: u8 = 0x08;

/// Sign flag - always `N ^ V`.
pub const S: u8 = 0x10;

/// Half carry flag - carry out of (or borrow into) bit 3.
pub const H: u8 = 0x20;

/// Bit copy storage, used by BLD and BST.
pub const T: u8 = 0x40;

/// Global interrupt enable.
pub const I: u8 = 0x80;

/// Status register value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Status(pub u8);

impl Status {
    /// Check if a flag is set.
    #[must_use]
    pub const fn is_set(self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    /// Set a flag.
    pub fn set(&mut self, flag: u8) {
        self.0 |= flag;
    }

    /// Clear a flag.
    pub fn clear(&mut self, flag: u8) {
        self.0 &= !flag;
    }

    /// Set or clear a flag based on condition.
    pub fn set_if(&mut self, flag: u8, condition: bool) {
        if condition {
            self.set(flag);
        } else {
            self.clear(flag);
        }
    }

    /// Replace the bits outside `keep` with `flags`.
    #[must_use]
    pub const fn merge(self, keep: u8, flags: u8) -> Self {
        Self((self.0 & keep) | (flags & !keep))
    }
}

/// Derive S from the N and V bits already present in `flags`.
#[must_use]
pub const fn with_sign(flags: u8) -> u8 {
    let n = flags & N != 0;
    let v = flags & V != 0;
    if n ^ v { flags | S } else { flags & !S }
}

const fn bit(condition: bool, flag: u8) -> u8 {
    if condition { flag } else { 0 }
}

/// H, S, V, N, Z and C after `d + r (+ carry) = res`.
#[must_use]
pub const fn add(d: u8, r: u8, res: u8) -> u8 {
    let carries = (d & r) | (r & !res) | (!res & d);
    let overflow = (d & r & !res) | (!d & !r & res);
    with_sign(
        bit(carries & 0x08 != 0, H)
            | bit(overflow & 0x80 != 0, V)
            | bit(res & 0x80 != 0, N)
            | bit(res == 0, Z)
            | bit(carries & 0x80 != 0, C),
    )
}

/// H, S, V, N, Z and C after `d - r = res`.
#[must_use]
pub const fn sub(d: u8, r: u8, res: u8) -> u8 {
    let borrows = (!d & r) | (r & res) | (res & !d);
    let overflow = (d & !r & !res) | (!d & r & res);
    with_sign(
        bit(borrows & 0x08 != 0, H)
            | bit(overflow & 0x80 != 0, V)
            | bit(res & 0x80 != 0, N)
            | bit(res == 0, Z)
            | bit(borrows & 0x80 != 0, C),
    )
}

/// Flags after `d - r - carry = res` (CPC, SBC, SBCI).
///
/// Z is sticky: it can only stay set, so multi-byte compares chain.
#[must_use]
pub const fn sub_with_carry(d: u8, r: u8, res: u8, previous: u8) -> u8 {
    let flags = sub(d, r, res);
    if previous & Z == 0 { flags & !Z } else { flags }
}

/// S, V, N and Z after a logical operation (V always cleared).
#[must_use]
pub const fn logic(res: u8) -> u8 {
    with_sign(bit(res & 0x80 != 0, N) | bit(res == 0, Z))
}

/// S, V, N, Z and C after a right shift or rotate that shifted out `carry`.
#[must_use]
pub const fn shift_right(res: u8, carry: bool) -> u8 {
    let n = res & 0x80 != 0;
    with_sign(bit(n ^ carry, V) | bit(n, N) | bit(res == 0, Z) | bit(carry, C))
}

/// Z and C after a multiply, with C taken from bit 15 of `carry_source`.
#[must_use]
pub const fn multiply(res: u16, carry_source: u16) -> u8 {
    bit(res == 0, Z) | bit(carry_source & 0x8000 != 0, C)
}
