//! Instruction decoding.
//!
//! Opcodes are matched against the instruction set's bit patterns in a fixed
//! order. Some encodings overlap (LD Y is LDD Y+0, ORI is SBR, CLR is EOR),
//! and the order below resolves every overlap the same way each time.

use std::fmt;

/// Index register used by indirect loads and stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pointer {
    X,
    Y,
    Z,
}

impl Pointer {
    /// Data address of the pointer's low byte.
    #[must_use]
    pub const fn address(self) -> u16 {
        match self {
            Pointer::X => crate::memory::X,
            Pointer::Y => crate::memory::Y,
            Pointer::Z => crate::memory::Z,
        }
    }
}

/// Indirect addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indirect {
    Plain,
    PostIncrement,
    PreDecrement,
    /// Unsigned 6-bit displacement (LDD/STD, Y and Z only).
    Displacement(u8),
}

/// A decoded instruction.
///
/// Register operands are register numbers (0-31), `a` operands are I/O
/// addresses (data address minus 32), branch offsets are in words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Adc { d: u8, r: u8 },
    Add { d: u8, r: u8 },
    Adiw { d: u8, k: u8 },
    And { d: u8, r: u8 },
    Andi { d: u8, k: u8 },
    Asr { d: u8 },
    Bclr { s: u8 },
    Bld { d: u8, b: u8 },
    Brbc { s: u8, k: i8 },
    Brbs { s: u8, k: i8 },
    Break,
    Bset { s: u8 },
    Bst { d: u8, b: u8 },
    Call { k: u32 },
    Cbi { a: u8, b: u8 },
    Com { d: u8 },
    Cp { d: u8, r: u8 },
    Cpc { d: u8, r: u8 },
    Cpi { d: u8, k: u8 },
    Cpse { d: u8, r: u8 },
    Dec { d: u8 },
    Eicall,
    Eijmp,
    Elpm { d: u8, post_increment: bool },
    Eor { d: u8, r: u8 },
    Fmul { d: u8, r: u8 },
    Fmuls { d: u8, r: u8 },
    Fmulsu { d: u8, r: u8 },
    Icall,
    Ijmp,
    In { d: u8, a: u8 },
    Inc { d: u8 },
    Jmp { k: u32 },
    Lac { d: u8 },
    Las { d: u8 },
    Lat { d: u8 },
    Ld { d: u8, pointer: Pointer, mode: Indirect },
    Ldi { d: u8, k: u8 },
    Lds { d: u8, k: u16 },
    Lpm { d: u8, post_increment: bool },
    Lsr { d: u8 },
    Mov { d: u8, r: u8 },
    Movw { d: u8, r: u8 },
    Mul { d: u8, r: u8 },
    Muls { d: u8, r: u8 },
    Mulsu { d: u8, r: u8 },
    Neg { d: u8 },
    Nop,
    Or { d: u8, r: u8 },
    Ori { d: u8, k: u8 },
    Out { a: u8, r: u8 },
    Pop { d: u8 },
    Push { r: u8 },
    Rcall { k: i16 },
    Ret,
    Reti,
    Rjmp { k: i16 },
    Ror { d: u8 },
    Sbc { d: u8, r: u8 },
    Sbci { d: u8, k: u8 },
    Sbi { a: u8, b: u8 },
    Sbic { a: u8, b: u8 },
    Sbis { a: u8, b: u8 },
    Sbiw { d: u8, k: u8 },
    Sbrc { r: u8, b: u8 },
    Sbrs { r: u8, b: u8 },
    Sleep,
    Spm { post_increment: bool },
    St { pointer: Pointer, mode: Indirect, r: u8 },
    Sts { k: u16, r: u8 },
    Sub { d: u8, r: u8 },
    Subi { d: u8, k: u8 },
    Swap { d: u8 },
    Wdr,
    Xch { d: u8 },
    /// Reserved or unimplemented encoding; executes as a no-op.
    Unknown(u16),
}

/// True for opcodes that take a second word (LDS, STS, CALL, JMP).
#[must_use]
pub const fn is_two_word(opcode: u16) -> bool {
    (opcode & 0xfe0f) == 0x9000
        || (opcode & 0xfe0f) == 0x9200
        || (opcode & 0xfe0e) == 0x940e
        || (opcode & 0xfe0e) == 0x940c
}

impl Instruction {
    /// Decode `opcode`; `next` is the following program word, consumed only
    /// by two-word instructions.
    #[must_use]
    pub fn decode(opcode: u16, next: u16) -> Self {
        // Common operand fields.
        let d = ((opcode & 0x1f0) >> 4) as u8;
        let r = ((opcode & 0xf) | ((opcode & 0x200) >> 5)) as u8;
        let d_hi = (((opcode & 0xf0) >> 4) + 16) as u8;
        let k_imm = ((opcode & 0xf) | ((opcode & 0xf00) >> 4)) as u8;
        let b = (opcode & 7) as u8;
        let io_bit = ((opcode & 0xf8) >> 3) as u8;
        let io = ((opcode & 0xf) | ((opcode & 0x600) >> 5)) as u8;
        let q = ((opcode & 7) | ((opcode & 0xc00) >> 7) | ((opcode & 0x2000) >> 8)) as u8;
        let word_pair = (2 * ((opcode & 0x30) >> 4) + 24) as u8;
        let k_word = ((opcode & 0xf) | ((opcode & 0xc0) >> 2)) as u8;
        let branch = (((opcode & 0x1f8) >> 3) as i16 - if opcode & 0x200 != 0 { 0x40 } else { 0 }) as i8;
        let relative = (opcode & 0x7ff) as i16 - if opcode & 0x800 != 0 { 0x800 } else { 0 };
        let long = u32::from(next) | (u32::from(opcode & 1) << 16) | (u32::from(opcode & 0x1f0) << 13);
        let mul_d = (((opcode & 0x70) >> 4) + 16) as u8;
        let mul_r = ((opcode & 7) + 16) as u8;

        if (opcode & 0xfc00) == 0x1c00 {
            Self::Adc { d, r }
        } else if (opcode & 0xfc00) == 0x0c00 {
            Self::Add { d, r }
        } else if (opcode & 0xff00) == 0x9600 {
            Self::Adiw { d: word_pair, k: k_word }
        } else if (opcode & 0xfc00) == 0x2000 {
            Self::And { d, r }
        } else if (opcode & 0xf000) == 0x7000 {
            Self::Andi { d: d_hi, k: k_imm }
        } else if (opcode & 0xfe0f) == 0x9405 {
            Self::Asr { d }
        } else if (opcode & 0xff8f) == 0x9488 {
            Self::Bclr { s: ((opcode & 0x70) >> 4) as u8 }
        } else if (opcode & 0xfe08) == 0xf800 {
            Self::Bld { d, b }
        } else if (opcode & 0xfc00) == 0xf400 {
            Self::Brbc { s: b, k: branch }
        } else if (opcode & 0xfc00) == 0xf000 {
            Self::Brbs { s: b, k: branch }
        } else if (opcode & 0xff8f) == 0x9408 {
            Self::Bset { s: ((opcode & 0x70) >> 4) as u8 }
        } else if (opcode & 0xfe08) == 0xfa00 {
            Self::Bst { d, b }
        } else if (opcode & 0xfe0e) == 0x940e {
            Self::Call { k: long }
        } else if (opcode & 0xff00) == 0x9800 {
            Self::Cbi { a: io_bit, b }
        } else if (opcode & 0xfe0f) == 0x9400 {
            Self::Com { d }
        } else if (opcode & 0xfc00) == 0x1400 {
            Self::Cp { d, r }
        } else if (opcode & 0xfc00) == 0x0400 {
            Self::Cpc { d, r }
        } else if (opcode & 0xf000) == 0x3000 {
            Self::Cpi { d: d_hi, k: k_imm }
        } else if (opcode & 0xfc00) == 0x1000 {
            Self::Cpse { d, r }
        } else if (opcode & 0xfe0f) == 0x940a {
            Self::Dec { d }
        } else if opcode == 0x9519 {
            Self::Eicall
        } else if opcode == 0x9419 {
            Self::Eijmp
        } else if opcode == 0x95d8 {
            Self::Elpm { d: 0, post_increment: false }
        } else if (opcode & 0xfe0f) == 0x9006 {
            Self::Elpm { d, post_increment: false }
        } else if (opcode & 0xfe0f) == 0x9007 {
            Self::Elpm { d, post_increment: true }
        } else if (opcode & 0xfc00) == 0x2400 {
            Self::Eor { d, r }
        } else if (opcode & 0xff88) == 0x0308 {
            Self::Fmul { d: mul_d, r: mul_r }
        } else if (opcode & 0xff88) == 0x0380 {
            Self::Fmuls { d: mul_d, r: mul_r }
        } else if (opcode & 0xff88) == 0x0388 {
            Self::Fmulsu { d: mul_d, r: mul_r }
        } else if opcode == 0x9509 {
            Self::Icall
        } else if opcode == 0x9409 {
            Self::Ijmp
        } else if (opcode & 0xf800) == 0xb000 {
            Self::In { d, a: io }
        } else if (opcode & 0xfe0f) == 0x9403 {
            Self::Inc { d }
        } else if (opcode & 0xfe0e) == 0x940c {
            Self::Jmp { k: long }
        } else if (opcode & 0xfe0f) == 0x9206 {
            Self::Lac { d }
        } else if (opcode & 0xfe0f) == 0x9205 {
            Self::Las { d }
        } else if (opcode & 0xfe0f) == 0x9207 {
            Self::Lat { d }
        } else if (opcode & 0xf000) == 0xe000 {
            Self::Ldi { d: d_hi, k: k_imm }
        } else if (opcode & 0xfe0f) == 0x9000 {
            Self::Lds { d, k: next }
        } else if let Some((pointer, mode)) = load_store_mode(opcode, 0x9000, 0x8000, q) {
            Self::Ld { d, pointer, mode }
        } else if opcode == 0x95c8 {
            Self::Lpm { d: 0, post_increment: false }
        } else if (opcode & 0xfe0f) == 0x9004 {
            Self::Lpm { d, post_increment: false }
        } else if (opcode & 0xfe0f) == 0x9005 {
            Self::Lpm { d, post_increment: true }
        } else if (opcode & 0xfe0f) == 0x9406 {
            Self::Lsr { d }
        } else if (opcode & 0xfc00) == 0x2c00 {
            Self::Mov { d, r }
        } else if (opcode & 0xff00) == 0x0100 {
            Self::Movw {
                d: (2 * ((opcode & 0xf0) >> 4)) as u8,
                r: (2 * (opcode & 0xf)) as u8,
            }
        } else if (opcode & 0xfc00) == 0x9c00 {
            Self::Mul { d, r }
        } else if (opcode & 0xff00) == 0x0200 {
            Self::Muls { d: d_hi, r: ((opcode & 0xf) + 16) as u8 }
        } else if (opcode & 0xff88) == 0x0300 {
            Self::Mulsu { d: mul_d, r: mul_r }
        } else if (opcode & 0xfe0f) == 0x9401 {
            Self::Neg { d }
        } else if opcode == 0 {
            Self::Nop
        } else if (opcode & 0xfc00) == 0x2800 {
            Self::Or { d, r }
        } else if (opcode & 0xf000) == 0x6000 {
            Self::Ori { d: d_hi, k: k_imm }
        } else if (opcode & 0xf800) == 0xb800 {
            Self::Out { a: io, r: d }
        } else if (opcode & 0xfe0f) == 0x900f {
            Self::Pop { d }
        } else if (opcode & 0xfe0f) == 0x920f {
            Self::Push { r: d }
        } else if (opcode & 0xf000) == 0xd000 {
            Self::Rcall { k: relative }
        } else if opcode == 0x9508 {
            Self::Ret
        } else if opcode == 0x9518 {
            Self::Reti
        } else if (opcode & 0xf000) == 0xc000 {
            Self::Rjmp { k: relative }
        } else if (opcode & 0xfe0f) == 0x9407 {
            Self::Ror { d }
        } else if (opcode & 0xfc00) == 0x0800 {
            Self::Sbc { d, r }
        } else if (opcode & 0xf000) == 0x4000 {
            Self::Sbci { d: d_hi, k: k_imm }
        } else if (opcode & 0xff00) == 0x9a00 {
            Self::Sbi { a: io_bit, b }
        } else if (opcode & 0xff00) == 0x9900 {
            Self::Sbic { a: io_bit, b }
        } else if (opcode & 0xff00) == 0x9b00 {
            Self::Sbis { a: io_bit, b }
        } else if (opcode & 0xff00) == 0x9700 {
            Self::Sbiw { d: word_pair, k: k_word }
        } else if (opcode & 0xfe08) == 0xfc00 {
            Self::Sbrc { r: d, b }
        } else if (opcode & 0xfe08) == 0xfe00 {
            Self::Sbrs { r: d, b }
        } else if opcode == 0x9588 {
            Self::Sleep
        } else if opcode == 0x9598 {
            Self::Break
        } else if opcode == 0x95e8 {
            Self::Spm { post_increment: false }
        } else if opcode == 0x95f8 {
            Self::Spm { post_increment: true }
        } else if (opcode & 0xfe0f) == 0x9200 {
            Self::Sts { k: next, r: d }
        } else if let Some((pointer, mode)) = load_store_mode(opcode, 0x9200, 0x8200, q) {
            Self::St { pointer, mode, r: d }
        } else if (opcode & 0xfc00) == 0x1800 {
            Self::Sub { d, r }
        } else if (opcode & 0xf000) == 0x5000 {
            Self::Subi { d: d_hi, k: k_imm }
        } else if (opcode & 0xfe0f) == 0x9402 {
            Self::Swap { d }
        } else if opcode == 0x95a8 {
            Self::Wdr
        } else if (opcode & 0xfe0f) == 0x9204 {
            Self::Xch { d }
        } else {
            Self::Unknown(opcode)
        }
    }

    /// Program words occupied by this instruction.
    #[must_use]
    pub const fn words(&self) -> u32 {
        match self {
            Self::Call { .. } | Self::Jmp { .. } | Self::Lds { .. } | Self::Sts { .. } => 2,
            _ => 1,
        }
    }
}

/// Match the LD (or ST) family. `indexed` is the `1001 00x` prefix of the
/// X/Y+/-Y/Z+/-Z forms, `plain` the `10q0 qqx` prefix of the Y/Z and
/// displacement forms.
fn load_store_mode(opcode: u16, indexed: u16, plain: u16, q: u8) -> Option<(Pointer, Indirect)> {
    let low = opcode & 0xfe0f;
    let mode = if low == indexed | 0xc {
        (Pointer::X, Indirect::Plain)
    } else if low == indexed | 0xd {
        (Pointer::X, Indirect::PostIncrement)
    } else if low == indexed | 0xe {
        (Pointer::X, Indirect::PreDecrement)
    } else if low == plain | 0x8 {
        (Pointer::Y, Indirect::Plain)
    } else if low == indexed | 0x9 {
        (Pointer::Y, Indirect::PostIncrement)
    } else if low == indexed | 0xa {
        (Pointer::Y, Indirect::PreDecrement)
    } else if (opcode & 0xd208) == plain | 0x8 && q != 0 {
        (Pointer::Y, Indirect::Displacement(q))
    } else if low == plain {
        (Pointer::Z, Indirect::Plain)
    } else if low == indexed | 0x1 {
        (Pointer::Z, Indirect::PostIncrement)
    } else if low == indexed | 0x2 {
        (Pointer::Z, Indirect::PreDecrement)
    } else if (opcode & 0xd208) == plain && q != 0 {
        (Pointer::Z, Indirect::Displacement(q))
    } else {
        return None;
    };
    Some(mode)
}

fn indirect(f: &mut fmt::Formatter<'_>, pointer: Pointer, mode: Indirect) -> fmt::Result {
    let name = match pointer {
        Pointer::X => "X",
        Pointer::Y => "Y",
        Pointer::Z => "Z",
    };
    match mode {
        Indirect::Plain => write!(f, "{name}"),
        Indirect::PostIncrement => write!(f, "{name}+"),
        Indirect::PreDecrement => write!(f, "-{name}"),
        Indirect::Displacement(q) => write!(f, "{name}+{q}"),
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Adc { d, r } => write!(f, "adc r{d}, r{r}"),
            Self::Add { d, r } => write!(f, "add r{d}, r{r}"),
            Self::Adiw { d, k } => write!(f, "adiw r{d}, {k}"),
            Self::And { d, r } => write!(f, "and r{d}, r{r}"),
            Self::Andi { d, k } => write!(f, "andi r{d}, {k:#04x}"),
            Self::Asr { d } => write!(f, "asr r{d}"),
            Self::Bclr { s } => write!(f, "bclr {s}"),
            Self::Bld { d, b } => write!(f, "bld r{d}, {b}"),
            Self::Brbc { s, k } => write!(f, "brbc {s}, .{:+}", i16::from(k) * 2),
            Self::Brbs { s, k } => write!(f, "brbs {s}, .{:+}", i16::from(k) * 2),
            Self::Break => write!(f, "break"),
            Self::Bset { s } => write!(f, "bset {s}"),
            Self::Bst { d, b } => write!(f, "bst r{d}, {b}"),
            Self::Call { k } => write!(f, "call {:#x}", k * 2),
            Self::Cbi { a, b } => write!(f, "cbi {a:#04x}, {b}"),
            Self::Com { d } => write!(f, "com r{d}"),
            Self::Cp { d, r } => write!(f, "cp r{d}, r{r}"),
            Self::Cpc { d, r } => write!(f, "cpc r{d}, r{r}"),
            Self::Cpi { d, k } => write!(f, "cpi r{d}, {k:#04x}"),
            Self::Cpse { d, r } => write!(f, "cpse r{d}, r{r}"),
            Self::Dec { d } => write!(f, "dec r{d}"),
            Self::Eicall => write!(f, "eicall"),
            Self::Eijmp => write!(f, "eijmp"),
            Self::Elpm { d, post_increment } => {
                write!(f, "elpm r{d}, Z{}", if post_increment { "+" } else { "" })
            }
            Self::Eor { d, r } => write!(f, "eor r{d}, r{r}"),
            Self::Fmul { d, r } => write!(f, "fmul r{d}, r{r}"),
            Self::Fmuls { d, r } => write!(f, "fmuls r{d}, r{r}"),
            Self::Fmulsu { d, r } => write!(f, "fmulsu r{d}, r{r}"),
            Self::Icall => write!(f, "icall"),
            Self::Ijmp => write!(f, "ijmp"),
            Self::In { d, a } => write!(f, "in r{d}, {a:#04x}"),
            Self::Inc { d } => write!(f, "inc r{d}"),
            Self::Jmp { k } => write!(f, "jmp {:#x}", k * 2),
            Self::Lac { d } => write!(f, "lac Z, r{d}"),
            Self::Las { d } => write!(f, "las Z, r{d}"),
            Self::Lat { d } => write!(f, "lat Z, r{d}"),
            Self::Ld { d, pointer, mode } => {
                let op = if matches!(mode, Indirect::Displacement(_)) { "ldd" } else { "ld" };
                write!(f, "{op} r{d}, ")?;
                indirect(f, pointer, mode)
            }
            Self::Ldi { d, k } => write!(f, "ldi r{d}, {k:#04x}"),
            Self::Lds { d, k } => write!(f, "lds r{d}, {k:#06x}"),
            Self::Lpm { d, post_increment } => {
                write!(f, "lpm r{d}, Z{}", if post_increment { "+" } else { "" })
            }
            Self::Lsr { d } => write!(f, "lsr r{d}"),
            Self::Mov { d, r } => write!(f, "mov r{d}, r{r}"),
            Self::Movw { d, r } => write!(f, "movw r{d}, r{r}"),
            Self::Mul { d, r } => write!(f, "mul r{d}, r{r}"),
            Self::Muls { d, r } => write!(f, "muls r{d}, r{r}"),
            Self::Mulsu { d, r } => write!(f, "mulsu r{d}, r{r}"),
            Self::Neg { d } => write!(f, "neg r{d}"),
            Self::Nop => write!(f, "nop"),
            Self::Or { d, r } => write!(f, "or r{d}, r{r}"),
            Self::Ori { d, k } => write!(f, "ori r{d}, {k:#04x}"),
            Self::Out { a, r } => write!(f, "out {a:#04x}, r{r}"),
            Self::Pop { d } => write!(f, "pop r{d}"),
            Self::Push { r } => write!(f, "push r{r}"),
            Self::Rcall { k } => write!(f, "rcall .{:+}", i32::from(k) * 2),
            Self::Ret => write!(f, "ret"),
            Self::Reti => write!(f, "reti"),
            Self::Rjmp { k } => write!(f, "rjmp .{:+}", i32::from(k) * 2),
            Self::Ror { d } => write!(f, "ror r{d}"),
            Self::Sbc { d, r } => write!(f, "sbc r{d}, r{r}"),
            Self::Sbci { d, k } => write!(f, "sbci r{d}, {k:#04x}"),
            Self::Sbi { a, b } => write!(f, "sbi {a:#04x}, {b}"),
            Self::Sbic { a, b } => write!(f, "sbic {a:#04x}, {b}"),
            Self::Sbis { a, b } => write!(f, "sbis {a:#04x}, {b}"),
            Self::Sbiw { d, k } => write!(f, "sbiw r{d}, {k}"),
            Self::Sbrc { r, b } => write!(f, "sbrc r{r}, {b}"),
            Self::Sbrs { r, b } => write!(f, "sbrs r{r}, {b}"),
            Self::Sleep => write!(f, "sleep"),
            Self::Spm { post_increment } => {
                write!(f, "spm{}", if post_increment { " Z+" } else { "" })
            }
            Self::St { pointer, mode, r } => {
                let op = if matches!(mode, Indirect::Displacement(_)) { "std" } else { "st" };
                write!(f, "{op} ")?;
                indirect(f, pointer, mode)?;
                write!(f, ", r{r}")
            }
            Self::Sts { k, r } => write!(f, "sts {k:#06x}, r{r}"),
            Self::Sub { d, r } => write!(f, "sub r{d}, r{r}"),
            Self::Subi { d, k } => write!(f, "subi r{d}, {k:#04x}"),
            Self::Swap { d } => write!(f, "swap r{d}"),
            Self::Wdr => write!(f, "wdr"),
            Self::Xch { d } => write!(f, "xch Z, r{d}"),
            Self::Unknown(opcode) => write!(f, ".word {opcode:#06x}"),
        }
    }
}
