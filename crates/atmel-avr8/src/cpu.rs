//! AVR CPU state and the per-instruction driver.
//!
//! Unlike the bus-cycle cores in this workspace, an AVR step executes a
//! whole instruction and charges its cycle cost at once. Peripherals keep
//! time through clock events rather than being ticked every cycle.

use std::fmt;

use tracing::{Level, debug, trace, warn};

use crate::clock::ClockEvents;
use crate::config::CpuConfig;
use crate::error::{CpuError, Result};
use crate::flags::{self, Status};
use crate::hooks::{HookTable, ReadHook, WriteHook};
use crate::instruction::Instruction;
use crate::interrupt::InterruptTable;
use crate::memory::{DataSpace, ProgramMemory, SP, SREG, X, Y, Z};
use crate::observable::{Observable, Value};

/// Program sizes above this many words need a 3-byte return address.
const PC16_WORDS: usize = 0x1_0000;

/// Watchdog notification, invoked by WDR.
pub type WatchdogHandler = Box<dyn FnMut(&mut Cpu)>;

/// An AVR 8-bit CPU with its program and data memories.
pub struct Cpu {
    pub(crate) data: DataSpace,
    pub(crate) program: ProgramMemory,
    /// Word address of the next instruction.
    pub(crate) pc: u32,
    pub(crate) cycles: u64,
    pc22_bits: bool,
    config: CpuConfig,
    pub(crate) read_hooks: HookTable<ReadHook>,
    pub(crate) write_hooks: HookTable<WriteHook>,
    pub(crate) interrupts: InterruptTable,
    pub(crate) clock: ClockEvents,
    watchdog: Option<WatchdogHandler>,
}

impl Cpu {
    /// Create a CPU running `program` with `sram_bytes` of SRAM.
    pub fn new(program: &[u16], sram_bytes: usize) -> Result<Self> {
        Self::with_config(program, CpuConfig::default().with_sram_bytes(sram_bytes))
    }

    /// Create a CPU from a little-endian flash image.
    pub fn from_bytes(program: &[u8], sram_bytes: usize) -> Result<Self> {
        Self::build(
            ProgramMemory::from_bytes(program),
            CpuConfig::default().with_sram_bytes(sram_bytes),
        )
    }

    pub fn with_config(program: &[u16], config: CpuConfig) -> Result<Self> {
        Self::build(ProgramMemory::from_words(program), config)
    }

    fn build(program: ProgramMemory, config: CpuConfig) -> Result<Self> {
        config.validate()?;
        if program.is_empty() {
            return Err(CpuError::EmptyProgram);
        }
        let mut cpu = Self {
            data: DataSpace::new(config.sram_bytes),
            pc22_bits: program.len() > PC16_WORDS,
            program,
            pc: 0,
            cycles: 0,
            config,
            read_hooks: HookTable::new(),
            write_hooks: HookTable::new(),
            interrupts: InterruptTable::new(),
            clock: ClockEvents::new(),
            watchdog: None,
        };
        cpu.reset();
        Ok(cpu)
    }

    /// PC to 0, SP to the top of SRAM, pending interrupts and clock events
    /// dropped. Memory, hooks and the cycle counter are kept.
    pub fn reset(&mut self) {
        self.pc = 0;
        let top = (self.data.len() - 1) as u16;
        self.data.write_u16_le(SP, top);
        self.interrupts.clear_all();
        self.clock.clear_all();
        debug!(sp = top, cycles = self.cycles, "reset");
    }

    // === State ===

    #[must_use]
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Set the PC, wrapping modulo the program length.
    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc % self.program_len();
    }

    #[must_use]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn set_cycles(&mut self, cycles: u64) {
        self.cycles = cycles;
    }

    #[must_use]
    pub fn sp(&self) -> u16 {
        self.data.read_u16_le(SP)
    }

    pub fn set_sp(&mut self, sp: u16) {
        self.data.write_u16_le(SP, sp);
    }

    #[must_use]
    pub fn sreg(&self) -> u8 {
        self.data[SREG]
    }

    pub fn set_sreg(&mut self, sreg: u8) {
        self.data[SREG] = sreg;
    }

    #[must_use]
    pub fn status(&self) -> Status {
        Status(self.data[SREG])
    }

    #[must_use]
    pub fn interrupts_enabled(&self) -> bool {
        self.status().is_set(flags::I)
    }

    /// True when return addresses take three bytes on the stack.
    #[must_use]
    pub fn pc22_bits(&self) -> bool {
        self.pc22_bits
    }

    /// Program length in words.
    #[must_use]
    pub fn program_len(&self) -> u32 {
        self.program.len() as u32
    }

    #[must_use]
    pub fn config(&self) -> &CpuConfig {
        &self.config
    }

    // === Memory ===

    /// Raw data space, bypassing hooks.
    #[must_use]
    pub fn data(&self) -> &DataSpace {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut DataSpace {
        &mut self.data
    }

    #[must_use]
    pub fn program(&self) -> &ProgramMemory {
        &self.program
    }

    #[must_use]
    pub fn program_word(&self, addr: u32) -> u16 {
        self.program.word(addr)
    }

    #[must_use]
    pub fn program_byte(&self, addr: u32) -> u8 {
        self.program.byte(addr)
    }

    pub fn set_program_word(&mut self, addr: u32, value: u16) {
        self.program.set_word(addr, value);
    }

    pub fn set_program_byte(&mut self, addr: u32, value: u8) {
        self.program.set_byte(addr, value);
    }

    /// Copy `words` to the start of flash. Flash size is unchanged.
    pub fn load_program_words(&mut self, words: &[u16]) -> Result<()> {
        self.program.load_words(words)
    }

    /// Copy a byte image to the start of flash. Flash size is unchanged.
    pub fn load_program_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.program.load_bytes(bytes)
    }

    // === Watchdog ===

    /// Install the callback WDR invokes.
    pub fn set_watchdog_reset_handler(&mut self, handler: impl FnMut(&mut Cpu) + 'static) {
        self.watchdog = Some(Box::new(handler));
    }

    pub fn clear_watchdog_reset_handler(&mut self) -> bool {
        self.watchdog.take().is_some()
    }

    pub(crate) fn watchdog_reset(&mut self) {
        debug!(pc = self.pc, cycles = self.cycles, "watchdog reset");
        if let Some(mut handler) = self.watchdog.take() {
            handler(self);
            // Keep a handler the callback installed in its place.
            if self.watchdog.is_none() {
                self.watchdog = Some(handler);
            }
        }
    }

    // === Stack ===

    /// Push a return address, low byte at the highest address.
    pub(crate) fn push_return_address(&mut self, ret: u32, three_bytes: bool) {
        let sp = self.sp();
        self.data[sp] = ret as u8;
        self.data[sp.wrapping_sub(1)] = (ret >> 8) as u8;
        if three_bytes {
            self.data[sp.wrapping_sub(2)] = (ret >> 16) as u8;
            self.set_sp(sp.wrapping_sub(3));
        } else {
            self.set_sp(sp.wrapping_sub(2));
        }
    }

    /// Pop a return address pushed by `push_return_address`.
    pub(crate) fn pop_return_address(&mut self) -> u32 {
        let sp = self.sp();
        let (ret, width) = if self.pc22_bits {
            let ret = u32::from(self.data[sp.wrapping_add(1)]) << 16
                | u32::from(self.data[sp.wrapping_add(2)]) << 8
                | u32::from(self.data[sp.wrapping_add(3)]);
            (ret, 3)
        } else {
            let ret = u32::from(self.data[sp.wrapping_add(1)]) << 8
                | u32::from(self.data[sp.wrapping_add(2)]);
            (ret, 2)
        };
        self.set_sp(sp.wrapping_add(width));
        ret
    }

    /// Reduce a signed word address into the program.
    pub(crate) fn wrap_pc(&self, target: i64) -> u32 {
        target.rem_euclid(i64::from(self.program_len())) as u32
    }

    // === Execution ===

    /// Decode and execute the instruction at PC.
    ///
    /// In strict mode an unknown opcode returns an error and leaves the CPU
    /// untouched; otherwise it executes as a one-cycle no-op.
    pub fn step(&mut self) -> Result<()> {
        let opcode = self.program.word(self.pc);
        let instruction = Instruction::decode(opcode, self.program.word(self.pc + 1));
        if tracing::enabled!(Level::TRACE) {
            trace!(pc = self.pc, opcode, cycles = self.cycles, "{instruction}");
        }
        if let Instruction::Unknown(opcode) = instruction
            && self.config.strict_opcodes
        {
            warn!(pc = self.pc, opcode, "unknown opcode");
            return Err(CpuError::UnknownOpcode { pc: self.pc, opcode });
        }
        self.execute(instruction);
        self.pc = (self.pc + 1) % self.program_len();
        self.cycles += 1;
        Ok(())
    }

    /// Between-instruction service: fire at most one due clock event, then
    /// dispatch at most one pending interrupt.
    pub fn tick(&mut self) {
        self.service_clock_event();
        self.service_interrupt();
    }

    /// Register value (r0-r31).
    #[must_use]
    pub fn register(&self, r: u8) -> u8 {
        self.data[u16::from(r)]
    }

    pub fn set_register(&mut self, r: u8, value: u8) {
        self.data[u16::from(r)] = value;
    }
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("pc", &self.pc)
            .field("cycles", &self.cycles)
            .field("sp", &self.sp())
            .field("sreg", &self.sreg())
            .field("program_len", &self.program.len())
            .field("data_len", &self.data.len())
            .field("pc22_bits", &self.pc22_bits)
            .field("read_hooks", &self.read_hooks)
            .field("write_hooks", &self.write_hooks)
            .field("interrupts", &self.interrupts)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

const QUERY_PATHS: &[&str] = &[
    "pc", "cycles", "sp", "sreg",
    "flags.c", "flags.z", "flags.n", "flags.v", "flags.s", "flags.h", "flags.t", "flags.i",
    "r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7",
    "r8", "r9", "r10", "r11", "r12", "r13", "r14", "r15",
    "r16", "r17", "r18", "r19", "r20", "r21", "r22", "r23",
    "r24", "r25", "r26", "r27", "r28", "r29", "r30", "r31",
    "x", "y", "z",
    "interrupt.next", "clock.pending", "clock.next",
];

impl Observable for Cpu {
    fn query(&self, path: &str) -> Option<Value> {
        let status = self.status();
        match path {
            "pc" => Some(self.pc.into()),
            "cycles" => Some(self.cycles.into()),
            "sp" => Some(self.sp().into()),
            "sreg" => Some(self.sreg().into()),
            "flags.c" => Some(status.is_set(flags::C).into()),
            "flags.z" => Some(status.is_set(flags::Z).into()),
            "flags.n" => Some(status.is_set(flags::N).into()),
            "flags.v" => Some(status.is_set(flags::V).into()),
            "flags.s" => Some(status.is_set(flags::S).into()),
            "flags.h" => Some(status.is_set(flags::H).into()),
            "flags.t" => Some(status.is_set(flags::T).into()),
            "flags.i" => Some(status.is_set(flags::I).into()),
            "x" => Some(self.data.read_u16_le(X).into()),
            "y" => Some(self.data.read_u16_le(Y).into()),
            "z" => Some(self.data.read_u16_le(Z).into()),
            "interrupt.next" => Some(self.pending_interrupt().into()),
            "clock.pending" => Some((self.pending_clock_events() as u64).into()),
            "clock.next" => Some(self.next_clock_event_cycle().into()),
            _ => {
                let r: u8 = path.strip_prefix('r')?.parse().ok()?;
                (r < 32).then(|| self.register(r).into())
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_resets_stack_pointer() {
        let cpu = Cpu::new(&[0; 4], 0x1000).unwrap();
        assert_eq!(cpu.sp(), 0x10ff);
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.cycles(), 0);
        assert!(!cpu.pc22_bits());
    }

    #[test]
    fn empty_program_is_rejected() {
        assert_eq!(Cpu::new(&[], 0x100).unwrap_err(), CpuError::EmptyProgram);
    }

    #[test]
    fn tiny_sram_is_rejected() {
        assert!(matches!(
            Cpu::new(&[0], 8),
            Err(CpuError::InvalidConfig(_))
        ));
    }

    #[test]
    fn pc22_bits_follows_program_size() {
        assert!(!Cpu::new(&vec![0; 0x1_0000], 0x100).unwrap().pc22_bits());
        assert!(Cpu::new(&vec![0; 0x2_0000], 0x100).unwrap().pc22_bits());
    }

    #[test]
    fn reset_keeps_memory() {
        let mut cpu = Cpu::new(&[0; 4], 0x100).unwrap();
        cpu.data_mut()[0x120] = 0x42;
        cpu.set_pc(3);
        cpu.set_sp(0x150);
        cpu.reset();
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.sp(), 0x1ff);
        assert_eq!(cpu.data()[0x120], 0x42);
    }

    #[test]
    fn return_address_round_trips_through_stack() {
        let mut cpu = Cpu::new(&[0; 4], 0x100).unwrap();
        cpu.set_sp(0x80);
        cpu.push_return_address(0x1234, false);
        assert_eq!(cpu.sp(), 0x7e);
        assert_eq!(cpu.data()[0x80], 0x34);
        assert_eq!(cpu.data()[0x7f], 0x12);
        assert_eq!(cpu.pop_return_address(), 0x1234);
        assert_eq!(cpu.sp(), 0x80);
    }

    #[test]
    fn pc_wraps_at_end_of_program() {
        let mut cpu = Cpu::new(&[0; 4], 0x100).unwrap();
        cpu.set_pc(3);
        cpu.step().unwrap();
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.wrap_pc(-1), 3);
        assert_eq!(cpu.wrap_pc(9), 1);
    }

    #[test]
    fn strict_mode_rejects_unknown_opcode_without_side_effects() {
        let config = CpuConfig::default().with_strict_opcodes(true);
        let mut cpu = Cpu::with_config(&[0xffff, 0], config).unwrap();
        assert_eq!(
            cpu.step(),
            Err(CpuError::UnknownOpcode { pc: 0, opcode: 0xffff })
        );
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.cycles(), 0);
    }

    #[test]
    fn lenient_mode_skips_unknown_opcode() {
        let mut cpu = Cpu::new(&[0xffff, 0], 0x100).unwrap();
        assert!(cpu.step().is_ok());
        assert_eq!(cpu.pc(), 1);
        assert_eq!(cpu.cycles(), 1);
    }

    #[test]
    fn query_registers_and_flags() {
        let mut cpu = Cpu::new(&[0; 4], 0x100).unwrap();
        cpu.set_register(16, 0xab);
        cpu.set_sreg(flags::Z | flags::I);
        cpu.data_mut().write_u16_le(Z, 0x0150);
        assert_eq!(cpu.query("r16"), Some(Value::U8(0xab)));
        assert_eq!(cpu.query("flags.z"), Some(Value::Bool(true)));
        assert_eq!(cpu.query("flags.c"), Some(Value::Bool(false)));
        assert_eq!(cpu.query("z"), Some(Value::U16(0x0150)));
        assert_eq!(cpu.query("interrupt.next"), Some(Value::None));
        assert_eq!(cpu.query("r32"), None);
        assert_eq!(cpu.query("bogus"), None);
    }

    #[test]
    fn every_listed_path_answers() {
        let cpu = Cpu::new(&[0; 4], 0x100).unwrap();
        for path in cpu.query_paths() {
            assert!(cpu.query(path).is_some(), "path {path} not answered");
        }
    }

    #[test]
    fn watchdog_handler_runs_on_wdr() {
        use std::cell::Cell;
        use std::rc::Rc;

        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        // WDR
        let mut cpu = Cpu::new(&[0x95a8, 0x95a8], 0x100).unwrap();
        cpu.set_watchdog_reset_handler(move |_| seen.set(seen.get() + 1));
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(count.get(), 2);
        assert!(cpu.clear_watchdog_reset_handler());
    }
}
