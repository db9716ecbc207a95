//! Cycle-accurate AVR 8-bit CPU emulator core.
//!
//! [`Cpu`] holds the register file, SRAM and flash. `step()` executes one
//! instruction and charges its full cycle cost; `tick()` then services at
//! most one due clock event and one pending interrupt. Peripheral models
//! live outside this crate and attach through memory hooks, interrupt
//! descriptors and clock events.
//!
//! ```
//! use atmel_avr8::Cpu;
//!
//! // LDI r16, 0x2a ; INC r16
//! let mut cpu = Cpu::new(&[0xe20a, 0x9503], 0x100)?;
//! cpu.step()?;
//! cpu.step()?;
//! assert_eq!(cpu.register(16), 0x2b);
//! assert_eq!(cpu.cycles(), 2);
//! # Ok::<(), atmel_avr8::CpuError>(())
//! ```

mod clock;
mod config;
mod cpu;
mod error;
mod execute;
pub mod flags;
mod hooks;
mod instruction;
mod interrupt;
pub mod memory;
mod observable;
mod runner;

pub use clock::{ClockCallback, ClockEventId, POOL_CAPACITY};
pub use config::{CpuConfig, MIN_SRAM_BYTES, RunnerConfig};
pub use cpu::{Cpu, WatchdogHandler};
pub use error::{CpuError, Result};
pub use flags::Status;
pub use hooks::{ReadHook, WriteAccess, WriteHook};
pub use instruction::{Indirect, Instruction, Pointer, is_two_word};
pub use interrupt::{InterruptConfig, MAX_INTERRUPTS};
pub use memory::{DataSpace, ProgramMemory};
pub use observable::{Observable, Value};
pub use runner::{RunOutcome, Runner};
