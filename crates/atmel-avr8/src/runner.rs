//! Batched execution.
//!
//! The runner owns a CPU and advances it in work units of a fixed number of
//! cycles. It never sleeps: the host decides how to pace work units against
//! wall-clock time, using `elapsed()` and `speed_hz()`.

use std::time::Duration;

use tracing::debug;

use crate::config::{CpuConfig, RunnerConfig};
use crate::error::Result;
use crate::Cpu;
use crate::memory::REGISTER_SPACE;

/// Why `run_until` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The predicate held after an instruction.
    Stopped { cycles: u64 },
    /// The cycle budget ran out first.
    BudgetExhausted { cycles: u64 },
}

impl RunOutcome {
    /// Cycles run before returning.
    #[must_use]
    pub const fn cycles(self) -> u64 {
        match self {
            Self::Stopped { cycles } | Self::BudgetExhausted { cycles } => cycles,
        }
    }
}

/// Runs a [`Cpu`] in work units.
#[derive(Debug)]
pub struct Runner {
    cpu: Cpu,
    config: RunnerConfig,
}

impl Runner {
    /// Create a runner for a flash image with `sram_bytes` of SRAM.
    pub fn new(program: &[u8], sram_bytes: usize) -> Result<Self> {
        Ok(Self::with_config(Cpu::from_bytes(program, sram_bytes)?, RunnerConfig::default()))
    }

    #[must_use]
    pub fn with_config(cpu: Cpu, config: RunnerConfig) -> Self {
        Self { cpu, config }
    }

    /// Runner over a zeroed flash of `flash_bytes`, for loading programs
    /// into afterwards.
    pub fn with_flash_size(flash_bytes: usize, cpu_config: CpuConfig) -> Result<Self> {
        let words = vec![0u16; flash_bytes.div_ceil(2)];
        Ok(Self::with_config(Cpu::with_config(&words, cpu_config)?, RunnerConfig::default()))
    }

    #[must_use]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    #[must_use]
    pub fn into_cpu(self) -> Cpu {
        self.cpu
    }

    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    #[must_use]
    pub fn speed_hz(&self) -> u32 {
        self.config.speed_hz
    }

    pub fn set_speed_hz(&mut self, speed_hz: u32) {
        self.config.speed_hz = speed_hz;
    }

    pub fn set_work_unit_cycles(&mut self, cycles: u64) {
        self.config.work_unit_cycles = cycles;
    }

    pub fn load_program_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.cpu.load_program_bytes(bytes)
    }

    pub fn load_program_words(&mut self, words: &[u16]) -> Result<()> {
        self.cpu.load_program_words(words)
    }

    /// Run one work unit. Returns the cycles actually run, which can
    /// overshoot the unit by the tail of the last instruction.
    pub fn execute(&mut self) -> Result<u64> {
        self.run_cycles(self.config.work_unit_cycles)
    }

    /// Run until at least `budget` more cycles have elapsed.
    pub fn run_cycles(&mut self, budget: u64) -> Result<u64> {
        let start = self.cpu.cycles();
        let target = start.saturating_add(budget);
        while self.cpu.cycles() < target {
            self.cpu.step()?;
            self.cpu.tick();
        }
        Ok(self.cpu.cycles() - start)
    }

    /// Run until `stop` holds after an instruction, or `max_cycles` have
    /// elapsed.
    pub fn run_until(
        &mut self,
        mut stop: impl FnMut(&Cpu) -> bool,
        max_cycles: u64,
    ) -> Result<RunOutcome> {
        let start = self.cpu.cycles();
        let target = start.saturating_add(max_cycles);
        while self.cpu.cycles() < target {
            self.cpu.step()?;
            self.cpu.tick();
            if stop(&self.cpu) {
                let cycles = self.cpu.cycles() - start;
                debug!(cycles, pc = self.cpu.pc(), "run stopped");
                return Ok(RunOutcome::Stopped { cycles });
            }
        }
        Ok(RunOutcome::BudgetExhausted { cycles: self.cpu.cycles() - start })
    }

    /// Emulated time since cycle 0 at the configured clock speed.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        let speed = u128::from(self.config.speed_hz.max(1));
        let nanos = u128::from(self.cpu.cycles()) * 1_000_000_000 / speed;
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }

    /// Bytes of SRAM available to the program.
    #[must_use]
    pub fn sram_bytes(&self) -> usize {
        self.cpu.data().len() - REGISTER_SPACE
    }
}
