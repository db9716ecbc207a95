//! CPU and runner configuration.

use crate::error::{CpuError, Result};

/// Smallest SRAM that still leaves room for a stack frame.
pub const MIN_SRAM_BYTES: usize = 32;

/// Per-instance CPU configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuConfig {
    /// SRAM size in bytes, not counting the 256-byte register space.
    pub sram_bytes: usize,
    /// Report unknown opcodes from `step()` instead of treating them as NOP.
    pub strict_opcodes: bool,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            sram_bytes: 8192,
            strict_opcodes: false,
        }
    }
}

impl CpuConfig {
    #[must_use]
    pub const fn with_sram_bytes(mut self, sram_bytes: usize) -> Self {
        self.sram_bytes = sram_bytes;
        self
    }

    #[must_use]
    pub const fn with_strict_opcodes(mut self, strict: bool) -> Self {
        self.strict_opcodes = strict;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.sram_bytes < MIN_SRAM_BYTES {
            return Err(CpuError::InvalidConfig(format!(
                "sram_bytes must be at least {MIN_SRAM_BYTES}, got {}",
                self.sram_bytes
            )));
        }
        // SP is 16 bits wide, so the top of the data space must be addressable.
        if self.sram_bytes + crate::memory::REGISTER_SPACE > 0x1_0000 {
            return Err(CpuError::InvalidConfig(format!(
                "sram_bytes {} exceeds the 64 KiB data space",
                self.sram_bytes
            )));
        }
        Ok(())
    }
}

/// Batch execution settings for [`Runner`](crate::Runner).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Emulated clock frequency, used to convert cycles to time.
    pub speed_hz: u32,
    /// Cycles executed per `execute()` call.
    pub work_unit_cycles: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            speed_hz: 16_000_000,
            work_unit_cycles: 500_000,
        }
    }
}

impl RunnerConfig {
    #[must_use]
    pub const fn with_speed_hz(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    #[must_use]
    pub const fn with_work_unit_cycles(mut self, cycles: u64) -> Self {
        self.work_unit_cycles = cycles;
        self
    }
}
