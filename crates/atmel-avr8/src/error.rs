//! Error types.

/// Errors surfaced by construction, program loading and strict execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CpuError {
    /// The image does not fit in flash.
    #[error("program of {len} bytes does not fit in {capacity} bytes of flash")]
    ProgramTooLarge { len: usize, capacity: usize },

    /// Flash must hold at least one word for the PC to wrap around.
    #[error("program memory is empty")]
    EmptyProgram,

    /// Strict mode rejected an opcode that matches no instruction.
    #[error("unknown opcode {opcode:#06x} at pc {pc:#x}")]
    UnknownOpcode { pc: u32, opcode: u16 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, CpuError>;
