//! Data space and program memory.
//!
//! The data space is one flat byte array: the 32 general purpose registers,
//! then the I/O and extended I/O registers, then SRAM. Program memory is
//! flash, addressed in words by the PC and in bytes by LPM/ELPM.

use std::ops::{Index, IndexMut};

use crate::error::{CpuError, Result};

/// Bytes below SRAM: registers, I/O and extended I/O.
pub const REGISTER_SPACE: usize = 0x100;

/// X register pair (r27:r26).
pub const X: u16 = 26;
/// Y register pair (r29:r28).
pub const Y: u16 = 28;
/// Z register pair (r31:r30).
pub const Z: u16 = 30;
/// Stack pointer, little-endian at 93/94.
pub const SP: u16 = 93;
/// Status register.
pub const SREG: u16 = 95;
/// Extended Z pointer for ELPM.
pub const RAMPZ: u16 = 0x5b;
/// Extended indirect register for EICALL/EIJMP.
pub const EIND: u16 = 0x5c;

/// The data address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSpace {
    bytes: Vec<u8>,
}

impl DataSpace {
    /// Allocate `sram_bytes` of SRAM above the register space, zeroed.
    #[must_use]
    pub fn new(sram_bytes: usize) -> Self {
        Self {
            bytes: vec![0; sram_bytes + REGISTER_SPACE],
        }
    }

    /// Total size including the register space.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    #[must_use]
    pub fn read_u16_le(&self, addr: u16) -> u16 {
        let addr = usize::from(addr);
        u16::from_le_bytes([self.bytes[addr], self.bytes[addr + 1]])
    }

    #[must_use]
    pub fn read_u16_be(&self, addr: u16) -> u16 {
        let addr = usize::from(addr);
        u16::from_be_bytes([self.bytes[addr], self.bytes[addr + 1]])
    }

    pub fn write_u16_le(&mut self, addr: u16, value: u16) {
        let addr = usize::from(addr);
        self.bytes[addr..addr + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn write_u16_be(&mut self, addr: u16, value: u16) {
        let addr = usize::from(addr);
        self.bytes[addr..addr + 2].copy_from_slice(&value.to_be_bytes());
    }
}

impl Index<u16> for DataSpace {
    type Output = u8;

    fn index(&self, addr: u16) -> &u8 {
        &self.bytes[usize::from(addr)]
    }
}

impl IndexMut<u16> for DataSpace {
    fn index_mut(&mut self, addr: u16) -> &mut u8 {
        &mut self.bytes[usize::from(addr)]
    }
}

/// Flash memory with word and byte views kept in step.
///
/// Word `n` occupies bytes `2n` (low) and `2n + 1` (high).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramMemory {
    words: Vec<u16>,
    bytes: Vec<u8>,
}

impl ProgramMemory {
    #[must_use]
    pub fn from_words(words: &[u16]) -> Self {
        let bytes = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        Self {
            words: words.to_vec(),
            bytes,
        }
    }

    /// Build flash from a byte image. A trailing odd byte becomes the low
    /// half of a final word.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let words: Vec<u16> = bytes
            .chunks(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair.get(1).copied().unwrap_or(0)]))
            .collect();
        Self::from_words(&words)
    }

    /// Flash size in words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Flash size in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Word at `addr`, wrapping past the end of flash.
    #[must_use]
    pub fn word(&self, addr: u32) -> u16 {
        if self.words.is_empty() {
            return 0;
        }
        self.words[addr as usize % self.words.len()]
    }

    /// Byte at `addr`; reads past the end of flash return 0.
    #[must_use]
    pub fn byte(&self, addr: u32) -> u8 {
        self.bytes.get(addr as usize).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn words(&self) -> &[u16] {
        &self.words
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn set_word(&mut self, addr: u32, value: u16) {
        let addr = addr as usize;
        self.words[addr] = value;
        self.bytes[addr * 2..addr * 2 + 2].copy_from_slice(&value.to_le_bytes());
    }

    pub fn set_byte(&mut self, addr: u32, value: u8) {
        let addr = addr as usize;
        self.bytes[addr] = value;
        let word = addr / 2;
        self.words[word] = u16::from_le_bytes([self.bytes[word * 2], self.bytes[word * 2 + 1]]);
    }

    /// Copy `words` to the start of flash.
    pub fn load_words(&mut self, words: &[u16]) -> Result<()> {
        if words.len() > self.words.len() {
            return Err(CpuError::ProgramTooLarge {
                len: words.len() * 2,
                capacity: self.bytes.len(),
            });
        }
        for (addr, &word) in words.iter().enumerate() {
            self.set_word(addr as u32, word);
        }
        Ok(())
    }

    /// Copy a byte image to the start of flash.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > self.bytes.len() {
            return Err(CpuError::ProgramTooLarge {
                len: bytes.len(),
                capacity: self.bytes.len(),
            });
        }
        self.bytes[..bytes.len()].copy_from_slice(bytes);
        for (word, pair) in self.words.iter_mut().zip(self.bytes.chunks_exact(2)) {
            *word = u16::from_le_bytes([pair[0], pair[1]]);
        }
        Ok(())
    }
}
