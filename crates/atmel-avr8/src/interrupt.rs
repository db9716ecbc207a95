//! Interrupt controller.
//!
//! Priority is by vector address: the lowest pending vector is dispatched
//! first. The controller caches the lowest pending vector so the per-tick
//! check is O(1); removing that vector rescans upward to the highest vector
//! ever queued.

use tracing::debug;

use crate::Cpu;
use crate::flags::I;
use crate::memory::SREG;

/// Size of the pending-interrupt table.
pub const MAX_INTERRUPTS: usize = 128;

/// Wiring of one interrupt source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterruptConfig {
    /// Vector address in program words.
    pub address: u8,
    pub enable_register: u16,
    pub enable_mask: u8,
    pub flag_register: u16,
    pub flag_mask: u8,
    /// Level-triggered: stays pending after dispatch.
    pub constant: bool,
    /// A set flag bit means "not pending".
    pub inverse_flag: bool,
}

impl InterruptConfig {
    #[must_use]
    pub const fn new(
        address: u8,
        enable_register: u16,
        enable_mask: u8,
        flag_register: u16,
        flag_mask: u8,
    ) -> Self {
        Self {
            address,
            enable_register,
            enable_mask,
            flag_register,
            flag_mask,
            constant: false,
            inverse_flag: false,
        }
    }

    /// Copy with the level-triggered bit changed, e.g. when an external
    /// interrupt pin switches between edge and level sensing.
    #[must_use]
    pub const fn with_constant(mut self, constant: bool) -> Self {
        self.constant = constant;
        self
    }

    #[must_use]
    pub const fn with_inverse_flag(mut self, inverse_flag: bool) -> Self {
        self.inverse_flag = inverse_flag;
        self
    }
}

/// Pending interrupts indexed by vector.
#[derive(Debug)]
pub(crate) struct InterruptTable {
    pending: [Option<InterruptConfig>; MAX_INTERRUPTS],
    next: Option<u8>,
    max: u8,
}

impl InterruptTable {
    pub(crate) fn new() -> Self {
        Self {
            pending: [None; MAX_INTERRUPTS],
            next: None,
            max: 0,
        }
    }

    pub(crate) fn clear_all(&mut self) {
        self.pending = [None; MAX_INTERRUPTS];
        self.next = None;
    }

    pub(crate) fn queue(&mut self, interrupt: InterruptConfig) {
        let vector = interrupt.address;
        assert!(
            usize::from(vector) < MAX_INTERRUPTS,
            "interrupt vector {vector} outside the {MAX_INTERRUPTS}-entry table"
        );
        self.pending[usize::from(vector)] = Some(interrupt);
        if self.next.is_none_or(|next| next > vector) {
            self.next = Some(vector);
        }
        if vector > self.max {
            self.max = vector;
        }
    }

    /// Remove the entry at `vector`. Returns false if nothing was pending.
    pub(crate) fn remove(&mut self, vector: u8) -> bool {
        let Some(slot) = self.pending.get_mut(usize::from(vector)) else {
            return false;
        };
        if slot.take().is_none() {
            return false;
        }
        if self.next == Some(vector) {
            self.next = (vector.saturating_add(1)..=self.max)
                .find(|&v| self.pending[usize::from(v)].is_some());
        }
        true
    }

    pub(crate) fn next(&self) -> Option<InterruptConfig> {
        self.next.and_then(|vector| self.pending[usize::from(vector)])
    }

    pub(crate) fn next_vector(&self) -> Option<u8> {
        self.next
    }

    pub(crate) fn is_pending(&self, vector: u8) -> bool {
        self.pending
            .get(usize::from(vector))
            .is_some_and(Option::is_some)
    }
}

impl Cpu {
    /// Raise the source's flag bit and queue it if enabled.
    pub fn set_interrupt_flag(&mut self, interrupt: &InterruptConfig) {
        if interrupt.inverse_flag {
            self.data[interrupt.flag_register] &= !interrupt.flag_mask;
        } else {
            self.data[interrupt.flag_register] |= interrupt.flag_mask;
        }
        if self.data[interrupt.enable_register] & interrupt.enable_mask != 0 {
            self.queue_interrupt(interrupt);
        }
    }

    /// React to a write of the source's enable register.
    pub fn update_interrupt_enable(&mut self, interrupt: &InterruptConfig, register_value: u8) {
        if register_value & interrupt.enable_mask != 0 {
            let flag_set = self.data[interrupt.flag_register] & interrupt.flag_mask != 0;
            if flag_set != interrupt.inverse_flag {
                self.queue_interrupt(interrupt);
            }
        } else {
            self.clear_interrupt(interrupt, false);
        }
    }

    /// Mark the source pending regardless of its flag and enable bits.
    pub fn queue_interrupt(&mut self, interrupt: &InterruptConfig) {
        self.interrupts.queue(*interrupt);
    }

    /// Drop the source from the pending table, optionally clearing its flag.
    ///
    /// Returns false if it was not pending.
    pub fn clear_interrupt(&mut self, interrupt: &InterruptConfig, clear_flag: bool) -> bool {
        if clear_flag {
            self.data[interrupt.flag_register] &= !interrupt.flag_mask;
        }
        self.interrupts.remove(interrupt.address)
    }

    /// Handle a write-one-to-clear of the flag register.
    pub fn clear_interrupt_by_flag(&mut self, interrupt: &InterruptConfig, register_value: u8) {
        if register_value & interrupt.flag_mask != 0 {
            self.data[interrupt.flag_register] &= !interrupt.flag_mask;
            self.clear_interrupt(interrupt, true);
        }
    }

    /// Lowest pending vector, if any.
    #[must_use]
    pub fn pending_interrupt(&self) -> Option<u8> {
        self.interrupts.next_vector()
    }

    #[must_use]
    pub fn is_interrupt_pending(&self, vector: u8) -> bool {
        self.interrupts.is_pending(vector)
    }

    /// Interrupt entry: push PC, clear I, spend two cycles, jump to `vector`.
    ///
    /// Does not touch the pending table; `tick` clears non-constant
    /// sources after calling this.
    pub fn dispatch_interrupt(&mut self, vector: u8) {
        debug!(vector, pc = self.pc, cycles = self.cycles, "interrupt");
        self.push_return_address(self.pc, self.pc22_bits());
        self.data[SREG] &= !I;
        self.cycles += 2;
        self.pc = u32::from(vector);
    }

    /// Dispatch the lowest pending interrupt if global interrupts are on.
    pub(crate) fn service_interrupt(&mut self) {
        if !self.interrupts_enabled() {
            return;
        }
        if let Some(interrupt) = self.interrupts.next() {
            self.dispatch_interrupt(interrupt.address);
            if !interrupt.constant {
                self.clear_interrupt(&interrupt, true);
            }
        }
    }
}
