//! Per-address memory hooks.
//!
//! Peripherals intercept reads and writes of their registers by installing
//! a hook at the register's data address. Hooks are called with the CPU so
//! they can raise interrupts or schedule clock events. While a hook runs it
//! is removed from its table, so a hook touching its own address through
//! `read_data`/`write_data` sees plain memory.

use std::collections::HashMap;
use std::fmt;

use crate::Cpu;

/// Produces the byte seen by a read of a hooked address.
pub type ReadHook = Box<dyn FnMut(&mut Cpu, u16) -> u8>;

/// Observes or takes over a write. Returns true when it handled the store.
pub type WriteHook = Box<dyn FnMut(&mut Cpu, WriteAccess) -> bool>;

/// A write as presented to a [`WriteHook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteAccess {
    /// Byte about to be stored.
    pub value: u8,
    /// Byte currently stored at `addr`.
    pub old: u8,
    pub addr: u16,
    /// Bits this write modifies; 0xFF except for SBI/CBI.
    pub mask: u8,
}

/// Sparse address → hook map.
pub(crate) struct HookTable<H> {
    hooks: HashMap<u16, H>,
    /// Hooks currently executing, with whether they were replaced or
    /// cleared meanwhile.
    running: Vec<(u16, bool)>,
}

impl<H> HookTable<H> {
    pub(crate) fn new() -> Self {
        Self {
            hooks: HashMap::new(),
            running: Vec::new(),
        }
    }

    pub(crate) fn insert(&mut self, addr: u16, hook: H) {
        self.mark_replaced(addr);
        self.hooks.insert(addr, hook);
    }

    pub(crate) fn remove(&mut self, addr: u16) -> bool {
        let was_running = self.mark_replaced(addr);
        self.hooks.remove(&addr).is_some() || was_running
    }

    pub(crate) fn contains(&self, addr: u16) -> bool {
        self.hooks.contains_key(&addr)
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Take a hook out for the duration of a call.
    pub(crate) fn take(&mut self, addr: u16) -> Option<H> {
        let hook = self.hooks.remove(&addr)?;
        self.running.push((addr, false));
        Some(hook)
    }

    /// Put back a hook taken with `take`, unless it was replaced or cleared
    /// while it ran.
    pub(crate) fn restore(&mut self, addr: u16, hook: H) {
        if let Some((running, replaced)) = self.running.pop() {
            debug_assert_eq!(running, addr, "hooks restored out of order");
            if !replaced {
                self.hooks.insert(addr, hook);
            }
        }
    }

    /// Flag running hooks at `addr` as replaced. Returns true if one of them
    /// was still live.
    fn mark_replaced(&mut self, addr: u16) -> bool {
        let mut live = false;
        for (running, replaced) in &mut self.running {
            if *running == addr {
                live |= !*replaced;
                *replaced = true;
            }
        }
        live
    }
}

impl<H> fmt::Debug for HookTable<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut addrs: Vec<_> = self.hooks.keys().copied().collect();
        addrs.sort_unstable();
        f.debug_struct("HookTable").field("addrs", &addrs).finish()
    }
}

impl Cpu {
    /// Install a read hook at `addr`, replacing any previous one.
    ///
    /// Reads of the register file (addresses 0-31) never consult hooks.
    pub fn set_read_hook(&mut self, addr: u16, hook: impl FnMut(&mut Cpu, u16) -> u8 + 'static) {
        self.read_hooks.insert(addr, Box::new(hook));
    }

    /// Remove the read hook at `addr`. Returns false if there was none.
    pub fn clear_read_hook(&mut self, addr: u16) -> bool {
        self.read_hooks.remove(addr)
    }

    #[must_use]
    pub fn has_read_hook(&self, addr: u16) -> bool {
        self.read_hooks.contains(addr)
    }

    /// Install a write hook at `addr`, replacing any previous one.
    pub fn set_write_hook(
        &mut self,
        addr: u16,
        hook: impl FnMut(&mut Cpu, WriteAccess) -> bool + 'static,
    ) {
        self.write_hooks.insert(addr, Box::new(hook));
    }

    /// Remove the write hook at `addr`. Returns false if there was none.
    pub fn clear_write_hook(&mut self, addr: u16) -> bool {
        self.write_hooks.remove(addr)
    }

    #[must_use]
    pub fn has_write_hook(&self, addr: u16) -> bool {
        self.write_hooks.contains(addr)
    }

    /// Number of installed (read, write) hooks.
    #[must_use]
    pub fn hook_count(&self) -> (usize, usize) {
        (self.read_hooks.len(), self.write_hooks.len())
    }

    /// Read a data-space byte the way instructions do.
    pub fn read_data(&mut self, addr: u16) -> u8 {
        let hook = if addr > 31 { self.read_hooks.take(addr) } else { None };
        if let Some(mut hook) = hook {
            let value = hook(self, addr);
            self.read_hooks.restore(addr, hook);
            return value;
        }
        self.data[addr]
    }

    /// Write a data-space byte the way instructions do.
    pub fn write_data(&mut self, addr: u16, value: u8) {
        self.write_data_masked(addr, value, 0xff);
    }

    /// Write with an explicit mask of the bits being modified.
    pub fn write_data_masked(&mut self, addr: u16, value: u8, mask: u8) {
        if let Some(mut hook) = self.write_hooks.take(addr) {
            let access = WriteAccess {
                value,
                old: self.data[addr],
                addr,
                mask,
            };
            let handled = hook(self, access);
            self.write_hooks.restore(addr, hook);
            if handled {
                return;
            }
        }
        self.data[addr] = value;
    }
}
