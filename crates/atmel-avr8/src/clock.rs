//! Clock event scheduler.
//!
//! Peripherals defer work ("conversion done in 13 cycles") by scheduling a
//! callback at an absolute cycle. Events form a singly-linked list sorted by
//! target cycle, stored in a slab so handles stay valid while other events
//! come and go. Handles carry a generation, so a handle to an event that has
//! already fired never matches a newer event in the same slot.

use std::fmt;

use crate::Cpu;

/// Spare slab nodes kept at the end of the slab once events are removed.
/// Vacant nodes below a live one stay on the free list until reused.
pub const POOL_CAPACITY: usize = 10;

/// A deferred callback. Runs once, with the CPU.
pub type ClockCallback = Box<dyn FnOnce(&mut Cpu)>;

/// Handle to a scheduled clock event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockEventId {
    index: usize,
    generation: u64,
}

struct Node {
    generation: u64,
    cycles: u64,
    next: Option<usize>,
    callback: Option<ClockCallback>,
}

/// Sorted list of pending clock events.
pub(crate) struct ClockEvents {
    nodes: Vec<Node>,
    head: Option<usize>,
    /// Vacant node indices available for reuse.
    pool: Vec<usize>,
    next_generation: u64,
    len: usize,
}

impl ClockEvents {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            head: None,
            pool: Vec::with_capacity(POOL_CAPACITY),
            next_generation: 1,
            len: 0,
        }
    }

    /// Schedule `callback` at `now + max(1, delay)`.
    pub(crate) fn add(&mut self, now: u64, delay: i64, callback: ClockCallback) -> ClockEventId {
        let generation = self.next_generation;
        self.next_generation += 1;
        let node = Node {
            generation,
            cycles: target(now, delay),
            next: None,
            callback: Some(callback),
        };
        let index = if let Some(index) = self.pool.pop() {
            self.nodes[index] = node;
            index
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        };
        self.link(index);
        self.len += 1;
        ClockEventId { index, generation }
    }

    /// Cancel an event. Returns false if it already fired or was cleared.
    pub(crate) fn clear(&mut self, id: ClockEventId) -> bool {
        if !self.unlink(id) {
            return false;
        }
        self.release(id.index);
        true
    }

    /// Move an event to `now + max(1, delay)`, keeping its handle.
    pub(crate) fn reschedule(&mut self, id: ClockEventId, now: u64, delay: i64) -> bool {
        if !self.unlink(id) {
            return false;
        }
        self.nodes[id.index].cycles = target(now, delay);
        self.link(id.index);
        true
    }

    /// Unlink the head event if it is due, handing back its callback.
    pub(crate) fn pop_due(&mut self, now: u64) -> Option<ClockCallback> {
        let index = self.head?;
        if self.nodes[index].cycles > now {
            return None;
        }
        self.head = self.nodes[index].next;
        let callback = self.nodes[index].callback.take();
        self.release(index);
        callback
    }

    pub(crate) fn clear_all(&mut self) {
        self.nodes.clear();
        self.pool.clear();
        self.head = None;
        self.len = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn next_cycle(&self) -> Option<u64> {
        self.head.map(|index| self.nodes[index].cycles)
    }

    /// Target cycles in firing order.
    pub(crate) fn schedule(&self) -> Vec<u64> {
        let mut cycles = Vec::with_capacity(self.len);
        let mut current = self.head;
        while let Some(index) = current {
            cycles.push(self.nodes[index].cycles);
            current = self.nodes[index].next;
        }
        cycles
    }

    /// Insert after every node due strictly earlier. A new event goes ahead
    /// of events already due on the same cycle.
    fn link(&mut self, index: usize) {
        let cycles = self.nodes[index].cycles;
        let mut previous = None;
        let mut current = self.head;
        while let Some(i) = current {
            if self.nodes[i].cycles >= cycles {
                break;
            }
            previous = Some(i);
            current = self.nodes[i].next;
        }
        self.nodes[index].next = current;
        match previous {
            Some(p) => self.nodes[p].next = Some(index),
            None => self.head = Some(index),
        }
    }

    fn unlink(&mut self, id: ClockEventId) -> bool {
        let mut previous: Option<usize> = None;
        let mut current = self.head;
        while let Some(i) = current {
            if i == id.index && self.nodes[i].generation == id.generation {
                let next = self.nodes[i].next;
                match previous {
                    Some(p) => self.nodes[p].next = next,
                    None => self.head = next,
                }
                self.nodes[i].next = None;
                return true;
            }
            previous = Some(i);
            current = self.nodes[i].next;
        }
        false
    }

    fn release(&mut self, index: usize) {
        let node = &mut self.nodes[index];
        node.generation = 0;
        node.callback = None;
        node.next = None;
        self.len -= 1;
        self.pool.push(index);
        // Give back trailing vacant nodes beyond the pool allowance.
        while self.pool.len() > POOL_CAPACITY
            && self.nodes.last().is_some_and(|node| node.generation == 0)
        {
            let last = self.nodes.len() - 1;
            self.nodes.pop();
            self.pool.retain(|&i| i != last);
        }
    }
}

fn target(now: u64, delay: i64) -> u64 {
    now + delay.max(1) as u64
}

impl fmt::Debug for ClockEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockEvents")
            .field("schedule", &self.schedule())
            .field("pool", &self.pool.len())
            .finish()
    }
}

impl Cpu {
    /// Run `callback` once, `delay` cycles from now (at least one).
    pub fn add_clock_event(
        &mut self,
        callback: impl FnOnce(&mut Cpu) + 'static,
        delay: i64,
    ) -> ClockEventId {
        self.clock.add(self.cycles, delay, Box::new(callback))
    }

    /// Move a pending event to `delay` cycles from now.
    ///
    /// Returns false, changing nothing, if the event is no longer pending.
    pub fn update_clock_event(&mut self, id: ClockEventId, delay: i64) -> bool {
        self.clock.reschedule(id, self.cycles, delay)
    }

    /// Cancel a pending event. Returns false if it already fired or was
    /// cleared.
    pub fn clear_clock_event(&mut self, id: ClockEventId) -> bool {
        self.clock.clear(id)
    }

    /// Number of scheduled events.
    #[must_use]
    pub fn pending_clock_events(&self) -> usize {
        self.clock.len()
    }

    /// Target cycle of the earliest scheduled event.
    #[must_use]
    pub fn next_clock_event_cycle(&self) -> Option<u64> {
        self.clock.next_cycle()
    }

    /// Fire the earliest event if it is due.
    pub(crate) fn service_clock_event(&mut self) {
        if let Some(callback) = self.clock.pop_due(self.cycles) {
            callback(self);
        }
    }
}
