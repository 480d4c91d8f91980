//! Flush barrier
//!
//! Every batch takes a ticket in submission order. A flush waits until no
//! ticket older than its own is still in flight. The barrier is per index
//! manager and does not look at entity types.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct BarrierState {
    next: u64,
    in_flight: BTreeSet<u64>,
}

#[derive(Debug, Default)]
pub struct FlushBarrier {
    state: Mutex<BarrierState>,
    released: Condvar,
}

/// In-flight marker; releases its slot on drop
#[derive(Debug)]
pub struct BatchTicket {
    barrier: Arc<FlushBarrier>,
    seq: u64,
}

impl BatchTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl Drop for BatchTicket {
    fn drop(&mut self) {
        self.barrier.release(self.seq);
    }
}

impl FlushBarrier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(self: &Arc<Self>) -> BatchTicket {
        let mut state = self.state.lock();
        let seq = state.next;
        state.next += 1;
        state.in_flight.insert(seq);
        BatchTicket {
            barrier: Arc::clone(self),
            seq,
        }
    }

    /// Block until every ticket issued before `ticket` is released
    pub fn wait_for_predecessors(&self, ticket: &BatchTicket) {
        let mut state = self.state.lock();
        while state.in_flight.range(..ticket.seq).next().is_some() {
            self.released.wait(&mut state);
        }
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    fn release(&self, seq: u64) {
        self.state.lock().in_flight.remove(&seq);
        self.released.notify_all();
    }
}
