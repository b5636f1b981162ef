//! Per-service cache slot: first requester builds, the rest wait.

use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::record::ServiceRecord;

enum SlotState {
    Empty,
    Building(ThreadId),
    Ready(Arc<ServiceRecord>),
}

/// Cache slot guarding first-time construction of one service name.
pub(crate) struct ServiceSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

pub(crate) enum Acquired {
    Ready(Arc<ServiceRecord>),
    /// This thread must build and publish.
    Claimed(SlotClaim),
    /// This thread is already building the slot further up its stack.
    OwnThread,
    TimedOut,
}

pub(crate) enum Offered {
    Stored,
    Existing(Arc<ServiceRecord>),
    /// This thread is building the slot further up its stack.
    OwnThread,
    TimedOut,
}

impl ServiceSlot {
    pub(crate) fn new() -> Self {
        Self { state: Mutex::new(SlotState::Empty), ready: Condvar::new() }
    }

    pub(crate) fn peek(&self) -> Option<Arc<ServiceRecord>> {
        match &*self.state.lock() {
            SlotState::Ready(record) => Some(record.clone()),
            _ => None,
        }
    }

    /// Returns the published record, or claims the slot for this thread.
    pub(crate) fn acquire(self: &Arc<Self>, timeout: Option<Duration>) -> Acquired {
        let me = thread::current().id();
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        loop {
            match &*state {
                SlotState::Ready(record) => return Acquired::Ready(record.clone()),
                SlotState::Empty => {
                    *state = SlotState::Building(me);
                    return Acquired::Claimed(SlotClaim { slot: self.clone(), published: false });
                }
                SlotState::Building(owner) if *owner == me => return Acquired::OwnThread,
                SlotState::Building(_) => {
                    if !self.wait(&mut state, deadline) {
                        return Acquired::TimedOut;
                    }
                }
            }
        }
    }

    /// Stores a record built under another name, or hands back the one this slot holds.
    ///
    /// A slot another thread is still building is waited on like in [`acquire`](Self::acquire).
    pub(crate) fn offer(&self, record: &Arc<ServiceRecord>, timeout: Option<Duration>) -> Offered {
        let me = thread::current().id();
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        loop {
            match &*state {
                SlotState::Ready(existing) => return Offered::Existing(existing.clone()),
                SlotState::Empty => {
                    *state = SlotState::Ready(record.clone());
                    drop(state);
                    self.ready.notify_all();
                    return Offered::Stored;
                }
                SlotState::Building(owner) if *owner == me => return Offered::OwnThread,
                SlotState::Building(_) => {
                    if !self.wait(&mut state, deadline) {
                        return Offered::TimedOut;
                    }
                }
            }
        }
    }

    /// Blocks until the state changes; `false` once the deadline passed with the slot
    /// still being built.
    fn wait(&self, state: &mut MutexGuard<'_, SlotState>, deadline: Option<Instant>) -> bool {
        match deadline {
            Some(deadline) => {
                !self.ready.wait_until(state, deadline).timed_out()
                    || !matches!(**state, SlotState::Building(_))
            }
            None => {
                self.ready.wait(state);
                true
            }
        }
    }
}

/// Exclusive right to build a slot; dropping it unpublished reopens the slot.
pub(crate) struct SlotClaim {
    slot: Arc<ServiceSlot>,
    published: bool,
}

impl SlotClaim {
    pub(crate) fn publish(mut self, record: Arc<ServiceRecord>) {
        *self.slot.state.lock() = SlotState::Ready(record);
        self.published = true;
        self.slot.ready.notify_all();
    }
}

impl Drop for SlotClaim {
    fn drop(&mut self) {
        if !self.published {
            *self.slot.state.lock() = SlotState::Empty;
            self.slot.ready.notify_all();
        }
    }
}
