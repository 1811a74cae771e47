// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A deferred computation that runs at most once and is shared by every caller.

use std::fmt;

use parking_lot::Mutex;

/// One unit of single-flight work.
///
/// The first caller to lock the slot becomes the leader and runs its computation while
/// holding the lock. Every other caller blocks on the lock and, once it is released, finds
/// the stored value and returns a clone of it.
///
/// If the leader panics the lock is released during unwinding with the slot still empty,
/// so the next waiter is promoted to leader and runs its own computation.
pub(crate) struct Flight<T> {
    slot: Mutex<Option<T>>,
}

impl<T> Flight<T> {
    pub(crate) fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }
}

impl<T: Clone> Flight<T> {
    /// Returns the value of this flight, computing it with `compute` if no value exists yet.
    ///
    /// Blocks while another caller is computing.
    pub(crate) fn resolve(&self, compute: impl FnOnce() -> T) -> T {
        let mut slot = self.slot.lock();

        if let Some(value) = slot.as_ref() {
            return value.clone();
        }

        // Execute while holding the lock so that followers wait for us.
        let value = compute();
        *slot = Some(value.clone());
        value
    }

    /// Returns the value of this flight if it has completed, waiting for a running leader.
    pub(crate) fn completed(&self) -> Option<T> {
        self.slot.lock().clone()
    }
}

impl<T> fmt::Debug for Flight<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.slot.try_lock() {
            Some(slot) if slot.is_some() => "completed",
            Some(_) => "pending",
            None => "running",
        };

        f.debug_struct("Flight").field("state", &state).finish()
    }
}
