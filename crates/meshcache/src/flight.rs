//! Single-flight call coalescing
//!
//! Concurrent callers asking for the same key share one computation: the
//! first caller runs it, later callers block until its outcome is published.
//! The record for a key is dropped as soon as the computation finishes, so the
//! next call after that starts a fresh one.

use std::collections::HashMap;
use std::sync::Arc;

use ahash::RandomState;
use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};

/// In-flight computation with a single-assignment result slot
struct Call<T> {
    outcome: Mutex<Option<Result<T>>>,
    done: Condvar,
}

impl<T: Clone> Call<T> {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn wait(&self) -> Result<T> {
        let mut outcome = self.outcome.lock();
        loop {
            if let Some(outcome) = outcome.as_ref() {
                return outcome.clone();
            }
            self.done.wait(&mut outcome);
        }
    }

    fn publish(&self, outcome: Result<T>) {
        *self.outcome.lock() = Some(outcome);
        self.done.notify_all();
    }
}

/// Deduplicates concurrent computations per key
pub struct FlightGroup<T> {
    calls: Mutex<HashMap<String, Arc<Call<T>>, RandomState>>,
}

impl<T: Clone> FlightGroup<T> {
    /// Create an empty group
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(HashMap::with_hasher(RandomState::new())),
        }
    }

    /// Run `compute` for `key`, or wait for the run already in flight
    ///
    /// Every caller coalesced onto one run receives a clone of the same
    /// outcome. `compute` runs on the calling thread.
    pub fn execute<F>(&self, key: &str, compute: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut calls = self.calls.lock();
        if let Some(call) = calls.get(key) {
            let call = Arc::clone(call);
            drop(calls);
            return call.wait();
        }

        let call = Arc::new(Call::new());
        calls.insert(key.to_string(), Arc::clone(&call));
        drop(calls);

        let mut flight = Flight {
            group: self,
            key,
            call: &call,
            landed: false,
        };
        let outcome = compute();
        flight.land(outcome.clone());

        outcome
    }

    /// Number of keys with a computation in flight
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

impl<T: Clone> Default for FlightGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Publishes the outcome and retires the record, even if `compute` unwinds
struct Flight<'a, T: Clone> {
    group: &'a FlightGroup<T>,
    key: &'a str,
    call: &'a Call<T>,
    landed: bool,
}

impl<T: Clone> Flight<'_, T> {
    fn land(&mut self, outcome: Result<T>) {
        self.landed = true;
        self.call.publish(outcome);
        self.group.calls.lock().remove(self.key);
    }
}

impl<T: Clone> Drop for Flight<'_, T> {
    fn drop(&mut self) {
        if !self.landed {
            self.land(Err(Error::Abandoned(self.key.to_string())));
        }
    }
}
