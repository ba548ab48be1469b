// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! Threading primitives the rest of the crate builds on.
//!
//! `std::sync::Mutex` already models "data behind a lock" directly, so it is
//! used as-is at the one place that needs it (the arbitrator's pending-client
//! slab). The one primitive `std` doesn't provide is a counting semaphore
//! with a timed wait, so this module supplies one.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// A counting semaphore with a timed `wait`, built on a `Mutex` + `Condvar`
/// guarding an integer count, the same predicate-wait shape used by this
/// pack's other inter-thread waiter types, adapted here from a shared-memory
/// setting to a plain in-process one (no shared memory or atomics needed
/// across a single address space).
pub struct Semaphore {
    state: Mutex<usize>,
    condvar: Condvar,
}

/// A timed wait that never expires.
pub const WAIT_FOREVER: Option<Duration> = None;

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            state: Mutex::new(initial),
            condvar: Condvar::new(),
        }
    }

    /// Increments the count and wakes one waiter, if any.
    pub fn post(&self) {
        let mut count = self.state.lock().unwrap();
        *count += 1;
        self.condvar.notify_one();
    }

    /// Blocks until the count is nonzero, then decrements it and returns.
    /// `timeout: None` waits forever; `Some(d)` gives up after `d` and
    /// returns `false`.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut count = self.state.lock().unwrap();
        match timeout {
            None => {
                while *count == 0 {
                    count = self.condvar.wait(count).unwrap();
                }
                *count -= 1;
                true
            }
            Some(d) => {
                let deadline = Instant::now() + d;
                while *count == 0 {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return false;
                    }
                    let (guard, result) =
                        self.condvar.wait_timeout(count, remaining).unwrap();
                    count = guard;
                    if result.timed_out() && *count == 0 {
                        return false;
                    }
                }
                *count -= 1;
                true
            }
        }
    }
}
