//! Admission limiter for sandboxed processes.
//!
//! ## Design
//!
//! A counter of in-flight executions guarded by `Mutex<usize>` + `Condvar`.
//! [`AdmissionLimiter::acquire`] blocks until the counter is below capacity or
//! the wait times out; the returned [`AdmissionPermit`] decrements the counter
//! and wakes one waiter when dropped, so a slot is released on every exit path
//! of the runner, including panics.
//!
//! ## Unbounded mode
//!
//! With no capacity configured, `acquire` never blocks. The counter is still
//! maintained so [`in_flight`](AdmissionLimiter::in_flight) stays meaningful.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct Slots {
    in_use: Mutex<usize>,
    released: Condvar,
    capacity: Option<usize>,
}

impl Slots {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.in_use.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn has_room(&self, in_use: usize) -> bool {
        self.capacity.map_or(true, |cap| in_use < cap)
    }
}

/// Caps the number of sandboxed processes alive at once.
///
/// Cheap to clone; all clones share the same counter.
#[derive(Clone)]
pub struct AdmissionLimiter {
    slots: Arc<Slots>,
}

/// Proof of admission. Dropping it frees the slot.
pub struct AdmissionPermit {
    slots: Arc<Slots>,
}

impl AdmissionLimiter {
    /// Create a limiter admitting at most `capacity` executions at once.
    /// `None` never blocks; `Some(0)` is treated as `Some(1)`.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            slots: Arc::new(Slots {
                in_use: Mutex::new(0),
                released: Condvar::new(),
                capacity: capacity.map(|c| c.max(1)),
            }),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.slots.capacity
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        *self.slots.lock()
    }

    /// Wait up to `wait` for a free slot.
    ///
    /// Returns `None` if no slot was released within `wait`.
    pub fn acquire(&self, wait: Duration) -> Option<AdmissionPermit> {
        let deadline = Instant::now() + wait;
        let mut in_use = self.slots.lock();
        while !self.slots.has_room(*in_use) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, _) = self
                .slots
                .released
                .wait_timeout(in_use, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            in_use = guard;
        }
        *in_use += 1;
        Some(AdmissionPermit {
            slots: Arc::clone(&self.slots),
        })
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        let mut in_use = self.slots.lock();
        *in_use = in_use.saturating_sub(1);
        self.slots.released.notify_one();
    }
}
