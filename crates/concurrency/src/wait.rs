//! Wait handles for blocking retry
//!
//! A transaction that retries registers one [`Waiter`] on every TVar in its
//! read-set. The commit that next writes any of those TVars takes the waiter
//! off the cell and calls [`Waiter::notify`]. The notified flag is sticky, so
//! a notification delivered before the blocked thread starts waiting is not
//! lost.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// One blocked attempt
#[derive(Debug, Default)]
pub struct Waiter {
    notified: Mutex<bool>,
    condvar: Condvar,
}

impl Waiter {
    /// Create an un-notified waiter
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake the blocked attempt. Idempotent.
    pub fn notify(&self) {
        let mut notified = self.notified.lock();
        *notified = true;
        self.condvar.notify_one();
    }

    /// Whether [`notify`](Self::notify) has been called
    pub fn is_notified(&self) -> bool {
        *self.notified.lock()
    }

    /// Park until notified.
    ///
    /// With a `watchdog` period, `on_stall` is called with the total time
    /// waited each time a full period passes without a notification.
    /// Returns the total time spent waiting.
    pub fn wait(&self, watchdog: Option<Duration>, mut on_stall: impl FnMut(Duration)) -> Duration {
        let start = Instant::now();
        let mut notified = self.notified.lock();
        while !*notified {
            match watchdog {
                None => self.condvar.wait(&mut notified),
                Some(period) => {
                    let result = self.condvar.wait_for(&mut notified, period);
                    if result.timed_out() && !*notified {
                        on_stall(start.elapsed());
                    }
                }
            }
        }
        start.elapsed()
    }
}
