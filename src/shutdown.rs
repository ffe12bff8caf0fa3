//! Process-wide cancellation signal
//!
//! A cloneable handle over a flag and a condition variable. Every blocking
//! wait in the relay that can outlast an interrupt goes through
//! [`Shutdown::wait_timeout`] so it returns as soon as shutdown is requested.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Inner {
    requested: Mutex<bool>,
    wake: Condvar,
}

/// Shared shutdown signal
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake every waiter. Idempotent.
    pub fn request(&self) {
        let mut requested = self
            .inner
            .requested
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if !*requested {
            log::info!("Shutdown requested");
        }
        *requested = true;
        self.inner.wake.notify_all();
    }

    pub fn is_requested(&self) -> bool {
        *self
            .inner
            .requested
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Sleep for up to `timeout`.
    ///
    /// Returns `true` if shutdown was requested (possibly before the timeout
    /// elapsed), `false` if the full timeout passed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut requested = self
            .inner
            .requested
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        while !*requested {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .inner
                .wake
                .wait_timeout(requested, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            requested = guard;
        }
        true
    }
}
