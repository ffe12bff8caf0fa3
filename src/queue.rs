//! Event Queue - bounded FIFO of pending motion events
//!
//! One instance is created by the orchestrator and shared with the drain
//! daemon. A full queue blocks the producer rather than dropping events.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};

use crate::contracts::MotionEvent;
use crate::errors::{Error, Result};
use crate::shutdown::Shutdown;

/// Upper bound on a single channel wait, so shutdown is observed promptly
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Both channel ends live here, so the channel never disconnects while the
/// queue exists.
pub struct EventQueue {
    tx: Sender<MotionEvent>,
    rx: Receiver<MotionEvent>,
    capacity: usize,
    shutdown: Shutdown,
}

impl EventQueue {
    pub fn new(capacity: usize, shutdown: Shutdown) -> Self {
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            capacity,
            shutdown,
        }
    }

    /// Enqueue an event, blocking while the queue is full
    ///
    /// # Errors
    /// `Shutdown` if shutdown is requested while waiting for space.
    pub fn put(&self, event: MotionEvent) -> Result<()> {
        let mut event = event;
        loop {
            match self.tx.send_timeout(event, POLL_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(pending)) => {
                    if self.shutdown.is_requested() {
                        return Err(Error::Shutdown);
                    }
                    event = pending;
                }
                Err(SendTimeoutError::Disconnected(_)) => return Err(Error::Shutdown),
            }
        }
    }

    /// Dequeue the oldest event, blocking until one arrives
    ///
    /// Returns `None` once shutdown is requested.
    pub fn take(&self) -> Option<MotionEvent> {
        loop {
            if self.shutdown.is_requested() {
                return None;
            }
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(event) => return Some(event),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Drop every queued event, returning how many were discarded
    pub fn flush(&self) -> usize {
        self.rx.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.tx.capacity().unwrap_or(self.capacity)
    }
}
