//! Motion Relay - reliable motion-event delivery from an edge device
//!
//! An edge device watches a PIR motion sensor and relays each motion edge
//! to a remote collector over UDP, while keeping a pairing handshake alive
//! with that collector.
//!
//! # Pipeline
//! ```text
//! sensor ─▶ Orchestrator ─▶ EventQueue ─▶ QueueDrain ─▶ NetworkBridge ─▶ socket
//! socket ─▶ InboundListener ─▶ NetworkBridge (pairing state)
//! ```
//!
//! # Design Principles
//! - Chunked exponential backoff, reset on every send
//! - One bounded queue, passed explicitly to whoever needs it
//! - Pairing state owned and synchronised by the bridge
//! - Every blocking wait observes the shutdown signal

pub mod errors;
pub mod contracts;
pub mod frame;
pub mod transmitter;
pub mod ack_manager;
pub mod shutdown;
pub mod bridge;
pub mod queue;
pub mod receiver;
pub mod drain;
pub mod sensor;
pub mod orchestrator;
pub mod config;

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

pub use ack_manager::RetryPolicy;
pub use bridge::NetworkBridge;
pub use config::Config;
pub use contracts::{DeviceIdentity, MotionEvent, PairingState, StatusReport};
pub use errors::{DecodeError, Error, Result};
pub use orchestrator::Orchestrator;
pub use queue::EventQueue;
pub use shutdown::Shutdown;
pub use transmitter::{Transport, UdpTransport};

/// Protocol version byte carried in every outbound frame
pub const PROTOCOL_VERSION: u8 = 1;

/// Fixed size of an inbound status datagram
pub const STATUS_DATAGRAM_LEN: usize = 4;

/// Pending motion events held before the producer blocks
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

pub const DEFAULT_RETRIES_PER_CHUNK: u32 = 5;

pub const DEFAULT_MAX_CHUNKS: u32 = 5;

/// Wait before the second retry chunk
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 200;

/// Backoff growth per chunk (exponential)
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Pause between handshake attempts
pub const DEFAULT_PAIR_INTERVAL_MS: u64 = 1000;

/// How long to wait for motion to clear after an event
pub const DEFAULT_NO_MOTION_TIMEOUT_MS: u64 = 2500;

/// Pause after a daemon iteration fails, so a broken socket doesn't spin
pub(crate) const DAEMON_ERROR_PAUSE: Duration = Duration::from_millis(100);

/// Run one daemon iteration, logging a panic instead of unwinding the thread
pub(crate) fn run_guarded<F: FnOnce()>(daemon: &str, iteration: F) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(iteration)) {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log::error!("{} iteration panicked: {}", daemon, reason);
    }
}
