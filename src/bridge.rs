//! Network Bridge - pairing, reliable send, inbound status handling
//!
//! The bridge owns the transport and the [`PairingState`]. Outbound writes
//! from the foreground thread (handshakes) and the drain daemon (events) are
//! serialised by a send lock; inbound reads happen on the listener thread
//! without taking it.

use std::sync::Mutex;
use std::time::Duration;

use crate::ack_manager::{NextStep, RetryContext, RetryPolicy, Sleeper};
use crate::contracts::{DeviceIdentity, PairingState, SharedPairingState, StatusCode};
use crate::errors::{Error, Result};
use crate::frame;
use crate::shutdown::Shutdown;
use crate::transmitter::Transport;

/// Reliable relay to the collector over an unreliable datagram transport
pub struct NetworkBridge<T: Transport> {
    transport: T,
    send_lock: Mutex<()>,
    state: SharedPairingState,
    identity: DeviceIdentity,
    policy: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
    shutdown: Shutdown,
    pair_interval: Duration,
}

impl<T: Transport> NetworkBridge<T> {
    /// Create a bridge in the `Unpaired` state
    ///
    /// Backoff waits go through `shutdown`, so they end early on interrupt.
    pub fn new(transport: T, identity: DeviceIdentity, policy: RetryPolicy, shutdown: Shutdown) -> Self {
        Self {
            transport,
            send_lock: Mutex::new(()),
            state: SharedPairingState::default(),
            identity,
            policy,
            sleeper: Box::new(shutdown.clone()),
            shutdown,
            pair_interval: Duration::from_millis(crate::DEFAULT_PAIR_INTERVAL_MS),
        }
    }

    /// Replace the backoff sleeper
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Set the pause between handshake attempts
    pub fn with_pair_interval(mut self, interval: Duration) -> Self {
        self.pair_interval = interval;
        self
    }

    pub fn pairing_state(&self) -> PairingState {
        self.state.load()
    }

    pub fn is_paired(&self) -> bool {
        self.pairing_state() == PairingState::Paired
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Frame and send one payload, holding the send lock for the write only
    fn send_once(&self, frame: &[u8]) -> Result<usize> {
        let _guard = self.send_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.transport.send(frame)
    }

    /// Deliver `payload` with chunked retry/backoff
    ///
    /// Every call starts from attempt 0 with the base backoff. On exhaustion
    /// the pairing state drops to `Unpaired` and `SendFailure` is returned.
    ///
    /// # Errors
    /// - `SendFailure` after `policy.total_attempts()` failed attempts
    /// - `Shutdown` if shutdown is requested during a backoff wait
    /// - `PayloadTooLarge` if the payload cannot be framed
    pub fn send_reliable(&self, payload: &[u8]) -> Result<()> {
        let frame = frame::encode(payload)?;
        let mut ctx = RetryContext::new(self.policy);

        loop {
            let err = match self.send_once(&frame) {
                Ok(_) => return Ok(()),
                Err(e) => e,
            };

            log::debug!(
                "Send attempt {} failed (chunk {}, position {}): {}",
                ctx.attempt,
                ctx.chunk_index,
                ctx.position_in_chunk,
                err
            );

            match ctx.on_failure() {
                NextStep::Retry => {}
                NextStep::Backoff(wait) => {
                    log::info!(
                        "Send retry chunk {} exhausted, backing off {:?}",
                        ctx.chunk_index - 1,
                        wait
                    );
                    self.sleeper.sleep(wait);
                    if self.shutdown.is_requested() {
                        return Err(Error::Shutdown);
                    }
                }
                NextStep::Exhausted => {
                    let attempts = ctx.attempts_made();
                    log::warn!("Send failed after {} attempts; marking unpaired", attempts);
                    self.mark_unpaired();
                    return Err(Error::SendFailure { attempts });
                }
            }
        }
    }

    fn mark_unpaired(&self) {
        let previous = self.state.swap(PairingState::Unpaired);
        if previous != PairingState::Unpaired {
            log::info!("Pairing state {:?} -> Unpaired", previous);
        }
    }

    /// Handshake until paired
    ///
    /// Sends the identity handshake, then waits `pair_interval` for the
    /// listener to record an ack. Returns `Error::Shutdown` as soon as
    /// shutdown is observed.
    pub fn pair(&self) -> Result<()> {
        let handshake = self.identity.handshake_payload();
        while !self.is_paired() {
            if self.shutdown.is_requested() {
                return Err(Error::Shutdown);
            }
            self.enter_pairing();

            match self.send_reliable(&handshake) {
                Ok(()) => log::debug!("Handshake sent"),
                Err(Error::Shutdown) => return Err(Error::Shutdown),
                Err(e) => {
                    log::warn!("Handshake failed: {}", e);
                    // Exhaustion dropped us to Unpaired; still pairing
                    self.enter_pairing();
                }
            }

            if self.is_paired() {
                break;
            }
            if self.shutdown.wait_timeout(self.pair_interval) {
                return Err(Error::Shutdown);
            }
        }

        log::info!("Device {} paired", self.identity.device_id);
        Ok(())
    }

    fn enter_pairing(&self) {
        if self.state.transition(PairingState::Unpaired, PairingState::Pairing) {
            log::info!("Pairing with collector as device {}", self.identity.device_id);
        }
    }

    /// Apply one inbound datagram to the pairing state
    ///
    /// Malformed or unexpected datagrams are logged and discarded.
    pub fn handle_inbound(&self, datagram: &[u8]) {
        let report = match frame::decode_status(datagram) {
            Ok(report) => report,
            Err(e) => {
                log::warn!("Discarding inbound datagram {:?}: {}", datagram, e);
                return;
            }
        };

        match report.result {
            StatusCode::Success => {
                let previous = self.state.swap(PairingState::Paired);
                if previous != PairingState::Paired {
                    log::info!("Collector acknowledged pairing ({:?} -> Paired)", previous);
                }
            }
            StatusCode::Failure => {
                if self.state.transition(PairingState::Paired, PairingState::Unpaired) {
                    log::warn!("Collector reported failure; Paired -> Unpaired");
                } else {
                    log::debug!("Collector reported failure while not paired");
                }
            }
        }
    }
}
