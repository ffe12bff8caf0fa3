//! Core data structures shared by the relay components
//!
//! Identity and event payloads are plain byte values; the wire framing
//! around them lives in [`crate::frame`].

use std::sync::atomic::{AtomicU8, Ordering};

/// DeviceIdentity - who this edge device claims to be
///
/// Immutable for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Hardware identifier of the device
    pub device_id: u8,

    /// Software identifier requested from the collector during pairing
    pub software_id: u8,
}

impl DeviceIdentity {
    pub fn new(device_id: u8, software_id: u8) -> Self {
        Self {
            device_id,
            software_id,
        }
    }

    /// Handshake payload: `[device_id][software_id]`
    pub fn handshake_payload(&self) -> [u8; 2] {
        [self.device_id, self.software_id]
    }
}

/// MotionEvent - opaque payload for one detected motion edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotionEvent(Vec<u8>);

impl MotionEvent {
    pub fn new(payload: Vec<u8>) -> Self {
        Self(payload)
    }

    /// The event every motion edge produces today: the device-id byte
    pub fn from_identity(identity: &DeviceIdentity) -> Self {
        Self(vec![identity.device_id])
    }

    pub fn payload(&self) -> &[u8] {
        &self.0
    }
}

/// Pairing relationship with the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PairingState {
    /// No relationship; handshake must be (re)run
    Unpaired = 0,

    /// Handshake in progress, no ack seen yet
    Pairing = 1,

    /// Collector acknowledged the handshake
    Paired = 2,
}

impl PairingState {
    fn from_u8(value: u8) -> Self {
        match value {
            2 => Self::Paired,
            1 => Self::Pairing,
            _ => Self::Unpaired,
        }
    }
}

/// Atomic tagged cell holding a [`PairingState`]
#[derive(Debug)]
pub struct SharedPairingState(AtomicU8);

impl SharedPairingState {
    pub fn new(state: PairingState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> PairingState {
        PairingState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Store `state`, returning the previous value
    pub fn swap(&self, state: PairingState) -> PairingState {
        PairingState::from_u8(self.0.swap(state as u8, Ordering::SeqCst))
    }

    /// Move to `new` only when currently `current`; true on success
    pub fn transition(&self, current: PairingState, new: PairingState) -> bool {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for SharedPairingState {
    fn default() -> Self {
        Self::new(PairingState::Unpaired)
    }
}

/// Result code carried by a status datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Failure,
    Success,
}

/// Decoded inbound status datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub result: StatusCode,
}

impl StatusReport {
    pub fn success() -> Self {
        Self {
            result: StatusCode::Success,
        }
    }

    pub fn failure() -> Self {
        Self {
            result: StatusCode::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result == StatusCode::Success
    }
}
