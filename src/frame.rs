//! Frame codec
//!
//! Outbound frames are length-prefixed and versioned:
//!
//! ```text
//! ┌─────────────┬──────────────┬─────────────────────┐
//! │ Length (1B) │ Version (1B) │ Payload (Length-1B) │
//! └─────────────┴──────────────┴─────────────────────┘
//! ```
//!
//! Inbound status datagrams are a fixed 4 bytes:
//! `[reserved][message_type][result_code][reserved]`.

use crate::contracts::{StatusCode, StatusReport};
use crate::errors::{DecodeError, Error, Result};
use crate::{PROTOCOL_VERSION, STATUS_DATAGRAM_LEN};

/// Message type discriminator of a status report
pub const MESSAGE_TYPE_STATUS: u8 = 1;

/// Result code: pairing/operation failed
pub const RESULT_FAILURE: u8 = 0;

/// Result code: success
pub const RESULT_SUCCESS: u8 = 1;

/// Largest payload a one-byte length prefix can describe (the version byte counts)
pub const MAX_FRAME_PAYLOAD: usize = u8::MAX as usize - 1;

/// Encode a payload into an outbound frame
///
/// # Errors
/// `PayloadTooLarge` when the payload exceeds [`MAX_FRAME_PAYLOAD`].
pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_FRAME_PAYLOAD {
        return Err(Error::PayloadTooLarge {
            size: payload.len(),
            max: MAX_FRAME_PAYLOAD,
        });
    }

    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.push((payload.len() + 1) as u8);
    frame.push(PROTOCOL_VERSION);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Decode and validate an inbound status datagram
pub fn decode_status(datagram: &[u8]) -> std::result::Result<StatusReport, DecodeError> {
    if datagram.len() != STATUS_DATAGRAM_LEN {
        return Err(DecodeError::MalformedDatagram {
            expected: STATUS_DATAGRAM_LEN,
            received: datagram.len(),
        });
    }

    if datagram[1] != MESSAGE_TYPE_STATUS {
        return Err(DecodeError::UnexpectedMessageType(datagram[1]));
    }

    let result = match datagram[2] {
        RESULT_FAILURE => StatusCode::Failure,
        RESULT_SUCCESS => StatusCode::Success,
        other => return Err(DecodeError::UnknownResultCode(other)),
    };

    Ok(StatusReport { result })
}

/// Encode a status report the way the collector sends it
pub fn encode_status(report: StatusReport) -> [u8; STATUS_DATAGRAM_LEN] {
    let code = match report.result {
        StatusCode::Failure => RESULT_FAILURE,
        StatusCode::Success => RESULT_SUCCESS,
    };
    [0, MESSAGE_TYPE_STATUS, code, 0]
}
