//! Message Payload Structures
//!
//! Typed representation of the binary payloads exchanged with the carrier
//! network, plus the codec boundary the transaction engine works against.
//! The engine treats encoding and decoding as opaque transforms that report
//! failure; the wire framing itself is versioned bincode.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Codec error types.
#[derive(Error, Debug)]
pub enum PduError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Empty payload")]
    Empty,

    #[error("Encoding failed: {0}")]
    Encoding(String),
}

/// Status carried by a send confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    /// The network accepted the message.
    Ok,
    /// Unspecified rejection.
    ErrorUnspecified,
    /// Transient failure, the network may accept a retry.
    ErrorTransientFailure,
    /// Permanent rejection.
    ErrorPermanentFailure,
}

impl ResponseStatus {
    /// Wire code for the status, as stored alongside persisted messages.
    pub fn code(self) -> u32 {
        match self {
            ResponseStatus::Ok => 128,
            ResponseStatus::ErrorUnspecified => 129,
            ResponseStatus::ErrorTransientFailure => 192,
            ResponseStatus::ErrorPermanentFailure => 224,
        }
    }
}

/// Status carried by a retrieval confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetrieveStatus {
    /// The message body was retrieved.
    Ok,
    /// Transient failure, the message may still be pending.
    ErrorTransientFailure,
    /// The message is no longer available on the server.
    ErrorMessageNotFound,
    /// Permanent failure.
    ErrorPermanentFailure,
}

impl RetrieveStatus {
    /// Wire code for the status, as stored on placeholder records.
    pub fn code(self) -> u32 {
        match self {
            RetrieveStatus::Ok => 128,
            RetrieveStatus::ErrorTransientFailure => 192,
            RetrieveStatus::ErrorMessageNotFound => 193,
            RetrieveStatus::ErrorPermanentFailure => 224,
        }
    }
}

/// Destination address slots of a send request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressField {
    To,
    Cc,
    Bcc,
}

/// All address slots, in the order they are rewritten.
pub const ADDRESS_FIELDS: [AddressField; 3] =
    [AddressField::To, AddressField::Cc, AddressField::Bcc];

/// Outbound send request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRequestPdu {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: Option<String>,
    pub body: Vec<u8>,
}

impl SendRequestPdu {
    /// Returns the addresses in the given slot.
    pub fn addresses(&self, field: AddressField) -> &[String] {
        match field {
            AddressField::To => &self.to,
            AddressField::Cc => &self.cc,
            AddressField::Bcc => &self.bcc,
        }
    }

    /// Replaces the addresses in the given slot.
    pub fn set_addresses(&mut self, field: AddressField, addresses: Vec<String>) {
        match field {
            AddressField::To => self.to = addresses,
            AddressField::Cc => self.cc = addresses,
            AddressField::Bcc => self.bcc = addresses,
        }
    }
}

/// Confirmation returned by the network after a send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendConfPdu {
    pub response_status: ResponseStatus,
    /// Server-assigned message id, present on acceptance.
    pub message_id: Option<String>,
}

/// Retrieval confirmation returned for a download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieveConfPdu {
    pub retrieve_status: RetrieveStatus,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub body: Vec<u8>,
}

/// Any payload understood by the codec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pdu {
    SendRequest(SendRequestPdu),
    SendConf(SendConfPdu),
    RetrieveConf(RetrieveConfPdu),
}

impl Pdu {
    /// Encodes the payload to its binary form.
    pub fn encode(&self) -> Result<Vec<u8>, PduError> {
        bincode::serialize(self).map_err(|e| PduError::Encoding(e.to_string()))
    }

    /// Decodes a binary payload.
    ///
    /// Truncated or otherwise unparseable input is reported as
    /// [`PduError::Malformed`]; the engine decides per call site whether
    /// that aborts the transaction or is swallowed as best-effort.
    pub fn decode(data: &[u8]) -> Result<Pdu, PduError> {
        if data.is_empty() {
            return Err(PduError::Empty);
        }
        bincode::deserialize(data).map_err(|e| PduError::Malformed(e.to_string()))
    }
}
