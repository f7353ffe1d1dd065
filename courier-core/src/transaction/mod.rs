//! Message Transactions
//!
//! The two transaction kinds executed by the engine: an outbound transfer
//! and an inbound retrieval. Both share identity, configuration snapshot,
//! and lifecycle; they differ in payload preparation, persistence rules,
//! and how the response reaches the caller.

mod download;
mod send;

pub use download::DownloadTransaction;
pub use send::SendTransaction;

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::carrier::{CarrierJob, CarrierOutcome, CarrierStatus};
use crate::config::{ApnSettings, CarrierConfig};
use crate::engine::Services;
use crate::sink::ResultCode;
use crate::transport::TransportError;

/// Opaque transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wraps an identifier assigned by the queue layer.
    pub fn new(id: impl Into<String>) -> Self {
        TransactionId(id.into())
    }

    /// Generates a fresh random identifier.
    pub fn random() -> Self {
        TransactionId(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// External hint for the byte size of a pending inbound payload.
///
/// Absence of a known size is treated as zero; the policy decisions that
/// consume the size (for instance denying downloads over constrained
/// links) live outside this crate.
pub trait PayloadSizeHints: Send + Sync {
    fn payload_size(&self, location_url: &str) -> Option<u64>;
}

/// Identity and configuration shared by both transaction kinds.
///
/// The configuration snapshot is taken at creation time and never changes
/// for the transaction's lifetime.
#[derive(Debug, Clone)]
pub struct TransactionContext {
    pub id: TransactionId,
    pub subscription_id: i32,
    pub calling_user: i32,
    /// Label of the package that created the transaction.
    pub creator: String,
    pub config: CarrierConfig,
    pub apn: ApnSettings,
}

impl TransactionContext {
    /// Creates a context with a fresh random transaction id.
    pub fn new(
        subscription_id: i32,
        calling_user: i32,
        creator: &str,
        config: CarrierConfig,
        apn: ApnSettings,
    ) -> Self {
        TransactionContext {
            id: TransactionId::random(),
            subscription_id,
            calling_user,
            creator: creator.to_string(),
            config,
            apn,
        }
    }
}

/// The two concrete transaction kinds.
#[derive(Debug)]
pub enum TransactionKind {
    Send(SendTransaction),
    Download(DownloadTransaction),
}

/// One multimedia message transaction, executed at most once.
#[derive(Debug)]
pub struct Transaction {
    pub ctx: TransactionContext,
    pub kind: TransactionKind,
}

impl Transaction {
    /// Creates a transaction.
    pub fn new(ctx: TransactionContext, kind: TransactionKind) -> Self {
        Transaction { ctx, kind }
    }

    /// Byte size of the payload this transaction carries or would retrieve.
    ///
    /// For an outbound transfer this is the size of the prepared payload
    /// (zero before preparation); for a retrieval it is the external size
    /// hint for the pending message, zero when unknown.
    pub fn payload_size(&self, hints: &dyn PayloadSizeHints) -> u64 {
        match &self.kind {
            TransactionKind::Send(send) => send.payload_size(),
            TransactionKind::Download(download) => download.payload_size(hints),
        }
    }

    /// Kind-specific payload preparation before the direct path runs.
    /// Returns false when the transaction is not ready for transport.
    pub(crate) fn prepare(&mut self, services: &Services) -> bool {
        match &mut self.kind {
            TransactionKind::Send(send) => send.prepare(services, &self.ctx),
            TransactionKind::Download(_) => true,
        }
    }

    /// Runs the direct network exchange.
    pub(crate) fn transfer(&mut self, services: &Services) -> Result<Vec<u8>, TransportError> {
        match &mut self.kind {
            TransactionKind::Send(send) => send.transfer(services, &self.ctx),
            TransactionKind::Download(download) => download.transfer(services, &self.ctx),
        }
    }

    /// Builds the job handed to a bound carrier service.
    pub(crate) fn carrier_job(&self) -> CarrierJob {
        match &self.kind {
            TransactionKind::Send(send) => send.carrier_job(&self.ctx),
            TransactionKind::Download(download) => download.carrier_job(&self.ctx),
        }
    }

    /// Interprets a carrier completion for this transaction kind.
    ///
    /// Returns the carrier status and any confirmation bytes, or `None`
    /// when the completion variant does not match the transaction kind
    /// (a carrier-side programming error, logged by the kind).
    pub(crate) fn accept_carrier_outcome(
        &self,
        outcome: &CarrierOutcome,
    ) -> Option<(CarrierStatus, Option<Vec<u8>>)> {
        match &self.kind {
            TransactionKind::Send(send) => send.accept_carrier_outcome(&self.ctx, outcome),
            TransactionKind::Download(download) => {
                download.accept_carrier_outcome(&self.ctx, outcome)
            }
        }
    }

    /// Kind-specific persistence. All failures are logged and swallowed;
    /// the already-decided result code is never altered here.
    pub(crate) fn persist(&self, services: &Services, code: ResultCode, response: Option<&[u8]>) {
        match &self.kind {
            TransactionKind::Send(send) => send.persist(services, &self.ctx, code, response),
            TransactionKind::Download(download) => {
                download.persist(services, &self.ctx, response)
            }
        }
    }

    /// Packages the response for the caller. Returns whether the transfer
    /// succeeded and the bytes to attach to the delivered result, if any.
    pub(crate) fn transfer_response(
        &self,
        services: &Services,
        response: &[u8],
    ) -> (bool, Option<Vec<u8>>) {
        match &self.kind {
            TransactionKind::Send(send) => send.transfer_response(response),
            TransactionKind::Download(download) => {
                download.transfer_response(services, &self.ctx, response)
            }
        }
    }

    /// Releases caller-granted access to transaction-scoped locators.
    pub(crate) fn revoke_access(&self, services: &Services) {
        match &self.kind {
            TransactionKind::Send(send) => send.revoke_access(services),
            TransactionKind::Download(download) => download.revoke_access(services),
        }
    }
}

/// Seconds since the Unix epoch, for persisted timestamps.
pub(crate) fn unix_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
