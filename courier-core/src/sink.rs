//! Result Delivery
//!
//! The queue layer's notification surface. Every transaction produces
//! exactly one [`DeliveredResult`], no matter which channel carried it or
//! how many best-effort steps failed along the way.

use std::sync::mpsc;
use std::sync::Mutex;

use tracing::warn;

use crate::transaction::TransactionId;

/// Channel-neutral result of one transaction.
///
/// Carrier statuses and HTTP statuses are translated into this vocabulary
/// before they reach persistence or the sink; channel-specific codes never
/// leak past the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    /// The transfer succeeded.
    Success,
    /// No channel was available; nothing was attempted.
    NetworkUnavailable,
    /// The direct exchange was attempted and failed.
    HttpFailure,
    /// Payload preparation or response write-back failed.
    IoFailure,
    /// The carrier attempted the transfer and it failed.
    UnspecifiedFailure,
}

impl ResultCode {
    /// Returns true for a successful transfer.
    pub fn is_success(&self) -> bool {
        matches!(self, ResultCode::Success)
    }
}

/// Final outcome of a transaction, delivered exactly once.
#[derive(Debug, Clone)]
pub struct DeliveredResult {
    pub transaction_id: TransactionId,
    pub code: ResultCode,
    /// Raw response bytes, for transactions that return them inline.
    pub response: Option<Vec<u8>>,
    /// HTTP status observed on the direct path; zero when the carrier
    /// channel produced the outcome or no exchange happened.
    pub http_status: u16,
    /// Whether the carrier channel produced the outcome.
    pub originated_from_carrier: bool,
}

/// Receives the final outcome of each transaction.
pub trait ResultSink: Send + Sync {
    /// Invoked exactly once per transaction.
    fn deliver(&self, result: DeliveredResult);
}

/// Sink backed by an mpsc channel.
///
/// The engine side sends; the queue layer holds the receiver and reacts to
/// results on its own schedule.
pub struct ChannelSink {
    tx: Mutex<mpsc::Sender<DeliveredResult>>,
}

impl ChannelSink {
    /// Creates a sink and the receiver for its results.
    pub fn new() -> (Self, mpsc::Receiver<DeliveredResult>) {
        let (tx, rx) = mpsc::channel();
        (ChannelSink { tx: Mutex::new(tx) }, rx)
    }
}

impl ResultSink for ChannelSink {
    fn deliver(&self, result: DeliveredResult) {
        let tx = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        if tx.send(result).is_err() {
            warn!("result receiver dropped, delivery lost");
        }
    }
}
