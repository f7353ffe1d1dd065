// SPDX-FileCopyrightText: 2026 Courier Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Message Store Boundary
//!
//! The durable message store is an external collaborator; this module
//! specifies the operations the transaction engine needs from it and ships
//! a SQLite-backed reference implementation. Store failures are reported to
//! the engine and logged there — they are never retried and never change a
//! transfer result that has already been decided.

mod sqlite;

pub use sqlite::SqliteStore;

use thiserror::Error;

use crate::pdu::{Pdu, ResponseStatus, RetrieveStatus};

/// Store error types.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payload too large: {size} bytes exceeds limit of {max}")]
    TooLarge { size: usize, max: usize },

    #[error("Store rejected message: {0}")]
    Rejected(String),
}

/// Target collection for a persisted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageBox {
    /// Outbound messages that left the device.
    Sent,
    /// Retrieved inbound messages.
    Inbox,
    /// Outbound messages whose transfer did not succeed.
    Failed,
}

impl MessageBox {
    /// Stable name used by store implementations.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageBox::Sent => "sent",
            MessageBox::Inbox => "inbox",
            MessageBox::Failed => "failed",
        }
    }

    /// Parses a stable name back into a box. Unknown names land in `Sent`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "inbox" => MessageBox::Inbox,
            "failed" => MessageBox::Failed,
            _ => MessageBox::Sent,
        }
    }
}

/// Metadata columns updated after a transfer outcome is known.
///
/// `None` fields are left untouched by the store.
#[derive(Debug, Clone, Default)]
pub struct MetadataUpdate {
    pub message_box: Option<MessageBox>,
    pub response_status: Option<ResponseStatus>,
    /// Server-assigned message id from a send confirmation.
    pub server_message_id: Option<String>,
    /// Unix timestamp of the transfer outcome.
    pub date: Option<u64>,
    pub read: Option<bool>,
    pub seen: Option<bool>,
    pub creator: Option<String>,
    pub subscription_id: Option<i32>,
}

/// A persisted message, as read back from the store.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    /// Locator assigned by the store on persist.
    pub locator: String,
    pub message_box: MessageBox,
    pub subject: Option<String>,
    pub body: Vec<u8>,
    pub response_status: Option<u32>,
    pub server_message_id: Option<String>,
    pub date: u64,
    pub read: bool,
    pub seen: bool,
    pub creator: Option<String>,
    pub subscription_id: Option<i32>,
}

/// Store operations required by the transaction engine.
///
/// All operations may fail independently of each other; the engine reports
/// failures and moves on.
pub trait MessageStore: Send + Sync {
    /// Reads staged payload bytes by locator, bounded by `max_size`.
    fn read_payload(&self, locator: &str, max_size: usize) -> Result<Vec<u8>, StoreError>;

    /// Writes raw response bytes to a caller-supplied target locator.
    fn write_payload(&self, locator: &str, data: &[u8]) -> Result<(), StoreError>;

    /// Persists a decoded message under the target collection and returns
    /// the locator of the new record.
    fn persist_message(&self, pdu: &Pdu, dest: MessageBox) -> Result<String, StoreError>;

    /// Updates metadata fields of a persisted message.
    fn update_metadata(&self, locator: &str, update: &MetadataUpdate) -> Result<(), StoreError>;

    /// Updates the status field of the placeholder record for a pending
    /// inbound message, identified by its location URL.
    fn update_placeholder_status(
        &self,
        location_url: &str,
        status: RetrieveStatus,
    ) -> Result<(), StoreError>;

    /// Deletes the placeholder record for a retrieved message.
    fn delete_placeholder(&self, location_url: &str) -> Result<(), StoreError>;

    /// Releases caller-granted access to a transaction-scoped locator.
    fn revoke_access(&self, _locator: &str) {}
}
