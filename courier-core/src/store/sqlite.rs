// SPDX-FileCopyrightText: 2026 Courier Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! SQLite-backed message store.
//!
//! Reference implementation of the store boundary. The queue layer stages
//! outbound payloads and placeholder records through the staging helpers;
//! the engine only goes through the [`MessageStore`] trait.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::{MessageBox, MessageStore, MetadataUpdate, StoreError, StoredMessage};
use crate::pdu::{Pdu, RetrieveStatus};

const LOCATOR_PREFIX: &str = "messages/";

/// SQLite-based message store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens or creates a store database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Creates an in-memory store (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS payloads (
                 locator TEXT PRIMARY KEY,
                 data BLOB NOT NULL
             );
             CREATE TABLE IF NOT EXISTS messages (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 message_box TEXT NOT NULL,
                 subject TEXT,
                 body BLOB NOT NULL,
                 response_status INTEGER,
                 server_message_id TEXT,
                 date INTEGER NOT NULL DEFAULT 0,
                 read INTEGER NOT NULL DEFAULT 0,
                 seen INTEGER NOT NULL DEFAULT 0,
                 creator TEXT,
                 subscription_id INTEGER
             );
             CREATE TABLE IF NOT EXISTS placeholders (
                 location_url TEXT PRIMARY KEY,
                 retrieve_status INTEGER NOT NULL
             );",
        )?;
        Ok(())
    }

    // === Staging Operations (queue layer) ===

    /// Stages payload bytes under a locator, replacing any previous bytes.
    pub fn stage_payload(&self, locator: &str, data: &[u8]) -> Result<(), StoreError> {
        self.lock().execute(
            "INSERT OR REPLACE INTO payloads (locator, data) VALUES (?1, ?2)",
            params![locator, data],
        )?;
        Ok(())
    }

    /// Creates a placeholder record for a pending inbound message.
    pub fn create_placeholder(&self, location_url: &str) -> Result<(), StoreError> {
        self.lock().execute(
            "INSERT OR REPLACE INTO placeholders (location_url, retrieve_status)
             VALUES (?1, ?2)",
            params![location_url, RetrieveStatus::Ok.code()],
        )?;
        Ok(())
    }

    // === Query Helpers ===

    /// Reads back staged or written payload bytes.
    pub fn payload(&self, locator: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let data = self
            .lock()
            .query_row(
                "SELECT data FROM payloads WHERE locator = ?1",
                params![locator],
                |row| row.get(0),
            )
            .optional()?;
        Ok(data)
    }

    /// Returns the placeholder status code for a location URL, if the
    /// placeholder still exists.
    pub fn placeholder_status(&self, location_url: &str) -> Result<Option<u32>, StoreError> {
        let status = self
            .lock()
            .query_row(
                "SELECT retrieve_status FROM placeholders WHERE location_url = ?1",
                params![location_url],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(status.map(|s| s as u32))
    }

    /// Returns all messages in a collection, oldest first.
    pub fn messages_in_box(&self, dest: MessageBox) -> Result<Vec<StoredMessage>, StoreError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, message_box, subject, body, response_status, server_message_id,
                    date, read, seen, creator, subscription_id
             FROM messages WHERE message_box = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![dest.as_str()], row_to_message)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::Database)
    }

    /// Returns a single message by locator.
    pub fn message(&self, locator: &str) -> Result<Option<StoredMessage>, StoreError> {
        let id = parse_locator(locator)?;
        let message = self
            .lock()
            .query_row(
                "SELECT id, message_box, subject, body, response_status, server_message_id,
                        date, read, seen, creator, subscription_id
                 FROM messages WHERE id = ?1",
                params![id],
                row_to_message,
            )
            .optional()?;
        Ok(message)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MessageStore for SqliteStore {
    fn read_payload(&self, locator: &str, max_size: usize) -> Result<Vec<u8>, StoreError> {
        let data: Vec<u8> = self
            .lock()
            .query_row(
                "SELECT data FROM payloads WHERE locator = ?1",
                params![locator],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(locator.to_string()))?;

        if data.len() > max_size {
            return Err(StoreError::TooLarge {
                size: data.len(),
                max: max_size,
            });
        }
        Ok(data)
    }

    fn write_payload(&self, locator: &str, data: &[u8]) -> Result<(), StoreError> {
        self.stage_payload(locator, data)
    }

    fn persist_message(&self, pdu: &Pdu, dest: MessageBox) -> Result<String, StoreError> {
        let (subject, body) = match pdu {
            Pdu::SendRequest(req) => (req.subject.clone(), req.body.clone()),
            Pdu::RetrieveConf(conf) => (conf.subject.clone(), conf.body.clone()),
            Pdu::SendConf(_) => {
                return Err(StoreError::Rejected(
                    "send confirmations are not storable messages".to_string(),
                ))
            }
        };

        let conn = self.lock();
        conn.execute(
            "INSERT INTO messages (message_box, subject, body) VALUES (?1, ?2, ?3)",
            params![dest.as_str(), subject, body],
        )?;
        let id = conn.last_insert_rowid();
        Ok(format!("{LOCATOR_PREFIX}{id}"))
    }

    fn update_metadata(&self, locator: &str, update: &MetadataUpdate) -> Result<(), StoreError> {
        let id = parse_locator(locator)?;
        let rows = self.lock().execute(
            "UPDATE messages SET
                 message_box = COALESCE(?1, message_box),
                 response_status = COALESCE(?2, response_status),
                 server_message_id = COALESCE(?3, server_message_id),
                 date = COALESCE(?4, date),
                 read = COALESCE(?5, read),
                 seen = COALESCE(?6, seen),
                 creator = COALESCE(?7, creator),
                 subscription_id = COALESCE(?8, subscription_id)
             WHERE id = ?9",
            params![
                update.message_box.map(|b| b.as_str()),
                update.response_status.map(|s| s.code()),
                update.server_message_id,
                update.date.map(|d| d as i64),
                update.read,
                update.seen,
                update.creator,
                update.subscription_id,
                id,
            ],
        )?;

        if rows == 0 {
            return Err(StoreError::NotFound(locator.to_string()));
        }
        Ok(())
    }

    fn update_placeholder_status(
        &self,
        location_url: &str,
        status: RetrieveStatus,
    ) -> Result<(), StoreError> {
        let rows = self.lock().execute(
            "UPDATE placeholders SET retrieve_status = ?1 WHERE location_url = ?2",
            params![status.code(), location_url],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(location_url.to_string()));
        }
        Ok(())
    }

    fn delete_placeholder(&self, location_url: &str) -> Result<(), StoreError> {
        self.lock().execute(
            "DELETE FROM placeholders WHERE location_url = ?1",
            params![location_url],
        )?;
        Ok(())
    }
}

fn parse_locator(locator: &str) -> Result<i64, StoreError> {
    locator
        .strip_prefix(LOCATOR_PREFIX)
        .and_then(|id| id.parse::<i64>().ok())
        .ok_or_else(|| StoreError::NotFound(locator.to_string()))
}

fn row_to_message(row: &rusqlite::Row<'_>) -> Result<StoredMessage, rusqlite::Error> {
    let id: i64 = row.get(0)?;
    let box_name: String = row.get(1)?;
    Ok(StoredMessage {
        locator: format!("{LOCATOR_PREFIX}{id}"),
        message_box: MessageBox::from_name(&box_name),
        subject: row.get(2)?,
        body: row.get(3)?,
        response_status: row.get::<_, Option<i64>>(4)?.map(|s| s as u32),
        server_message_id: row.get(5)?,
        date: row.get::<_, i64>(6)? as u64,
        read: row.get(7)?,
        seen: row.get(8)?,
        creator: row.get(9)?,
        subscription_id: row.get(10)?,
    })
}
