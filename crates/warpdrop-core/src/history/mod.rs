//! Transfer history tracking for Warpdrop.
//!
//! Completed and failed transfers are recorded to a JSON file so
//! users can review what moved through the tool. The store keeps the
//! newest [`MAX_RECORDS`] entries and drops the rest.

use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::hash;

/// Number of records retained, newest first.
pub const MAX_RECORDS: usize = 100;

/// Direction of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// The payload was sent to a peer
    Sent,
    /// The payload was received from a peer
    Received,
}

impl std::fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sent => write!(f, "Sent"),
            Self::Received => write!(f, "Received"),
        }
    }
}

/// A single transfer record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    /// Unique identifier for this record
    pub id: Uuid,
    /// File name, or a short label for text-only transfers
    pub file_name: String,
    /// Payload size in bytes
    pub file_size: u64,
    /// MIME type of the payload
    pub file_type: String,
    /// Direction of the transfer
    pub direction: TransferDirection,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Abbreviated SHA-256 digest of the payload
    pub hash_preview: Option<String>,
    /// Whether the transfer completed and verified
    pub success: bool,
    /// Error message for unsuccessful transfers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TransferRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn new(direction: TransferDirection, file_name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name,
            file_size: 0,
            file_type: "application/octet-stream".to_string(),
            direction,
            timestamp: chrono::Utc::now().timestamp_millis(),
            hash_preview: None,
            success: true,
            error_message: None,
        }
    }

    /// Set the payload size and MIME type.
    #[must_use]
    pub fn with_payload(mut self, size: u64, file_type: String) -> Self {
        self.file_size = size;
        self.file_type = file_type;
        self
    }

    /// Record the abbreviated digest of the payload.
    #[must_use]
    pub fn with_hash(mut self, digest: &str) -> Self {
        self.hash_preview = Some(hash::preview(digest));
        self
    }

    /// Mark the record as failed with an error message.
    #[must_use]
    pub fn with_error(mut self, message: String) -> Self {
        self.success = false;
        self.error_message = Some(message);
        self
    }

    /// Get the timestamp as a human-readable string.
    #[must_use]
    pub fn formatted_timestamp(&self) -> String {
        use chrono::{DateTime, Utc};
        DateTime::<Utc>::from_timestamp_millis(self.timestamp).map_or_else(
            || "Unknown".to_string(),
            |dt| dt.format("%Y-%m-%d %H:%M").to_string(),
        )
    }
}

/// Serializable wrapper for the history file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    records: Vec<TransferRecord>,
}

/// Transfer history store, newest record first.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    records: Vec<TransferRecord>,
}

impl HistoryStore {
    /// Load the history store from the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the store exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let path = Self::default_path().unwrap_or_else(|| PathBuf::from("history.json"));
        Self::load_from(path)
    }

    /// Load from a specific path.
    ///
    /// A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsed.
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                path,
                records: Vec::new(),
            });
        }

        let file = fs::File::open(&path).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to open history store at {}: {}",
                path.display(),
                e
            ))
        })?;

        let reader = BufReader::new(file);
        let db: HistoryFile = serde_json::from_reader(reader).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to parse history store at {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self {
            path,
            records: db.records,
        })
    }

    /// Get the default history store path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "warpdrop", "Warpdrop")
            .map(|dirs| dirs.data_dir().join("history.json"))
    }

    /// Save the history store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!(
                    "Failed to create history store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = HistoryFile {
            records: self.records.clone(),
        };

        let file = fs::File::create(&self.path).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to create history store at {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &db).map_err(|e| {
            Error::ConfigError(format!(
                "Failed to write history store at {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Add a record, newest first. Records beyond [`MAX_RECORDS`]
    /// are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be saved.
    pub fn add(&mut self, record: TransferRecord) -> Result<()> {
        self.records.insert(0, record);
        if self.records.len() > MAX_RECORDS {
            self.records.truncate(MAX_RECORDS);
        }
        self.save()
    }

    /// List records, optionally limited to the most recent `limit`.
    #[must_use]
    pub fn list(&self, limit: Option<usize>) -> &[TransferRecord] {
        limit.map_or_else(
            || &self.records[..],
            |n| &self.records[..n.min(self.records.len())],
        )
    }

    /// Get a record by index (0 = most recent).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TransferRecord> {
        self.records.get(index)
    }

    /// Get the total number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Clear all records.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be saved.
    pub fn clear(&mut self) -> Result<()> {
        self.records.clear();
        self.save()
    }

    /// Get the path to the history store file.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
