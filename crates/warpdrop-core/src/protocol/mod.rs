//! Warpdrop wire protocol.
//!
//! The application-level protocol is a small set of tagged messages
//! layered on an opaque ordered message channel (see
//! [`crate::transport`]). The transport guarantees in-order reliable
//! delivery per channel; the protocol does not re-implement either.
//!
//! ## Message flow
//!
//! ```text
//! sender                          receiver
//!   │ ready ──────────────────────────▶ │   (both directions, once,
//!   │ ◀────────────────────────── ready │    immediately after open)
//!   │ text-message {has_file} ────────▶ │   (optional)
//!   │ file-meta {name,size,hash} ─────▶ │
//!   │ chunk {index: 0, data} ─────────▶ │
//!   │ chunk {index: 1, data} ─────────▶ │   ...
//!   │ transfer-complete ──────────────▶ │
//! ```
//!
//! Chunk payloads are 16 KiB slices of the file, base64-encoded so
//! every message is plain structured text. The sender emits chunks in
//! strictly increasing index order; the receiver nevertheless sorts
//! by index before reassembly.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::CHUNK_SIZE;

/// A wire message, tagged by its `type` field.
///
/// Each variant corresponds to one message kind the peers exchange.
/// Decoding happens exactly once at the transport boundary; nothing
/// downstream inspects untyped fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WireMessage {
    /// Post-connect liveness confirmation, sent once by each side
    /// immediately after the channel opens.
    Ready,
    /// File metadata; always precedes the chunks of that file.
    FileMeta {
        /// File name
        name: String,
        /// Total content size in bytes
        size: u64,
        /// MIME type
        file_type: String,
        /// SHA-256 content digest, lowercase hex
        hash: String,
        /// Whether an accompanying text message was sent before this
        /// file
        #[serde(default)]
        has_text: bool,
    },
    /// One 16 KiB slice of file content.
    Chunk {
        /// Zero-based sequence number
        index: u64,
        /// Base64-encoded chunk bytes
        data: String,
    },
    /// End-of-stream marker for the current file, sent exactly once
    /// after the last chunk.
    TransferComplete,
    /// Standalone or file-accompanying text payload.
    TextMessage {
        /// Text content (at most [`crate::MAX_TEXT_LEN`] characters)
        content: String,
        /// Sender Unix timestamp in milliseconds
        timestamp: i64,
        /// Whether a file transfer follows this text
        #[serde(default)]
        has_file: bool,
    },
}

impl WireMessage {
    /// Short name of the message kind, matching the wire tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::FileMeta { .. } => "file-meta",
            Self::Chunk { .. } => "chunk",
            Self::TransferComplete => "transfer-complete",
            Self::TextMessage { .. } => "text-message",
        }
    }
}

/// Number of chunks needed for a payload of `size` bytes.
#[must_use]
pub fn chunk_count(size: u64) -> u64 {
    size.div_ceil(CHUNK_SIZE as u64)
}

/// Build a chunk message from a slice of file content.
#[must_use]
pub fn encode_chunk(index: u64, data: &[u8]) -> WireMessage {
    WireMessage::Chunk {
        index,
        data: BASE64.encode(data),
    }
}

/// Decode a chunk payload back to bytes.
///
/// # Errors
///
/// Returns `Error::EncodeDecode` if the payload is not valid base64.
pub fn decode_chunk(data: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(data)
        .map_err(|e| Error::EncodeDecode(e.to_string()))
}

/// Encode a message to JSON bytes for a transport boundary.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_message(message: &WireMessage) -> Result<Vec<u8>> {
    serde_json::to_vec(message).map_err(|e| Error::Serialization(e.to_string()))
}

/// Decode a message from JSON bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not a valid wire message.
pub fn decode_message(data: &[u8]) -> Result<WireMessage> {
    serde_json::from_slice(data).map_err(|e| Error::Serialization(e.to_string()))
}
