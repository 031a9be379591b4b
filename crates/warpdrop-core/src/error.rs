//! Error types for Warpdrop.
//!
//! This module provides a unified error type for all Warpdrop
//! operations, with specific variants for each failure mode of the
//! transfer protocol.

use std::io;

use thiserror::Error;

/// A specialized `Result` type for Warpdrop operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Warpdrop.
#[derive(Error, Debug)]
pub enum Error {
    /// The derived channel identifier is already claimed on the
    /// rendezvous service
    #[error("identifier '{0}' is already in use")]
    IdentifierInUse(String),

    /// No listener was found for the remote code
    #[error("no peer found for '{0}'")]
    PeerUnreachable(String),

    /// Transport-level failure during connect or mid-session
    #[error("network error: {0}")]
    Network(String),

    /// The peer closed the channel
    #[error("channel closed")]
    ChannelClosed,

    /// Reassembled content does not match the advertised hash
    #[error("verification mismatch: expected {expected}, computed {computed}")]
    VerificationMismatch {
        /// Hash advertised by the sender
        expected: String,
        /// Hash computed over the reassembled content
        computed: String,
    },

    /// A chunk payload failed to decode
    #[error("chunk decode failed: {0}")]
    EncodeDecode(String),

    /// Malformed warp code
    #[error("invalid code format: {0}")]
    InvalidCodeFormat(String),

    /// Could not claim an identifier after bounded retries
    #[error("failed to initialize session")]
    InitializationFailed,

    /// Shared text exceeds the protocol limit
    #[error("text too long: {0} characters (max {max})", max = crate::MAX_TEXT_LEN)]
    TextTooLong(usize),

    /// The session state machine was asked to take an undocumented edge
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// State the session was in
        from: String,
        /// State that was requested
        to: String,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Archive bundling failed
    #[error("archive error: {0}")]
    Archive(String),

    /// Configuration file error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns whether this error is recoverable (can be retried).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::IdentifierInUse(_) | Self::PeerUnreachable(_) | Self::Network(_)
        )
    }
}
