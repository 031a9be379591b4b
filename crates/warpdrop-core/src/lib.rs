//! # Warpdrop Core Library
//!
//! `warpdrop-core` provides the core functionality for Warpdrop, a
//! code-rendezvous peer-to-peer file and text transfer tool.
//!
//! Two peers exchange a short human-readable code ("Cosmic-Falcon"),
//! meet on a shared rendezvous service, and move chunked,
//! hash-verified payloads over an ordered message channel. NAT
//! traversal and encryption are the transport's problem; this crate
//! owns everything above the channel.
//!
//! ## Modules
//!
//! - [`code`] - Warp code generation, validation, and channel-id derivation
//! - [`config`] - Configuration management
//! - [`mod@file`] - In-memory file payloads and archive bundling
//! - [`hash`] - Content digests and integrity verification
//! - [`history`] - Transfer history tracking and persistence
//! - [`protocol`] - Wire messages and chunk encoding
//! - [`session`] - Session state machine and transfer engine
//! - [`transport`] - Channel transport abstraction (plus an in-process hub)
//!
//! ## Example
//!
//! ```rust,ignore
//! use warpdrop_core::session::SessionController;
//! use warpdrop_core::transport::memory::MemoryHub;
//!
//! let hub = MemoryHub::new();
//! let (controller, handle) = SessionController::new(hub);
//! controller.spawn();
//!
//! handle.listen().await?;
//! let snapshot = handle.wait_for(|s| s.code.is_some()).await?;
//! println!("share this code: {}", snapshot.code.unwrap());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unused_async)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]

pub mod code;
pub mod config;
pub mod error;
pub mod file;
pub mod hash;
pub mod history;
pub mod protocol;
pub mod session;
pub mod transport;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Chunk size for file transfers (16 KiB)
pub const CHUNK_SIZE: usize = 16 * 1024;

/// Yield to the scheduler after this many chunks in the send loop
pub const YIELD_EVERY: usize = 50;

/// Default code expiration time in seconds
pub const DEFAULT_CODE_EXPIRATION_SECS: u64 = 300;

/// Maximum length of a shared text message in characters
pub const MAX_TEXT_LEN: usize = 10_000;

/// Namespace prefix for channel identifiers derived from codes
pub const CHANNEL_ID_PREFIX: &str = "wd";

/// Seconds without receiver activity before an in-flight transfer is
/// considered stalled
pub const DEFAULT_STALL_TIMEOUT_SECS: u64 = 30;
