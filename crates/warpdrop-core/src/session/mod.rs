//! Transfer session orchestration.
//!
//! A session is the single owner of all transfer state for one side
//! of a connection. It runs as a spawned task, reacts to commands
//! from its [`SessionHandle`], events from the channel, and periodic
//! ticks, and publishes immutable [`SessionSnapshot`]s through a
//! watch channel. No other task mutates session state.
//!
//! ## Lifecycle
//!
//! ```text
//!             listen                 connect
//!   Idle ──────────────▶ Listening ──────────▶ Connecting
//!     ▲                      │ accept               │
//!     │ reset                ▼                      ▼
//!     ├──────────────── Connected ◀─────────────────┘
//!     │                      │ send / file-meta
//!     │                      ▼
//!     ├──────────────── Transferring ──▶ Failed ──▶ (reset)
//!     │                      │
//!     └──────────────── Completed
//! ```
//!
//! A listening session rotates its share code when the code expires;
//! a receiving session fails the transfer when no data arrives within
//! the stall timeout.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::code::{WarpCode, CODE_EXPIRY};
use crate::error::{Error, Result};
use crate::file::FilePayload;
use crate::hash;
use crate::history::{HistoryStore, TransferDirection, TransferRecord};
use crate::protocol::{self, WireMessage};
use crate::transport::{Channel, ChannelEvent, Listener, Transport};
use crate::{CHUNK_SIZE, DEFAULT_STALL_TIMEOUT_SECS, MAX_TEXT_LEN, YIELD_EVERY};

/// Capacity of the command queue between handle and session task.
const COMMAND_CAPACITY: usize = 32;

/// Display label used in history for text-only transfers.
const TEXT_RECORD_NAME: &str = "Text message";

/// Status of a transfer session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionStatus {
    /// No connection and no claimed share code
    #[default]
    Idle,
    /// Holding a share code, waiting for a peer
    Listening,
    /// Dialing a peer's share code
    Connecting,
    /// Channel open, no transfer in flight
    Connected,
    /// Payload moving in either direction
    Transferring,
    /// Last transfer finished
    Completed,
    /// Session hit an unrecoverable error
    Failed,
}

impl SessionStatus {
    /// Whether a transition from `self` to `next` is allowed.
    ///
    /// Same-state transitions are no-ops and always allowed; `Idle`
    /// is reachable from every state via reset.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self == next || next == Self::Idle {
            return true;
        }
        matches!(
            (self, next),
            (Self::Idle, Self::Listening | Self::Connecting)
                | (Self::Listening, Self::Connecting | Self::Connected | Self::Failed)
                | (Self::Connecting, Self::Connected | Self::Failed)
                | (Self::Connected, Self::Transferring | Self::Failed)
                | (Self::Transferring, Self::Completed | Self::Failed)
        )
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Transferring => "transferring",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Point-in-time view of a session, published on every state change.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    /// Current status
    pub status: SessionStatus,
    /// Active share code, while listening
    pub code: Option<String>,
    /// Whether the peer confirmed liveness with `ready`
    pub peer_ready: bool,
    /// Transfer progress, 0.0 to 100.0
    pub progress: f64,
    /// Last error message, if any
    pub error: Option<String>,
    /// Whether the last received payload verified against its digest
    pub verified: Option<bool>,
    /// File assembled from the last incoming transfer
    pub received_file: Option<FilePayload>,
    /// Text from the last incoming text message
    pub received_text: Option<String>,
}

/// Tuning knobs for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How long a share code stays valid before rotating
    pub code_expiry: Duration,
    /// How long a receiving transfer may go without data
    pub stall_timeout: Duration,
    /// Interval between timer checks
    pub tick: Duration,
    /// Bytes per outgoing chunk
    pub chunk_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            code_expiry: CODE_EXPIRY,
            stall_timeout: Duration::from_secs(DEFAULT_STALL_TIMEOUT_SECS),
            tick: Duration::from_secs(1),
            chunk_size: CHUNK_SIZE,
        }
    }
}

/// Commands a handle sends to its session task.
#[derive(Debug)]
enum SessionCommand {
    Listen,
    Connect(WarpCode),
    StageFiles(Vec<FilePayload>),
    StageText(String),
    Send,
    Reset,
    FullReset,
    Shutdown,
}

/// A cheap, cloneable handle to a running session task.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Claim a share code and start listening for a peer.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the session task is gone.
    pub async fn listen(&self) -> Result<()> {
        self.send_command(SessionCommand::Listen).await
    }

    /// Connect to the peer holding `code`.
    ///
    /// The code is matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidCodeFormat` if `code` is malformed, or
    /// `Error::ChannelClosed` if the session task is gone.
    pub async fn connect(&self, code: &str) -> Result<()> {
        let code = WarpCode::parse(code)?;
        self.send_command(SessionCommand::Connect(code)).await
    }

    /// Stage files for the next send.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the session task is gone.
    pub async fn stage_files(&self, files: Vec<FilePayload>) -> Result<()> {
        self.send_command(SessionCommand::StageFiles(files)).await
    }

    /// Stage a text message for the next send.
    ///
    /// # Errors
    ///
    /// Returns `Error::TextTooLong` if `text` exceeds the limit, or
    /// `Error::ChannelClosed` if the session task is gone.
    pub async fn stage_text(&self, text: String) -> Result<()> {
        let chars = text.chars().count();
        if chars > MAX_TEXT_LEN {
            return Err(Error::TextTooLong(chars));
        }
        self.send_command(SessionCommand::StageText(text)).await
    }

    /// Send everything staged to the connected peer.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the session task is gone.
    pub async fn send_now(&self) -> Result<()> {
        self.send_command(SessionCommand::Send).await
    }

    /// Drop the connection and clear transfer state.
    ///
    /// A claimed share code survives the reset: a listening session
    /// returns to `Listening` under its original code. Use
    /// [`SessionHandle::full_reset`] to release the code as well.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the session task is gone.
    pub async fn reset(&self) -> Result<()> {
        self.send_command(SessionCommand::Reset).await
    }

    /// Tear the session down entirely, releasing the share code, and
    /// return to idle.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the session task is gone.
    pub async fn full_reset(&self) -> Result<()> {
        self.send_command(SessionCommand::FullReset).await
    }

    /// Stop the session task.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the session task is gone.
    pub async fn shutdown(&self) -> Result<()> {
        self.send_command(SessionCommand::Shutdown).await
    }

    /// Get the latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Get a watch receiver for observing state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Wait until a snapshot satisfies `predicate` and return it.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the session task is gone.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<SessionSnapshot>
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        Ok(snapshot.clone())
    }

    async fn send_command(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::ChannelClosed)
    }
}

/// State accumulated while a file is being received.
#[derive(Debug)]
struct PendingFile {
    name: String,
    size: u64,
    file_type: String,
    hash: String,
    chunks: Vec<(u64, Vec<u8>)>,
    bytes_received: u64,
}

/// One step of the session event loop.
enum Step {
    Command(Option<SessionCommand>),
    Channel(ChannelEvent),
    Incoming(Result<Channel>),
    Tick,
}

/// The session task state. Construct one, then [`SessionController::spawn`]
/// it to get a handle.
pub struct SessionController<T: Transport> {
    transport: T,
    options: SessionOptions,
    history: Option<HistoryStore>,

    commands: mpsc::Receiver<SessionCommand>,
    snapshot_tx: watch::Sender<SessionSnapshot>,

    snapshot: SessionSnapshot,
    code: Option<WarpCode>,
    code_deadline: Option<Instant>,
    listener: Option<Listener>,
    channel: Option<Channel>,

    staged_files: Vec<FilePayload>,
    staged_text: Option<String>,
    incoming: Option<PendingFile>,
    last_activity: Instant,
}

impl<T: Transport> std::fmt::Debug for SessionController<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("status", &self.snapshot.status)
            .field("code", &self.code)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> SessionController<T> {
    /// Create a session over `transport` with default options.
    #[must_use]
    pub fn new(transport: T) -> (Self, SessionHandle) {
        Self::with_options(transport, SessionOptions::default())
    }

    /// Create a session with custom options.
    #[must_use]
    pub fn with_options(transport: T, options: SessionOptions) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let controller = Self {
            transport,
            options,
            history: None,
            commands: command_rx,
            snapshot_tx,
            snapshot: SessionSnapshot::default(),
            code: None,
            code_deadline: None,
            listener: None,
            channel: None,
            staged_files: Vec::new(),
            staged_text: None,
            incoming: None,
            last_activity: Instant::now(),
        };

        let handle = SessionHandle {
            commands: command_tx,
            snapshot_rx,
        };

        (controller, handle)
    }

    /// Attach a history store; completed and failed transfers are
    /// recorded to it.
    #[must_use]
    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    /// Spawn the session event loop onto the current runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run the session event loop until shutdown.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.options.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let step = {
                let commands = &mut self.commands;
                let channel = &mut self.channel;
                let listener = &mut self.listener;
                tokio::select! {
                    command = commands.recv() => Step::Command(command),
                    event = next_channel_event(channel) => Step::Channel(event),
                    incoming = next_incoming(listener) => Step::Incoming(incoming),
                    _ = ticker.tick() => Step::Tick,
                }
            };

            match step {
                Step::Command(None) | Step::Command(Some(SessionCommand::Shutdown)) => break,
                Step::Command(Some(command)) => self.handle_command(command).await,
                Step::Channel(event) => self.handle_channel_event(event).await,
                Step::Incoming(Ok(channel)) => self.handle_incoming(channel).await,
                Step::Incoming(Err(_)) => {
                    self.listener = None;
                }
                Step::Tick => self.handle_tick().await,
            }
        }

        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
        debug!("session task stopped");
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Listen => {
                if let Err(e) = self.start_listening().await {
                    self.fail(e);
                }
            }
            SessionCommand::Connect(code) => {
                // A dead or mistyped code is not fatal: surface the
                // error, put the session back where it was, and let
                // the caller retry.
                let prior = self.snapshot.status;
                if let Err(e) = self.connect_to(code).await {
                    warn!(error = %e, "connect failed");
                    self.snapshot.status = prior;
                    self.snapshot.error = Some(e.to_string());
                    self.publish();
                }
            }
            SessionCommand::StageFiles(files) => {
                self.staged_files = files;
            }
            SessionCommand::StageText(text) => {
                self.staged_text = Some(text);
            }
            SessionCommand::Send => {
                if let Err(e) = self.send_staged().await {
                    self.fail(e);
                }
            }
            SessionCommand::Reset => self.reset().await,
            SessionCommand::FullReset => self.full_reset().await,
            SessionCommand::Shutdown => unreachable!("handled by the event loop"),
        }
    }

    /// Generate a code and claim its channel identifier.
    ///
    /// One retry with a fresh code on `IdentifierInUse`; anything
    /// after that surfaces as `InitializationFailed`.
    async fn start_listening(&mut self) -> Result<()> {
        self.transition(SessionStatus::Listening)?;

        for attempt in 0..2 {
            let code = WarpCode::generate();
            match self.transport.listen(&code.channel_id()).await {
                Ok(listener) => {
                    info!(code = %code, "listening for peer");
                    self.listener = Some(listener);
                    self.snapshot.code = Some(code.to_string());
                    self.code = Some(code);
                    self.code_deadline = Some(Instant::now() + self.options.code_expiry);
                    self.publish();
                    return Ok(());
                }
                Err(Error::IdentifierInUse(id)) if attempt == 0 => {
                    debug!(%id, "share code collision, regenerating");
                }
                Err(e) if e.is_recoverable() && attempt == 0 => {
                    debug!(error = %e, "listen attempt failed, retrying");
                }
                Err(_) => break,
            }
        }

        Err(Error::InitializationFailed)
    }

    async fn connect_to(&mut self, code: WarpCode) -> Result<()> {
        self.transition(SessionStatus::Connecting)?;
        self.snapshot.error = None;
        self.publish();

        let channel = self.transport.connect(&code.channel_id()).await?;
        channel.send(WireMessage::Ready).await?;
        self.channel = Some(channel);
        self.transition(SessionStatus::Connected)?;
        info!(code = %code, "connected to peer");
        self.publish();
        Ok(())
    }

    async fn handle_incoming(&mut self, channel: Channel) {
        if self.channel.is_some() {
            // One peer per session; turn away latecomers.
            channel.close().await;
            return;
        }

        // Best effort: a peer that already hung up still left buffered
        // messages worth draining, and its close marker will surface
        // through the normal event path.
        let _ = channel.send(WireMessage::Ready).await;

        self.channel = Some(channel);
        if self.transition(SessionStatus::Connected).is_ok() {
            info!("peer connected");
            self.publish();
        }
    }

    async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Message(message) => {
                if let Err(e) = self.handle_message(message).await {
                    self.fail(e);
                }
            }
            ChannelEvent::Closed => {
                self.channel = None;
                if self.snapshot.status == SessionStatus::Transferring {
                    self.fail(Error::ChannelClosed);
                } else {
                    debug!("peer disconnected");
                    self.reset().await;
                }
            }
            ChannelEvent::Error(message) => {
                self.fail(Error::Network(message));
            }
        }
    }

    async fn handle_message(&mut self, message: WireMessage) -> Result<()> {
        self.last_activity = Instant::now();

        match message {
            WireMessage::Ready => {
                self.snapshot.peer_ready = true;
                self.publish();
            }
            WireMessage::FileMeta {
                name,
                size,
                file_type,
                hash,
                ..
            } => {
                debug!(%name, size, "incoming file");
                self.transition(SessionStatus::Transferring)?;
                self.incoming = Some(PendingFile {
                    name,
                    size,
                    file_type,
                    hash,
                    chunks: Vec::new(),
                    bytes_received: 0,
                });
                self.snapshot.progress = 0.0;
                self.publish();
            }
            WireMessage::Chunk { index, data } => {
                let bytes = protocol::decode_chunk(&data)?;
                let pending = self
                    .incoming
                    .as_mut()
                    .ok_or_else(|| Error::Network("chunk before file-meta".to_string()))?;
                pending.bytes_received += bytes.len() as u64;
                pending.chunks.push((index, bytes));

                let progress = if pending.size == 0 {
                    0.0
                } else {
                    (pending.bytes_received as f64 / pending.size as f64 * 100.0).min(99.0)
                };
                if progress > self.snapshot.progress {
                    self.snapshot.progress = progress;
                    self.publish();
                }
            }
            WireMessage::TransferComplete => self.finish_receiving()?,
            WireMessage::TextMessage {
                content, has_file, ..
            } => {
                self.snapshot.received_text = Some(content.clone());
                if has_file {
                    self.publish();
                } else {
                    self.transition(SessionStatus::Transferring)?;
                    self.transition(SessionStatus::Completed)?;
                    self.snapshot.progress = 100.0;
                    self.publish();
                    self.record_history(
                        TransferRecord::new(
                            TransferDirection::Received,
                            TEXT_RECORD_NAME.to_string(),
                        )
                        .with_payload(content.len() as u64, "text/plain".to_string()),
                    );
                }
            }
        }

        Ok(())
    }

    /// Reassemble the received chunks and verify the digest.
    fn finish_receiving(&mut self) -> Result<()> {
        let pending = self
            .incoming
            .take()
            .ok_or_else(|| Error::Network("transfer-complete before file-meta".to_string()))?;

        if pending.chunks.is_empty() && pending.size > 0 {
            return Err(Error::Network(
                "transfer-complete before any chunks".to_string(),
            ));
        }

        let mut chunks = pending.chunks;
        chunks.sort_by_key(|(index, _)| *index);
        let bytes: Vec<u8> = chunks.into_iter().flat_map(|(_, data)| data).collect();

        let computed = hash::digest(&bytes);
        let verified = hash::verify(&computed, &pending.hash);
        if !verified {
            warn!(
                expected = %hash::preview(&pending.hash),
                computed = %hash::preview(&computed),
                "digest mismatch on received file"
            );
            self.snapshot.error = Some(
                Error::VerificationMismatch {
                    expected: hash::preview(&pending.hash),
                    computed: hash::preview(&computed),
                }
                .to_string(),
            );
        }

        info!(name = %pending.name, bytes = bytes.len(), verified, "file received");

        let record = TransferRecord::new(TransferDirection::Received, pending.name.clone())
            .with_payload(bytes.len() as u64, pending.file_type.clone())
            .with_hash(&computed);
        let record = if verified {
            record
        } else {
            record.with_error("digest mismatch".to_string())
        };

        // Mismatched payloads are still handed to the caller, flagged
        // unverified, so nothing silently disappears.
        self.snapshot.received_file = Some(FilePayload::new(
            pending.name,
            pending.file_type,
            bytes,
        ));
        self.snapshot.verified = Some(verified);
        self.transition(SessionStatus::Completed)?;
        self.snapshot.progress = 100.0;
        self.publish();
        self.record_history(record);
        Ok(())
    }

    async fn send_staged(&mut self) -> Result<()> {
        if self.snapshot.status != SessionStatus::Connected {
            return Err(Error::InvalidTransition {
                from: self.snapshot.status.to_string(),
                to: SessionStatus::Transferring.to_string(),
            });
        }

        // Nothing leaves until the peer has confirmed liveness.
        if !self.snapshot.peer_ready {
            return Err(Error::Network("peer has not confirmed ready".to_string()));
        }

        let Some(channel) = self.channel.take() else {
            return Err(Error::ChannelClosed);
        };

        let result = self.send_staged_on(&channel).await;
        self.channel = Some(channel);
        result
    }

    async fn send_staged_on(&mut self, channel: &Channel) -> Result<()> {
        let files = std::mem::take(&mut self.staged_files);
        let text = self.staged_text.take();

        if files.is_empty() && text.is_none() {
            return Ok(());
        }

        self.transition(SessionStatus::Transferring)?;
        self.snapshot.progress = 0.0;
        self.publish();

        if let Some(content) = &text {
            channel
                .send(WireMessage::TextMessage {
                    content: content.clone(),
                    timestamp: chrono::Utc::now().timestamp_millis(),
                    has_file: !files.is_empty(),
                })
                .await?;
        }

        if files.is_empty() {
            // Text-only send completes immediately.
            self.transition(SessionStatus::Completed)?;
            self.snapshot.progress = 100.0;
            self.publish();
            if let Some(content) = text {
                self.record_history(
                    TransferRecord::new(TransferDirection::Sent, TEXT_RECORD_NAME.to_string())
                        .with_payload(content.len() as u64, "text/plain".to_string()),
                );
            }
            return Ok(());
        }

        let mut files = files;
        let payload = if files.len() == 1 {
            files.remove(0)
        } else {
            crate::file::bundle_archive(&files)?
        };

        let digest = hash::digest(&payload.bytes);
        let total = payload.size();
        info!(name = %payload.name, bytes = total, "sending file");

        channel
            .send(WireMessage::FileMeta {
                name: payload.name.clone(),
                size: total,
                file_type: payload.content_type.clone(),
                hash: digest.clone(),
                has_text: text.is_some(),
            })
            .await?;

        let mut sent: u64 = 0;
        for (index, slice) in payload.bytes.chunks(self.options.chunk_size).enumerate() {
            channel
                .send(protocol::encode_chunk(index as u64, slice))
                .await?;
            sent += slice.len() as u64;

            let progress = (sent as f64 / total as f64 * 100.0).min(99.0);
            if progress > self.snapshot.progress {
                self.snapshot.progress = progress;
                self.publish();
            }

            // Let other work interleave on long sends.
            if (index + 1) % YIELD_EVERY == 0 {
                tokio::task::yield_now().await;
            }
        }

        channel.send(WireMessage::TransferComplete).await?;
        self.transition(SessionStatus::Completed)?;
        self.snapshot.progress = 100.0;
        self.publish();

        self.record_history(
            TransferRecord::new(TransferDirection::Sent, payload.name)
                .with_payload(total, payload.content_type)
                .with_hash(&digest),
        );
        Ok(())
    }

    async fn handle_tick(&mut self) {
        let now = Instant::now();

        // Rotate an expired share code while still unclaimed.
        if self.snapshot.status == SessionStatus::Listening {
            if let Some(deadline) = self.code_deadline {
                if now >= deadline {
                    self.listener = None;
                    if let Err(e) = self.rotate_code().await {
                        self.fail(e);
                    }
                }
            }
        }

        // A receiving transfer that stops making progress is dead.
        if self.snapshot.status == SessionStatus::Transferring
            && self.incoming.is_some()
            && now.duration_since(self.last_activity) >= self.options.stall_timeout
        {
            self.fail(Error::Network("transfer stalled".to_string()));
        }
    }

    async fn rotate_code(&mut self) -> Result<()> {
        for _ in 0..2 {
            let code = WarpCode::generate();
            if let Ok(listener) = self.transport.listen(&code.channel_id()).await {
                info!(code = %code, "share code expired, rotated");
                self.listener = Some(listener);
                self.snapshot.code = Some(code.to_string());
                self.code = Some(code);
                self.code_deadline = Some(Instant::now() + self.options.code_expiry);
                self.publish();
                return Ok(());
            }
        }
        Err(Error::InitializationFailed)
    }

    /// Clear transfer state while keeping the claimed share code.
    ///
    /// A session that was listening goes back to `Listening` with its
    /// original code and expiry so the peer can reconnect; one that
    /// never claimed a code lands in `Idle`.
    async fn reset(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
        self.staged_files.clear();
        self.staged_text = None;
        self.incoming = None;

        let code = self.snapshot.code.take();
        self.snapshot = SessionSnapshot::default();
        if self.listener.is_some() {
            self.snapshot.status = SessionStatus::Listening;
            self.snapshot.code = code;
        } else {
            self.code = None;
            self.code_deadline = None;
        }
        self.publish();
        debug!("session reset");
    }

    /// Tear everything down, releasing the share code and listener.
    async fn full_reset(&mut self) {
        if let Some(channel) = self.channel.take() {
            channel.close().await;
        }
        self.listener = None;
        self.code = None;
        self.code_deadline = None;
        self.staged_files.clear();
        self.staged_text = None;
        self.incoming = None;

        self.snapshot = SessionSnapshot::default();
        self.publish();
        debug!("session fully reset");
    }

    fn fail(&mut self, error: Error) {
        warn!(error = %error, "session failed");
        let in_flight = self.snapshot.status == SessionStatus::Transferring;
        let (direction, name) = self.incoming.take().map_or_else(
            || (TransferDirection::Sent, "unknown".to_string()),
            |p| (TransferDirection::Received, p.name),
        );

        self.snapshot.status = SessionStatus::Failed;
        self.snapshot.error = Some(error.to_string());
        self.publish();

        if in_flight {
            self.record_history(
                TransferRecord::new(direction, name).with_error(error.to_string()),
            );
        }
    }

    fn transition(&mut self, next: SessionStatus) -> Result<()> {
        let current = self.snapshot.status;
        if !current.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: current.to_string(),
                to: next.to_string(),
            });
        }
        if current != next {
            debug!(from = %current, to = %next, "session transition");
            self.snapshot.status = next;
        }
        Ok(())
    }

    fn publish(&self) {
        let _ = self.snapshot_tx.send(self.snapshot.clone());
    }

    fn record_history(&mut self, record: TransferRecord) {
        if let Some(history) = &mut self.history {
            if let Err(e) = history.add(record) {
                warn!(error = %e, "failed to record transfer history");
            }
        }
    }
}

async fn next_channel_event(channel: &mut Option<Channel>) -> ChannelEvent {
    match channel {
        Some(channel) => channel.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_incoming(listener: &mut Option<Listener>) -> Result<Channel> {
    match listener {
        Some(listener) => listener.accept().await,
        None => std::future::pending().await,
    }
}
