//! Transport abstraction under the transfer session.
//!
//! A transport hands out [`Channel`]s: opaque, ordered, reliable
//! message pipes between exactly two peers. Messages cross a channel
//! as JSON-encoded frames, so every transport sees the same byte
//! layout a networked one would. The session layer neither knows nor
//! cares what carries the bytes; everything it needs is expressed
//! here.
//!
//! One side calls [`Transport::listen`] to claim a channel identifier
//! and wait for a peer; the other calls [`Transport::connect`] with
//! the same identifier. The in-process [`memory::MemoryHub`] is the
//! reference implementation and the backbone of the test suite.

use std::future::Future;

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::{self, WireMessage};

pub mod memory;

/// Capacity of the per-channel frame queue.
const CHANNEL_CAPACITY: usize = 256;

/// What actually crosses a channel: JSON-encoded message frames and
/// an explicit close marker.
#[derive(Debug)]
enum Frame {
    Data(Vec<u8>),
    Closed,
}

/// An event observed on a channel.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A decoded wire message from the peer.
    Message(WireMessage),
    /// The peer closed the channel.
    Closed,
    /// The underlying transport reported a failure.
    Error(String),
}

/// One end of an ordered, reliable message pipe between two peers.
///
/// Messages sent on one end arrive on the other in order. Dropping a
/// `Channel` without calling [`Channel::close`] leaves the peer to
/// discover the loss through transport errors; well-behaved code
/// closes explicitly.
#[derive(Debug)]
pub struct Channel {
    peer_tx: mpsc::Sender<Frame>,
    rx: mpsc::Receiver<Frame>,
}

impl Channel {
    /// Create a connected pair of channel ends.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (b_tx, b_rx) = mpsc::channel(CHANNEL_CAPACITY);
        (
            Self {
                peer_tx: b_tx,
                rx: a_rx,
            },
            Self {
                peer_tx: a_tx,
                rx: b_rx,
            },
        )
    }

    /// Encode `message` as a JSON frame and send it to the peer.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the peer end is gone, or
    /// `Error::Serialization` if the message cannot be encoded.
    pub async fn send(&self, message: WireMessage) -> Result<()> {
        let frame = protocol::encode_message(&message)?;
        self.peer_tx
            .send(Frame::Data(frame))
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Receive and decode the next event from the peer.
    ///
    /// Returns [`ChannelEvent::Closed`] once the peer end is gone and
    /// all queued frames have been drained, and
    /// [`ChannelEvent::Error`] for a frame that does not decode as a
    /// wire message.
    pub async fn recv(&mut self) -> ChannelEvent {
        match self.rx.recv().await {
            Some(Frame::Data(frame)) => match protocol::decode_message(&frame) {
                Ok(message) => ChannelEvent::Message(message),
                Err(error) => ChannelEvent::Error(error.to_string()),
            },
            Some(Frame::Closed) | None => ChannelEvent::Closed,
        }
    }

    /// Close the channel, notifying the peer.
    pub async fn close(self) {
        let _ = self.peer_tx.send(Frame::Closed).await;
    }
}

/// An accepted listening post for one channel identifier.
///
/// The identifier stays claimed for as long as the listener is alive;
/// dropping it releases the identifier back to the transport.
#[derive(Debug)]
pub struct Listener {
    incoming: mpsc::Receiver<Channel>,
}

impl Listener {
    pub(crate) fn new(incoming: mpsc::Receiver<Channel>) -> Self {
        Self { incoming }
    }

    /// Wait for the next peer to connect.
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the transport stopped
    /// serving this identifier.
    pub async fn accept(&mut self) -> Result<Channel> {
        self.incoming.recv().await.ok_or(Error::ChannelClosed)
    }
}

/// A rendezvous transport.
///
/// Implementations match a listener and a connector by channel
/// identifier and hand each a [`Channel`] end.
pub trait Transport: Clone + Send + Sync + 'static {
    /// Claim `id` and start accepting connections on it.
    ///
    /// Fails with `Error::IdentifierInUse` if another live listener
    /// already holds the identifier.
    fn listen(&self, id: &str) -> impl Future<Output = Result<Listener>> + Send;

    /// Connect to the peer listening on `id`.
    ///
    /// Fails with `Error::PeerUnreachable` if nobody is listening.
    fn connect(&self, id: &str) -> impl Future<Output = Result<Channel>> + Send;
}
