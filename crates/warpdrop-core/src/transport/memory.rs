//! In-process rendezvous transport.
//!
//! A [`MemoryHub`] matches listeners and connectors living in the
//! same process. It backs the loopback demo and the integration
//! tests; every channel it produces has the same delivery semantics
//! a networked transport would provide.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::{Channel, Listener, Transport};
use crate::error::{Error, Result};

/// Capacity of the pending-connection queue per identifier.
const ACCEPT_BACKLOG: usize = 8;

/// An in-process channel rendezvous.
///
/// Cloning a hub is cheap; all clones share one registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    registry: Arc<Mutex<HashMap<String, mpsc::Sender<Channel>>>>,
}

impl MemoryHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, mpsc::Sender<Channel>>> {
        // Mutex poisoning only happens if a holder panicked; the map
        // itself stays consistent, so recover the guard.
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Transport for MemoryHub {
    async fn listen(&self, id: &str) -> Result<Listener> {
        let mut registry = self.lock();

        // A dead entry means the previous listener was dropped; its
        // identifier is free to reclaim.
        if let Some(existing) = registry.get(id) {
            if !existing.is_closed() {
                return Err(Error::IdentifierInUse(id.to_string()));
            }
        }

        let (tx, rx) = mpsc::channel(ACCEPT_BACKLOG);
        registry.insert(id.to_string(), tx);
        Ok(Listener::new(rx))
    }

    async fn connect(&self, id: &str) -> Result<Channel> {
        let accept_tx = {
            let registry = self.lock();
            registry
                .get(id)
                .filter(|tx| !tx.is_closed())
                .cloned()
                .ok_or_else(|| Error::PeerUnreachable(id.to_string()))?
        };

        let (ours, theirs) = Channel::pair();
        accept_tx
            .send(theirs)
            .await
            .map_err(|_| Error::PeerUnreachable(id.to_string()))?;
        Ok(ours)
    }
}
