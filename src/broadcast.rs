//! Peer registry for the broadcast socket.
//!
//! Each connected peer owns the receiving half of a bounded channel; the hub keeps
//! the sending halves. A closed channel means the peer's writer is gone, and a full
//! one means the peer stopped reading. Either way the peer is dropped from the
//! registry on the spot.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{
    mpsc::{self, error::TrySendError},
    Mutex,
};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub type PeerId = Uuid;

/// Messages a peer may have queued before it counts as stalled.
pub const OUTBOX_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct Hub {
    peers: Arc<Mutex<HashMap<PeerId, mpsc::Sender<String>>>>,
    capacity: usize,
}

impl Default for Hub {
    fn default() -> Self {
        Self::with_capacity(OUTBOX_CAPACITY)
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { peers: Arc::default(), capacity: capacity.max(1) }
    }

    /// Register a new peer; the receiver yields what other peers send.
    pub async fn join(&self) -> (PeerId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = Uuid::new_v4();
        let mut peers = self.peers.lock().await;
        peers.insert(id, tx);
        info!(target: "broadcast", peer = %id, peers = peers.len(), "Peer joined");
        (id, rx)
    }

    pub async fn leave(&self, id: PeerId) {
        let mut peers = self.peers.lock().await;
        if peers.remove(&id).is_some() {
            info!(target: "broadcast", peer = %id, peers = peers.len(), "Peer left");
        }
    }

    /// Fan `text` out to every peer except `from`. Returns how many peers got it.
    #[instrument(level = "debug", skip(self, text), fields(%from, len = text.len()))]
    pub async fn relay(&self, from: PeerId, text: &str) -> usize {
        let mut peers = self.peers.lock().await;
        let mut delivered = 0;
        peers.retain(|id, tx| {
            if *id == from {
                return true;
            }
            match tx.try_send(text.to_owned()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(target: "broadcast", peer = %id, "Dropping stalled peer (outbox full)");
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(target: "broadcast", peer = %id, "Dropping peer with closed channel");
                    false
                }
            }
        });
        delivered
    }

    pub async fn peer_count(&self) -> usize {
        self.peers.lock().await.len()
    }
}
