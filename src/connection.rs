//! Client Connections
//!
//! The manager never owns a transport. It holds a shared handle implementing
//! [`Connection`]: a stable key plus a fire-and-forget `send`.
//!
//! [`ChannelConnection`] is the stock implementation: frames are pushed onto an
//! unbounded tokio channel, and the transport task drains the receiver into the
//! socket.

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Stable identity of a connection
pub type ConnectionKey = String;

/// Shared connection handle as stored in subscription records
pub type SharedConnection = Arc<dyn Connection>;

/// A full-duplex client channel as seen by the manager
pub trait Connection: Send + Sync {
    /// Identity used to key per-connection storage
    fn key(&self) -> &str;

    /// Send one encoded frame. Delivery failures are the transport's concern.
    fn send(&self, text: String);
}

/// Connection backed by an unbounded mpsc channel
pub struct ChannelConnection {
    key: ConnectionKey,
    sender: mpsc::UnboundedSender<String>,
}

impl ChannelConnection {
    /// Wrap a sender under a freshly generated key
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self::with_key(Uuid::new_v4().to_string(), sender)
    }

    /// Wrap a sender under a caller-chosen key
    pub fn with_key(key: impl Into<ConnectionKey>, sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            key: key.into(),
            sender,
        }
    }

    /// Create a connection and the receiver its frames arrive on
    pub fn channel(key: impl Into<ConnectionKey>) -> (SharedConnection, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self::with_key(key, tx)), rx)
    }
}

impl Connection for ChannelConnection {
    fn key(&self) -> &str {
        &self.key
    }

    fn send(&self, text: String) {
        if self.sender.send(text).is_err() {
            tracing::debug!(connection = %self.key, "Receiver dropped, frame discarded");
        }
    }
}

impl fmt::Debug for ChannelConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConnection")
            .field("key", &self.key)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}
