//! Connection — the channel seam between transport and server.

use lis_protocol::LisMessage;
use tokio::sync::mpsc;

/// Errors surfaced by the connection seam.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,
}

/// One end of a bidirectional message channel.
///
/// The server owns one `Connection`; whatever drives the other side (stdio
/// tasks, or the paired end in tests) is the client. Dropping the client's
/// end closes the server's receiver, which the server treats as a fatal
/// transport fault.
pub struct Connection {
    sender: mpsc::UnboundedSender<LisMessage>,
    receiver: mpsc::UnboundedReceiver<LisMessage>,
}

impl Connection {
    pub fn new(
        sender: mpsc::UnboundedSender<LisMessage>,
        receiver: mpsc::UnboundedReceiver<LisMessage>,
    ) -> Self {
        Self { sender, receiver }
    }

    /// Build a connected in-memory pair: (server side, client side).
    pub fn memory() -> (Connection, Connection) {
        let (to_client, from_server) = mpsc::unbounded_channel();
        let (to_server, from_client) = mpsc::unbounded_channel();
        (
            Connection::new(to_client, from_client),
            Connection::new(to_server, from_server),
        )
    }

    /// Send a message to the peer. Fails once the peer is gone.
    pub fn send(&self, message: LisMessage) -> Result<(), ConnectionError> {
        self.sender.send(message).map_err(|_| ConnectionError::Closed)
    }

    /// Receive the next message; `None` means the peer closed the channel.
    pub async fn recv(&mut self) -> Option<LisMessage> {
        self.receiver.recv().await
    }

    /// A clonable handle for sending without the receiving half.
    pub fn sender(&self) -> mpsc::UnboundedSender<LisMessage> {
        self.sender.clone()
    }
}
