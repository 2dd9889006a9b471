use async_trait::async_trait;
use wavstream_core::{OutboundFrame, TransportError};

/// Outbound half of a connection.
#[async_trait]
pub trait FrameSender: Send {
    async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError>;
    /// Close the connection. Called at most once by [`TransportSession`].
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Inbound half of a connection.
#[async_trait]
pub trait FrameReceiver: Send {
    /// Next text frame, or `Ok(None)` once the peer has closed the connection.
    async fn recv_text(&mut self) -> Result<Option<String>, TransportError>;
}

/// Opens one connection to the recognition service.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Human-readable peer address, used in logs and errors.
    fn peer(&self) -> &str;
    async fn connect(&self) -> Result<TransportSession, TransportError>;
}

/// A single live connection, scoped to one exchange.
///
/// The inbound half is handed to the receiver task with
/// [`take_receiver`](Self::take_receiver); the session keeps the outbound
/// half and owns closing the connection.
pub struct TransportSession {
    peer: String,
    sender: Box<dyn FrameSender>,
    receiver: Option<Box<dyn FrameReceiver>>,
    frames_sent: usize,
    closed: bool,
}

impl TransportSession {
    pub fn new(
        peer: impl Into<String>,
        sender: Box<dyn FrameSender>,
        receiver: Box<dyn FrameReceiver>,
    ) -> Self {
        Self {
            peer: peer.into(),
            sender,
            receiver: Some(receiver),
            frames_sent: 0,
            closed: false,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn take_receiver(&mut self) -> Option<Box<dyn FrameReceiver>> {
        self.receiver.take()
    }

    /// Frames successfully handed to the connection so far.
    pub fn frames_sent(&self) -> usize {
        self.frames_sent
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        self.send(OutboundFrame::Text(text.to_string())).await
    }

    pub async fn send_binary(&mut self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.send(OutboundFrame::Binary(bytes)).await
    }

    /// Hand one frame to the connection. Frames reach the peer in call order.
    pub async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sender.send(frame).await?;
        self.frames_sent += 1;
        Ok(())
    }

    /// Close the connection. Later calls are no-ops.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.sender.close().await {
            // The peer may already be gone; the connection is released either way.
            tracing::debug!(peer = %self.peer, "close handshake failed: {e}");
        }
        tracing::debug!(peer = %self.peer, frames = self.frames_sent, "connection closed");
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        if !self.closed {
            tracing::debug!(
                peer = %self.peer,
                "session dropped without close, connection released"
            );
        }
    }
}
