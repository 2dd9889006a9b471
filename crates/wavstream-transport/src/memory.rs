use crate::session::{Connector, FrameReceiver, FrameSender, TransportSession};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use wavstream_core::{OutboundFrame, TransportError, END_OF_INPUT};

/// In-process connector. Every successful [`connect`](Connector::connect)
/// hands the service side of the connection to the accept channel as a
/// [`MemoryPeer`], the way a listener would.
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    refuse: bool,
    fail_send_at: Option<usize>,
    connects: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let connector = Self {
            accept_tx,
            refuse: false,
            fail_send_at: None,
            connects: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        };
        (connector, accept_rx)
    }

    /// Make every connection attempt fail.
    pub fn refuse_connections(mut self) -> Self {
        self.refuse = true;
        self
    }

    /// Fail the outbound frame with this zero-based index.
    pub fn fail_send_at(mut self, frame: usize) -> Self {
        self.fail_send_at = Some(frame);
        self
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn peer(&self) -> &str {
        "memory"
    }

    async fn connect(&self) -> Result<TransportSession, TransportError> {
        if self.refuse {
            return Err(TransportError::Connect {
                peer: self.peer().to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let (text_tx, text_rx) = mpsc::unbounded_channel();

        let peer = MemoryPeer {
            inbound: frame_rx,
            outbound: Some(text_tx),
        };
        self.accept_tx
            .send(peer)
            .map_err(|_| TransportError::Connect {
                peer: self.peer().to_string(),
                reason: "no service listening".to_string(),
            })?;
        self.connects.fetch_add(1, Ordering::SeqCst);

        Ok(TransportSession::new(
            self.peer(),
            Box::new(MemorySender {
                tx: Some(frame_tx),
                next_index: 0,
                fail_at: self.fail_send_at,
                closes: Arc::clone(&self.closes),
            }),
            Box::new(MemoryReceiver { rx: text_rx }),
        ))
    }
}

struct MemorySender {
    tx: Option<mpsc::UnboundedSender<OutboundFrame>>,
    next_index: usize,
    fail_at: Option<usize>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameSender for MemorySender {
    async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        let index = self.next_index;
        self.next_index += 1;
        if self.fail_at == Some(index) {
            return Err(TransportError::Send(format!("injected failure at frame {index}")));
        }
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame)
            .map_err(|_| TransportError::Send("peer went away".to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MemoryReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl FrameReceiver for MemoryReceiver {
    async fn recv_text(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

/// Service side of an in-memory connection.
pub struct MemoryPeer {
    inbound: mpsc::UnboundedReceiver<OutboundFrame>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

impl MemoryPeer {
    /// Next frame from the client, `None` once the client closed.
    pub async fn recv(&mut self) -> Option<OutboundFrame> {
        self.inbound.recv().await
    }

    /// Read frames up to and including the client's end-of-input marker.
    /// Stops early if the client closes first.
    pub async fn recv_until_end(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.recv().await {
            let is_end = matches!(&frame, OutboundFrame::Text(t) if t == END_OF_INPUT);
            frames.push(frame);
            if is_end {
                break;
            }
        }
        frames
    }

    /// Returns `false` if the client is no longer listening.
    pub fn send_text(&self, text: &str) -> bool {
        match &self.outbound {
            Some(tx) => tx.send(text.to_string()).is_ok(),
            None => false,
        }
    }

    /// Drop the service side of the connection without a sentinel.
    pub fn disconnect(&mut self) {
        self.outbound = None;
    }
}
