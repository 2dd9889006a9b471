use crate::postprocess::PostProcessor;
use wavstream_core::{ExchangeError, InboundMessage};
use wavstream_transport::FrameReceiver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Listening,
    Done,
}

/// Consumes inbound text frames until the service's terminal sentinel,
/// keeping only the most recent result.
pub struct ReceiverLoop {
    inbound: Box<dyn FrameReceiver>,
    state: ReceiverState,
    latest: Option<String>,
    results_seen: usize,
}

impl ReceiverLoop {
    pub fn new(inbound: Box<dyn FrameReceiver>) -> Self {
        Self {
            inbound,
            state: ReceiverState::Listening,
            latest: None,
            results_seen: 0,
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn latest(&self) -> Option<&str> {
        self.latest.as_deref()
    }

    fn observe(&mut self, message: InboundMessage) -> ReceiverState {
        match message {
            InboundMessage::TerminalSentinel => {
                self.state = ReceiverState::Done;
            }
            InboundMessage::Result(text) => {
                self.results_seen += 1;
                match PostProcessor::extract_text(&text) {
                    Ok(partial) => {
                        tracing::debug!(n = self.results_seen, "partial result: {partial}")
                    }
                    Err(e) => {
                        tracing::warn!(n = self.results_seen, "unparsable partial result: {e}")
                    }
                }
                self.latest = Some(text);
            }
        }
        self.state
    }

    /// Listen until the sentinel and return the last result seen before it.
    pub async fn run(mut self) -> Result<String, ExchangeError> {
        while self.state == ReceiverState::Listening {
            match self.inbound.recv_text().await {
                Ok(Some(text)) => {
                    self.observe(InboundMessage::classify(text));
                }
                Ok(None) => {
                    return Err(ExchangeError::ConnectionLost(format!(
                        "service closed the connection after {} result(s)",
                        self.results_seen
                    )));
                }
                Err(e) => return Err(ExchangeError::ConnectionLost(e.to_string())),
            }
        }

        tracing::debug!(results = self.results_seen, "terminal sentinel received");
        self.latest.ok_or_else(|| {
            ExchangeError::ProtocolViolation(
                "terminal sentinel arrived before any result".to_string(),
            )
        })
    }
}
