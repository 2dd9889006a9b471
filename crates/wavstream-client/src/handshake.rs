use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use wavstream_audio::{Chunker, Pacer};
use wavstream_core::{ExchangeError, OutboundFrame, SampleBuffer, END_OF_INPUT};
use wavstream_transport::TransportSession;

/// Sender-side progress, readable while the sequence is running.
#[derive(Debug, Default)]
pub struct SendProgress {
    chunks_sent: AtomicUsize,
    end_of_input: AtomicBool,
}

impl SendProgress {
    pub fn chunks_sent(&self) -> usize {
        self.chunks_sent.load(Ordering::SeqCst)
    }

    /// `true` once the end-of-input marker has been handed to the connection.
    pub fn end_of_input_started(&self) -> bool {
        self.end_of_input.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendSummary {
    pub chunks: usize,
    pub bytes: usize,
}

/// Outbound half of the protocol: optional tag, paced audio chunks, end marker.
pub struct SendSequence<'a> {
    lang_tag: Option<&'a str>,
    chunker: Chunker,
    pacer: Pacer,
    send_timeout: Option<Duration>,
}

impl<'a> SendSequence<'a> {
    pub fn new(lang_tag: Option<&'a str>, chunker: Chunker, pacer: Pacer) -> Self {
        Self {
            lang_tag,
            chunker,
            pacer,
            send_timeout: None,
        }
    }

    /// Fail with [`ExchangeError::Timeout`] when a single frame takes longer
    /// than `limit` to be accepted by the connection.
    pub fn with_send_timeout(mut self, limit: Duration) -> Self {
        self.send_timeout = Some(limit);
        self
    }

    /// Send every frame in order. The first failing frame aborts the rest,
    /// including any pending delay.
    pub async fn run(
        &self,
        session: &mut TransportSession,
        buffer: &SampleBuffer,
        progress: &SendProgress,
    ) -> Result<SendSummary, ExchangeError> {
        if let Some(tag) = self.lang_tag {
            tracing::debug!(tag, "sending language tag");
            self.send_frame(session, OutboundFrame::Text(tag.to_string())).await?;
        }

        let mut summary = SendSummary { chunks: 0, bytes: 0 };
        for chunk in self.chunker.chunks(buffer) {
            let bytes = chunk.payload.len();
            self.send_frame(session, OutboundFrame::Binary(chunk.payload)).await?;
            summary.chunks += 1;
            summary.bytes += bytes;
            progress.chunks_sent.fetch_add(1, Ordering::SeqCst);
            tracing::trace!(
                chunk = chunk.index,
                start = chunk.start,
                end = chunk.end,
                bytes,
                "chunk sent"
            );

            self.pacer.pause().await;
        }

        progress.end_of_input.store(true, Ordering::SeqCst);
        self.send_frame(session, OutboundFrame::Text(END_OF_INPUT.to_string())).await?;

        tracing::debug!(chunks = summary.chunks, bytes = summary.bytes, "end of input sent");
        Ok(summary)
    }

    async fn send_frame(
        &self,
        session: &mut TransportSession,
        frame: OutboundFrame,
    ) -> Result<(), ExchangeError> {
        let index = session.frames_sent();
        let sent = match self.send_timeout {
            Some(limit) => match tokio::time::timeout(limit, session.send(frame)).await {
                Ok(sent) => sent,
                Err(_) => {
                    tracing::warn!(frame = index, "connection stopped accepting frames");
                    return Err(ExchangeError::Timeout(limit));
                }
            },
            None => session.send(frame).await,
        };
        sent.map_err(|source| ExchangeError::Send {
            frame: index,
            source,
        })
    }
}
