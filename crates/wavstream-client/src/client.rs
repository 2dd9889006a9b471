use crate::handshake::{SendProgress, SendSequence};
use crate::postprocess::PostProcessor;
use crate::receiver::ReceiverLoop;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use wavstream_audio::{Chunker, Pacer};
use wavstream_core::{
    ClientConfig, ConfigError, ExchangeError, NormalizedResult, SampleBuffer, TransportError,
};
use wavstream_destination::ResultSink;
use wavstream_transport::{Connector, TransportSession};

/// Per-exchange protocol settings.
#[derive(Debug, Clone)]
pub struct ExchangeSettings {
    pub lang_tag: Option<String>,
    pub chunker: Chunker,
    pub pacer: Pacer,
    /// Upper bound on the wait for the terminal sentinel once all audio is
    /// sent, and on any single outbound frame.
    pub final_result_timeout: Duration,
}

impl ExchangeSettings {
    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            lang_tag: config.server.lang_tag.clone(),
            chunker: Chunker::new(config.stream.samples_per_message)?,
            pacer: Pacer::new(config.stream.message_delay()),
            final_result_timeout: config.stream.final_result_timeout(),
        })
    }
}

/// Receiver task that is aborted when the exchange lets go of it.
struct ReceiverTask(JoinHandle<Result<String, ExchangeError>>);

impl ReceiverTask {
    fn spawn(receiver: ReceiverLoop) -> Self {
        Self(tokio::spawn(receiver.run()))
    }

    async fn join(&mut self) -> Result<String, ExchangeError> {
        match (&mut self.0).await {
            Ok(result) => result,
            Err(e) => Err(ExchangeError::ConnectionLost(format!(
                "receiver task ended abnormally: {e}"
            ))),
        }
    }
}

impl Drop for ReceiverTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs one streaming exchange per call and records its result.
pub struct StreamClient<C> {
    connector: C,
    settings: ExchangeSettings,
    post: PostProcessor,
}

impl<C: Connector> StreamClient<C> {
    pub fn new(connector: C, settings: ExchangeSettings, post: PostProcessor) -> Self {
        Self {
            connector,
            settings,
            post,
        }
    }

    pub fn from_config(connector: C, config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            connector,
            ExchangeSettings::from_config(config)?,
            PostProcessor::from_config(&config.postprocess),
        ))
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Stream `buffer`, post-process the final result and append it to `sink`.
    ///
    /// Nothing is written to the sink unless every stage succeeded.
    pub async fn run(
        &self,
        id: &str,
        buffer: &SampleBuffer,
        sink: &dyn ResultSink,
    ) -> Result<NormalizedResult, ExchangeError> {
        self.run_until(id, buffer, sink, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but gives up with [`ExchangeError::Cancelled`]
    /// as soon as `cancel` completes. The connection is still closed.
    pub async fn run_until<F>(
        &self,
        id: &str,
        buffer: &SampleBuffer,
        sink: &dyn ResultSink,
        cancel: F,
    ) -> Result<NormalizedResult, ExchangeError>
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        let message = self.exchange_until(buffer, cancel).await?;
        let text = self.post.process(&message)?;
        let result = NormalizedResult {
            id: id.to_string(),
            text,
        };
        sink.write_result(&result).await?;

        tracing::info!(
            id,
            sink = sink.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "final result: {}",
            result.text
        );
        Ok(result)
    }

    /// Run the handshake and return the raw final result message.
    pub async fn exchange(&self, buffer: &SampleBuffer) -> Result<String, ExchangeError> {
        self.exchange_until(buffer, std::future::pending()).await
    }

    /// Run the handshake until it finishes or `cancel` completes.
    ///
    /// Once connected, the connection is closed exactly once, whatever the outcome.
    pub async fn exchange_until<F>(
        &self,
        buffer: &SampleBuffer,
        cancel: F,
    ) -> Result<String, ExchangeError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        let mut session = tokio::select! {
            connected = self.connector.connect() => {
                connected.map_err(ExchangeError::Connection)?
            }
            _ = &mut cancel => return Err(ExchangeError::Cancelled),
        };

        tracing::info!(
            peer = %session.peer(),
            samples = buffer.len(),
            chunks = self.settings.chunker.chunk_count(buffer.len()),
            "streaming {:.2}s of audio",
            buffer.duration_secs()
        );

        let outcome = tokio::select! {
            outcome = self.drive(&mut session, buffer) => outcome,
            _ = &mut cancel => Err(ExchangeError::Cancelled),
        };
        session.close().await;
        match &outcome {
            Err(ExchangeError::Cancelled) => {
                tracing::warn!(peer = %session.peer(), "exchange cancelled")
            }
            Err(e) => tracing::error!(peer = %session.peer(), "exchange failed: {e}"),
            Ok(_) => {}
        }
        outcome
    }

    async fn drive(
        &self,
        session: &mut TransportSession,
        buffer: &SampleBuffer,
    ) -> Result<String, ExchangeError> {
        let inbound = session
            .take_receiver()
            .ok_or(ExchangeError::Connection(TransportError::Closed))?;
        let mut receiver = ReceiverTask::spawn(ReceiverLoop::new(inbound));

        let timeout = self.settings.final_result_timeout;
        let sequence = SendSequence::new(
            self.settings.lang_tag.as_deref(),
            self.settings.chunker,
            self.settings.pacer,
        )
        .with_send_timeout(timeout);
        let progress = SendProgress::default();

        let early = {
            let sending = sequence.run(session, buffer, &progress);
            tokio::pin!(sending);
            tokio::select! {
                sent = &mut sending => {
                    sent?;
                    None
                }
                finished = receiver.join() => {
                    if !progress.end_of_input_started() {
                        return Err(match finished {
                            Ok(_) => ExchangeError::ProtocolViolation(format!(
                                "terminal sentinel received after {} chunk(s), \
                                 before end of input",
                                progress.chunks_sent()
                            )),
                            Err(e) => e,
                        });
                    }
                    // The sentinel raced the flush of our own end marker.
                    sending.await?;
                    Some(finished)
                }
            }
        };
        if let Some(finished) = early {
            return finished;
        }

        match tokio::time::timeout(timeout, receiver.join()).await {
            Ok(finished) => finished,
            Err(_) => Err(ExchangeError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use wavstream_core::{AudioFormat, OutboundFrame};
    use wavstream_destination::FileSink;
    use wavstream_transport::{FrameReceiver, FrameSender, MemoryConnector, MemoryPeer};

    fn settings(samples_per_message: usize, lang_tag: Option<&str>) -> ExchangeSettings {
        ExchangeSettings {
            lang_tag: lang_tag.map(str::to_string),
            chunker: Chunker::new(samples_per_message).unwrap(),
            pacer: Pacer::new(Duration::ZERO),
            final_result_timeout: Duration::from_secs(2),
        }
    }

    fn buffer_of(len: usize) -> SampleBuffer {
        SampleBuffer::new(vec![0.1; len], AudioFormat::required()).unwrap()
    }

    /// Replies with `replies` after the client's end marker, then waits for close.
    fn serve(
        mut accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
        replies: Vec<&'static str>,
    ) -> JoinHandle<Vec<OutboundFrame>> {
        tokio::spawn(async move {
            let mut peer = accept_rx.recv().await.unwrap();
            let frames = peer.recv_until_end().await;
            for reply in replies {
                peer.send_text(reply);
            }
            while peer.recv().await.is_some() {}
            frames
        })
    }

    #[tokio::test]
    async fn test_exchange_returns_last_candidate() {
        let (connector, accept_rx) = MemoryConnector::new();
        let service = serve(accept_rx, vec![r#"{"text":"a"}"#, r#"{"text":"ab"}"#, "Done!"]);
        let client = StreamClient::new(connector, settings(4, None), PostProcessor::default());

        let message = client.exchange(&buffer_of(10)).await.unwrap();
        assert_eq!(message, r#"{"text":"ab"}"#);

        let frames = service.await.unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(client.connector().close_count(), 1);
    }

    #[tokio::test]
    async fn test_exchange_connection_refused() {
        let (connector, _accept_rx) = MemoryConnector::new();
        let client = StreamClient::new(
            connector.refuse_connections(),
            settings(4, None),
            PostProcessor::default(),
        );
        assert!(matches!(
            client.exchange(&buffer_of(10)).await,
            Err(ExchangeError::Connection(TransportError::Connect { .. }))
        ));
    }

    #[tokio::test]
    async fn test_exchange_times_out_without_sentinel() {
        let (connector, accept_rx) = MemoryConnector::new();
        let service = serve(accept_rx, vec![r#"{"text":"a"}"#]);
        let mut settings = settings(4, None);
        settings.final_result_timeout = Duration::from_millis(100);
        let client = StreamClient::new(connector, settings, PostProcessor::default());

        match client.exchange(&buffer_of(10)).await {
            Err(ExchangeError::Timeout(d)) => assert_eq!(d, Duration::from_millis(100)),
            other => panic!("expected Timeout, got {other:?}"),
        }
        // The service sees the connection close.
        tokio::time::timeout(Duration::from_secs(2), service)
            .await
            .expect("service did not observe close")
            .unwrap();
        assert_eq!(client.connector().close_count(), 1);
    }

    #[tokio::test]
    async fn test_exchange_early_sentinel_is_protocol_violation() {
        let (connector, mut accept_rx) = MemoryConnector::new();
        let service = tokio::spawn(async move {
            let mut peer = accept_rx.recv().await.unwrap();
            peer.send_text(r#"{"text":"too soon"}"#);
            peer.send_text("Done!");
            peer.recv_until_end().await
        });
        let mut settings = settings(1, None);
        settings.pacer = Pacer::new(Duration::from_millis(20));
        let client = StreamClient::new(connector, settings, PostProcessor::default());

        match client.exchange(&buffer_of(50)).await {
            Err(ExchangeError::ProtocolViolation(msg)) => {
                assert!(msg.contains("before end of input"))
            }
            other => panic!("expected ProtocolViolation, got {other:?}"),
        }
        let frames = service.await.unwrap();
        assert!(frames.len() < 50);
        assert!(!frames.contains(&OutboundFrame::Text("Done".to_string())));
    }

    /// Connects, accepts the first frame and then never completes a send.
    struct StalledConnector {
        closes: Arc<AtomicUsize>,
    }

    struct StalledSender {
        accepted: usize,
        closes: Arc<AtomicUsize>,
    }

    struct NoReplies;

    #[async_trait]
    impl FrameSender for StalledSender {
        async fn send(&mut self, _frame: OutboundFrame) -> Result<(), TransportError> {
            if self.accepted == 0 {
                self.accepted += 1;
                return Ok(());
            }
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl FrameReceiver for NoReplies {
        async fn recv_text(&mut self) -> Result<Option<String>, TransportError> {
            std::future::pending().await
        }
    }

    #[async_trait]
    impl Connector for StalledConnector {
        fn peer(&self) -> &str {
            "stalled"
        }

        async fn connect(&self) -> Result<TransportSession, TransportError> {
            Ok(TransportSession::new(
                self.peer(),
                Box::new(StalledSender {
                    accepted: 0,
                    closes: Arc::clone(&self.closes),
                }),
                Box::new(NoReplies),
            ))
        }
    }

    #[tokio::test]
    async fn test_exchange_stalled_send_times_out() {
        let closes = Arc::new(AtomicUsize::new(0));
        let connector = StalledConnector {
            closes: Arc::clone(&closes),
        };
        let mut settings = settings(4, None);
        settings.final_result_timeout = Duration::from_millis(100);
        let client = StreamClient::new(connector, settings, PostProcessor::default());

        let outcome = tokio::time::timeout(Duration::from_secs(2), client.exchange(&buffer_of(12)))
            .await
            .expect("exchange hung on a stalled connection");
        assert!(matches!(outcome, Err(ExchangeError::Timeout(_))));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exchange_cancelled_closes_connection_once() {
        let (connector, mut accept_rx) = MemoryConnector::new();
        let service = tokio::spawn(async move {
            let mut peer = accept_rx.recv().await.unwrap();
            peer.recv_until_end().await
        });
        let mut settings = settings(1, Some("en"));
        settings.pacer = Pacer::new(Duration::from_millis(50));
        let client = StreamClient::new(connector, settings, PostProcessor::default());

        let cancel = tokio::time::sleep(Duration::from_millis(120));
        match client.exchange_until(&buffer_of(50), cancel).await {
            Err(ExchangeError::Cancelled) => {}
            other => panic!("expected Cancelled, got {other:?}"),
        }
        assert_eq!(client.connector().close_count(), 1);

        let frames = tokio::time::timeout(Duration::from_secs(2), service)
            .await
            .expect("service did not observe close")
            .unwrap();
        assert!(frames.len() > 1 && frames.len() < 51);
        assert!(!frames.contains(&OutboundFrame::Text("Done".to_string())));
    }

    #[tokio::test]
    async fn test_run_cancelled_writes_nothing() {
        let dir = std::env::temp_dir().join("wavstream_client_cancelled");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("result.txt");
        let _ = std::fs::remove_file(&path);

        let (connector, accept_rx) = MemoryConnector::new();
        let _service = serve(accept_rx, vec![r#"{"text":"late"}"#, "Done!"]);
        let mut settings = settings(1, None);
        settings.pacer = Pacer::new(Duration::from_millis(50));
        let client = StreamClient::new(connector, settings, PostProcessor::default());
        let sink = FileSink::new(&path);

        let cancel = tokio::time::sleep(Duration::from_millis(80));
        assert!(matches!(
            client.run_until("utt1", &buffer_of(20), &sink, cancel).await,
            Err(ExchangeError::Cancelled)
        ));
        assert!(!path.exists());
        assert_eq!(client.connector().close_count(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_run_writes_normalized_line() {
        let dir = std::env::temp_dir().join("wavstream_client_run");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("result.txt");
        let _ = std::fs::remove_file(&path);

        let (connector, accept_rx) = MemoryConnector::new();
        let _service = serve(accept_rx, vec![r#"{"text":"<sil>你好 ，世界！"}"#, "Done!"]);
        let client = StreamClient::new(
            connector,
            settings(8000, Some("zh")),
            PostProcessor::default(),
        );
        let sink = FileSink::new(&path);

        let result = client.run("utt1", &buffer_of(100), &sink).await.unwrap();
        assert_eq!(result.text, "你好世界");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "utt1 你好世界\n");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_run_malformed_result_writes_nothing() {
        let dir = std::env::temp_dir().join("wavstream_client_malformed");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("result.txt");
        let _ = std::fs::remove_file(&path);

        let (connector, accept_rx) = MemoryConnector::new();
        let _service = serve(accept_rx, vec![r#"{"segment":0}"#, "Done!"]);
        let client = StreamClient::new(connector, settings(8000, None), PostProcessor::default());
        let sink = FileSink::new(&path);

        assert!(matches!(
            client.run("utt1", &buffer_of(100), &sink).await,
            Err(ExchangeError::MalformedResult(_))
        ));
        assert!(!path.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_settings_from_config() {
        let config = ClientConfig::from_toml_str(
            r#"
[server]
lang_tag = "en"

[stream]
samples_per_message = 1600
seconds_per_message = 0.0
final_result_timeout_secs = 3.0
"#,
        )
        .unwrap();
        let settings = ExchangeSettings::from_config(&config).unwrap();
        assert_eq!(settings.lang_tag.as_deref(), Some("en"));
        assert_eq!(settings.chunker.samples_per_chunk(), 1600);
        assert_eq!(settings.pacer.delay(), Duration::ZERO);
        assert_eq!(settings.final_result_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_settings_from_invalid_config() {
        let config = ClientConfig::from_toml_str(
            r#"
[stream]
samples_per_message = 0
"#,
        )
        .unwrap();
        assert!(ExchangeSettings::from_config(&config).is_err());
    }
}
