use crate::session::{Connector, FrameReceiver, FrameSender, TransportSession};
use crate::tls::build_tls_connector;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use wavstream_core::{ClientConfig, OutboundFrame, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connector for `ws://` and `wss://` endpoints.
pub struct WsConnector {
    url: String,
    tls: Option<tokio_tungstenite::Connector>,
}

impl WsConnector {
    /// `tls` is the pre-built secure channel factory; `None` connects in plain text
    /// (or with the library default for `wss://` URLs).
    pub fn new(url: impl Into<String>, tls: Option<tokio_tungstenite::Connector>) -> Self {
        Self {
            url: url.into(),
            tls,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let tls = config.tls.as_ref().map(build_tls_connector).transpose()?;
        Ok(Self::new(config.server_url(), tls))
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    fn peer(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<TransportSession, TransportError> {
        let (stream, _response) = tokio_tungstenite::connect_async_tls_with_config(
            self.url.as_str(),
            None,
            true,
            self.tls.clone(),
        )
        .await
        .map_err(|e| TransportError::Connect {
            peer: self.url.clone(),
            reason: e.to_string(),
        })?;

        tracing::info!(peer = %self.url, "connected");

        let (sink, stream) = stream.split();
        Ok(TransportSession::new(
            self.url.clone(),
            Box::new(WsSender { sink }),
            Box::new(WsReceiver {
                stream,
                peer: self.url.clone(),
            }),
        ))
    }
}

struct WsSender {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSender for WsSender {
    async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        let message = match frame {
            OutboundFrame::Text(text) => Message::Text(text),
            OutboundFrame::Binary(bytes) => Message::Binary(bytes),
        };
        self.sink
            .send(message)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

struct WsReceiver {
    stream: SplitStream<WsStream>,
    peer: String,
}

#[async_trait]
impl FrameReceiver for WsReceiver {
    async fn recv_text(&mut self) -> Result<Option<String>, TransportError> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => return Ok(Some(text)),
                Ok(Message::Close(frame)) => {
                    match frame {
                        Some(frame) => tracing::debug!(
                            peer = %self.peer,
                            "peer closed: {} {}",
                            frame.code,
                            frame.reason
                        ),
                        None => tracing::debug!(peer = %self.peer, "peer closed"),
                    }
                    return Ok(None);
                }
                Ok(Message::Binary(data)) => {
                    tracing::warn!(peer = %self.peer, bytes = data.len(), "ignoring binary frame");
                }
                Ok(_) => {}
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return Ok(None);
                }
                Err(e) => return Err(TransportError::Receive(e.to_string())),
            }
        }
        Ok(None)
    }
}
