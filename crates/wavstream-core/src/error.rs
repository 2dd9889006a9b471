use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Input audio problems. All of these are raised before a connection is opened.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to open audio file: {0}")]
    Open(String),

    #[error("failed to read audio samples: {0}")]
    Read(String),

    #[error("unsupported {field}: expected {expected}, got {actual}")]
    UnsupportedFormat {
        field: &'static str,
        expected: u32,
        actual: u32,
    },

    #[error("unsupported sample encoding: expected 16-bit integer PCM")]
    UnsupportedEncoding,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {peer}: {reason}")]
    Connect { peer: String, reason: String },

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("failed to send frame: {0}")]
    Send(String),

    #[error("failed to receive frame: {0}")]
    Receive(String),

    #[error("connection already closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write result: {0}")]
    WriteFailed(String),
}

/// Terminal outcome of a failed exchange. Exactly one of these is surfaced
/// per exchange and no result line is written when one occurs.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("connection error: {0}")]
    Connection(#[source] TransportError),

    #[error("send error on outbound frame #{frame}: {source}")]
    Send {
        frame: usize,
        #[source]
        source: TransportError,
    },

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("connection lost before terminal sentinel: {0}")]
    ConnectionLost(String),

    #[error("malformed result: {0}")]
    MalformedResult(String),

    #[error("timed out after {0:?} waiting for the service")]
    Timeout(Duration),

    #[error("exchange cancelled")]
    Cancelled,

    #[error("result sink error: {0}")]
    Sink(#[from] SinkError),
}
