pub mod config;
pub mod error;
pub mod types;

pub use config::ClientConfig;
pub use error::{AudioError, ConfigError, ExchangeError, SinkError, TransportError};
pub use types::{
    AudioFormat, Chunk, InboundMessage, NormalizedResult, OutboundFrame, SampleBuffer,
    END_OF_INPUT, TERMINAL_SENTINEL,
};
