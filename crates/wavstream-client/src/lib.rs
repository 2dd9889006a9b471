pub mod client;
pub mod handshake;
pub mod postprocess;
pub mod receiver;

pub use client::{ExchangeSettings, StreamClient};
pub use handshake::{SendProgress, SendSequence, SendSummary};
pub use postprocess::PostProcessor;
pub use receiver::{ReceiverLoop, ReceiverState};
