pub mod memory;
pub mod session;
pub mod tls;
pub mod ws;

pub use memory::{MemoryConnector, MemoryPeer};
pub use session::{Connector, FrameReceiver, FrameSender, TransportSession};
pub use tls::build_tls_connector;
pub use ws::WsConnector;
