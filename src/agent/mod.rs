pub mod connection;
pub mod messages;
pub mod transport;
pub mod websocket;

pub use connection::{
    ConnectionManager, ConnectionState, LinkLoss, OpenOutcome, RetryPolicy, RetryState,
    SendOutcome,
};
pub use messages::{ClientMessage, ServerMessage, SetupConfig, NOTIFY_RESULT};
pub use transport::{AgentLink, AgentTransport, LinkEvent, LinkPeer};
pub use websocket::WsTransport;
