use anyhow::Result;
use tokio::sync::mpsc;

use super::messages::{ClientMessage, ServerMessage, SetupConfig};

/// Capacity of the per-link channels
pub const LINK_BUFFER: usize = 256;

/// Something that happened on an established link
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Message(ServerMessage),
    /// Transport-level error; a `Closed` event follows
    Error(String),
    /// The remote end or the network closed the link
    Closed(Option<String>),
}

/// A negotiated duplex session with the agent.
///
/// Dropping `outbound` closes the underlying connection.
pub struct AgentLink {
    pub outbound: mpsc::Sender<ClientMessage>,
    pub inbound: mpsc::Receiver<LinkEvent>,
}

impl AgentLink {
    /// Link backed by plain channels; returns the far ends for the peer
    pub fn pair() -> (Self, LinkPeer) {
        let (out_tx, out_rx) = mpsc::channel(LINK_BUFFER);
        let (in_tx, in_rx) = mpsc::channel(LINK_BUFFER);
        (
            Self {
                outbound: out_tx,
                inbound: in_rx,
            },
            LinkPeer {
                outgoing: out_rx,
                events: in_tx,
            },
        )
    }
}

/// Far end of an [`AgentLink`]: receives what the session sends, injects what the agent says
pub struct LinkPeer {
    pub outgoing: mpsc::Receiver<ClientMessage>,
    pub events: mpsc::Sender<LinkEvent>,
}

/// Remote agent transport
#[async_trait::async_trait]
pub trait AgentTransport: Send + Sync {
    /// Open and negotiate a session. Resolves once the agent has accepted the setup.
    async fn connect(&self, setup: &SetupConfig) -> Result<AgentLink>;

    /// Get transport name for logging
    fn name(&self) -> &str;
}
