use anyhow::{bail, Context, Result};
use futures::stream::StreamExt;
use futures::SinkExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::messages::{ClientMessage, ServerMessage, SetupConfig};
use super::transport::{AgentLink, AgentTransport, LinkEvent, LINK_BUFFER};
use crate::config::AgentConfig;

/// WebSocket transport to the live agent service
pub struct WsTransport {
    url: String,
    api_key: String,
    connect_timeout: Duration,
}

impl WsTransport {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            connect_timeout,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            config.url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.connect_timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        if self.api_key.is_empty() {
            return self.url.clone();
        }
        let sep = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}key={}", self.url, sep, self.api_key)
    }
}

#[async_trait::async_trait]
impl AgentTransport for WsTransport {
    async fn connect(&self, setup: &SetupConfig) -> Result<AgentLink> {
        info!("Connecting to agent at {}", self.url);

        let endpoint = self.endpoint();
        let (ws, _response) = tokio::time::timeout(
            self.connect_timeout,
            tokio_tungstenite::connect_async(endpoint.as_str()),
        )
        .await
        .context("Timed out connecting to agent")?
        .context("Failed to connect to agent")?;

        let (mut sink, mut stream) = ws.split();

        let setup_json = serde_json::to_string(&ClientMessage::Setup(setup.clone()))?;
        sink.send(Message::Text(setup_json))
            .await
            .context("Failed to send session setup")?;

        // Negotiation is complete once the agent acknowledges the setup
        tokio::time::timeout(self.connect_timeout, async {
            while let Some(frame) = stream.next().await {
                match frame.context("Agent connection failed during setup")? {
                    Message::Close(frame) => {
                        let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                        bail!("Agent closed the connection during setup: {}", reason);
                    }
                    other => {
                        if let Some(msg) = parse_frame(other) {
                            if msg.setup_complete.is_some() {
                                return Ok(());
                            }
                            debug!("Ignoring frame received before setup completed");
                        }
                    }
                }
            }
            bail!("Agent connection ended during setup")
        })
        .await
        .context("Timed out waiting for session setup")??;

        info!("Agent session established");

        let (out_tx, mut out_rx) = mpsc::channel::<ClientMessage>(LINK_BUFFER);
        let (in_tx, in_rx) = mpsc::channel::<LinkEvent>(LINK_BUFFER);

        tokio::spawn(async move {
            let mut close_reason = None;

            loop {
                tokio::select! {
                    outgoing = out_rx.recv() => match outgoing {
                        Some(msg) => {
                            let text = match serde_json::to_string(&msg) {
                                Ok(text) => text,
                                Err(e) => {
                                    warn!("Failed to encode outgoing message: {}", e);
                                    continue;
                                }
                            };
                            if let Err(e) = sink.send(Message::Text(text)).await {
                                let _ = in_tx.send(LinkEvent::Error(e.to_string())).await;
                                break;
                            }
                        }
                        None => {
                            // Session released the link
                            let _ = sink.close().await;
                            debug!("Agent link closed locally");
                            return;
                        }
                    },
                    incoming = stream.next() => match incoming {
                        Some(Ok(Message::Close(frame))) => {
                            close_reason = frame.map(|f| f.reason.to_string());
                            break;
                        }
                        Some(Ok(other)) => {
                            if let Some(msg) = parse_frame(other) {
                                if in_tx.send(LinkEvent::Message(msg)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            let _ = in_tx.send(LinkEvent::Error(e.to_string())).await;
                            break;
                        }
                        None => break,
                    },
                }
            }

            let _ = in_tx.send(LinkEvent::Closed(close_reason)).await;
        });

        Ok(AgentLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

/// Decode a data frame; the service sends JSON as either text or binary frames
fn parse_frame(frame: Message) -> Option<ServerMessage> {
    let parsed = match frame {
        Message::Text(text) => serde_json::from_str::<ServerMessage>(&text),
        Message::Binary(bytes) => serde_json::from_slice::<ServerMessage>(&bytes),
        _ => return None,
    };

    match parsed {
        Ok(msg) => Some(msg),
        Err(e) => {
            warn!("Failed to parse agent message: {}", e);
            None
        }
    }
}
