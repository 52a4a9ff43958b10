// Connection state machine for the agent session
//
// The manager never performs IO itself. The session controller asks it for an
// attempt generation, runs the transport's connect in the background and feeds
// the outcome back; the manager decides whether the link is installed, released,
// retried or given up on. Outgoing messages pass through `send`, which delivers
// only while a live link is installed and drops otherwise.

use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::messages::ClientMessage;
use crate::config::RetryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Live,
    Reconnecting,
    ClosedIntentional,
    ClosedFatal,
}

/// Exponential backoff: `min(base * 2^attempt, max)` for up to `max_retries` retries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl RetryPolicy {
    /// Delay before the retry that follows `attempt` previous retries
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            max_retries: config.max_retries,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempt_count: u32,
    pub intentional_close: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The link is now the live link
    Installed,
    /// The link was stale or the session is closing; it has been dropped
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLoss {
    /// Nothing to do (intentional close or superseded attempt)
    Ignored,
    /// Reconnect after `delay`; `attempt` is 1-based
    Retry { attempt: u32, delay: Duration },
    /// Retry budget exhausted
    Fatal { attempts: u32 },
}

pub struct ConnectionManager {
    state: ConnectionState,
    retry: RetryState,
    policy: RetryPolicy,
    outbound: Option<mpsc::Sender<ClientMessage>>,
    generation: u64,
}

impl ConnectionManager {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: ConnectionState::Idle,
            retry: RetryState::default(),
            policy,
            outbound: None,
            generation: 0,
        }
    }

    /// Start a connection attempt. Returns the attempt generation, or `None`
    /// once the session is closed.
    pub fn begin_attempt(&mut self) -> Option<u64> {
        if self.is_closed() {
            return None;
        }

        self.generation += 1;
        if self.state != ConnectionState::Reconnecting {
            self.state = ConnectionState::Connecting;
        }
        debug!("Connection attempt {} started", self.generation);
        Some(self.generation)
    }

    /// A connect attempt resolved with a link
    pub fn on_open(&mut self, generation: u64, outbound: mpsc::Sender<ClientMessage>) -> OpenOutcome {
        if self.is_closed() || generation != self.generation {
            debug!(
                "Releasing link from attempt {} (current {}, state {:?})",
                generation, self.generation, self.state
            );
            drop(outbound);
            return OpenOutcome::Released;
        }

        self.outbound = Some(outbound);
        self.state = ConnectionState::Live;
        self.retry.attempt_count = 0;
        info!("Agent connection live");
        OpenOutcome::Installed
    }

    /// Transport error on the current link; the close that follows drives the retry
    pub fn on_error(&mut self, generation: u64, error: &str) {
        if self.is_closed() || generation != self.generation {
            return;
        }
        warn!("Connection error: {}", error);
        self.state = ConnectionState::Reconnecting;
    }

    /// The current link closed, or the connect attempt failed
    pub fn on_lost(&mut self, generation: u64) -> LinkLoss {
        if self.is_closed() || generation != self.generation {
            return LinkLoss::Ignored;
        }

        self.outbound = None;

        if self.retry.attempt_count < self.policy.max_retries {
            let delay = self.policy.delay_for(self.retry.attempt_count);
            self.retry.attempt_count += 1;
            self.state = ConnectionState::Reconnecting;
            warn!(
                "Connection lost. Retrying in {}ms... (Attempt {}/{})",
                delay.as_millis(),
                self.retry.attempt_count,
                self.policy.max_retries
            );
            LinkLoss::Retry {
                attempt: self.retry.attempt_count,
                delay,
            }
        } else {
            self.state = ConnectionState::ClosedFatal;
            LinkLoss::Fatal {
                attempts: self.retry.attempt_count,
            }
        }
    }

    /// Close the session. An intentional close is final; a non-intentional
    /// close drops the current link and goes through the retry policy.
    pub fn close(&mut self, intentional: bool) -> LinkLoss {
        if self.retry.intentional_close {
            return LinkLoss::Ignored;
        }

        if intentional {
            self.retry.intentional_close = true;
            self.outbound = None;
            if self.state != ConnectionState::ClosedFatal {
                self.state = ConnectionState::ClosedIntentional;
            }
            info!("Agent connection closed");
            LinkLoss::Ignored
        } else {
            self.on_lost(self.generation)
        }
    }

    /// Deliver-or-drop predicate
    pub fn can_deliver(&self) -> bool {
        self.state == ConnectionState::Live && self.outbound.is_some() && !self.retry.intentional_close
    }

    /// Fire-and-forget send on the live link
    pub fn send(&self, msg: ClientMessage) -> SendOutcome {
        if !self.can_deliver() {
            return SendOutcome::Dropped;
        }

        match self.outbound.as_ref().map(|tx| tx.try_send(msg)) {
            Some(Ok(())) => SendOutcome::Delivered,
            Some(Err(e)) => {
                debug!("Dropping outgoing message: {}", e);
                SendOutcome::Dropped
            }
            None => SendOutcome::Dropped,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry_state(&self) -> RetryState {
        self.retry
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_live(&self) -> bool {
        self.state == ConnectionState::Live && !self.retry.intentional_close
    }

    pub fn is_closed(&self) -> bool {
        self.retry.intentional_close || self.state == ConnectionState::ClosedFatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    fn open(manager: &mut ConnectionManager) -> mpsc::Receiver<ClientMessage> {
        let generation = manager.begin_attempt().unwrap();
        let (tx, rx) = mpsc::channel(8);
        assert_eq!(manager.on_open(generation, tx), OpenOutcome::Installed);
        rx
    }

    #[test]
    fn test_backoff_sequence_then_fatal() {
        let mut manager = ConnectionManager::new(RetryPolicy::default());
        let mut delays = Vec::new();

        loop {
            let generation = manager.begin_attempt().unwrap();
            match manager.on_lost(generation) {
                LinkLoss::Retry { attempt, delay } => {
                    assert_eq!(attempt as usize, delays.len() + 1);
                    delays.push(delay.as_millis() as u64);
                }
                LinkLoss::Fatal { attempts } => {
                    assert_eq!(attempts, 5);
                    break;
                }
                LinkLoss::Ignored => panic!("failure must not be ignored"),
            }
        }

        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10000]);
        assert_eq!(manager.state(), ConnectionState::ClosedFatal);
        assert_eq!(manager.begin_attempt(), None);
    }

    #[test]
    fn test_open_resets_attempts() {
        let mut manager = ConnectionManager::new(RetryPolicy::default());
        let generation = manager.begin_attempt().unwrap();
        manager.on_lost(generation);
        let generation = manager.begin_attempt().unwrap();
        manager.on_lost(generation);
        assert_eq!(manager.retry_state().attempt_count, 2);

        let _rx = open(&mut manager);
        assert_eq!(manager.state(), ConnectionState::Live);
        assert_eq!(manager.retry_state().attempt_count, 0);

        // Next loss starts the backoff over
        match manager.on_lost(manager.generation()) {
            LinkLoss::Retry { attempt, delay } => {
                assert_eq!(attempt, 1);
                assert_eq!(delay, Duration::from_millis(1000));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_send_requires_live_link() {
        let mut manager = ConnectionManager::new(RetryPolicy::default());
        assert_eq!(
            manager.send(ClientMessage::system_text("hello")),
            SendOutcome::Dropped
        );

        let mut rx = open(&mut manager);
        assert_eq!(
            manager.send(ClientMessage::system_text("hello")),
            SendOutcome::Delivered
        );
        assert!(rx.try_recv().is_ok());

        manager.on_error(manager.generation(), "reset by peer");
        assert_eq!(manager.state(), ConnectionState::Reconnecting);
        assert_eq!(
            manager.send(ClientMessage::system_text("lost")),
            SendOutcome::Dropped
        );
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_intentional_close_is_final_and_idempotent() {
        let mut manager = ConnectionManager::new(RetryPolicy::default());
        let mut rx = open(&mut manager);

        assert_eq!(manager.close(true), LinkLoss::Ignored);
        assert_eq!(manager.state(), ConnectionState::ClosedIntentional);
        // Outbound sender dropped -> link closed
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));

        assert_eq!(manager.close(true), LinkLoss::Ignored);
        assert_eq!(manager.close(false), LinkLoss::Ignored);
        assert_eq!(manager.on_lost(manager.generation()), LinkLoss::Ignored);
        assert_eq!(manager.begin_attempt(), None);
        assert_eq!(
            manager.send(ClientMessage::system_text("late")),
            SendOutcome::Dropped
        );
    }

    #[test]
    fn test_link_resolving_after_close_is_released() {
        let mut manager = ConnectionManager::new(RetryPolicy::default());
        let generation = manager.begin_attempt().unwrap();
        manager.close(true);

        let (tx, mut rx) = mpsc::channel(1);
        assert_eq!(manager.on_open(generation, tx), OpenOutcome::Released);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
        assert_eq!(manager.state(), ConnectionState::ClosedIntentional);
    }

    #[test]
    fn test_stale_attempt_is_released() {
        let mut manager = ConnectionManager::new(RetryPolicy::default());
        let stale = manager.begin_attempt().unwrap();
        let current = manager.begin_attempt().unwrap();

        let (tx, _rx) = mpsc::channel(1);
        assert_eq!(manager.on_open(stale, tx), OpenOutcome::Released);
        assert_eq!(manager.on_lost(stale), LinkLoss::Ignored);

        let (tx, _rx) = mpsc::channel(1);
        assert_eq!(manager.on_open(current, tx), OpenOutcome::Installed);
    }

    #[test]
    fn test_non_intentional_close_retries() {
        let mut manager = ConnectionManager::new(RetryPolicy::default());
        let _rx = open(&mut manager);
        assert!(matches!(manager.close(false), LinkLoss::Retry { attempt: 1, .. }));
        assert_eq!(manager.state(), ConnectionState::Reconnecting);
    }

    #[test]
    fn test_delay_caps_for_large_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(40), Duration::from_millis(10_000));
    }
}
