// Termination decision latch
//
// The first decision wins. A passing decision opens a grace window before the
// session ends; anything else ends it immediately. After the final silence
// strike the session is failing regardless of what the agent reports.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::prompt::UNRESPONSIVE_REASON;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub passed: bool,
    pub reason: Option<String>,
}

impl Decision {
    pub fn pass(reason: impl Into<String>) -> Self {
        Self {
            passed: true,
            reason: non_empty(reason.into()),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            passed: false,
            reason: non_empty(reason.into()),
        }
    }
}

fn non_empty(reason: String) -> Option<String> {
    if reason.trim().is_empty() {
        None
    } else {
        Some(reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionOutcome {
    /// End the session now with this decision
    Finalize(Decision),
    /// Passing decision latched; end the session at `until`
    Grace { until: Instant },
    /// A decision was already latched
    Ignored,
}

#[derive(Debug)]
pub struct DecisionState {
    latched: Option<Decision>,
    grace: Duration,
    grace_until: Option<Instant>,
    forced_timeout: Duration,
    forced_until: Option<Instant>,
}

impl DecisionState {
    pub fn new(grace: Duration, forced_timeout: Duration) -> Self {
        Self {
            latched: None,
            grace,
            grace_until: None,
            forced_timeout,
            forced_until: None,
        }
    }

    /// The agent called the decision tool
    pub fn on_decision(&mut self, passed: bool, reason: String, now: Instant) -> DecisionOutcome {
        if self.latched.is_some() {
            debug!("Decision already latched, ignoring passed={}", passed);
            return DecisionOutcome::Ignored;
        }

        if self.forced_until.is_some() {
            if passed {
                info!("Overriding passing decision after final silence strike");
            }
            let decision = Decision::fail(UNRESPONSIVE_REASON);
            self.latched = Some(decision.clone());
            self.forced_until = None;
            return DecisionOutcome::Finalize(decision);
        }

        if passed {
            let until = now + self.grace;
            self.latched = Some(Decision::pass(reason));
            self.grace_until = Some(until);
            info!("Candidate shortlisted, ending session in {:?}", self.grace);
            DecisionOutcome::Grace { until }
        } else {
            let decision = Decision::fail(reason);
            self.latched = Some(decision.clone());
            DecisionOutcome::Finalize(decision)
        }
    }

    /// Start the window the agent has to deliver the forced failure
    pub fn arm_forced_failure(&mut self, now: Instant) -> Instant {
        let until = now + self.forced_timeout;
        self.forced_until = Some(until);
        until
    }

    /// Forced-failure deadline passed without a decision call
    pub fn forced_failure_elapsed(&mut self) -> Option<Decision> {
        self.forced_until.take()?;
        if self.latched.is_some() {
            return None;
        }
        let decision = Decision::fail(UNRESPONSIVE_REASON);
        self.latched = Some(decision.clone());
        Some(decision)
    }

    /// Grace window over
    pub fn grace_elapsed(&mut self) -> Option<Decision> {
        self.grace_until.take()?;
        self.latched.clone()
    }

    /// Decision for a session ended by anything other than the agent: the
    /// latched decision if there is one, otherwise `fallback`.
    pub fn conclude(&mut self, fallback: Decision) -> Decision {
        self.grace_until = None;
        self.forced_until = None;
        self.latched.get_or_insert(fallback).clone()
    }

    pub fn in_grace(&self) -> bool {
        self.grace_until.is_some()
    }

    pub fn forced_failure_pending(&self) -> bool {
        self.forced_until.is_some()
    }

    pub fn is_latched(&self) -> bool {
        self.latched.is_some()
    }

    pub fn grace_deadline(&self) -> Option<Instant> {
        self.grace_until
    }

    pub fn forced_deadline(&self) -> Option<Instant> {
        self.forced_until
    }
}
