// Silence strikes and barge-in tracking
//
// All four liveness fields change only through the methods below. The
// controller feeds in sampled input levels and a 1 s poll; this module decides
// whether that amounts to speech, an interruption or a strike.

use std::time::Duration;
use tokio::time::Instant;

use crate::config::{AudioConfig, InterviewConfig};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LivenessPolicy {
    pub silence_timeout: Duration,
    pub max_strikes: u32,
    pub max_interruptions: u32,
    /// Level (0-255) above which the candidate counts as speaking
    pub speech_threshold: f32,
}

impl LivenessPolicy {
    pub fn from_config(interview: &InterviewConfig, audio: &AudioConfig) -> Self {
        Self {
            silence_timeout: interview.silence_timeout(),
            max_strikes: interview.max_strikes.max(1),
            max_interruptions: interview.max_interruptions.max(1),
            speech_threshold: audio.speech_threshold,
        }
    }
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self::from_config(&InterviewConfig::default(), &AudioConfig::default())
    }
}

/// What a sampled input level amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelOutcome {
    Quiet,
    Speech,
    /// Speech over agent audio. `alert` is set on every `max_interruptions`-th one.
    BargeIn { interruptions: u32, alert: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikeOutcome {
    Warning { strike: u32 },
    FinalStrike,
}

#[derive(Debug)]
pub struct LivenessState {
    policy: LivenessPolicy,
    last_speech_at: Instant,
    strike_count: u32,
    interruption_count: u32,
    agent_speaking: bool,
}

impl LivenessState {
    pub fn new(policy: LivenessPolicy, now: Instant) -> Self {
        Self {
            policy,
            last_speech_at: now,
            strike_count: 0,
            interruption_count: 0,
            agent_speaking: false,
        }
    }

    pub fn observe_level(&mut self, level: f32, now: Instant) -> LevelOutcome {
        if level <= self.policy.speech_threshold {
            return LevelOutcome::Quiet;
        }

        self.last_speech_at = now;
        self.strike_count = 0;

        if !self.agent_speaking {
            return LevelOutcome::Speech;
        }

        self.agent_speaking = false;
        self.interruption_count += 1;
        let interruptions = self.interruption_count;
        let alert = interruptions >= self.policy.max_interruptions;
        if alert {
            self.interruption_count = 0;
        }

        LevelOutcome::BargeIn { interruptions, alert }
    }

    /// Periodic silence check
    pub fn poll(&mut self, now: Instant) -> Option<StrikeOutcome> {
        if self.agent_speaking {
            return None;
        }
        if now.saturating_duration_since(self.last_speech_at) <= self.policy.silence_timeout {
            return None;
        }

        self.strike_count += 1;
        // Each strike opens a fresh silence window
        self.last_speech_at = now;

        if self.strike_count >= self.policy.max_strikes {
            Some(StrikeOutcome::FinalStrike)
        } else {
            Some(StrikeOutcome::Warning {
                strike: self.strike_count,
            })
        }
    }

    pub fn agent_started(&mut self) {
        self.agent_speaking = true;
    }

    /// Agent audio drained; the candidate gets a full window to respond
    pub fn agent_finished(&mut self, now: Instant) {
        self.agent_speaking = false;
        self.last_speech_at = now;
    }

    /// Restart the silence window without touching the counters
    pub fn rearm(&mut self, now: Instant) {
        self.last_speech_at = now;
    }

    pub fn strike_count(&self) -> u32 {
        self.strike_count
    }

    pub fn interruption_count(&self) -> u32 {
        self.interruption_count
    }

    pub fn agent_speaking(&self) -> bool {
        self.agent_speaking
    }

    pub fn last_speech_at(&self) -> Instant {
        self.last_speech_at
    }

    pub fn policy(&self) -> &LivenessPolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_one_strike_per_silent_window() {
        let t0 = Instant::now();
        let mut state = LivenessState::new(LivenessPolicy::default(), t0);

        assert_eq!(state.poll(t0 + secs(8)), None);
        assert_eq!(
            state.poll(t0 + secs(9)),
            Some(StrikeOutcome::Warning { strike: 1 })
        );
        // Window re-armed at the strike
        assert_eq!(state.poll(t0 + secs(10)), None);
        assert_eq!(state.poll(t0 + secs(17)), None);
        assert_eq!(
            state.poll(t0 + secs(18)),
            Some(StrikeOutcome::Warning { strike: 2 })
        );
        assert_eq!(state.poll(t0 + secs(27)), Some(StrikeOutcome::FinalStrike));
        assert_eq!(state.strike_count(), 3);
    }

    #[test]
    fn test_speech_resets_strikes() {
        let t0 = Instant::now();
        let mut state = LivenessState::new(LivenessPolicy::default(), t0);

        state.poll(t0 + secs(9));
        assert_eq!(state.strike_count(), 1);

        assert_eq!(state.observe_level(80.0, t0 + secs(12)), LevelOutcome::Speech);
        assert_eq!(state.strike_count(), 0);
        assert_eq!(state.last_speech_at(), t0 + secs(12));
        assert_eq!(state.poll(t0 + secs(20)), None);

        // Threshold itself is not speech
        assert_eq!(state.observe_level(20.0, t0 + secs(21)), LevelOutcome::Quiet);
        assert_eq!(state.last_speech_at(), t0 + secs(12));
    }

    #[test]
    fn test_no_strikes_while_agent_speaks() {
        let t0 = Instant::now();
        let mut state = LivenessState::new(LivenessPolicy::default(), t0);
        state.agent_started();

        assert_eq!(state.poll(t0 + secs(30)), None);

        state.agent_finished(t0 + secs(30));
        assert!(!state.agent_speaking());
        assert_eq!(state.poll(t0 + secs(38)), None);
        assert!(state.poll(t0 + secs(39)).is_some());
    }

    #[test]
    fn test_every_third_interruption_alerts() {
        let t0 = Instant::now();
        let mut state = LivenessState::new(LivenessPolicy::default(), t0);

        let mut alerts = Vec::new();
        for i in 0..7 {
            state.agent_started();
            match state.observe_level(100.0, t0 + secs(i)) {
                LevelOutcome::BargeIn { alert, .. } => alerts.push(alert),
                other => panic!("expected barge-in, got {other:?}"),
            }
            // Cleared in the same step
            assert!(!state.agent_speaking());
        }

        assert_eq!(alerts, vec![false, false, true, false, false, true, false]);
        assert_eq!(state.interruption_count(), 1);
    }

    #[test]
    fn test_speech_without_agent_audio_is_not_an_interruption() {
        let t0 = Instant::now();
        let mut state = LivenessState::new(LivenessPolicy::default(), t0);
        assert_eq!(state.observe_level(200.0, t0), LevelOutcome::Speech);
        assert_eq!(state.interruption_count(), 0);
    }
}
