//! Interview session management
//!
//! This module provides the `SessionController` that drives one interview:
//! - Media acquisition and upstream audio framing
//! - Agent connection with retry
//! - Playback scheduling and barge-in detection
//! - Silence strikes and the time limit
//! - Transcript assembly and the termination decision

mod config;
mod controller;
mod countdown;
mod decision;
mod liveness;
pub mod prompt;
mod result;
mod status;
mod transcript;

pub use config::{JobRole, Language, SessionConfig};
pub use controller::{
    start, SessionController, SessionControl, SessionDeps, SessionHandle, SessionLauncher,
    SessionSettings, SinkFactory,
};
pub use countdown::{format_clock, Countdown, CountdownTick};
pub use decision::{Decision, DecisionOutcome, DecisionState};
pub use liveness::{LevelOutcome, LivenessPolicy, LivenessState, StrikeOutcome};
pub use result::{InterviewResult, Speaker, TranscriptEntry};
pub use status::{ContactCard, SessionStatus};
pub use transcript::TranscriptAssembler;
