//! HTTP API server for external control (onboarding and results pages)
//!
//! This module provides a REST API for running interview sessions:
//! - POST /interviews - Start a new interview
//! - POST /interviews/:id/terminate - End an interview early
//! - GET /interviews/:id/status - Live session status
//! - GET /interviews/:id/result - Final result and save status
//! - GET /interviews/:id/log - Plain-text interview log
//! - GET /health - Health check
//!
//! Finished interviews are dropped once the configured retention has passed.

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::{AppState, Completed, InterviewEntry, DEFAULT_RETENTION};
