//! Terminal failures of an interview session

use thiserror::Error;

/// Errors that end a session without an interview result.
///
/// Transient connection failures never surface here; they are retried by the
/// connection manager and only become `RetriesExhausted` once the retry budget
/// is spent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Failed to initialize interview session. Microphone permission is required. ({0})")]
    MediaAcquisition(String),

    #[error("Unable to establish a stable connection. Please check your internet and reload. (gave up after {attempts} retries)")]
    RetriesExhausted { attempts: u32 },

    #[error("Interview session ended without producing a result")]
    Aborted,
}

pub type SessionResult<T> = Result<T, SessionError>;
