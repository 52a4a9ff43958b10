use serde::Serialize;

use super::countdown::format_clock;
use super::result::TranscriptEntry;
use crate::agent::ConnectionState;
use crate::config::RecruiterConfig;

/// Contact details shown while a shortlisted candidate waits for the session to close
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactCard {
    pub ceo_phone: String,
    pub hr_email: String,
}

impl From<&RecruiterConfig> for ContactCard {
    fn from(recruiter: &RecruiterConfig) -> Self {
        Self {
            ceo_phone: recruiter.phone.clone(),
            hr_email: recruiter.email.clone(),
        }
    }
}

/// Snapshot of a running session, republished after every event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub connection: ConnectionState,
    pub reconnect_attempt: u32,
    pub max_retries: u32,
    pub seconds_left: u32,
    pub strikes: u32,
    pub interruptions: u32,
    pub agent_speaking: bool,
    pub user_level: f32,
    pub shortlisted: bool,
    pub contact: Option<ContactCard>,
    pub latest: Option<TranscriptEntry>,
    pub error: Option<String>,
    pub finished: bool,
}

impl SessionStatus {
    pub fn initial(seconds_left: u32, max_retries: u32) -> Self {
        Self {
            connection: ConnectionState::Idle,
            reconnect_attempt: 0,
            max_retries,
            seconds_left,
            strikes: 0,
            interruptions: 0,
            agent_speaking: false,
            user_level: 0.0,
            shortlisted: false,
            contact: None,
            latest: None,
            error: None,
            finished: false,
        }
    }

    pub fn time_left(&self) -> String {
        format_clock(self.seconds_left)
    }

    pub fn is_reconnecting(&self) -> bool {
        self.connection == ConnectionState::Reconnecting
    }
}
