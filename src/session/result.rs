use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
}

/// One completed utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl TranscriptEntry {
    pub fn new(speaker: Speaker, text: impl Into<String>, timestamp: DateTime<Local>) -> Self {
        Self {
            speaker,
            text: text.into(),
            timestamp,
        }
    }

    /// Wall-clock time of day, e.g. `3:04:05 PM`
    pub fn clock_time(&self) -> String {
        self.timestamp.format("%-I:%M:%S %p").to_string()
    }
}

/// Outcome of a completed interview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewResult {
    pub passed: bool,
    pub notes: Option<String>,
    pub transcript: Vec<TranscriptEntry>,
}

impl InterviewResult {
    pub fn status_label(&self) -> &'static str {
        if self.passed {
            "SELECTED"
        } else {
            "REJECTED"
        }
    }

    pub fn notes_or_na(&self) -> &str {
        match self.notes.as_deref() {
            Some(notes) if !notes.trim().is_empty() => notes,
            _ => "N/A",
        }
    }
}
