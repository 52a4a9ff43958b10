use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::session::{InterviewResult, SessionConfig, Speaker, TranscriptEntry};

/// Flat row submitted to the results sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewRecord {
    pub date: String,
    pub name: String,
    pub role: String,
    pub language: String,
    /// `SELECTED` or `REJECTED`
    pub status: String,
    pub notes: String,
    /// One `[time] HR|CANDIDATE: text` line per entry
    pub transcript: String,
}

impl InterviewRecord {
    pub fn new(config: &SessionConfig, result: &InterviewResult, at: DateTime<Local>) -> Self {
        Self {
            date: at.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string(),
            name: config.candidate_name.clone(),
            role: config.role.title().to_string(),
            language: config.language.name().to_string(),
            status: result.status_label().to_string(),
            notes: result.notes_or_na().to_string(),
            transcript: render_transcript(&result.transcript),
        }
    }
}

pub fn render_transcript(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            let who = match entry.speaker {
                Speaker::Agent => "HR",
                Speaker::User => "CANDIDATE",
            };
            format!("[{}] {}: {}", entry.clock_time(), who, entry.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
