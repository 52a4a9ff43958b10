// Per-turn transcript assembly
//
// Transcription arrives as fragments for both sides of the conversation. They
// accumulate until the agent signals the end of a turn, at which point the user
// side is flushed before the agent side.

use chrono::{DateTime, Local};

use super::result::{Speaker, TranscriptEntry};

#[derive(Debug, Default)]
pub struct TranscriptAssembler {
    pending_user: String,
    pending_agent: String,
    entries: Vec<TranscriptEntry>,
}

impl TranscriptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, fragment: &str) {
        self.pending_user.push_str(fragment);
    }

    pub fn push_agent(&mut self, fragment: &str) {
        self.pending_agent.push_str(fragment);
    }

    /// Flush both buffers as entries stamped `at`; returns the entries appended
    pub fn complete_turn(&mut self, at: DateTime<Local>) -> &[TranscriptEntry] {
        let first_new = self.entries.len();

        for (speaker, pending) in [
            (Speaker::User, &mut self.pending_user),
            (Speaker::Agent, &mut self.pending_agent),
        ] {
            let text = pending.trim();
            if !text.is_empty() {
                self.entries.push(TranscriptEntry::new(speaker, text, at));
            }
            pending.clear();
        }

        &self.entries[first_new..]
    }

    /// Flush whatever is still buffered, typically the closing statement
    /// before a turn-complete signal arrived
    pub fn flush_pending(&mut self, at: DateTime<Local>) -> usize {
        self.complete_turn(at).len()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending_user.trim().is_empty() || !self.pending_agent.trim().is_empty()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn into_entries(self) -> Vec<TranscriptEntry> {
        self.entries
    }
}
