//! Plain-text interview log export

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::RecruiterConfig;
use crate::session::{InterviewResult, SessionConfig, Speaker};

const RULE: &str = "------------------------------------------";

pub struct InterviewLog<'a> {
    pub config: &'a SessionConfig,
    pub result: &'a InterviewResult,
    pub recruiter: &'a RecruiterConfig,
    pub date: DateTime<Local>,
}

impl<'a> InterviewLog<'a> {
    pub fn new(
        config: &'a SessionConfig,
        result: &'a InterviewResult,
        recruiter: &'a RecruiterConfig,
        date: DateTime<Local>,
    ) -> Self {
        Self {
            config,
            result,
            recruiter,
            date,
        }
    }

    /// `<name with whitespace runs replaced by _>_Interview_Log.txt`.
    ///
    /// Path separators and dots split the name like whitespace, so the file
    /// always lands directly inside the log directory.
    pub fn file_name(&self) -> String {
        let parts: Vec<&str> = self
            .config
            .candidate_name
            .split(|c: char| c.is_whitespace() || matches!(c, '/' | '\\' | '.' | ':'))
            .filter(|part| !part.is_empty())
            .collect();
        let name = if parts.is_empty() {
            "Candidate".to_string()
        } else {
            parts.join("_")
        };
        format!("{}_Interview_Log.txt", name)
    }

    /// Write the log into `dir`. Nothing is written for an empty transcript.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<Option<PathBuf>> {
        if self.result.transcript.is_empty() {
            return Ok(None);
        }

        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        let path = dir.join(self.file_name());
        std::fs::write(&path, self.to_string())
            .with_context(|| format!("Failed to write interview log {}", path.display()))?;

        info!("Interview log written to {}", path.display());
        Ok(Some(path))
    }
}

impl fmt::Display for InterviewLog<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} AI RECRUITER - INTERVIEW LOG",
            self.recruiter.company.to_uppercase()
        )?;
        writeln!(f, "Candidate: {}", self.config.candidate_name)?;
        writeln!(f, "Role: {}", self.config.role.title())?;
        writeln!(f, "Date: {}", self.date.format("%-m/%-d/%Y, %-I:%M:%S %p"))?;
        writeln!(f, "Result: {}", self.result.status_label())?;
        writeln!(f, "Notes: {}", self.result.notes_or_na())?;
        writeln!(f, "{}", RULE)?;
        writeln!(f)?;

        for (i, entry) in self.result.transcript.iter().enumerate() {
            if i > 0 {
                f.write_str("\n\n")?;
            }
            match entry.speaker {
                Speaker::Agent => write!(
                    f,
                    "[{}] HR ({}): {}",
                    entry.clock_time(),
                    self.recruiter.name,
                    entry.text
                )?,
                Speaker::User => write!(f, "[{}] CANDIDATE: {}", entry.clock_time(), entry.text)?,
            }
        }

        Ok(())
    }
}
