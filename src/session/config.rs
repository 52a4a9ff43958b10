use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position the candidate is interviewed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum JobRole {
    #[serde(alias = "Marketing Executive")]
    Marketing,
    #[serde(alias = "Software Development Intern")]
    SdeIntern,
    #[serde(alias = "Software Developer (Full Time)")]
    SdeJob,
}

impl JobRole {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Marketing => "Marketing Executive",
            Self::SdeIntern => "Software Development Intern",
            Self::SdeJob => "Software Developer (Full Time)",
        }
    }

    /// Target profile the agent assesses against
    pub fn description(&self) -> &'static str {
        match self {
            Self::Marketing => {
                "Target Profile: A dynamic Marketing Executive. \n\
                 Key Skills: Digital marketing (SEO, SEM, PPC), Content Strategy, Social Media \
                 Management (LinkedIn, Twitter, Instagram), Brand Positioning, Market Research, \
                 and Crisis Communication. \n\
                 Scenario: Ask about handling a PR crisis on social media, or how they would \
                 launch a product with zero budget. \n\
                 Trait: Look for high energy, persuasive communication, and data-driven creativity."
            }
            Self::SdeIntern => {
                "Target Profile: Smart, eager-to-learn Software Development Intern. \n\
                 Key Skills: Data Structures & Algorithms (Arrays, Linked Lists, Trees), OOPs \
                 concepts (Polymorphism, Inheritance), Basic Web Dev (HTML/CSS/JS), Database \
                 basics (SQL). \n\
                 Scenario: Ask how to reverse a linked list, or explain the difference between a \
                 process and a thread. \n\
                 Trait: Look for problem-solving aptitude (not just right answers) and eagerness \
                 to learn."
            }
            Self::SdeJob => {
                "Target Profile: Experienced Full Stack Developer. \n\
                 Key Skills: System Design (Scalability, Load Balancing), Backend \
                 (Node.js/Express, Microservices), Frontend (React.js, State Management, SSR), \
                 Cloud (AWS/Docker/Kubernetes), and CI/CD pipelines. \n\
                 Scenario: Ask to design a URL shortener system or handle database migration \
                 with zero downtime. \n\
                 Trait: Look for architectural depth, coding standards, and experience with \
                 production issues."
            }
        }
    }
}

impl fmt::Display for JobRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Language the agent conducts the interview in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[serde(alias = "English")]
    English,
    #[serde(alias = "Hindi")]
    Hindi,
    #[serde(alias = "Bengali")]
    Bengali,
}

impl Language {
    pub fn name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
            Self::Bengali => "Bengali",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Who is interviewed, for what, and in which language. Fixed for the
/// lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub candidate_name: String,
    pub role: JobRole,
    pub language: Language,
}

impl SessionConfig {
    pub fn new(candidate_name: impl Into<String>, role: JobRole, language: Language) -> Result<Self> {
        let config = Self {
            candidate_name: candidate_name.into().trim().to_string(),
            role,
            language,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.candidate_name.trim().is_empty() {
            bail!("Candidate name must not be empty");
        }
        Ok(())
    }
}
