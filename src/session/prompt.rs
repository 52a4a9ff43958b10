// Instructions and in-band directives sent to the agent

use super::config::SessionConfig;
use crate::agent::SetupConfig;
use crate::config::{AgentConfig, RecruiterConfig};

pub const USER_ENDED_REASON: &str = "User voluntarily ended session.";
pub const UNRESPONSIVE_REASON: &str = "Candidate unresponsive regarding network/audio issues";

pub fn time_limit_reason(duration_secs: u32) -> String {
    if duration_secs % 60 == 0 {
        format!(
            "Interview time limit of {} minutes exceeded.",
            duration_secs / 60
        )
    } else {
        format!("Interview time limit of {} seconds exceeded.", duration_secs)
    }
}

pub fn system_instruction(session: &SessionConfig, recruiter: &RecruiterConfig) -> String {
    format!(
        "Role: You are {recruiter_name}, a very experienced Senior Technical Recruiter for {company}.\n\
         Goal: Conduct a structured, rigorous interview with {candidate} for the {role} position.\n\
         Language: Speak in {language}.\n\
         \n\
         {profile}\n\
         \n\
         DYNAMIC ASSESSMENT INSTRUCTIONS:\n\
         1. Do NOT be static: Do not just read questions from a list.\n\
         2. Validate Answers: If the candidate answers a technical question, ask a follow-up to \
         VALIDATE their knowledge.\n\
         3. Spot Bluffing: If the answer is vague or generic, press them for specific examples.\n\
         \n\
         Company Details:\n\
         - CEO: {ceo} (Phone: {phone})\n\
         - HR Email: {email}\n\
         \n\
         PROTOCOL:\n\
         - Intro (30s): Welcome & Role Check.\n\
         - Core (3m): 2 Scenario + 1 Technical (Deep Dive).\n\
         - Closing: Verbal feedback + Final Decision.\n\
         \n\
         DECISION:\n\
         - Call 'notifyResult' ONLY after you have verbally informed them of the result.",
        recruiter_name = recruiter.name,
        company = recruiter.company,
        candidate = session.candidate_name,
        role = session.role.title(),
        language = session.language.name(),
        profile = session.role.description(),
        ceo = recruiter.ceo_name,
        phone = recruiter.phone,
        email = recruiter.email,
    )
}

/// Session setup for one interview; reused unchanged on every reconnect
pub fn build_setup(session: &SessionConfig, agent: &AgentConfig, recruiter: &RecruiterConfig) -> SetupConfig {
    SetupConfig::new(
        agent.model.clone(),
        agent.voice.clone(),
        system_instruction(session, recruiter),
    )
}

pub fn strike_warning(strike: u32, max_strikes: u32, silence_secs: u64) -> String {
    format!(
        "[SYSTEM NOTIFICATION: The candidate has been silent for {silence_secs}+ seconds. \
         Strike {strike}/{max_strikes}. Politely ask: 'Can you hear me? Is there a network issue?']"
    )
}

pub fn forced_failure_directive(max_strikes: u32) -> String {
    format!(
        "[SYSTEM COMMAND: The candidate has been unresponsive for {max_strikes} consecutive attempts. \
         THIS IS THE FINAL STRIKE. You MUST FAIL them now. Say 'I am not receiving any response. \
         I must end the interview now.' and immediately call notifyResult(false, '{UNRESPONSIVE_REASON}').]"
    )
}

pub fn interruption_alert(max_interruptions: u32) -> String {
    format!(
        "[SYSTEM ALERT: The user has interrupted you {max_interruptions} times. \
         Sternly ask them to let you finish.]"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{JobRole, Language};

    #[test]
    fn test_directive_texts() {
        assert_eq!(
            strike_warning(2, 3, 8),
            "[SYSTEM NOTIFICATION: The candidate has been silent for 8+ seconds. Strike 2/3. \
             Politely ask: 'Can you hear me? Is there a network issue?']"
        );
        assert_eq!(
            interruption_alert(3),
            "[SYSTEM ALERT: The user has interrupted you 3 times. Sternly ask them to let you finish.]"
        );
        assert!(forced_failure_directive(3).contains(
            "call notifyResult(false, 'Candidate unresponsive regarding network/audio issues')"
        ));
    }

    #[test]
    fn test_time_limit_reason() {
        assert_eq!(time_limit_reason(300), "Interview time limit of 5 minutes exceeded.");
        assert_eq!(time_limit_reason(90), "Interview time limit of 90 seconds exceeded.");
    }

    #[test]
    fn test_instruction_mentions_candidate_and_profile() {
        let session = SessionConfig::new("Ravi", JobRole::SdeJob, Language::Bengali).unwrap();
        let text = system_instruction(&session, &RecruiterConfig::default());
        assert!(text.contains("interview with Ravi for the Software Developer (Full Time) position"));
        assert!(text.contains("Speak in Bengali"));
        assert!(text.contains("URL shortener"));
        assert!(text.contains("hr@cehpoint.co.in"));
    }
}
