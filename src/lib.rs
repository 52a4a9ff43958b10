pub mod agent;
pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod persist;
pub mod report;
pub mod session;

pub use agent::{AgentLink, AgentTransport, ConnectionState, LinkEvent, WsTransport};
pub use audio::{AudioFile, AudioFrame, AudioSink, AudioSource, ClockSink, MediaBackendFactory, MediaDevices};
pub use config::Config;
pub use error::{SessionError, SessionResult};
pub use http::{create_router, AppState};
pub use persist::{InterviewRecord, SaveStatus, WebhookArchive};
pub use report::InterviewLog;
pub use session::{
    InterviewResult, JobRole, Language, SessionConfig, SessionHandle, SessionLauncher,
    SessionSettings, SessionStatus, TranscriptEntry,
};
