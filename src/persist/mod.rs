pub mod record;
pub mod webhook;

pub use record::{render_transcript, InterviewRecord};
pub use webhook::{save_result, SaveStatus, WebhookArchive};
