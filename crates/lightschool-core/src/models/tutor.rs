use serde::{Deserialize, Serialize};

/// Body of `POST /api/tutor/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorRequest {
    pub message: String,
    pub subject: String,
    pub grade: u32,
    pub locale: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    /// Canned reply from the server's rule table.
    Rules,
    /// Generated by the language model.
    Model,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorReply {
    pub reply: String,
    #[serde(default = "default_source")]
    pub source: ReplySource,
}

fn default_source() -> ReplySource {
    ReplySource::Other
}

/// Error body the server sends alongside non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerError {
    pub error: Option<String>,
}
