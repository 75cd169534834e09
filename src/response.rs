use serde::Serialize;

use crate::error::{ChatError, ProviderError};
use crate::gateway::Completion;
use crate::service::{SessionSnapshot, UploadSummary};
use crate::session::ChatMessage;

/// `POST /chat` success body.
#[derive(Debug, Serialize)]
pub struct ChatAnswer {
    pub success: bool,
    /// Candidate that produced the answer.
    pub model: String,
    pub answer: String,
}

impl From<Completion> for ChatAnswer {
    fn from(c: Completion) -> Self {
        Self {
            success: true,
            model: c.candidate,
            answer: c.answer,
        }
    }
}

/// Error body shared by every route.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Per-candidate failures, in attempt order. Only set when every
    /// candidate failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failures: Option<Vec<ProviderError>>,
}

impl ErrorBody {
    pub fn message(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            failures: None,
        }
    }
}

impl From<&ChatError> for ErrorBody {
    fn from(e: &ChatError) -> Self {
        match e {
            ChatError::Exhausted(agg) => Self {
                error: agg.to_string(),
                details: Some(agg.details()),
                failures: Some(agg.failures.clone()),
            },
            ChatError::Config(_) => Self {
                error: "configuration error".to_string(),
                details: Some(e.user_message()),
                failures: None,
            },
            other => Self::message(other.user_message()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentInfo {
    pub name: Option<String>,
    pub pages_processed: usize,
    pub total_pages: usize,
    pub characters: usize,
}

impl From<UploadSummary> for DocumentInfo {
    fn from(s: UploadSummary) -> Self {
        Self {
            name: s.name,
            pages_processed: s.pages_processed,
            total_pages: s.total_pages,
            characters: s.characters,
        }
    }
}

/// `GET /session` body.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub document: Option<DocumentInfo>,
    pub messages: Vec<ChatMessage>,
    pub loading: bool,
}

impl From<SessionSnapshot> for SessionView {
    fn from(s: SessionSnapshot) -> Self {
        Self {
            document: s.document.map(DocumentInfo::from),
            messages: s.messages,
            loading: s.in_flight,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}
