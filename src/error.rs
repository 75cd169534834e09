use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::context::AssembleError;
use crate::document::ExtractError;

/// Canonical failure classes for a single candidate attempt.
/// Independent of which backend produced the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ProviderErrorKind {
    InvalidRequest,
    AuthError,
    RateLimited,
    Timeout,
    UnknownProviderError,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "InvalidRequest",
            Self::AuthError => "AuthError",
            Self::RateLimited => "RateLimited",
            Self::Timeout => "Timeout",
            Self::UnknownProviderError => "UnknownProviderError",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed attempt against one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{candidate}: {kind} ({detail})")]
pub struct ProviderError {
    pub candidate: String,
    pub kind: ProviderErrorKind,
    pub detail: String,
}

impl ProviderError {
    pub fn new(
        candidate: impl Into<String>,
        kind: ProviderErrorKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            candidate: candidate.into(),
            kind,
            detail: detail.into(),
        }
    }

    pub fn timeout(candidate: impl Into<String>, after_ms: u64) -> Self {
        Self::new(
            candidate,
            ProviderErrorKind::Timeout,
            format!("no response after {after_ms}ms"),
        )
    }
}

/// Every candidate in the chain failed. Failures are kept in candidate order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("all {} candidate models failed", .failures.len())]
pub struct AggregateFailure {
    pub failures: Vec<ProviderError>,
}

impl AggregateFailure {
    /// One line per candidate: `candidate: Kind (detail)`.
    pub fn details(&self) -> String {
        self.failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn kinds(&self) -> Vec<(&str, ProviderErrorKind)> {
        self.failures
            .iter()
            .map(|f| (f.candidate.as_str(), f.kind))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("a question is already being answered")]
    Busy,

    #[error(transparent)]
    Exhausted(#[from] AggregateFailure),

    #[error(transparent)]
    Document(#[from] ExtractError),
}

impl From<AssembleError> for ChatError {
    fn from(err: AssembleError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl ChatError {
    /// Message safe to show to the end user and to store in the chat log.
    /// Config errors do not echo which credential is missing.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::Config(_) => "the service is not configured to reach any model".to_string(),
            Self::Busy => "please wait for the current answer before asking again".to_string(),
            Self::Exhausted(agg) => {
                let kinds: Vec<String> = agg
                    .failures
                    .iter()
                    .map(|f| format!("{}: {}", f.candidate, f.kind))
                    .collect();
                format!("{agg} ({})", kinds.join(", "))
            }
            Self::Document(e) => e.to_string(),
        }
    }
}
