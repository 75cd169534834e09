use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::dispatch::http::HttpDispatch;
use crate::dispatch::{CompletionBackend, ProviderRequest, ProviderResult};
use crate::error::{ProviderError, ProviderErrorKind};

/// Wire format spoken by an HTTP backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    /// OpenAI-compatible chat completions (OpenRouter, OpenAI, local servers).
    #[default]
    OpenAi,
    /// Google Gemini `generateContent`.
    Gemini,
}

#[derive(Clone)]
pub struct ModelEntry {
    /// Model identifier sent to the provider (e.g. "openai/gpt-5").
    pub model_id: String,
    pub provider: String,
    pub api_format: ApiFormat,
    pub base_url: String,
    /// None when the credential is missing from the environment.
    pub api_key: Option<String>,
}

impl ModelEntry {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl std::fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEntry")
            .field("model_id", &self.model_id)
            .field("provider", &self.provider)
            .field("api_format", &self.api_format)
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                &if self.api_key.is_some() {
                    "[REDACTED]"
                } else {
                    "[MISSING]"
                },
            )
            .finish()
    }
}

/// Candidate name → model entry, plus the HTTP client that serves them.
pub struct Registry {
    models: HashMap<String, ModelEntry>,
    http: HttpDispatch,
}

impl Registry {
    pub fn new(models: HashMap<String, ModelEntry>) -> Self {
        Self {
            models,
            http: HttpDispatch::new(),
        }
    }

    pub fn get(&self, candidate: &str) -> Option<&ModelEntry> {
        self.models.get(candidate)
    }

    pub fn list_models(&self) -> Vec<(&String, &ModelEntry)> {
        let mut models: Vec<_> = self.models.iter().collect();
        models.sort_by(|a, b| a.0.cmp(b.0));
        models
    }

    /// Suggest similar model names for a failed lookup (substring match).
    /// Sorted alphabetically, capped at 5 to keep error messages readable.
    pub fn suggest_models(&self, query: &str) -> Vec<String> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return vec![];
        }
        let mut suggestions: Vec<String> = self
            .models
            .keys()
            .filter(|k| {
                let k_lower = k.to_lowercase();
                k_lower.contains(&q) || q.contains(&k_lower)
            })
            .cloned()
            .collect();
        suggestions.sort();
        suggestions.truncate(5);
        suggestions
    }
}

#[async_trait]
impl CompletionBackend for Registry {
    async fn complete(
        &self,
        candidate: &str,
        req: &ProviderRequest,
    ) -> Result<ProviderResult, ProviderError> {
        let entry = self.models.get(candidate).ok_or_else(|| {
            let suggestions = self.suggest_models(candidate);
            let detail = if suggestions.is_empty() {
                format!("model not found: {candidate}")
            } else {
                format!(
                    "model not found: {candidate}. Did you mean: {}?",
                    suggestions.join(", ")
                )
            };
            ProviderError::new(candidate, ProviderErrorKind::InvalidRequest, detail)
        })?;

        self.http.query_model(req, candidate, entry).await
    }

    fn is_available(&self, candidate: &str) -> bool {
        self.models
            .get(candidate)
            .is_some_and(ModelEntry::is_configured)
    }
}
