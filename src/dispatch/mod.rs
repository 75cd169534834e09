pub mod http;
pub mod registry;

use std::time::Instant;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ProviderError;

/// Sampling parameters, fixed per deployment and sent unchanged to every
/// candidate attempt.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// 0 = deterministic, 2 = most random.
    pub temperature: f64,
    /// Only honoured by the Gemini API format.
    pub top_k: u32,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        }
    }
}

impl SamplingParams {
    pub fn validate(&self) -> Result<(), String> {
        let t = self.temperature;
        if t.is_nan() || t.is_infinite() || !(0.0..=2.0).contains(&t) {
            return Err(format!("temperature must be between 0.0 and 2.0, got {t}"));
        }
        let p = self.top_p;
        if p.is_nan() || !(0.0..=1.0).contains(&p) {
            return Err(format!("top_p must be between 0.0 and 1.0, got {p}"));
        }
        if self.max_output_tokens == 0 {
            return Err("max_output_tokens must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Internal request type handed to a backend for one attempt.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub system_prompt: String,
    pub prompt: String,
    pub sampling: SamplingParams,
    /// Attempt must finish before this instant.
    pub deadline: Instant,
}

/// What a backend returns for a successful attempt. `text` is the answer as
/// extracted from the provider payload; the gateway decides whether it is
/// usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResult {
    pub text: String,
    pub model: String,
    pub provider: String,
}

/// One completion backend able to answer for a set of named candidates.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Issue exactly one attempt for `candidate`. Implementations must not
    /// retry internally.
    async fn complete(
        &self,
        candidate: &str,
        req: &ProviderRequest,
    ) -> Result<ProviderResult, ProviderError>;

    /// False when the candidate cannot possibly succeed (unknown, or no
    /// credential configured).
    fn is_available(&self, _candidate: &str) -> bool {
        true
    }
}
