use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::{Value, json};

use crate::dispatch::registry::{ApiFormat, ModelEntry};
use crate::dispatch::{ProviderRequest, ProviderResult};
use crate::error::{ProviderError, ProviderErrorKind};
use crate::normalize;

const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024; // 2MB

pub struct HttpDispatch {
    client: Client,
}

impl Default for HttpDispatch {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpDispatch {
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()
            .expect("failed to build HTTP client");

        Self { client }
    }

    /// One attempt against one configured model. Every failure is already
    /// classified into the canonical taxonomy on return.
    pub async fn query_model(
        &self,
        req: &ProviderRequest,
        candidate: &str,
        entry: &ModelEntry,
    ) -> Result<ProviderResult, ProviderError> {
        let fail = |kind: ProviderErrorKind, detail: String| {
            ProviderError::new(candidate, kind, detail)
        };

        let api_key = entry
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                fail(
                    ProviderErrorKind::AuthError,
                    format!("no API key configured for provider {}", entry.provider),
                )
            })?;

        // Check for expired deadline before making the request
        let timeout = req
            .deadline
            .checked_duration_since(Instant::now())
            .filter(|d| *d > Duration::from_millis(100))
            .ok_or_else(|| ProviderError::timeout(candidate, 0))?;

        let builder = match entry.api_format {
            ApiFormat::OpenAi => self
                .client
                .post(&entry.base_url)
                .header("Authorization", format!("Bearer {api_key}"))
                .json(&openai_body(&entry.model_id, req)),
            ApiFormat::Gemini => self
                .client
                .post(gemini_url(&entry.base_url, &entry.model_id))
                .header("x-goog-api-key", api_key)
                .json(&gemini_body(req)),
        };

        let response = builder
            .header("Content-Type", "application/json")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| fail(normalize::classify_transport(&e), transport_detail(&e)))?;

        let status = response.status();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fail(normalize::classify_transport(&e), transport_detail(&e)))?;

        if !status.is_success() {
            // Cap error body reads to prevent memory exhaustion
            let truncated = &bytes[..bytes.len().min(MAX_RESPONSE_BYTES)];
            let detail = normalize::error_detail(truncated);
            tracing::debug!(candidate, %status, "provider returned error status");
            return Err(fail(
                normalize::classify_status(status),
                format!("{status}: {detail}"),
            ));
        }

        if bytes.len() > MAX_RESPONSE_BYTES {
            return Err(fail(
                ProviderErrorKind::UnknownProviderError,
                format!(
                    "response too large: {} bytes (max {})",
                    bytes.len(),
                    MAX_RESPONSE_BYTES
                ),
            ));
        }

        let body: Value = serde_json::from_slice(&bytes).map_err(|e| {
            fail(
                ProviderErrorKind::UnknownProviderError,
                format!("failed to parse response: {e}"),
            )
        })?;

        if let Some((kind, detail)) = normalize::body_error(&body) {
            return Err(fail(kind, detail));
        }

        let text = normalize::extract_answer(&body).ok_or_else(|| {
            fail(
                ProviderErrorKind::UnknownProviderError,
                normalize::missing_answer_detail(&body),
            )
        })?;

        Ok(ProviderResult {
            text,
            model: entry.model_id.clone(),
            provider: entry.provider.clone(),
        })
    }
}

fn openai_body(model_id: &str, req: &ProviderRequest) -> Value {
    json!({
        "model": model_id,
        "messages": [
            {"role": "system", "content": req.system_prompt},
            {"role": "user", "content": req.prompt},
        ],
        "temperature": req.sampling.temperature,
        "top_p": req.sampling.top_p,
        "max_tokens": req.sampling.max_output_tokens,
    })
}

fn gemini_body(req: &ProviderRequest) -> Value {
    json!({
        "systemInstruction": {"parts": [{"text": req.system_prompt}]},
        "contents": [{"role": "user", "parts": [{"text": req.prompt}]}],
        "generationConfig": {
            "temperature": req.sampling.temperature,
            "topK": req.sampling.top_k,
            "topP": req.sampling.top_p,
            "maxOutputTokens": req.sampling.max_output_tokens,
        },
    })
}

/// `{base}/{model}:generateContent`, tolerating a trailing slash on base.
pub fn gemini_url(base_url: &str, model_id: &str) -> String {
    format!("{}/{model_id}:generateContent", base_url.trim_end_matches('/'))
}

/// Transport errors can embed the request URL; keep only the error class.
fn transport_detail(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection to provider failed".to_string()
    } else if err.is_body() || err.is_decode() {
        "failed to read response body".to_string()
    } else {
        "request to provider failed".to_string()
    }
}
