//! Provider response normalization.
//!
//! Backends disagree on where the answer lives and how errors are reported.
//! Everything here maps those shapes onto [`ProviderErrorKind`] and a plain
//! answer string so the gateway never looks at provider JSON itself.

use reqwest::StatusCode;
use serde_json::Value;

use crate::error::ProviderErrorKind;

/// Answer field paths (JSON pointers), tried in order. The first one holding
/// a non-empty string wins.
///
/// 1. OpenAI-compatible chat completions (canonical)
/// 2. Gemini `generateContent`
/// 3. legacy text completions
/// 4. responses-style `output_text`
pub const ANSWER_PATHS: &[&str] = &[
    "/choices/0/message/content",
    "/candidates/0/content/parts/0/text",
    "/choices/0/text",
    "/output_text",
];

/// Error message paths inside a provider error payload, tried in order.
const ERROR_DETAIL_PATHS: &[&str] = &["/error/message", "/error", "/message", "/detail"];

/// Raw error bodies longer than this are cut before being surfaced.
const MAX_DETAIL_CHARS: usize = 300;

/// Extract the answer text from a successful response body.
pub fn extract_answer(body: &Value) -> Option<String> {
    ANSWER_PATHS
        .iter()
        .filter_map(|path| body.pointer(path))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// HTTP status to failure class.
pub fn classify_status(status: StatusCode) -> ProviderErrorKind {
    match status.as_u16() {
        400 => ProviderErrorKind::InvalidRequest,
        401 | 403 => ProviderErrorKind::AuthError,
        429 => ProviderErrorKind::RateLimited,
        _ => ProviderErrorKind::UnknownProviderError,
    }
}

/// Transport failure (no HTTP status) to failure class.
pub fn classify_transport(err: &reqwest::Error) -> ProviderErrorKind {
    if err.is_timeout() {
        ProviderErrorKind::Timeout
    } else {
        ProviderErrorKind::UnknownProviderError
    }
}

/// Human-readable detail from a provider error body. Falls back to the raw
/// body text when it is not JSON or has no recognised message field.
pub fn error_detail(body: &[u8]) -> String {
    if let Ok(json) = serde_json::from_slice::<Value>(body)
        && let Some(msg) = json_error_message(&json)
    {
        return msg;
    }

    let raw = String::from_utf8_lossy(body);
    let raw = raw.trim();
    if raw.is_empty() {
        return "no error detail from provider".to_string();
    }
    let cut: String = raw.chars().take(MAX_DETAIL_CHARS).collect();
    if cut.len() < raw.len() {
        format!("{cut}...")
    } else {
        cut
    }
}

/// Some providers answer 200 with an `error` object in the body
/// (OpenRouter does this for upstream failures). Returns the failure
/// class and message if so.
pub fn body_error(body: &Value) -> Option<(ProviderErrorKind, String)> {
    let error = body.get("error")?;
    if error.is_null() {
        return None;
    }
    let kind = error
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|c| u16::try_from(c).ok())
        .and_then(|c| StatusCode::from_u16(c).ok())
        .map(classify_status)
        .unwrap_or(ProviderErrorKind::UnknownProviderError);
    let detail = json_error_message(body).unwrap_or_else(|| error.to_string());
    Some((kind, detail))
}

/// Why a 200 response carried no answer, when the provider says so.
pub fn missing_answer_detail(body: &Value) -> String {
    let reason = body
        .pointer("/promptFeedback/blockReason")
        .or_else(|| body.pointer("/candidates/0/finishReason"))
        .or_else(|| body.pointer("/choices/0/finish_reason"))
        .and_then(Value::as_str);
    match reason {
        Some(r) => format!("no answer text in response (reason: {r})"),
        None => "no answer text in response".to_string(),
    }
}

fn json_error_message(json: &Value) -> Option<String> {
    ERROR_DETAIL_PATHS
        .iter()
        .filter_map(|path| json.pointer(path))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}
