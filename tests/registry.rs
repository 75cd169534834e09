use std::collections::HashMap;
use std::time::{Duration, Instant};

use pdf_chat::dispatch::registry::{ApiFormat, ModelEntry, Registry};
use pdf_chat::dispatch::{CompletionBackend, ProviderRequest, SamplingParams};
use pdf_chat::error::ProviderErrorKind;

fn model(id: &str, key: Option<&str>) -> ModelEntry {
    ModelEntry {
        model_id: id.to_string(),
        provider: "test".to_string(),
        api_format: ApiFormat::OpenAi,
        base_url: "http://127.0.0.1:1/v1/chat/completions".to_string(),
        api_key: key.map(str::to_string),
    }
}

fn registry() -> Registry {
    let models: HashMap<String, ModelEntry> = [
        ("gemini-2.5-flash", model("gemini-2.5-flash", Some("k"))),
        ("gemini-2.0-flash", model("gemini-2.0-flash", Some("  "))),
        ("openai/gpt-5", model("openai/gpt-5", None)),
    ]
    .into_iter()
    .map(|(name, entry)| (name.to_string(), entry))
    .collect();
    Registry::new(models)
}

#[test]
fn availability_requires_a_non_blank_key() {
    let reg = registry();
    assert!(reg.is_available("gemini-2.5-flash"));
    assert!(!reg.is_available("gemini-2.0-flash"));
    assert!(!reg.is_available("openai/gpt-5"));
    assert!(!reg.is_available("unknown"));
}

#[test]
fn models_are_listed_by_name() {
    let reg = registry();
    let names: Vec<&str> = reg.list_models().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["gemini-2.0-flash", "gemini-2.5-flash", "openai/gpt-5"]);
    assert!(reg.get("openai/gpt-5").is_some());
}

#[test]
fn suggestions_match_substrings() {
    let reg = registry();
    assert_eq!(
        reg.suggest_models("flash"),
        vec!["gemini-2.0-flash", "gemini-2.5-flash"]
    );
    assert!(reg.suggest_models("  ").is_empty());
}

#[tokio::test]
async fn unknown_candidate_is_invalid_request_with_suggestions() {
    let req = ProviderRequest {
        system_prompt: String::new(),
        prompt: "q".to_string(),
        sampling: SamplingParams::default(),
        deadline: Instant::now() + Duration::from_secs(5),
    };

    let err = registry().complete("gpt-5", &req).await.unwrap_err();

    assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);
    assert_eq!(err.candidate, "gpt-5");
    assert!(err.detail.contains("Did you mean: openai/gpt-5"), "{}", err.detail);
}

#[tokio::test]
async fn known_candidate_without_key_is_auth_error() {
    let req = ProviderRequest {
        system_prompt: String::new(),
        prompt: "q".to_string(),
        sampling: SamplingParams::default(),
        deadline: Instant::now() + Duration::from_secs(5),
    };

    let err = registry().complete("openai/gpt-5", &req).await.unwrap_err();
    assert_eq!(err.kind, ProviderErrorKind::AuthError);
}
