mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use pdf_chat::context::assemble;
use pdf_chat::dispatch::SamplingParams;
use pdf_chat::error::{ChatError, ProviderErrorKind};
use pdf_chat::gateway::{AttemptOutcome, CompletionRequest, Gateway};

use common::{MockBackend, Reply};

fn request(candidates: &[&str]) -> CompletionRequest {
    CompletionRequest {
        prompt: assemble("The capital of France is Paris.", 12_000, "What is the capital?")
            .unwrap(),
        candidates: candidates.iter().map(|c| c.to_string()).collect(),
        sampling: SamplingParams::default(),
    }
}

fn gateway(backend: &Arc<MockBackend>, timeout: Duration) -> Gateway {
    Gateway::new(backend.clone(), timeout)
}

// ---------------------------------------------------------------------------
// Fallback order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn first_success_halts_the_chain() {
    let backend = Arc::new(MockBackend::new(&[
        ("a", Reply::Fail(ProviderErrorKind::RateLimited, "429 Too Many Requests")),
        ("b", Reply::Answer("x")),
        ("c", Reply::Answer("never")),
    ]));
    let gw = gateway(&backend, Duration::from_secs(1));

    let completion = gw.complete(&request(&["a", "b", "c"])).await.unwrap();

    assert_eq!(completion.candidate, "b");
    assert_eq!(completion.answer, "x");
    assert_eq!(backend.calls(), vec!["a", "b"], "c must never be attempted");
    assert_eq!(completion.attempts.len(), 2);
    assert!(matches!(
        &completion.attempts[0].outcome,
        AttemptOutcome::Failure(e) if e.kind == ProviderErrorKind::RateLimited
    ));
}

#[tokio::test]
async fn exhausted_chain_reports_every_candidate_in_order() {
    let backend = Arc::new(MockBackend::new(&[
        ("a", Reply::Fail(ProviderErrorKind::InvalidRequest, "bad")),
        ("b", Reply::Fail(ProviderErrorKind::AuthError, "401")),
        ("c", Reply::Fail(ProviderErrorKind::UnknownProviderError, "500")),
    ]));
    let gw = gateway(&backend, Duration::from_secs(1));

    let err = gw.complete(&request(&["c", "a", "b"])).await.unwrap_err();

    let agg = match err {
        ChatError::Exhausted(agg) => agg,
        other => panic!("expected aggregate failure, got {other:?}"),
    };
    assert_eq!(
        agg.kinds(),
        vec![
            ("c", ProviderErrorKind::UnknownProviderError),
            ("a", ProviderErrorKind::InvalidRequest),
            ("b", ProviderErrorKind::AuthError),
        ]
    );
    assert_eq!(backend.calls(), vec!["c", "a", "b"]);
    assert!(agg.details().contains("a: InvalidRequest (bad)"));
}

#[tokio::test]
async fn blank_answer_counts_as_failure() {
    let backend = Arc::new(MockBackend::new(&[
        ("a", Reply::Answer("   \n")),
        ("b", Reply::Answer("real answer")),
    ]));
    let gw = gateway(&backend, Duration::from_secs(1));

    let completion = gw.complete(&request(&["a", "b"])).await.unwrap();

    assert_eq!(completion.candidate, "b");
    assert!(matches!(
        &completion.attempts[0].outcome,
        AttemptOutcome::Failure(e) if e.kind == ProviderErrorKind::UnknownProviderError
    ));
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn hung_candidate_times_out_and_chain_moves_on() {
    let backend = Arc::new(MockBackend::new(&[
        ("slow", Reply::Hang),
        ("fast", Reply::Answer("done")),
    ]));
    let gw = gateway(&backend, Duration::from_millis(50));

    let start = Instant::now();
    let completion = gw.complete(&request(&["slow", "fast"])).await.unwrap();

    assert_eq!(completion.candidate, "fast");
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(matches!(
        &completion.attempts[0].outcome,
        AttemptOutcome::Failure(e) if e.kind == ProviderErrorKind::Timeout
    ));
    // one attempt per candidate, no retry of the slow one
    assert_eq!(backend.calls(), vec!["slow", "fast"]);
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn no_configured_candidate_is_a_config_error_without_attempts() {
    let backend = Arc::new(
        MockBackend::new(&[("a", Reply::Answer("x"))]).without_credentials(&["a", "b"]),
    );
    let gw = gateway(&backend, Duration::from_secs(1));

    let err = gw.complete(&request(&["a", "b"])).await.unwrap_err();

    assert!(matches!(err, ChatError::Config(_)), "got {err:?}");
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn empty_candidate_list_is_a_config_error() {
    let backend = Arc::new(MockBackend::default());
    let gw = gateway(&backend, Duration::from_secs(1));

    let err = gw.complete(&request(&[])).await.unwrap_err();
    assert!(matches!(err, ChatError::Config(_)), "got {err:?}");
}

#[tokio::test]
async fn long_candidate_list_is_walked_to_the_end() {
    let names: Vec<String> = (0..30).map(|i| format!("m{i}")).collect();
    // Only the last one is scripted to answer.
    let backend = Arc::new(MockBackend::new(&[("m29", Reply::Answer("last"))]));
    let gw = gateway(&backend, Duration::from_secs(1));
    let req = CompletionRequest {
        candidates: names,
        ..request(&[])
    };

    let completion = gw.complete(&req).await.unwrap();

    assert_eq!(completion.candidate, "m29");
    assert_eq!(backend.calls().len(), 30);
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

#[tokio::test]
async fn same_request_yields_same_selection_and_classification() {
    let backend = Arc::new(MockBackend::new(&[
        ("a", Reply::Fail(ProviderErrorKind::RateLimited, "slow down")),
        ("b", Reply::Answer("x")),
    ]));
    let gw = gateway(&backend, Duration::from_secs(1));
    let req = request(&["a", "b"]);

    let first = gw.complete(&req).await.unwrap();
    let second = gw.complete(&req).await.unwrap();

    assert_eq!(first.candidate, second.candidate);
    assert_eq!(first.answer, second.answer);
    let kinds = |c: &pdf_chat::gateway::Completion| -> Vec<AttemptOutcome> {
        c.attempts.iter().map(|a| a.outcome.clone()).collect()
    };
    assert_eq!(kinds(&first), kinds(&second));
}

#[tokio::test]
async fn every_attempt_receives_the_same_prompt() {
    let backend = Arc::new(MockBackend::new(&[
        ("a", Reply::Fail(ProviderErrorKind::Timeout, "t")),
        ("b", Reply::Answer("x")),
    ]));
    let gw = gateway(&backend, Duration::from_secs(1));
    let req = request(&["a", "b"]);

    gw.complete(&req).await.unwrap();

    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], prompts[1]);
    assert_eq!(prompts[0], req.prompt.text());
}
