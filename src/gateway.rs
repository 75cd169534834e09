use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::Prompt;
use crate::dispatch::{CompletionBackend, ProviderRequest, SamplingParams};
use crate::error::{AggregateFailure, ChatError, ProviderError, ProviderErrorKind};

/// Default per-attempt timeout.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: Prompt,
    /// Priority order: index 0 is tried first.
    pub candidates: Vec<String>,
    pub sampling: SamplingParams,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success { answer: String },
    Failure(ProviderError),
}

/// Result of the single attempt made against one candidate.
#[derive(Debug, Clone)]
pub struct ModelAttempt {
    pub candidate: String,
    pub outcome: AttemptOutcome,
    pub latency_ms: u64,
}

/// A successful run of the fallback chain.
#[derive(Debug, Clone)]
pub struct Completion {
    /// The first candidate, in priority order, that produced an answer.
    pub candidate: String,
    pub answer: String,
    /// Every attempt made, in order. The last one is the success.
    pub attempts: Vec<ModelAttempt>,
}

/// Sequential fallback across candidates.
///
/// Each candidate gets exactly one attempt, bounded by `attempt_timeout`.
/// Attempt k+1 starts only after attempt k has an outcome. The chain halts
/// on the first non-empty answer; if every attempt fails the caller gets an
/// [`AggregateFailure`] with one entry per candidate, in input order.
pub struct Gateway {
    backend: Arc<dyn CompletionBackend>,
    attempt_timeout: Duration,
}

impl Gateway {
    pub fn new(backend: Arc<dyn CompletionBackend>, attempt_timeout: Duration) -> Self {
        Self {
            backend,
            attempt_timeout,
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Config check that runs before any attempt is made.
    pub fn check_ready(&self, candidates: &[String]) -> Result<(), ChatError> {
        if candidates.is_empty() {
            return Err(ChatError::Config("candidate model list is empty".to_string()));
        }
        if !candidates.iter().any(|c| self.backend.is_available(c)) {
            return Err(ChatError::Config(
                "no candidate model has a configured credential".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn complete(&self, req: &CompletionRequest) -> Result<Completion, ChatError> {
        self.check_ready(&req.candidates)?;

        let mut attempts = Vec::with_capacity(req.candidates.len());

        for candidate in &req.candidates {
            let start = Instant::now();
            let outcome = self.attempt(candidate, req).await;
            let latency_ms = start.elapsed().as_millis() as u64;

            match &outcome {
                AttemptOutcome::Success { .. } => {
                    tracing::info!(candidate = %candidate, latency_ms, "candidate answered");
                }
                AttemptOutcome::Failure(e) => {
                    tracing::warn!(
                        candidate = %candidate,
                        kind = %e.kind,
                        latency_ms,
                        "candidate failed: {}",
                        e.detail
                    );
                }
            }

            let answer = match &outcome {
                AttemptOutcome::Success { answer } => Some(answer.clone()),
                AttemptOutcome::Failure(_) => None,
            };
            attempts.push(ModelAttempt {
                candidate: candidate.clone(),
                outcome,
                latency_ms,
            });

            if let Some(answer) = answer {
                return Ok(Completion {
                    candidate: candidate.clone(),
                    answer,
                    attempts,
                });
            }
        }

        let failures = attempts
            .into_iter()
            .filter_map(|a| match a.outcome {
                AttemptOutcome::Failure(e) => Some(e),
                AttemptOutcome::Success { .. } => None,
            })
            .collect();
        Err(AggregateFailure { failures }.into())
    }

    async fn attempt(&self, candidate: &str, req: &CompletionRequest) -> AttemptOutcome {
        let provider_req = ProviderRequest {
            system_prompt: req.prompt.system().to_string(),
            prompt: req.prompt.text().to_string(),
            sampling: req.sampling,
            deadline: Instant::now() + self.attempt_timeout,
        };

        let result = tokio::time::timeout(
            self.attempt_timeout,
            self.backend.complete(candidate, &provider_req),
        )
        .await;

        match result {
            Err(_) => AttemptOutcome::Failure(ProviderError::timeout(
                candidate,
                self.attempt_timeout.as_millis() as u64,
            )),
            Ok(Err(e)) => AttemptOutcome::Failure(e),
            Ok(Ok(r)) => {
                let answer = r.text.trim();
                if answer.is_empty() {
                    AttemptOutcome::Failure(ProviderError::new(
                        candidate,
                        ProviderErrorKind::UnknownProviderError,
                        "provider returned an empty answer",
                    ))
                } else {
                    AttemptOutcome::Success {
                        answer: answer.to_string(),
                    }
                }
            }
        }
    }
}
