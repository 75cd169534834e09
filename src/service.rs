use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::{Config, DocumentConfig};
use crate::context;
use crate::dispatch::{CompletionBackend, SamplingParams};
use crate::document::{Document, ExtractedText};
use crate::error::ChatError;
use crate::gateway::{Completion, CompletionRequest, Gateway};
use crate::session::{ChatMessage, Session};

/// Reply stored when a question is abandoned before its answer arrives.
const ABANDONED_REPLY: &str = "Error fetching answer: the request was cancelled. Try again.";

/// What the caller learns about an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub name: Option<String>,
    pub pages_processed: usize,
    pub total_pages: usize,
    pub characters: usize,
}

/// Point-in-time copy of the session for read-only callers.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub document: Option<UploadSummary>,
    pub messages: Vec<ChatMessage>,
    pub in_flight: bool,
}

/// Ties the pipeline together for one session: upload → extract, and
/// question → assemble → gateway → chat log.
pub struct ChatService {
    session: Arc<Mutex<Session>>,
    gateway: Gateway,
    document: DocumentConfig,
    candidates: Vec<String>,
    sampling: SamplingParams,
}

impl ChatService {
    pub fn new(config: &Config, backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::new())),
            gateway: Gateway::new(backend, config.gateway.attempt_timeout()),
            document: config.document.clone(),
            candidates: config.gateway.candidates.clone(),
            sampling: config.gateway.sampling,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Extract the document and make it current. CPU-bound; async callers
    /// should run it on the blocking pool. On failure the previous document
    /// stays in place.
    pub fn upload(
        &self,
        name: Option<String>,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadSummary, ChatError> {
        let mut document = Document::new(name.clone(), mime, bytes);
        let size = document.size();
        let summary = summarize(name, document.extract(self.document.limits())?);

        tracing::info!(
            name = summary.name.as_deref().unwrap_or("-"),
            size,
            pages = summary.pages_processed,
            chars = summary.characters,
            "document extracted"
        );

        self.lock().set_document(document);
        Ok(summary)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.lock();
        SessionSnapshot {
            document: session.document().and_then(|d| {
                d.extracted()
                    .map(|e| summarize(d.name().map(str::to_string), e))
            }),
            messages: session.chat().messages().to_vec(),
            in_flight: session.is_in_flight(),
        }
    }

    /// Ceiling on uploaded document size, in bytes.
    pub fn max_document_bytes(&self) -> usize {
        self.document.max_bytes
    }

    /// Empty the chat log. Refused with `Busy` while a question is pending,
    /// so its reply cannot land in a log that lost the question.
    pub fn clear_messages(&self) -> Result<(), ChatError> {
        self.lock().clear_chat()?;
        tracing::debug!("chat log cleared");
        Ok(())
    }

    /// Answer one question.
    ///
    /// `context` replaces the session document text when given (for callers
    /// that extracted text themselves). Validation, busy and config errors
    /// are returned before anything is logged or sent. Once accepted, the
    /// chat log gets the question and exactly one reply.
    pub async fn ask(
        &self,
        question: &str,
        context: Option<&str>,
    ) -> Result<Completion, ChatError> {
        let request = {
            let mut session = self.lock();
            let text = match context {
                Some(text) => text,
                None => session.document_text().unwrap_or_default(),
            };
            let prompt = context::assemble(text, self.document.max_context_chars, question)?;
            self.gateway.check_ready(&self.candidates)?;
            session.begin_question(prompt.question())?;

            if prompt.truncated() {
                tracing::debug!(
                    cap = self.document.max_context_chars,
                    "document text truncated for prompt"
                );
            }

            CompletionRequest {
                prompt,
                candidates: self.candidates.clone(),
                sampling: self.sampling,
            }
        };

        let pending = PendingReply {
            session: Arc::clone(&self.session),
            done: false,
        };

        let result = self.gateway.complete(&request).await;

        let reply = match &result {
            Ok(completion) => completion.answer.clone(),
            Err(e) => format!("Error fetching answer: {}. Try again.", e.user_message()),
        };
        pending.finish(reply);

        result
    }
}

fn summarize(name: Option<String>, extracted: &ExtractedText) -> UploadSummary {
    UploadSummary {
        name,
        pages_processed: extracted.pages_processed,
        total_pages: extracted.total_pages,
        characters: extracted.text.chars().count(),
    }
}

/// Makes sure an accepted question always gets its reply, even when the
/// future awaiting the gateway is dropped.
struct PendingReply {
    session: Arc<Mutex<Session>>,
    done: bool,
}

impl PendingReply {
    fn finish(mut self, reply: String) {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .finish_question(reply);
        self.done = true;
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if !self.done {
            tracing::warn!("question abandoned before an answer arrived");
            self.session
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .finish_question(ABANDONED_REPLY);
        }
    }
}
