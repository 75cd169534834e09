use thiserror::Error;

/// Default number of document characters embedded in a prompt.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 12_000;

/// Sent alongside every prompt as the system instruction.
pub const SYSTEM_PROMPT: &str =
    "You are a helpful assistant that answers questions about documents.";

/// The reply the model is told to give when the content has no answer.
pub const NOT_FOUND_REPLY: &str = "I could not find the answer in the document.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("no document text available; upload a document first")]
    EmptyContext,
}

/// A prompt ready to send to a candidate. The question is always the last
/// line of `text` and is never truncated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    context: String,
    question: String,
    text: String,
    truncated: bool,
}

impl Prompt {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn system(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    /// The document slice embedded in the prompt.
    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    /// True when the document text was longer than the cap.
    pub fn truncated(&self) -> bool {
        self.truncated
    }
}

/// Validate question non-empty (after trimming).
pub fn validate_question(question: &str) -> Result<&str, AssembleError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(AssembleError::EmptyQuestion);
    }
    Ok(trimmed)
}

/// First `cap` characters of `text`. Cuts on a char boundary, never inside a
/// multi-byte sequence.
pub fn truncate_chars(text: &str, cap: usize) -> &str {
    match text.char_indices().nth(cap) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Build the prompt from document text and question.
///
/// The document is cut to its first `cap` characters; the tail is dropped.
/// Fails before any network work if either input is empty.
pub fn assemble(text: &str, cap: usize, question: &str) -> Result<Prompt, AssembleError> {
    let question = validate_question(question)?;
    if text.trim().is_empty() {
        return Err(AssembleError::EmptyContext);
    }

    let context = truncate_chars(text, cap);
    let truncated = context.len() < text.len();

    let rendered = format!(
        "You are an assistant that answers questions using only the document content below.\n\
         Do not use outside knowledge. If the answer cannot be found in the content, \
         reply exactly: \"{NOT_FOUND_REPLY}\"\n\
         \n\
         Document content:\n\
         \"\"\"\n\
         {context}\n\
         \"\"\"\n\
         \n\
         Question: {question}"
    );

    Ok(Prompt {
        context: context.to_string(),
        question: question.to_string(),
        text: rendered,
        truncated,
    })
}
