use serde::Serialize;

use crate::document::Document;
use crate::error::ChatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    pub index: usize,
}

/// Append-only chat log. Messages are never edited or removed one by one;
/// the whole log can be cleared.
#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, sender: Sender, text: impl Into<String>) -> &ChatMessage {
        let index = self.messages.len();
        self.messages.push(ChatMessage {
            sender,
            text: text.into(),
            index,
        });
        &self.messages[index]
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Everything one user interaction owns: the current document, the chat log
/// and whether a question is awaiting its answer.
#[derive(Debug, Default)]
pub struct Session {
    document: Option<Document>,
    chat: ChatSession,
    in_flight: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current document. Chat history is kept.
    pub fn set_document(&mut self, document: Document) {
        self.document = Some(document);
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Extracted text of the current document, if any.
    pub fn document_text(&self) -> Option<&str> {
        self.document.as_ref().and_then(Document::text)
    }

    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    /// Clear the chat log. Not allowed while a question is outstanding.
    pub fn clear_chat(&mut self) -> Result<(), ChatError> {
        if self.in_flight {
            return Err(ChatError::Busy);
        }
        self.chat.clear();
        Ok(())
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Record the user's question and mark the session busy.
    /// Only one question may be outstanding at a time.
    pub fn begin_question(&mut self, question: &str) -> Result<(), ChatError> {
        if self.in_flight {
            return Err(ChatError::Busy);
        }
        self.in_flight = true;
        self.chat.append(Sender::User, question);
        Ok(())
    }

    /// Record the assistant-side reply (answer or failure text) and clear the
    /// busy flag. Does nothing when no question is outstanding, so each
    /// question gets exactly one reply.
    pub fn finish_question(&mut self, reply: impl Into<String>) -> bool {
        if !self.in_flight {
            return false;
        }
        self.chat.append(Sender::Assistant, reply);
        self.in_flight = false;
        true
    }
}
