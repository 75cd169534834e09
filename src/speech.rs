//! Voice input contract.
//!
//! Recognition itself happens outside this crate (browser, OS service, a
//! separate model). A recognizer is seen only as a [`SpeechCapture`]: it can
//! be started, yielding a stream of transcript events, and stopped. The chat
//! core takes question text from it and never submits on its own.

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::stream::{self, BoxStream, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    pub text: String,
    /// Interim hypotheses are false; the recognizer's settled result is true.
    pub is_final: bool,
}

pub type TranscriptStream = BoxStream<'static, TranscriptEvent>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("speech capture is already running")]
    AlreadyRunning,
}

pub trait SpeechCapture: Send + Sync {
    fn start(&self) -> Result<TranscriptStream, CaptureError>;

    /// End the current capture. The stream returned by `start` terminates.
    fn stop(&self);
}

/// First final, non-empty transcript, trimmed. None if the stream ends
/// without one.
pub async fn next_question(stream: &mut TranscriptStream) -> Option<String> {
    while let Some(event) = stream.next().await {
        let text = event.text.trim();
        if event.is_final && !text.is_empty() {
            return Some(text.to_string());
        }
    }
    None
}

/// Sending half handed to whatever produces transcripts.
#[derive(Clone)]
pub struct TranscriptFeed {
    tx: mpsc::UnboundedSender<TranscriptEvent>,
}

impl TranscriptFeed {
    /// Returns false once the capture side has been dropped.
    pub fn push(&self, text: impl Into<String>, is_final: bool) -> bool {
        self.tx
            .send(TranscriptEvent {
                text: text.into(),
                is_final,
            })
            .is_ok()
    }
}

/// Capture backed by an in-process channel. Events pushed while no capture
/// is running are delivered on the next `start`.
pub struct ChannelCapture {
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<TranscriptEvent>>>,
    active: Mutex<Option<CancellationToken>>,
}

impl ChannelCapture {
    pub fn new() -> (Self, TranscriptFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let capture = Self {
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
            active: Mutex::new(None),
        };
        (capture, TranscriptFeed { tx })
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_cancelled())
    }
}

impl SpeechCapture for ChannelCapture {
    fn start(&self) -> Result<TranscriptStream, CaptureError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|t| !t.is_cancelled()) {
            return Err(CaptureError::AlreadyRunning);
        }
        let token = CancellationToken::new();
        *active = Some(token.clone());
        tracing::debug!("speech capture started");

        let rx = Arc::clone(&self.rx);
        let events = stream::unfold((rx, token), |(rx, token)| async move {
            let event = {
                let mut guard = rx.lock().await;
                tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    ev = guard.recv() => ev,
                }
            };
            event.map(|ev| (ev, (rx, token)))
        });
        Ok(events.boxed())
    }

    fn stop(&self) {
        if let Some(token) = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            token.cancel();
            tracing::debug!("speech capture stopped");
        }
    }
}
