//! Per-stream accumulation of deltas into a finished message.
//!
//! One [`StreamSession`] tracks one logical stream at a time: `start` hands
//! out the stream's cancellation token, `apply` folds events into the
//! content and reasoning buffers, and `finalize` takes the accumulated text
//! for persistence. Starting a new stream cancels the previous one, so
//! deltas from two streams never mix.

use tokio_util::sync::CancellationToken;

use crate::stream::StreamEvent;

/// The accumulated result of a finished stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedStream {
    pub content: String,
    /// `None` when the model emitted no reasoning.
    pub reasoning_content: Option<String>,
}

#[derive(Debug, Default)]
pub struct StreamSession {
    stream_id: Option<String>,
    streaming: bool,
    content: String,
    reasoning: String,
    error: Option<String>,
    cancel: Option<CancellationToken>,
}

impl StreamSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new stream, cancelling any stream still active.
    ///
    /// Buffers and the error slot are reset; the returned token cancels the
    /// new stream and is the one [`stop`](Self::stop) fires.
    pub fn start(&mut self, stream_id: impl Into<String>) -> CancellationToken {
        if let Some(previous) = self.cancel.take() {
            previous.cancel();
        }
        let token = CancellationToken::new();
        self.stream_id = Some(stream_id.into());
        self.streaming = true;
        self.content.clear();
        self.reasoning.clear();
        self.error = None;
        self.cancel = Some(token.clone());
        token
    }

    /// Fold one event into the session. Ignored when no stream is active.
    ///
    /// `done` mutates nothing; completion is the caller's explicit
    /// [`finalize`](Self::finalize).
    pub fn apply(&mut self, event: &StreamEvent) {
        if !self.streaming {
            return;
        }
        match event {
            StreamEvent::ContentDelta(delta) => self.content.push_str(delta),
            StreamEvent::ReasoningDelta(delta) => self.reasoning.push_str(delta),
            StreamEvent::Error { message } => {
                self.error = Some(message.clone());
                self.streaming = false;
            }
            StreamEvent::Done => {}
        }
    }

    /// Cancel the active stream without touching the buffers.
    ///
    /// The partial text stays available for a follow-up
    /// [`finalize`](Self::finalize).
    pub fn stop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        self.streaming = false;
    }

    /// Take the accumulated text and reset the session.
    ///
    /// Empty reasoning maps to `None`. Calling again without new deltas
    /// returns an empty result.
    pub fn finalize(&mut self) -> FinalizedStream {
        self.streaming = false;
        self.stream_id = None;
        self.cancel = None;
        let content = std::mem::take(&mut self.content);
        let reasoning = std::mem::take(&mut self.reasoning);
        FinalizedStream {
            content,
            reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
        }
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    #[must_use]
    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    /// Partial content accumulated so far.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Partial reasoning accumulated so far.
    #[must_use]
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// The message of the last in-stream `error` event, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
