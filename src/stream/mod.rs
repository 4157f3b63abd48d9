pub mod decoder;
pub mod forwarder;
pub mod session;
pub mod splitter;

pub use decoder::{decode_frame, Delta, DeltaBatch};
pub use forwarder::{error_then_done_response, relay_stream_response};
pub use session::{FinalizedStream, StreamSession};
pub use splitter::{FrameBatch, FrameSplitter};

use bytes::Bytes;

use crate::util::push_json_string_escaped;

/// Pre-encoded frame for [`StreamEvent::Done`], the most common event.
pub(crate) const DONE_EVENT_FRAME: &str = "data: {\"type\":\"done\"}\n\n";

/// A client-facing stream event.
///
/// The browser protocol is one SSE frame per event, `data: {json}\n\n`, with
/// a `type` discriminator. `done` closes every stream exactly once; `error`
/// reports an upstream failure in-band and is always followed by `done`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Visible answer text.
    ContentDelta(String),
    /// Model reasoning text, interleaved ahead of the answer it leads to.
    ReasoningDelta(String),
    /// Upstream failure surfaced through the event channel.
    Error { message: String },
    /// Terminal marker.
    Done,
}

impl StreamEvent {
    /// Whether this event ends the stream. Only `done` terminates; an
    /// `error` event is followed by its own `done`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done)
    }

    /// Encode this event as a complete SSE frame.
    #[must_use]
    pub fn encode_sse(&self) -> Bytes {
        match self {
            StreamEvent::ContentDelta(delta) => delta_frame("content_delta", delta),
            StreamEvent::ReasoningDelta(delta) => delta_frame("reasoning_delta", delta),
            StreamEvent::Error { message } => {
                let mut out = String::with_capacity(40 + message.len());
                out.push_str("data: {\"type\":\"error\",\"message\":");
                push_json_string_escaped(&mut out, message);
                out.push_str("}\n\n");
                Bytes::from(out)
            }
            StreamEvent::Done => Bytes::from_static(DONE_EVENT_FRAME.as_bytes()),
        }
    }
}

fn delta_frame(kind: &str, delta: &str) -> Bytes {
    let mut out = String::with_capacity(28 + kind.len() + delta.len());
    out.push_str("data: {\"type\":\"");
    out.push_str(kind);
    out.push_str("\",\"delta\":");
    push_json_string_escaped(&mut out, delta);
    out.push_str("}\n\n");
    Bytes::from(out)
}
