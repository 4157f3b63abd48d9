//! Frame-to-delta decoding for OpenAI-compatible upstream streams.
//!
//! Decoding is total: malformed input is swallowed, never surfaced. A frame
//! that fails any step simply contributes no deltas, and the stream carries
//! on with the next frame.

use serde::Deserialize;
use smallvec::SmallVec;

/// Deltas produced by one [`decode_frame`] call. A single chunk can carry
/// reasoning and content together, so two slots cover the common cases.
pub type DeltaBatch = SmallVec<[Delta; 2]>;

/// The upstream termination sentinel, sent after the `data: ` prefix.
pub(crate) const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data: ";

/// A typed delta decoded from one upstream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    /// Visible answer text.
    Content(String),
    /// Reasoning text the model emits ahead of its answer.
    Reasoning(String),
    /// The upstream reported a failure inside the stream body.
    UpstreamError(String),
    /// The `[DONE]` sentinel.
    Done,
}

/// One streaming chunk from the upstream. Only the fields the relay reads
/// are modeled; everything else is ignored by serde.
#[derive(Debug, Deserialize)]
struct UpstreamChunk {
    #[serde(default)]
    error: Option<UpstreamChunkError>,
    #[serde(default)]
    choices: Vec<UpstreamChoice>,
}

#[derive(Debug, Deserialize)]
struct UpstreamChunkError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamChoice {
    #[serde(default)]
    delta: UpstreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

/// Decode one complete frame into zero, one, or two deltas.
///
/// Cases, in order:
/// 1. `data: [DONE]` emits [`Delta::Done`].
/// 2. `data: {json}` with an `error` payload emits [`Delta::UpstreamError`].
/// 3. `data: {json}` with a first-choice delta emits `reasoning_content`
///    before `content`, skipping empty strings.
/// 4. Anything else (no `data: ` prefix, unparseable JSON, no choices)
///    emits nothing.
#[must_use]
pub fn decode_frame(frame: &str) -> DeltaBatch {
    let mut out = DeltaBatch::new();
    decode_frame_into(frame, &mut out);
    out
}

/// Decode one frame, appending deltas to a caller-provided batch.
pub fn decode_frame_into(frame: &str, out: &mut DeltaBatch) {
    let Some(payload) = frame.strip_prefix(DATA_PREFIX) else {
        return;
    };

    if payload == DONE_SENTINEL {
        out.push(Delta::Done);
        return;
    }

    let Ok(chunk) = serde_json::from_str::<UpstreamChunk>(payload) else {
        return;
    };

    if let Some(error) = chunk.error {
        let message = error
            .message
            .unwrap_or_else(|| String::from("upstream error"));
        out.push(Delta::UpstreamError(message));
        return;
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return;
    };
    if let Some(reasoning) = choice.delta.reasoning_content {
        if !reasoning.is_empty() {
            out.push(Delta::Reasoning(reasoning));
        }
    }
    if let Some(content) = choice.delta.content {
        if !content.is_empty() {
            out.push(Delta::Content(content));
        }
    }
}
