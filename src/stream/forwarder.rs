//! Outbound SSE relay: upstream byte chunks in, client event frames out.
//!
//! The relay is a [`futures_util::stream::unfold`] state machine. Each turn
//! drains one pending encoded frame, or pulls the next upstream chunk, runs
//! it through the splitter and decoder, and translates the deltas into
//! client events. The machine guarantees exactly one terminal event: `done`,
//! or `error` followed by `done`. An upstream close without `[DONE]` is an
//! implicit `done`.

use axum::response::Response;
use bytes::Bytes;
use futures_util::StreamExt;
use smallvec::SmallVec;
use tokio_util::sync::CancellationToken;

use crate::stream::decoder::{decode_frame_into, DeltaBatch};
use crate::stream::splitter::{FrameBatch, FrameSplitter};
use crate::stream::{Delta, StreamEvent};

/// Encoded frames awaiting yield. The head index avoids shifting; a burst is
/// rarely more than a delta pair or `error`+`done`.
struct PendingFrames {
    frames: SmallVec<[Bytes; 8]>,
    head: usize,
}

impl PendingFrames {
    #[inline]
    fn new() -> Self {
        Self {
            frames: SmallVec::new(),
            head: 0,
        }
    }

    #[inline]
    fn push(&mut self, frame: Bytes) {
        self.frames.push(frame);
    }

    #[inline]
    fn pop_front(&mut self) -> Option<Bytes> {
        if self.head >= self.frames.len() {
            return None;
        }
        let frame = std::mem::take(&mut self.frames[self.head]);
        self.head += 1;
        if self.head == self.frames.len() {
            self.frames.clear();
            self.head = 0;
        }
        Some(frame)
    }
}

/// Cancels the linked token when the relay stream is dropped.
///
/// Hyper drops the response body when the downstream client disconnects;
/// that drop reaches the unfold state, this guard fires, and any work tied
/// to the same token observes the cancellation.
struct CancelOnDrop {
    token: CancellationToken,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Translate decoded deltas into encoded client frames.
///
/// Stops at the first terminal delta: anything decoded after a `Done` or an
/// upstream error in the same batch is dropped, never forwarded.
fn translate_into(deltas: &mut DeltaBatch, pending: &mut PendingFrames, finalized: &mut bool) {
    for delta in deltas.drain(..) {
        match delta {
            Delta::Reasoning(text) => pending.push(StreamEvent::ReasoningDelta(text).encode_sse()),
            Delta::Content(text) => pending.push(StreamEvent::ContentDelta(text).encode_sse()),
            Delta::UpstreamError(message) => {
                pending.push(StreamEvent::Error { message }.encode_sse());
                pending.push(StreamEvent::Done.encode_sse());
                *finalized = true;
                break;
            }
            Delta::Done => {
                pending.push(StreamEvent::Done.encode_sse());
                *finalized = true;
                break;
            }
        }
    }
}

/// Build the relayed event stream over an upstream body.
///
/// Yields one encoded SSE frame per client event. Once `cancel` fires,
/// nothing further is yielded, pending frames included; the upstream
/// response is dropped with the state. Dropping the returned stream also
/// cancels the token.
pub fn relay_event_stream<E>(
    byte_stream: impl futures_util::Stream<Item = Result<Bytes, E>> + Send + 'static,
    cancel: CancellationToken,
) -> impl futures_util::Stream<Item = Bytes> + Send + 'static
where
    E: std::fmt::Display + Send + 'static,
{
    let guard = CancelOnDrop {
        token: cancel.clone(),
    };
    futures_util::stream::unfold(
        (
            Box::pin(byte_stream),
            FrameSplitter::new(),
            FrameBatch::new(),
            DeltaBatch::new(),
            PendingFrames::new(),
            false,
            cancel,
            guard,
        ),
        |(
            mut byte_stream,
            mut splitter,
            mut frame_batch,
            mut delta_batch,
            mut pending,
            mut finalized,
            cancel,
            guard,
        )| async move {
            loop {
                if cancel.is_cancelled() {
                    return None;
                }
                if let Some(frame) = pending.pop_front() {
                    return Some((
                        frame,
                        (
                            byte_stream,
                            splitter,
                            frame_batch,
                            delta_batch,
                            pending,
                            finalized,
                            cancel,
                            guard,
                        ),
                    ));
                }
                if finalized {
                    return None;
                }

                let next = tokio::select! {
                    () = cancel.cancelled() => return None,
                    item = byte_stream.next() => item,
                };

                match next {
                    Some(Ok(chunk)) => {
                        splitter.feed_into(&chunk, &mut frame_batch);
                        for frame in frame_batch.drain(..) {
                            if finalized {
                                break;
                            }
                            decode_frame_into(&frame, &mut delta_batch);
                            translate_into(&mut delta_batch, &mut pending, &mut finalized);
                        }
                    }
                    Some(Err(err)) => {
                        if cancel.is_cancelled() {
                            return None;
                        }
                        pending.push(
                            StreamEvent::Error {
                                message: err.to_string(),
                            }
                            .encode_sse(),
                        );
                        pending.push(StreamEvent::Done.encode_sse());
                        finalized = true;
                    }
                    None => {
                        // A partial trailing line is dropped; the close itself
                        // is the terminator.
                        let _ = splitter.finish();
                        pending.push(StreamEvent::Done.encode_sse());
                        finalized = true;
                    }
                }
            }
        },
    )
}

/// Wrap a relayed event stream as a `200 text/event-stream` response.
pub fn relay_stream_response<E>(
    byte_stream: impl futures_util::Stream<Item = Result<Bytes, E>> + Send + 'static,
    cancel: CancellationToken,
) -> Response
where
    E: std::fmt::Display + Send + 'static,
{
    let events = relay_event_stream(byte_stream, cancel);
    let body =
        axum::body::Body::from_stream(events.map(Ok::<Bytes, std::convert::Infallible>));
    sse_ok_response(body)
}

/// Two-event substitute stream for failures that precede the upstream body.
///
/// Headers are fixed before the upstream is contacted, so pre-stream errors
/// surface in-band as `error` then `done` on an otherwise normal response.
#[must_use]
pub fn error_then_done_response(message: String) -> Response {
    let frames = [
        Ok::<Bytes, std::convert::Infallible>(StreamEvent::Error { message }.encode_sse()),
        Ok(StreamEvent::Done.encode_sse()),
    ];
    let body = axum::body::Body::from_stream(futures_util::stream::iter(frames));
    sse_ok_response(body)
}

fn sse_ok_response(body: axum::body::Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    headers.insert(
        http::HeaderName::from_static("x-accel-buffering"),
        http::HeaderValue::from_static("no"),
    );
    response
}
