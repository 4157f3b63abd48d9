use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::RelayError;
use crate::state::AppState;
use crate::stream::{error_then_done_response, relay_stream_response};
use crate::upstream::ChatMessage;

#[derive(Debug, Deserialize)]
struct ChatCompletionsBody {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    messages: Vec<ChatMessage>,
    #[serde(default)]
    stream: Option<bool>,
}

/// `POST /v1/chat/completions` — open the upstream token stream and relay it
/// as client events.
pub async fn handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match handler_inner(state, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handler_inner(state: Arc<AppState>, body: Bytes) -> Result<Response, RelayError> {
    let request: ChatCompletionsBody = serde_json::from_slice(&body)
        .map_err(|err| RelayError::InvalidRequest(format!("Invalid chat request: {err}")))?;

    if request.stream == Some(false) {
        return Err(RelayError::NotSupported(
            "Non-streaming (stream: false) is not supported".to_string(),
        ));
    }

    let request_seq = state.next_request_seq();
    let request_id = state.request_uuid(request_seq);
    let model = state.upstream.resolve_model(request.model.as_deref());

    tracing::info!(
        request_id = %request_id,
        model,
        message_count = request.messages.len(),
        "opening upstream chat stream"
    );

    // Headers went out as 200 the moment the response is returned, so upstream
    // open failures are reported in-band as an error event.
    match state.upstream.open_chat_stream(model, &request.messages).await {
        Ok(upstream_response) => {
            let cancel = CancellationToken::new();
            Ok(relay_stream_response(upstream_response.bytes_stream(), cancel))
        }
        Err(err) => {
            tracing::warn!(request_id = %request_id, error = %err, "upstream chat stream failed to open");
            Ok(error_then_done_response(err.to_string()))
        }
    }
}
