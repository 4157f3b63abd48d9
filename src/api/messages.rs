use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::state::AppState;
use crate::store::{ImageAttachment, Message, NewMessage, Role};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMessageBody {
    role: Role,
    content: String,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    images: Option<Vec<ImageAttachment>>,
}

#[derive(Serialize)]
struct MessageEnvelope {
    message: Message,
}

/// `GET /chat/{sessionId}/messages` — transcript in order. An unknown
/// session yields an empty array rather than a 404.
#[must_use]
pub fn list_handler(State(state): State<Arc<AppState>>, session_id: &str) -> Response {
    Json(state.messages().list_messages(session_id)).into_response()
}

/// `POST /chat/{sessionId}/messages` — append to the transcript and touch
/// the session's `updatedAt`.
#[must_use]
pub fn create_handler(State(state): State<Arc<AppState>>, session_id: &str, body: Bytes) -> Response {
    match create_inner(&state, session_id, &body) {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

fn create_inner(state: &AppState, session_id: &str, body: &[u8]) -> Result<Response, RelayError> {
    let request: CreateMessageBody = serde_json::from_slice(body)
        .map_err(|err| RelayError::InvalidRequest(format!("Invalid message body: {err}")))?;

    let message = state.messages().create_message(
        session_id,
        NewMessage {
            role: request.role,
            content: request.content,
            reasoning_content: request.reasoning_content,
            images: request.images,
        },
    )?;

    Ok((StatusCode::CREATED, Json(MessageEnvelope { message })).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::sessions;
    use crate::config::AppConfig;

    fn state_with_session(id: &str) -> Arc<AppState> {
        let state = Arc::new(AppState::new(AppConfig::default()));
        let response = sessions::create_handler(
            State(state.clone()),
            Bytes::from(format!(r#"{{"id":"{id}","model":"GPT-OSS-120B"}}"#)),
        );
        assert_eq!(response.status(), StatusCode::CREATED);
        state
    }

    async fn response_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("collect body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn append_assigns_order_and_lists_in_order() {
        let state = state_with_session("sess-1");

        let first = create_handler(
            State(state.clone()),
            "sess-1",
            Bytes::from_static(br#"{"role":"user","content":"hello"}"#),
        );
        assert_eq!(first.status(), StatusCode::CREATED);
        let first = response_json(first).await;
        assert_eq!(first["message"]["orderIndex"], 0);
        assert_eq!(first["message"]["sessionId"], "sess-1");

        let second = create_handler(
            State(state.clone()),
            "sess-1",
            Bytes::from_static(
                br#"{"role":"assistant","content":"hi there","reasoningContent":"greet them"}"#,
            ),
        );
        let second = response_json(second).await;
        assert_eq!(second["message"]["orderIndex"], 1);
        assert_eq!(second["message"]["reasoningContent"], "greet them");

        let listed = list_handler(State(state), "sess-1");
        assert_eq!(listed.status(), StatusCode::OK);
        let listed = response_json(listed).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(2));
        assert_eq!(listed[0]["content"], "hello");
        assert_eq!(listed[1]["content"], "hi there");
    }

    #[tokio::test]
    async fn user_message_omits_reasoning_field() {
        let state = state_with_session("sess-1");
        let created = create_handler(
            State(state),
            "sess-1",
            Bytes::from_static(br#"{"role":"user","content":"hello"}"#),
        );
        let created = response_json(created).await;
        assert!(created["message"].get("reasoningContent").is_none());
    }

    #[tokio::test]
    async fn unknown_session_list_is_empty_but_append_is_404() {
        let state = Arc::new(AppState::new(AppConfig::default()));

        let listed = list_handler(State(state.clone()), "ghost");
        assert_eq!(listed.status(), StatusCode::OK);
        let listed = response_json(listed).await;
        assert_eq!(listed, serde_json::json!([]));

        let appended = create_handler(
            State(state),
            "ghost",
            Bytes::from_static(br#"{"role":"user","content":"hello"}"#),
        );
        assert_eq!(appended.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn image_attachments_round_trip() {
        let state = state_with_session("sess-1");
        let created = create_handler(
            State(state),
            "sess-1",
            Bytes::from_static(
                br#"{"role":"user","content":"look","images":[{"base64":"aGk=","mimeType":"image/png"}]}"#,
            ),
        );
        assert_eq!(created.status(), StatusCode::CREATED);
        let created = response_json(created).await;
        assert_eq!(created["message"]["images"][0]["mimeType"], "image/png");
    }

    #[tokio::test]
    async fn bad_role_is_rejected() {
        let state = state_with_session("sess-1");
        let response = create_handler(
            State(state),
            "sess-1",
            Bytes::from_static(br#"{"role":"system","content":"hi"}"#),
        );
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
