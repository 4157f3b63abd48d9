use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::state::AppState;
use crate::store::{ChatSession, NewSession};

#[derive(Debug, Deserialize)]
struct CreateSessionBody {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct SessionEnvelope {
    session: ChatSession,
}

/// `GET /sessions` — every session, most recently updated first.
#[must_use]
pub fn list_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(state.sessions().list_sessions()).into_response()
}

/// `POST /sessions` — create a session, honoring a client-supplied id.
#[must_use]
pub fn create_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    match create_inner(&state, &body) {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

fn create_inner(state: &AppState, body: &[u8]) -> Result<Response, RelayError> {
    let request: CreateSessionBody = serde_json::from_slice(body)
        .map_err(|err| RelayError::InvalidRequest(format!("Invalid session body: {err}")))?;

    let session = state.sessions().create_session(NewSession {
        id: request.id,
        title: request.title,
        model: request.model,
    })?;

    Ok((StatusCode::CREATED, Json(SessionEnvelope { session })).into_response())
}

/// `DELETE /sessions/{id}` — removes the session and its messages.
#[must_use]
pub fn delete_handler(State(state): State<Arc<AppState>>, id: &str) -> Response {
    match state.sessions().delete_session(id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => RelayError::from(err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(AppConfig::default()))
    }

    async fn response_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("collect body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn create_then_list_round_trips() {
        let state = test_state();

        let created = create_handler(
            State(state.clone()),
            Bytes::from_static(br#"{"title":"Planning","model":"GPT-OSS-120B"}"#),
        );
        assert_eq!(created.status(), StatusCode::CREATED);
        let created = response_json(created).await;
        assert_eq!(created["session"]["title"], "Planning");
        assert_eq!(created["session"]["model"], "GPT-OSS-120B");
        assert!(created["session"]["id"].as_str().is_some_and(|id| !id.is_empty()));

        let listed = list_handler(State(state));
        assert_eq!(listed.status(), StatusCode::OK);
        let listed = response_json(listed).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
        assert_eq!(listed[0]["title"], "Planning");
    }

    #[tokio::test]
    async fn create_defaults_title_and_accepts_explicit_id() {
        let state = test_state();

        let created = create_handler(
            State(state.clone()),
            Bytes::from_static(br#"{"id":"sess-1","model":"GPT-OSS-120B"}"#),
        );
        assert_eq!(created.status(), StatusCode::CREATED);
        let created = response_json(created).await;
        assert_eq!(created["session"]["id"], "sess-1");
        assert_eq!(created["session"]["title"], "New chat");
    }

    #[tokio::test]
    async fn duplicate_id_conflicts() {
        let state = test_state();
        let body = br#"{"id":"sess-1","model":"GPT-OSS-120B"}"#;

        let first = create_handler(State(state.clone()), Bytes::from_static(body));
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = create_handler(State(state.clone()), Bytes::from_static(body));
        assert_eq!(second.status(), StatusCode::CONFLICT);
        let second = response_json(second).await;
        assert_eq!(second["error"]["type"], "invalid_request_error");
    }

    #[tokio::test]
    async fn malformed_body_is_rejected() {
        let state = test_state();
        let response = create_handler(State(state), Bytes::from_static(b"{not json"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_removes_and_then_misses() {
        let state = test_state();
        create_handler(
            State(state.clone()),
            Bytes::from_static(br#"{"id":"sess-1","model":"GPT-OSS-120B"}"#),
        );

        let deleted = delete_handler(State(state.clone()), "sess-1");
        assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

        let again = delete_handler(State(state), "sess-1");
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }
}
