use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{self, Body};
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::api::{chat, health, messages, sessions};
use crate::error::RelayError;
use crate::state::AppState;

enum RouteMatch<'a> {
    Health,
    SessionsList,
    SessionCreate,
    SessionDelete { id: &'a str },
    MessagesList { session_id: &'a str },
    MessagesCreate { session_id: &'a str },
    ChatCompletions,
    CorsPreflight,
    MethodNotAllowed,
    NotFound,
}

/// Dispatch a raw HTTP request to the matching handler.
///
/// # Errors
///
/// This function currently never returns `Err` and uses `Infallible`.
pub async fn dispatch_request(
    state: Arc<AppState>,
    base_path: Arc<str>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let (parts, body) = request.into_parts();
    let cors = state.config.features.cors;
    let route = match_route(&parts.method, parts.uri.path(), base_path.as_ref(), cors);
    let max_body_mb = state.config.server.max_body_mb;

    let response = match route {
        RouteMatch::Health => health::handler().into_response(),
        RouteMatch::SessionsList => sessions::list_handler(State(state.clone())),
        RouteMatch::SessionCreate => {
            let body_bytes = match read_request_body(body, max_body_mb).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(with_cors(response, cors)),
            };
            sessions::create_handler(State(state.clone()), body_bytes)
        }
        RouteMatch::SessionDelete { id } => sessions::delete_handler(State(state.clone()), id),
        RouteMatch::MessagesList { session_id } => {
            messages::list_handler(State(state.clone()), session_id)
        }
        RouteMatch::MessagesCreate { session_id } => {
            let body_bytes = match read_request_body(body, max_body_mb).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(with_cors(response, cors)),
            };
            messages::create_handler(State(state.clone()), session_id, body_bytes)
        }
        RouteMatch::ChatCompletions => {
            let body_bytes = match read_request_body(body, max_body_mb).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(with_cors(response, cors)),
            };
            chat::handler(State(state.clone()), body_bytes).await
        }
        RouteMatch::CorsPreflight => cors_preflight_response(),
        RouteMatch::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        RouteMatch::NotFound => StatusCode::NOT_FOUND.into_response(),
    };

    Ok(with_cors(response, cors))
}

#[must_use]
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim();
    if trimmed.is_empty() || trimmed == "/" {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.trim_end_matches('/').to_string()
    } else {
        format!("/{}", trimmed.trim_end_matches('/'))
    }
}

fn with_cors(mut response: Response, enabled: bool) -> Response {
    if enabled {
        response.headers_mut().insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
    }
    response
}

fn cors_preflight_response() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("content-type, authorization"),
            ),
        ],
    )
        .into_response()
}

async fn read_request_body(body: Body, max_body_mb: usize) -> Result<bytes::Bytes, Response> {
    let limit = max_body_mb.saturating_mul(1024 * 1024);
    body::to_bytes(body, limit)
        .await
        .map_err(|_| RelayError::PayloadTooLarge { max_mb: max_body_mb }.into_response())
}

fn match_route<'a>(method: &Method, path: &'a str, base_path: &str, cors: bool) -> RouteMatch<'a> {
    let Some(path) = strip_base_path(path, base_path) else {
        return RouteMatch::NotFound;
    };

    if cors && method == Method::OPTIONS {
        return RouteMatch::CorsPreflight;
    }

    match path {
        "/health" => {
            if method == Method::GET {
                RouteMatch::Health
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        "/sessions" => {
            if method == Method::GET {
                RouteMatch::SessionsList
            } else if method == Method::POST {
                RouteMatch::SessionCreate
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        "/v1/chat/completions" => {
            if method == Method::POST {
                RouteMatch::ChatCompletions
            } else {
                RouteMatch::MethodNotAllowed
            }
        }
        _ => {
            if let Some(id) = path.strip_prefix("/sessions/") {
                if id.is_empty() || id.contains('/') {
                    RouteMatch::NotFound
                } else if method == Method::DELETE {
                    RouteMatch::SessionDelete { id }
                } else {
                    RouteMatch::MethodNotAllowed
                }
            } else if let Some(rest) = path.strip_prefix("/chat/") {
                match rest.strip_suffix("/messages") {
                    Some(session_id) if !session_id.is_empty() && !session_id.contains('/') => {
                        if method == Method::GET {
                            RouteMatch::MessagesList { session_id }
                        } else if method == Method::POST {
                            RouteMatch::MessagesCreate { session_id }
                        } else {
                            RouteMatch::MethodNotAllowed
                        }
                    }
                    _ => RouteMatch::NotFound,
                }
            } else {
                RouteMatch::NotFound
            }
        }
    }
}

fn strip_base_path<'a>(path: &'a str, base_path: &str) -> Option<&'a str> {
    if base_path.is_empty() {
        return Some(path);
    }

    let remainder = path.strip_prefix(base_path)?;
    if remainder.is_empty() {
        Some("/")
    } else if remainder.starts_with('/') {
        Some(remainder)
    } else {
        None
    }
}
