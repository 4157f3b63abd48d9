use crate::store::StoreError;

/// Error type used across handlers and the upstream client.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    NotSupported(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Request body exceeds the {max_mb} MB limit")]
    PayloadTooLarge { max_mb: usize },
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Upstream error (status {status}): {body}")]
    UpstreamHttp { status: u16, body: String },
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code and payload type selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    NotFound,
    Conflict,
    PayloadTooLarge,
    NotSupported,
    BadGateway,
    ServerError,
}

impl RelayError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            RelayError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            RelayError::NotSupported(_) => ErrorCategory::NotSupported,
            RelayError::NotFound(_) => ErrorCategory::NotFound,
            RelayError::Conflict(_) => ErrorCategory::Conflict,
            RelayError::PayloadTooLarge { .. } => ErrorCategory::PayloadTooLarge,
            RelayError::UpstreamUnavailable(_) => ErrorCategory::BadGateway,
            RelayError::UpstreamHttp { status, .. } => category_from_upstream_status(*status),
            RelayError::Internal(_) => ErrorCategory::ServerError,
        }
    }
}

impl From<StoreError> for RelayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SessionNotFound(_) => RelayError::NotFound(err.to_string()),
            StoreError::DuplicateSession(_) => RelayError::Conflict(err.to_string()),
        }
    }
}

/// Map an upstream HTTP status to the category a relayed error reports.
#[must_use]
pub fn category_from_upstream_status(status: u16) -> ErrorCategory {
    match status {
        400..=499 => ErrorCategory::InvalidRequest,
        _ => ErrorCategory::BadGateway,
    }
}

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => http::StatusCode::NOT_FOUND,
        ErrorCategory::Conflict => http::StatusCode::CONFLICT,
        ErrorCategory::PayloadTooLarge => http::StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCategory::NotSupported => http::StatusCode::NOT_IMPLEMENTED,
        ErrorCategory::BadGateway => http::StatusCode::BAD_GATEWAY,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_type_for_category(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest
        | ErrorCategory::NotFound
        | ErrorCategory::Conflict
        | ErrorCategory::PayloadTooLarge
        | ErrorCategory::NotSupported => "invalid_request_error",
        ErrorCategory::BadGateway | ErrorCategory::ServerError => "server_error",
    }
}

/// Build the error envelope, returning (`status_code`, JSON body).
#[must_use]
pub fn format_error(err: &RelayError) -> (http::StatusCode, serde_json::Value) {
    let cat = err.category();
    let status = http_status_for_category(cat);
    let body = serde_json::json!({
        "error": {
            "message": err.to_string(),
            "type": error_type_for_category(cat),
        }
    });
    (status, body)
}

impl axum::response::IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = format_error(&self);
        (status, axum::Json(body)).into_response()
    }
}
