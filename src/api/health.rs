use axum::response::Json;
use serde_json::{json, Value};

/// Health check handler.
pub fn handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
