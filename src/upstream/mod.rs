//! Upstream chat-completions client.
//!
//! One streaming operation: open `POST {base}/v1/chat/completions` with
//! `stream: true` and hand back the response whose `bytes_stream()` feeds
//! the relay pipeline. Cancellation is by drop; releasing the response
//! closes the connection.

use std::sync::{Arc, Once, OnceLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{ServerConfig, UpstreamConfig};
use crate::error::RelayError;

static RUSTLS_PROVIDER_INIT: Once = Once::new();

/// A chat message forwarded to the upstream. Content is passed through
/// unrewritten, in either of the two shapes the protocol allows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Plain text, or the multimodal part list used for image input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Serialize)]
struct UpstreamChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    timeout: Duration,
) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(Duration::from_secs(5))
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout)
        .no_proxy()
        .build()
}

/// Client for the configured OpenAI-compatible endpoint.
pub struct UpstreamClient {
    /// Endpoint root with any trailing slash trimmed.
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    allowed_models: Vec<String>,
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    timeout: Duration,
    client: OnceLock<Arc<reqwest::Client>>,
}

impl UpstreamClient {
    #[must_use]
    pub fn new(server: &ServerConfig, upstream: &UpstreamConfig) -> Self {
        RUSTLS_PROVIDER_INIT.call_once(|| {
            let _ = rustls::crypto::ring::default_provider().install_default();
        });

        let pool_idle_timeout = if server.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(server.http_pool_idle_timeout_secs))
        };

        Self {
            base_url: upstream.base_url.trim_end_matches('/').to_string(),
            api_key: upstream.api_key.clone(),
            default_model: upstream.default_model.clone(),
            allowed_models: upstream.models.clone(),
            pool_max_idle_per_host: server.http_pool_max_idle_per_host.max(1),
            pool_idle_timeout,
            timeout: Duration::from_secs(server.timeout),
            client: OnceLock::new(),
        }
    }

    /// Resolve the model to forward.
    ///
    /// Absent or empty requests use the default; when an allow-list is
    /// configured, a model outside it silently falls back to the default.
    #[must_use]
    pub fn resolve_model<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(model)
                if !model.is_empty()
                    && (self.allowed_models.is_empty()
                        || self.allowed_models.iter().any(|allowed| allowed == model)) =>
            {
                model
            }
            _ => &self.default_model,
        }
    }

    #[must_use]
    pub fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_client(&self) -> Arc<reqwest::Client> {
        match build_reqwest_client(
            self.pool_max_idle_per_host,
            self.pool_idle_timeout,
            self.timeout,
        ) {
            Ok(client) => Arc::new(client),
            Err(err) => {
                tracing::error!(error = %err, "failed to build configured reqwest client, falling back to default client");
                Arc::new(reqwest::Client::new())
            }
        }
    }

    fn client(&self) -> Arc<reqwest::Client> {
        if let Some(existing) = self.client.get() {
            return existing.clone();
        }
        let built = self.build_client();
        let _ = self.client.set(built.clone());
        self.client.get().cloned().unwrap_or(built)
    }

    /// Open a streaming completion. The returned response's `bytes_stream()`
    /// is the raw SSE byte stream.
    ///
    /// # Errors
    ///
    /// [`RelayError::UpstreamUnavailable`] when the connection cannot be
    /// established; [`RelayError::UpstreamHttp`] when the endpoint answers
    /// non-2xx (body sanitized and truncated).
    pub async fn open_chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<reqwest::Response, RelayError> {
        let payload = UpstreamChatRequest {
            model,
            messages,
            stream: true,
        };
        let mut request = self.client().post(self.chat_completions_url()).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| RelayError::UpstreamUnavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.map_err(|err| {
                RelayError::UpstreamUnavailable(format!("Failed to read error body: {err}"))
            })?;
            return Err(RelayError::UpstreamHttp {
                status: status.as_u16(),
                body: sanitize_upstream_error(&body),
            });
        }
        Ok(response)
    }
}

/// Reduce an upstream error body to a short human-readable message.
///
/// Prefers the JSON `error.message` field; otherwise the lossy UTF-8 body.
/// Either way the result is capped at 500 bytes on a char boundary.
pub(crate) fn sanitize_upstream_error(body: &[u8]) -> String {
    const MAX_LEN: usize = 500;

    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(message) = json
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(|message| message.as_str())
        {
            return truncate_with_ellipsis(message, MAX_LEN);
        }
    }

    truncate_with_ellipsis(&String::from_utf8_lossy(body), MAX_LEN)
}

fn truncate_with_ellipsis(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
