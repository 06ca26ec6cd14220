//! Chat backend seam and the HTTP client for the claims API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use lunatix_core::config::ChatConfig;

use crate::error::ChatError;
use crate::types::{ChatReply, ChatRequest, ChatResponseBody};

/// Anything that can answer one chat message for a session.
///
/// The pipeline makes exactly one attempt per admitted utterance; retries,
/// backoff and context continuity are the backend's business.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, ChatError>;
}

/// Client for the claims API chatbot endpoint.
#[derive(Debug, Clone)]
pub struct HttpChatBackend {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpChatBackend {
    pub fn new(base_url: &str, api_prefix: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: chat_endpoint(base_url, api_prefix),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(&config.backend_url, &config.api_prefix)
            .with_timeout(Duration::from_secs(config.request_timeout_secs))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn send(&self, request: &ChatRequest) -> Result<ChatReply, ChatError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ChatError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;
        let body: ChatResponseBody =
            serde_json::from_str(&text).map_err(|e| ChatError::MalformedPayload(e.to_string()))?;

        if let Some(returned) = body.session_id.as_deref() {
            if returned != request.session_id {
                tracing::debug!(
                    sent = %request.session_id,
                    returned = %returned,
                    "Chat backend answered for a different session id"
                );
            }
        }

        Ok(body.into())
    }
}

/// `{base_url}/{api_prefix}/chatbot/chat`, tolerant of stray slashes.
fn chat_endpoint(base_url: &str, api_prefix: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let prefix = api_prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/chatbot/chat", base)
    } else {
        format!("{}/{}/chatbot/chat", base, prefix)
    }
}

// =============================================================================
// Tests
// =============================================================================
