use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub message: String,
    pub pipeline_name: String,
    pub hours_back: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Extra fields sent by the agent are ignored.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum ChatError {
    /// The request never completed (DNS, refused connection, TLS, ...)
    #[error("Network error: {0}. Check if the endpoint URL is correct and CORS is configured.")]
    Network(String),
    /// The endpoint answered with a non-success status
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    /// The body was not a chat response
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ChatError {
    /// Transcript text for this error, with remediation hints where there are any.
    pub fn user_message(&self) -> String {
        let mut text = format!("Error: {}", self);

        match self {
            ChatError::Network(_) => {
                text.push_str("\n\nPossible solutions:\n");
                text.push_str("• Check if the endpoint URL is correct in settings (Ctrl+S)\n");
                text.push_str("• Verify the endpoint is reachable from this machine\n");
                text.push_str("• Ensure the API gateway allows cross-origin (CORS) requests");
            }
            ChatError::Api { .. } => {
                text.push_str("\n\nCheck:\n");
                text.push_str("• Agent function logs\n");
                text.push_str("• API gateway configuration\n");
                text.push_str("• Request format is correct");
            }
            ChatError::Malformed(_) => {}
        }

        text
    }
}

#[derive(Clone, Debug)]
pub struct ChatClient {
    client: Client,
    chat_url: String,
}

impl ChatClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            chat_url: config.chat_url(),
        }
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    /// POST the request to `{endpoint}/chat`.
    pub async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        log::debug!("Calling agent at {}", self.chat_url);

        let response = self
            .client
            .post(&self.chat_url)
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        if !status.is_success() {
            log::warn!("Agent returned {}: {}", status, body);
            let body = if body.is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                body
            };
            return Err(ChatError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| ChatError::Malformed(e.to_string()))
    }
}
