use crate::api_types::{ChatRequest, ChatResponse};
use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use arin_core::config::ResponderConfig;
use arin_core::{Responder, TransportError};
use reqwest::Client;
use std::time::Duration;

/// Posts `{"message": ...}` to a chat endpoint and reads back
/// `{"success": bool, "response": string}`.
#[derive(Debug, Clone)]
pub struct HttpResponder {
    client: Client,
    endpoint: String,
    retry: RetryConfig,
    empty_reply: String,
}

impl HttpResponder {
    pub fn new(config: &ResponderConfig, empty_reply: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim().to_string(),
            retry: RetryConfig::from(config),
            empty_reply: empty_reply.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl Responder for HttpResponder {
    async fn send(&self, text: &str) -> Result<String, TransportError> {
        let request = ChatRequest { message: text };
        let response = with_retry(&self.retry, || {
            self.client.post(&self.endpoint).json(&request).send()
        })
        .await?;

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::debug!(
                "Unparseable responder body: {}",
                body.chars().take(200).collect::<String>()
            );
            TransportError::Malformed(e.to_string())
        })?;

        if !parsed.success {
            return Err(TransportError::Rejected);
        }

        Ok(parsed
            .response
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| self.empty_reply.clone()))
    }
}
