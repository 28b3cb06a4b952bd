use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::Role;
use crate::settings::{COMPLETION_TIMEOUT, GatewayConfig, PROBE_TIMEOUT};

/// Shown to the user whenever a model call fails. The conversation keeps
/// going instead of surfacing transport errors to the stakeholder.
pub const FALLBACK_MESSAGE: &str = "I apologize, but I'm having trouble connecting to the language model. Please ensure the model service is running.";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("model service unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
    #[error("model service returned status {0}")]
    Status(reqwest::StatusCode),
}

/// A role/content pair as sent over the wire. Timestamps and other session
/// bookkeeping never leave the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Sends one synchronous completion request. The sequence must end with
    /// the latest turn; temperature is passed through unvalidated. One
    /// attempt, no retries.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, GatewayError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Client for an Ollama-format chat endpoint.
#[derive(Clone)]
pub struct OllamaGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl OllamaGateway {
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(COMPLETION_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url.trim_end_matches('/'))
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Reachability report only; never part of the orchestration path.
    pub async fn check_connection(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url.trim_end_matches('/'));
        match self.client.get(url).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ChatModel for OllamaGateway {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, GatewayError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            stream: false,
            options: ChatOptions { temperature },
        };
        let mut rb = self.client.post(self.chat_url()).json(&body);
        if let Some(key) = &self.config.api_key {
            rb = rb.bearer_auth(key);
        }
        let resp = rb.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::Status(status));
        }
        let parsed: ChatResponse = resp.json().await?;
        // A response without generated text is an empty reply, not an error.
        Ok(parsed.message.map(|m| m.content).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, routing::get, routing::post};

    fn config_for(base_url: String) -> GatewayConfig {
        GatewayConfig {
            base_url,
            model: "test-model".into(),
            api_key: None,
        }
    }

    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn complete_extracts_message_content() {
        let router = Router::new().route(
            "/api/chat",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["stream"], false);
                assert!(body["options"]["temperature"].is_number());
                Json(serde_json::json!({
                    "message": {"role": "assistant", "content": "noted"}
                }))
            }),
        );
        let base = spawn_stub(router).await;
        let gw = OllamaGateway::new(config_for(base)).unwrap();
        let out = gw
            .complete(&[ChatMessage::new(Role::User, "hi")], 0.7)
            .await
            .unwrap();
        assert_eq!(out, "noted");
    }

    #[tokio::test]
    async fn complete_missing_content_is_empty_not_error() {
        let router = Router::new().route(
            "/api/chat",
            post(|| async { Json(serde_json::json!({"done": true})) }),
        );
        let base = spawn_stub(router).await;
        let gw = OllamaGateway::new(config_for(base)).unwrap();
        let out = gw
            .complete(&[ChatMessage::new(Role::User, "hi")], 0.7)
            .await
            .unwrap();
        assert_eq!(out, "");
    }

    #[tokio::test]
    async fn complete_non_success_status_is_typed_error() {
        let router = Router::new().route(
            "/api/chat",
            post(|| async { (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let base = spawn_stub(router).await;
        let gw = OllamaGateway::new(config_for(base)).unwrap();
        let err = gw
            .complete(&[ChatMessage::new(Role::User, "hi")], 0.7)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Status(s) if s.as_u16() == 500));
    }

    #[tokio::test]
    async fn complete_unreachable_endpoint_never_panics() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let gw = OllamaGateway::new(config_for(format!("http://{addr}"))).unwrap();
        let err = gw
            .complete(&[ChatMessage::new(Role::User, "hi")], 0.7)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Unreachable(_)));
    }

    #[tokio::test]
    async fn check_connection_reports_reachability() {
        let router = Router::new().route(
            "/api/tags",
            get(|| async { Json(serde_json::json!({"models": []})) }),
        );
        let base = spawn_stub(router).await;
        let gw = OllamaGateway::new(config_for(base)).unwrap();
        assert!(gw.check_connection().await);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let gw = OllamaGateway::new(config_for(format!("http://{addr}"))).unwrap();
        assert!(!gw.check_connection().await);
    }
}
