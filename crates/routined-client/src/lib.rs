//! routined-client: HTTP client for the remote session server.

use std::time::Duration;

use anyhow::{Context, bail};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Server health report.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
}

/// A session on the remote server.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Model reference in the server's wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRef {
    #[serde(rename = "providerID")]
    pub provider_id: String,
    #[serde(rename = "modelID")]
    pub model_id: String,
}

impl ModelRef {
    /// Parse a "provider/model" string, splitting on the FIRST `/`.
    /// The model part may itself contain slashes.
    pub fn parse(spec: &str) -> Option<Self> {
        let (provider, model) = spec.split_once('/')?;
        if provider.is_empty() || model.is_empty() {
            return None;
        }
        Some(Self {
            provider_id: provider.to_string(),
            model_id: model.to_string(),
        })
    }
}

#[derive(Serialize)]
struct CreateSessionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    parts: Vec<TextPart<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a ModelRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent: Option<&'a str>,
}

/// Parameters for starting a session and delivering its first message.
#[derive(Debug, Clone, Default)]
pub struct NewSessionMessage {
    pub title: Option<String>,
    /// Model as a "provider/model" string.
    pub model: Option<String>,
    pub agent: Option<String>,
    pub message: String,
}

/// HTTP client for the session server API.
pub struct SessionClient {
    client: Client,
    base_url: String,
}

impl SessionClient {
    /// Create a client for the given server URL (trailing slash tolerated).
    pub fn new(server_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            base_url: server_url.trim_end_matches('/').to_string(),
        }
    }

    /// Check server health.
    pub async fn health(&self) -> anyhow::Result<HealthResponse> {
        let resp = self
            .client
            .get(format!("{}/global/health", self.base_url))
            .send()
            .await
            .context("health request failed")?;
        if !resp.status().is_success() {
            bail!("health check failed: {}", resp.status());
        }
        resp.json().await.context("health response parse failed")
    }

    /// Create a new session.
    pub async fn create_session(&self, title: Option<&str>) -> anyhow::Result<Session> {
        let resp = self
            .client
            .post(format!("{}/session", self.base_url))
            .json(&CreateSessionBody { title })
            .send()
            .await
            .context("create session request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("failed to create session: {status} - {text}");
        }
        resp.json()
            .await
            .context("create session response parse failed")
    }

    /// Deliver a message to a session without waiting for the agent's
    /// reply (fire and forget; a non-2xx response is still an error).
    pub async fn send_message_async(
        &self,
        session_id: &str,
        message: &str,
        model: Option<&ModelRef>,
        agent: Option<&str>,
    ) -> anyhow::Result<()> {
        let body = MessageBody {
            parts: vec![TextPart {
                kind: "text",
                text: message,
            }],
            model,
            agent,
        };
        let resp = self
            .client
            .post(format!(
                "{}/session/{session_id}/prompt_async",
                self.base_url
            ))
            .json(&body)
            .send()
            .await
            .context("send message request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("failed to send message: {status} - {text}");
        }
        Ok(())
    }

    /// Create a session and send its first message. Returns the session id.
    ///
    /// A malformed model string is logged and the message is sent without
    /// a model override rather than failing the firing.
    pub async fn create_session_with_message(
        &self,
        params: &NewSessionMessage,
    ) -> anyhow::Result<String> {
        let session = self.create_session(params.title.as_deref()).await?;
        match &session.title {
            Some(title) => info!(session = %session.id, title = %title, "Created session"),
            None => info!(session = %session.id, "Created session"),
        }

        let model = params.model.as_deref().and_then(|spec| {
            let parsed = ModelRef::parse(spec);
            if parsed.is_none() {
                warn!(model = spec, "Invalid model format, expected \"provider/model\"");
            }
            parsed
        });

        self.send_message_async(
            &session.id,
            &params.message,
            model.as_ref(),
            params.agent.as_deref(),
        )
        .await?;
        info!(session = %session.id, "Sent message");

        Ok(session.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = SessionClient::new("http://localhost:4096/");
        assert_eq!(client.base_url, "http://localhost:4096");
    }

    #[test]
    fn test_model_ref_parse() {
        assert_eq!(
            ModelRef::parse("anthropic/claude-sonnet-4"),
            Some(ModelRef {
                provider_id: "anthropic".into(),
                model_id: "claude-sonnet-4".into(),
            })
        );
        // Only the first slash splits; the rest stays in the model id.
        assert_eq!(
            ModelRef::parse("openrouter/meta/llama-3").unwrap().model_id,
            "meta/llama-3"
        );
        assert!(ModelRef::parse("no-slash").is_none());
        assert!(ModelRef::parse("/model").is_none());
        assert!(ModelRef::parse("provider/").is_none());
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/global/health"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"healthy": true, "version": "0.9.1"})),
            )
            .mount(&server)
            .await;

        let client = SessionClient::new(&server.uri());
        let health = client.health().await.unwrap();
        assert!(health.healthy);
        assert_eq!(health.version, "0.9.1");
    }

    #[tokio::test]
    async fn test_health_non_success_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/global/health"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = SessionClient::new(&server.uri());
        assert!(client.health().await.is_err());
    }

    #[tokio::test]
    async fn test_create_session_with_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .and(body_partial_json(json!({"title": "Digest"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "ses_1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/ses_1/prompt_async"))
            .and(body_partial_json(json!({
                "parts": [{"type": "text", "text": "hello"}],
                "model": {"providerID": "anthropic", "modelID": "claude-sonnet-4"},
                "agent": "researcher"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = SessionClient::new(&server.uri());
        let session_id = client
            .create_session_with_message(&NewSessionMessage {
                title: Some("Digest".into()),
                model: Some("anthropic/claude-sonnet-4".into()),
                agent: Some("researcher".into()),
                message: "hello".into(),
            })
            .await
            .unwrap();
        assert_eq!(session_id, "ses_1");
    }

    #[tokio::test]
    async fn test_invalid_model_sent_without_override() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "ses_2"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/ses_2/prompt_async"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client = SessionClient::new(&server.uri());
        client
            .create_session_with_message(&NewSessionMessage {
                model: Some("not-a-model-spec".into()),
                message: "hi".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let send = requests
            .iter()
            .find(|r| r.url.path().ends_with("/prompt_async"))
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&send.body).unwrap();
        assert!(body.get("model").is_none());
    }

    #[tokio::test]
    async fn test_send_message_non_success_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session/ses_3/prompt_async"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such session"))
            .mount(&server)
            .await;

        let client = SessionClient::new(&server.uri());
        let err = client
            .send_message_async("ses_3", "hi", None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no such session"));
    }
}
