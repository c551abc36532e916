//! Provider client - submits a single templated message to the
//! messaging API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;
use wacast_common::config::ProviderConfig;

/// Provider failure categories
///
/// The caller decides retryability through `ProviderError::is_transient`;
/// the client only records what the wire said.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Request timed out
    Timeout,
    /// Connection-level failure
    Network,
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx
    Server,
    /// HTTP 401/403
    Auth,
    /// Any other client-side rejection (bad recipient, bad template)
    Rejected,
    /// Response did not carry a message id
    Malformed,
}

/// Error returned by a provider submission
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether the failure is worth retrying with backoff
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::Timeout
                | ProviderErrorKind::Network
                | ProviderErrorKind::RateLimited
                | ProviderErrorKind::Server
        )
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ProviderError {}

/// One templated send request
#[derive(Debug, Clone)]
pub struct SendRequest {
    /// Provider-side id of the sending number
    pub provider_number_id: String,
    /// Recipient phone in E.164 form
    pub to: String,
    /// Template name as declared at the provider
    pub template_name: String,
    /// Template language code
    pub language: String,
    /// Pre-built component parameter list
    pub components: Vec<serde_json::Value>,
}

/// Seam between the dispatch worker and the external messaging API
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Submit one templated message; returns the provider-assigned
    /// message id
    async fn send_template(&self, request: &SendRequest) -> Result<String, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SendResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct SendResponseMessage {
    id: String,
}

/// WhatsApp Cloud API client
pub struct CloudApiClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl CloudApiClient {
    /// Create a new client from provider configuration
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    fn kind_for_status(status: StatusCode) -> ProviderErrorKind {
        if status == StatusCode::TOO_MANY_REQUESTS {
            ProviderErrorKind::RateLimited
        } else if status.is_server_error() {
            ProviderErrorKind::Server
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            ProviderErrorKind::Auth
        } else {
            ProviderErrorKind::Rejected
        }
    }

    /// Pull the provider's error message out of a failure body
    fn error_message(status: StatusCode, body: &str) -> String {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .map(|s| s.to_string())
            });

        match detail {
            Some(msg) => format!("HTTP {}: {}", status.as_u16(), msg),
            None => format!("HTTP {}", status.as_u16()),
        }
    }
}

#[async_trait]
impl ProviderClient for CloudApiClient {
    async fn send_template(&self, request: &SendRequest) -> Result<String, ProviderError> {
        let url = format!(
            "{}/{}/messages",
            self.base_url, request.provider_number_id
        );

        let body = json!({
            "messaging_product": "whatsapp",
            "to": request.to,
            "type": "template",
            "template": {
                "name": request.template_name,
                "language": { "code": request.language },
                "components": request.components,
            },
        });

        debug!(to = %request.to, template = %request.template_name, "Submitting message");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    ProviderErrorKind::Timeout
                } else {
                    ProviderErrorKind::Network
                };
                ProviderError::new(kind, e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(
                Self::kind_for_status(status),
                Self::error_message(status, &text),
            ));
        }

        let parsed: SendResponse = response.json().await.map_err(|e| {
            ProviderError::new(ProviderErrorKind::Malformed, e.to_string())
        })?;

        parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| {
                ProviderError::new(
                    ProviderErrorKind::Malformed,
                    "Response carried no message id",
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CloudApiClient {
        let config = ProviderConfig {
            base_url: server.uri(),
            access_token: "test-token".to_string(),
            timeout_secs: 5,
        };
        CloudApiClient::new(&config).unwrap()
    }

    fn request() -> SendRequest {
        SendRequest {
            provider_number_id: "105551234".to_string(),
            to: "+14155550123".to_string(),
            template_name: "order_update".to_string(),
            language: "en".to_string(),
            components: vec![],
        }
    }

    #[tokio::test]
    async fn test_send_returns_provider_message_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/105551234/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messaging_product": "whatsapp",
                "messages": [{"id": "wamid.HBgLMTQxNTU1NTAxMjM"}]
            })))
            .mount(&server)
            .await;

        let id = client_for(&server).send_template(&request()).await.unwrap();
        assert_eq!(id, "wamid.HBgLMTQxNTU1NTAxMjM");
    }

    #[tokio::test]
    async fn test_rate_limit_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_template(&request())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::RateLimited);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_template(&request())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Server);
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_auth_failure_is_permanent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Invalid OAuth access token"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_template(&request())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Auth);
        assert!(!err.is_transient());
        assert!(err.message.contains("Invalid OAuth access token"));
    }

    #[tokio::test]
    async fn test_rejection_is_permanent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"message": "Template name does not exist"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_template(&request())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Rejected);
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_message_id_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"messaging_product": "whatsapp"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_template(&request())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Malformed);
        assert!(!err.is_transient());
    }
}
