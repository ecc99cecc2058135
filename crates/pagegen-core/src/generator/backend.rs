//! Text-generation backends.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GeneratorSettings;
use crate::{Error, Result};

/// A service that turns a prompt into prose.
///
/// Implementations are treated as unreliable: any failure surfaces as
/// [`Error::Generation`] from the generator.
#[async_trait]
pub trait TextBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Model name recorded in generation results.
    fn model(&self) -> &str;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    text: String,
}

/// JSON-over-HTTP backend.
///
/// Posts `{"model", "prompt"}` to the endpoint and expects `{"text"}` back.
pub struct HttpBackend {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid endpoint URL and
    /// [`Error::Network`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        url::Url::parse(&endpoint)
            .map_err(|e| Error::Config(format!("invalid generator endpoint '{endpoint}': {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pagegen/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: model.into(),
        })
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] when no endpoint is configured.
    pub fn from_settings(settings: &GeneratorSettings) -> Result<Self> {
        let endpoint = settings
            .endpoint
            .clone()
            .ok_or_else(|| Error::Config("no generator endpoint configured".to_string()))?;
        Self::new(
            endpoint,
            settings.api_key.clone(),
            settings.model.clone(),
            Duration::from_millis(settings.timeout_ms),
        )
    }
}

#[async_trait]
impl TextBackend for HttpBackend {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut request = self.client.post(&self.endpoint).json(&CompletionRequest {
            model: &self.model,
            prompt,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Generation(format!("backend request timed out: {e}"))
            } else {
                Error::Generation(format!("backend unreachable: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Generation(format!("backend returned {status}")));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Generation(format!("malformed backend reply: {e}")))?;
        debug!(chars = body.text.len(), "backend completion received");
        Ok(body.text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path},
    };

    async fn backend_for(server: &MockServer, timeout: Duration) -> HttpBackend {
        HttpBackend::new(
            format!("{}/v1/complete", server.uri()),
            Some("secret".to_string()),
            "gemini-pro",
            timeout,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_posts_prompt_with_bearer_auth() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/complete"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(serde_json::json!({
                "model": "gemini-pro",
                "prompt": "Write about forex"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "text": "Forex is..." })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend_for(&server, Duration::from_secs(5)).await;
        assert_eq!(backend.complete("Write about forex").await?, "Forex is...");
        assert_eq!(backend.model(), "gemini-pro");
        Ok(())
    }

    #[tokio::test]
    async fn test_server_error_is_generation_failure() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let backend = backend_for(&server, Duration::from_secs(5)).await;
        let err = backend.complete("prompt").await.unwrap_err();
        assert!(matches!(err, Error::Generation(ref msg) if msg.contains("503")));
        assert!(err.is_recoverable());
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_reply_is_generation_failure() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let backend = backend_for(&server, Duration::from_secs(5)).await;
        assert!(matches!(
            backend.complete("prompt").await,
            Err(Error::Generation(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "text": "late" }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let backend = backend_for(&server, Duration::from_millis(100)).await;
        let err = backend.complete("prompt").await.unwrap_err();
        assert!(matches!(err, Error::Generation(ref msg) if msg.contains("timed out")));
        Ok(())
    }

    #[test]
    fn test_missing_endpoint_is_config_error() {
        let err = HttpBackend::from_settings(&GeneratorSettings::default()).err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        let result = HttpBackend::new("not a url", None, "m", Duration::from_secs(1));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
