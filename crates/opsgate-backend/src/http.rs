//! JSON-over-HTTP reasoning backend.
//!
//! Each call POSTs the full `BackendRequest` (task, input, context, schema)
//! as JSON to one endpoint and expects the structured answer as the JSON
//! response body. Transport errors, non-2xx statuses, and bodies that are
//! not JSON all surface as `BackendUnavailable`. The gateway enforces its
//! own timeout on top of the client's.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use opsgate_contracts::{
    backend::BackendRequest,
    error::{OpsgateError, OpsgateResult},
};
use opsgate_core::traits::ReasoningBackend;

fn default_timeout_secs() -> u64 {
    30
}

/// Connection settings for an HTTP reasoning backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpBackendConfig {
    pub endpoint: String,
    /// Sent as `Authorization: Bearer <token>` when set.
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl HttpBackendConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), auth_token: None, timeout_secs: default_timeout_secs() }
    }

    /// Read `OPSGATE_BACKEND_URL` and the optional `OPSGATE_BACKEND_TOKEN`.
    pub fn from_env() -> OpsgateResult<Self> {
        let endpoint = std::env::var("OPSGATE_BACKEND_URL").map_err(|_| OpsgateError::ConfigError {
            reason: "OPSGATE_BACKEND_URL is not set".to_string(),
        })?;
        Ok(Self { auth_token: std::env::var("OPSGATE_BACKEND_TOKEN").ok(), ..Self::new(endpoint) })
    }
}

pub struct HttpReasoningBackend {
    config: HttpBackendConfig,
    client: reqwest::Client,
}

impl HttpReasoningBackend {
    pub fn new(config: HttpBackendConfig) -> OpsgateResult<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(OpsgateError::ConfigError { reason: "backend endpoint is empty".to_string() });
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("opsgate/0.1"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| OpsgateError::ConfigError { reason: format!("failed to create HTTP client: {}", e) })?;

        Ok(Self { config, client })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

fn unavailable(reason: String) -> OpsgateError {
    OpsgateError::BackendUnavailable { reason }
}

#[async_trait]
impl ReasoningBackend for HttpReasoningBackend {
    async fn invoke(&self, request: &BackendRequest) -> OpsgateResult<Value> {
        let task = request.task.as_str();
        let mut builder = self.client.post(&self.config.endpoint).json(request);
        if let Some(token) = &self.config.auth_token {
            builder = builder.bearer_auth(token);
        }

        debug!(endpoint = %self.config.endpoint, task, "posting backend request");
        let response = builder
            .send()
            .await
            .map_err(|e| unavailable(format!("{task} request to {} failed: {}", self.config.endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(endpoint = %self.config.endpoint, task, %status, "backend returned an error status");
            return Err(unavailable(format!("{task} request returned HTTP {status}: {body}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| unavailable(format!("failed to read {task} response: {}", e)))?;
        serde_json::from_str(&text).map_err(|e| unavailable(format!("{task} response is not JSON: {}", e)))
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use opsgate_contracts::backend::{BackendTask, ResponseSchema};

    use super::*;

    fn request() -> BackendRequest {
        BackendRequest {
            task: BackendTask::Classify,
            input: "Show me all assets".to_string(),
            context: json!({}),
            schema: ResponseSchema { schema_id: "test.v1".to_string(), json_schema: Value::Null, rules: vec![] },
        }
    }

    /// Serve one HTTP response on a local port and return its URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower.strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if received.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}/v1/reason")
    }

    #[tokio::test]
    async fn returns_json_body() {
        let url = serve_once("200 OK", r#"{"category":"asset_management","action":"list","confidence":0.9}"#).await;
        let backend = HttpReasoningBackend::new(HttpBackendConfig::new(url)).unwrap();
        let value = backend.invoke(&request()).await.unwrap();
        assert_eq!(value["action"], "list");
    }

    #[tokio::test]
    async fn error_status_is_unavailable() {
        let url = serve_once("503 Service Unavailable", r#"{"error":"overloaded"}"#).await;
        let backend = HttpReasoningBackend::new(HttpBackendConfig::new(url)).unwrap();
        match backend.invoke(&request()).await {
            Err(OpsgateError::BackendUnavailable { reason }) => assert!(reason.contains("503")),
            other => panic!("expected BackendUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_json_body_is_unavailable() {
        let url = serve_once("200 OK", "certainly! here is your answer").await;
        let backend = HttpReasoningBackend::new(HttpBackendConfig::new(url)).unwrap();
        let result = backend.invoke(&request()).await;
        assert!(matches!(result, Err(OpsgateError::BackendUnavailable { .. })));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let backend = HttpReasoningBackend::new(HttpBackendConfig::new(format!("http://{addr}/"))).unwrap();
        let result = backend.invoke(&request()).await;
        assert!(matches!(result, Err(OpsgateError::BackendUnavailable { .. })));
    }

    #[test]
    fn empty_endpoint_is_a_config_error() {
        let result = HttpReasoningBackend::new(HttpBackendConfig::new("  "));
        assert!(matches!(result, Err(OpsgateError::ConfigError { .. })));
    }
}
