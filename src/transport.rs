use crate::backend::error::BackendError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// The narrow authenticated-request capability everything network-facing is
/// built on. Signing, credential refresh, and endpoint selection live behind
/// implementations of this trait; the backends only see
/// `request(method, path, query, body, headers)`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
        headers: &[(&str, String)],
    ) -> Result<Value, BackendError>;
}

/// Plain HTTPS implementation of [`Transport`].
#[derive(Debug)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
        headers: &[(&str, String)],
    ) -> Result<Value, BackendError> {
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| BackendError::new("InvalidRequest", format!("bad method: {method}")))?;

        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, &url).query(query);

        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::transport(e.to_string()))?;

        if !status.is_success() {
            return Err(parse_error_envelope(status.as_u16(), &text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| BackendError::new("InvalidResponse", format!("bad response body: {e}")))
    }
}

/// Pull the backend's structured error envelope out of a failed response.
/// Unstructured bodies are carried verbatim so nothing gets lost from the
/// failure report.
fn parse_error_envelope(status: u16, body: &str) -> BackendError {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let code = value
            .get("errorCode")
            .or_else(|| value.get("code"))
            .and_then(Value::as_str);
        let message = value
            .get("errorMessage")
            .or_else(|| value.get("message"))
            .and_then(Value::as_str);

        if let Some(code) = code {
            return BackendError::new(code, message.unwrap_or(body));
        }
    }

    BackendError::new(format!("Http{status}"), body)
}
