use super::error::BackendError;
use super::traits::{LogBackend, RegistryBackend};
use super::types::{IndexSpec, LogLine, LogPage, LogQuery, LogStoreParams, PageProgress, RegistryToken};
use crate::transport::Transport;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const JSON_HEADERS: &[(&str, &str)] = &[("Content-Type", "application/json")];

fn json_headers() -> Vec<(&'static str, String)> {
    JSON_HEADERS
        .iter()
        .map(|(name, value)| (*name, (*value).to_string()))
        .collect()
}

/// Log backend speaking the JSON API over a [`Transport`].
pub struct HttpLogBackend {
    transport: Arc<dyn Transport>,
}

impl HttpLogBackend {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, BackendError> {
        self.transport
            .request("GET", path, query, None, &json_headers())
            .await
    }

    async fn send(&self, method: &str, path: &str, body: Value) -> Result<(), BackendError> {
        self.transport
            .request(method, path, &[], Some(body), &json_headers())
            .await?;
        Ok(())
    }
}

/// Wire shape of a log query response.
#[derive(Debug, Deserialize)]
struct LogPageEnvelope {
    /// Lines in backend-returned order, each with its opaque line id.
    logs: Vec<LogLine>,

    /// Total count the backend claims for the window.
    count: usize,

    progress: String,
}

#[async_trait]
impl LogBackend for HttpLogBackend {
    async fn get_logs(&self, query: &LogQuery) -> Result<LogPage, BackendError> {
        let path = format!(
            "/projects/{}/logstores/{}/logs",
            query.project, query.log_store
        );
        let params = [
            ("from", query.time_start.to_string()),
            ("to", query.time_end.to_string()),
            ("topic", query.topic.clone()),
            ("query", query.query.clone()),
        ];

        let value = self.get(&path, &params).await?;
        let envelope: LogPageEnvelope = serde_json::from_value(value)
            .map_err(|e| BackendError::new("InvalidResponse", format!("bad log page: {e}")))?;

        let progress = if envelope.progress == "Complete" {
            PageProgress::Complete
        } else {
            PageProgress::Incomplete
        };

        Ok(LogPage {
            lines: envelope.logs,
            reported_count: envelope.count,
            progress,
        })
    }

    async fn get_project(&self, name: &str) -> Result<(), BackendError> {
        self.get(&format!("/projects/{name}"), &[]).await?;
        Ok(())
    }

    async fn create_project(&self, name: &str, description: &str) -> Result<(), BackendError> {
        self.send(
            "POST",
            "/projects",
            json!({ "projectName": name, "description": description }),
        )
        .await
    }

    async fn delete_project(&self, name: &str) -> Result<(), BackendError> {
        self.transport
            .request("DELETE", &format!("/projects/{name}"), &[], None, &json_headers())
            .await?;
        Ok(())
    }

    async fn get_log_store(&self, project: &str, name: &str) -> Result<(), BackendError> {
        self.get(&format!("/projects/{project}/logstores/{name}"), &[])
            .await?;
        Ok(())
    }

    async fn create_log_store(
        &self,
        project: &str,
        name: &str,
        params: &LogStoreParams,
    ) -> Result<(), BackendError> {
        self.send(
            "POST",
            &format!("/projects/{project}/logstores"),
            json!({
                "logstoreName": name,
                "ttl": params.ttl,
                "shardCount": params.shard_count,
            }),
        )
        .await
    }

    async fn update_log_store(
        &self,
        project: &str,
        name: &str,
        params: &LogStoreParams,
    ) -> Result<(), BackendError> {
        self.send(
            "PUT",
            &format!("/projects/{project}/logstores/{name}"),
            json!({ "ttl": params.ttl, "shardCount": params.shard_count }),
        )
        .await
    }

    async fn get_index_config(&self, project: &str, log_store: &str) -> Result<(), BackendError> {
        self.get(&format!("/projects/{project}/logstores/{log_store}/index"), &[])
            .await?;
        Ok(())
    }

    async fn create_index(
        &self,
        project: &str,
        log_store: &str,
        spec: &IndexSpec,
    ) -> Result<(), BackendError> {
        self.send(
            "POST",
            &format!("/projects/{project}/logstores/{log_store}/index"),
            json!({
                "ttl": spec.ttl_days,
                "line": {
                    "caseSensitive": spec.case_sensitive,
                    "token": spec.tokens.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
                },
            }),
        )
        .await
    }
}

/// Container-registry backend over a [`Transport`].
pub struct HttpRegistryBackend {
    transport: Arc<dyn Transport>,
}

impl HttpRegistryBackend {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[derive(Debug, Deserialize)]
struct TokenEnvelope {
    data: TokenData,
}

#[derive(Debug, Deserialize)]
struct TokenData {
    #[serde(rename = "tempUserName")]
    temp_user_name: String,
    #[serde(rename = "authorizationToken")]
    authorization_token: String,
}

#[async_trait]
impl RegistryBackend for HttpRegistryBackend {
    async fn get_namespace(&self, name: &str) -> Result<(), BackendError> {
        self.transport
            .request("GET", &format!("/namespace/{name}"), &[], None, &json_headers())
            .await?;
        Ok(())
    }

    async fn create_namespace(&self, name: &str) -> Result<(), BackendError> {
        self.transport
            .request(
                "PUT",
                "/namespace",
                &[],
                Some(json!({ "Namespace": { "Namespace": name } })),
                &json_headers(),
            )
            .await?;
        Ok(())
    }

    async fn get_authorization_token(&self) -> Result<RegistryToken, BackendError> {
        let value = self
            .transport
            .request("GET", "/tokens", &[], None, &json_headers())
            .await?;

        let envelope: TokenEnvelope = serde_json::from_value(value)
            .map_err(|e| BackendError::new("InvalidResponse", format!("bad token response: {e}")))?;

        Ok(RegistryToken {
            user: envelope.data.temp_user_name,
            password: envelope.data.authorization_token,
        })
    }
}
