//! Container-registry namespace client: the simpler sibling of the
//! provisioning orchestrator, reusing the same retry primitive and the same
//! expected-absent error convention.

use crate::backend::error::{BackendError, ErrorClass};
use crate::backend::traits::RegistryBackend;
use crate::backend::types::RegistryToken;
use crate::retry::{Attempt, RetryConfig, RetryError, RetryPolicy};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("create namespace '{name}' failed, code: {code}, message: {message}")]
    CreateFailed {
        name: String,
        code: String,
        message: String,
    },

    #[error("registry backend error: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Retry(#[from] RetryError),
}

pub struct RegistryClient {
    backend: Arc<dyn RegistryBackend>,
    retry: RetryPolicy,
}

impl RegistryClient {
    pub fn new(backend: Arc<dyn RegistryBackend>, retry_config: RetryConfig) -> Self {
        Self {
            backend,
            retry: RetryPolicy::new(retry_config),
        }
    }

    pub async fn namespace_exists(&self, name: &str) -> Result<bool, RegistryError> {
        let backend = Arc::clone(&self.backend);
        let name = name.to_string();

        let exists = self
            .retry
            .run(move |_attempt| {
                let backend = Arc::clone(&backend);
                let name = name.clone();
                async move {
                    match backend.get_namespace(&name).await {
                        Ok(()) => Attempt::Done(true),
                        Err(err) => match err.classify() {
                            ErrorClass::Absent => Attempt::Done(false),
                            ErrorClass::Fatal => Attempt::Fatal(err),
                            _ => Attempt::Retry(err),
                        },
                    }
                }
            })
            .await?;

        Ok(exists)
    }

    /// Creates the namespace if it does not exist. Any create failure is
    /// final: the namespace name and the backend's diagnostic code are echoed
    /// so the caller can act on them. Returns true when a create happened.
    pub async fn ensure_namespace(&self, name: &str) -> Result<bool, RegistryError> {
        if self.namespace_exists(name).await? {
            info!(namespace = %name, "namespace already exists");
            return Ok(false);
        }

        self.backend
            .create_namespace(name)
            .await
            .map_err(|e| RegistryError::CreateFailed {
                name: name.to_string(),
                code: e.code,
                message: e.message,
            })?;

        info!(namespace = %name, "namespace created");
        Ok(true)
    }

    pub async fn authorization_token(&self) -> Result<RegistryToken, RegistryError> {
        Ok(self.backend.get_authorization_token().await?)
    }
}
