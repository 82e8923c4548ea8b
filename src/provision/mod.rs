//! Idempotent provisioning of the log storage a deployment writes into:
//! project, log store, search index. Every operation is safe to re-run; the
//! existence check happens first and "not exist" backend codes are consumed
//! as negative lookups rather than failures.

use crate::backend::error::{BackendError, ErrorClass};
use crate::backend::traits::LogBackend;
use crate::backend::types::{IndexSpec, LogStoreParams};
use crate::config::types::{LogStorageConfig, ResolvedLogConfig};
use crate::retry::{Attempt, RetryConfig, RetryError, RetryPolicy};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_LOG_STORE: &str = "function-log";
const DEFAULT_PROJECT_DESCRIPTION: &str = "default log project created by logship";

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(
        "log project '{name}' may belong to another account; choose a unique project name"
    )]
    ProjectOwnedElsewhere { name: String },

    #[error(
        "create log project '{name}' failed with InvalidAccessKeyId; \
         enable the log service for this account and check the credentials"
    )]
    InvalidCredentials { name: String },

    #[error("log project '{name}' already exists, possibly in another region or account")]
    ProjectAlreadyExists { name: String },

    #[error("the log service is not enabled for this account; enable it in the console first")]
    ServiceDisabled,

    #[error("log store '{store}' could not be reconciled: {source}")]
    StoreConflict { store: String, source: BackendError },

    #[error("unauthorized: {0}")]
    Unauthorized(BackendError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Retry(#[from] RetryError),
}

/// Deterministic project name for `log: auto` deployments: stable across
/// runs for one account and region, so repeated deploys converge on the same
/// project instead of creating new ones.
pub fn default_project_name(account_id: &str, region: &str) -> String {
    let digest = Sha256::digest(account_id.as_bytes());
    // First 16 digest bytes rendered in UUID shape, which keeps the name
    // recognizable next to correlation ids in the same tooling.
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    let hash = uuid::Uuid::from_bytes(bytes);
    format!("fc-{region}-{hash}")
}

pub struct Provisioner {
    backend: Arc<dyn LogBackend>,
    retry: RetryPolicy,
    account_id: String,
    region: String,
}

impl Provisioner {
    pub fn new(
        backend: Arc<dyn LogBackend>,
        retry_config: RetryConfig,
        account_id: &str,
        region: &str,
    ) -> Self {
        Self {
            backend,
            retry: RetryPolicy::new(retry_config),
            account_id: account_id.to_string(),
            region: region.to_string(),
        }
    }

    pub fn default_log_config(&self) -> ResolvedLogConfig {
        ResolvedLogConfig {
            project: default_project_name(&self.account_id, &self.region),
            log_store: DEFAULT_LOG_STORE.to_string(),
        }
    }

    /// Resolves a log configuration, provisioning the full default stack
    /// (project, store, index) when the `auto` marker is used. Explicit
    /// configurations pass through untouched; the caller owns those
    /// resources.
    pub async fn transform_log_config(
        &self,
        config: &LogStorageConfig,
    ) -> Result<ResolvedLogConfig, ProvisionError> {
        match config {
            LogStorageConfig::Auto(_) => {
                info!("using 'log: auto'");
                let resolved = self.default_log_config();
                self.ensure_all(&resolved.project, DEFAULT_PROJECT_DESCRIPTION, &resolved.log_store)
                    .await?;
                info!(
                    project = %resolved.project,
                    log_store = %resolved.log_store,
                    "default log storage ready"
                );
                Ok(resolved)
            }
            LogStorageConfig::Explicit { project, log_store } => Ok(ResolvedLogConfig {
                project: project.clone(),
                log_store: log_store.clone(),
            }),
        }
    }

    /// Full default-provisioning sequence, in dependency order.
    pub async fn ensure_all(
        &self,
        project: &str,
        description: &str,
        log_store: &str,
    ) -> Result<(), ProvisionError> {
        self.ensure_project(project, description).await?;
        self.ensure_log_store(project, log_store, LogStoreParams::default())
            .await?;
        self.ensure_index(project, log_store).await?;
        Ok(())
    }

    pub async fn project_exists(&self, name: &str) -> Result<bool, ProvisionError> {
        let backend = Arc::clone(&self.backend);
        let name_owned = name.to_string();

        let result = self
            .retry
            .run(move |_attempt| {
                let backend = Arc::clone(&backend);
                let name = name_owned.clone();
                async move {
                    match backend.get_project(&name).await {
                        Ok(()) => Attempt::Done(true),
                        Err(err) => match err.classify() {
                            ErrorClass::Absent => Attempt::Done(false),
                            ErrorClass::Fatal => Attempt::Fatal(err),
                            _ => Attempt::Retry(err),
                        },
                    }
                }
            })
            .await;

        result.map_err(|err| match err {
            // Unauthorized on a read usually means the name is taken by a
            // different account, not that our credentials are broken.
            RetryError::Fatal(_) => ProvisionError::ProjectOwnedElsewhere {
                name: name.to_string(),
            },
            other => ProvisionError::Retry(other),
        })
    }

    /// Returns true when a create actually happened.
    pub async fn ensure_project(
        &self,
        name: &str,
        description: &str,
    ) -> Result<bool, ProvisionError> {
        if self.project_exists(name).await? {
            info!(project = %name, "log project already exists");
            return Ok(false);
        }

        info!(project = %name, "creating log project");
        self.create_project(name, description).await?;
        info!(project = %name, "log project created");
        Ok(true)
    }

    async fn create_project(&self, name: &str, description: &str) -> Result<(), ProvisionError> {
        let backend = Arc::clone(&self.backend);
        let name_owned = name.to_string();
        let description = description.to_string();

        let result = self
            .retry
            .run(move |attempt| {
                let backend = Arc::clone(&backend);
                let name = name_owned.clone();
                let description = description.clone();
                async move {
                    match backend.create_project(&name, &description).await {
                        Ok(()) => Attempt::Done(()),
                        Err(err) => match err.code.as_str() {
                            // ProjectNotExist from a *create* means the log
                            // service itself has never been enabled.
                            "InvalidAccessKeyId" | "Unauthorized" | "ProjectAlreadyExist"
                            | "ProjectNotExist" => Attempt::Fatal(err),
                            _ => {
                                warn!(attempt, project = %name, error = %err, "create project failed");
                                Attempt::Retry(err)
                            }
                        },
                    }
                }
            })
            .await;

        result.map_err(|err| match err {
            RetryError::Fatal(e) => match e.code.as_str() {
                "InvalidAccessKeyId" => ProvisionError::InvalidCredentials {
                    name: name.to_string(),
                },
                "ProjectAlreadyExist" => ProvisionError::ProjectAlreadyExists {
                    name: name.to_string(),
                },
                "ProjectNotExist" => ProvisionError::ServiceDisabled,
                _ => ProvisionError::Unauthorized(e),
            },
            other => ProvisionError::Retry(other),
        })
    }

    pub async fn log_store_exists(
        &self,
        project: &str,
        name: &str,
    ) -> Result<bool, ProvisionError> {
        let backend = Arc::clone(&self.backend);
        let project = project.to_string();
        let name = name.to_string();

        let result = self
            .retry
            .run(move |_attempt| {
                let backend = Arc::clone(&backend);
                let project = project.clone();
                let name = name.clone();
                async move {
                    match backend.get_log_store(&project, &name).await {
                        Ok(()) => Attempt::Done(true),
                        Err(err) => match err.classify() {
                            ErrorClass::Absent => Attempt::Done(false),
                            ErrorClass::Fatal => Attempt::Fatal(err),
                            _ => Attempt::Retry(err),
                        },
                    }
                }
            })
            .await;

        result.map_err(|err| match err {
            RetryError::Fatal(e) => ProvisionError::Unauthorized(e),
            other => ProvisionError::Retry(other),
        })
    }

    /// Creates the store if absent, otherwise reconciles ttl and shard count
    /// through an update. A "no parameter changed" or parameter-invalid
    /// response is surfaced as [`ProvisionError::StoreConflict`] without
    /// retrying: either the store already matches or it cannot be reconciled,
    /// and another attempt cannot change that. Returns what happened.
    pub async fn ensure_log_store(
        &self,
        project: &str,
        name: &str,
        params: LogStoreParams,
    ) -> Result<StoreOutcome, ProvisionError> {
        if !self.log_store_exists(project, name).await? {
            info!(project = %project, log_store = %name, "creating log store");
            self.create_log_store(project, name, params).await?;
            info!(log_store = %name, "log store created");
            return Ok(StoreOutcome::Created);
        }

        info!(log_store = %name, "log store already exists, reconciling parameters");
        self.update_log_store(project, name, params).await?;
        Ok(StoreOutcome::Updated)
    }

    async fn create_log_store(
        &self,
        project: &str,
        name: &str,
        params: LogStoreParams,
    ) -> Result<(), ProvisionError> {
        let backend = Arc::clone(&self.backend);
        let project = project.to_string();
        let name_owned = name.to_string();

        let result = self
            .retry
            .run(move |attempt| {
                let backend = Arc::clone(&backend);
                let project = project.clone();
                let name = name_owned.clone();
                async move {
                    match backend.create_log_store(&project, &name, &params).await {
                        Ok(()) => Attempt::Done(()),
                        Err(err) => match err.classify() {
                            ErrorClass::Fatal => Attempt::Fatal(err),
                            _ => {
                                warn!(attempt, log_store = %name, error = %err, "create log store failed");
                                Attempt::Retry(err)
                            }
                        },
                    }
                }
            })
            .await;

        result.map_err(|err| match err {
            RetryError::Fatal(e) => ProvisionError::Unauthorized(e),
            other => ProvisionError::Retry(other),
        })
    }

    async fn update_log_store(
        &self,
        project: &str,
        name: &str,
        params: LogStoreParams,
    ) -> Result<(), ProvisionError> {
        let backend = Arc::clone(&self.backend);
        let project = project.to_string();
        let name_owned = name.to_string();

        let result = self
            .retry
            .run(move |attempt| {
                let backend = Arc::clone(&backend);
                let project = project.clone();
                let name = name_owned.clone();
                async move {
                    match backend.update_log_store(&project, &name, &params).await {
                        Ok(()) => Attempt::Done(()),
                        Err(err) => match err.classify() {
                            ErrorClass::Fatal | ErrorClass::Conflict => Attempt::Fatal(err),
                            _ => {
                                warn!(attempt, log_store = %name, error = %err, "update log store failed");
                                Attempt::Retry(err)
                            }
                        },
                    }
                }
            })
            .await;

        result.map_err(|err| match err {
            RetryError::Fatal(e) => match e.classify() {
                ErrorClass::Conflict => ProvisionError::StoreConflict {
                    store: name.to_string(),
                    source: e,
                },
                _ => ProvisionError::Unauthorized(e),
            },
            other => ProvisionError::Retry(other),
        })
    }

    /// Creates the default search index if the store has none. An index that
    /// already exists is left exactly as found; the first successful
    /// configuration wins and is never reconciled afterwards. Returns true
    /// when a create happened.
    pub async fn ensure_index(&self, project: &str, log_store: &str) -> Result<bool, ProvisionError> {
        let backend = Arc::clone(&self.backend);
        let project = project.to_string();
        let log_store = log_store.to_string();

        let result = self
            .retry
            .run(move |attempt| {
                let backend = Arc::clone(&backend);
                let project = project.clone();
                let log_store = log_store.clone();
                async move {
                    match backend.get_index_config(&project, &log_store).await {
                        Ok(()) => return Attempt::Done(false),
                        Err(err) => match err.classify() {
                            ErrorClass::Absent => {}
                            ErrorClass::Fatal => return Attempt::Fatal(err),
                            _ => return Attempt::Retry(err),
                        },
                    }

                    info!(project = %project, log_store = %log_store, "generating log store index");
                    match backend
                        .create_index(&project, &log_store, &IndexSpec::default())
                        .await
                    {
                        Ok(()) => {
                            info!(log_store = %log_store, "log store index generated");
                            Attempt::Done(true)
                        }
                        Err(err) => match err.classify() {
                            ErrorClass::Fatal => Attempt::Fatal(err),
                            _ => {
                                warn!(attempt, log_store = %log_store, error = %err, "create index failed");
                                Attempt::Retry(err)
                            }
                        },
                    }
                }
            })
            .await;

        result.map_err(|err| match err {
            RetryError::Fatal(e) => ProvisionError::Unauthorized(e),
            other => ProvisionError::Retry(other),
        })
    }

    /// Tears down the auto-generated default project, if it exists. Refuses
    /// to act without `force`; deletion takes the stored logs with it.
    pub async fn delete_default_project(&self, force: bool) -> Result<bool, ProvisionError> {
        let config = self.default_log_config();

        if !self.project_exists(&config.project).await? {
            return Ok(false);
        }

        info!(project = %config.project, "found auto-generated log project");
        if !force {
            warn!(
                project = %config.project,
                "refusing to delete without --force"
            );
            return Ok(false);
        }

        info!(project = %config.project, "deleting log project");
        self.backend
            .delete_project(&config.project)
            .await
            .map_err(|e| match e.classify() {
                ErrorClass::Fatal => ProvisionError::Unauthorized(e),
                _ => ProvisionError::Backend(e),
            })?;
        info!(project = %config.project, "log project deleted");
        Ok(true)
    }
}

/// What `ensure_log_store` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Created,
    Updated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_project_name_is_stable() {
        let a = default_project_name("123456789", "us-west-1");
        let b = default_project_name("123456789", "us-west-1");
        assert_eq!(a, b);
        assert!(a.starts_with("fc-us-west-1-"));
    }

    #[test]
    fn test_default_project_name_varies_by_account_and_region() {
        let base = default_project_name("123456789", "us-west-1");
        assert_ne!(base, default_project_name("987654321", "us-west-1"));
        assert_ne!(base, default_project_name("123456789", "eu-central-1"));
    }
}
