use super::error::BackendError;
use super::types::{IndexSpec, LogPage, LogQuery, LogStoreParams, RegistryToken};
use async_trait::async_trait;

/// Capability boundary for the log backend. The get-style operations signal
/// absence through `BackendError` codes classified `ErrorClass::Absent`;
/// callers must branch on classification rather than treat every `Err` as a
/// failure.
#[async_trait]
pub trait LogBackend: Send + Sync {
    async fn get_logs(&self, query: &LogQuery) -> Result<LogPage, BackendError>;

    async fn get_project(&self, name: &str) -> Result<(), BackendError>;
    async fn create_project(&self, name: &str, description: &str) -> Result<(), BackendError>;
    async fn delete_project(&self, name: &str) -> Result<(), BackendError>;

    async fn get_log_store(&self, project: &str, name: &str) -> Result<(), BackendError>;
    async fn create_log_store(
        &self,
        project: &str,
        name: &str,
        params: &LogStoreParams,
    ) -> Result<(), BackendError>;
    async fn update_log_store(
        &self,
        project: &str,
        name: &str,
        params: &LogStoreParams,
    ) -> Result<(), BackendError>;

    async fn get_index_config(&self, project: &str, log_store: &str) -> Result<(), BackendError>;
    async fn create_index(
        &self,
        project: &str,
        log_store: &str,
        spec: &IndexSpec,
    ) -> Result<(), BackendError>;
}

/// Capability boundary for the container registry.
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    async fn get_namespace(&self, name: &str) -> Result<(), BackendError>;
    async fn create_namespace(&self, name: &str) -> Result<(), BackendError>;
    async fn get_authorization_token(&self) -> Result<RegistryToken, BackendError>;
}
