//! Provisioning tests: idempotency, error classification, and the
//! no-retry-on-fatal guarantee, against a scripted backend.

use async_trait::async_trait;
use logship::backend::{
    BackendError, IndexSpec, LogBackend, LogPage, LogQuery, LogStoreParams, RegistryBackend,
    RegistryToken,
};
use logship::provision::{ProvisionError, Provisioner, StoreOutcome};
use logship::registry::{RegistryClient, RegistryError};
use logship::retry::RetryConfig;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

type Script = Mutex<VecDeque<Result<(), BackendError>>>;

fn script(results: Vec<Result<(), BackendError>>) -> Script {
    Mutex::new(results.into())
}

fn next(script: &Script, method: &str) -> Result<(), BackendError> {
    script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| panic!("unscripted call to {method}"))
}

/// Backend whose get/create/update responses are scripted per method, with
/// call counters for the mutation paths.
#[derive(Default)]
struct MockBackend {
    get_project: Script,
    create_project: Script,
    get_log_store: Script,
    create_log_store: Script,
    update_log_store: Script,
    get_index: Script,
    create_index: Script,

    get_project_calls: AtomicU32,
    create_project_calls: AtomicU32,
    create_store_calls: AtomicU32,
    update_store_calls: AtomicU32,
    create_index_calls: AtomicU32,
}

#[async_trait]
impl LogBackend for MockBackend {
    async fn get_logs(&self, _query: &LogQuery) -> Result<LogPage, BackendError> {
        unimplemented!("not used by provisioning tests")
    }

    async fn get_project(&self, _name: &str) -> Result<(), BackendError> {
        self.get_project_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.get_project, "get_project")
    }

    async fn create_project(&self, _name: &str, _description: &str) -> Result<(), BackendError> {
        self.create_project_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.create_project, "create_project")
    }

    async fn delete_project(&self, _name: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn get_log_store(&self, _project: &str, _name: &str) -> Result<(), BackendError> {
        next(&self.get_log_store, "get_log_store")
    }

    async fn create_log_store(
        &self,
        _project: &str,
        _name: &str,
        _params: &LogStoreParams,
    ) -> Result<(), BackendError> {
        self.create_store_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.create_log_store, "create_log_store")
    }

    async fn update_log_store(
        &self,
        _project: &str,
        _name: &str,
        _params: &LogStoreParams,
    ) -> Result<(), BackendError> {
        self.update_store_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.update_log_store, "update_log_store")
    }

    async fn get_index_config(&self, _project: &str, _log_store: &str) -> Result<(), BackendError> {
        next(&self.get_index, "get_index_config")
    }

    async fn create_index(
        &self,
        _project: &str,
        _log_store: &str,
        _spec: &IndexSpec,
    ) -> Result<(), BackendError> {
        self.create_index_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.create_index, "create_index")
    }
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 2,
    }
}

fn provisioner(backend: Arc<MockBackend>) -> Provisioner {
    Provisioner::new(backend, fast_retry(), "123456789", "us-west-1")
}

fn absent(code: &str) -> Result<(), BackendError> {
    Err(BackendError::new(code, "does not exist"))
}

#[tokio::test]
async fn test_ensure_project_creates_when_absent() {
    let backend = Arc::new(MockBackend {
        get_project: script(vec![absent("ProjectNotExist")]),
        create_project: script(vec![Ok(())]),
        ..Default::default()
    });

    let created = provisioner(backend.clone())
        .ensure_project("proj", "desc")
        .await
        .unwrap();

    assert!(created);
    assert_eq!(backend.create_project_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ensure_project_noop_when_present() {
    let backend = Arc::new(MockBackend {
        get_project: script(vec![Ok(())]),
        ..Default::default()
    });

    let created = provisioner(backend.clone())
        .ensure_project("proj", "desc")
        .await
        .unwrap();

    assert!(!created);
    assert_eq!(backend.create_project_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unauthorized_lookup_aborts_without_retry() {
    let backend = Arc::new(MockBackend {
        get_project: script(vec![Err(BackendError::new("Unauthorized", "denied"))]),
        ..Default::default()
    });

    let result = provisioner(backend.clone()).ensure_project("proj", "desc").await;

    assert!(matches!(
        result,
        Err(ProvisionError::ProjectOwnedElsewhere { .. })
    ));
    assert_eq!(backend.get_project_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.create_project_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_transient_lookup_error_is_retried() {
    let backend = Arc::new(MockBackend {
        get_project: script(vec![
            Err(BackendError::new("InternalServerError", "flaky")),
            absent("ProjectNotExist"),
        ]),
        create_project: script(vec![Ok(())]),
        ..Default::default()
    });

    let created = provisioner(backend.clone())
        .ensure_project("proj", "desc")
        .await
        .unwrap();

    assert!(created);
    assert_eq!(backend.get_project_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalid_access_key_on_create_is_fatal() {
    let backend = Arc::new(MockBackend {
        get_project: script(vec![absent("ProjectNotExist")]),
        create_project: script(vec![Err(BackendError::new(
            "InvalidAccessKeyId",
            "bad key",
        ))]),
        ..Default::default()
    });

    let result = provisioner(backend.clone()).ensure_project("proj", "desc").await;

    assert!(matches!(
        result,
        Err(ProvisionError::InvalidCredentials { .. })
    ));
    assert_eq!(backend.create_project_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ensure_log_store_twice_creates_once() {
    let backend = Arc::new(MockBackend {
        get_log_store: script(vec![absent("LogStoreNotExist"), Ok(())]),
        create_log_store: script(vec![Ok(())]),
        update_log_store: script(vec![Ok(())]),
        ..Default::default()
    });
    let provisioner = provisioner(backend.clone());
    let params = LogStoreParams::default();

    let first = provisioner
        .ensure_log_store("proj", "store", params)
        .await
        .unwrap();
    let second = provisioner
        .ensure_log_store("proj", "store", params)
        .await
        .unwrap();

    assert_eq!(first, StoreOutcome::Created);
    assert_eq!(second, StoreOutcome::Updated);
    assert_eq!(backend.create_store_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.update_store_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_store_update_conflict_is_not_retried() {
    let backend = Arc::new(MockBackend {
        get_log_store: script(vec![Ok(())]),
        update_log_store: script(vec![Err(BackendError::new(
            "BadRequest",
            "no parameter changed",
        ))]),
        ..Default::default()
    });

    let result = provisioner(backend.clone())
        .ensure_log_store("proj", "store", LogStoreParams::default())
        .await;

    assert!(matches!(result, Err(ProvisionError::StoreConflict { .. })));
    assert_eq!(backend.update_store_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ensure_index_keeps_existing_config() {
    let backend = Arc::new(MockBackend {
        get_index: script(vec![Ok(())]),
        ..Default::default()
    });

    let created = provisioner(backend.clone())
        .ensure_index("proj", "store")
        .await
        .unwrap();

    assert!(!created);
    assert_eq!(backend.create_index_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ensure_index_creates_default_when_absent() {
    let backend = Arc::new(MockBackend {
        get_index: script(vec![absent("IndexConfigNotExist")]),
        create_index: script(vec![Ok(())]),
        ..Default::default()
    });

    let created = provisioner(backend.clone())
        .ensure_index("proj", "store")
        .await
        .unwrap();

    assert!(created);
    assert_eq!(backend.create_index_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_exhaustion_surfaces_last_error() {
    let backend = Arc::new(MockBackend {
        get_project: script(vec![
            Err(BackendError::new("InternalServerError", "flaky")),
            Err(BackendError::new("InternalServerError", "flaky")),
            Err(BackendError::new("InternalServerError", "flaky")),
        ]),
        ..Default::default()
    });

    let result = provisioner(backend.clone()).project_exists("proj").await;

    match result {
        Err(ProvisionError::Retry(err)) => {
            assert_eq!(err.backend_error().code, "InternalServerError");
        }
        other => panic!("expected retry exhaustion, got {other:?}"),
    }
    assert_eq!(backend.get_project_calls.load(Ordering::SeqCst), 3);
}

// ===== Registry =====

#[derive(Default)]
struct MockRegistry {
    get_namespace: Script,
    create_namespace: Script,
    create_calls: AtomicU32,
}

#[async_trait]
impl RegistryBackend for MockRegistry {
    async fn get_namespace(&self, _name: &str) -> Result<(), BackendError> {
        next(&self.get_namespace, "get_namespace")
    }

    async fn create_namespace(&self, _name: &str) -> Result<(), BackendError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        next(&self.create_namespace, "create_namespace")
    }

    async fn get_authorization_token(&self) -> Result<RegistryToken, BackendError> {
        Ok(RegistryToken {
            user: "temp-user".to_string(),
            password: "token".to_string(),
        })
    }
}

#[tokio::test]
async fn test_ensure_namespace_creates_when_absent() {
    let backend = Arc::new(MockRegistry {
        get_namespace: script(vec![absent("NAMESPACE_NOT_EXIST")]),
        create_namespace: script(vec![Ok(())]),
        ..Default::default()
    });

    let client = RegistryClient::new(backend.clone(), fast_retry());
    assert!(client.ensure_namespace("my-ns").await.unwrap());
    assert_eq!(backend.create_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ensure_namespace_noop_when_present() {
    let backend = Arc::new(MockRegistry {
        get_namespace: script(vec![Ok(())]),
        ..Default::default()
    });

    let client = RegistryClient::new(backend.clone(), fast_retry());
    assert!(!client.ensure_namespace("my-ns").await.unwrap());
    assert_eq!(backend.create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_namespace_create_failure_echoes_diagnostics() {
    let backend = Arc::new(MockRegistry {
        get_namespace: script(vec![absent("NAMESPACE_NOT_EXIST")]),
        create_namespace: script(vec![Err(BackendError::new(
            "NAMESPACE_QUOTA_EXCEEDED",
            "too many namespaces",
        ))]),
        ..Default::default()
    });

    let client = RegistryClient::new(backend, fast_retry());
    match client.ensure_namespace("my-ns").await {
        Err(RegistryError::CreateFailed { name, code, .. }) => {
            assert_eq!(name, "my-ns");
            assert_eq!(code, "NAMESPACE_QUOTA_EXCEEDED");
        }
        other => panic!("expected create failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_authorization_token_passthrough() {
    let backend = Arc::new(MockRegistry::default());
    let client = RegistryClient::new(backend, fast_retry());

    let token = client.authorization_token().await.unwrap();
    assert_eq!(token.user, "temp-user");
    assert_eq!(token.password, "token");
}
