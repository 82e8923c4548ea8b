use crate::fetch::FetchConfig;
use crate::retry::RetryConfig;
use crate::stream::StreamConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub endpoint: EndpointConfig,
    pub account: AccountConfig,

    #[serde(default = "default_log_storage")]
    pub log: LogStorageConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub realtime: StreamConfig,
}

fn default_log_storage() -> LogStorageConfig {
    LogStorageConfig::Auto("auto".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL of the log backend API.
    pub log_url: String,

    /// Base URL of the container-registry API.
    pub registry_url: String,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub account_id: String,
    pub region: String,
}

/// Where execution logs live: either the `auto` marker, meaning a
/// deterministic default project and store are derived and provisioned, or an
/// explicit project/store pair the user owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogStorageConfig {
    Explicit { project: String, log_store: String },
    Auto(String),
}

impl LogStorageConfig {
    pub fn is_auto(&self) -> bool {
        matches!(self, LogStorageConfig::Auto(_))
    }
}

/// A concrete project/store pair after auto resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLogConfig {
    pub project: String,
    pub log_store: String,
}
