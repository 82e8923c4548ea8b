use serde::{Deserialize, Serialize};

/// One query window against the log backend. Immutable for the duration of a
/// fetch call; the realtime poller builds a fresh one per iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogQuery {
    pub project: String,
    pub log_store: String,

    /// Window start, unix seconds (inclusive).
    pub time_start: i64,

    /// Window end, unix seconds.
    pub time_end: i64,

    /// Topic the backend indexes lines under (the service name).
    pub topic: String,

    /// Full-text query term (the function name).
    pub query: String,
}

/// A raw line as returned by the log backend, with its opaque backend line id.
/// The backend hands lines back in its own order; that order is what the
/// correlation fold runs in, so it is preserved here as a `Vec`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub id: String,
    pub message: String,

    /// Emission time, unix seconds.
    #[serde(rename = "time")]
    pub emitted_at: i64,
}

/// Completion state the backend reports alongside each page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageProgress {
    Complete,
    Incomplete,
}

/// One page of query results plus the completion signals used to decide
/// whether the same window must be re-issued. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPage {
    pub lines: Vec<LogLine>,

    /// Total line count the backend claims for this window.
    pub reported_count: usize,

    pub progress: PageProgress,
}

impl LogPage {
    /// True once the page accounts for every line the backend claims to hold
    /// for the window and the backend itself reports completion. Both must
    /// hold at once; either alone can be a stale read.
    pub fn is_complete(&self) -> bool {
        self.lines.len() == self.reported_count && self.progress == PageProgress::Complete
    }
}

/// Retention and ingestion-parallelism parameters for a log store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LogStoreParams {
    /// Retention period.
    pub ttl: u32,

    /// Parallel-ingestion partition count.
    pub shard_count: u32,
}

impl Default for LogStoreParams {
    fn default() -> Self {
        Self {
            ttl: 3600,
            shard_count: 1,
        }
    }
}

/// Search index configuration for a log store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSpec {
    pub ttl_days: u32,
    pub case_sensitive: bool,

    /// Token-boundary character set for line tokenization.
    pub tokens: Vec<char>,
}

impl Default for IndexSpec {
    /// Matches the backend console's default: 10-day retention,
    /// case-insensitive line tokenization over punctuation and whitespace.
    fn default() -> Self {
        Self {
            ttl_days: 10,
            case_sensitive: false,
            tokens: ", '\";=()[]{}?@&<>/:\n\t\r".chars().collect(),
        }
    }
}

/// Temporary registry credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryToken {
    pub user: String,
    pub password: String,
}
