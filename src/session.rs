//! The operations the CLI (and other orchestration callers) consume:
//! one-shot history queries and realtime tailing, both running the
//! fetch -> correlate -> filter pipeline.

use crate::backend::traits::LogBackend;
use crate::backend::types::LogQuery;
use crate::correlate::{LogMap, LogRecord};
use crate::fetch::{FetchConfig, FetchError, LogFetcher};
use crate::filter;
use crate::stream::{RealtimeStreamer, StreamConfig};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Parameters of a history query. The time window is in unix seconds; the
/// optional fields narrow the assembled result after fetching.
#[derive(Debug, Clone)]
pub struct HistoryRequest {
    pub project: String,
    pub log_store: String,
    pub time_start: i64,
    pub time_end: i64,
    pub service: String,
    pub function: String,
    pub query: Option<String>,
    pub correlation_id: Option<String>,
    pub errors_only: bool,
}

pub struct LogSession {
    backend: Arc<dyn LogBackend>,
    fetch_config: FetchConfig,
    stream_config: StreamConfig,
}

impl LogSession {
    pub fn new(
        backend: Arc<dyn LogBackend>,
        fetch_config: FetchConfig,
        stream_config: StreamConfig,
    ) -> Self {
        Self {
            backend,
            fetch_config,
            stream_config,
        }
    }

    /// Fetches one window and narrows it: correlation-id filter first, then
    /// substring query, then the error heuristic. Messages come back with
    /// carriage returns normalized to newlines.
    pub async fn history(&self, request: &HistoryRequest) -> Result<LogMap, FetchError> {
        let query = LogQuery {
            project: request.project.clone(),
            log_store: request.log_store.clone(),
            time_start: request.time_start,
            time_end: request.time_end,
            topic: request.service.clone(),
            query: request.function.clone(),
        };

        info!(
            project = %query.project,
            log_store = %query.log_store,
            from = query.time_start,
            to = query.time_end,
            "fetching history window"
        );

        let fetcher = LogFetcher::new(Arc::clone(&self.backend), self.fetch_config.clone());
        let mut logs = filter::replace_line_breaks(fetcher.fetch(&query).await?);

        if let Some(id) = &request.correlation_id {
            logs = filter::by_correlation_id(logs, id);
        }
        if let Some(text) = &request.query {
            logs = filter::by_query(logs, text);
        }
        if request.errors_only {
            logs = filter::by_error_heuristic(logs);
        }

        Ok(logs)
    }

    /// Tails the backend until the session budget runs out or `cancel` flips,
    /// handing each new record to `emit` exactly once.
    pub async fn realtime<F>(
        &self,
        project: &str,
        log_store: &str,
        service: &str,
        function: &str,
        cancel: watch::Receiver<bool>,
        emit: F,
    ) -> Result<(), FetchError>
    where
        F: FnMut(&LogRecord),
    {
        let fetcher = LogFetcher::new(Arc::clone(&self.backend), self.fetch_config.clone());
        let streamer = RealtimeStreamer::new(fetcher, self.stream_config.clone());
        streamer
            .run(project, log_store, service, function, cancel, emit)
            .await
    }
}

/// Orders an assembled mapping by record timestamp for display.
pub fn sorted_records(logs: &LogMap) -> Vec<&LogRecord> {
    let mut records: Vec<&LogRecord> = logs.values().collect();
    records.sort_by_key(|record| record.timestamp);
    records
}
