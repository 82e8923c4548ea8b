use crate::backend::types::LogQuery;
use crate::correlate::LogRecord;
use crate::fetch::{FetchError, LogFetcher};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Cadence between polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Lookback of each query window in seconds. Windows overlap on purpose;
    /// the dedup set keeps overlapping reads from double-emitting.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: i64,

    /// Iteration budget for a session. At the default 1 s cadence this caps a
    /// session at roughly 30 minutes.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_window_seconds() -> i64 {
    10
}

fn default_max_iterations() -> u32 {
    1800
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            window_seconds: default_window_seconds(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Polls a sliding window over the log backend and emits each record once, in
/// first-seen timestamp order.
///
/// Emitted records are remembered by timestamp for the life of the session.
/// Two distinct invocations sharing an emission second would suppress each
/// other; switching the key to (correlation id, timestamp) is a behavior
/// change waiting on a product decision.
///
/// The session ends when the iteration budget runs out or the cancellation
/// token flips, whichever comes first. The token is checked at every
/// suspension point: after the sleep, before the request goes out.
pub struct RealtimeStreamer {
    fetcher: LogFetcher,
    config: StreamConfig,
}

impl RealtimeStreamer {
    pub fn new(fetcher: LogFetcher, config: StreamConfig) -> Self {
        Self { fetcher, config }
    }

    pub async fn run<F>(
        &self,
        project: &str,
        log_store: &str,
        service: &str,
        function: &str,
        cancel: watch::Receiver<bool>,
        mut emit: F,
    ) -> Result<(), FetchError>
    where
        F: FnMut(&LogRecord),
    {
        let mut emitted_timestamps: HashSet<i64> = HashSet::new();
        let mut remaining = self.config.max_iterations;

        info!(
            project,
            log_store,
            service,
            function,
            budget = remaining,
            "starting realtime session"
        );

        while remaining > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
            remaining -= 1;

            if *cancel.borrow() {
                info!("realtime session cancelled");
                return Ok(());
            }

            let now = Utc::now().timestamp();
            let query = LogQuery {
                project: project.to_string(),
                log_store: log_store.to_string(),
                time_start: now - self.config.window_seconds,
                time_end: now,
                topic: service.to_string(),
                query: function.to_string(),
            };

            // A window that never materializes just has no logs; only real
            // backend failures end the session.
            let pulled = match self.fetcher.fetch(&query).await {
                Ok(logs) => logs,
                Err(FetchError::Incomplete(polls)) => {
                    debug!(polls, "window never completed, skipping iteration");
                    continue;
                }
                Err(err) => return Err(err),
            };
            if pulled.is_empty() {
                continue;
            }

            let mut fresh: Vec<LogRecord> = pulled
                .into_values()
                .filter(|record| !emitted_timestamps.contains(&record.timestamp))
                .collect();

            if fresh.is_empty() {
                debug!("window contained only already-emitted records");
                continue;
            }

            fresh.sort_by_key(|record| record.timestamp);

            for record in &mut fresh {
                record.message = record.message.replace('\r', "\n");
                emit(record);
                emitted_timestamps.insert(record.timestamp);
            }
        }

        info!("realtime session budget exhausted");
        Ok(())
    }
}
