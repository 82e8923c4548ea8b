use crate::backend::error::BackendError;
use crate::backend::traits::LogBackend;
use crate::backend::types::LogQuery;
use crate::correlate::{Correlator, LogMap};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("log backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("query window did not complete after {0} polls")]
    Incomplete(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Delay between re-issues of the same window. The backend is eventually
    /// consistent; polling it back-to-back would just hot-loop.
    #[serde(default = "default_poll_delay_ms")]
    pub poll_delay_ms: u64,

    /// Ceiling on re-issues of one window before giving up.
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

fn default_poll_delay_ms() -> u64 {
    200
}

fn default_max_polls() -> u32 {
    120
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            poll_delay_ms: default_poll_delay_ms(),
            max_polls: default_max_polls(),
        }
    }
}

/// Pulls one consistent window of logs out of the backend.
///
/// A single query is re-issued, without touching the time window, until the
/// backend hands back a page whose line count equals its reported total and
/// whose progress flag reads complete. An empty page means the window has not
/// materialized yet and counts as incomplete. The last page is the one that
/// gets assembled; earlier pages are partial snapshots of the same window.
pub struct LogFetcher {
    backend: Arc<dyn LogBackend>,
    correlator: Correlator,
    config: FetchConfig,
}

impl LogFetcher {
    pub fn new(backend: Arc<dyn LogBackend>, config: FetchConfig) -> Self {
        Self {
            backend,
            correlator: Correlator::new(),
            config,
        }
    }

    pub async fn fetch(&self, query: &LogQuery) -> Result<LogMap, FetchError> {
        let mut polls = 0u32;

        loop {
            if polls >= self.config.max_polls {
                return Err(FetchError::Incomplete(polls));
            }
            polls += 1;

            let page = self.backend.get_logs(query).await?;

            if page.lines.is_empty() {
                debug!(
                    poll = polls,
                    from = query.time_start,
                    to = query.time_end,
                    "empty page, window not yet materialized"
                );
                tokio::time::sleep(Duration::from_millis(self.config.poll_delay_ms)).await;
                continue;
            }

            if page.is_complete() {
                return Ok(self.correlator.fold(&page.lines));
            }

            debug!(
                poll = polls,
                observed = page.lines.len(),
                reported = page.reported_count,
                progress = ?page.progress,
                "partial page, re-issuing query"
            );
            tokio::time::sleep(Duration::from_millis(self.config.poll_delay_ms)).await;
        }
    }
}
