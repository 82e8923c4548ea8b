use crate::backend::types::LogLine;
use chrono::{TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// UUID-shaped token embedded in log text, e.g.
/// `c9f3a1b2-4d5e-6f70-8192-a3b4c5d6e7f8`.
const CORRELATION_PATTERN: &str = r"\w{8}(-\w{4}){3}-\w{12}";

/// One logical per-invocation record assembled from raw lines. The message is
/// only ever appended to during assembly; timestamp and formatted time come
/// from the first line attributed to the correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub correlation_id: String,

    /// Unix seconds of the first attributed line.
    pub timestamp: i64,

    /// `timestamp` rendered as `YYYY-MM-DD H:mm:ss`.
    pub time: String,

    /// Concatenation of every attributed line, in fold order.
    pub message: String,
}

/// Assembled logs for one fetch window, keyed by correlation id.
pub type LogMap = HashMap<String, LogRecord>;

/// Folds raw lines into per-correlation-id records.
///
/// The fold carries one piece of state: the most recently seen correlation
/// id. A line containing a UUID-shaped token switches that state; every line
/// is then attributed to the current id, so continuation lines (stack traces,
/// wrapped output) stay with the invocation that produced them. Lines seen
/// before any id has appeared have no owner and are dropped.
#[derive(Debug)]
pub struct Correlator {
    pattern: Regex,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(CORRELATION_PATTERN).unwrap(),
        }
    }

    pub fn fold(&self, lines: &[LogLine]) -> LogMap {
        let mut current_id: Option<String> = None;
        let mut records = LogMap::new();

        for line in lines {
            if let Some(found) = self.pattern.find(&line.message) {
                current_id = Some(found.as_str().to_string());
            }

            let Some(id) = &current_id else {
                debug!(line_id = %line.id, "dropping line seen before any correlation id");
                continue;
            };

            let record = records.entry(id.clone()).or_insert_with(|| LogRecord {
                correlation_id: id.clone(),
                timestamp: line.emitted_at,
                time: format_unix(line.emitted_at),
                message: String::new(),
            });
            record.message.push_str(&line.message);
        }

        records
    }
}

fn format_unix(timestamp: i64) -> String {
    Utc.timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %-H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID1: &str = "11111111-2222-3333-4444-555555555555";
    const ID2: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";

    fn line(id: &str, message: &str, emitted_at: i64) -> LogLine {
        LogLine {
            id: id.to_string(),
            message: message.to_string(),
            emitted_at,
        }
    }

    #[test]
    fn test_assembles_multi_line_records() {
        let lines = vec![
            line("l1", &format!("a-prefix [{ID1}] part1"), 100),
            line("l2", "part2-no-id", 101),
            line("l3", &format!("[{ID2}] part3"), 102),
        ];

        let records = Correlator::new().fold(&lines);
        assert_eq!(records.len(), 2);

        let first = &records[ID1];
        assert_eq!(
            first.message,
            format!("a-prefix [{ID1}] part1part2-no-id")
        );
        assert_eq!(first.timestamp, 100);

        let second = &records[ID2];
        assert_eq!(second.message, format!("[{ID2}] part3"));
        assert_eq!(second.timestamp, 102);
    }

    #[test]
    fn test_line_before_any_id_is_dropped() {
        let lines = vec![
            line("l1", "orphan line", 99),
            line("l2", &format!("{ID1} start"), 100),
        ];

        let records = Correlator::new().fold(&lines);
        assert_eq!(records.len(), 1);
        assert_eq!(records[ID1].message, format!("{ID1} start"));
    }

    #[test]
    fn test_timestamp_taken_from_first_attributed_line() {
        let lines = vec![
            line("l1", &format!("{ID1} first"), 100),
            line("l2", "second", 200),
        ];

        let records = Correlator::new().fold(&lines);
        assert_eq!(records[ID1].timestamp, 100);
        assert_eq!(records[ID1].time, format_unix(100));
    }

    #[test]
    fn test_empty_input_yields_empty_map() {
        let records = Correlator::new().fold(&[]);
        assert!(records.is_empty());
    }

    #[test]
    fn test_formatted_time_unpadded_hour() {
        // 1970-01-01 3:25:45 UTC
        assert_eq!(format_unix(12345), "1970-01-01 3:25:45");
    }
}
