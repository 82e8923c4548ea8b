//! Pure narrowing filters over an assembled log mapping. Each filter consumes
//! a map and returns the surviving subset; composition is sequential
//! application, and reapplying the same filter is a no-op.

use crate::correlate::LogMap;

const ERROR_MARKERS: &[&str] = &[" [ERROR] ", "Error: "];

/// Rewrites carriage returns to newlines in every record's message.
/// Backends that ship progress-bar style output use bare `\r`, which would
/// otherwise overwrite itself on a terminal.
pub fn replace_line_breaks(mut logs: LogMap) -> LogMap {
    for record in logs.values_mut() {
        record.message = normalize(&record.message);
    }
    logs
}

/// Keeps only the record with the given correlation id, if present.
pub fn by_correlation_id(logs: LogMap, correlation_id: &str) -> LogMap {
    logs.into_iter()
        .filter(|(id, _)| id == correlation_id)
        .collect()
}

/// Keeps records whose normalized message contains `query` as a substring.
pub fn by_query(logs: LogMap, query: &str) -> LogMap {
    logs.into_iter()
        .filter(|(_, record)| normalize(&record.message).contains(query))
        .collect()
}

/// Keeps records that look like failed invocations, by the presence of a
/// runtime error marker in the normalized message.
pub fn by_error_heuristic(logs: LogMap) -> LogMap {
    logs.into_iter()
        .filter(|(_, record)| {
            let message = normalize(&record.message);
            ERROR_MARKERS.iter().any(|marker| message.contains(marker))
        })
        .collect()
}

fn normalize(message: &str) -> String {
    message.replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::LogRecord;

    fn map_of(entries: &[(&str, &str)]) -> LogMap {
        entries
            .iter()
            .map(|(id, message)| {
                (
                    id.to_string(),
                    LogRecord {
                        correlation_id: id.to_string(),
                        timestamp: 0,
                        time: String::new(),
                        message: message.to_string(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_by_correlation_id_keeps_single_entry() {
        let logs = map_of(&[("a", "one"), ("b", "two")]);
        let filtered = by_correlation_id(logs, "a");
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("a"));
    }

    #[test]
    fn test_by_query_matches_across_cr_line_breaks() {
        // "down\rload" normalizes to "down\nload"; querying the normalized
        // form must match even though the raw message never contains it.
        let logs = map_of(&[("a", "down\rload"), ("b", "unrelated")]);
        let filtered = by_query(logs, "down\nload");
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("a"));
    }

    #[test]
    fn test_by_query_is_idempotent() {
        let logs = map_of(&[("a", "has x marker"), ("b", "nothing")]);
        let once = by_query(logs.clone(), "x marker");
        let twice = by_query(once.clone(), "x marker");
        assert_eq!(once.len(), twice.len());
        assert!(twice.contains_key("a"));
        assert!(!twice.contains_key("b"));
    }

    #[test]
    fn test_error_heuristic_markers() {
        let logs = map_of(&[
            ("a", "2024-01-01 [ERROR] boom"),
            ("b", "Error: undefined is not a function"),
            ("c", "all fine"),
            ("d", "an [ERROR]without spaces"),
        ]);
        let filtered = by_error_heuristic(logs);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.contains_key("a"));
        assert!(filtered.contains_key("b"));
    }

    #[test]
    fn test_replace_line_breaks_rewrites_messages() {
        let logs = replace_line_breaks(map_of(&[("a", "one\rtwo\rthree")]));
        assert_eq!(logs["a"].message, "one\ntwo\nthree");
    }

    #[test]
    fn test_filters_compose_sequentially() {
        let logs = map_of(&[
            ("a", "request served Error: timeout"),
            ("b", "request served ok"),
            ("c", "other Error: timeout"),
        ]);

        let narrowed = by_error_heuristic(by_query(logs, "request served"));
        assert_eq!(narrowed.len(), 1);
        assert!(narrowed.contains_key("a"));
    }
}
