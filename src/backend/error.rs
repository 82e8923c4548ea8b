use thiserror::Error;

/// Error codes that mean "the resource does not exist". These are negative
/// lookup results, not failures; callers branch on them.
const ABSENT_CODES: &[&str] = &[
    "ProjectNotExist",
    "LogStoreNotExist",
    "IndexConfigNotExist",
    "NAMESPACE_NOT_EXIST",
];

/// Error codes that can never succeed on retry and must abort the whole flow.
const FATAL_CODES: &[&str] = &["Unauthorized", "InvalidAccessKeyId"];

/// A structured failure from a backend request. When the backend returns an
/// unstructured error the raw text lands in `message` verbatim and `code`
/// carries a synthesized marker (e.g. the HTTP status).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct BackendError {
    pub code: String,
    pub message: String,
}

impl BackendError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// A transport-level failure (connection refused, timeout, bad TLS).
    /// Always classified transient.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new("RequestError", message)
    }

    pub fn classify(&self) -> ErrorClass {
        if FATAL_CODES.contains(&self.code.as_str()) {
            ErrorClass::Fatal
        } else if ABSENT_CODES.contains(&self.code.as_str()) {
            ErrorClass::Absent
        } else if self.code == "ParameterInvalid" || self.message == "no parameter changed" {
            ErrorClass::Conflict
        } else {
            ErrorClass::Transient
        }
    }
}

/// How a backend error should be handled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Unauthorized / invalid credentials: abort, retrying cannot help.
    Fatal,

    /// Resource-not-exist: a negative existence result, not an error.
    Absent,

    /// Validation conflict (no effective change, invalid parameter):
    /// fatal for the current call, but not for the whole flow.
    Conflict,

    /// Everything uncategorized, including network and 5xx-style failures.
    Transient,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_codes_are_negative_results() {
        for code in [
            "ProjectNotExist",
            "LogStoreNotExist",
            "IndexConfigNotExist",
            "NAMESPACE_NOT_EXIST",
        ] {
            let err = BackendError::new(code, "missing");
            assert_eq!(err.classify(), ErrorClass::Absent, "code {code}");
        }
    }

    #[test]
    fn test_credential_codes_are_fatal() {
        assert_eq!(
            BackendError::new("Unauthorized", "denied").classify(),
            ErrorClass::Fatal
        );
        assert_eq!(
            BackendError::new("InvalidAccessKeyId", "bad key").classify(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn test_conflicts_by_code_or_message() {
        assert_eq!(
            BackendError::new("ParameterInvalid", "shardCount out of range").classify(),
            ErrorClass::Conflict
        );
        assert_eq!(
            BackendError::new("BadRequest", "no parameter changed").classify(),
            ErrorClass::Conflict
        );
    }

    #[test]
    fn test_unknown_codes_are_transient() {
        assert_eq!(
            BackendError::new("InternalServerError", "oops").classify(),
            ErrorClass::Transient
        );
        assert_eq!(
            BackendError::transport("connection reset").classify(),
            ErrorClass::Transient
        );
    }
}
