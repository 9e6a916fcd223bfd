use thiserror::Error;

use super::types::ServiceKind;
use crate::entity::EntityGroup;
use crate::http::HttpMethod;

/// Errors raised while talking to a service or translating its records.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service answered 429. Retried internally; only escapes the
    /// client wrapped as [`ServiceError::MaxAttemptsReached`].
    #[error("{service} rate limited {method} {endpoint}")]
    RateLimited {
        service: ServiceKind,
        method: HttpMethod,
        endpoint: String,
    },

    /// Any other non-success status.
    #[error("{service} API error ({status}) on {method} {endpoint}: {body}")]
    Api {
        service: ServiceKind,
        method: HttpMethod,
        endpoint: String,
        status: u16,
        body: String,
    },

    /// Throttled on every allowed attempt.
    #[error(
        "maximum attempts reached: {service} {endpoint} was still rate limited after {attempts} attempts"
    )]
    MaxAttemptsReached {
        service: ServiceKind,
        endpoint: String,
        attempts: u32,
    },

    /// A required reference has no counterpart on the target.
    #[error("cannot create {group} '{record}': {reference} {id} has no counterpart on the target")]
    UnresolvedDependency {
        group: EntityGroup,
        record: String,
        reference: EntityGroup,
        id: String,
    },

    #[error("{service} transport error: {message}")]
    Transport {
        service: ServiceKind,
        message: String,
    },

    #[error("{service} returned malformed JSON for {endpoint}: {source}")]
    Json {
        service: ServiceKind,
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// A record handed to the handler of a different group.
    #[error("record {id} belongs to {found}, expected {expected}")]
    MismatchedRecord {
        expected: EntityGroup,
        found: EntityGroup,
        id: String,
    },

    /// A service-native id that the service itself would not accept.
    #[error("'{id}' is not a valid {service} id for {group}")]
    InvalidId {
        service: ServiceKind,
        group: EntityGroup,
        id: String,
    },

    #[error("{service} does not support {operation} for {group}")]
    Unsupported {
        service: ServiceKind,
        group: EntityGroup,
        operation: &'static str,
    },
}

impl ServiceError {
    /// True for a single throttled response (retryable).
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// True for responses a create/delete loop may skip over: the record
    /// (or something it hangs off) is already gone.
    #[inline]
    pub fn is_soft_failure(&self) -> bool {
        matches!(self, Self::Api { status: 404 | 410, .. })
    }

    #[inline]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::RateLimited { .. } | Self::MaxAttemptsReached { .. } => Some(429),
            _ => None,
        }
    }
}

/// First line of an error message, for progress output.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, body: &str) -> ServiceError {
        ServiceError::Api {
            service: ServiceKind::Toggl,
            method: HttpMethod::Delete,
            endpoint: "/workspaces/1/tags/2".to_string(),
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_missing_records_are_soft_failures() {
        assert!(api(404, "").is_soft_failure());
        assert!(api(410, "").is_soft_failure());
        assert!(!api(400, "").is_soft_failure());
        assert!(!api(500, "").is_soft_failure());
    }

    #[test]
    fn test_exhausted_retries_report_429() {
        let err = ServiceError::MaxAttemptsReached {
            service: ServiceKind::Clockify,
            endpoint: "/workspaces".to_string(),
            attempts: 5,
        };
        assert_eq!(err.status(), Some(429));
        assert!(!err.is_soft_failure());
        assert_eq!(api(422, "").status(), Some(422));
    }

    #[test]
    fn test_short_message_keeps_first_line() {
        let err = api(500, "line one\nline two");
        let short = short_error_message(&err);
        assert!(short.ends_with("line one"));
        assert!(!short.contains("line two"));
    }
}
