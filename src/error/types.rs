// src/error/types.rs
//
// Normalized error shape shared by every service boundary.
//
// RULES:
// - Every fallible operation returns ServiceResult<T>
// - Errors are normalized into one shape regardless of origin
// - Transport errors never carry a business code

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request could not complete (network, timeout, malformed body)
    Transport,

    /// The server answered but rejected the operation
    Business,

    /// A caller-side precondition failed before any request was issued
    Validation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Business => "business",
            ErrorKind::Validation => "validation",
        };
        f.write_str(label)
    }
}

/// The single error shape every service reports.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind} error: {message}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
    pub code: Option<String>,
}

impl ServiceError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Transport,
            message: message.into(),
            code: None,
        }
    }

    pub fn timeout() -> Self {
        Self::transport("Request timed out")
    }

    /// Business rejection carrying the backend's code
    pub fn business(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Business,
            message: message.into(),
            code: Some(code.into()),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: message.into(),
            code: None,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.kind == ErrorKind::Transport
    }

    pub fn is_business(&self) -> bool {
        self.kind == ErrorKind::Business
    }

    pub fn is_validation(&self) -> bool {
        self.kind == ErrorKind::Validation
    }

    /// True when this is a business error with exactly `code`.
    /// Collaborators use it to branch on codes such as an invalid session token.
    pub fn has_code(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::transport(format!("Malformed response: {}", err))
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            return ServiceError::timeout();
        }
        ServiceError::transport(format!("IO error: {}", err))
    }
}

impl From<tokio::time::error::Elapsed> for ServiceError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ServiceError::timeout()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Normalizes any error convertible into `ServiceError`.
pub trait NormalizeErr<T> {
    fn normalize_err(self) -> ServiceResult<T>;
}

impl<T, E> NormalizeErr<T> for Result<T, E>
where
    E: Into<ServiceError>,
{
    fn normalize_err(self) -> ServiceResult<T> {
        self.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exactly_one_branch_is_populated() {
        let results: Vec<ServiceResult<u32>> = vec![
            Ok(7),
            Err(ServiceError::transport("offline")),
            Err(ServiceError::business("40101", "token invalid")),
            Err(ServiceError::validation("drive name is required")),
        ];

        for result in results {
            match &result {
                Ok(data) => {
                    assert!(result.is_ok());
                    assert_eq!(*data, 7);
                }
                Err(error) => {
                    assert!(result.is_err());
                    assert!(!error.message.is_empty());
                }
            }
        }
    }

    #[test]
    fn test_transport_errors_carry_no_code() {
        let error = ServiceError::transport("connection refused");
        assert!(error.is_transport());
        assert_eq!(error.code, None);
        assert_eq!(error.to_string(), "transport error: connection refused");
    }

    #[test]
    fn test_business_error_code() {
        let error = ServiceError::business("40101", "token invalid");
        assert!(error.is_business());
        assert!(error.has_code("40101"));
        assert!(!error.has_code("500"));
    }

    #[test]
    fn test_serde_json_error_normalizes_to_transport() {
        let parsed: Result<Vec<u32>, _> = serde_json::from_str("{not json");
        let normalized = parsed.normalize_err();
        assert!(normalized.unwrap_err().message.starts_with("Malformed response"));
    }

    #[test]
    fn test_io_timeout_normalizes_to_timeout() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow drive");
        assert_eq!(ServiceError::from(io), ServiceError::timeout());
    }

    #[tokio::test]
    async fn test_elapsed_normalizes_to_timeout() {
        let elapsed = tokio::time::timeout(Duration::from_millis(1), std::future::pending::<()>())
            .await
            .unwrap_err();
        assert_eq!(ServiceError::from(elapsed), ServiceError::timeout());
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_string(&ServiceError::validation("missing path")).unwrap();
        assert!(json.contains("\"validation\""));
        assert!(json.contains("missing path"));
    }
}
