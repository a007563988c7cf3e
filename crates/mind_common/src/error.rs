//! Error taxonomy for the progress/energy/reward state machine.
//!
//! Every operation fails fast with one of these kinds and leaves no partial
//! state behind. Only `Conflict` is worth retrying.

use rusqlite::ErrorCode;

/// Errors surfaced by the state machine and its persistence layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MindError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("unknown store item: {0}")]
    InvalidItem(String),

    #[error("insufficient coins: have {have}, need {need}")]
    InsufficientFunds { have: i64, need: i64 },

    #[error("energy is already full")]
    EnergyFull,

    #[error("concurrent update detected: {0}")]
    Conflict(String),

    #[error("dependency unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid credentials")]
    InvalidCredentials,
}

impl MindError {
    /// Stable snake_case identifier used on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            MindError::NotFound(_) => "not_found",
            MindError::InvalidItem(_) => "invalid_item",
            MindError::InsufficientFunds { .. } => "insufficient_funds",
            MindError::EnergyFull => "energy_full",
            MindError::Conflict(_) => "conflict",
            MindError::UpstreamUnavailable(_) => "upstream_unavailable",
            MindError::InvalidRequest(_) => "invalid_request",
            MindError::InvalidCredentials => "invalid_credentials",
        }
    }

    /// Whether re-reading and reapplying the request may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(self, MindError::Conflict(_))
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        MindError::NotFound(what.into())
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        MindError::InvalidRequest(reason.into())
    }
}

impl From<rusqlite::Error> for MindError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
            {
                MindError::Conflict(format!("learner record is locked: {}", err))
            }
            _ => MindError::UpstreamUnavailable(format!("database: {}", err)),
        }
    }
}

impl From<tokio::task::JoinError> for MindError {
    fn from(err: tokio::task::JoinError) -> Self {
        MindError::UpstreamUnavailable(format!("database worker failed: {}", err))
    }
}

impl From<serde_json::Error> for MindError {
    fn from(err: serde_json::Error) -> Self {
        MindError::UpstreamUnavailable(format!("corrupt stored document: {}", err))
    }
}

pub type MindResult<T> = std::result::Result<T, MindError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_maps_to_conflict() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        let mapped = MindError::from(err);
        assert_eq!(mapped.kind(), "conflict");
        assert!(mapped.is_retriable());
    }

    #[test]
    fn test_other_sqlite_errors_are_upstream() {
        let mapped = MindError::from(rusqlite::Error::InvalidQuery);
        assert_eq!(mapped.kind(), "upstream_unavailable");
        assert!(!mapped.is_retriable());
    }

    #[test]
    fn test_funds_message_keeps_amounts() {
        let err = MindError::InsufficientFunds { have: 5, need: 40 };
        assert_eq!(err.to_string(), "insufficient coins: have 5, need 40");
    }
}
