//! Error types for Starlight
//!
//! Every failure a request can hit is a `StarlightError`; the HTTP layer maps
//! it to a status code and a JSON body at the request boundary.

use hyper::StatusCode;
use serde::Serialize;

/// Rule violations raised by the star lifecycle and the services around it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("Star is not discoverable")]
    NotDiscoverable,

    #[error("Star already discovered by this user")]
    AlreadyDiscovered,

    #[error("Star has not been discovered yet")]
    NotYetDiscovered,

    #[error("User has not discovered this star")]
    UserHasNotDiscovered,

    #[error("Star must be discovered before starting a challenge")]
    MustDiscoverFirst,

    #[error("Star conditions not met: {0}")]
    ConditionsNotMet(String),

    #[error("No active challenge for this star")]
    NoActiveChallenge,

    #[error("AR interaction proof rejected")]
    ProofRejected,

    #[error("Quest is full")]
    QuestFull,

    #[error("Quest already joined")]
    AlreadyJoined,

    #[error("Quest is not active")]
    QuestInactive,
}

impl StateError {
    /// Stable machine-readable code for clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotDiscoverable => "NOT_DISCOVERABLE",
            Self::AlreadyDiscovered => "ALREADY_DISCOVERED",
            Self::NotYetDiscovered => "NOT_YET_DISCOVERED",
            Self::UserHasNotDiscovered => "USER_HAS_NOT_DISCOVERED",
            Self::MustDiscoverFirst => "MUST_DISCOVER_FIRST",
            Self::ConditionsNotMet(_) => "CONDITIONS_NOT_MET",
            Self::NoActiveChallenge => "NO_ACTIVE_CHALLENGE",
            Self::ProofRejected => "PROOF_REJECTED",
            Self::QuestFull => "QUEST_FULL",
            Self::AlreadyJoined => "ALREADY_JOINED",
            Self::QuestInactive => "QUEST_INACTIVE",
        }
    }
}

/// Main error type for Starlight operations
#[derive(Debug, thiserror::Error)]
pub enum StarlightError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Too far from star: {distance:.1}m away (must be within {radius:.0}m)")]
    TooFar { distance: f64, radius: f64 },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body returned to clients
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

impl StarlightError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::State(_) => StatusCode::BAD_REQUEST,
            Self::TooFar { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::State(e) => e.code(),
            Self::TooFar { .. } => "TOO_FAR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DB_ERROR",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Build the client-facing body.
    ///
    /// Storage and internal failures are reported generically; their detail
    /// stays in the logs.
    pub fn to_body(&self) -> ErrorBody {
        let error = match self {
            Self::Database(_) => "Database unavailable".to_string(),
            Self::Internal(_) | Self::Config(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        let (distance, radius) = match self {
            Self::TooFar { distance, radius } => (Some(*distance), Some(*radius)),
            _ => (None, None),
        };

        ErrorBody {
            error,
            code: self.code(),
            distance,
            radius,
        }
    }

    /// True if this error is one of the lifecycle/state rule violations
    pub fn is_state(&self, state: &StateError) -> bool {
        matches!(self, Self::State(s) if s == state)
    }
}

// Implement From conversions for common error types

impl From<std::io::Error> for StarlightError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for StarlightError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for StarlightError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for StarlightError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<bson::oid::Error> for StarlightError {
    fn from(err: bson::oid::Error) -> Self {
        Self::Validation(format!("Invalid id: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for StarlightError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(format!("JWT error: {}", err))
    }
}

/// Result type alias for Starlight operations
pub type Result<T> = std::result::Result<T, StarlightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            StarlightError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StarlightError::State(StateError::AlreadyDiscovered).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            StarlightError::NotFound("Star".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            StarlightError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            StarlightError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_too_far_body_carries_distance() {
        let err = StarlightError::TooFar {
            distance: 1402.7,
            radius: 50.0,
        };
        let body = err.to_body();

        assert_eq!(body.code, "TOO_FAR");
        assert_eq!(body.distance, Some(1402.7));
        assert_eq!(body.radius, Some(50.0));
        assert!(body.error.contains("1402.7m"));
    }

    #[test]
    fn test_database_detail_is_hidden() {
        let err = StarlightError::Database("connection refused to 10.0.0.3".into());
        let body = err.to_body();

        assert_eq!(body.error, "Database unavailable");
        assert_eq!(body.code, "DB_ERROR");
    }

    #[test]
    fn test_state_error_codes() {
        let err: StarlightError = StateError::QuestFull.into();
        assert_eq!(err.code(), "QUEST_FULL");
        assert!(err.is_state(&StateError::QuestFull));
        assert!(!err.is_state(&StateError::AlreadyJoined));
    }
}
