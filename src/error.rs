use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{
    dao::storage::StorageError,
    state::{
        game::{SessionDecodeError, SetupError},
        state_machine::TransitionError,
    },
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Rosters rejected at session creation.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Requested session was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Action is not legal in the current state.
    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),
    /// Action is legal in this state but a rule check failed.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    /// Storage backend failed or timed out; the stored snapshot is unchanged.
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Stored data could not be turned back into a session.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Whether the same request may succeed when retried unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Storage(err) => err.is_retryable(),
            ServiceError::Degraded => true,
            _ => false,
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Storage(err)
    }
}

impl From<SetupError> for ServiceError {
    fn from(err: SetupError) -> Self {
        ServiceError::Configuration(err.to_string())
    }
}

impl From<SessionDecodeError> for ServiceError {
    fn from(err: SessionDecodeError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { .. } | TransitionError::Concluded { .. } => {
                ServiceError::InvalidStateTransition(err.to_string())
            }
            TransitionError::Precondition(precondition) => {
                ServiceError::PreconditionFailed(precondition.to_string())
            }
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A rule check failed for the current state.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    /// Service unavailable or degraded; the request may be retried.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Configuration(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::InvalidStateTransition(message) => AppError::Conflict(message),
            ServiceError::PreconditionFailed(message) => AppError::PreconditionFailed(message),
            ServiceError::Storage(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Internal(message) => AppError::Internal(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PreconditionFailed(_) => StatusCode::PRECONDITION_FAILED,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
            retryable: matches!(self, AppError::ServiceUnavailable(_)),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::state::state_machine::{GameState, PreconditionError};

    fn status_of(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn service_errors_map_to_http_statuses() {
        assert_eq!(
            status_of(SetupError::UnbalancedTeams { good: 3, evil: 3 }.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ServiceError::NotFound("session".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(
                TransitionError::Concluded {
                    state: GameState::EvilTeamWon
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(TransitionError::from(PreconditionError::TeamNotAssigned).into()),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            status_of(StorageError::timeout("put", Duration::from_secs(5)).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_of(ServiceError::Degraded), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn concluded_games_report_a_fixed_message() {
        let err: ServiceError = TransitionError::Concluded {
            state: GameState::VirtuousTeamWon,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "invalid state transition: game already concluded"
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn storage_failures_are_retryable() {
        let err: ServiceError = StorageError::timeout("get", Duration::from_millis(10)).into();
        assert!(err.is_retryable());
        assert!(ServiceError::Degraded.is_retryable());
    }
}
