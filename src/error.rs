use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::{
    dao::storage::StorageError,
    state::phase::{AbortError, ApplyError, PlanError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// A player with this email already exists.
    #[error("email `{0}` is already registered")]
    DuplicateRegistration(String),
    /// The player's heartbeat is too recent to admit a second session.
    #[error("player `{player_id}` is currently active on another device")]
    ActiveElsewhere {
        /// Player whose session is still alive.
        player_id: Uuid,
    },
    /// Reset zeroed some players but not all of them; safe to retry.
    #[error("reset incomplete: {} of {total} players still hold a score", pending.len())]
    PartialReset {
        /// Players whose score could not be reset.
        pending: Vec<Uuid>,
        /// Players targeted by the reset.
        total: usize,
    },
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Broadcaster task is gone.
    #[error("broadcaster stopped")]
    BroadcasterStopped,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateEmail(email) => ServiceError::DuplicateRegistration(email),
            StorageError::PlayerNotFound(id) => {
                ServiceError::NotFound(format!("player `{id}` not found"))
            }
            unavailable @ StorageError::Unavailable { .. } => {
                ServiceError::Unavailable(unavailable)
            }
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The player is locked by another live session.
    #[error("locked: {0}")]
    Locked(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            err @ ServiceError::DuplicateRegistration(_) => AppError::Conflict(err.to_string()),
            err @ ServiceError::ActiveElsewhere { .. } => AppError::Locked(err.to_string()),
            err @ ServiceError::PartialReset { .. } => {
                AppError::ServiceUnavailable(err.to_string())
            }
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::BroadcasterStopped => AppError::Internal("broadcaster stopped".into()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Locked(_) => StatusCode::LOCKED,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

impl From<PlanError> for ServiceError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::AlreadyPending => {
                ServiceError::InvalidState("phase transition already pending".into())
            }
            PlanError::InvalidTransition(invalid) => {
                ServiceError::InvalidState(invalid.to_string())
            }
        }
    }
}

impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::NoPending => ServiceError::InvalidState("no transition is pending".into()),
            ApplyError::IdMismatch { .. } => {
                ServiceError::InvalidState("pending transition does not match".into())
            }
            ApplyError::PhaseMismatch { expected, actual } => ServiceError::InvalidState(format!(
                "phase changed during transition (expected {expected:?}, got {actual:?})"
            )),
        }
    }
}

impl From<AbortError> for ServiceError {
    fn from(err: AbortError) -> Self {
        match err {
            AbortError::NoPending => ServiceError::InvalidState("no pending transition".into()),
            AbortError::IdMismatch { .. } => {
                ServiceError::InvalidState("transition plan does not match".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn exclusivity_rejection_is_distinct_from_outages() {
        let locked: AppError = ServiceError::ActiveElsewhere {
            player_id: Uuid::nil(),
        }
        .into();
        let outage: AppError = ServiceError::from(StorageError::unavailable(
            "down".into(),
            io::Error::other("down"),
        ))
        .into();

        assert_eq!(locked.into_response().status(), StatusCode::LOCKED);
        assert_eq!(
            outage.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn duplicate_email_maps_to_conflict() {
        let err: ServiceError = StorageError::DuplicateEmail("a@b.c".into()).into();
        assert!(matches!(err, ServiceError::DuplicateRegistration(_)));
        let app: AppError = err.into();
        assert_eq!(app.into_response().status(), StatusCode::CONFLICT);
    }
}
