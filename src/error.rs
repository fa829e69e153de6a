use crate::engine::authorization::Capability;
use thiserror::Error;

/// Errors returned directly to the caller of an interactive action.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{actor} is not allowed to {capability}")]
    Forbidden {
        actor: String,
        capability: Capability,
    },

    #[error("Cannot {action} {deviation}: current state is {from}")]
    InvalidTransition {
        action: &'static str,
        deviation: &'static str,
        from: String,
    },

    #[error("Attendance record {0} not found")]
    RecordNotFound(i64),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
