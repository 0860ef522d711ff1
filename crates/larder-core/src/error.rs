use std::fmt::Display;

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the reservation, execution and expiry engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Not enough unreserved stock to cover a need. Nothing was written.
    #[error("insufficient stock for {product_name} ({product_id}): short by {shortfall}")]
    InsufficientStock {
        product_id: Uuid,
        product_name: String,
        shortfall: Decimal,
    },

    #[error("{entity} {id} is {status}, expected {expected}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        status: String,
        expected: String,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal invariant would have been broken. Never retried.
    #[error("consistency violation: {0}")]
    ConsistencyViolation(String),

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

impl EngineError {
    pub(crate) fn not_found(entity: &'static str, id: impl Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_transition(
        entity: &'static str,
        id: impl Display,
        status: impl Display,
        expected: impl Display,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            id: id.to_string(),
            status: status.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Build a [`EngineError::ConsistencyViolation`] and log it at ERROR.
    pub(crate) fn consistency(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(%message, "consistency violation");
        Self::ConsistencyViolation(message)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_subject() {
        let id = Uuid::nil();
        let err = EngineError::not_found("meal plan", id);
        assert_eq!(
            err.to_string(),
            "meal plan 00000000-0000-0000-0000-000000000000 not found"
        );

        let err = EngineError::invalid_transition("meal plan", "p1", "confirmed", "draft");
        assert_eq!(err.to_string(), "meal plan p1 is confirmed, expected draft");

        let err = EngineError::InsufficientStock {
            product_id: id,
            product_name: "milk".into(),
            shortfall: Decimal::new(12500, 3),
        };
        assert!(err.to_string().contains("milk"));
        assert!(err.to_string().contains("12.500"));
    }

    #[test]
    fn anyhow_errors_become_database_errors() {
        let err: EngineError = anyhow::anyhow!("connection reset").into();
        assert!(matches!(err, EngineError::Database(_)));
        assert_eq!(err.to_string(), "connection reset");
    }
}
