//! Application Error Types
//!
//! Centralized error handling for command handlers and repositories.

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Status code reported in the acknowledgment frame for this error.
    ///
    /// Handlers never leave a connection without an ack, so every variant
    /// maps onto the 400/401/403/404/500 taxonomy. Conflicts surface as
    /// 400 with a diagnostic payload where useful.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::NotFound(_) => 404,
            AppError::BadRequest(_) | AppError::Conflict(_) => 400,
            AppError::Unauthorized(_) => 401,
            AppError::Forbidden(_) => 403,
            AppError::Internal(_) | AppError::Database(_) => 500,
        }
    }

    /// Message safe to echo back to the client.
    ///
    /// Persistence failures surface as a generic failure; the detail goes
    /// to the log, not the wire.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".into()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                "Internal server error".into()
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_ack_taxonomy() {
        assert_eq!(AppError::NotFound("x".into()).status_code(), 404);
        assert_eq!(AppError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(AppError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(AppError::Conflict("x".into()).status_code(), 400);
        assert_eq!(AppError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn internal_detail_is_not_echoed_to_clients() {
        let err = AppError::Internal("pool exhausted".into());
        assert_eq!(err.client_message(), "Internal server error");
    }
}
