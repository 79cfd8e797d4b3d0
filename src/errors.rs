use actix_web::{
    http::{header, StatusCode},
    HttpResponse, ResponseError,
};
use thiserror::Error;

/// Application-wide error taxonomy. Handlers propagate with `?` and a single
/// [`ResponseError`] boundary maps each kind to an HTTP status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(Vec<String>),

    #[error("phone or email is already registered")]
    Duplicate,

    #[error("too many emails sent, retry in {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: i64 },

    #[error("confirmation code has expired")]
    ExpiredCode,

    #[error("confirmation code does not match")]
    CodeMismatch,

    #[error("email delivery failed")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("record not found")]
    NotFound,

    #[error("admin access required")]
    Forbidden,

    #[error("estimated cost must be a number")]
    InvalidCost,

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AppError::Transport(Box::new(err))
    }

    /// Messages safe to echo back into a form.
    pub fn form_messages(&self) -> Vec<String> {
        match self {
            AppError::Validation(messages) => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// True when the database rejected a write because of a UNIQUE constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::ExpiredCode
            | AppError::CodeMismatch
            | AppError::InvalidCost => StatusCode::BAD_REQUEST,
            AppError::Duplicate => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Transport(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Database(err) => {
                log::error!("Database error: {err}");
                "Something went wrong, please try again.".to_string()
            }
            AppError::Internal(err) => {
                log::error!("Internal error: {err}");
                "Something went wrong, please try again.".to_string()
            }
            AppError::Transport(err) => {
                log::error!("Email transport error: {err}");
                self.to_string()
            }
            other => other.to_string(),
        };

        let mut builder = HttpResponse::build(self.status_code());
        if let AppError::RateLimited { retry_after_secs } = self {
            builder.insert_header((header::RETRY_AFTER, retry_after_secs.to_string()));
        }
        builder
            .content_type("text/plain; charset=utf-8")
            .body(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_response_carries_retry_after() {
        let err = AppError::RateLimited {
            retry_after_secs: 300,
        };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        let response = err.error_response();
        assert_eq!(
            response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
            Some("300")
        );
    }

    #[test]
    fn forbidden_maps_to_403() {
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn database_errors_hide_the_cause() {
        let err = AppError::Database(sqlx::Error::RowNotFound);
        let response = err.error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
