//! Application error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use thiserror::Error;

use crate::content::EntryError;

/// Where unauthenticated requests are sent.
pub const LOGIN_PATH: &str = "/user/login";

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    /// No authenticated user; answered with a redirect to the login page.
    #[error("login required")]
    LoginRequired,

    #[error("not found")]
    NotFound,

    #[error("access denied: {0}")]
    Forbidden(String),
}

impl From<EntryError> for AppError {
    fn from(err: EntryError) -> Self {
        match err {
            EntryError::AccessDenied(reason) => AppError::Forbidden(reason),
            EntryError::NotFound => AppError::NotFound,
            EntryError::Persistence(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::LoginRequired) {
            return Redirect::to(LOGIN_PATH).into_response();
        }

        let status = match &self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::LoginRequired => StatusCode::SEE_OTHER,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        };

        // Storage failures are logged here and answered with a generic body.
        let body = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal server error");
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, body).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn login_required_redirects() {
        let response = AppError::LoginRequired.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(axum::http::header::LOCATION).unwrap(),
            LOGIN_PATH
        );
    }

    #[test]
    fn entry_errors_map_to_status_codes() {
        let forbidden: AppError = EntryError::AccessDenied("nope".to_string()).into();
        assert_eq!(forbidden.into_response().status(), StatusCode::FORBIDDEN);

        let missing: AppError = EntryError::NotFound.into();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let failed: AppError = EntryError::Persistence(anyhow::anyhow!("boom")).into();
        assert_eq!(
            failed.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
