//! Shared route helpers.

use axum::response::{IntoResponse, Redirect, Response};
use tower_sessions::Session;
use uuid::Uuid;

use crate::content::Submission;
use crate::error::{AppError, AppResult};
use crate::form::{CSRF_FIELD, verify_csrf_token};
use crate::models::User;
use crate::session::{Flash, SESSION_USER_ID};
use crate::state::AppState;

/// The user id stored in the session, if any. Session store failures are
/// internal errors, not a missing login.
pub async fn session_user_id(session: &Session) -> AppResult<Option<Uuid>> {
    session
        .get::<Uuid>(SESSION_USER_ID)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to read session: {e}")))
}

/// Require an authenticated, active user.
pub async fn require_login(state: &AppState, session: &Session) -> AppResult<User> {
    let Some(id) = session_user_id(session).await? else {
        return Err(AppError::LoginRequired);
    };

    match User::find_by_id(state.db(), id).await? {
        Some(user) if user.is_active() => Ok(user),
        _ => Err(AppError::LoginRequired),
    }
}

/// Verify the CSRF token carried by a submission.
pub async fn require_csrf(session: &Session, submission: &Submission) -> AppResult<()> {
    let token = submission.text(CSRF_FIELD).unwrap_or_default();

    if verify_csrf_token(session, token).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden("invalid or expired form token".to_string()))
    }
}

/// Store `flash` for the next request and redirect to `path`.
pub async fn redirect_with(session: &Session, path: &str, flash: Flash) -> AppResult<Response> {
    if !flash.is_empty() {
        flash.store(session).await?;
    }
    Ok(Redirect::to(path).into_response())
}

/// Entry ids posted as `selected[]`; malformed ids are dropped.
pub fn selected_ids(submission: &Submission) -> Vec<Uuid> {
    match submission.get("selected") {
        Some(serde_json::Value::Array(values)) => values
            .iter()
            .filter_map(serde_json::Value::as_str)
            .filter_map(|id| Uuid::parse_str(id.trim()).ok())
            .collect(),
        Some(serde_json::Value::String(id)) => Uuid::parse_str(id.trim()).into_iter().collect(),
        _ => Vec::new(),
    }
}
