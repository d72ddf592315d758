//! HTTP route handlers.

pub mod entry;
pub mod health;
mod helpers;

use axum::Router;

use crate::state::AppState;

/// All kernel routes, without session or tracing layers.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(entry::router())
}
