//! Liveness of the backing services.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct ServiceHealth {
    postgres: bool,
    redis: bool,
}

impl ServiceHealth {
    fn is_healthy(&self) -> bool {
        self.postgres && self.redis
    }

    fn status_code(&self) -> StatusCode {
        if self.is_healthy() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GET /health
async fn health(State(state): State<AppState>) -> Response {
    let (postgres, redis) = tokio::join!(state.postgres_healthy(), state.redis_healthy());
    let report = ServiceHealth { postgres, redis };

    let status = report.status_code();
    let body = serde_json::json!({
        "status": if report.is_healthy() { "healthy" } else { "unhealthy" },
        "services": report,
    });

    (status, Json(body)).into_response()
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
