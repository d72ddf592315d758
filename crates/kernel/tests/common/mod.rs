#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Tests run against the REAL kernel services and a PostgreSQL database
//! named by `DATABASE_URL`. When no database is configured or reachable the
//! database-backed tests return early.

#![allow(dead_code)]

use std::sync::Arc;

use canvas_kernel::content::{
    ContentTypeRegistry, EntryService, FieldTypeRegistry, SaveOutcome, Submission,
};
use canvas_kernel::models::{Entry, User};
use canvas_kernel::permissions::PermissionService;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

/// Connect to the test database and apply migrations.
pub async fn test_pool() -> Option<PgPool> {
    dotenvy::dotenv().ok();

    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping database test");
        return None;
    };

    let pool = match PgPoolOptions::new().max_connections(5).connect(&url).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("database unavailable ({e}); skipping database test");
            return None;
        }
    };

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    Some(pool)
}

/// Entry service over `pool` with the built-in field types and UTC as the
/// site timezone.
pub fn entry_service(pool: &PgPool) -> EntryService {
    EntryService::new(
        pool.clone(),
        ContentTypeRegistry::new(pool.clone()),
        Arc::new(FieldTypeRegistry::with_builtins()),
        PermissionService::new(pool.clone()),
        chrono_tz::UTC,
    )
}

/// Load a user inserted by a fixture.
pub async fn load_user(pool: &PgPool, id: Uuid) -> User {
    User::find_by_id(pool, id)
        .await
        .unwrap()
        .expect("test user exists")
}

/// Minimal valid submission for an entry titled `title`.
pub fn submission(title: &str, extra: &[(&str, &str)]) -> Submission {
    let mut pairs = vec![
        ("title".to_string(), title.to_string()),
        ("created_at".to_string(), "05/Mar/2024 02:30:00 pm".to_string()),
        ("entry_status_id".to_string(), "1".to_string()),
        ("_token".to_string(), "ignored".to_string()),
    ];
    pairs.extend(
        extra
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string())),
    );
    Submission::from_pairs(pairs)
}

/// Unwrap a successful save.
pub fn saved_entry(outcome: SaveOutcome) -> Entry {
    match outcome {
        SaveOutcome::Saved { entry, .. } => entry,
        SaveOutcome::Invalid { errors, .. } => panic!("save rejected: {errors:?}"),
    }
}

/// Path of the test-only route that logs a user into the session.
pub const TEST_LOGIN_PATH: &str = "/test/login";

async fn test_login(
    session: tower_sessions::Session,
    axum::extract::Path(user_id): axum::extract::Path<Uuid>,
) -> axum::http::StatusCode {
    session
        .insert(canvas_kernel::session::SESSION_USER_ID, user_id)
        .await
        .unwrap();
    axum::http::StatusCode::NO_CONTENT
}

/// The REAL kernel router over real state, with an in-memory session store
/// and a login route, carrying the session cookie between requests.
pub struct TestApp {
    router: axum::Router,
    pub db: PgPool,
    cookie: Option<String>,
}

impl TestApp {
    /// `None` when PostgreSQL or Redis is unavailable.
    pub async fn new() -> Option<Self> {
        use axum::routing::get;
        use canvas_kernel::config::Config;
        use canvas_kernel::routes;
        use canvas_kernel::state::AppState;
        use tower_sessions::{MemoryStore, SessionManagerLayer};

        dotenvy::dotenv().ok();

        let config = Config::from_env().ok()?;
        let state = match AppState::new(&config).await {
            Ok(state) => state,
            Err(e) => {
                eprintln!("services unavailable ({e:#}); skipping HTTP test");
                return None;
            }
        };
        let db = state.db().clone();

        let session_layer = SessionManagerLayer::new(MemoryStore::default()).with_secure(false);
        let router = routes::router()
            .route(&format!("{TEST_LOGIN_PATH}/{{user_id}}"), get(test_login))
            .layer(session_layer)
            .with_state(state);

        Some(Self {
            router,
            db,
            cookie: None,
        })
    }

    /// Log `user_id` in for the following requests.
    pub async fn login(&mut self, user_id: Uuid) {
        let response = self.get(&format!("{TEST_LOGIN_PATH}/{user_id}")).await;
        assert_eq!(response.status(), axum::http::StatusCode::NO_CONTENT);
    }

    pub async fn get(&mut self, path: &str) -> axum::response::Response {
        let request = self.request("GET", path).body(axum::body::Body::empty()).unwrap();
        self.send(request).await
    }

    /// POST an `application/x-www-form-urlencoded` body.
    pub async fn post_form(&mut self, path: &str, body: &str) -> axum::response::Response {
        let request = self
            .request("POST", path)
            .header(
                axum::http::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(axum::body::Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    fn request(&self, method: &str, path: &str) -> axum::http::request::Builder {
        let builder = axum::http::Request::builder().method(method).uri(path);
        match &self.cookie {
            Some(cookie) => builder.header(axum::http::header::COOKIE, cookie),
            None => builder,
        }
    }

    async fn send(&mut self, request: axum::http::Request<axum::body::Body>) -> axum::response::Response {
        use tower::ServiceExt;

        let response = self.router.clone().oneshot(request).await.unwrap();
        if let Some(set_cookie) = response.headers().get(axum::http::header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }
        response
    }
}

/// Read a JSON response body.
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
