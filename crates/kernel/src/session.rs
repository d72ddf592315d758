//! Session management using Redis, plus flash data.

use anyhow::{Context, Result};
use fred::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::Duration;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_redis_store::RedisStore;

/// Default session expiry (24 hours).
pub const DEFAULT_SESSION_EXPIRY_HOURS: i64 = 24;

/// Session key for the authenticated user's ID.
pub const SESSION_USER_ID: &str = "user_id";

/// Session key of the flash data for the next request.
const FLASH_KEY: &str = "flash";

/// Create the session layer using Redis as the backend.
pub async fn create_session_layer(
    redis_url: &str,
    same_site: SameSite,
) -> Result<SessionManagerLayer<RedisStore<Pool>>> {
    let config = Config::from_url(redis_url).context("failed to parse Redis URL")?;

    let pool = Builder::from_config(config)
        .build_pool(1)
        .context("failed to create Redis pool")?;

    pool.init()
        .await
        .context("failed to connect to Redis for sessions")?;

    let store = RedisStore::new(pool);

    let session_layer = SessionManagerLayer::new(store)
        .with_secure(true)
        .with_http_only(true)
        .with_same_site(same_site)
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            DEFAULT_SESSION_EXPIRY_HOURS,
        )));

    Ok(session_layer)
}

/// Parse the configured SameSite policy; unknown values are strict.
pub fn parse_same_site(value: &str) -> SameSite {
    match value {
        "lax" => SameSite::Lax,
        "none" => SameSite::None,
        _ => SameSite::Strict,
    }
}

/// Messages and preserved input carried to the next request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Flash {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Submitted form input, re-shown after a failed validation.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub old_input: Map<String, Value>,
}

impl Flash {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn notice(notice: impl Into<String>) -> Self {
        Self {
            notice: Some(notice.into()),
            ..Default::default()
        }
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    /// Preserve submitted input, minus `_`-prefixed control keys.
    pub fn with_old_input(mut self, input: &Map<String, Value>) -> Self {
        self.old_input = input
            .iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Flash::default()
    }

    /// Store the flash for the next request.
    pub async fn store(&self, session: &Session) -> Result<()> {
        session
            .insert(FLASH_KEY, self)
            .await
            .map_err(|e| anyhow::anyhow!("failed to store flash data: {}", e))?;
        Ok(())
    }

    /// Take the flash stored by the previous request, clearing it.
    pub async fn take(session: &Session) -> Result<Flash> {
        let flash: Option<Flash> = session
            .remove(FLASH_KEY)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read flash data: {}", e))?;
        Ok(flash.unwrap_or_default())
    }
}
