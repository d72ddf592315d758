//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result};
use chrono_tz::Tz;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Redis connection URL (sessions).
    pub redis_url: String,

    /// Timezone entry timestamps are converted into (default: UTC).
    pub app_timezone: Tz,

    /// Cookie SameSite policy: "strict", "lax", or "none" (default: "strict").
    pub cookie_same_site: String,

    /// Page size of the admin entry listing (default: 50).
    pub entries_per_page: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());

        let app_timezone = parse_timezone(
            &env::var("APP_TIMEZONE").unwrap_or_else(|_| "UTC".to_string()),
        )?;

        let cookie_same_site = env::var("COOKIE_SAME_SITE")
            .unwrap_or_else(|_| "strict".to_string())
            .to_lowercase();

        let entries_per_page = env::var("ENTRIES_PER_PAGE")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .context("ENTRIES_PER_PAGE must be a valid u64")?;

        if entries_per_page == 0 {
            anyhow::bail!("ENTRIES_PER_PAGE must be greater than zero");
        }

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            redis_url,
            app_timezone,
            cookie_same_site,
            entries_per_page,
        })
    }
}

/// Parse an IANA timezone identifier such as `Europe/Rome`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("invalid timezone {name:?}: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_timezones() {
        assert_eq!(parse_timezone("UTC").unwrap(), Tz::UTC);
        assert_eq!(
            parse_timezone(" America/New_York ").unwrap(),
            Tz::America__New_York
        );
    }

    #[test]
    fn rejects_unknown_timezone() {
        let err = parse_timezone("Mars/Olympus_Mons").unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus_Mons"));
    }
}
