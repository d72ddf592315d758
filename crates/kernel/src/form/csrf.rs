//! CSRF token generation and verification.

use anyhow::Result;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tower_sessions::Session;

/// Form field carrying the token.
pub const CSRF_FIELD: &str = "_token";

/// Session key for storing CSRF tokens.
const CSRF_SESSION_KEY: &str = "csrf_tokens";

/// Maximum number of tokens to store per session.
const MAX_TOKENS: usize = 10;

/// Token validity period in seconds (1 hour).
const TOKEN_VALIDITY_SECS: i64 = 3600;

/// A stored token and its issue time.
fn parse_stored(token_data: &str) -> Option<(&str, i64)> {
    let (token, timestamp) = token_data.split_once(':')?;
    Some((token, timestamp.parse().ok()?))
}

/// Generate a CSRF token and store it in the session.
pub async fn generate_csrf_token(session: &Session) -> Result<String> {
    let mut random_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut random_bytes);

    let timestamp = chrono::Utc::now().timestamp();

    let mut hasher = Sha256::new();
    hasher.update(random_bytes);
    hasher.update(timestamp.to_le_bytes());
    let token = hex::encode(hasher.finalize());

    let mut tokens: Vec<String> = session
        .get(CSRF_SESSION_KEY)
        .await
        .unwrap_or(None)
        .unwrap_or_default();

    tokens.push(format!("{token}:{timestamp}"));

    // Keep only the MAX_TOKENS most recent
    if tokens.len() > MAX_TOKENS {
        let skip = tokens.len() - MAX_TOKENS;
        tokens.drain(..skip);
    }

    session
        .insert(CSRF_SESSION_KEY, tokens)
        .await
        .map_err(|e| anyhow::anyhow!("failed to store CSRF token: {}", e))?;

    Ok(token)
}

/// Verify a CSRF token against the session.
///
/// Tokens are single-use and time-limited. An empty token never verifies.
pub async fn verify_csrf_token(session: &Session, submitted: &str) -> Result<bool> {
    if submitted.is_empty() {
        return Ok(false);
    }

    let tokens: Vec<String> = session
        .get(CSRF_SESSION_KEY)
        .await
        .unwrap_or(None)
        .unwrap_or_default();

    let now = chrono::Utc::now().timestamp();
    let (found, remaining) = consume_token(tokens, submitted, now);

    if found {
        session
            .insert(CSRF_SESSION_KEY, remaining)
            .await
            .map_err(|e| anyhow::anyhow!("failed to update CSRF tokens: {}", e))?;
    }

    Ok(found)
}

/// Remove `submitted` from `tokens` if present and unexpired, dropping
/// expired tokens on the way.
fn consume_token(tokens: Vec<String>, submitted: &str, now: i64) -> (bool, Vec<String>) {
    let fresh = |timestamp: i64| now - timestamp <= TOKEN_VALIDITY_SECS;

    let found = tokens.iter().any(|data| {
        parse_stored(data).is_some_and(|(token, timestamp)| token == submitted && fresh(timestamp))
    });
    if !found {
        return (false, tokens);
    }

    let remaining = tokens
        .into_iter()
        .filter(|data| {
            parse_stored(data)
                .is_some_and(|(token, timestamp)| token != submitted && fresh(timestamp))
        })
        .collect();

    (true, remaining)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn valid_token_is_consumed() {
        let tokens = vec!["abc:1000".to_string(), "def:1000".to_string()];
        let (found, remaining) = consume_token(tokens, "abc", 1500);

        assert!(found);
        assert_eq!(remaining, vec!["def:1000".to_string()]);
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = vec!["abc:1000".to_string()];
        let (found, remaining) = consume_token(tokens, "abc", 1000 + TOKEN_VALIDITY_SECS + 1);

        assert!(!found);
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn unknown_token_is_rejected() {
        let (found, _) = consume_token(vec!["abc:1000".to_string()], "zzz", 1000);
        assert!(!found);
    }

    #[test]
    fn malformed_entries_are_dropped() {
        let tokens = vec![
            "garbage".to_string(),
            "abc:5000".to_string(),
            "old:1".to_string(),
        ];
        let (found, remaining) = consume_token(tokens, "abc", 5000);

        assert!(found);
        assert!(remaining.is_empty());
    }
}
