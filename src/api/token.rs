use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

/// Lifetime assumed for tokens whose expiry claim cannot be read.
pub const FALLBACK_LIFETIME_SECS: i64 = 600;
/// A token is refreshed this long before it actually expires.
pub const SAFETY_MARGIN_SECS: i64 = 10;

#[derive(Debug, Clone)]
pub struct Token {
    value: String,
    expiry: DateTime<Utc>,
}

impl Token {
    /// Wrap a freshly issued token, reading its expiry from the embedded claims when possible.
    pub fn issued(value: String, now: DateTime<Utc>) -> Token {
        let expiry = decode_expiry(&value)
            .unwrap_or_else(|| now + Duration::seconds(FALLBACK_LIFETIME_SECS));
        Token { value, expiry }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expiry - Duration::seconds(SAFETY_MARGIN_SECS)
    }
}

/// Read the `exp` claim out of a `header.payload.signature` token.
fn decode_expiry(token: &str) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let mut payload = parts[1].to_owned();
    while payload.len() % 4 != 0 {
        payload.push('=');
    }

    let claims: Value = URL_SAFE
        .decode(payload.as_bytes())
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .or_else(|| {
            log::debug!("Failed decoding token claims");
            None
        })?;

    let exp = claims.get("exp").and_then(Value::as_f64).filter(|exp| *exp > 0.0)?;
    Utc.timestamp_millis_opt((exp * 1000.0) as i64).single()
}
