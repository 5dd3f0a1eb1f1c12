//! Optimistic-concurrency version tokens
//!
//! A `ConcurrencyToken` is a per-entity update counter, bumped by the
//! storage layer on every successful write. On the wire it travels as a
//! strong HTTP validator: `"base64(v<decimal>)"`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Weak-validator marker. Weak validators are never accepted as
/// authoritative for optimistic concurrency.
pub const WEAK_PREFIX: &str = "W/";

/// The `*` wildcard is list-level syntax, not a token.
pub const WILDCARD: &str = "*";

/// Unsigned 32-bit update counter attached to mutable entities exposed
/// over HTTP. Monotonically non-decreasing per entity; equality with a
/// client-presented token is the sole "unchanged since read" criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConcurrencyToken(pub u32);

impl ConcurrencyToken {
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Encode as a quoted strong validator for the `ETag` header.
    #[must_use]
    pub fn encode(self) -> String {
        let payload = format!("v{}", self.0);
        format!("\"{}\"", BASE64.encode(payload.as_bytes()))
    }

    /// Decode a client-presented validator back into a token.
    ///
    /// Accepts the quoted wire form and the bare base64 payload. Rejects
    /// weak validators, the wildcard, malformed base64, non-UTF-8
    /// payloads, and payloads that are not `v` followed by a decimal
    /// integer representable in 32 bits.
    #[must_use]
    pub fn decode(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.starts_with(WEAK_PREFIX) {
            return None;
        }

        let unquoted = trimmed
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(trimmed);

        if unquoted == WILDCARD {
            return None;
        }

        let bytes = BASE64.decode(unquoted).ok()?;
        let text = String::from_utf8(bytes).ok()?;

        let digits = text.strip_prefix('v')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u32>().ok().map(Self)
    }
}

impl std::fmt::Display for ConcurrencyToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// Database mapping: ConcurrencyToken <-> BIGINT. The counter is u32 in the
// domain, so the decode is range-checked and rejects out-of-range rows.
impl sqlx::Type<sqlx::Postgres> for ConcurrencyToken {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }
}

impl sqlx::Encode<'_, sqlx::Postgres> for ConcurrencyToken {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        let val = i64::from(self.0);
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&val, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ConcurrencyToken {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let val = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        let val = u32::try_from(val).map_err(|_| format!("Invalid version value: {val}"))?;
        Ok(Self(val))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for value in [0, 1, 42, 65_535, u32::MAX] {
            let token = ConcurrencyToken::new(value);
            assert_eq!(ConcurrencyToken::decode(&token.encode()), Some(token));
        }
    }

    #[test]
    fn test_encode_is_quoted_strong_validator() {
        let encoded = ConcurrencyToken::new(7).encode();
        assert!(encoded.starts_with('"'));
        assert!(encoded.ends_with('"'));
        assert_eq!(encoded.matches('"').count(), 2);
        assert!(!encoded.starts_with(WEAK_PREFIX));
    }

    #[test]
    fn test_decode_unquoted_payload() {
        let encoded = ConcurrencyToken::new(9).encode();
        let bare = encoded.trim_matches('"');
        assert_eq!(ConcurrencyToken::decode(bare), Some(ConcurrencyToken::new(9)));
    }

    #[test]
    fn test_decode_trims_whitespace() {
        let encoded = ConcurrencyToken::new(3).encode();
        let padded = format!("  {encoded}  ");
        assert_eq!(ConcurrencyToken::decode(&padded), Some(ConcurrencyToken::new(3)));
    }

    #[test]
    fn test_decode_rejects_weak_validator() {
        let encoded = ConcurrencyToken::new(5).encode();
        assert_eq!(ConcurrencyToken::decode(&format!("W/{encoded}")), None);
    }

    #[test]
    fn test_decode_rejects_wildcard() {
        assert_eq!(ConcurrencyToken::decode("*"), None);
        assert_eq!(ConcurrencyToken::decode("\"*\""), None);
    }

    #[test]
    fn test_decode_rejects_malformed_base64() {
        assert_eq!(ConcurrencyToken::decode("\"!!not-base64!!\""), None);
        assert_eq!(ConcurrencyToken::decode("\"\""), None);
    }

    #[test]
    fn test_decode_rejects_bad_payloads() {
        // base64("x1"): wrong prefix
        assert_eq!(ConcurrencyToken::decode(&format!("\"{}\"", BASE64.encode("x1"))), None);
        // base64("v"): no digits
        assert_eq!(ConcurrencyToken::decode(&format!("\"{}\"", BASE64.encode("v"))), None);
        // base64("v-1"): negative
        assert_eq!(ConcurrencyToken::decode(&format!("\"{}\"", BASE64.encode("v-1"))), None);
        // base64("v12abc"): trailing garbage
        assert_eq!(
            ConcurrencyToken::decode(&format!("\"{}\"", BASE64.encode("v12abc"))),
            None
        );
        // base64("v4294967296"): one past u32::MAX
        assert_eq!(
            ConcurrencyToken::decode(&format!("\"{}\"", BASE64.encode("v4294967296"))),
            None
        );
        // non-UTF8 payload
        assert_eq!(
            ConcurrencyToken::decode(&format!("\"{}\"", BASE64.encode([0xff, 0xfe]))),
            None
        );
    }
}
