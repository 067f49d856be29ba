//! The persisted session record.
//!
//! A [`SessionRecord`] is the single unit of persistence: one JSON blob per
//! tier under the [`SESSION_KEY`] logical key, covering the identity fields,
//! the opaque application payload, and the activity timestamp. Tiers repair
//! and delete it as a unit.

use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logical key under which the session record is stored in every tier.
pub const SESSION_KEY: &str = "session";

/// A recoverable authentication session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Stable identity key. A record with an empty `user_id` is malformed.
    pub user_id: String,
    /// Denormalized profile field, advisory only.
    pub email: String,
    /// Denormalized profile field, advisory only.
    pub display_name: String,
    /// Opaque application payload. The engine never inspects it.
    #[serde(with = "blob_base64", default)]
    pub profile_blob: Vec<u8>,
    /// Last heartbeat time. Monotonically non-decreasing while the session
    /// is active.
    pub last_activity_at: DateTime<Utc>,
    /// Opaque identifier (UUID v7), generated once per successful login.
    pub session_id: String,
    /// Opaque identifier (UUID v7) of the context that last wrote the
    /// record. Distinguishes concurrent contexts sharing a durable tier.
    pub tab_id: String,
}

impl SessionRecord {
    /// Whether the record satisfies the persistence invariant: a non-empty
    /// `user_id` and an activity timestamp that is not in the future.
    pub fn is_well_formed(&self) -> bool {
        !self.user_id.is_empty() && self.last_activity_at <= Utc::now()
    }

    /// Parse a raw tier payload into a well-formed record.
    ///
    /// Returns `None` on parse failure or if the invariant does not hold —
    /// a malformed record is treated as absent, never as invalid-but-present.
    pub fn parse_stored(raw: &str) -> Option<Self> {
        let record: Self = serde_json::from_str(raw).ok()?;
        record.is_well_formed().then_some(record)
    }

    /// Seconds since the last recorded activity.
    pub fn idle_secs(&self) -> i64 {
        (Utc::now() - self.last_activity_at).num_seconds()
    }

    /// Advance the activity timestamp to now. Never moves it backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_activity_at {
            self.last_activity_at = now;
        }
    }
}

/// Serde adapter: opaque bytes as a base64 string inside the JSON record.
mod blob_base64 {
    use super::BASE64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded.as_bytes()).map_err(D::Error::custom)
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use chrono::Duration;

    fn record() -> SessionRecord {
        SessionRecord {
            user_id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            display_name: "User One".to_string(),
            profile_blob: vec![0x00, 0xff, 0x42],
            last_activity_at: Utc::now(),
            session_id: uuid::Uuid::now_v7().to_string(),
            tab_id: uuid::Uuid::now_v7().to_string(),
        }
    }

    #[test]
    fn json_round_trip_preserves_blob() {
        let original = record();
        let raw = serde_json::to_string(&original).unwrap();
        // The blob must land as base64, not a JSON byte array.
        assert!(raw.contains(&BASE64.encode([0x00, 0xff, 0x42])));

        let parsed = SessionRecord::parse_stored(&raw).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn empty_user_id_is_malformed() {
        let mut r = record();
        r.user_id.clear();
        let raw = serde_json::to_string(&r).unwrap();
        assert!(SessionRecord::parse_stored(&raw).is_none());
    }

    #[test]
    fn future_timestamp_is_malformed() {
        let mut r = record();
        r.last_activity_at = Utc::now() + Duration::minutes(5);
        let raw = serde_json::to_string(&r).unwrap();
        assert!(SessionRecord::parse_stored(&raw).is_none());
    }

    #[test]
    fn garbage_payload_is_absent() {
        assert!(SessionRecord::parse_stored("not json").is_none());
        assert!(SessionRecord::parse_stored("{}").is_none());
        assert!(SessionRecord::parse_stored(r#"{"user_id":"u1"}"#).is_none());
    }

    #[test]
    fn touch_is_monotonic() {
        let mut r = record();
        let before = r.last_activity_at;
        r.touch();
        assert!(r.last_activity_at >= before);

        // A clock that appears to run backwards must not rewind the record.
        r.last_activity_at = Utc::now() + Duration::seconds(1);
        let pinned = r.last_activity_at;
        r.touch();
        assert_eq!(r.last_activity_at, pinned);
    }

    #[test]
    fn missing_blob_field_defaults_to_empty() {
        let raw = format!(
            r#"{{"user_id":"u1","email":"","display_name":"","last_activity_at":"{}","session_id":"s","tab_id":"t"}}"#,
            Utc::now().to_rfc3339()
        );
        let parsed = SessionRecord::parse_stored(&raw).unwrap();
        assert!(parsed.profile_blob.is_empty());
    }
}
