//! Shared-state data model
//!
//! The three durable collections: the message log, the per-identity location
//! table, and the local-only media vault.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{IdentityId, Timestamp};

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// A single chat message. Appended to the log at creation and never mutated
/// afterwards; the only bulk operation is clear-history, which replaces the
/// whole log with empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender_id: IdentityId,
    pub text: String,
    pub timestamp_ms: Timestamp,
    pub read: bool,
}

impl Message {
    /// Create a new message. The id is assigned by the sender at creation:
    /// creation-time millis plus a per-session sequence number, so two
    /// messages created in the same millisecond stay distinct.
    pub fn new(sender_id: IdentityId, text: impl Into<String>, now: Timestamp, seq: u64) -> Self {
        Self {
            id: format!("{}-{}", now.as_millis(), seq),
            sender_id,
            text: text.into(),
            timestamp_ms: now,
            read: false,
        }
    }
}

// ----------------------------------------------------------------------------
// Location Record
// ----------------------------------------------------------------------------

/// One location per identity, keyed by id, last-write-wins. No history is
/// retained. `is_active = false` is an explicit "stopped sharing" signal,
/// not absence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: Timestamp,
    pub is_active: bool,
}

impl LocationRecord {
    pub fn active(latitude: f64, longitude: f64, now: Timestamp) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms: now,
            is_active: true,
        }
    }

    /// The explicit stop-sharing record: zeroed coordinates, inactive.
    pub fn stopped(now: Timestamp) -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            timestamp_ms: now,
            is_active: false,
        }
    }
}

// ----------------------------------------------------------------------------
// Vault Item
// ----------------------------------------------------------------------------

/// A media item in the private vault. Vault content is per-device and never
/// propagated over the peer channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultItem {
    pub id: String,
    pub mime_type: String,
    pub data: Vec<u8>,
    pub created_at: Timestamp,
}

impl VaultItem {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>, now: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            mime_type: mime_type.into(),
            data,
            created_at: now,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_ids_distinct_within_same_millisecond() {
        let now = Timestamp::new(1_700_000_000_000);
        let a = Message::new(IdentityId::from("u1"), "one", now, 0);
        let b = Message::new(IdentityId::from("u1"), "two", now, 1);
        assert_ne!(a.id, b.id);
        assert_eq!(a.timestamp_ms, b.timestamp_ms);
    }

    #[test]
    fn test_stopped_location_is_explicit() {
        let record = LocationRecord::stopped(Timestamp::new(42));
        assert!(!record.is_active);
        assert_eq!(record.latitude, 0.0);
        assert_eq!(record.longitude, 0.0);
    }

    #[test]
    fn test_vault_items_get_unique_ids() {
        let now = Timestamp::new(42);
        let a = VaultItem::new("image/png", vec![1, 2, 3], now);
        let b = VaultItem::new("image/png", vec![1, 2, 3], now);
        assert_ne!(a.id, b.id);
    }
}
