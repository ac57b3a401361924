//! Wire protocol for the peer data channel
//!
//! Three message kinds travel between the two peers, each wrapped in a
//! discriminated envelope `{ kind, sender_id, payload }` and serialized as a
//! JSON object (the transport boundary exchanges JSON). Delivery is
//! best-effort: there is no acknowledgement, retry, or outbox.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{LocationRecord, Message};
use crate::types::IdentityId;

// ----------------------------------------------------------------------------
// Envelope
// ----------------------------------------------------------------------------

/// A typed envelope sent over the peer data channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub sender_id: IdentityId,
    #[serde(flatten)]
    pub body: WireBody,
}

/// The discriminated payload of a wire message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum WireBody {
    /// Append to the message log
    #[serde(rename = "MESSAGE")]
    Message(Message),
    /// Upsert into the location table keyed by sender, last write wins
    #[serde(rename = "LOCATION")]
    Location(LocationRecord),
    /// Replace the message log with empty
    #[serde(rename = "CLEAR_HISTORY")]
    ClearHistory,
}

impl WireMessage {
    pub fn message(sender_id: IdentityId, message: Message) -> Self {
        Self {
            sender_id,
            body: WireBody::Message(message),
        }
    }

    pub fn location(sender_id: IdentityId, record: LocationRecord) -> Self {
        Self {
            sender_id,
            body: WireBody::Location(record),
        }
    }

    pub fn clear_history(sender_id: IdentityId) -> Self {
        Self {
            sender_id,
            body: WireBody::ClearHistory,
        }
    }

    /// Kind discriminant, for logging
    pub fn kind(&self) -> &'static str {
        match self.body {
            WireBody::Message(_) => "MESSAGE",
            WireBody::Location(_) => "LOCATION",
            WireBody::ClearHistory => "CLEAR_HISTORY",
        }
    }
}

// ----------------------------------------------------------------------------
// Frame Codec
// ----------------------------------------------------------------------------

/// Encode a wire message into a JSON frame
pub fn encode_frame(wire: &WireMessage) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(wire)?)
}

/// Decode a JSON frame. Unknown kinds and malformed frames are errors; the
/// receiver logs and drops them.
pub fn decode_frame(bytes: &[u8]) -> Result<WireMessage> {
    Ok(serde_json::from_slice(bytes)?)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    #[test]
    fn test_envelope_carries_kind_and_sender() {
        let sender = IdentityId::from("u1");
        let message = Message::new(sender.clone(), "hi", Timestamp::new(1_000), 0);
        let frame = encode_frame(&WireMessage::message(sender, message)).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(value["kind"], "MESSAGE");
        assert_eq!(value["sender_id"], "u1");
        assert_eq!(value["payload"]["text"], "hi");
    }

    #[test]
    fn test_clear_history_has_no_payload() {
        let frame = encode_frame(&WireMessage::clear_history(IdentityId::from("u2"))).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(value["kind"], "CLEAR_HISTORY");
        assert!(value.get("payload").is_none());

        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.body, WireBody::ClearHistory);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let frame = br#"{"sender_id":"u1","kind":"VAULT","payload":{}}"#;
        assert!(decode_frame(frame).is_err());
    }

    #[test]
    fn test_message_survives_the_wire_intact() {
        let sender = IdentityId::from("u1");
        let message = Message::new(sender.clone(), "see you at 6", Timestamp::new(99), 3);
        let frame = encode_frame(&WireMessage::message(sender, message.clone())).unwrap();
        let decoded = decode_frame(&frame).unwrap();
        assert_eq!(decoded.body, WireBody::Message(message));
    }
}
