//! Inbound frame reconciliation
//!
//! Applies frames received from the counterpart to the local store and
//! reports the resulting state changes. Mutation happens before
//! notification, so a view that reacts to an [`AppEvent`] always observes
//! the new state.
//!
//! Malformed frames and unknown kinds are logged and dropped without
//! touching the store.

use tracing::{debug, warn};

use pairlink_core::{decode_frame, AppEvent, PairStore, StoreError, WireBody};

/// Decode and apply one inbound frame.
///
/// Returns the app events to publish, in order. An undecodable frame yields
/// no events; a store failure is fatal and propagates.
pub fn apply_inbound(store: &mut PairStore, bytes: &[u8]) -> Result<Vec<AppEvent>, StoreError> {
    let wire = match decode_frame(bytes) {
        Ok(wire) => wire,
        Err(error) => {
            warn!(%error, "dropping undecodable frame");
            return Ok(Vec::new());
        }
    };

    debug!(kind = wire.kind(), sender = %wire.sender_id, "applying inbound frame");

    match wire.body {
        WireBody::Message(message) => {
            store.append_message(message.clone())?;
            Ok(vec![AppEvent::MessageAppended { message }])
        }
        WireBody::Location(record) => {
            store.upsert_location(wire.sender_id.clone(), record.clone())?;
            Ok(vec![AppEvent::LocationUpdated {
                id: wire.sender_id,
                record,
            }])
        }
        WireBody::ClearHistory => {
            store.clear_messages()?;
            Ok(vec![AppEvent::HistoryCleared])
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pairlink_core::{
        encode_frame, IdentityId, LocationRecord, MemoryStore, Message, Timestamp, WireMessage,
    };

    fn store() -> PairStore {
        PairStore::open(Box::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn test_inbound_message_is_stored_then_reported() {
        let mut store = store();
        let sender = IdentityId::from("u2");
        let message = Message::new(sender.clone(), "on my way", Timestamp::new(1_000), 0);
        let frame = encode_frame(&WireMessage::message(sender, message.clone())).unwrap();

        let events = apply_inbound(&mut store, &frame).unwrap();

        assert_eq!(store.messages(), &[message.clone()]);
        assert!(matches!(&events[..], [AppEvent::MessageAppended { message: m }]
            if m.id == message.id));
    }

    #[test]
    fn test_inbound_location_overwrites_previous() {
        let mut store = store();
        let sender = IdentityId::from("u2");
        let first = LocationRecord::active(1.0, 2.0, Timestamp::new(1_000));
        let second = LocationRecord::stopped(Timestamp::new(2_000));

        for record in [&first, &second] {
            let frame =
                encode_frame(&WireMessage::location(sender.clone(), record.clone())).unwrap();
            apply_inbound(&mut store, &frame).unwrap();
        }

        assert_eq!(store.locations().get(&sender), Some(&second));
    }

    #[test]
    fn test_inbound_clear_empties_the_log() {
        let mut store = store();
        store
            .append_message(Message::new(
                IdentityId::from("u1"),
                "old",
                Timestamp::new(1),
                0,
            ))
            .unwrap();

        let frame = encode_frame(&WireMessage::clear_history(IdentityId::from("u2"))).unwrap();
        let events = apply_inbound(&mut store, &frame).unwrap();

        assert!(store.messages().is_empty());
        assert!(matches!(&events[..], [AppEvent::HistoryCleared]));
    }

    #[test]
    fn test_garbage_frame_is_dropped_quietly() {
        let mut store = store();
        let events = apply_inbound(&mut store, b"not json").unwrap();
        assert!(events.is_empty());
        assert!(store.messages().is_empty());
    }
}
