//! Persistence boundary
//!
//! The durable side of PairLink is three named slots, each holding one
//! serialized collection: the message log, the location table, and the media
//! vault. The underlying key-value mechanism is an external collaborator
//! behind [`StoreBackend`]; read-whole/write-whole semantics are all the
//! core requires.
//!
//! A store that cannot be read at startup is a fatal initialization error:
//! there is no meaningful degraded mode without durable state.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::StoreError;
use crate::model::{LocationRecord, Message, VaultItem};
use crate::types::IdentityId;

/// Slot holding the serialized message log
pub const SLOT_MESSAGES: &str = "pair_messages";
/// Slot holding the serialized location table
pub const SLOT_LOCATIONS: &str = "pair_locations";
/// Slot holding the serialized vault item set
pub const SLOT_VAULT: &str = "pair_vault";

// ----------------------------------------------------------------------------
// Store Backend Trait
// ----------------------------------------------------------------------------

/// Minimal get/set/remove interface over durable local storage
pub trait StoreBackend: Send {
    fn get(&self, slot: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&mut self, slot: &str, bytes: &[u8]) -> Result<(), StoreError>;
    fn remove(&mut self, slot: &str) -> Result<(), StoreError>;
}

// ----------------------------------------------------------------------------
// Memory Backend
// ----------------------------------------------------------------------------

/// In-memory backend for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seed a slot with raw bytes (test helper for corrupt-data cases)
    pub fn with_slot(mut self, slot: &str, bytes: Vec<u8>) -> Self {
        self.slots.insert(slot.to_string(), bytes);
        self
    }
}

impl StoreBackend for MemoryStore {
    fn get(&self, slot: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.slots.get(slot).cloned())
    }

    fn put(&mut self, slot: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.slots.insert(slot.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&mut self, slot: &str) -> Result<(), StoreError> {
        self.slots.remove(slot);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// File Backend
// ----------------------------------------------------------------------------

/// One JSON file per slot under a directory
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::backend("<store-dir>", e))?;
        Ok(Self { dir })
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}.json"))
    }
}

impl StoreBackend for FileStore {
    fn get(&self, slot: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match std::fs::read(self.slot_path(slot)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::backend(slot, e)),
        }
    }

    fn put(&mut self, slot: &str, bytes: &[u8]) -> Result<(), StoreError> {
        std::fs::write(self.slot_path(slot), bytes).map_err(|e| StoreError::backend(slot, e))
    }

    fn remove(&mut self, slot: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.slot_path(slot)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::backend(slot, e)),
        }
    }
}

// ----------------------------------------------------------------------------
// Typed Pair Store
// ----------------------------------------------------------------------------

/// Typed layer over a backend. Collections are cached in memory and written
/// whole on every mutation, so each mutation is atomic with respect to the
/// persisted slot.
pub struct PairStore {
    backend: Box<dyn StoreBackend>,
    messages: Vec<Message>,
    locations: HashMap<IdentityId, LocationRecord>,
    vault: Vec<VaultItem>,
}

impl PairStore {
    /// Load all three slots. Corrupt or unreadable slot data fails the open.
    pub fn open(backend: Box<dyn StoreBackend>) -> Result<Self, StoreError> {
        let messages: Vec<Message> =
            load_slot(backend.as_ref(), SLOT_MESSAGES)?.unwrap_or_default();
        let locations: HashMap<IdentityId, LocationRecord> =
            load_slot(backend.as_ref(), SLOT_LOCATIONS)?.unwrap_or_default();
        let vault: Vec<VaultItem> = load_slot(backend.as_ref(), SLOT_VAULT)?.unwrap_or_default();
        debug!(
            messages = messages.len(),
            locations = locations.len(),
            vault = vault.len(),
            "store opened"
        );
        Ok(Self {
            backend,
            messages,
            locations,
            vault,
        })
    }

    // -- message log ---------------------------------------------------------

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn append_message(&mut self, message: Message) -> Result<(), StoreError> {
        self.messages.push(message);
        write_slot(self.backend.as_mut(), SLOT_MESSAGES, &self.messages)
    }

    /// Replace the entire log with empty
    pub fn clear_messages(&mut self) -> Result<(), StoreError> {
        self.messages.clear();
        write_slot(self.backend.as_mut(), SLOT_MESSAGES, &self.messages)
    }

    // -- location table ------------------------------------------------------

    pub fn locations(&self) -> &HashMap<IdentityId, LocationRecord> {
        &self.locations
    }

    /// Last-write-wins upsert keyed by identity id
    pub fn upsert_location(
        &mut self,
        id: IdentityId,
        record: LocationRecord,
    ) -> Result<(), StoreError> {
        self.locations.insert(id, record);
        write_slot(self.backend.as_mut(), SLOT_LOCATIONS, &self.locations)
    }

    // -- vault ---------------------------------------------------------------

    pub fn vault(&self) -> &[VaultItem] {
        &self.vault
    }

    pub fn vault_add(&mut self, item: VaultItem) -> Result<(), StoreError> {
        self.vault.push(item);
        write_slot(self.backend.as_mut(), SLOT_VAULT, &self.vault)
    }

    /// Remove by id; returns whether anything was removed
    pub fn vault_remove(&mut self, id: &str) -> Result<bool, StoreError> {
        let before = self.vault.len();
        self.vault.retain(|item| item.id != id);
        if self.vault.len() == before {
            return Ok(false);
        }
        write_slot(self.backend.as_mut(), SLOT_VAULT, &self.vault)?;
        Ok(true)
    }
}

impl std::fmt::Debug for PairStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairStore")
            .field("messages", &self.messages.len())
            .field("locations", &self.locations.len())
            .field("vault", &self.vault.len())
            .finish()
    }
}

fn load_slot<T: DeserializeOwned>(
    backend: &dyn StoreBackend,
    slot: &str,
) -> Result<Option<T>, StoreError> {
    match backend.get(slot)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                slot: slot.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

fn write_slot<T: Serialize>(
    backend: &mut dyn StoreBackend,
    slot: &str,
    value: &T,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(value).map_err(|source| StoreError::Corrupt {
        slot: slot.to_string(),
        source,
    })?;
    backend.put(slot, &bytes)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Timestamp;

    fn message(text: &str, seq: u64) -> Message {
        Message::new(IdentityId::from("u1"), text, Timestamp::new(1_000), seq)
    }

    #[test]
    fn test_messages_survive_reopen() {
        let mut store = PairStore::open(Box::new(MemoryStore::new())).unwrap();
        store.append_message(message("hi", 0)).unwrap();
        store.append_message(message("there", 1)).unwrap();

        // simulate a restart over the same backing bytes
        let bytes = serde_json::to_vec(store.messages()).unwrap();
        let backend = MemoryStore::new().with_slot(SLOT_MESSAGES, bytes);
        let reopened = PairStore::open(Box::new(backend)).unwrap();
        assert_eq!(reopened.messages().len(), 2);
        assert_eq!(reopened.messages()[1].text, "there");
    }

    #[test]
    fn test_clear_replaces_log_with_empty() {
        let mut store = PairStore::open(Box::new(MemoryStore::new())).unwrap();
        store.append_message(message("a", 0)).unwrap();
        store.append_message(message("b", 1)).unwrap();
        store.clear_messages().unwrap();
        assert!(store.messages().is_empty());
    }

    #[test]
    fn test_location_upsert_is_last_write_wins() {
        let mut store = PairStore::open(Box::new(MemoryStore::new())).unwrap();
        let id = IdentityId::from("u2");
        store
            .upsert_location(id.clone(), LocationRecord::active(1.0, 2.0, Timestamp::new(1)))
            .unwrap();
        store
            .upsert_location(id.clone(), LocationRecord::active(3.0, 4.0, Timestamp::new(2)))
            .unwrap();

        assert_eq!(store.locations().len(), 1);
        let record = &store.locations()[&id];
        assert_eq!(record.latitude, 3.0);
        assert_eq!(record.longitude, 4.0);
    }

    #[test]
    fn test_vault_remove_by_id() {
        let mut store = PairStore::open(Box::new(MemoryStore::new())).unwrap();
        let item = VaultItem::new("image/png", vec![1], Timestamp::new(1));
        let id = item.id.clone();
        store.vault_add(item).unwrap();
        assert!(store.vault_remove(&id).unwrap());
        assert!(!store.vault_remove(&id).unwrap());
        assert!(store.vault().is_empty());
    }

    #[test]
    fn test_corrupt_slot_fails_open() {
        let backend = MemoryStore::new().with_slot(SLOT_MESSAGES, b"not-json".to_vec());
        let result = PairStore::open(Box::new(backend));
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("pairlink-store-{}", uuid::Uuid::new_v4()));
        let mut backend = FileStore::open(&dir).unwrap();
        backend.put(SLOT_VAULT, b"[]").unwrap();
        assert_eq!(backend.get(SLOT_VAULT).unwrap().unwrap(), b"[]");
        backend.remove(SLOT_VAULT).unwrap();
        assert!(backend.get(SLOT_VAULT).unwrap().is_none());
        std::fs::remove_dir_all(&dir).ok();
    }
}
