//! PairLink Core
//!
//! This crate provides the foundational types and boundary definitions for
//! PairLink, a pairwise private peer-to-peer channel that keeps two known
//! users' shared state (messages, live location, call signaling) in sync.
//!
//! The engine that drives these types lives in `pairlink-runtime`; rendering
//! layers and real NAT-traversal transports attach at the boundaries defined
//! here and are deliberately out of scope.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod address;
pub mod call;
pub mod channel;
pub mod config;
pub mod error;
pub mod geo;
pub mod identity;
pub mod model;
pub mod store;
pub mod transport;
pub mod types;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use address::derive_address;
pub use call::{CallDirection, CallOffer, MediaHandle, PendingCall};
pub use channel::{
    create_app_event_channel, create_command_channel, create_effect_channel, create_event_channel,
    AppEvent, AppEventReceiver, AppEventSender, Command, CommandReceiver, CommandSender, Effect,
    EffectReceiver, EffectSender, Event, EventReceiver, EventSender, LinkDirection,
    SessionSnapshot,
};
pub use config::{ChannelConfig, LinkConfig, PairlinkConfig, SessionConfig};
pub use error::{GeoError, PairlinkError, Result, StoreError, TransportError};
pub use geo::{FixedPosition, GeoProvider, Position};
pub use identity::{Identity, Roster};
pub use model::{LocationRecord, Message, VaultItem};
pub use store::{FileStore, MemoryStore, PairStore, StoreBackend};
pub use transport::TransportTask;
pub use types::{ChannelAddress, IdentityId, SystemTimeSource, TimeSource, Timestamp};
pub use wire::{decode_frame, encode_frame, WireBody, WireMessage};
