//! Typed channel protocol between the view layer, the session task, and the
//! transport task
//!
//! All inter-task communication flows through four message types:
//! `Command` (view → session), `Event` (transport → session), `Effect`
//! (session → transport), and `AppEvent` (session → view). The session task
//! is the only owner of mutable state; everything else reacts to these
//! messages.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::call::{CallOffer, MediaHandle, PendingCall};
use crate::config::ChannelConfig;
use crate::identity::Identity;
use crate::model::{LocationRecord, Message, VaultItem};
use crate::types::{ChannelAddress, IdentityId};

// ----------------------------------------------------------------------------
// Command: View → Session
// ----------------------------------------------------------------------------

/// Commands sent from the attached view layer to the session task.
/// Every command except `Shutdown` counts as user activity for the idle
/// timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Command {
    /// Case-insensitive login attempt against the roster
    Login { email: String },
    /// Tear down the connection and clear the current identity
    Logout,
    /// Create, persist, and best-effort transmit a chat message
    SendMessage { text: String },
    /// Replace the message log with empty, locally and on the peer
    ClearHistory,
    /// Acquire one position fix and start sharing it
    ShareLocation,
    /// Publish an explicit stopped-sharing record
    StopSharingLocation,
    /// Add a media item to the local-only vault
    VaultAdd { item: VaultItem },
    /// Remove a vault item by id
    VaultRemove { id: String },
    /// Place an outbound call toward the counterpart
    PlaceCall,
    /// Accept the pending inbound call with a local media stream
    AcceptCall { local_media: MediaHandle },
    /// Reject or hang up the pending call
    RejectCall,
    /// Bare user-activity signal (resets the idle countdown)
    Activity,
    /// Request a full state snapshot via `AppEvent::Snapshot`
    QuerySnapshot,
    /// Stop the session task
    Shutdown,
}

// ----------------------------------------------------------------------------
// Event: Transport → Session
// ----------------------------------------------------------------------------

/// Which side initiated the data channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkDirection {
    Inbound,
    Outbound,
}

/// Events sent from the transport task to the session task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// The local listening endpoint is open under the derived address
    EndpointOpened,
    /// The listening endpoint could not be opened or failed later
    EndpointError { reason: String },
    /// A data channel to the counterpart is open (either direction)
    ChannelConnected { direction: LinkDirection },
    /// The active data channel closed
    ChannelClosed { reason: String },
    /// An outbound connection attempt failed; the retry schedule covers it
    ConnectFailed { reason: String },
    /// A frame arrived on the data channel
    FrameReceived { bytes: Vec<u8> },
    /// The counterpart placed a call
    CallOffered { offer: CallOffer },
    /// The counterpart accepted our call
    CallAnswered,
    /// The call ended or its signaling failed
    CallEnded { reason: String },
}

// ----------------------------------------------------------------------------
// Effect: Session → Transport
// ----------------------------------------------------------------------------

/// External side effects requested by the session task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Effect {
    /// Open the local listening endpoint under this address
    OpenEndpoint { address: ChannelAddress },
    /// Attempt an outbound connection to the counterpart's address.
    /// Re-dialing an already-linked address is a no-op at the transport.
    Connect { address: ChannelAddress },
    /// Send a frame over the active data channel
    SendFrame { bytes: Vec<u8> },
    /// Place a call toward the counterpart's address
    OfferCall {
        address: ChannelAddress,
        offer: CallOffer,
    },
    /// Answer a pending inbound call
    AnswerCall {
        offer: CallOffer,
        local_media: MediaHandle,
    },
    /// Reject or hang up the current call
    HangUp { reason: String },
    /// Tear down the endpoint and any active channel
    CloseEndpoint,
}

// ----------------------------------------------------------------------------
// AppEvent: Session → View
// ----------------------------------------------------------------------------

/// Read-only snapshot of session state for the view layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    pub online: bool,
    pub messages: Vec<Message>,
    pub locations: HashMap<IdentityId, LocationRecord>,
    pub vault: Vec<VaultItem>,
    pub pending_call: Option<PendingCall>,
}

/// State-change notifications published to the view layer. Published after
/// the corresponding store mutation, never before, and safe to drop when no
/// view is attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
    /// Login succeeded; a snapshot follows
    LoggedIn { identity: Identity },
    /// Login email was not in the roster; nothing changed
    LoginRejected,
    /// The session ended (explicit logout or idle timeout)
    SessionEnded { reason: String },
    /// The peer channel came up or went down
    ConnectivityChanged { online: bool },
    /// A message was appended to the log (local or remote origin)
    MessageAppended { message: Message },
    /// The message log was replaced with empty
    HistoryCleared,
    /// A location record was upserted
    LocationUpdated {
        id: IdentityId,
        record: LocationRecord,
    },
    /// A position request failed; the sharing toggle should revert
    LocationFailed { reason: String },
    /// The vault contents changed
    VaultChanged { items: Vec<VaultItem> },
    /// An inbound call is ringing
    CallOffered { offer: CallOffer },
    /// The pending call changed (accepted, answered, cleared)
    CallStateChanged { call: Option<PendingCall> },
    /// Call signaling failed terminally for the pending call
    CallFailed { reason: String },
    /// Full state snapshot, in response to `Command::QuerySnapshot`
    Snapshot(SessionSnapshot),
}

// ----------------------------------------------------------------------------
// Channel Types and Constructors
// ----------------------------------------------------------------------------

pub type CommandSender = mpsc::Sender<Command>;
pub type CommandReceiver = mpsc::Receiver<Command>;
pub type EventSender = mpsc::Sender<Event>;
pub type EventReceiver = mpsc::Receiver<Event>;
pub type EffectSender = mpsc::Sender<Effect>;
pub type EffectReceiver = mpsc::Receiver<Effect>;
pub type AppEventSender = mpsc::Sender<AppEvent>;
pub type AppEventReceiver = mpsc::Receiver<AppEvent>;

/// Create the bounded command channel (view → session)
pub fn create_command_channel(config: &ChannelConfig) -> (CommandSender, CommandReceiver) {
    mpsc::channel(config.command_buffer_size)
}

/// Create the bounded event channel (transport → session)
pub fn create_event_channel(config: &ChannelConfig) -> (EventSender, EventReceiver) {
    mpsc::channel(config.event_buffer_size)
}

/// Create the bounded effect channel (session → transport)
pub fn create_effect_channel(config: &ChannelConfig) -> (EffectSender, EffectReceiver) {
    mpsc::channel(config.effect_buffer_size)
}

/// Create the bounded app event channel (session → view)
pub fn create_app_event_channel(config: &ChannelConfig) -> (AppEventSender, AppEventReceiver) {
    mpsc::channel(config.app_event_buffer_size)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_command_channel_roundtrip() {
        let config = ChannelConfig::default();
        let (sender, mut receiver) = create_command_channel(&config);

        sender
            .send(Command::SendMessage {
                text: "hi".to_string(),
            })
            .await
            .unwrap();

        match receiver.recv().await.unwrap() {
            Command::SendMessage { text } => assert_eq!(text, "hi"),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
