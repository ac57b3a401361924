//! Call signaling types
//!
//! Voice/video establishment is layered on the same peer identity as the
//! data channel. The core only tracks the signaling state; media capture and
//! playback belong to the attached view layer, which hands the runtime an
//! opaque [`MediaHandle`] when it accepts a call.

use serde::{Deserialize, Serialize};

use crate::types::{ChannelAddress, Timestamp};

// ----------------------------------------------------------------------------
// Call Offer
// ----------------------------------------------------------------------------

/// Opaque handle to a call offer relayed by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOffer {
    /// Offer identifier, assigned by the placing side
    pub id: String,
    /// Address of the peer that placed the call
    pub from: ChannelAddress,
}

// ----------------------------------------------------------------------------
// Pending Call
// ----------------------------------------------------------------------------

/// Which side initiated the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    Inbound,
    Outbound,
}

/// The single call currently being negotiated. Transient; at most one per
/// session, cleared on logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCall {
    pub direction: CallDirection,
    pub offer: CallOffer,
    pub accepted_at: Option<Timestamp>,
}

// ----------------------------------------------------------------------------
// Media Handle
// ----------------------------------------------------------------------------

/// Opaque token for a local media stream supplied by the view layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaHandle(String);

impl MediaHandle {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
