//! Call signaling tracker
//!
//! Tracks the single call a session may have in flight. Like [`LinkManager`]
//! it is a pure state holder: the session task translates its outputs into
//! effects and app events.
//!
//! [`LinkManager`]: crate::link::LinkManager

use tracing::{debug, warn};
use uuid::Uuid;

use pairlink_core::{
    CallDirection, CallOffer, ChannelAddress, Effect, MediaHandle, PairlinkError, PendingCall,
    Result, Timestamp,
};

/// At most one call per session, in either direction
#[derive(Debug, Default)]
pub struct CallTracker {
    pending: Option<PendingCall>,
}

impl CallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&PendingCall> {
        self.pending.as_ref()
    }

    /// Place an outbound call toward the counterpart
    pub fn place(&mut self, local: &ChannelAddress, remote: &ChannelAddress) -> Result<Effect> {
        if self.pending.is_some() {
            return Err(PairlinkError::call_signaling("a call is already pending"));
        }
        let offer = CallOffer {
            id: Uuid::new_v4().to_string(),
            from: local.clone(),
        };
        debug!(offer = %offer.id, "placing call");
        self.pending = Some(PendingCall {
            direction: CallDirection::Outbound,
            offer: offer.clone(),
            accepted_at: None,
        });
        Ok(Effect::OfferCall {
            address: remote.clone(),
            offer,
        })
    }

    /// An inbound offer arrived. Returns the ringing call, or `None` if a
    /// call was already pending and the offer was dropped.
    pub fn on_offer(&mut self, offer: CallOffer) -> Option<&PendingCall> {
        if self.pending.is_some() {
            warn!(offer = %offer.id, "dropping offer, a call is already pending");
            return None;
        }
        debug!(offer = %offer.id, "inbound call ringing");
        self.pending = Some(PendingCall {
            direction: CallDirection::Inbound,
            offer,
            accepted_at: None,
        });
        self.pending.as_ref()
    }

    /// Accept the ringing inbound call with a local media stream
    pub fn accept(&mut self, local_media: MediaHandle, now: Timestamp) -> Result<Effect> {
        match self.pending.as_mut() {
            Some(call) if call.direction == CallDirection::Inbound && call.accepted_at.is_none() => {
                call.accepted_at = Some(now);
                Ok(Effect::AnswerCall {
                    offer: call.offer.clone(),
                    local_media,
                })
            }
            Some(_) => Err(PairlinkError::call_signaling(
                "no ringing inbound call to accept",
            )),
            None => Err(PairlinkError::call_signaling("no call is pending")),
        }
    }

    /// Reject the ringing call or hang up the active one
    pub fn reject(&mut self) -> Result<Effect> {
        if self.pending.take().is_none() {
            return Err(PairlinkError::call_signaling("no call is pending"));
        }
        Ok(Effect::HangUp {
            reason: "declined".to_string(),
        })
    }

    /// The counterpart accepted our outbound call. Returns whether the
    /// pending state changed.
    pub fn on_answered(&mut self, now: Timestamp) -> bool {
        match self.pending.as_mut() {
            Some(call) if call.direction == CallDirection::Outbound && call.accepted_at.is_none() => {
                call.accepted_at = Some(now);
                true
            }
            _ => false,
        }
    }

    /// The call ended remotely or its signaling failed. Returns whether a
    /// pending call was cleared.
    pub fn on_ended(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Drop any pending call without signaling, used at logout
    pub fn clear(&mut self) {
        self.pending = None;
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
