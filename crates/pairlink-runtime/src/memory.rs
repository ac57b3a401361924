//! In-memory transport
//!
//! Stands in for a real NAT-traversal transport: a [`MemoryHub`] plays the
//! rendezvous broker, mapping channel addresses to peer inboxes, and a
//! [`MemoryTransport`] per runtime executes effects against it. Semantics
//! mirror what the session layer expects from a real peer connection:
//! dialing an absent address fails with `peer-unavailable`, dialing an
//! already-linked address is a no-op, and a new inbound link replaces the
//! old one.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use pairlink_core::{
    CallOffer, ChannelAddress, Effect, EffectReceiver, Event, EventSender, LinkDirection,
    TransportError, TransportTask,
};

const INBOX_CAPACITY: usize = 64;

// ----------------------------------------------------------------------------
// Hub
// ----------------------------------------------------------------------------

/// A frame delivered between transports through the hub
#[derive(Debug, Clone)]
enum HubFrame {
    /// The sender opened a data channel to us
    LinkUp { from: ChannelAddress },
    /// The sender tore its endpoint down
    LinkDown { from: ChannelAddress },
    /// Data on the established channel
    Data { bytes: Vec<u8> },
    /// Call signaling
    CallOffer { offer: CallOffer },
    CallAnswer,
    CallHangUp { reason: String },
}

/// Shared address registry connecting [`MemoryTransport`]s. Cheap to clone;
/// all clones share one registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryHub {
    peers: Arc<DashMap<ChannelAddress, mpsc::Sender<HubFrame>>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an endpoint is currently registered under this address
    pub fn is_registered(&self, address: &ChannelAddress) -> bool {
        self.peers.contains_key(address)
    }

    /// Register an endpoint, replacing any earlier registration under the
    /// same address (a restarted peer supersedes its dead predecessor).
    fn register(&self, address: ChannelAddress) -> mpsc::Receiver<HubFrame> {
        let (sender, receiver) = mpsc::channel(INBOX_CAPACITY);
        self.peers.insert(address, sender);
        receiver
    }

    fn deregister(&self, address: &ChannelAddress) {
        self.peers.remove(address);
    }

    /// Deliver a frame to the endpoint at `address`. Returns `false` when no
    /// live endpoint is registered there.
    async fn deliver(&self, address: &ChannelAddress, frame: HubFrame) -> bool {
        // Clone the sender out so no map guard is held across the await
        let Some(sender) = self.peers.get(address).map(|entry| entry.clone()) else {
            return false;
        };
        sender.send(frame).await.is_ok()
    }
}

// ----------------------------------------------------------------------------
// Transport
// ----------------------------------------------------------------------------

/// [`TransportTask`] backed by a [`MemoryHub`]
pub struct MemoryTransport {
    hub: MemoryHub,
    channels: Option<(EventSender, EffectReceiver)>,
}

impl MemoryTransport {
    pub fn new(hub: MemoryHub) -> Self {
        Self {
            hub,
            channels: None,
        }
    }
}

#[async_trait]
impl TransportTask for MemoryTransport {
    fn attach_channels(&mut self, event_sender: EventSender, effect_receiver: EffectReceiver) {
        self.channels = Some((event_sender, effect_receiver));
    }

    async fn run(&mut self) -> Result<(), TransportError> {
        let (event_sender, mut effect_receiver) =
            self.channels.take().ok_or(TransportError::NotAttached)?;

        let mut driver = Driver {
            hub: self.hub.clone(),
            event_sender,
            local: None,
            inbox: None,
            linked: None,
        };

        loop {
            tokio::select! {
                effect = effect_receiver.recv() => {
                    match effect {
                        Some(effect) => {
                            if !driver.handle_effect(effect).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                frame = recv_opt(&mut driver.inbox) => {
                    match frame {
                        Some(frame) => {
                            if !driver.handle_frame(frame).await {
                                break;
                            }
                        }
                        None => {
                            // Our registration was replaced; the inbox is dead
                            driver.inbox = None;
                        }
                    }
                }
            }
        }

        driver.teardown().await;
        Ok(())
    }
}

/// Per-run transport state
struct Driver {
    hub: MemoryHub,
    event_sender: EventSender,
    local: Option<ChannelAddress>,
    inbox: Option<mpsc::Receiver<HubFrame>>,
    linked: Option<ChannelAddress>,
}

impl Driver {
    /// Apply one effect. Returns `false` when the session side is gone and
    /// the task should stop.
    async fn handle_effect(&mut self, effect: Effect) -> bool {
        match effect {
            Effect::OpenEndpoint { address } => {
                debug!(%address, "opening in-memory endpoint");
                self.inbox = Some(self.hub.register(address.clone()));
                self.local = Some(address);
                self.emit(Event::EndpointOpened).await
            }
            Effect::Connect { address } => {
                if self.linked.as_ref() == Some(&address) {
                    // Already linked; a retry racing the connection is harmless
                    return true;
                }
                let Some(local) = self.local.clone() else {
                    return self
                        .emit(Event::ConnectFailed {
                            reason: "endpoint not open".to_string(),
                        })
                        .await;
                };
                if self.hub.deliver(&address, HubFrame::LinkUp { from: local }).await {
                    self.linked = Some(address);
                    self.emit(Event::ChannelConnected {
                        direction: LinkDirection::Outbound,
                    })
                    .await
                } else {
                    self.emit(Event::ConnectFailed {
                        reason: "peer-unavailable".to_string(),
                    })
                    .await
                }
            }
            Effect::SendFrame { bytes } => {
                let Some(linked) = self.linked.clone() else {
                    warn!("frame dropped, no data channel");
                    return true;
                };
                if self.hub.deliver(&linked, HubFrame::Data { bytes }).await {
                    true
                } else {
                    self.linked = None;
                    self.emit(Event::ChannelClosed {
                        reason: "peer went away".to_string(),
                    })
                    .await
                }
            }
            Effect::OfferCall { address, offer } => {
                if self.hub.deliver(&address, HubFrame::CallOffer { offer }).await {
                    true
                } else {
                    self.emit(Event::CallEnded {
                        reason: "peer-unavailable".to_string(),
                    })
                    .await
                }
            }
            Effect::AnswerCall { offer, local_media } => {
                debug!(media = local_media.as_str(), "answering call");
                if self.hub.deliver(&offer.from, HubFrame::CallAnswer).await {
                    true
                } else {
                    self.emit(Event::CallEnded {
                        reason: "caller went away".to_string(),
                    })
                    .await
                }
            }
            Effect::HangUp { reason } => {
                if let Some(linked) = self.linked.clone() {
                    self.hub
                        .deliver(&linked, HubFrame::CallHangUp { reason })
                        .await;
                }
                true
            }
            Effect::CloseEndpoint => {
                self.teardown().await;
                true
            }
        }
    }

    /// Apply one inbound hub frame
    async fn handle_frame(&mut self, frame: HubFrame) -> bool {
        match frame {
            HubFrame::LinkUp { from } => {
                if let Some(previous) = self.linked.replace(from) {
                    // Last connection wins
                    debug!(%previous, "inbound link replaced the existing one");
                }
                self.emit(Event::ChannelConnected {
                    direction: LinkDirection::Inbound,
                })
                .await
            }
            HubFrame::LinkDown { from } => {
                if self.linked.as_ref() == Some(&from) {
                    self.linked = None;
                    self.emit(Event::ChannelClosed {
                        reason: "peer closed".to_string(),
                    })
                    .await
                } else {
                    true
                }
            }
            HubFrame::Data { bytes } => self.emit(Event::FrameReceived { bytes }).await,
            HubFrame::CallOffer { offer } => self.emit(Event::CallOffered { offer }).await,
            HubFrame::CallAnswer => self.emit(Event::CallAnswered).await,
            HubFrame::CallHangUp { reason } => self.emit(Event::CallEnded { reason }).await,
        }
    }

    /// Deregister and notify the linked peer, if any
    async fn teardown(&mut self) {
        if let Some(local) = self.local.take() {
            self.hub.deregister(&local);
            if let Some(linked) = self.linked.take() {
                self.hub
                    .deliver(&linked, HubFrame::LinkDown { from: local })
                    .await;
            }
        }
        self.inbox = None;
    }

    /// Forward an event to the session. Returns `false` when the session
    /// side has shut down.
    async fn emit(&self, event: Event) -> bool {
        self.event_sender.send(event).await.is_ok()
    }
}

/// Receive from an optional inbox, pending forever when none is open
async fn recv_opt(inbox: &mut Option<mpsc::Receiver<HubFrame>>) -> Option<HubFrame> {
    match inbox {
        Some(receiver) => receiver.recv().await,
        None => futures::future::pending().await,
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pairlink_core::{create_effect_channel, create_event_channel, ChannelConfig};

    struct Harness {
        effects: pairlink_core::EffectSender,
        events: pairlink_core::EventReceiver,
    }

    fn spawn_transport(hub: &MemoryHub) -> Harness {
        let config = ChannelConfig::default();
        let (event_tx, event_rx) = create_event_channel(&config);
        let (effect_tx, effect_rx) = create_effect_channel(&config);
        let mut transport = MemoryTransport::new(hub.clone());
        transport.attach_channels(event_tx, effect_rx);
        tokio::spawn(async move { transport.run().await });
        Harness {
            effects: effect_tx,
            events: event_rx,
        }
    }

    async fn open(harness: &mut Harness, address: &str) {
        harness
            .effects
            .send(Effect::OpenEndpoint {
                address: ChannelAddress::new(address),
            })
            .await
            .unwrap();
        assert!(matches!(
            harness.events.recv().await.unwrap(),
            Event::EndpointOpened
        ));
    }

    #[tokio::test]
    async fn test_connect_to_absent_peer_fails() {
        let hub = MemoryHub::new();
        let mut a = spawn_transport(&hub);
        open(&mut a, "addr-a").await;

        a.effects
            .send(Effect::Connect {
                address: ChannelAddress::new("addr-b"),
            })
            .await
            .unwrap();
        match a.events.recv().await.unwrap() {
            Event::ConnectFailed { reason } => assert_eq!(reason, "peer-unavailable"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connect_links_both_sides_and_carries_data() {
        let hub = MemoryHub::new();
        let mut a = spawn_transport(&hub);
        let mut b = spawn_transport(&hub);
        open(&mut a, "addr-a").await;
        open(&mut b, "addr-b").await;

        a.effects
            .send(Effect::Connect {
                address: ChannelAddress::new("addr-b"),
            })
            .await
            .unwrap();

        assert!(matches!(
            a.events.recv().await.unwrap(),
            Event::ChannelConnected { direction: LinkDirection::Outbound }
        ));
        assert!(matches!(
            b.events.recv().await.unwrap(),
            Event::ChannelConnected { direction: LinkDirection::Inbound }
        ));

        a.effects
            .send(Effect::SendFrame {
                bytes: b"ping".to_vec(),
            })
            .await
            .unwrap();
        match b.events.recv().await.unwrap() {
            Event::FrameReceived { bytes } => assert_eq!(bytes, b"ping"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_endpoint_notifies_linked_peer() {
        let hub = MemoryHub::new();
        let mut a = spawn_transport(&hub);
        let mut b = spawn_transport(&hub);
        open(&mut a, "addr-a").await;
        open(&mut b, "addr-b").await;

        a.effects
            .send(Effect::Connect {
                address: ChannelAddress::new("addr-b"),
            })
            .await
            .unwrap();
        a.events.recv().await.unwrap();
        b.events.recv().await.unwrap();

        a.effects.send(Effect::CloseEndpoint).await.unwrap();
        assert!(matches!(
            b.events.recv().await.unwrap(),
            Event::ChannelClosed { .. }
        ));
        // addr-a can no longer be dialed
        b.effects
            .send(Effect::Connect {
                address: ChannelAddress::new("addr-a"),
            })
            .await
            .unwrap();
        assert!(matches!(
            b.events.recv().await.unwrap(),
            Event::ConnectFailed { .. }
        ));
    }

    #[tokio::test]
    async fn test_redial_of_linked_address_is_noop() {
        let hub = MemoryHub::new();
        let mut a = spawn_transport(&hub);
        let mut b = spawn_transport(&hub);
        open(&mut a, "addr-a").await;
        open(&mut b, "addr-b").await;

        for _ in 0..2 {
            a.effects
                .send(Effect::Connect {
                    address: ChannelAddress::new("addr-b"),
                })
                .await
                .unwrap();
        }
        a.events.recv().await.unwrap();
        b.events.recv().await.unwrap();

        // a second ChannelConnected would be waiting here if the redial
        // re-linked; a data frame arrives first instead
        a.effects
            .send(Effect::SendFrame {
                bytes: b"only".to_vec(),
            })
            .await
            .unwrap();
        assert!(matches!(
            b.events.recv().await.unwrap(),
            Event::FrameReceived { .. }
        ));
    }

    #[tokio::test]
    async fn test_newest_inbound_link_wins() {
        let hub = MemoryHub::new();
        let mut a = spawn_transport(&hub);
        let mut b = spawn_transport(&hub);
        let mut c = spawn_transport(&hub);
        open(&mut a, "addr-a").await;
        open(&mut b, "addr-b").await;
        open(&mut c, "addr-c").await;

        b.effects
            .send(Effect::Connect {
                address: ChannelAddress::new("addr-a"),
            })
            .await
            .unwrap();
        assert!(matches!(
            b.events.recv().await.unwrap(),
            Event::ChannelConnected { direction: LinkDirection::Outbound }
        ));
        assert!(matches!(
            a.events.recv().await.unwrap(),
            Event::ChannelConnected { direction: LinkDirection::Inbound }
        ));

        // c dials the already-linked a, superseding b's link
        c.effects
            .send(Effect::Connect {
                address: ChannelAddress::new("addr-a"),
            })
            .await
            .unwrap();
        c.events.recv().await.unwrap();
        assert!(matches!(
            a.events.recv().await.unwrap(),
            Event::ChannelConnected { direction: LinkDirection::Inbound }
        ));

        // a's frames now route to c, and b sees nothing further
        a.effects
            .send(Effect::SendFrame {
                bytes: b"to-newest".to_vec(),
            })
            .await
            .unwrap();
        match c.events.recv().await.unwrap() {
            Event::FrameReceived { bytes } => assert_eq!(bytes, b"to-newest"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(b.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_call_offer_and_answer_roundtrip() {
        let hub = MemoryHub::new();
        let mut a = spawn_transport(&hub);
        let mut b = spawn_transport(&hub);
        open(&mut a, "addr-a").await;
        open(&mut b, "addr-b").await;

        let offer = CallOffer {
            id: "offer-1".to_string(),
            from: ChannelAddress::new("addr-a"),
        };
        a.effects
            .send(Effect::OfferCall {
                address: ChannelAddress::new("addr-b"),
                offer: offer.clone(),
            })
            .await
            .unwrap();
        match b.events.recv().await.unwrap() {
            Event::CallOffered { offer: received } => assert_eq!(received, offer),
            other => panic!("unexpected event: {other:?}"),
        }

        b.effects
            .send(Effect::AnswerCall {
                offer,
                local_media: pairlink_core::MediaHandle::new("cam"),
            })
            .await
            .unwrap();
        assert!(matches!(
            a.events.recv().await.unwrap(),
            Event::CallAnswered
        ));
    }
}
