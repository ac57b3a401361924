//! Peer link lifecycle manager
//!
//! Pure state machine for the data channel between the two identities. The
//! session task feeds it transport events and retry ticks; it returns the
//! effects to execute. It holds no channels and does no I/O, so every
//! transition is unit-testable with injected instants.
//!
//! Retry is a fixed cadence, not backoff: while the endpoint is open and no
//! data channel is up, a `Connect` effect fires every `retry_interval`.
//! Dialing an already-linked address is a transport-level no-op, so a retry
//! racing an inbound connection is harmless.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use pairlink_core::{ChannelAddress, Effect, Event, LinkDirection};

// ----------------------------------------------------------------------------
// Link State
// ----------------------------------------------------------------------------

/// Lifecycle of the peer link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Not started
    Idle,
    /// `OpenEndpoint` issued, waiting for the endpoint to come up
    Opening,
    /// Endpoint open, no data channel; retry schedule active
    Ready,
    /// Data channel to the counterpart is up
    Connected,
    /// Torn down; all further events are ignored
    Closed,
}

// ----------------------------------------------------------------------------
// Link Manager
// ----------------------------------------------------------------------------

/// Drives one peer link from endpoint open through connect retries to
/// teardown.
#[derive(Debug)]
pub struct LinkManager {
    local_address: ChannelAddress,
    remote_address: ChannelAddress,
    retry_interval: Duration,
    state: LinkState,
    /// Armed while in `Ready`; cleared on connect and on teardown
    next_retry_at: Option<Instant>,
}

impl LinkManager {
    pub fn new(
        local_address: ChannelAddress,
        remote_address: ChannelAddress,
        retry_interval: Duration,
    ) -> Self {
        Self {
            local_address,
            remote_address,
            retry_interval,
            state: LinkState::Idle,
            next_retry_at: None,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    /// Deadline of the next scheduled connect attempt, if one is armed
    pub fn retry_deadline(&self) -> Option<Instant> {
        self.next_retry_at
    }

    /// Begin the link: open the local endpoint
    pub fn start(&mut self) -> Vec<Effect> {
        if self.state != LinkState::Idle {
            return Vec::new();
        }
        self.state = LinkState::Opening;
        info!(address = %self.local_address, "opening endpoint");
        vec![Effect::OpenEndpoint {
            address: self.local_address.clone(),
        }]
    }

    /// Apply a transport event, returning follow-up effects
    pub fn handle_event(&mut self, event: &Event, now: Instant) -> Vec<Effect> {
        if self.state == LinkState::Closed {
            // Stale events from a torn-down transport carry no meaning
            return Vec::new();
        }

        match event {
            Event::EndpointOpened => {
                if self.state != LinkState::Opening {
                    return Vec::new();
                }
                self.state = LinkState::Ready;
                debug!(remote = %self.remote_address, "endpoint open, dialing peer");
                self.arm_retry(now);
                vec![self.connect_effect()]
            }
            Event::EndpointError { reason } => {
                warn!(reason = %reason, "endpoint failed");
                self.state = LinkState::Closed;
                self.next_retry_at = None;
                Vec::new()
            }
            Event::ChannelConnected { direction } => {
                if self.state == LinkState::Connected {
                    return Vec::new();
                }
                match direction {
                    LinkDirection::Inbound => info!("peer connected to us"),
                    LinkDirection::Outbound => info!("connected to peer"),
                }
                self.state = LinkState::Connected;
                self.next_retry_at = None;
                Vec::new()
            }
            Event::ChannelClosed { reason } => {
                debug!(reason = %reason, "data channel closed, resuming retries");
                self.state = LinkState::Ready;
                // The standing retry cadence drives reconnection; no
                // immediate dial on the close event itself
                self.arm_retry(now);
                Vec::new()
            }
            Event::ConnectFailed { reason } => {
                // Expected while the counterpart is offline; the armed retry
                // covers the next attempt
                debug!(reason = %reason, "connect attempt failed");
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// The retry deadline fired: dial again and reschedule
    pub fn on_retry(&mut self, now: Instant) -> Vec<Effect> {
        if self.state != LinkState::Ready {
            self.next_retry_at = None;
            return Vec::new();
        }
        debug!(remote = %self.remote_address, "retrying connect");
        self.arm_retry(now);
        vec![self.connect_effect()]
    }

    /// Tear the link down. Idempotent.
    pub fn stop(&mut self) -> Vec<Effect> {
        if matches!(self.state, LinkState::Idle | LinkState::Closed) {
            self.state = LinkState::Closed;
            self.next_retry_at = None;
            return Vec::new();
        }
        info!("closing link");
        self.state = LinkState::Closed;
        self.next_retry_at = None;
        vec![Effect::CloseEndpoint]
    }

    fn arm_retry(&mut self, now: Instant) {
        self.next_retry_at = Some(now + self.retry_interval);
    }

    fn connect_effect(&self) -> Effect {
        Effect::Connect {
            address: self.remote_address.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> LinkManager {
        LinkManager::new(
            ChannelAddress::new("pairlink-v1-local"),
            ChannelAddress::new("pairlink-v1-remote"),
            Duration::from_secs(5),
        )
    }

    fn assert_connect(effects: &[Effect]) {
        assert_eq!(effects.len(), 1);
        assert!(matches!(&effects[0], Effect::Connect { address }
            if address.as_str() == "pairlink-v1-remote"));
    }

    #[test]
    fn test_start_opens_endpoint() {
        let mut link = manager();
        let effects = link.start();
        assert!(
            matches!(&effects[..], [Effect::OpenEndpoint { address }]
                if address.as_str() == "pairlink-v1-local")
        );
        assert_eq!(link.state(), LinkState::Opening);
        // second start is a no-op
        assert!(link.start().is_empty());
    }

    #[test]
    fn test_endpoint_open_dials_and_arms_retry() {
        let mut link = manager();
        link.start();
        let now = Instant::now();
        let effects = link.handle_event(&Event::EndpointOpened, now);
        assert_connect(&effects);
        assert_eq!(link.retry_deadline(), Some(now + Duration::from_secs(5)));
    }

    #[test]
    fn test_retry_cadence_until_connected() {
        let mut link = manager();
        link.start();
        let t0 = Instant::now();
        link.handle_event(&Event::EndpointOpened, t0);

        // connect fails; the armed deadline is untouched
        link.handle_event(
            &Event::ConnectFailed {
                reason: "peer-unavailable".to_string(),
            },
            t0 + Duration::from_millis(50),
        );
        assert_eq!(link.retry_deadline(), Some(t0 + Duration::from_secs(5)));

        // first retry fires at t0+5s and re-arms for t0+10s
        let t5 = t0 + Duration::from_secs(5);
        assert_connect(&link.on_retry(t5));
        assert_eq!(link.retry_deadline(), Some(t5 + Duration::from_secs(5)));

        // connection comes up; retries stop
        link.handle_event(
            &Event::ChannelConnected {
                direction: LinkDirection::Outbound,
            },
            t5 + Duration::from_millis(10),
        );
        assert_eq!(link.state(), LinkState::Connected);
        assert_eq!(link.retry_deadline(), None);
    }

    #[test]
    fn test_channel_closed_rearms_retry_without_immediate_dial() {
        let mut link = manager();
        link.start();
        let t0 = Instant::now();
        link.handle_event(&Event::EndpointOpened, t0);
        link.handle_event(
            &Event::ChannelConnected {
                direction: LinkDirection::Inbound,
            },
            t0,
        );

        // the close itself dials nothing; the re-armed interval does
        let t1 = t0 + Duration::from_secs(30);
        let effects = link.handle_event(
            &Event::ChannelClosed {
                reason: "peer went away".to_string(),
            },
            t1,
        );
        assert!(effects.is_empty());
        assert_eq!(link.state(), LinkState::Ready);
        assert_eq!(link.retry_deadline(), Some(t1 + Duration::from_secs(5)));

        assert_connect(&link.on_retry(t1 + Duration::from_secs(5)));
    }

    #[test]
    fn test_stop_is_idempotent_and_silences_events() {
        let mut link = manager();
        link.start();
        let now = Instant::now();
        link.handle_event(&Event::EndpointOpened, now);

        let effects = link.stop();
        assert!(matches!(&effects[..], [Effect::CloseEndpoint]));
        assert_eq!(link.retry_deadline(), None);
        assert!(link.stop().is_empty());

        // events arriving after teardown are dropped
        let stale = link.handle_event(
            &Event::ChannelConnected {
                direction: LinkDirection::Inbound,
            },
            now,
        );
        assert!(stale.is_empty());
        assert_eq!(link.state(), LinkState::Closed);
    }

    #[test]
    fn test_endpoint_error_closes_link() {
        let mut link = manager();
        link.start();
        link.handle_event(
            &Event::EndpointError {
                reason: "broker rejected id".to_string(),
            },
            Instant::now(),
        );
        assert_eq!(link.state(), LinkState::Closed);
        assert_eq!(link.retry_deadline(), None);
    }
}
