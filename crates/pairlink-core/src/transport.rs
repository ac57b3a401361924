//! Transport task abstraction
//!
//! A transport owns the actual peer connection machinery. The session task
//! never touches sockets; it exchanges [`Effect`]s and [`Event`]s with a
//! [`TransportTask`] running in its own tokio task.
//!
//! [`Effect`]: crate::channel::Effect
//! [`Event`]: crate::channel::Event

use async_trait::async_trait;

use crate::channel::{EffectReceiver, EventSender};
use crate::error::TransportError;

/// A long-running task that executes connection effects and reports
/// connection events.
///
/// The runtime calls [`attach_channels`](TransportTask::attach_channels)
/// once before spawning [`run`](TransportTask::run). `run` drives the
/// transport until its effect channel closes or the endpoint fails
/// terminally.
#[async_trait]
pub trait TransportTask: Send {
    /// Wire up the channels this transport communicates over
    fn attach_channels(&mut self, event_sender: EventSender, effect_receiver: EffectReceiver);

    /// Drive the transport until shutdown
    async fn run(&mut self) -> Result<(), TransportError>;
}
