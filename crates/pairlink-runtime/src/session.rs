//! Session task
//!
//! The single owner of mutable session state. One `tokio::select!` loop
//! receives view commands, transport events, and timer deadlines, and applies
//! them strictly in arrival order; nothing else touches the store, the link
//! manager, or the call tracker.
//!
//! App events are published with `try_send` and dropped when no view is
//! keeping up; store writes are authoritative and their failure is fatal.

use std::sync::Arc;

use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use pairlink_core::{
    derive_address, AppEvent, AppEventSender, Command, CommandReceiver, Effect, EffectSender,
    Event, EventReceiver, GeoProvider, Identity, LocationRecord, Message, PairStore,
    PairlinkConfig, Result, Roster, SessionSnapshot, TimeSource, WireMessage,
};

use crate::call::CallTracker;
use crate::link::LinkManager;
use crate::sync;

// ----------------------------------------------------------------------------
// Active Session
// ----------------------------------------------------------------------------

/// State that exists only between login and logout
struct ActiveSession {
    identity: Identity,
    link: LinkManager,
    calls: CallTracker,
    /// Per-session sequence for message id uniqueness within a millisecond
    message_seq: u64,
    /// Logout fires when this passes without a command
    idle_deadline: Instant,
}

// ----------------------------------------------------------------------------
// Session Task
// ----------------------------------------------------------------------------

/// The session engine. Construct with the channel endpoints, then drive with
/// [`run`](SessionTask::run) in its own task.
pub struct SessionTask {
    config: PairlinkConfig,
    roster: Roster,
    store: PairStore,
    geo: Arc<dyn GeoProvider>,
    time: Arc<dyn TimeSource + Send + Sync>,
    command_receiver: CommandReceiver,
    event_receiver: EventReceiver,
    effect_sender: EffectSender,
    app_event_sender: AppEventSender,
    session: Option<ActiveSession>,
}

impl SessionTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: PairlinkConfig,
        roster: Roster,
        store: PairStore,
        geo: Arc<dyn GeoProvider>,
        time: Arc<dyn TimeSource + Send + Sync>,
        command_receiver: CommandReceiver,
        event_receiver: EventReceiver,
        effect_sender: EffectSender,
        app_event_sender: AppEventSender,
    ) -> Self {
        Self {
            config,
            roster,
            store,
            geo,
            time,
            command_receiver,
            event_receiver,
            effect_sender,
            app_event_sender,
            session: None,
        }
    }

    /// Drive the session until `Command::Shutdown` or channel closure
    pub async fn run(mut self) -> Result<()> {
        info!("session task started");
        loop {
            let retry_at = self.session.as_ref().and_then(|s| s.link.retry_deadline());
            let idle_at = self.session.as_ref().map(|s| s.idle_deadline);

            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        None | Some(Command::Shutdown) => break,
                        Some(command) => self.handle_command(command).await?,
                    }
                }
                event = self.event_receiver.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await?,
                        None => {
                            warn!("transport event channel closed");
                            break;
                        }
                    }
                }
                _ = deadline(retry_at) => self.on_retry().await,
                _ = deadline(idle_at) => self.end_session("idle timeout").await,
            }
        }

        self.end_session("shutdown").await;
        info!("session task stopped");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    async fn handle_command(&mut self, command: Command) -> Result<()> {
        self.touch();

        match command {
            Command::Login { email } => self.login(&email).await,
            Command::Logout => {
                self.end_session("logout").await;
                Ok(())
            }
            Command::SendMessage { text } => self.send_message(text).await,
            Command::ClearHistory => self.clear_history().await,
            Command::ShareLocation => self.share_location().await,
            Command::StopSharingLocation => {
                let record = LocationRecord::stopped(self.time.now());
                self.publish_location(record).await
            }
            Command::VaultAdd { item } => {
                self.store.vault_add(item)?;
                self.publish(AppEvent::VaultChanged {
                    items: self.store.vault().to_vec(),
                });
                Ok(())
            }
            Command::VaultRemove { id } => {
                if self.store.vault_remove(&id)? {
                    self.publish(AppEvent::VaultChanged {
                        items: self.store.vault().to_vec(),
                    });
                }
                Ok(())
            }
            Command::PlaceCall => self.place_call().await,
            Command::AcceptCall { local_media } => {
                let now = self.time.now();
                let outcome = self
                    .session
                    .as_mut()
                    .map(|s| s.calls.accept(local_media, now));
                match outcome {
                    Some(Ok(effect)) => {
                        self.execute(vec![effect]).await;
                        self.publish_call_state();
                    }
                    Some(Err(error)) => self.publish(AppEvent::CallFailed {
                        reason: error.to_string(),
                    }),
                    None => {}
                }
                Ok(())
            }
            Command::RejectCall => {
                let outcome = self.session.as_mut().map(|s| s.calls.reject());
                match outcome {
                    Some(Ok(effect)) => {
                        self.execute(vec![effect]).await;
                        self.publish_call_state();
                    }
                    Some(Err(error)) => self.publish(AppEvent::CallFailed {
                        reason: error.to_string(),
                    }),
                    None => {}
                }
                Ok(())
            }
            Command::Activity => Ok(()),
            Command::QuerySnapshot => {
                let snapshot = self.snapshot();
                self.publish(AppEvent::Snapshot(snapshot));
                Ok(())
            }
            Command::Shutdown => Ok(()),
        }
    }

    async fn login(&mut self, email: &str) -> Result<()> {
        if self.session.is_some() {
            debug!("login ignored, session already active");
            return Ok(());
        }
        let Some(identity) = self.roster.authenticate(email).cloned() else {
            info!("login rejected");
            self.publish(AppEvent::LoginRejected);
            return Ok(());
        };

        let counterpart = self.roster.counterpart(identity.id()).clone();
        let local_address = derive_address(&identity);
        let remote_address = derive_address(&counterpart);

        info!(identity = %identity.id(), "logged in");

        let mut link = LinkManager::new(local_address, remote_address, self.config.link.retry_interval);
        let effects = link.start();

        self.session = Some(ActiveSession {
            identity: identity.clone(),
            link,
            calls: CallTracker::new(),
            message_seq: 0,
            idle_deadline: Instant::now() + self.config.session.idle_timeout,
        });

        self.execute(effects).await;
        self.publish(AppEvent::LoggedIn { identity });
        let snapshot = self.snapshot();
        self.publish(AppEvent::Snapshot(snapshot));
        Ok(())
    }

    async fn send_message(&mut self, text: String) -> Result<()> {
        let now = self.time.now();
        let Some(session) = self.session.as_mut() else {
            debug!("send ignored, not logged in");
            return Ok(());
        };
        let message = Message::new(session.identity.id().clone(), text, now, session.message_seq);
        session.message_seq += 1;
        let wire = WireMessage::message(session.identity.id().clone(), message.clone());

        self.store.append_message(message.clone())?;
        self.publish(AppEvent::MessageAppended { message });
        self.transmit(wire).await;
        Ok(())
    }

    async fn clear_history(&mut self) -> Result<()> {
        let Some(identity_id) = self.session.as_ref().map(|s| s.identity.id().clone()) else {
            return Ok(());
        };
        self.store.clear_messages()?;
        self.publish(AppEvent::HistoryCleared);
        self.transmit(WireMessage::clear_history(identity_id)).await;
        Ok(())
    }

    async fn share_location(&mut self) -> Result<()> {
        if self.session.is_none() {
            return Ok(());
        }
        match self.geo.current_position().await {
            Ok(position) => {
                let record =
                    LocationRecord::active(position.latitude, position.longitude, self.time.now());
                self.publish_location(record).await
            }
            Err(error) => {
                warn!(%error, "position fix failed");
                self.publish(AppEvent::LocationFailed {
                    reason: error.to_string(),
                });
                Ok(())
            }
        }
    }

    async fn publish_location(&mut self, record: LocationRecord) -> Result<()> {
        let Some(identity_id) = self.session.as_ref().map(|s| s.identity.id().clone()) else {
            return Ok(());
        };
        self.store
            .upsert_location(identity_id.clone(), record.clone())?;
        self.publish(AppEvent::LocationUpdated {
            id: identity_id.clone(),
            record: record.clone(),
        });
        self.transmit(WireMessage::location(identity_id, record)).await;
        Ok(())
    }

    async fn place_call(&mut self) -> Result<()> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        let local = derive_address(&session.identity);
        let remote = derive_address(self.roster.counterpart(session.identity.id()));
        match session.calls.place(&local, &remote) {
            Ok(effect) => {
                self.execute(vec![effect]).await;
                self.publish_call_state();
            }
            Err(error) => self.publish(AppEvent::CallFailed {
                reason: error.to_string(),
            }),
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Transport Events
    // ------------------------------------------------------------------------

    async fn handle_event(&mut self, event: Event) -> Result<()> {
        if self.session.is_none() {
            debug!(?event, "event dropped, no active session");
            return Ok(());
        }

        let mut app_events = Vec::new();
        let mut effects = Vec::new();

        match event {
            Event::FrameReceived { bytes } => {
                app_events = sync::apply_inbound(&mut self.store, &bytes)?;
            }
            Event::CallOffered { offer } => {
                if let Some(session) = self.session.as_mut() {
                    if let Some(call) = session.calls.on_offer(offer) {
                        let offer = call.offer.clone();
                        app_events.push(AppEvent::CallOffered { offer });
                    }
                }
            }
            Event::CallAnswered => {
                let now = self.time.now();
                if let Some(session) = self.session.as_mut() {
                    if session.calls.on_answered(now) {
                        app_events.push(AppEvent::CallStateChanged {
                            call: session.calls.pending().cloned(),
                        });
                    }
                }
            }
            Event::CallEnded { reason } => {
                debug!(reason = %reason, "call ended");
                if let Some(session) = self.session.as_mut() {
                    if session.calls.on_ended() {
                        app_events.push(AppEvent::CallStateChanged { call: None });
                    }
                }
            }
            link_event => {
                if let Some(session) = self.session.as_mut() {
                    let was_online = session.link.is_connected();
                    effects = session.link.handle_event(&link_event, Instant::now());
                    let online = session.link.is_connected();
                    if online != was_online {
                        app_events.push(AppEvent::ConnectivityChanged { online });
                    }
                }
            }
        }

        self.execute(effects).await;
        for app_event in app_events {
            self.publish(app_event);
        }
        Ok(())
    }

    async fn on_retry(&mut self) {
        let effects = match self.session.as_mut() {
            Some(session) => session.link.on_retry(Instant::now()),
            None => Vec::new(),
        };
        self.execute(effects).await;
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    async fn end_session(&mut self, reason: &str) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        info!(reason, identity = %session.identity.id(), "session ended");
        let was_online = session.link.is_connected();
        let effects = session.link.stop();
        session.calls.clear();
        self.execute(effects).await;
        if was_online {
            self.publish(AppEvent::ConnectivityChanged { online: false });
        }
        self.publish(AppEvent::SessionEnded {
            reason: reason.to_string(),
        });
    }

    /// Every command counts as activity and pushes back the idle deadline
    fn touch(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.idle_deadline = Instant::now() + self.config.session.idle_timeout;
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            identity: self.session.as_ref().map(|s| s.identity.clone()),
            online: self
                .session
                .as_ref()
                .is_some_and(|s| s.link.is_connected()),
            messages: self.store.messages().to_vec(),
            locations: self.store.locations().clone(),
            vault: self.store.vault().to_vec(),
            pending_call: self
                .session
                .as_ref()
                .and_then(|s| s.calls.pending().cloned()),
        }
    }

    // ------------------------------------------------------------------------
    // Output Helpers
    // ------------------------------------------------------------------------

    /// Encode and send a frame if the data channel is up; silently skipped
    /// otherwise. Delivery is best-effort by design of the wire protocol.
    async fn transmit(&mut self, wire: WireMessage) {
        let connected = self
            .session
            .as_ref()
            .is_some_and(|s| s.link.is_connected());
        if !connected {
            debug!(kind = wire.kind(), "offline, frame not sent");
            return;
        }
        match pairlink_core::encode_frame(&wire) {
            Ok(bytes) => self.execute(vec![Effect::SendFrame { bytes }]).await,
            Err(error) => warn!(%error, "frame encoding failed"),
        }
    }

    async fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            if self.effect_sender.send(effect).await.is_err() {
                warn!("transport effect channel closed");
                return;
            }
        }
    }

    fn publish_call_state(&mut self) {
        let call = self
            .session
            .as_ref()
            .and_then(|s| s.calls.pending().cloned());
        self.publish(AppEvent::CallStateChanged { call });
    }

    /// Best-effort publication to the view layer
    fn publish(&self, event: AppEvent) {
        if self.app_event_sender.try_send(event).is_err() {
            debug!("app event dropped, no listener keeping up");
        }
    }
}

/// Sleep until an optional deadline, or forever when unarmed. Keeps
/// `select!` arms free of unwraps.
async fn deadline(at: Option<Instant>) {
    match at {
        Some(instant) => sleep_until(instant).await,
        None => futures::future::pending().await,
    }
}
