//! Runtime orchestration
//!
//! Wires the session task to a transport and owns both task handles. One
//! runtime is one device: its store, its roster, its pair of channel
//! endpoints toward the view layer.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info};

use pairlink_core::{
    create_app_event_channel, create_command_channel, create_effect_channel, create_event_channel,
    AppEventReceiver, AppEventSender, Command, CommandReceiver, CommandSender, GeoProvider,
    PairStore, PairlinkConfig, PairlinkError, Result, Roster, StoreBackend, SystemTimeSource,
    TimeSource, TransportTask,
};

use crate::session::SessionTask;

/// Owns and drives a PairLink session engine
pub struct PairlinkRuntime {
    config: PairlinkConfig,
    roster: Roster,
    geo: Arc<dyn GeoProvider>,
    time: Arc<dyn TimeSource + Send + Sync>,
    /// Consumed when the session task starts
    store: Option<PairStore>,
    transport: Option<Box<dyn TransportTask>>,
    command_sender: CommandSender,
    command_receiver: Option<CommandReceiver>,
    app_event_sender: AppEventSender,
    app_event_receiver: Option<AppEventReceiver>,
    handles: Vec<JoinHandle<()>>,
}

impl PairlinkRuntime {
    /// Create a runtime over a storage backend. Opening the store reads and
    /// validates every slot; a corrupt slot fails construction rather than
    /// surfacing later as silent data loss.
    pub fn new(
        config: PairlinkConfig,
        roster: Roster,
        backend: Box<dyn StoreBackend>,
        geo: Arc<dyn GeoProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let store = PairStore::open(backend)?;

        let (command_sender, command_receiver) = create_command_channel(&config.channels);
        let (app_event_sender, app_event_receiver) = create_app_event_channel(&config.channels);

        Ok(Self {
            config,
            roster,
            geo,
            time: Arc::new(SystemTimeSource),
            store: Some(store),
            transport: None,
            command_sender,
            command_receiver: Some(command_receiver),
            app_event_sender,
            app_event_receiver: Some(app_event_receiver),
            handles: Vec::new(),
        })
    }

    /// Replace the wall clock, for tests
    pub fn with_time_source(mut self, time: Arc<dyn TimeSource + Send + Sync>) -> Self {
        self.time = time;
        self
    }

    /// Install the transport this runtime speaks through. Must be called
    /// before [`start`](Self::start).
    pub fn set_transport(&mut self, transport: Box<dyn TransportTask>) {
        self.transport = Some(transport);
    }

    /// Spawn the session and transport tasks
    pub fn start(&mut self) -> Result<()> {
        let mut transport = self
            .transport
            .take()
            .ok_or_else(|| PairlinkError::config_error("no transport installed"))?;
        let store = self
            .store
            .take()
            .ok_or_else(|| PairlinkError::config_error("runtime already started"))?;
        let command_receiver = self
            .command_receiver
            .take()
            .ok_or_else(|| PairlinkError::config_error("runtime already started"))?;

        let (event_sender, event_receiver) = create_event_channel(&self.config.channels);
        let (effect_sender, effect_receiver) = create_effect_channel(&self.config.channels);

        transport.attach_channels(event_sender, effect_receiver);
        self.handles.push(tokio::spawn(async move {
            if let Err(transport_error) = transport.run().await {
                error!(%transport_error, "transport task failed");
            }
        }));

        let session = SessionTask::new(
            self.config.clone(),
            self.roster.clone(),
            store,
            Arc::clone(&self.geo),
            Arc::clone(&self.time),
            command_receiver,
            event_receiver,
            effect_sender,
            self.app_event_sender.clone(),
        );
        self.handles.push(tokio::spawn(async move {
            if let Err(session_error) = session.run().await {
                error!(%session_error, "session task failed");
            }
        }));

        info!("runtime started");
        Ok(())
    }

    /// Request shutdown and wait for both tasks to finish. The transport
    /// stops on its own once the session drops the effect channel.
    pub async fn stop(&mut self) {
        let _ = self.command_sender.send(Command::Shutdown).await;
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
        info!("runtime stopped");
    }

    /// Handle for issuing commands from the view layer
    pub fn command_sender(&self) -> CommandSender {
        self.command_sender.clone()
    }

    /// Take the app event stream. Yields `Some` exactly once.
    pub fn take_app_event_receiver(&mut self) -> Option<AppEventReceiver> {
        self.app_event_receiver.take()
    }
}

impl Drop for PairlinkRuntime {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}
