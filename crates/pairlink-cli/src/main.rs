//! PairLink CLI - demo entry point

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use pairlink_core::{
    derive_address, AppEvent, Command, FixedPosition, Identity, MediaHandle, MemoryStore,
    PairlinkConfig, PairlinkError, Result, Roster, StoreBackend,
};
use pairlink_runtime::{MemoryHub, MemoryTransport, PairlinkRuntime};

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Demo {
            email_a,
            email_b,
            data_dir,
        } => run_demo(&email_a, &email_b, data_dir.as_deref()).await,
        Commands::Address { email } => {
            let identity = identity_for(&email);
            println!("{}", derive_address(&identity));
            Ok(())
        }
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Build a roster identity from an email, using the local part as both the
/// id and the display name
fn identity_for(email: &str) -> Identity {
    let local = email.split('@').next().unwrap_or(email);
    Identity::new(local, local, email)
}

fn backend_for(data_dir: Option<&str>, id: &str) -> Result<Box<dyn StoreBackend>> {
    match data_dir {
        Some(dir) => {
            let store = pairlink_core::FileStore::open(format!("{dir}/{id}"))?;
            Ok(Box::new(store))
        }
        None => Ok(Box::new(MemoryStore::new())),
    }
}

struct Device {
    runtime: PairlinkRuntime,
    commands: pairlink_core::CommandSender,
}

/// Start one runtime on the hub and spawn a task printing its app events
fn start_device(
    label: &'static str,
    roster: &Roster,
    hub: &MemoryHub,
    backend: Box<dyn StoreBackend>,
    latitude: f64,
    longitude: f64,
) -> Result<Device> {
    let mut runtime = PairlinkRuntime::new(
        PairlinkConfig::default(),
        roster.clone(),
        backend,
        Arc::new(FixedPosition::at(latitude, longitude)),
    )?;
    runtime.set_transport(Box::new(MemoryTransport::new(hub.clone())));
    runtime.start()?;

    let commands = runtime.command_sender();
    let mut app_events = runtime
        .take_app_event_receiver()
        .ok_or_else(|| PairlinkError::channel_error("app event receiver already taken"))?;
    tokio::spawn(async move {
        while let Some(event) = app_events.recv().await {
            print_event(label, &event);
        }
    });

    Ok(Device { runtime, commands })
}

fn print_event(label: &str, event: &AppEvent) {
    match event {
        AppEvent::LoggedIn { identity } => {
            info!("[{label}] logged in as {}", identity.display_name())
        }
        AppEvent::LoginRejected => info!("[{label}] login rejected"),
        AppEvent::SessionEnded { reason } => info!("[{label}] session ended: {reason}"),
        AppEvent::ConnectivityChanged { online } => {
            info!("[{label}] peer {}", if *online { "online" } else { "offline" })
        }
        AppEvent::MessageAppended { message } => {
            info!("[{label}] <{}> {}", message.sender_id, message.text)
        }
        AppEvent::HistoryCleared => info!("[{label}] history cleared"),
        AppEvent::LocationUpdated { id, record } if record.is_active => {
            info!(
                "[{label}] {id} is at {:.4}, {:.4}",
                record.latitude, record.longitude
            )
        }
        AppEvent::LocationUpdated { id, .. } => info!("[{label}] {id} stopped sharing"),
        AppEvent::LocationFailed { reason } => info!("[{label}] location failed: {reason}"),
        AppEvent::VaultChanged { items } => info!("[{label}] vault has {} items", items.len()),
        AppEvent::CallOffered { offer } => info!("[{label}] incoming call {}", offer.id),
        AppEvent::CallStateChanged { call: Some(call) } if call.accepted_at.is_some() => {
            info!("[{label}] call in progress")
        }
        AppEvent::CallStateChanged { call: Some(_) } => info!("[{label}] call pending"),
        AppEvent::CallStateChanged { call: None } => info!("[{label}] call ended"),
        AppEvent::CallFailed { reason } => info!("[{label}] call failed: {reason}"),
        AppEvent::Snapshot(snapshot) => info!(
            "[{label}] snapshot: {} messages, {} locations, online={}",
            snapshot.messages.len(),
            snapshot.locations.len(),
            snapshot.online
        ),
    }
}

async fn run_demo(email_a: &str, email_b: &str, data_dir: Option<&str>) -> Result<()> {
    let identity_a = identity_for(email_a);
    let identity_b = identity_for(email_b);
    let roster = Roster::new(identity_a.clone(), identity_b.clone())?;
    let hub = MemoryHub::new();

    let mut device_a = start_device(
        "a",
        &roster,
        &hub,
        backend_for(data_dir, identity_a.id().as_str())?,
        51.5074,
        -0.1278,
    )?;
    let mut device_b = start_device(
        "b",
        &roster,
        &hub,
        backend_for(data_dir, identity_b.id().as_str())?,
        48.8566,
        2.3522,
    )?;

    send(&device_a, Command::Login { email: email_a.to_string() }).await?;
    send(&device_b, Command::Login { email: email_b.to_string() }).await?;
    settle().await;

    send(
        &device_a,
        Command::SendMessage {
            text: format!("hello {}", identity_b.display_name()),
        },
    )
    .await?;
    send(&device_b, Command::ShareLocation).await?;
    settle().await;

    send(&device_a, Command::PlaceCall).await?;
    settle().await;
    send(
        &device_b,
        Command::AcceptCall {
            local_media: MediaHandle::new("demo-media"),
        },
    )
    .await?;
    settle().await;
    send(&device_b, Command::RejectCall).await?;
    settle().await;

    send(&device_a, Command::QuerySnapshot).await?;
    send(&device_b, Command::QuerySnapshot).await?;
    settle().await;

    device_a.runtime.stop().await;
    device_b.runtime.stop().await;
    info!("demo finished");
    Ok(())
}

async fn send(device: &Device, command: Command) -> Result<()> {
    device
        .commands
        .send(command)
        .await
        .map_err(|_| PairlinkError::channel_error("command channel closed"))
}

/// Give the tasks a beat to exchange frames before the next step
async fn settle() {
    tokio::time::sleep(Duration::from_millis(250)).await;
}
