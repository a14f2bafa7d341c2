// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! GuardLink Desktop Application

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use guardlink_desktop::alarm::{AlarmActuator, AlarmDispatcher, CommandActuator, LogActuator};
use guardlink_desktop::config::Config;
use guardlink_desktop::events::EventProcessor;
use guardlink_desktop::link::{BluezTransport, LinkContext, ReconnectSupervisor};
use guardlink_desktop::state::AppState;
use guardlink_desktop::storage::DeviceStore;

#[derive(Parser)]
#[command(
    name = "guardlink",
    version,
    about = "Linux desktop companion for the GuardLink wearable panic button"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the background service for the previously selected accessory.
    Run,
    /// Select an accessory and keep its link alive in the foreground.
    Connect {
        /// Hardware address of the paired accessory, e.g. AA:BB:CC:DD:EE:FF.
        address: String,
        /// Display name to remember for the accessory.
        #[arg(long)]
        name: Option<String>,
    },
    /// List paired Bluetooth devices.
    Devices,
    /// Show the persisted link status.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guardlink_desktop=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    info!(
        "Starting GuardLink Desktop v{}...",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded");

    let store = Arc::new(DeviceStore::open(&config.data_dir)?);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_service(&config, store).await,
        Command::Connect { address, name } => {
            store.set_last_device(&address, name.as_deref())?;
            run_service(&config, store).await
        }
        Command::Devices => list_devices(&config).await,
        Command::Status => show_status(&store),
    }
}

/// The shared core behind both link-owner call sites: `run` for the
/// background service, `connect` for the foreground flow.
async fn run_service(config: &Config, store: Arc<DeviceStore>) -> Result<()> {
    if store.last_device_address().is_none() {
        info!("no accessory selected yet; run `guardlink connect <ADDRESS>` to pick one");
    }

    let mut actuators: Vec<Box<dyn AlarmActuator>> = vec![Box::new(LogActuator)];
    if let Some(command) = &config.alarm.command {
        actuators.push(Box::new(CommandActuator::new(command)));
    }
    let alarm = AlarmDispatcher::spawn(actuators, config.alarm.cooldown());

    let transport = Arc::new(BluezTransport::new(config.bluetooth.rfcomm_channel).await?);

    let (event_tx, event_rx) = tokio::sync::mpsc::channel(32);
    let state = AppState::new();
    tokio::spawn(EventProcessor::new(state, store.clone()).run(event_rx));

    let ctx = Arc::new(LinkContext {
        transport,
        store,
        alarm,
        events: event_tx,
        link: config.link.clone(),
    });

    let supervisor = Arc::new(ReconnectSupervisor::new(ctx));
    let run = tokio::spawn({
        let supervisor = supervisor.clone();
        async move { supervisor.run().await }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    supervisor.stop();
    if let Err(err) = run.await {
        warn!("supervisor task ended abnormally: {err}");
    }

    info!("GuardLink Desktop stopped");
    Ok(())
}

async fn list_devices(config: &Config) -> Result<()> {
    let transport = BluezTransport::new(config.bluetooth.rfcomm_channel).await?;
    let devices = transport.paired_devices().await?;

    if devices.is_empty() {
        println!("No paired devices. Pair the accessory with bluetoothctl first.");
        return Ok(());
    }
    for device in devices {
        println!("{}  {}", device.address, device.name);
    }
    Ok(())
}

fn show_status(store: &DeviceStore) -> Result<()> {
    let record = store.record();
    match record.last_device_address {
        Some(address) => {
            let name = record
                .last_device_name
                .unwrap_or_else(|| "unknown".to_string());
            println!("Accessory: {name} ({address})");
            println!("Connected: {}", if record.connected { "yes" } else { "no" });
            if let Some(at) = record.last_connected_at {
                println!("Last connected: {}", at.format("%Y-%m-%d %H:%M:%S"));
            }
        }
        None => println!("No accessory selected."),
    }
    Ok(())
}
