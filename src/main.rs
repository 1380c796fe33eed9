//! MidiMix-Seq - standalone sequencer host
//!
//! Binds a MIDI Mix style controller, runs the sequencer against an internal
//! clock and offers the device menu on the terminal.

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use midimix_seq::cli::{self, MenuContext};
use midimix_seq::config::{AppConfig, MidiConfig};
use midimix_seq::host::SoftwareHost;
use midimix_seq::sequencer::MidiMixSeq;
use midimix_seq::transport::open_driver;

/// MidiMix-Seq - three-lane gate/CV sequencer for a MIDI Mix style controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Run without the interactive menu (stop with Ctrl+C)
    #[arg(long)]
    no_menu: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    if args.list_ports {
        cli::list_ports_formatted();
        return Ok(());
    }

    info!("Starting MidiMix-Seq...");
    info!("Configuration file: {}", args.config);

    let config = AppConfig::load_or_default(&args.config).await?;
    config.validate().context("Invalid configuration")?;

    let mut module = MidiMixSeq::new(&config.seq_settings()).context("Failed to create sequencer")?;
    bind_configured_ports(&mut module, &config.midi)?;
    let module = Arc::new(Mutex::new(module));

    let host = SoftwareHost::new(Arc::clone(&module), &config.host);
    let resets = host.reset_requests();

    let (host_stop_tx, host_stop_rx) = oneshot::channel::<()>();
    let host_task = tokio::spawn(host.run(async move {
        let _ = host_stop_rx.await;
    }));

    // The prompt blocks its thread; a detached thread does not hold up exit
    let (menu_done_tx, menu_done_rx) = oneshot::channel::<Result<()>>();
    if !args.no_menu {
        let ctx = MenuContext {
            module: Arc::clone(&module),
            resets,
        };
        std::thread::Builder::new()
            .name("menu".to_string())
            .spawn(move || {
                let _ = menu_done_tx.send(cli::run_menu(ctx));
            })
            .context("Failed to start menu thread")?;
    } else {
        drop(menu_done_tx);
    }

    tokio::select! {
        _ = shutdown_signal() => {}
        Ok(result) = menu_done_rx => {
            if let Err(e) = result {
                warn!("Menu stopped: {:#}", e);
            }
            info!("Menu closed");
        }
    }

    let _ = host_stop_tx.send(());
    host_task.await.context("Host task panicked")??;

    {
        let mut module = module.lock();
        module.unsubscribe_input();
        module.unsubscribe_output();
    }

    info!("MidiMix-Seq shutdown complete");
    Ok(())
}

/// Select the configured driver and bind the configured ports by name
fn bind_configured_ports(module: &mut MidiMixSeq, midi: &MidiConfig) -> Result<()> {
    let driver = open_driver(&midi.driver)?;
    module.select_driver(Arc::clone(&driver));

    if let Some(pattern) = &midi.input_port {
        match driver.find_input(pattern) {
            Some(device) => match module.subscribe_input(device.id) {
                Ok(()) => info!("✅ MIDI input: {}", device.name),
                Err(e) => warn!("Failed to open MIDI input '{}': {}", device.name, e),
            },
            None => warn!("No MIDI input matching '{}'", pattern),
        }
    }

    if let Some(pattern) = &midi.output_port {
        match driver.find_output(pattern) {
            Some(device) => match module.subscribe_output(device.id) {
                Ok(()) => info!("✅ MIDI output: {}", device.name),
                Err(e) => warn!("Failed to open MIDI output '{}': {}", device.name, e),
            },
            None => warn!("No MIDI output matching '{}'", pattern),
        }
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
