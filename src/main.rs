//! Omicron GW - Rust implementation
//!
//! Gateway from Omicron trackers (touch, wands, Kinect) to display wall pointers.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use omicron_gw::config::{AppConfig, ConfigWatcher};
use omicron_gw::dispatch::Dispatcher;
use omicron_gw::input_server::InputServerLink;
use omicron_gw::listener::UdpListener;
use omicron_gw::sink::{CommandSink, ConsoleSink, InputSink, SinkCommand};
use omicron_gw::{replay, sniffer};

/// How dispatched operations are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Log every operation
    Console,
    /// One JSON object per operation on stdout
    Json,
}

/// Omicron Gateway - Drive display wall pointers from Omicron trackers
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Also write daily rolling log files to this directory
    #[arg(long, env = "LOG_DIR")]
    log_dir: Option<String>,

    /// Output format for dispatched operations
    #[arg(short, long, value_enum, default_value = "console")]
    output: OutputFormat,

    /// Print decoded packets instead of dispatching them
    #[arg(long)]
    sniffer: bool,

    /// Replay a hex capture file through the dispatcher and exit
    #[arg(long, value_name = "FILE")]
    replay: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging; the guard flushes file logs on exit
    let _log_guard = init_logging(&args.log_level, args.log_dir.as_deref())?;

    info!("Starting Omicron GW v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    // Handle sniffer mode
    if args.sniffer {
        let config = load_or_default(&args.config).await?;
        sniffer::run_cli_sniffer(&config.omicron.host, config.omicron.data_port).await?;
        return Ok(());
    }

    // Handle replay mode
    if let Some(capture) = &args.replay {
        let config = load_or_default(&args.config).await?;
        return run_replay(config, capture, args.output).await;
    }

    // Load configuration with hot-reload watcher
    let (config_watcher, initial_config) = ConfigWatcher::new(args.config.clone()).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    if !initial_config.omicron.enable {
        warn!("⚠️  omicron.enable is false in {}, nothing to do", args.config);
        return Ok(());
    }

    run_app(
        (*initial_config).clone(),
        config_watcher,
        args.output,
        shutdown_signal(),
    )
    .await?;

    info!("Omicron GW shutdown complete");
    Ok(())
}

async fn run_app(
    config: AppConfig,
    mut config_watcher: ConfigWatcher,
    output: OutputFormat,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    info!("Starting main application loop...");

    let (sink, mut command_rx) = make_sink(output);
    let mut dispatcher = Dispatcher::new(config.clone(), sink)?;
    info!("Dispatcher initialized");

    let mut listener = UdpListener::bind(&config.omicron.host, config.omicron.data_port).await?;

    // Optional control link asking the input server to stream to us
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let link_task = InputServerLink::from_config(&config).map(|link| {
        info!("Input server configured at {}", link.addr());
        tokio::spawn(link.run(shutdown_rx))
    });

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Datagrams are handled one at a time, in arrival order
            received = listener.recv() => {
                match received {
                    Ok((len, from)) => {
                        debug!("📥 {} bytes from {}", len, from);
                        dispatcher.handle_packet(listener.datagram(len));
                    }
                    Err(e) => {
                        warn!("UDP receive error: {}", e);
                    }
                }
            }

            // JSON output
            Some(command) = next_command(&mut command_rx) => {
                print_json(&command);
            }

            // Handle config reload
            Some(new_config) = config_watcher.next_config() => {
                info!("📝 Configuration file changed, reloading...");

                if dispatcher.config().network_changed(&new_config) {
                    warn!("⚠️  Network settings changed; restart to apply them");
                }

                match dispatcher.update_config(new_config) {
                    Ok(()) => {
                        info!("✅ Configuration reloaded successfully");
                    }
                    Err(e) => {
                        warn!("⚠️  Failed to reload config (keeping old config): {:#}", e);
                    }
                }
            }

            // Handle shutdown signal
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    // Cleanup
    info!("Shutting down...");
    let _ = shutdown_tx.send(true);
    if let Some(task) = link_task {
        if tokio::time::timeout(Duration::from_secs(2), task).await.is_err() {
            warn!("Input server link did not stop in time");
        }
    }

    // Flush operations dispatched before shutdown
    if let Some(rx) = command_rx.as_mut() {
        while let Ok(command) = rx.try_recv() {
            print_json(&command);
        }
    }

    let stats = dispatcher.stats();
    info!(
        "📊 {} packets, {} dispatched, {} ignored",
        stats.packets, stats.dispatched, stats.ignored
    );
    Ok(())
}

async fn run_replay(config: AppConfig, capture: &str, output: OutputFormat) -> Result<()> {
    let packets = replay::load_capture(capture).await?;
    info!("Loaded {} packets from {}", packets.len(), capture);

    let (sink, mut command_rx) = make_sink(output);
    let mut dispatcher = Dispatcher::new(config, sink)?;
    let stats = replay::replay(&mut dispatcher, &packets);

    if let Some(rx) = command_rx.as_mut() {
        while let Ok(command) = rx.try_recv() {
            print_json(&command);
        }
    }

    info!(
        "📊 {} packets, {} dispatched, {} ignored",
        stats.packets, stats.dispatched, stats.ignored
    );
    Ok(())
}

/// Console output logs directly; JSON goes through a channel drained by the caller
fn make_sink(
    output: OutputFormat,
) -> (Arc<dyn InputSink>, Option<mpsc::UnboundedReceiver<SinkCommand>>) {
    match output {
        OutputFormat::Console => (Arc::new(ConsoleSink::new()), None),
        OutputFormat::Json => {
            let (sink, rx) = CommandSink::channel();
            (Arc::new(sink), Some(rx))
        }
    }
}

async fn next_command(
    rx: &mut Option<mpsc::UnboundedReceiver<SinkCommand>>,
) -> Option<SinkCommand> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn print_json(command: &SinkCommand) {
    match serde_json::to_string(command) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Failed to serialize {}: {}", command.name(), e),
    }
}

/// Config file if present, defaults otherwise
async fn load_or_default(path: &str) -> Result<AppConfig> {
    if Path::new(path).exists() {
        AppConfig::load(path).await
    } else {
        info!("No config file at {}, using defaults", path);
        Ok(AppConfig::default())
    }
}

fn init_logging(level: &str, log_dir: Option<&str>) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "omicron-gw.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // Logs go to stderr so stdout stays clean for JSON output
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
