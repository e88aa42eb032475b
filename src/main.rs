use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rc_teleop::config::{self, AppConfig, ConfigStore};
use rc_teleop::control::{CommandEncoder, MemoryAudioSink};
use rc_teleop::drive::TransmissionLoop;
use rc_teleop::events::{EventBus, SystemEvent};
use rc_teleop::input::{self, SharedInput};
use rc_teleop::transport::{self, Transport, WsConnection};
use rc_teleop::webrtc::{run_dispatcher, NegotiationSession, NegotiationState, SessionSlot};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// rc-teleop command line arguments
#[derive(Parser, Debug)]
#[command(name = "rc-teleop")]
#[command(version, about = "Remote vehicle teleoperation client", long_about = None)]
struct CliArgs {
    /// Relay WebSocket URL (overrides config file and environment)
    #[arg(short = 's', long, value_name = "URL")]
    server_url: Option<String>,

    /// Configuration file path (default: ./rc-teleop.json)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Tick period in milliseconds (1-1000)
    #[arg(short = 't', long, value_name = "MS")]
    tick_ms: Option<u64>,

    /// Highest forward gear
    #[arg(long, value_name = "N")]
    max_gear: Option<u8>,

    /// Control frame layout (legacy or extended)
    #[arg(long, value_name = "LAYOUT")]
    frame_layout: Option<String>,

    /// Start a fresh negotiation after a failed one
    #[arg(long)]
    reconnect: bool,

    /// Do not offer the local microphone
    #[arg(long)]
    no_microphone: bool,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl CliArgs {
    fn apply(&self, config: &mut AppConfig) -> anyhow::Result<()> {
        if let Some(ref url) = self.server_url {
            config.signaling.server_url = url.clone();
        }
        if let Some(tick_ms) = self.tick_ms {
            config.control.tick_ms = tick_ms;
        }
        if let Some(max_gear) = self.max_gear {
            config.encoder.max_gear = max_gear;
        }
        if let Some(ref layout) = self.frame_layout {
            config.encoder.frame_layout = layout.parse()?;
        }
        if self.reconnect {
            config.control.reconnect = true;
        }
        if self.no_microphone {
            config.webrtc.send_microphone = false;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting rc-teleop v{}", env!("CARGO_PKG_VERSION"));

    let config_path = args.config.clone().unwrap_or_else(get_config_path);
    tracing::info!("Configuration file: {}", config_path.display());
    let config_store = ConfigStore::new(&config_path).await?;

    let mut config = (*config_store.get()).clone();
    config::apply_env_overrides(&mut config);
    args.apply(&mut config)?;
    config.validate()?;

    let events = Arc::new(EventBus::new());
    spawn_event_logger(events.clone());

    let cancel = CancellationToken::new();

    // Operator input arrives as JSON lines on stdin
    let input = SharedInput::new();
    let input_task = input::spawn_stdin_reader(input.clone(), cancel.clone());

    let sink = Arc::new(MemoryAudioSink::new(config.audio.initial_volume));
    let mut encoder = CommandEncoder::new(config.encoder.clone(), sink);
    encoder.set_event_bus(events.clone());

    tracing::info!("Connecting to relay {}", config.signaling.server_url);
    let WsConnection {
        transport: relay,
        inbound,
        task: mut relay_task,
    } = transport::connect(&config.signaling.server_url, cancel.clone()).await?;
    let transport: Arc<dyn Transport> = Arc::new(relay);

    let slot = Arc::new(SessionSlot::new());
    let dispatcher = tokio::spawn(run_dispatcher(inbound, slot.clone(), cancel.clone()));

    let transmission = TransmissionLoop::new(
        Box::new(input.clone()),
        encoder,
        slot.clone(),
        transport.clone(),
    )
    .with_period_ms(config.control.tick_ms);
    let loop_task = tokio::spawn(transmission.run(cancel.clone()));

    let supervisor = tokio::spawn(supervise_negotiation(
        config.clone(),
        slot.clone(),
        transport.clone(),
        events.clone(),
        cancel.clone(),
    ));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        }
        _ = &mut relay_task => {
            tracing::warn!("Relay connection lost, shutting down");
            events.publish(SystemEvent::SystemError {
                module: "transport".to_string(),
                severity: "error".to_string(),
                message: "Relay connection lost".to_string(),
            });
        }
    }

    cancel.cancel();

    let stats = loop_task.await?;
    tracing::info!(
        "Sent {} of {} frames ({} withheld, {} dropped)",
        stats.sent,
        stats.ticks,
        stats.withheld,
        stats.dropped
    );

    let _ = supervisor.await;
    let _ = dispatcher.await;
    input_task.abort();

    if let Some(session) = slot.clear() {
        if let Some(state) = session.connection_state() {
            tracing::debug!("Peer connection {} at shutdown", state);
        }
        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close session: {}", e);
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Run negotiation attempts until one is ready or reconnecting is disabled
///
/// Every attempt is a fresh session; a failed session is closed and replaced.
async fn supervise_negotiation(
    config: AppConfig,
    slot: Arc<SessionSlot>,
    transport: Arc<dyn Transport>,
    events: Arc<EventBus>,
    cancel: CancellationToken,
) {
    let delay = Duration::from_millis(config.control.reconnect_delay_ms);

    loop {
        match NegotiationSession::with_rtc_peer(&config.webrtc).await {
            Ok(session) => {
                let session = Arc::new(session.with_event_bus(events.clone()));
                if let Some(previous) = slot.install(session.clone()) {
                    if let Err(e) = previous.close().await {
                        tracing::debug!("Failed to close previous session: {}", e);
                    }
                }

                if let Err(e) = session.start(transport.clone()).await {
                    tracing::warn!("Negotiation {} did not start: {}", session.session_id(), e);
                }

                let mut state_rx = session.subscribe_state();
                let outcome = loop {
                    let state = *state_rx.borrow_and_update();
                    if state.is_terminal() {
                        break state;
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        changed = state_rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }
                    }
                };

                if outcome == NegotiationState::Ready {
                    tracing::info!("Vehicle link ready, transmitting control frames");
                    return;
                }
            }
            Err(e) => {
                tracing::error!("Failed to create peer connection: {}", e);
            }
        }

        if !config.control.reconnect {
            tracing::error!("Negotiation failed; control frames will be withheld (use --reconnect to retry)");
            return;
        }

        tracing::info!("Starting a new negotiation in {} ms", delay.as_millis());
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Log bus events for the operator
fn spawn_event_logger(events: Arc<EventBus>) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => tracing::debug!("event {}: {}", event.event_name(), json),
                    Err(_) => tracing::debug!("event {}", event.event_name()),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("Event logger lagged by {} events", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "rc_teleop=error,webrtc=error",
        LogLevel::Warn => "rc_teleop=warn,webrtc=warn",
        LogLevel::Info => "rc_teleop=info,webrtc=warn",
        LogLevel::Verbose => "rc_teleop=debug,webrtc=warn",
        LogLevel::Debug => "rc_teleop=debug,webrtc=info",
        LogLevel::Trace => "rc_teleop=trace,webrtc=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

/// Get the configuration file path
fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("RC_TELEOP_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("rc-teleop.json")
}
