//! Unicorn OSC Streamer
//!
//! Streams EEG from a paired Unicorn amplifier to an OSC listener over UDP,
//! or replays a recorded capture when no device is available.

use anyhow::Result;
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use unicorn_osc::{
    config::AppConfig,
    console::{Console, TerminalConsole},
    device::DeviceBackend,
    network::UdpSender,
    stream::Streamer,
};

#[derive(Parser, Debug)]
#[command(name = "unicorn-osc", version, about = "Stream Unicorn EEG to OSC over UDP")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// OSC destination host
    #[arg(long)]
    host: Option<String>,

    /// OSC destination port
    #[arg(short, long)]
    port: Option<u16>,

    /// OSC address of outgoing messages
    #[arg(long)]
    address: Option<String>,

    /// Recorded capture used for playback
    #[arg(short, long)]
    recording: Option<PathBuf>,

    /// Scans acquired per call
    #[arg(long)]
    frame_length: Option<u32>,

    /// Acquire the amplifier's internal test signal
    #[arg(long)]
    test_signal: bool,

    /// Open this device without prompting
    #[arg(long)]
    serial: Option<String>,

    /// Use N simulated devices instead of the Unicorn driver
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "1")]
    simulate: Option<usize>,

    /// Skip the device and stream the recording
    #[arg(long)]
    replay: bool,

    /// Exit without waiting for ENTER
    #[arg(long)]
    no_wait: bool,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.network.host = host.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(address) = &self.address {
            config.network.osc_address = address.clone();
        }
        if let Some(path) = &self.recording {
            config.recording.path = path.clone();
        }
        if let Some(frame_length) = self.frame_length {
            config.device.frame_length = frame_length;
        }
        if self.test_signal {
            config.device.test_signal = true;
        }
        if let Some(serial) = &self.serial {
            config.device.serial = Some(serial.clone());
        }
        if self.no_wait {
            config.console.wait_for_enter = false;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout belongs to the console prompts
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            conclude(&mut TerminalConsole::stdio(), Some(e.to_string()), !args.no_wait);
            return Ok(());
        }
    };
    let wait_for_enter = config.console.wait_for_enter;

    tracing::info!("Starting Unicorn OSC streamer");

    let running = Arc::new(AtomicBool::new(true));
    let session_running = running.clone();
    let session = tokio::task::spawn_blocking(move || stream(&args, config, session_running));

    let interrupt = || async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let Some(outcome) = supervise(session, &running, interrupt).await else {
        // The session thread may be stuck in a prompt or a device call
        std::process::exit(0);
    };

    let failure = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => {
            tracing::error!("Session ended with error: {}", e);
            Some(e.diagnostic())
        }
        Err(e) => {
            tracing::error!("Session task failed: {}", e);
            Some("An unknown error occurred.".to_string())
        }
    };
    conclude(&mut TerminalConsole::stdio(), failure, wait_for_enter);

    Ok(())
}

/// File or per-user configuration with command-line overrides applied.
fn load_config(args: &Args) -> unicorn_osc::Result<AppConfig> {
    let mut config = AppConfig::load_or_default(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Wait for the session to end.
///
/// The first interrupt asks the session to stop and keeps waiting; a second
/// one gives up on it and returns `None`.
async fn supervise<T, S, F>(
    mut session: JoinHandle<T>,
    running: &AtomicBool,
    mut interrupt: S,
) -> Option<std::result::Result<T, JoinError>>
where
    S: FnMut() -> F,
    F: Future<Output = ()>,
{
    tokio::select! {
        joined = &mut session => return Some(joined),
        _ = interrupt() => {
            tracing::info!("Received Ctrl+C, shutting down");
            running.store(false, Ordering::Relaxed);
        }
    }

    tokio::select! {
        joined = &mut session => Some(joined),
        _ = interrupt() => {
            tracing::warn!("Received second Ctrl+C, exiting immediately");
            None
        }
    }
}

/// Print the final diagnostic, if any, and optionally wait for ENTER.
fn conclude<C: Console>(console: &mut C, failure: Option<String>, wait_for_enter: bool) {
    if let Some(text) = failure {
        console.message(&text);
    }
    if wait_for_enter {
        console.wait_for_exit();
    }
}

/// Pick the device backend and run one session on the blocking pool.
fn stream(args: &Args, config: AppConfig, running: Arc<AtomicBool>) -> unicorn_osc::Result<()> {
    #[cfg(feature = "simulator")]
    if let Some(count) = args.simulate {
        let backend = unicorn_osc::device::simulated::SimulatedBackend::new(count.max(1));
        return run_with(backend, config, args.replay, running);
    }
    #[cfg(not(feature = "simulator"))]
    if args.simulate.is_some() {
        tracing::warn!("Built without the `simulator` feature; --simulate ignored");
    }

    #[cfg(feature = "unicorn")]
    let backend = unicorn_osc::device::unicorn::UnicornBackend;
    #[cfg(not(feature = "unicorn"))]
    let backend = unicorn_osc::device::MissingDriver;

    run_with(backend, config, args.replay, running)
}

fn run_with<B: DeviceBackend>(
    backend: B,
    config: AppConfig,
    replay: bool,
    running: Arc<AtomicBool>,
) -> unicorn_osc::Result<()> {
    let mut streamer = Streamer::new(config, backend, TerminalConsole::stdio(), running)?;

    if replay {
        streamer.run_replay(UdpSender::connect)
    } else {
        streamer.run_session(UdpSender::connect)
    }
}
