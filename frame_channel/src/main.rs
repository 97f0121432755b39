//! # Frame Probe
//!
//! Command-line harness around a frame channel:
//! - `produce`: publish synthetic frames at a fixed rate until Ctrl+C
//! - `consume`: attach as a consumer and log every frame received
//! - `status`: show which of the channel objects exist
//! - `clean`: remove leftover channel objects

use clap::{Parser, Subcommand};
use frame::config::{ChannelConfig, ConfigLoader, LogLevel, SharedConfig};
use frame::consts::DEFAULT_CONFIG_PATH;
use frame_channel::probe::{ProbeConfig, ProducerConfig, SyntheticFrames, config_path};
use frame_channel::{ChannelNames, FrameChannel, FrameReader, PublishOutcome, monotonic_secs};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Frame Probe: produce into, consume from and inspect frame channels
#[derive(Parser, Debug)]
#[command(name = "frame_probe")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Produce, consume and inspect shared memory frame channels")]
struct Args {
    /// Path to a probe configuration TOML [default: /etc/frame_channel/probe.toml if present].
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Channel base name (overrides the configuration file).
    #[arg(long)]
    base: Option<String>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish synthetic frames.
    Produce {
        /// Stop after this many frames.
        #[arg(long)]
        frames: Option<u64>,

        /// Remove the channel objects on exit.
        #[arg(long)]
        remove: bool,
    },
    /// Read frames as a consumer.
    Consume {
        /// Stop after this many frames.
        #[arg(long)]
        frames: Option<u64>,

        /// Wait per frame, in milliseconds.
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
    },
    /// Show which channel objects exist.
    Status,
    /// Remove all channel objects.
    Clean,
}

fn main() {
    let args = Args::parse();
    let config = load_config(&args);

    let log_level = match (&config, args.verbose) {
        (_, true) => LogLevel::Debug,
        (Ok(config), false) => config.shared.log_level,
        (Err(_), false) => LogLevel::default(),
    };
    setup_tracing(log_level, args.json);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("FATAL: invalid configuration: {e}");
            process::exit(2);
        }
    };

    info!(
        "Frame Probe v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name
    );

    if let Err(e) = run(&args, &config) {
        error!("FATAL: {e}");
        process::exit(1);
    }
}

fn load_config(args: &Args) -> Result<ProbeConfig, Box<dyn std::error::Error>> {
    let path = config_path(args.config.as_deref(), Path::new(DEFAULT_CONFIG_PATH));
    let mut config = match path {
        Some(ref path) => ProbeConfig::load(path)?,
        None => ProbeConfig {
            shared: SharedConfig {
                log_level: LogLevel::Info,
                service_name: "frame_probe".to_string(),
            },
            channel: ChannelConfig::new("frame_probe"),
            producer: ProducerConfig::default(),
        },
    };

    if let Some(ref base) = args.base {
        config.channel.base_name = base.clone();
    }

    config.validate()?;
    Ok(config)
}

fn run(args: &Args, config: &ProbeConfig) -> Result<(), Box<dyn std::error::Error>> {
    match args.command {
        Command::Produce { frames, remove } => produce(config, frames, remove),
        Command::Consume { frames, timeout_ms } => {
            consume(config, frames, Duration::from_millis(timeout_ms))
        }
        Command::Status => {
            let names = ChannelNames::new(&config.channel.base_name)?;
            let presence = names.presence()?;
            info!("Channel {names}: {presence:?}");
            println!("{}", serde_json::to_string(&presence)?);
            Ok(())
        }
        Command::Clean => {
            let names = ChannelNames::new(&config.channel.base_name)?;
            let removed = names.unlink_all()?;
            info!("Removed {removed} object(s) of channel {names}");
            Ok(())
        }
    }
}

fn shutdown_flag() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}

fn produce(
    config: &ProbeConfig,
    limit: Option<u64>,
    remove: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut channel_config = config.channel.clone();
    channel_config.remove_on_close |= remove;

    let producer = config.producer;
    let mut channel = FrameChannel::from_config(&channel_config)?;
    let running = shutdown_flag()?;

    let period = Duration::from_secs_f64(1.0 / f64::from(producer.fps));
    let mut frames = SyntheticFrames::new(producer.frame_bytes);
    let mut next = Instant::now();

    info!(
        "Producing {}x{} frames of {} bytes at {} fps",
        producer.width, producer.height, producer.frame_bytes, producer.fps
    );

    while running.load(Ordering::SeqCst) && limit.is_none_or(|n| frames.seq() < n) {
        let ts = monotonic_secs();
        let payload = frames.next_frame();
        let outcome = channel.publish(payload, producer.format, producer.width, producer.height, ts);
        if outcome == PublishOutcome::Failed {
            warn!("Channel disabled; stopping producer");
            break;
        }

        next += period;
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        } else {
            next = now;
        }
    }

    let stats = channel.stats();
    channel.close()?;
    println!("{}", serde_json::to_string(&stats)?);
    Ok(())
}

fn consume(
    config: &ProbeConfig,
    limit: Option<u64>,
    timeout: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader = FrameReader::attach(&config.channel.base_name)?;
    let running = shutdown_flag()?;
    let mut received = 0u64;

    info!("Consuming from channel {}", reader.names());

    while running.load(Ordering::SeqCst) && limit.is_none_or(|n| received < n) {
        if !reader.wait_frame(timeout)? {
            debug!("No frame within {} ms", timeout.as_millis());
            continue;
        }

        let latest = reader.read_latest()?;
        received += 1;
        let latency_ms = (monotonic_secs() - latest.meta.capture_ts) * 1000.0;
        info!(
            format = latest.meta.format,
            width = latest.meta.width,
            height = latest.meta.height,
            bytes = latest.data.len(),
            seq = ?SyntheticFrames::seq_of(&latest.data),
            latency_ms,
            "Received frame"
        );
    }

    info!("Received {received} frame(s)");
    Ok(())
}

fn setup_tracing(level: LogLevel, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
