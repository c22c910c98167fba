//! CAN Telemetry CLI Application
//!
//! Command-line bridge around the can-telemetry library. It reads frame text
//! lines (one frame per line, as printed by a bus capture tool or piped in from a
//! bus subscriber), runs them through the decode-and-monitor pipeline and writes
//! readings and fault events as JSON lines.

use anyhow::{Context, Result};
use can_telemetry::{Decoder, FrameOutcome, Pipeline, TimeSource};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod sink;

use config::AppConfig;
use sink::JsonLinesSink;

/// CAN Telemetry - Decode BMS and motor controller frames and watch for faults
#[derive(Parser, Debug)]
#[command(name = "can-telemetry-cli")]
#[command(about = "Decode EV CAN frames into telemetry and fault events", long_about = None)]
#[command(version)]
struct Args {
    /// File with one frame per line (default: stdin)
    #[arg(short, long, value_name = "FILE")]
    input: Option<PathBuf>,

    /// Path to DBC file(s) with the BMS layout (can be repeated)
    #[arg(long, value_name = "FILE")]
    dbc: Vec<PathBuf>,

    /// Output file for JSON lines (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Time fault cooldowns with frame timestamps (for recorded captures)
    #[arg(long)]
    replay: bool,

    /// Seconds without frames before the bridge is reported idle (0 disables)
    #[arg(long, value_name = "SECS")]
    watchdog: Option<u64>,

    /// Maximum number of frames to process (for testing)
    #[arg(long, value_name = "COUNT")]
    max_frames: Option<usize>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("CAN Telemetry CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using telemetry library v{}", can_telemetry::VERSION);

    let app_config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    run(&args, app_config)
}

/// Load layouts, build the pipeline and process every input line
fn run(args: &Args, mut app_config: AppConfig) -> Result<()> {
    // Command line overrides the configuration file
    if !args.dbc.is_empty() {
        app_config.input.dbc_files = args.dbc.clone();
    }
    if args.replay {
        app_config.input.time_source = TimeSource::Frame;
    }
    if let Some(secs) = args.watchdog {
        app_config.watchdog.timeout_secs = secs;
    }
    if args.output.is_some() {
        app_config.output.file = args.output.clone();
    }

    let pipeline_config = app_config.pipeline_config();

    let mut decoder = Decoder::with_bms_config(&pipeline_config.bms);
    for dbc_path in &app_config.input.dbc_files {
        decoder
            .add_dbc(dbc_path)
            .with_context(|| format!("Failed to load DBC file: {:?}", dbc_path))?;
    }

    let stats = decoder.database_stats();
    log::info!("Layout database: {} messages, {} signals", stats.num_messages, stats.num_signals);
    match decoder.bms_sender() {
        Some(sender) => log::info!("BMS frames expected from node {}", sender),
        None if decoder.has_bms_layout() => log::info!("BMS layout loaded without a sender node"),
        None => log::warn!("No BMS layout loaded, BMS frames will be ignored"),
    }

    let writer: Box<dyn Write + Send> = match &app_config.output.file {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout()),
    };

    let mut pipeline = Pipeline::new(pipeline_config, decoder, Arc::new(JsonLinesSink::new(writer)))
        .context("Failed to start pipeline")?;

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open input file: {:?}", path))?;
            log::info!("Reading frames from {:?}", path);
            Box::new(BufReader::new(file))
        }
        None => {
            log::info!("Reading frames from stdin");
            Box::new(io::stdin().lock())
        }
    };

    let mut processed = 0usize;
    for line in reader.lines() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }

        if let FrameOutcome::Rejected { reason } = pipeline.handle_line(&line) {
            log::debug!("Frame {}: {}", processed + 1, reason);
        }

        processed += 1;
        if args.max_frames.is_some_and(|max| processed >= max) {
            log::info!("Reached frame limit ({})", processed);
            break;
        }
    }

    let stats = pipeline.stats();
    log::info!(
        "Processed {} frames: {} decoded, {} ignored, {} rejected",
        stats.frames_seen,
        stats.decoded,
        stats.ignored,
        stats.rejected
    );
    log::info!(
        "Published {} readings and {} fault events ({} sink errors)",
        stats.readings_published,
        stats.fault_events,
        stats.sink_errors
    );

    for (signal, status) in pipeline.monitor().active_faults() {
        log::warn!("Still active at end of input: {} {}", signal, status);
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
