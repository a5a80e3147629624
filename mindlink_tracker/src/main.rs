//! # MindLink Demo Binary
//!
//! Simple eye tracking walkthrough: connect, size the screen markers,
//! calibrate, record a few trials while printing the gaze position, and
//! shut down. A cancelled or failed calibration disconnects and exits
//! without recording.
//!
//! # Usage
//!
//! ```bash
//! # Simulated headset, calibration starts without a key press
//! mindlink_demo --auto-start
//!
//! # Config file and longer trials
//! mindlink_demo --config mindlink_tracker/config/mindlink.toml --trials 5 --trial-secs 4
//!
//! # Verbose JSON logs
//! mindlink_demo -v --json
//! ```

use clap::Parser;
use crossbeam_channel::Sender;
use mindlink_common::config::LogLevel;
use mindlink_common::tracker::client::TrackerError;
use mindlink_common::tracker::config::TrackerConfig;
use mindlink_common::tracker::host::{
    CalibrationHost, DisplayInfo, Key, Prompt, SharedEventBuffer,
};
use mindlink_common::tracker::records::HostEvent;
use mindlink_tracker::{ClientRegistry, EyeTracker, InstanceRegistry};
use parking_lot::Mutex;
use serde::Serialize;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Layer, Registry};

/// MindLink Demo - simple eye tracking walkthrough
#[derive(Parser, Debug)]
#[command(name = "mindlink_demo")]
#[command(version)]
#[command(about = "Connect, calibrate and record gaze from an AdHawk MindLink")]
#[command(long_about = None)]
struct Args {
    /// Path to the tracker configuration (TOML). Defaults are used when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Vendor client to use, overriding the configuration
    #[arg(long)]
    client: Option<String>,

    /// Number of recording trials
    #[arg(short, long, default_value_t = 3)]
    trials: u32,

    /// Length of each trial in seconds
    #[arg(long, default_value_t = 2.0)]
    trial_secs: f64,

    /// Start calibration without waiting for SPACE
    #[arg(long)]
    auto_start: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

/// Per-trial summary printed as JSON.
#[derive(Debug, Default, Serialize)]
struct TrialSummary {
    trial: u32,
    samples: usize,
    blinks: usize,
    first_device_time: Option<f64>,
    last_device_time: Option<f64>,
    last_gaze: Option<(f64, f64)>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        error!("MindLink demo failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let log_filter = setup_tracing(&args);

    let mut config = match args.config {
        Some(ref path) => EyeTracker::load_config(path)?,
        None => TrackerConfig::default(),
    };
    if !args.verbose {
        log_filter.reload(level_filter(level_for(config.shared.log_level)))?;
    }

    info!("MindLink demo v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Some(ref client) = args.client {
        info!("Client from CLI: {client}");
        config.client = client.clone();
    }
    if config.display.is_none() {
        info!("No display configured, assuming 1920x1080 pixels, 527x296 mm");
        config.display = Some(DisplayInfo::pixels(1920, 1080, 527.0, 296.0));
    }
    let win_width_px = config
        .display
        .as_ref()
        .map_or(1920, |d| d.pixel_resolution[0]);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let clients = ClientRegistry::with_builtin();
    let instances = InstanceRegistry::new();
    let buffer = SharedEventBuffer::default();
    let mut tracker = EyeTracker::new(config, &clients, &instances, Box::new(buffer.clone()))?;
    if !tracker.is_connected() {
        return Err(TrackerError::InitFailed("MindLink did not connect".to_string()).into());
    }

    match tracker.generate_markers(win_width_px) {
        Some(placements) => {
            for p in &placements {
                info!(
                    "Marker {} at ({:.1}, {:.1}) cm: {} px image, {} px code",
                    p.aruco_id, p.pos_x_cm, p.pos_y_cm, p.image_size_px, p.code_size_px
                );
            }
        }
        None => warn!("No screen markers, gaze positions will stay at the origin"),
    }

    let mut host = ConsoleHost::new(args.auto_start, Arc::clone(&running));
    if !tracker.run_setup_procedure(&mut host) {
        warn!("Calibration not successful, disconnecting");
        tracker.close();
        return Ok(());
    }

    let trial_len = Duration::from_secs_f64(args.trial_secs.max(0.0));
    for trial in 1..=args.trials {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let summary = record_trial(&mut tracker, &buffer, trial, trial_len, &running);
        println!("{}", serde_json::to_string(&summary)?);
    }

    tracker.close();
    info!("MindLink demo shutdown complete");
    Ok(())
}

fn record_trial(
    tracker: &mut EyeTracker,
    buffer: &SharedEventBuffer,
    trial: u32,
    trial_len: Duration,
    running: &AtomicBool,
) -> TrialSummary {
    info!("Trial {trial} started");
    buffer.drain();
    tracker.set_recording_state(true);

    let started = Instant::now();
    let mut last_print = Instant::now();
    while started.elapsed() < trial_len && running.load(Ordering::SeqCst) {
        tracker.poll();
        if last_print.elapsed() >= Duration::from_millis(250) {
            last_print = Instant::now();
            if let Some((x, y)) = tracker.get_position() {
                println!("t={:.3} gaze=({x:.1}, {y:.1})", tracker.tracker_time());
            }
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    tracker.poll();

    let mut summary = TrialSummary {
        trial,
        last_gaze: tracker.get_last_gaze_position(),
        ..TrialSummary::default()
    };
    tracker.set_recording_state(false);

    for event in buffer.drain() {
        match event {
            HostEvent::BinocularSample(_) => summary.samples += 1,
            HostEvent::BlinkEnd(_) => summary.blinks += 1,
        }
        let t = event.device_time();
        summary.first_device_time.get_or_insert(t);
        summary.last_device_time = Some(t);
    }
    info!(
        "Trial {trial} finished: {} samples, {} blinks",
        summary.samples, summary.blinks
    );
    summary
}

/// Console stand-in for the experiment window: prints the prompt and reads
/// keys from stdin, one per line.
struct ConsoleHost {
    auto_start: bool,
    running: Arc<AtomicBool>,
    keys: Arc<Mutex<Option<Sender<Key>>>>,
    prompt_shown: bool,
}

impl ConsoleHost {
    fn new(auto_start: bool, running: Arc<AtomicBool>) -> Self {
        Self {
            auto_start,
            running,
            keys: Arc::new(Mutex::new(None)),
            prompt_shown: false,
        }
    }

    fn send(&self, key: Key) {
        if let Some(tx) = self.keys.lock().as_ref() {
            let _ = tx.send(key);
        }
    }
}

impl CalibrationHost for ConsoleHost {
    fn register_key_listener(&mut self, keys: Sender<Key>) -> bool {
        *self.keys.lock() = Some(keys);
        if self.auto_start {
            self.send(Key::Space);
            return true;
        }

        let slot = Arc::clone(&self.keys);
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                // A bare ENTER counts as SPACE.
                let key = if line.trim().is_empty() {
                    Key::Space
                } else {
                    Key::parse(&line)
                };
                match slot.lock().as_ref() {
                    Some(tx) => {
                        let _ = tx.send(key);
                    }
                    None => break,
                }
            }
        });
        true
    }

    fn unregister_key_listener(&mut self) {
        *self.keys.lock() = None;
    }

    fn show_prompt(&mut self, prompt: &Prompt) {
        if !self.prompt_shown {
            println!("{}", prompt.text);
            self.prompt_shown = true;
        }
    }

    fn hide_prompt(&mut self) {
        self.prompt_shown = false;
    }

    fn clear_event_buffers(&mut self) {}

    fn pump(&mut self) {
        if !self.running.load(Ordering::SeqCst) {
            self.send(Key::Escape);
        }
    }
}

/// Setup tracing subscriber based on CLI arguments.
///
/// Starts at INFO (DEBUG with `--verbose`). The returned handle lets the
/// configured `shared.log_level` replace the filter once the config is read.
fn setup_tracing(args: &Args) -> reload::Handle<EnvFilter, Registry> {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let (filter, handle) = reload::Layer::new(level_filter(level));

    let output = if args.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    tracing_subscriber::registry().with(filter).with(output).init();
    handle
}

fn level_for(log_level: LogLevel) -> Level {
    log_level.as_directive().parse().unwrap_or(Level::INFO)
}

fn level_filter(level: Level) -> EnvFilter {
    EnvFilter::from_default_env().add_directive(level.into())
}
