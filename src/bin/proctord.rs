//! proctord - proctoring session demo daemon
//!
//! This daemon:
//! 1. Mounts one proctoring session from config/CLI
//! 2. Drives it against a stream of simulated candidate signals
//! 3. Renders the live display state to the terminal
//! 4. Tears the session down on Ctrl-C or time expiry
//! 5. Prints the final attempt summary as JSON for the submission endpoint

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use proctor_kernel::ui::Ui;
use proctor_kernel::{
    PageSignal, ProctorConfig, ProctorSession, SignalDisposition, ViolationKind,
};

#[derive(Parser, Debug)]
#[command(name = "proctord", about = "Proctoring session demo daemon")]
struct Args {
    /// Test duration in minutes (overrides config).
    #[arg(long)]
    minutes: Option<u32>,

    /// Camera source URI (stub://, stub-denied://, v4l2://, http(s)://).
    #[arg(long)]
    camera: Option<String>,

    /// Attempt identifier (attempt:<label>).
    #[arg(long)]
    attempt_id: Option<String>,

    /// RNG seed for the simulated check and candidate behavior.
    #[arg(long)]
    seed: Option<u64>,

    /// Per-iteration probability of the simulated candidate switching tabs.
    #[arg(long, default_value_t = 0.01)]
    tab_switch_rate: f64,

    /// UI mode: auto, plain, pretty.
    #[arg(long)]
    ui: Option<String>,
}

fn main() -> Result<()> {
    // Initialize logging (simple stderr for MVP)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut cfg = ProctorConfig::load()?;
    if let Some(minutes) = args.minutes {
        cfg.test_time_minutes = minutes;
    }
    if let Some(camera) = args.camera.clone() {
        cfg.camera.source = camera;
    }
    if let Some(attempt_id) = args.attempt_id.clone() {
        cfg.attempt_id = attempt_id;
    }
    if args.seed.is_some() {
        cfg.check_seed = args.seed;
    }
    cfg.attempt_id = cfg.attempt_id.to_lowercase();
    cfg.validate()?;

    let running = Arc::new(AtomicBool::new(true));
    let stop_flag = running.clone();
    ctrlc::set_handler(move || {
        stop_flag.store(false, Ordering::SeqCst);
    })?;

    log::info!(
        "proctord running: attempt={} minutes={} camera={}",
        cfg.attempt_id,
        cfg.test_time_minutes,
        cfg.camera.source
    );

    // The host callback: where a real test screen would decide whether the
    // attempt should be flagged or cut short.
    let mut session = ProctorSession::mount(cfg, |kind: ViolationKind| {
        log::info!("host notified: {}", kind);
    })?;

    let ui = Ui::from_args(
        args.ui.as_deref(),
        std::io::stderr().is_terminal(),
        false,
    );
    let mut panel = ui.session_panel();

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut hidden = false;
    let mut last_health_log = Instant::now();

    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        session.advance(now);

        // Simulated candidate behavior: occasionally leaves and returns.
        if rng.gen::<f64>() < args.tab_switch_rate {
            hidden = !hidden;
            let disposition =
                session.handle_signal(&PageSignal::VisibilityChanged { hidden }, now);
            if let SignalDisposition::Blocked { notice } = disposition {
                log::warn!("blocked: {}", notice);
            }
        }

        let display = session.display_state();
        panel.render(&display);

        if last_health_log.elapsed() >= Duration::from_secs(5) {
            log::debug!(
                "health: camera={} violations={} remaining={}",
                display.camera.label(),
                display.violation_count,
                display.remaining
            );
            last_health_log = Instant::now();
        }

        if session.remaining_seconds() == 0 {
            log::info!("time expired; handing the attempt to submission");
            break;
        }

        std::thread::sleep(Duration::from_millis(250));
    }

    let summary = session.finish();
    panel.finish(&session.display_state());
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
