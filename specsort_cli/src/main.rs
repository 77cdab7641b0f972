//! # specsort_cli
//!
//! Part of the specsort crate family.
//!
//! Replays a raw event file through one of the built-in sort routines and reports the
//! resulting histograms and monitors.
//!
//! ## Use
//!
//! Make a template configuration with
//!
//! ```bash
//! specsort_cli --path config.yml new
//! ```
//!
//! fill it out, then replay with
//!
//! ```bash
//! specsort_cli --path config.yml
//! ```
use clap::{Arg, Command};
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use libspecsort::config::Config;
use libspecsort::process::process;
use libspecsort::session::Session;
use libspecsort::sort_status::SortStatus;

fn make_template_config(path: &Path) {
    let config = Config::default();
    config
        .write_config_file(path)
        .expect("Failed to write template config file!");
}

/// Log to the configured file as well as the terminal
fn setup_logging(log_path: &Path) {
    let file_sink = Arc::new(
        spdlog::sink::FileSink::builder()
            .path(log_path)
            .formatter(Box::new(spdlog::formatter::PatternFormatter::new(
                spdlog::formatter::pattern!(
                    "[{date_short} {time_short}] - [thread: {tid}] - [{^{level}}] - {payload}{eol}"
                ),
            )))
            .truncate(true)
            .build()
            .expect("Could not create log file!"),
    );
    let logger = Arc::new(
        spdlog::Logger::builder()
            .sinks(spdlog::default_logger().sinks().to_owned())
            .sink(file_sink)
            .flush_level_filter(spdlog::LevelFilter::All)
            .build()
            .expect("Could not create logger!"),
    );
    spdlog::set_default_logger(logger);
}

fn report(session: &Session) {
    spdlog::info!("Histograms:");
    for hist in session.histograms() {
        let gates = hist.gate_names();
        spdlog::info!(
            "  #{} {} ({:?}, {}x{}): {} counts{}",
            hist.number(),
            hist.name(),
            hist.hist_type(),
            hist.size_x(),
            hist.size_y(),
            hist.area(),
            if gates.is_empty() {
                String::new()
            } else {
                format!(", gates: {}", gates.join(", "))
            }
        );
    }
    for scaler in session.scalers() {
        spdlog::info!("Scaler {} [{}]: {}", scaler.name(), scaler.index(), scaler.value());
    }
    for monitor in session.monitors() {
        spdlog::info!(
            "Monitor {}: {}{}",
            monitor.name(),
            monitor.value(),
            if monitor.is_acceptable() { "" } else { " (out of range)" }
        );
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("specsort_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        spdlog::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        spdlog::info!("Done.");
        return;
    }

    // Load our config
    spdlog::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path).and_then(|c| {
        c.validate()?;
        Ok(c)
    }) {
        Ok(c) => c,
        Err(e) => {
            spdlog::error!("{e}");
            return;
        }
    };
    setup_logging(&config.log_path);
    spdlog::info!("Config successfully loaded.");
    spdlog::info!("Event Path: {}", config.event_path.to_string_lossy());
    spdlog::info!("Sort Routine: {}", config.routine);
    spdlog::info!("Event Size: {} words", config.event_size);
    spdlog::info!("Monitor Interval: {} s", config.monitor_interval);
    if let Some(max) = config.max_events {
        spdlog::info!("Max Events: {}", max);
    }

    // Setup the progress bar
    let pb = ProgressBar::new(100);
    let session = Arc::new(Session::new());
    let (tx, rx) = mpsc::channel::<SortStatus>();
    let worker_session = session.clone();
    // Spawn the task!
    let handle = std::thread::spawn(move || process(config, worker_session, tx));

    loop {
        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(status) => {
                pb.set_position((status.progress * 100.0) as u64);
                pb.set_message(format!("{} events", status.events_sorted));
            }
            Err(mpsc::RecvTimeoutError::Timeout) => (),
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    match handle.join() {
        Ok(result) => match result {
            Ok(summary) => spdlog::info!(
                "Successfully sorted {} of {} events with {} ({} monitor updates)",
                summary.events_sorted,
                summary.events_read,
                summary.routine,
                summary.monitor_ticks
            ),
            Err(e) => spdlog::error!("Sorting failed with error: {e}"),
        },
        Err(_) => spdlog::error!("Failed to join sorting task!"),
    }

    pb.finish();
    report(&session);

    spdlog::info!("Done.");
}
