use std::sync::mpsc::Sender;
use std::sync::Arc;

use super::config::Config;
use super::error::{ConfigError, ProcessorError};
use super::event_source::{EventFile, EventSource};
use super::monitor_timer::{MonitorTimer, ScalerSource};
use super::routines::routine_by_name;
use super::session::Session;
use super::sort_status::{SortPhase, SortStatus};
use super::sorter::Sorter;

/// What a finished replay did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub routine: String,
    pub events_read: u64,
    pub events_sorted: u64,
    pub short_events: u64,
    pub monitor_ticks: u64,
}

/// Feed events from `source` to `sorter` until the source is exhausted, the sorter is
/// stopped, or `max_events` events were read. Progress is reported over `tx` in steps of
/// 1% of the source size.
///
/// Returns the number of events read from the source.
pub fn sort_events(
    sorter: &mut Sorter,
    source: &mut dyn EventSource,
    max_events: Option<u64>,
    tx: &Sender<SortStatus>,
) -> Result<u64, ProcessorError> {
    let total_data_size = source.total_size_bytes();
    let flush_frac: f32 = 0.01;
    let flush_val = (total_data_size as f64 * flush_frac as f64) as u64;
    let mut count: u64 = 0;
    let mut progress: f32 = 0.0;
    let mut events_read: u64 = 0;
    let mut buffer: Vec<i32> = Vec::with_capacity(sorter.event_size());

    tx.send(SortStatus::new(0.0, sorter.events_sorted(), SortPhase::Sorting))?;
    while !sorter.is_stopped() {
        if max_events.is_some_and(|max| events_read >= max) {
            spdlog::info!("Reached the event limit of {} events", events_read);
            break;
        }
        if !source.next_event(&mut buffer)? {
            break;
        }
        events_read += 1;
        sorter.sort_event(&buffer);

        count += (buffer.len() * 4) as u64;
        if count > flush_val {
            count = 0;
            progress += flush_frac;
            tx.send(SortStatus::new(
                progress,
                sorter.events_sorted(),
                SortPhase::Sorting,
            ))?;
        }
    }
    Ok(events_read)
}

/// The main loop of specsort.
///
/// Activates the configured sort routine in `session`, replays the configured event file
/// through it and keeps the monitors ticking on a separate thread while it does.
/// Scalers are refreshed from `scaler_source` on each tick, if one is given. If the run
/// cannot start, nothing stays registered for the routine.
pub fn process_run(
    config: &Config,
    session: Arc<Session>,
    scaler_source: Option<Box<dyn ScalerSource>>,
    tx: &Sender<SortStatus>,
) -> Result<RunSummary, ProcessorError> {
    config.validate()?;
    let routine = routine_by_name(&config.routine)
        .ok_or_else(|| ConfigError::UnknownRoutine(config.routine.clone()))?;
    session.set_monitor_interval(config.monitor_interval)?;

    let mut source = EventFile::new(config.get_event_file()?, config.event_size)?;
    spdlog::info!(
        "Total event file size: {}",
        human_bytes::human_bytes(source.total_size_bytes() as f64)
    );

    tx.send(SortStatus::new(0.0, 0, SortPhase::Starting))?;
    let mut sorter = Sorter::activate(session.clone(), routine)?;
    if sorter.event_size() > config.event_size {
        spdlog::warn!(
            "Sort routine {} reads {} parameters but events hold {} words; all will be skipped",
            sorter.name(),
            sorter.event_size(),
            config.event_size
        );
    }

    session.zero_scalers();
    let mut timer = match MonitorTimer::start(session.clone(), sorter.routine(), scaler_source) {
        Ok(timer) => timer,
        Err(e) => {
            session.remove_group(sorter.name());
            return Err(e.into());
        }
    };
    let result = sort_events(&mut sorter, &mut source, config.max_events, tx);
    let monitor_ticks = timer.stop();
    let events_read = result?;

    tx.send(SortStatus::new(
        1.0,
        sorter.events_sorted(),
        SortPhase::Finished,
    ))?;
    spdlog::info!(
        "Done sorting: read {} events, sorted {}, skipped {} short events",
        events_read,
        sorter.events_sorted(),
        sorter.short_events()
    );

    Ok(RunSummary {
        routine: sorter.name().to_string(),
        events_read,
        events_sorted: sorter.events_sorted(),
        short_events: sorter.short_events(),
        monitor_ticks,
    })
}

/// The function to be called by a separate thread (typically the UI).
/// Replays without a hardware scaler source
pub fn process(
    config: Config,
    session: Arc<Session>,
    tx: Sender<SortStatus>,
) -> Result<RunSummary, ProcessorError> {
    spdlog::info!("Processing {}...", config.event_path.display());
    let summary = process_run(&config, session, None, &tx)?;
    spdlog::info!("Finished processing {}.", config.event_path.display());
    Ok(summary)
}
