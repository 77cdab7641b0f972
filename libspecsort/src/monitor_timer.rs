use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::constants::MONITOR_POLL_MILLIS;
use super::error::MonitorError;
use super::session::Session;
use super::sort_routine::SortRoutine;

/// Supplies snapshots of the hardware scaler block
pub trait ScalerSource: Send {
    /// Current scaler block, entry i for the scaler with index i. None if no snapshot
    /// could be taken this tick.
    fn read_scalers(&mut self) -> Option<Vec<i64>>;
}

impl<F> ScalerSource for F
where
    F: FnMut() -> Option<Vec<i64>> + Send,
{
    fn read_scalers(&mut self) -> Option<Vec<i64>> {
        self()
    }
}

/// One monitor tick: refresh the scalers from `source`, then update every monitor.
///
/// Monitors flagged for alarm whose value left the acceptable range are logged.
pub fn tick(
    session: &Session,
    routine: Option<&dyn SortRoutine>,
    source: Option<&mut dyn ScalerSource>,
) -> Result<(), MonitorError> {
    if let Some(source) = source {
        match source.read_scalers() {
            Some(values) => session.update_scalers(&values),
            None => spdlog::warn!("Scaler source returned no snapshot, keeping previous values"),
        }
    }
    session.update_monitors(routine)?;
    for monitor in session.monitors() {
        if monitor.alarm() && !monitor.is_acceptable() {
            spdlog::warn!(
                "Monitor {} is out of range: {} not in [{}, {}]",
                monitor.name(),
                monitor.value(),
                monitor.threshold(),
                monitor.maximum()
            );
        }
    }
    Ok(())
}

/// MonitorTimer runs monitor ticks on a background thread.
///
/// The session's interval is re-read on every poll, so a new interval applies from the
/// next tick. The thread polls its stop flag every `MONITOR_POLL_MILLIS`.
#[derive(Debug)]
pub struct MonitorTimer {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
}

impl MonitorTimer {
    pub fn start(
        session: Arc<Session>,
        routine: Arc<dyn SortRoutine>,
        mut source: Option<Box<dyn ScalerSource>>,
    ) -> Result<Self, MonitorError> {
        if session.monitor_interval().is_none() {
            return Err(MonitorError::IntervalNotSet);
        }
        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread_flag = stop_flag.clone();
        let handle = std::thread::spawn(move || {
            let mut ticks: u64 = 0;
            let mut last_tick = Instant::now();
            while !thread_flag.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(MONITOR_POLL_MILLIS));
                let interval = match session.monitor_interval() {
                    Some(i) => i,
                    None => continue,
                };
                if last_tick.elapsed().as_secs_f64() < interval {
                    continue;
                }
                last_tick = Instant::now();
                let scalers = source.as_deref_mut().map(|s| s as &mut dyn ScalerSource);
                match tick(&session, Some(routine.as_ref()), scalers) {
                    Ok(()) => ticks += 1,
                    Err(e) => spdlog::error!("Monitor update failed: {}", e),
                }
            }
            ticks
        });
        spdlog::info!("Started monitor timer");
        Ok(Self {
            stop_flag,
            handle: Some(handle),
        })
    }

    /// Stop the timer thread and return the number of ticks it ran
    pub fn stop(&mut self) -> u64 {
        self.stop_flag.store(true, Ordering::Relaxed);
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(ticks) => {
                    spdlog::info!("Stopped monitor timer after {} ticks", ticks);
                    ticks
                }
                Err(_) => {
                    spdlog::error!("Failed to join monitor timer thread!");
                    0
                }
            },
            None => 0,
        }
    }
}

impl Drop for MonitorTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SortError;
    use crate::monitor::MonitorSource;
    use crate::sort_routine::{Event, SortSetup};

    struct Idle;

    impl SortRoutine for Idle {
        fn name(&self) -> &str {
            "Idle"
        }

        fn initialize(&mut self, _setup: &mut SortSetup<'_>) -> Result<(), SortError> {
            Ok(())
        }

        fn sort(&self, _event: &Event<'_>) {}

        fn monitor(&self, _name: &str) -> f64 {
            42.0
        }
    }

    #[test]
    fn test_tick() {
        let session = Session::new();
        let scaler = session.create_scaler("g", "Clock", 1).unwrap();
        session
            .create_monitor("g", "Clock rate", MonitorSource::Scaler(scaler))
            .unwrap();
        let custom = session.create_monitor("g", "Answer", MonitorSource::Custom).unwrap();
        let mut source = || Some(vec![7i64, 500]);

        assert_eq!(tick(&session, None, None), Err(MonitorError::IntervalNotSet));
        session.set_monitor_interval(5.0).unwrap();
        tick(&session, Some(&Idle), Some(&mut source)).unwrap();
        assert_eq!(session.scaler("Clock").unwrap().value(), 500);
        assert_eq!(session.monitor("Clock rate").unwrap().value(), 100.0);
        assert_eq!(custom.value(), 42.0);
    }

    #[test]
    fn test_timer_runs_and_stops() {
        let session = Arc::new(Session::new());
        let routine: Arc<dyn SortRoutine> = Arc::new(Idle);
        assert!(MonitorTimer::start(session.clone(), routine.clone(), None).is_err());

        let custom = session.create_monitor("g", "Answer", MonitorSource::Custom).unwrap();
        session.set_monitor_interval(0.05).unwrap();
        let mut timer = MonitorTimer::start(session.clone(), routine, None).unwrap();
        std::thread::sleep(Duration::from_millis(5 * MONITOR_POLL_MILLIS));
        let ticks = timer.stop();
        assert!(ticks >= 1);
        assert_eq!(custom.value(), 42.0);
        assert_eq!(timer.stop(), 0);
    }

    #[test]
    fn test_timer_reads_scaler_source() {
        let session = Arc::new(Session::new());
        let scaler = session.create_scaler("g", "Clock", 0).unwrap();
        session.set_monitor_interval(0.05).unwrap();
        let mut reads: i64 = 0;
        let source: Box<dyn ScalerSource> = Box::new(move || {
            reads += 1;
            Some(vec![reads * 10])
        });
        let mut timer = MonitorTimer::start(session.clone(), Arc::new(Idle), Some(source)).unwrap();
        std::thread::sleep(Duration::from_millis(10 * MONITOR_POLL_MILLIS));
        let ticks = timer.stop() as i64;
        assert!(ticks >= 2);
        assert_eq!(scaler.value(), ticks * 10);
    }
}
