use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::gate::Gate;
use super::scaler::Scaler;
use super::sort_routine::SortRoutine;

/// Where a monitor takes its raw value from
#[derive(Debug, Clone)]
pub enum MonitorSource {
    /// Rate of change of a scaler
    Scaler(Arc<Scaler>),
    /// Rate of change of a gate's area
    Gate(Arc<Gate>),
    /// Value computed by the sort routine's `monitor` callback
    Custom,
}

#[derive(Debug, Clone, Copy, Default)]
struct MonitorState {
    value: f64,
    previous: f64,
}

/// Monitor is a periodically recomputed value shown to the operator, typically a rate.
///
/// The value and the previous raw reading are updated together under one lock so a
/// concurrent reader never sees a rate paired with the wrong baseline.
#[derive(Debug)]
pub struct Monitor {
    name: String,
    group: String,
    source: MonitorSource,
    state: Mutex<MonitorState>,
    range: Mutex<(f64, f64)>,
    alarm: AtomicBool,
}

impl Monitor {
    pub(crate) fn new(name: &str, group: &str, source: MonitorSource) -> Self {
        Self {
            name: name.to_string(),
            group: group.to_string(),
            source,
            state: Mutex::new(MonitorState::default()),
            range: Mutex::new((0.0, f64::MAX)),
            alarm: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn source(&self) -> &MonitorSource {
        &self.source
    }

    pub fn value(&self) -> f64 {
        self.state.lock().value
    }

    /// Raw reading remembered from the last update (scaler and gate monitors)
    pub fn previous(&self) -> f64 {
        self.state.lock().previous
    }

    /// Recompute the value.
    ///
    /// Scaler and gate monitors compute `(current - previous) / interval`; custom monitors
    /// take whatever the routine reports. `interval` must be positive.
    pub fn update(&self, interval: f64, routine: Option<&dyn SortRoutine>) {
        debug_assert!(interval > 0.0);
        let current = match &self.source {
            MonitorSource::Scaler(scaler) => scaler.value() as f64,
            MonitorSource::Gate(gate) => gate.area(),
            MonitorSource::Custom => {
                if let Some(r) = routine {
                    let value = r.monitor(&self.name);
                    self.state.lock().value = value;
                }
                return;
            }
        };
        let mut state = self.state.lock();
        state.value = (current - state.previous) / interval;
        state.previous = current;
    }

    /// Forget the previous reading, e.g. after scalers were zeroed for a new run
    pub fn reset(&self) {
        *self.state.lock() = MonitorState::default();
    }

    pub fn threshold(&self) -> f64 {
        self.range.lock().0
    }

    pub fn maximum(&self) -> f64 {
        self.range.lock().1
    }

    pub fn set_range(&self, threshold: f64, maximum: f64) {
        *self.range.lock() = (threshold.min(maximum), threshold.max(maximum));
    }

    pub fn alarm(&self) -> bool {
        self.alarm.load(Ordering::Relaxed)
    }

    pub fn set_alarm(&self, alarm: bool) {
        self.alarm.store(alarm, Ordering::Relaxed);
    }

    /// True if the value lies within [threshold, maximum]
    pub fn is_acceptable(&self) -> bool {
        let (threshold, maximum) = *self.range.lock();
        let value = self.value();
        value >= threshold && value <= maximum
    }
}
