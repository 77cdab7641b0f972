use parking_lot::Mutex;
use std::sync::Arc;

use crate::calibration::CalibrationFunction;
use crate::error::SortError;
use crate::histogram::{Histogram1D, NumericKind};
use crate::monitor::MonitorSource;
use crate::parameter_map::Parameter;
use crate::scaler::Scaler;
use crate::sort_routine::{Event, SortRoutine, SortSetup};

const DEAD_TIME_MONITOR: &str = "Dead time";
/// Nominal gain of the Ge spectrum, keV per channel
const GE_GAIN: f64 = 0.5;

#[derive(Debug)]
struct Spectra {
    energy: Parameter,
    ge_singles: Histogram1D,
    ge: Arc<Scaler>,
    accept: Arc<Scaler>,
}

/// DeadTimeSort sorts a germanium energy and reports the acquisition dead time.
///
/// The hardware scaler block carries the raw Ge trigger count at index 0 and the accepted
/// trigger count at index 1. The custom monitor `Dead time` is the percentage of triggers
/// lost since the last tick: `100 * (1 - dAccept / dGe)`. The Ge spectrum starts with a
/// linear calibration at the nominal gain.
#[derive(Debug, Default)]
pub struct DeadTimeSort {
    spectra: Option<Spectra>,
    // Scaler values (Ge, Accept) seen at the last dead time computation
    last: Mutex<(i64, i64)>,
}

impl DeadTimeSort {
    pub const NAME: &'static str = "DeadTimeSort";

    pub fn new() -> Self {
        Self::default()
    }

    fn dead_time(&self, ge: &Scaler, accept: &Scaler) -> f64 {
        let (ge, accept) = (ge.value(), accept.value());
        let mut last = self.last.lock();
        let (last_ge, last_accept) = *last;
        *last = (ge, accept);
        if ge < last_ge || accept < last_accept {
            spdlog::debug!("Dead time scalers went backwards; assuming a reset");
            return 0.0;
        }
        let delta_ge = ge - last_ge;
        let delta_accept = accept - last_accept;
        if delta_ge == 0 {
            return 0.0;
        }
        100.0 * (1.0 - delta_accept as f64 / delta_ge as f64)
    }
}

impl SortRoutine for DeadTimeSort {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&mut self, setup: &mut SortSetup<'_>) -> Result<(), SortError> {
        let energy = setup.event_parameter(5, 0, 10)?;
        let ge_singles = setup.histogram_1d("Ge", 4096, NumericKind::Integer)?;
        ge_singles.set_axis_labels("Energy (channel)", "Counts");
        let mut calibration = CalibrationFunction::polynomial(2)?;
        calibration.set_coefficients(&[0.0, GE_GAIN])?;
        ge_singles.set_calibration(Some(calibration))?;

        let ge = setup.scaler("Ge", 0)?;
        let accept = setup.scaler("Accept", 1)?;
        setup.monitor("Ge rate", MonitorSource::Scaler(ge.clone()))?;
        setup.monitor("Accept rate", MonitorSource::Scaler(accept.clone()))?;
        let dead_time = setup.monitor(DEAD_TIME_MONITOR, MonitorSource::Custom)?;
        dead_time.set_range(0.0, 50.0);
        dead_time.set_alarm(true);

        *self.last.get_mut() = (0, 0);
        self.spectra = Some(Spectra {
            energy,
            ge_singles,
            ge,
            accept,
        });
        Ok(())
    }

    fn sort(&self, event: &Event<'_>) {
        if let Some(s) = &self.spectra {
            s.ge_singles.inc(event.get(s.energy));
        }
    }

    fn monitor(&self, name: &str) -> f64 {
        match (&self.spectra, name) {
            (Some(s), DEAD_TIME_MONITOR) => self.dead_time(&s.ge, &s.accept),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor_timer::tick;
    use crate::session::Session;
    use crate::sorter::Sorter;

    #[test]
    fn test_dead_time_monitor() {
        let session = Arc::new(Session::new());
        let sorter = Sorter::activate(session.clone(), Box::new(DeadTimeSort::new())).unwrap();
        session.set_monitor_interval(3.0).unwrap();
        let routine = sorter.routine();
        let mut block = vec![vec![1500i64, 1300], vec![1000, 900]];
        let mut source = move || block.pop();

        tick(&session, Some(routine.as_ref()), Some(&mut source)).unwrap();
        let dead_time = session.monitor(DEAD_TIME_MONITOR).unwrap();
        assert!((dead_time.value() - 10.0).abs() < 1e-9);

        tick(&session, Some(routine.as_ref()), Some(&mut source)).unwrap();
        assert!((dead_time.value() - 20.0).abs() < 1e-9);
        assert!(dead_time.is_acceptable());
        let ge_rate = session.monitor("Ge rate").unwrap().value();
        assert!((ge_rate - 500.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_dead_time_reset_and_idle() {
        let session = Arc::new(Session::new());
        let sorter = Sorter::activate(session.clone(), Box::new(DeadTimeSort::new())).unwrap();
        let routine = sorter.routine();
        session.update_scalers(&[1000, 900]);
        assert!((routine.monitor(DEAD_TIME_MONITOR) - 10.0).abs() < 1e-9);

        // no new triggers
        assert_eq!(routine.monitor(DEAD_TIME_MONITOR), 0.0);

        session.zero_scalers();
        assert_eq!(routine.monitor(DEAD_TIME_MONITOR), 0.0);
        session.update_scalers(&[100, 50]);
        assert!((routine.monitor(DEAD_TIME_MONITOR) - 50.0).abs() < 1e-9);
        assert_eq!(routine.monitor("unknown"), 0.0);
    }

    #[test]
    fn test_sorts_energy() {
        let session = Arc::new(Session::new());
        let mut sorter =
            Sorter::activate(session.clone(), Box::new(DeadTimeSort::new())).unwrap();
        sorter.sort_event(&[1332]);
        sorter.sort_event(&[1173, 42]);
        assert_eq!(session.histogram("Ge").unwrap().area(), 2.0);
        assert_eq!(session.histogram("Ge").unwrap().count_at(1332, 0), 1.0);

        let calibration = session.histogram("Ge").unwrap().calibration().unwrap();
        assert!((calibration.value(1332.0) - 666.0).abs() < 1e-9);
    }
}
