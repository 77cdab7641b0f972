use std::sync::Arc;

use crate::compression::Compressor;
use crate::constants::HARDWARE_SCALER_BLOCK;
use crate::error::SortError;
use crate::gate::{Gate1D, Gate2D};
use crate::histogram::{Histogram1D, Histogram2D, NumericKind};
use crate::monitor::MonitorSource;
use crate::parameter_map::Parameter;
use crate::scaler::Scaler;
use crate::sort_routine::{Event, SortRoutine, SortSetup};

const RAW_RANGE: u32 = 2048;
const DISPLAY_RANGE: u32 = 256;

/// Handles created during initialization
#[derive(Debug)]
struct Spectra {
    energy: Parameter,
    other: Parameter,
    compressor: Compressor,
    e_singles: Histogram1D,
    other_singles: Histogram1D,
    e_vs_other: Histogram2D,
    sum_gated: Histogram1D,
    other_and: Histogram1D,
    other_or: Histogram1D,
    pid: Gate2D,
    e_peak: Gate1D,
    events: Arc<Scaler>,
}

/// SpectrumSort is a two-parameter singles and particle-identification sort.
///
/// Parameters: an energy signal `E` and a second signal `Other` from the same module.
/// - `E`, `Other`: raw singles, 2048 channels
/// - `EvsOther`: 256 x 256, both axes compressed from 2048 channels
/// - `sumGate`: E + Other for events inside the 2-D gate `PID` on `EvsOther`
/// - `OtherAnd`, `OtherOr`: Other for events inside both / either of `Epeak` (on `E`)
///   and `PID`
///
/// Gates start undefined and are set by the operator. Accepted events are counted in the
/// software scaler `Events`, placed just past the hardware scaler block so scaler
/// snapshots do not overwrite it.
#[derive(Debug, Default)]
pub struct SpectrumSort {
    spectra: Option<Spectra>,
}

impl SpectrumSort {
    pub const NAME: &'static str = "SpectrumSort";

    pub fn new() -> Self {
        Self::default()
    }
}

impl SortRoutine for SpectrumSort {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&mut self, setup: &mut SortSetup<'_>) -> Result<(), SortError> {
        let energy = setup.event_parameter(3, 0, 20)?;
        let other = setup.event_parameter(3, 1, 20)?;
        let compressor = setup.compressor(RAW_RANGE, DISPLAY_RANGE)?;

        let size = RAW_RANGE as usize;
        let display = DISPLAY_RANGE as usize;
        let e_singles = setup.histogram_1d("E", size, NumericKind::Integer)?;
        e_singles.set_axis_labels("E (channel)", "Counts");
        let other_singles = setup.histogram_1d("Other", size, NumericKind::Integer)?;
        let e_vs_other = setup.histogram_2d("EvsOther", display, display, NumericKind::Integer)?;
        e_vs_other.set_title("E vs Other, compressed");
        e_vs_other.set_axis_labels("E / 8", "Other / 8");
        let sum_gated = setup.histogram_1d("sumGate", size, NumericKind::Integer)?;
        let other_and = setup.histogram_1d("OtherAnd", size, NumericKind::Integer)?;
        let other_or = setup.histogram_1d("OtherOr", size, NumericKind::Integer)?;

        let pid = setup.gate_2d("PID", &e_vs_other)?;
        let e_peak = setup.gate_1d("Epeak", &e_singles)?;

        let events = setup.scaler("Events", HARDWARE_SCALER_BLOCK)?;
        setup.monitor("Event rate", MonitorSource::Scaler(events.clone()))?;
        setup.monitor("PID rate", MonitorSource::Gate(pid.gate().clone()))?;

        self.spectra = Some(Spectra {
            energy,
            other,
            compressor,
            e_singles,
            other_singles,
            e_vs_other,
            sum_gated,
            other_and,
            other_or,
            pid,
            e_peak,
            events,
        });
        Ok(())
    }

    fn sort(&self, event: &Event<'_>) {
        let Some(s) = &self.spectra else {
            return;
        };
        let e = event.get(s.energy);
        let other = event.get(s.other);

        s.e_singles.inc(e);
        s.other_singles.inc(other);

        let ce = s.compressor.compress(e);
        let cother = s.compressor.compress(other);
        s.e_vs_other.inc(ce, cother);

        let in_pid = s.pid.in_gate(ce, cother);
        let in_peak = s.e_peak.in_gate(e);
        if in_pid {
            s.sum_gated.inc(e + other);
        }
        if in_pid && in_peak {
            s.other_and.inc(other);
        }
        if in_pid || in_peak {
            s.other_or.inc(other);
        }
        s.events.increment();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor_timer::tick;
    use crate::session::Session;
    use crate::sorter::Sorter;

    fn activate() -> (Arc<Session>, Sorter) {
        let session = Arc::new(Session::new());
        let sorter = Sorter::activate(session.clone(), Box::new(SpectrumSort::new())).unwrap();
        (session, sorter)
    }

    #[test]
    fn test_gated_sum() {
        let (session, mut sorter) = activate();
        let pid = session.gate("PID").unwrap().as_2d().unwrap();
        pid.set_limits(&[(20, 5), (30, 5), (30, 10), (20, 10)]).unwrap();

        sorter.sort_event(&[100, 5]);
        sorter.sort_event(&[200, 60]);

        let e = session.histogram("E").unwrap();
        assert_eq!(e.area(), 2.0);
        assert_eq!(e.count_at(100, 0), 1.0);
        let sum = session.histogram("sumGate").unwrap();
        assert_eq!(sum.area(), 1.0);
        assert_eq!(sum.count_at(260, 0), 1.0);
        let matrix = session.histogram("EvsOther").unwrap();
        assert_eq!(matrix.count_at(25, 7), 1.0);
        assert_eq!(matrix.count_at(12, 0), 1.0);
        assert_eq!(session.scaler("Events").unwrap().value(), 2);
    }

    #[test]
    fn test_gate_logic() {
        let (session, mut sorter) = activate();
        session
            .gate("PID")
            .unwrap()
            .as_2d()
            .unwrap()
            .set_limits(&[(20, 5), (30, 5), (30, 10), (20, 10)])
            .unwrap();
        session.gate("Epeak").unwrap().as_1d().unwrap().set_limits(90, 110);

        sorter.sort_event(&[100, 5]); // peak only
        sorter.sort_event(&[200, 60]); // PID only
        sorter.sort_event(&[500, 500]); // neither

        assert_eq!(session.histogram("OtherAnd").unwrap().area(), 0.0);
        assert_eq!(session.histogram("OtherOr").unwrap().area(), 2.0);
        assert_eq!(session.histogram("Other").unwrap().area(), 3.0);
    }

    #[test]
    fn test_undefined_gates_reject() {
        let (session, mut sorter) = activate();
        sorter.sort_event(&[200, 60]);
        assert_eq!(session.histogram("sumGate").unwrap().area(), 0.0);
        assert_eq!(session.histogram("OtherOr").unwrap().area(), 0.0);
    }

    #[test]
    fn test_event_count_survives_scaler_snapshots() {
        let (session, mut sorter) = activate();
        session.set_monitor_interval(2.0).unwrap();
        let routine = sorter.routine();
        for _ in 0..6 {
            sorter.sort_event(&[100, 5]);
        }
        let mut source = || Some(vec![-1i64; HARDWARE_SCALER_BLOCK + 8]);
        tick(&session, Some(routine.as_ref()), Some(&mut source)).unwrap();

        assert_eq!(session.scaler("Events").unwrap().value(), 6);
        assert_eq!(session.monitor("Event rate").unwrap().value(), 3.0);
    }
}
