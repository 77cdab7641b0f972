use std::sync::Arc;

use super::compression::Compressor;
use super::error::{
    CompressionError, GateError, HistogramError, MonitorError, ParameterError, RegistryError,
    SortError,
};
use super::gate::{Gate1D, Gate2D};
use super::histogram::{Histogram1D, Histogram2D, NumericKind};
use super::monitor::{Monitor, MonitorSource};
use super::parameter_map::{Parameter, ParameterMap};
use super::scaler::Scaler;
use super::session::Session;

/// One raw event: a fixed-size array with one word per declared parameter
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    words: &'a [i32],
}

impl<'a> Event<'a> {
    pub fn new(words: &'a [i32]) -> Self {
        Self { words }
    }

    /// Value of a parameter in this event.
    ///
    /// An index past the end of the event is a bug in the routine; it panics in debug
    /// builds and reads as 0 otherwise.
    #[inline]
    pub fn get(&self, parameter: Parameter) -> i32 {
        debug_assert!(
            parameter.index() < self.words.len(),
            "parameter index {} is outside an event of {} words",
            parameter.index(),
            self.words.len()
        );
        self.words.get(parameter.index()).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[i32] {
        self.words
    }
}

/// SortSetup is handed to a routine during initialization. Everything created through it
/// is registered in the session under the routine's group, so a routine that fails to
/// initialize can be removed as a whole.
#[derive(Debug)]
pub struct SortSetup<'a> {
    session: &'a Session,
    group: String,
    parameters: ParameterMap,
}

impl<'a> SortSetup<'a> {
    pub(crate) fn new(session: &'a Session, group: &str) -> Self {
        Self {
            session,
            group: group.to_string(),
            parameters: ParameterMap::new(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn session(&self) -> &Session {
        self.session
    }

    pub fn parameters(&self) -> &ParameterMap {
        &self.parameters
    }

    pub(crate) fn into_parameters(self) -> ParameterMap {
        self.parameters
    }

    /// Declare the signal read from (`slot`, `channel`) and get its index in each event
    pub fn event_parameter(
        &mut self,
        slot: u8,
        channel: u8,
        threshold: i32,
    ) -> Result<Parameter, ParameterError> {
        self.parameters.event_parameter(slot, channel, threshold)
    }

    pub fn histogram_1d(
        &self,
        name: &str,
        size: usize,
        kind: NumericKind,
    ) -> Result<Histogram1D, HistogramError> {
        self.session
            .create_histogram_1d(&self.group, name, size, kind)
    }

    pub fn histogram_2d(
        &self,
        name: &str,
        size_x: usize,
        size_y: usize,
        kind: NumericKind,
    ) -> Result<Histogram2D, HistogramError> {
        self.session
            .create_histogram_2d(&self.group, name, size_x, size_y, kind)
    }

    pub fn gate_1d(&self, name: &str, histogram: &Histogram1D) -> Result<Gate1D, GateError> {
        self.session.create_gate_1d(name, histogram)
    }

    pub fn gate_2d(&self, name: &str, histogram: &Histogram2D) -> Result<Gate2D, GateError> {
        self.session.create_gate_2d(name, histogram)
    }

    pub fn scaler(&self, name: &str, index: usize) -> Result<Arc<Scaler>, RegistryError> {
        self.session.create_scaler(&self.group, name, index)
    }

    pub fn monitor(&self, name: &str, source: MonitorSource) -> Result<Arc<Monitor>, MonitorError> {
        self.session.create_monitor(&self.group, name, source)
    }

    pub fn compressor(
        &self,
        raw_range: u32,
        display_range: u32,
    ) -> Result<Compressor, CompressionError> {
        Compressor::new(raw_range, display_range)
    }
}

/// The per-experiment processing unit.
///
/// `initialize` is called exactly once, before any event, and declares the routine's
/// parameters and spectra. `sort` is then called once per event from the sort thread,
/// while `monitor` may be called concurrently from the monitor timer, so routines keep
/// any mutable bookkeeping behind interior mutability.
pub trait SortRoutine: Send + Sync {
    /// Name of the routine, also the group of everything it registers
    fn name(&self) -> &str;

    fn initialize(&mut self, setup: &mut SortSetup<'_>) -> Result<(), SortError>;

    /// Process one event. Never fails; out of range values are clamped by the histograms
    fn sort(&self, event: &Event<'_>);

    /// Value of a custom monitor
    fn monitor(&self, _name: &str) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_get() {
        let mut map = ParameterMap::new();
        let a = map.event_parameter(1, 0, 0).unwrap();
        let b = map.event_parameter(1, 1, 0).unwrap();
        let words = [17, -4];
        let event = Event::new(&words);
        assert_eq!(event.get(a), 17);
        assert_eq!(event.get(b), -4);
        assert_eq!(event.len(), 2);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic)]
    fn test_event_index_past_end() {
        let mut map = ParameterMap::new();
        map.event_parameter(1, 0, 0).unwrap();
        let beyond = map.event_parameter(1, 1, 0).unwrap();
        let words = [17];
        assert_eq!(Event::new(&words).get(beyond), 0);
    }

    #[test]
    fn test_setup_registers_under_group() {
        let session = Session::new();
        let mut setup = SortSetup::new(&session, "routine");
        setup.event_parameter(2, 0, 10).unwrap();
        let hist = setup.histogram_1d("E", 128, NumericKind::Integer).unwrap();
        setup.gate_1d("peak", &hist).unwrap();
        setup.scaler("Clock", 0).unwrap();
        assert_eq!(setup.compressor(4096, 512).unwrap().shift(), 3);
        assert_eq!(setup.parameters().event_size(), 1);

        assert_eq!(session.histograms_in_group("routine").len(), 1);
        assert_eq!(session.gate("peak").unwrap().group(), "routine");
        assert_eq!(session.scaler("Clock").unwrap().group(), "routine");
    }
}
