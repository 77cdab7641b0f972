use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use super::constants::{FIRST_OBJECT_NUMBER, HARDWARE_SCALER_BLOCK, MAX_NAME_LENGTH};
use super::error::{GateError, HistogramError, MonitorError, RegistryError};
use super::gate::{Gate, Gate1D, Gate2D};
use super::histogram::{
    Dimension, Histogram, Histogram1D, Histogram2D, HistogramType, NumericKind,
};
use super::monitor::{Monitor, MonitorSource};
use super::scaler::Scaler;
use super::sort_routine::SortRoutine;

/// Anything stored in a registry
trait Registered {
    fn name(&self) -> &str;
    fn group(&self) -> &str;
}

impl Registered for Histogram {
    fn name(&self) -> &str {
        Histogram::name(self)
    }
    fn group(&self) -> &str {
        Histogram::group(self)
    }
}

impl Registered for Gate {
    fn name(&self) -> &str {
        Gate::name(self)
    }
    fn group(&self) -> &str {
        Gate::group(self)
    }
}

impl Registered for Scaler {
    fn name(&self) -> &str {
        Scaler::name(self)
    }
    fn group(&self) -> &str {
        Scaler::group(self)
    }
}

impl Registered for Monitor {
    fn name(&self) -> &str {
        Monitor::name(self)
    }
    fn group(&self) -> &str {
        Monitor::group(self)
    }
}

/// Name-keyed collection which remembers insertion order and hands out numbers
#[derive(Debug)]
struct Registry<T> {
    kind: &'static str,
    by_name: FxHashMap<String, Arc<T>>,
    ordered: Vec<Arc<T>>,
    next_number: usize,
}

impl<T: Registered> Registry<T> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            by_name: FxHashMap::default(),
            ordered: Vec::new(),
            next_number: FIRST_OBJECT_NUMBER,
        }
    }

    /// Check a name is usable and return the number the next object will get
    fn reserve(&self, name: &str) -> Result<usize, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(RegistryError::NameTooLong(name.to_string()));
        }
        if self.by_name.contains_key(name) {
            return Err(RegistryError::DuplicateName(name.to_string(), self.kind));
        }
        Ok(self.next_number)
    }

    fn insert(&mut self, item: T) -> Arc<T> {
        let item = Arc::new(item);
        self.by_name.insert(item.name().to_string(), item.clone());
        self.ordered.push(item.clone());
        self.next_number += 1;
        item
    }

    fn get(&self, name: &str) -> Option<Arc<T>> {
        self.by_name.get(name).cloned()
    }

    fn list(&self) -> Vec<Arc<T>> {
        self.ordered.clone()
    }

    fn remove_group(&mut self, group: &str) -> Vec<Arc<T>> {
        let (removed, kept): (Vec<Arc<T>>, Vec<Arc<T>>) =
            self.ordered.drain(..).partition(|item| item.group() == group);
        self.ordered = kept;
        for item in removed.iter() {
            self.by_name.remove(item.name());
        }
        removed
    }

    fn clear(&mut self) {
        self.by_name.clear();
        self.ordered.clear();
        self.next_number = FIRST_OBJECT_NUMBER;
    }
}

/// Session owns every histogram, gate, scaler and monitor of a running analysis.
///
/// Sort routines register their objects here during initialization, and the display,
/// fitting and persistence layers look them up by name or number. All methods take
/// `&self`, so a session is shared between the sort thread, the monitor timer and any
/// readers through an `Arc`. Registry locks are only taken on lookups and registration,
/// never on the per-event path, which works through the handles returned at creation.
#[derive(Debug)]
pub struct Session {
    histograms: RwLock<Registry<Histogram>>,
    gates: RwLock<Registry<Gate>>,
    scalers: RwLock<Registry<Scaler>>,
    monitors: RwLock<Registry<Monitor>>,
    monitor_interval: RwLock<Option<f64>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            histograms: RwLock::new(Registry::new("histogram")),
            gates: RwLock::new(Registry::new("gate")),
            scalers: RwLock::new(Registry::new("scaler")),
            monitors: RwLock::new(Registry::new("monitor")),
            monitor_interval: RwLock::new(None),
        }
    }

    fn create_histogram(
        &self,
        group: &str,
        name: &str,
        hist_type: HistogramType,
        size_x: usize,
        size_y: usize,
    ) -> Result<Arc<Histogram>, HistogramError> {
        let mut registry = self.histograms.write();
        let number = registry.reserve(name)?;
        let hist = Histogram::new(name, number, group, hist_type, size_x, size_y)?;
        spdlog::debug!("Created histogram {} (#{}) with type {:?}", name, number, hist_type);
        Ok(registry.insert(hist))
    }

    /// Create and register a 1-D histogram
    pub fn create_histogram_1d(
        &self,
        group: &str,
        name: &str,
        size: usize,
        kind: NumericKind,
    ) -> Result<Histogram1D, HistogramError> {
        let hist_type = HistogramType::new(Dimension::One, kind);
        let hist = self.create_histogram(group, name, hist_type, size, 1)?;
        Ok(Histogram1D::from_registered(hist))
    }

    /// Create and register a 2-D histogram
    pub fn create_histogram_2d(
        &self,
        group: &str,
        name: &str,
        size_x: usize,
        size_y: usize,
        kind: NumericKind,
    ) -> Result<Histogram2D, HistogramError> {
        let hist_type = HistogramType::new(Dimension::Two, kind);
        let hist = self.create_histogram(group, name, hist_type, size_x, size_y)?;
        Ok(Histogram2D::from_registered(hist))
    }

    pub fn histogram(&self, name: &str) -> Option<Arc<Histogram>> {
        self.histograms.read().get(name)
    }

    pub fn histogram_by_number(&self, number: usize) -> Option<Arc<Histogram>> {
        self.histograms
            .read()
            .ordered
            .iter()
            .find(|h| h.number() == number)
            .cloned()
    }

    /// All histograms in creation order
    pub fn histograms(&self) -> Vec<Arc<Histogram>> {
        self.histograms.read().list()
    }

    pub fn histograms_in_group(&self, group: &str) -> Vec<Arc<Histogram>> {
        self.histograms
            .read()
            .ordered
            .iter()
            .filter(|h| h.group() == group)
            .cloned()
            .collect()
    }

    fn create_gate(&self, name: &str, histogram: &Arc<Histogram>) -> Result<Arc<Gate>, GateError> {
        let mut registry = self.gates.write();
        let number = registry.reserve(name)?;
        let gate = Gate::new(name, number, histogram.clone());
        histogram.add_gate(&gate)?;
        spdlog::debug!("Created gate {} on histogram {}", name, histogram.name());
        Ok(registry.insert(gate))
    }

    /// Create a gate permanently bound to a 1-D histogram
    pub fn create_gate_1d(&self, name: &str, histogram: &Histogram1D) -> Result<Gate1D, GateError> {
        let gate = self.create_gate(name, histogram.histogram())?;
        Ok(Gate1D::from_registered(gate))
    }

    /// Create a gate permanently bound to a 2-D histogram
    pub fn create_gate_2d(&self, name: &str, histogram: &Histogram2D) -> Result<Gate2D, GateError> {
        let gate = self.create_gate(name, histogram.histogram())?;
        Ok(Gate2D::from_registered(gate))
    }

    pub fn gate(&self, name: &str) -> Option<Arc<Gate>> {
        self.gates.read().get(name)
    }

    pub fn gates(&self) -> Vec<Arc<Gate>> {
        self.gates.read().list()
    }

    /// Gates bound to the named histogram
    pub fn gates_for(&self, histogram: &str) -> Vec<Arc<Gate>> {
        self.gates
            .read()
            .ordered
            .iter()
            .filter(|g| g.histogram().name() == histogram)
            .cloned()
            .collect()
    }

    /// Create a scaler at position `index` of the hardware scaler block
    pub fn create_scaler(
        &self,
        group: &str,
        name: &str,
        index: usize,
    ) -> Result<Arc<Scaler>, RegistryError> {
        let mut registry = self.scalers.write();
        registry.reserve(name)?;
        if registry.ordered.iter().any(|s| s.index() == index) {
            return Err(RegistryError::DuplicateNumber(index, registry.kind));
        }
        Ok(registry.insert(Scaler::new(name, index, group)))
    }

    pub fn scaler(&self, name: &str) -> Option<Arc<Scaler>> {
        self.scalers.read().get(name)
    }

    /// All scalers, ordered by block index
    pub fn scalers(&self) -> Vec<Arc<Scaler>> {
        let mut scalers = self.scalers.read().list();
        scalers.sort_by_key(|s| s.index());
        scalers
    }

    /// Overwrite every registered scaler with the entry of `values` at its index.
    ///
    /// Entries past the registered scalers are ignored, and scalers whose index is past
    /// the end of `values` keep their value.
    pub fn update_scalers(&self, values: &[i64]) {
        let values = &values[..values.len().min(HARDWARE_SCALER_BLOCK)];
        for scaler in self.scalers.read().ordered.iter() {
            if let Some(value) = values.get(scaler.index()) {
                scaler.set_value(*value);
            }
        }
    }

    /// Zero every scaler and forget the monitors' previous readings
    pub fn zero_scalers(&self) {
        for scaler in self.scalers.read().ordered.iter() {
            scaler.zero();
        }
        for monitor in self.monitors.read().ordered.iter() {
            monitor.reset();
        }
    }

    pub fn create_monitor(
        &self,
        group: &str,
        name: &str,
        source: MonitorSource,
    ) -> Result<Arc<Monitor>, MonitorError> {
        let mut registry = self.monitors.write();
        registry.reserve(name)?;
        Ok(registry.insert(Monitor::new(name, group, source)))
    }

    pub fn monitor(&self, name: &str) -> Option<Arc<Monitor>> {
        self.monitors.read().get(name)
    }

    pub fn monitors(&self) -> Vec<Arc<Monitor>> {
        self.monitors.read().list()
    }

    /// Set the interval shared by all monitors. Takes effect on the next update.
    pub fn set_monitor_interval(&self, seconds: f64) -> Result<(), MonitorError> {
        if !(seconds > 0.0 && seconds.is_finite()) {
            return Err(MonitorError::InvalidInterval(seconds));
        }
        *self.monitor_interval.write() = Some(seconds);
        Ok(())
    }

    pub fn monitor_interval(&self) -> Option<f64> {
        *self.monitor_interval.read()
    }

    /// Update every monitor once. Custom monitors ask `routine`.
    pub fn update_monitors(&self, routine: Option<&dyn SortRoutine>) -> Result<(), MonitorError> {
        let interval = self.monitor_interval().ok_or(MonitorError::IntervalNotSet)?;
        for monitor in self.monitors.read().ordered.iter() {
            monitor.update(interval, routine);
        }
        Ok(())
    }

    /// Zero the counts of every histogram
    pub fn zero_histograms(&self) {
        for hist in self.histograms.read().ordered.iter() {
            hist.zero();
        }
    }

    /// Remove everything registered by one sort routine
    pub fn remove_group(&self, group: &str) {
        let gates = self.gates.write().remove_group(group);
        for gate in gates.iter() {
            gate.histogram().remove_gate(gate.name());
        }
        let n_hists = self.histograms.write().remove_group(group).len();
        let n_scalers = self.scalers.write().remove_group(group).len();
        let n_monitors = self.monitors.write().remove_group(group).len();
        spdlog::info!(
            "Removed group {}: {} histograms, {} gates, {} scalers, {} monitors",
            group,
            n_hists,
            gates.len(),
            n_scalers,
            n_monitors
        );
    }

    /// True if anything is registered under `group`
    pub fn has_group(&self, group: &str) -> bool {
        self.histograms.read().ordered.iter().any(|h| h.group() == group)
            || self.scalers.read().ordered.iter().any(|s| s.group() == group)
            || self.monitors.read().ordered.iter().any(|m| m.group() == group)
    }

    /// Remove everything and restart numbering
    pub fn clear(&self) {
        self.monitors.write().clear();
        self.gates.write().clear();
        self.scalers.write().clear();
        self.histograms.write().clear();
        *self.monitor_interval.write() = None;
        spdlog::info!("Cleared all histograms, gates, scalers and monitors");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_monitor_rate() {
        let session = Session::new();
        let e = session
            .create_histogram_1d("sort", "E", 256, NumericKind::Integer)
            .unwrap();
        let peak = session.create_gate_1d("peak", &e).unwrap();
        peak.set_limits(100, 120);
        let rate = session
            .create_monitor("sort", "peak rate", MonitorSource::Gate(peak.gate().clone()))
            .unwrap();
        session.set_monitor_interval(2.0).unwrap();

        for _ in 0..10 {
            e.inc(110);
        }
        e.inc(5);
        session.update_monitors(None).unwrap();
        assert_eq!(rate.value(), 5.0);
        assert_eq!(rate.previous(), 10.0);

        for _ in 0..4 {
            e.inc(100);
        }
        e.inc(200);
        session.update_monitors(None).unwrap();
        assert_eq!(rate.value(), 2.0);
        assert_eq!(rate.previous(), 14.0);
    }

    #[test]
    fn test_new_interval_applies_from_next_update() {
        let session = Session::new();
        let clock = session.create_scaler("sort", "Clock", 0).unwrap();
        let rate = session
            .create_monitor("sort", "Clock rate", MonitorSource::Scaler(clock.clone()))
            .unwrap();
        session.set_monitor_interval(1.0).unwrap();
        clock.set_value(600);
        session.update_monitors(None).unwrap();
        assert_eq!(rate.value(), 600.0);

        // Changing the interval leaves the stored value alone
        session.set_monitor_interval(3.0).unwrap();
        assert_eq!(rate.value(), 600.0);
        assert_eq!(rate.previous(), 600.0);

        clock.set_value(900);
        session.update_monitors(None).unwrap();
        assert_eq!(rate.value(), 100.0);
    }

    #[test]
    fn test_histogram_registry() {
        let session = Session::new();
        let e = session
            .create_histogram_1d("sort", "E", 2048, NumericKind::Integer)
            .unwrap();
        let pid = session
            .create_histogram_2d("sort", "PID", 256, 256, NumericKind::Double)
            .unwrap();
        assert_eq!(e.number(), 1);
        assert_eq!(pid.number(), 2);
        assert_eq!(session.histogram("PID").unwrap().size_x(), 256);
        assert_eq!(session.histogram_by_number(1).unwrap().name(), "E");
        let names: Vec<String> = session
            .histograms()
            .iter()
            .map(|h| h.name().to_string())
            .collect();
        assert_eq!(names, vec!["E", "PID"]);
    }

    #[test]
    fn test_name_rules() {
        let session = Session::new();
        session
            .create_histogram_1d("sort", "E", 16, NumericKind::Integer)
            .unwrap();
        assert_eq!(
            session
                .create_histogram_1d("sort", "E", 16, NumericKind::Integer)
                .unwrap_err(),
            HistogramError::Registry(RegistryError::DuplicateName(
                String::from("E"),
                "histogram"
            ))
        );
        assert!(matches!(
            session.create_histogram_1d(
                "sort",
                "a-name-much-too-long-to-register",
                16,
                NumericKind::Integer
            ),
            Err(HistogramError::Registry(RegistryError::NameTooLong(_)))
        ));
        assert!(session
            .create_histogram_1d("sort", "", 16, NumericKind::Integer)
            .is_err());
    }

    #[test]
    fn test_gates_bind_to_histograms() {
        let session = Session::new();
        let e = session
            .create_histogram_1d("sort", "E", 64, NumericKind::Integer)
            .unwrap();
        let gate = session.create_gate_1d("peak", &e).unwrap();
        assert_eq!(gate.histogram().name(), "E");
        assert_eq!(e.gate_names(), vec![String::from("peak")]);
        assert_eq!(session.gates_for("E").len(), 1);
        assert!(session.gate("peak").unwrap().as_2d().is_none());
        assert!(session.create_gate_1d("peak", &e).is_err());
    }

    #[test]
    fn test_scalers_update() {
        let session = Session::new();
        let ge = session.create_scaler("sort", "Ge", 0).unwrap();
        let accept = session.create_scaler("sort", "Accept", 1).unwrap();
        assert!(session.create_scaler("sort", "Other", 1).is_err());
        session.update_scalers(&[10, 20, 30, 40]);
        assert_eq!(ge.value(), 10);
        assert_eq!(accept.value(), 20);
        session.update_scalers(&[11]);
        assert_eq!(ge.value(), 11);
        assert_eq!(accept.value(), 20);
        session.zero_scalers();
        assert_eq!(accept.value(), 0);
    }

    #[test]
    fn test_monitor_interval() {
        let session = Session::new();
        let clock = session.create_scaler("sort", "Clock", 0).unwrap();
        let monitor = session
            .create_monitor("sort", "Clock rate", MonitorSource::Scaler(clock.clone()))
            .unwrap();
        assert_eq!(session.update_monitors(None), Err(MonitorError::IntervalNotSet));
        assert_eq!(
            session.set_monitor_interval(0.0),
            Err(MonitorError::InvalidInterval(0.0))
        );
        session.set_monitor_interval(5.0).unwrap();
        clock.set_value(100);
        session.update_monitors(None).unwrap();
        assert_eq!(monitor.value(), 20.0);
    }

    #[test]
    fn test_remove_group_and_clear() {
        let session = Session::new();
        let a = session
            .create_histogram_1d("first", "A", 8, NumericKind::Integer)
            .unwrap();
        session.create_gate_1d("ga", &a).unwrap();
        session
            .create_histogram_1d("second", "B", 8, NumericKind::Integer)
            .unwrap();
        session.create_scaler("first", "S", 0).unwrap();
        assert!(session.has_group("first"));
        session.remove_group("first");
        assert!(!session.has_group("first"));
        assert!(session.histogram("A").is_none());
        assert!(session.gate("ga").is_none());
        assert!(session.histogram("B").is_some());

        session.clear();
        assert!(session.histograms().is_empty());
        let c = session
            .create_histogram_1d("third", "C", 8, NumericKind::Integer)
            .unwrap();
        assert_eq!(c.number(), 1);
    }
}
