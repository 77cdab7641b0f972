use ndarray::{Array1, Array2};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::calibration::CalibrationFunction;
use super::error::{GateError, HistogramError};
use super::gate::{Gate, Gate2D};
use super::peak_finder;

/// Number of axes of a histogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    One,
    Two,
}

impl Dimension {
    pub fn rank(&self) -> usize {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

/// Representation of the counts in each bin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericKind {
    Integer,
    Double,
}

/// The four concrete shapes of a histogram (dimension x numeric kind)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistogramType {
    OneDimInt,
    OneDimDouble,
    TwoDimInt,
    TwoDimDouble,
}

impl HistogramType {
    pub fn new(dimension: Dimension, kind: NumericKind) -> Self {
        match (dimension, kind) {
            (Dimension::One, NumericKind::Integer) => Self::OneDimInt,
            (Dimension::One, NumericKind::Double) => Self::OneDimDouble,
            (Dimension::Two, NumericKind::Integer) => Self::TwoDimInt,
            (Dimension::Two, NumericKind::Double) => Self::TwoDimDouble,
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            Self::OneDimInt | Self::OneDimDouble => Dimension::One,
            Self::TwoDimInt | Self::TwoDimDouble => Dimension::Two,
        }
    }

    pub fn kind(&self) -> NumericKind {
        match self {
            Self::OneDimInt | Self::TwoDimInt => NumericKind::Integer,
            Self::OneDimDouble | Self::TwoDimDouble => NumericKind::Double,
        }
    }
}

/// A copy of a histogram's counts, safe to inspect while sorting continues.
///
/// 2-D counts are indexed `[x, y]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Counts {
    Int1D(Array1<u64>),
    Double1D(Array1<f64>),
    Int2D(Array2<u64>),
    Double2D(Array2<f64>),
}

impl Counts {
    pub fn dimension(&self) -> Dimension {
        match self {
            Self::Int1D(_) | Self::Double1D(_) => Dimension::One,
            Self::Int2D(_) | Self::Double2D(_) => Dimension::Two,
        }
    }

    /// Extent per axis; the y extent of 1-D counts is 1
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Int1D(a) => (a.len(), 1),
            Self::Double1D(a) => (a.len(), 1),
            Self::Int2D(a) => a.dim(),
            Self::Double2D(a) => a.dim(),
        }
    }

    /// Total of all bins
    pub fn sum(&self) -> f64 {
        match self {
            Self::Int1D(a) => a.iter().map(|c| *c as f64).sum(),
            Self::Double1D(a) => a.sum(),
            Self::Int2D(a) => a.iter().map(|c| *c as f64).sum(),
            Self::Double2D(a) => a.sum(),
        }
    }

    /// Flattened counts as floating point, x-major
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            Self::Int1D(a) => a.iter().map(|c| *c as f64).collect(),
            Self::Double1D(a) => a.to_vec(),
            Self::Int2D(a) => a.iter().map(|c| *c as f64).collect(),
            Self::Double2D(a) => a.iter().copied().collect(),
        }
    }

    fn value(&self, x: usize, y: usize) -> BinValue {
        match self {
            Self::Int1D(a) => BinValue::Int(a[x]),
            Self::Double1D(a) => BinValue::Double(a[x]),
            Self::Int2D(a) => BinValue::Int(a[[x, y]]),
            Self::Double2D(a) => BinValue::Double(a[[x, y]]),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BinValue {
    Int(u64),
    Double(f64),
}

impl BinValue {
    fn as_u64(self) -> u64 {
        match self {
            Self::Int(v) => v,
            Self::Double(v) => double_to_count(v),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Double(v) => v,
        }
    }
}

/// Integer bins never go negative
fn double_to_count(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        value.round() as u64
    }
}

/// Per-bin atomic counters. Floating point bins hold the bit pattern of an f64.
#[derive(Debug)]
struct Bins {
    cells: Box<[AtomicU64]>,
    kind: NumericKind,
}

impl Bins {
    fn new(len: usize, kind: NumericKind) -> Self {
        let zero = match kind {
            NumericKind::Integer => 0,
            NumericKind::Double => 0.0f64.to_bits(),
        };
        Self {
            cells: (0..len).map(|_| AtomicU64::new(zero)).collect(),
            kind,
        }
    }

    fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn add_one(&self, idx: usize) {
        match self.kind {
            NumericKind::Integer => {
                self.cells[idx].fetch_add(1, Ordering::Relaxed);
            }
            NumericKind::Double => self.add_double(idx, 1.0),
        }
    }

    #[inline]
    fn add_weight(&self, idx: usize, weight: f64) {
        match self.kind {
            NumericKind::Integer => {
                self.cells[idx].fetch_add(double_to_count(weight), Ordering::Relaxed);
            }
            NumericKind::Double => self.add_double(idx, weight),
        }
    }

    #[inline]
    fn add_double(&self, idx: usize, weight: f64) {
        // The closure always returns Some, so this cannot fail
        let _ = self.cells[idx].fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
            Some((f64::from_bits(bits) + weight).to_bits())
        });
    }

    fn get(&self, idx: usize) -> BinValue {
        let bits = self.cells[idx].load(Ordering::Relaxed);
        match self.kind {
            NumericKind::Integer => BinValue::Int(bits),
            NumericKind::Double => BinValue::Double(f64::from_bits(bits)),
        }
    }

    fn get_u64(&self, idx: usize) -> u64 {
        self.get(idx).as_u64()
    }

    fn get_f64(&self, idx: usize) -> f64 {
        self.get(idx).as_f64()
    }

    fn set(&self, idx: usize, value: BinValue) {
        let bits = match self.kind {
            NumericKind::Integer => value.as_u64(),
            NumericKind::Double => value.as_f64().to_bits(),
        };
        self.cells[idx].store(bits, Ordering::Relaxed);
    }

    fn add(&self, idx: usize, value: BinValue) {
        match self.kind {
            NumericKind::Integer => {
                self.cells[idx].fetch_add(value.as_u64(), Ordering::Relaxed);
            }
            NumericKind::Double => self.add_double(idx, value.as_f64()),
        }
    }

    fn zero(&self) {
        for idx in 0..self.len() {
            self.set(idx, BinValue::Int(0));
        }
    }
}

/// Clamp a channel into [0, size - 1]
#[inline]
fn clamp_channel(channel: i32, size: usize) -> usize {
    if channel <= 0 {
        0
    } else {
        (channel as usize).min(size - 1)
    }
}

/// Axis selector for projections of 2-D histograms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Histogram is a named, fixed size counting surface.
///
/// Counts are stored as per-bin atomics so the sort thread can increment while other
/// threads take snapshots; a reader never observes a torn bin and never blocks the
/// incrementing thread. Increments clamp out-of-range channels into the nearest valid
/// bin. The hot path is exposed through the typed [`Histogram1D`] and [`Histogram2D`]
/// handles returned by the session.
#[derive(Debug)]
pub struct Histogram {
    name: String,
    number: usize,
    group: String,
    hist_type: HistogramType,
    size_x: usize,
    size_y: usize,
    title: RwLock<String>,
    x_label: RwLock<String>,
    y_label: RwLock<String>,
    bins: Bins,
    errors: Mutex<Option<Vec<f64>>>,
    calibration: RwLock<Option<CalibrationFunction>>,
    gates: RwLock<Vec<String>>,
}

impl Histogram {
    /// Create a histogram. Size and dimension are fixed for its lifetime.
    ///
    /// `size_y` is ignored for 1-D types.
    pub(crate) fn new(
        name: &str,
        number: usize,
        group: &str,
        hist_type: HistogramType,
        size_x: usize,
        size_y: usize,
    ) -> Result<Self, HistogramError> {
        let size_y = match hist_type.dimension() {
            Dimension::One => 1,
            Dimension::Two => size_y,
        };
        if size_x == 0 || size_y == 0 {
            return Err(HistogramError::ZeroSize(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            number,
            group: group.to_string(),
            hist_type,
            size_x,
            size_y,
            title: RwLock::new(name.to_string()),
            x_label: RwLock::new(String::from("Channels")),
            y_label: RwLock::new(match hist_type.dimension() {
                Dimension::One => String::from("Counts"),
                Dimension::Two => String::from("Channels"),
            }),
            bins: Bins::new(size_x * size_y, hist_type.kind()),
            errors: Mutex::new(None),
            calibration: RwLock::new(None),
            gates: RwLock::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn hist_type(&self) -> HistogramType {
        self.hist_type
    }

    pub fn dimension(&self) -> Dimension {
        self.hist_type.dimension()
    }

    pub fn kind(&self) -> NumericKind {
        self.hist_type.kind()
    }

    pub fn size_x(&self) -> usize {
        self.size_x
    }

    /// 1 for 1-D histograms
    pub fn size_y(&self) -> usize {
        self.size_y
    }

    pub fn number_of_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn title(&self) -> String {
        self.title.read().clone()
    }

    pub fn set_title(&self, title: &str) {
        *self.title.write() = title.to_string();
    }

    pub fn axis_labels(&self) -> (String, String) {
        (self.x_label.read().clone(), self.y_label.read().clone())
    }

    pub fn set_axis_labels(&self, x_label: &str, y_label: &str) {
        *self.x_label.write() = x_label.to_string();
        *self.y_label.write() = y_label.to_string();
    }

    /// Typed handle for 1-D histograms
    pub fn as_1d(self: &Arc<Self>) -> Option<Histogram1D> {
        match self.dimension() {
            Dimension::One => Some(Histogram1D(self.clone())),
            Dimension::Two => None,
        }
    }

    /// Typed handle for 2-D histograms
    pub fn as_2d(self: &Arc<Self>) -> Option<Histogram2D> {
        match self.dimension() {
            Dimension::Two => Some(Histogram2D(self.clone())),
            Dimension::One => None,
        }
    }

    fn require(&self, dimension: Dimension) -> Result<(), HistogramError> {
        if self.dimension() == dimension {
            Ok(())
        } else {
            Err(HistogramError::DimensionMismatch {
                name: self.name.clone(),
                expected: dimension.rank(),
                found: self.dimension().rank(),
            })
        }
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        x * self.size_y + y
    }

    /// Copy of the current counts
    pub fn counts(&self) -> Counts {
        match self.hist_type {
            HistogramType::OneDimInt => {
                Counts::Int1D(Array1::from_shape_fn(self.size_x, |x| self.bins.get_u64(x)))
            }
            HistogramType::OneDimDouble => {
                Counts::Double1D(Array1::from_shape_fn(self.size_x, |x| self.bins.get_f64(x)))
            }
            HistogramType::TwoDimInt => {
                Counts::Int2D(Array2::from_shape_fn((self.size_x, self.size_y), |(x, y)| {
                    self.bins.get_u64(self.index(x, y))
                }))
            }
            HistogramType::TwoDimDouble => {
                Counts::Double2D(Array2::from_shape_fn((self.size_x, self.size_y), |(x, y)| {
                    self.bins.get_f64(self.index(x, y))
                }))
            }
        }
    }

    /// Count in a single bin, as floating point. Out of range coordinates are clamped.
    pub fn count_at(&self, x: i32, y: i32) -> f64 {
        let x = clamp_channel(x, self.size_x);
        let y = clamp_channel(y, self.size_y);
        self.bins.get_f64(self.index(x, y))
    }

    /// Replace the counts with `counts`, copying only the overlapping extent per axis.
    ///
    /// Bins outside the overlap keep their values. Floating point values written to an
    /// integer histogram are rounded, and negative values become 0.
    pub fn set_counts(&self, counts: &Counts) -> Result<(), HistogramError> {
        self.require(counts.dimension())?;
        self.for_overlap(counts, |idx, value| self.bins.set(idx, value));
        Ok(())
    }

    /// Add `counts` into the histogram over the overlapping extent
    pub fn add_counts(&self, counts: &Counts) -> Result<(), HistogramError> {
        self.require(counts.dimension())?;
        self.for_overlap(counts, |idx, value| self.bins.add(idx, value));
        Ok(())
    }

    fn for_overlap<F: Fn(usize, BinValue)>(&self, counts: &Counts, apply: F) {
        let (other_x, other_y) = counts.shape();
        let nx = other_x.min(self.size_x);
        let ny = other_y.min(self.size_y);
        for x in 0..nx {
            for y in 0..ny {
                apply(self.index(x, y), counts.value(x, y));
            }
        }
    }

    /// Reset all counts and discard explicitly set errors.
    ///
    /// Size, name, calibration and gates are unchanged.
    pub fn zero(&self) {
        self.bins.zero();
        *self.errors.lock() = None;
    }

    /// Sum of all counts
    pub fn area(&self) -> f64 {
        (0..self.bins.len()).map(|idx| self.bins.get_f64(idx)).sum()
    }

    /// Errors per bin, x-major.
    ///
    /// Poisson errors `max(1, sqrt(n))` from the current counts, unless errors were set
    /// explicitly with [`Histogram::set_errors`].
    pub fn errors(&self) -> Vec<f64> {
        if let Some(errors) = self.errors.lock().as_ref() {
            return errors.clone();
        }
        (0..self.bins.len())
            .map(|idx| self.bins.get_f64(idx).abs().sqrt().max(1.0))
            .collect()
    }

    /// Override the Poisson errors until the next zero
    pub fn set_errors(&self, errors: Vec<f64>) -> Result<(), HistogramError> {
        if errors.len() != self.bins.len() {
            return Err(HistogramError::ErrorLength(
                self.name.clone(),
                errors.len(),
                self.bins.len(),
            ));
        }
        *self.errors.lock() = Some(errors);
        Ok(())
    }

    pub fn has_explicit_errors(&self) -> bool {
        self.errors.lock().is_some()
    }

    pub fn calibration(&self) -> Option<CalibrationFunction> {
        self.calibration.read().clone()
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibration.read().is_some()
    }

    /// Attach (or with None, remove) a calibration. Only 1-D histograms are calibrated.
    pub fn set_calibration(
        &self,
        calibration: Option<CalibrationFunction>,
    ) -> Result<(), HistogramError> {
        self.require(Dimension::One)?;
        *self.calibration.write() = calibration;
        Ok(())
    }

    /// Search a 1-D snapshot for peaks.
    ///
    /// Positions are in channels, or in calibrated units when `calibrated` is set and a
    /// calibration is attached.
    pub fn find_peaks(
        &self,
        sensitivity: f64,
        width: f64,
        calibrated: bool,
    ) -> Result<Vec<f64>, HistogramError> {
        self.require(Dimension::One)?;
        let usable = |v: f64| v.is_finite() && v > 0.0;
        if !usable(width) || !usable(sensitivity) {
            return Err(HistogramError::BadPeakSearch { width, sensitivity });
        }
        let peaks = peak_finder::find_peaks(&self.counts().to_f64_vec(), sensitivity, width);
        match self.calibration.read().as_ref() {
            Some(cal) if calibrated => Ok(peaks.into_iter().map(|p| cal.value(p)).collect()),
            _ => Ok(peaks),
        }
    }

    /// Names of the gates bound to this histogram
    pub fn gate_names(&self) -> Vec<String> {
        self.gates.read().clone()
    }

    /// Record a gate as belonging to this histogram
    pub(crate) fn add_gate(&self, gate: &Gate) -> Result<(), GateError> {
        if gate.dimension() != self.dimension() {
            return Err(GateError::DimensionMismatch {
                gate: gate.name().to_string(),
                histogram: self.name.clone(),
                gate_dim: gate.dimension().rank(),
                hist_dim: self.dimension().rank(),
            });
        }
        if gate.histogram().number() != self.number {
            return Err(GateError::ForeignHistogram(
                gate.name().to_string(),
                self.name.clone(),
            ));
        }
        let mut gates = self.gates.write();
        if !gates.iter().any(|g| g == gate.name()) {
            gates.push(gate.name().to_string());
        }
        Ok(())
    }

    pub(crate) fn remove_gate(&self, gate_name: &str) {
        self.gates.write().retain(|g| g != gate_name);
    }
}

/// Handle to a 1-D histogram, exposing the single-coordinate increment
#[derive(Debug, Clone)]
pub struct Histogram1D(Arc<Histogram>);

impl Histogram1D {
    pub(crate) fn from_registered(histogram: Arc<Histogram>) -> Self {
        debug_assert_eq!(histogram.dimension(), Dimension::One);
        Self(histogram)
    }

    /// Add one count at `channel`, clamped into the histogram
    #[inline]
    pub fn inc(&self, channel: i32) {
        let idx = clamp_channel(channel, self.0.size_x);
        self.0.bins.add_one(idx);
    }

    /// Add `weight` at `channel`. Integer histograms round the weight, and ignore
    /// negative weights.
    #[inline]
    pub fn inc_by(&self, channel: i32, weight: f64) {
        let idx = clamp_channel(channel, self.0.size_x);
        self.0.bins.add_weight(idx, weight);
    }

    pub fn size(&self) -> usize {
        self.0.size_x
    }

    pub fn histogram(&self) -> &Arc<Histogram> {
        &self.0
    }
}

impl Deref for Histogram1D {
    type Target = Histogram;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Handle to a 2-D histogram, exposing the coordinate-pair increment
#[derive(Debug, Clone)]
pub struct Histogram2D(Arc<Histogram>);

impl Histogram2D {
    pub(crate) fn from_registered(histogram: Arc<Histogram>) -> Self {
        debug_assert_eq!(histogram.dimension(), Dimension::Two);
        Self(histogram)
    }

    /// Add one count at (`x`, `y`), each axis clamped into the histogram
    #[inline]
    pub fn inc(&self, x: i32, y: i32) {
        let x = clamp_channel(x, self.0.size_x);
        let y = clamp_channel(y, self.0.size_y);
        self.0.bins.add_one(self.0.index(x, y));
    }

    #[inline]
    pub fn inc_by(&self, x: i32, y: i32, weight: f64) {
        let x = clamp_channel(x, self.0.size_x);
        let y = clamp_channel(y, self.0.size_y);
        self.0.bins.add_weight(self.0.index(x, y), weight);
    }

    pub fn histogram(&self) -> &Arc<Histogram> {
        &self.0
    }

    /// Project the counts onto one axis, optionally only the cells inside a gate of this
    /// histogram.
    pub fn project(&self, axis: Axis, gate: Option<&Gate2D>) -> Result<Vec<f64>, HistogramError> {
        if let Some(g) = gate {
            if g.histogram().number() != self.0.number {
                return Err(HistogramError::ForeignGate(
                    g.name().to_string(),
                    self.0.name.clone(),
                ));
            }
        }
        let len = match axis {
            Axis::X => self.0.size_x,
            Axis::Y => self.0.size_y,
        };
        let mut projection = vec![0.0; len];
        for x in 0..self.0.size_x {
            for y in 0..self.0.size_y {
                if let Some(g) = gate {
                    if !g.in_gate(x as i32, y as i32) {
                        continue;
                    }
                }
                let count = self.0.bins.get_f64(self.0.index(x, y));
                match axis {
                    Axis::X => projection[x] += count,
                    Axis::Y => projection[y] += count,
                }
            }
        }
        Ok(projection)
    }
}

impl Deref for Histogram2D {
    type Target = Histogram;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn hist_1d(kind: NumericKind, size: usize) -> Histogram1D {
        let hist_type = HistogramType::new(Dimension::One, kind);
        let hist = Histogram::new("h1", 1, "test", hist_type, size, 0);
        Arc::new(hist.unwrap()).as_1d().unwrap()
    }

    fn hist_2d(kind: NumericKind, sx: usize, sy: usize) -> Histogram2D {
        let hist_type = HistogramType::new(Dimension::Two, kind);
        let hist = Histogram::new("h2", 2, "test", hist_type, sx, sy);
        Arc::new(hist.unwrap()).as_2d().unwrap()
    }

    #[test]
    fn test_increment_clamps() {
        let hist = hist_1d(NumericKind::Integer, 10);
        for channel in [-1_000_000, -1, 0, 3, 9, 10, 500, i32::MAX] {
            hist.inc(channel);
        }
        let Counts::Int1D(counts) = hist.counts() else {
            panic!()
        };
        assert_eq!(counts[0], 3);
        assert_eq!(counts[3], 1);
        assert_eq!(counts[9], 4);
        assert_eq!(counts.sum(), 8);
    }

    #[test]
    fn test_increment_2d_clamps_each_axis() {
        let hist = hist_2d(NumericKind::Integer, 8, 4);
        hist.inc(-5, 2);
        hist.inc(20, 20);
        hist.inc(3, -1);
        let Counts::Int2D(counts) = hist.counts() else {
            panic!()
        };
        assert_eq!(counts[[0, 2]], 1);
        assert_eq!(counts[[7, 3]], 1);
        assert_eq!(counts[[3, 0]], 1);
        assert_eq!(hist.area(), 3.0);
    }

    #[test]
    fn test_double_increments() {
        let hist = hist_1d(NumericKind::Double, 4);
        hist.inc(1);
        hist.inc_by(1, 0.25);
        hist.inc_by(2, -1.5);
        assert_eq!(hist.count_at(1, 0), 1.25);
        assert_eq!(hist.count_at(2, 0), -1.5);
    }

    #[test]
    fn test_integer_weights_round_and_stay_positive() {
        let hist = hist_1d(NumericKind::Integer, 4);
        hist.inc_by(0, 2.6);
        hist.inc_by(0, -4.0);
        assert_eq!(hist.count_at(0, 0), 3.0);
    }

    #[test]
    fn test_set_counts_round_trip() {
        let hist = hist_1d(NumericKind::Integer, 5);
        let counts = Counts::Int1D(array![1, 2, 3, 4, 5]);
        hist.set_counts(&counts).unwrap();
        assert_eq!(hist.counts(), counts);

        let hist2 = hist_2d(NumericKind::Double, 2, 3);
        let counts2 = Counts::Double2D(array![[0.5, 1.0, 1.5], [2.0, 2.5, 3.0]]);
        hist2.set_counts(&counts2).unwrap();
        assert_eq!(hist2.counts(), counts2);
    }

    #[test]
    fn test_set_counts_overlap() {
        let hist = hist_1d(NumericKind::Integer, 3);
        let longer = Counts::Int1D(array![7, 8, 9, 10, 11]);
        hist.set_counts(&longer).unwrap();
        assert_eq!(hist.counts(), Counts::Int1D(array![7, 8, 9]));

        hist.set_counts(&Counts::Int1D(array![1])).unwrap();
        assert_eq!(hist.counts(), Counts::Int1D(array![1, 8, 9]));

        let hist2 = hist_2d(NumericKind::Integer, 2, 2);
        let wider = Counts::Int2D(array![[1, 2, 3], [4, 5, 6], [7, 8, 9]]);
        hist2.set_counts(&wider).unwrap();
        assert_eq!(hist2.counts(), Counts::Int2D(array![[1, 2], [4, 5]]));
    }

    #[test]
    fn test_set_counts_converts_kinds() {
        let hist = hist_1d(NumericKind::Integer, 3);
        let doubles = Counts::Double1D(array![1.4, 2.6, -3.0]);
        hist.set_counts(&doubles).unwrap();
        assert_eq!(hist.counts(), Counts::Int1D(array![1, 3, 0]));
    }

    #[test]
    fn test_set_counts_rejects_dimension_mismatch() {
        let hist = hist_1d(NumericKind::Integer, 3);
        let result = hist.set_counts(&Counts::Int2D(array![[1, 2], [3, 4]]));
        assert_eq!(
            result,
            Err(HistogramError::DimensionMismatch {
                name: String::from("h1"),
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn test_add_counts() {
        let hist = hist_1d(NumericKind::Double, 3);
        hist.inc(0);
        hist.add_counts(&Counts::Int1D(array![1, 1, 1, 1])).unwrap();
        assert_eq!(hist.counts(), Counts::Double1D(array![2.0, 1.0, 1.0]));
    }

    #[test]
    fn test_default_errors_are_poisson() {
        let hist = hist_1d(NumericKind::Integer, 4);
        hist.set_counts(&Counts::Int1D(array![0, 1, 4, 100])).unwrap();
        let counts = hist.counts().to_f64_vec();
        let errors = hist.errors();
        for (count, error) in counts.iter().zip(&errors) {
            assert_eq!(*error, count.sqrt().max(1.0));
        }
        assert_eq!(errors, vec![1.0, 1.0, 2.0, 10.0]);
    }

    #[test]
    fn test_explicit_errors_until_zero() {
        let hist = hist_1d(NumericKind::Double, 2);
        assert!(hist.set_errors(vec![0.5]).is_err());
        hist.set_errors(vec![0.5, 0.25]).unwrap();
        hist.inc_by(0, 400.0);
        assert_eq!(hist.errors(), vec![0.5, 0.25]);
        hist.zero();
        assert!(!hist.has_explicit_errors());
        assert_eq!(hist.errors(), vec![1.0, 1.0]);
        assert_eq!(hist.area(), 0.0);
    }

    #[test]
    fn test_zero_keeps_metadata() {
        let hist = hist_1d(NumericKind::Integer, 16);
        let cal = CalibrationFunction::linear(0.0, 2.0);
        hist.set_calibration(Some(cal)).unwrap();
        hist.set_title("Germanium energy");
        hist.inc(4);
        hist.zero();
        assert_eq!(hist.size(), 16);
        assert_eq!(hist.title(), "Germanium energy");
        assert!(hist.is_calibrated());
    }

    #[test]
    fn test_calibration_rejected_on_2d() {
        let hist = hist_2d(NumericKind::Integer, 4, 4);
        assert!(hist
            .set_calibration(Some(CalibrationFunction::linear(0.0, 1.0)))
            .is_err());
    }

    #[test]
    fn test_find_peaks() {
        let hist = hist_1d(NumericKind::Integer, 256);
        for ch in 0..256 {
            let x = ch as f64;
            let height = 5.0 + 2000.0 * (-0.5 * ((x - 120.0) / 2.0).powi(2)).exp();
            hist.inc_by(ch, height);
        }
        let peaks = hist.find_peaks(3.0, 4.7, false).unwrap();
        assert_eq!(peaks.len(), 1);
        assert!((peaks[0] - 120.0).abs() < 0.5);

        let cal = CalibrationFunction::linear(1.0, 0.5);
        hist.set_calibration(Some(cal)).unwrap();
        let energies = hist.find_peaks(3.0, 4.7, true).unwrap();
        assert!((energies[0] - 61.0).abs() < 0.5);

        let hist2 = hist_2d(NumericKind::Integer, 4, 4);
        assert!(hist2.find_peaks(3.0, 4.7, false).is_err());

        assert_eq!(
            hist.find_peaks(3.0, f64::INFINITY, false),
            Err(HistogramError::BadPeakSearch {
                width: f64::INFINITY,
                sensitivity: 3.0
            })
        );
        assert!(hist.find_peaks(0.0, 4.7, false).is_err());
        assert!(hist.find_peaks(3.0, -1.0, true).is_err());
    }

    #[test]
    fn test_handles_match_dimension() {
        let hist = Arc::new(
            Histogram::new("a", 1, "g", HistogramType::TwoDimDouble, 3, 3).unwrap(),
        );
        assert!(hist.as_1d().is_none());
        assert!(hist.as_2d().is_some());
        assert_eq!(hist.size_y(), 3);
        assert!(Histogram::new("b", 2, "g", HistogramType::OneDimInt, 0, 0).is_err());
    }

    #[test]
    fn test_projection() {
        let hist = hist_2d(NumericKind::Integer, 3, 2);
        hist.inc(0, 0);
        hist.inc(0, 1);
        hist.inc(2, 1);
        assert_eq!(hist.project(Axis::X, None).unwrap(), vec![2.0, 0.0, 1.0]);
        assert_eq!(hist.project(Axis::Y, None).unwrap(), vec![1.0, 2.0]);
    }
}
