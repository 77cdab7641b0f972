use bitvec::prelude::*;
use parking_lot::RwLock;
use std::ops::Deref;
use std::sync::Arc;

use super::error::GateError;
use super::histogram::{Dimension, Histogram};

/// A closed polygon in channel space. The last vertex connects back to the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polygon {
    vertices: Vec<(i32, i32)>,
}

impl Polygon {
    pub fn new(vertices: &[(i32, i32)]) -> Self {
        Self {
            vertices: vertices.to_vec(),
        }
    }

    pub fn vertices(&self) -> &[(i32, i32)] {
        &self.vertices
    }

    /// Crossing number test. Points on the left/bottom edges count as inside, points on
    /// the right/top edges as outside, so adjacent polygons never share a cell.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        if self.vertices.len() < 3 {
            return false;
        }
        let (px, py) = (x as f64, y as f64);
        let mut inside = false;
        let mut j = self.vertices.len() - 1;
        for i in 0..self.vertices.len() {
            let (xi, yi) = (self.vertices[i].0 as f64, self.vertices[i].1 as f64);
            let (xj, yj) = (self.vertices[j].0 as f64, self.vertices[j].1 as f64);
            if (yi > py) != (yj > py) {
                let x_cross = (xj - xi) * (py - yi) / (yj - yi) + xi;
                if px < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Inclusive bounding box (min_x, min_y, max_x, max_y)
    fn bounds(&self) -> (i32, i32, i32, i32) {
        self.vertices.iter().fold(
            (i32::MAX, i32::MAX, i32::MIN, i32::MIN),
            |(lx, ly, hx, hy), (x, y)| (lx.min(*x), ly.min(*y), hx.max(*x), hy.max(*y)),
        )
    }
}

#[derive(Debug)]
enum Limits {
    Undefined,
    Interval { lower: i32, upper: i32 },
    Region { polygon: Polygon, mask: BitVec },
}

/// Gate is a named condition on the channels of one histogram.
///
/// 1-D gates are an inclusive interval; 2-D gates are a polygon whose containment test is
/// precomputed into a bit mask over the whole channel grid, so testing a point costs one
/// bit lookup. A new mask is built off to the side and then swapped in, so the sort
/// thread always sees either the old or the new limits. Long scans such as `area` work
/// on a shared snapshot of the limits and never hold the lock. An undefined gate contains
/// nothing.
#[derive(Debug)]
pub struct Gate {
    name: String,
    number: usize,
    histogram: Arc<Histogram>,
    limits: RwLock<Arc<Limits>>,
}

impl Gate {
    pub(crate) fn new(name: &str, number: usize, histogram: Arc<Histogram>) -> Self {
        Self {
            name: name.to_string(),
            number,
            histogram,
            limits: RwLock::new(Arc::new(Limits::Undefined)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn group(&self) -> &str {
        self.histogram.group()
    }

    pub fn histogram(&self) -> &Arc<Histogram> {
        &self.histogram
    }

    pub fn dimension(&self) -> Dimension {
        self.histogram.dimension()
    }

    pub fn is_defined(&self) -> bool {
        !matches!(**self.limits.read(), Limits::Undefined)
    }

    /// Mark the gate undefined; every test fails until limits are set again
    pub fn unset(&self) {
        self.publish(Limits::Undefined);
        spdlog::info!("Gate {} unset", self.name);
    }

    pub fn as_1d(self: &Arc<Self>) -> Option<Gate1D> {
        match self.dimension() {
            Dimension::One => Some(Gate1D(self.clone())),
            Dimension::Two => None,
        }
    }

    pub fn as_2d(self: &Arc<Self>) -> Option<Gate2D> {
        match self.dimension() {
            Dimension::Two => Some(Gate2D(self.clone())),
            Dimension::One => None,
        }
    }

    /// Sum of the histogram counts inside the gate; 0 while undefined
    pub fn area(&self) -> f64 {
        let limits = self.current();
        match &*limits {
            Limits::Undefined => 0.0,
            Limits::Interval { lower, upper } => self.interval_sums(*lower, *upper).0,
            Limits::Region { mask, .. } => {
                let size_y = self.histogram.size_y();
                mask.iter_ones()
                    .map(|idx| {
                        let (x, y) = (idx / size_y, idx % size_y);
                        self.histogram.count_at(x as i32, y as i32)
                    })
                    .sum()
            }
        }
    }

    /// Snapshot of the current limits, taken without holding the lock afterwards
    fn current(&self) -> Arc<Limits> {
        self.limits.read().clone()
    }

    /// Swap in new limits. Only the pointer swap happens under the lock; the old limits
    /// are dropped once the last snapshot of them goes away.
    fn publish(&self, limits: Limits) {
        let limits = Arc::new(limits);
        let old = std::mem::replace(&mut *self.limits.write(), limits);
        drop(old);
    }

    /// (area, count-weighted channel sum) over [lower, upper] clipped to the histogram
    fn interval_sums(&self, lower: i32, upper: i32) -> (f64, f64) {
        let low = lower.max(0);
        let high = upper.min(self.histogram.size_x() as i32 - 1);
        let mut area = 0.0;
        let mut moment = 0.0;
        for ch in low..=high {
            let count = self.histogram.count_at(ch, 0);
            area += count;
            moment += count * ch as f64;
        }
        (area, moment)
    }
}

/// Handle to a gate on a 1-D histogram
#[derive(Debug, Clone)]
pub struct Gate1D(Arc<Gate>);

impl Gate1D {
    pub(crate) fn from_registered(gate: Arc<Gate>) -> Self {
        debug_assert_eq!(gate.dimension(), Dimension::One);
        Self(gate)
    }

    /// True if the gate is defined and `lower <= channel <= upper`
    #[inline]
    pub fn in_gate(&self, channel: i32) -> bool {
        match **self.0.limits.read() {
            Limits::Interval { lower, upper } => lower <= channel && channel <= upper,
            _ => false,
        }
    }

    /// Set the inclusive limits, in either order
    pub fn set_limits(&self, first: i32, second: i32) {
        let (lower, upper) = if first <= second {
            (first, second)
        } else {
            (second, first)
        };
        self.0.publish(Limits::Interval { lower, upper });
        spdlog::info!("Gate {} set to [{}, {}]", self.0.name, lower, upper);
    }

    pub fn limits(&self) -> Option<(i32, i32)> {
        match **self.0.limits.read() {
            Limits::Interval { lower, upper } => Some((lower, upper)),
            _ => None,
        }
    }

    /// Count-weighted mean channel inside the gate; 0 when the area is 0
    pub fn centroid(&self) -> f64 {
        let Some((lower, upper)) = self.limits() else {
            return 0.0;
        };
        let (area, moment) = self.0.interval_sums(lower, upper);
        if area == 0.0 {
            0.0
        } else {
            moment / area
        }
    }

    pub fn gate(&self) -> &Arc<Gate> {
        &self.0
    }
}

impl Deref for Gate1D {
    type Target = Gate;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Handle to a gate on a 2-D histogram
#[derive(Debug, Clone)]
pub struct Gate2D(Arc<Gate>);

impl Gate2D {
    pub(crate) fn from_registered(gate: Arc<Gate>) -> Self {
        debug_assert_eq!(gate.dimension(), Dimension::Two);
        Self(gate)
    }

    /// True if the gate is defined, (`x`, `y`) lies on the channel grid, and the cell is
    /// inside the polygon
    #[inline]
    pub fn in_gate(&self, x: i32, y: i32) -> bool {
        let size_x = self.0.histogram.size_x();
        let size_y = self.0.histogram.size_y();
        if x < 0 || y < 0 || x as usize >= size_x || y as usize >= size_y {
            return false;
        }
        match &**self.0.limits.read() {
            Limits::Region { mask, .. } => mask[x as usize * size_y + y as usize],
            _ => false,
        }
    }

    /// Replace the polygon and rebuild the containment mask.
    ///
    /// This visits every cell of the polygon's bounding box and is meant for interactive
    /// edits, not for per-event use.
    pub fn set_limits(&self, vertices: &[(i32, i32)]) -> Result<(), GateError> {
        if vertices.len() < 3 {
            return Err(GateError::DegeneratePolygon(
                self.0.name.clone(),
                vertices.len(),
            ));
        }
        let polygon = Polygon::new(vertices);
        let mask = self.build_mask(&polygon);
        spdlog::info!(
            "Gate {} set to a {}-vertex polygon covering {} cells",
            self.0.name,
            vertices.len(),
            mask.count_ones()
        );
        self.0.publish(Limits::Region { polygon, mask });
        Ok(())
    }

    fn build_mask(&self, polygon: &Polygon) -> BitVec {
        let size_x = self.0.histogram.size_x();
        let size_y = self.0.histogram.size_y();
        let mut mask = bitvec![0; size_x * size_y];
        let (min_x, min_y, max_x, max_y) = polygon.bounds();
        let x_range = min_x.max(0)..=max_x.min(size_x as i32 - 1);
        let y_range = min_y.max(0)..=max_y.min(size_y as i32 - 1);
        for x in x_range {
            for y in y_range.clone() {
                if polygon.contains(x, y) {
                    mask.set(x as usize * size_y + y as usize, true);
                }
            }
        }
        mask
    }

    pub fn polygon(&self) -> Option<Polygon> {
        match &**self.0.limits.read() {
            Limits::Region { polygon, .. } => Some(polygon.clone()),
            _ => None,
        }
    }

    pub fn gate(&self) -> &Arc<Gate> {
        &self.0
    }
}

impl Deref for Gate2D {
    type Target = Gate;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
