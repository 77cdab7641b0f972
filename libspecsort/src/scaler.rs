use std::sync::atomic::{AtomicI64, Ordering};

/// Scaler is a named counter mirroring one channel of the hardware scaler block.
///
/// The value is overwritten wholesale on each hardware snapshot. A sort routine may also
/// count into a scaler directly when it has no hardware counterpart.
#[derive(Debug)]
pub struct Scaler {
    name: String,
    index: usize,
    group: String,
    value: AtomicI64,
}

impl Scaler {
    pub(crate) fn new(name: &str, index: usize, group: &str) -> Self {
        Self {
            name: name.to_string(),
            index,
            group: group.to_string(),
            value: AtomicI64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in the hardware scaler block
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn set_value(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn zero(&self) {
        self.set_value(0);
    }
}
