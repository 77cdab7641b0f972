// Event parameters are addressed the way the readout hardware addresses them: a module
// slot and a channel within that module. The readout writes one word per declared
// parameter into the event array, in declaration order, so the index handed back here
// is the position of that word for the lifetime of the sort routine. The threshold is
// passed on to the readout; values below it may simply show up as 0.
use fxhash::FxHashMap;

use super::constants::{MAX_CHANNEL, MAX_SLOT, MAX_THRESHOLD, MIN_SLOT};
use super::error::ParameterError;

/// Hardware location of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareAddress {
    pub slot: u8,
    pub channel: u8,
}

impl HardwareAddress {
    pub fn new(slot: u8, channel: u8) -> Self {
        Self { slot, channel }
    }
}

/// Generate a unique id number for a given hardware location
pub fn generate_uuid(slot: &u8, channel: &u8) -> u32 {
    (*channel as u32) + (*slot as u32) * 1_000
}

/// Stable index of a signal in the event array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Parameter {
    index: usize,
}

impl Parameter {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A declared signal and where it lands in the event array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterEntry {
    pub address: HardwareAddress,
    pub threshold: i32,
    pub parameter: Parameter,
}

/// ParameterMap records the signals a sort routine reads, and assigns each one its
/// index in the event array.
#[derive(Debug, Clone, Default)]
pub struct ParameterMap {
    map: FxHashMap<u32, usize>,
    entries: Vec<ParameterEntry>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the signal at (`slot`, `channel`) and return its event index.
    ///
    /// Each address may be declared once.
    pub fn event_parameter(
        &mut self,
        slot: u8,
        channel: u8,
        threshold: i32,
    ) -> Result<Parameter, ParameterError> {
        if !(MIN_SLOT..=MAX_SLOT).contains(&slot) {
            return Err(ParameterError::SlotOutOfRange(slot));
        }
        if channel > MAX_CHANNEL {
            return Err(ParameterError::ChannelOutOfRange(channel));
        }
        if !(0..=MAX_THRESHOLD).contains(&threshold) {
            return Err(ParameterError::ThresholdOutOfRange(threshold));
        }
        let uuid = generate_uuid(&slot, &channel);
        if self.map.contains_key(&uuid) {
            return Err(ParameterError::DuplicateAddress(slot, channel));
        }

        let parameter = Parameter {
            index: self.entries.len(),
        };
        self.map.insert(uuid, self.entries.len());
        self.entries.push(ParameterEntry {
            address: HardwareAddress::new(slot, channel),
            threshold,
            parameter,
        });
        Ok(parameter)
    }

    /// Get the parameter declared for a hardware address.
    ///
    /// If returns None the address was never declared
    pub fn get_parameter(&self, slot: &u8, channel: &u8) -> Option<Parameter> {
        let uuid = generate_uuid(slot, channel);
        self.map
            .get(&uuid)
            .map(|idx| self.entries[*idx].parameter)
    }

    /// Number of words each event must carry
    pub fn event_size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ParameterEntry] {
        &self.entries
    }
}
