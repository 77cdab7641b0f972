use std::path::PathBuf;
use thiserror::Error;

use super::constants::*;
use super::sort_status::SortStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Cannot register an object with an empty name")]
    EmptyName,
    #[error("Name {0:?} is longer than the allowed {max} characters", max=MAX_NAME_LENGTH)]
    NameTooLong(String),
    #[error("The {1} registry already contains an object named {0:?}")]
    DuplicateName(String, &'static str),
    #[error("The {1} registry already contains an object with number {0}")]
    DuplicateNumber(usize, &'static str),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistogramError {
    #[error("Histogram {0} was given an axis of size zero")]
    ZeroSize(String),
    #[error("Histogram {name} is {found}-D but a {expected}-D operation was requested")]
    DimensionMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Histogram {0} was given {1} errors but holds {2} bins")]
    ErrorLength(String, usize, usize),
    #[error("Gate {0} does not belong to histogram {1}")]
    ForeignGate(String, String),
    #[error("Peak search needs a positive width and sensitivity; was given width {width}, sensitivity {sensitivity}")]
    BadPeakSearch { width: f64, sensitivity: f64 },
    #[error("Histogram failed due to registry error: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("Gate {0} was given a polygon with {1} vertices; at least 3 are required")]
    DegeneratePolygon(String, usize),
    #[error("Gate {gate} is {gate_dim}-D and cannot be added to {hist_dim}-D histogram {histogram}")]
    DimensionMismatch {
        gate: String,
        histogram: String,
        gate_dim: usize,
        hist_dim: usize,
    },
    #[error("Gate {0} is bound to a different histogram than {1}")]
    ForeignHistogram(String, String),
    #[error("Gate failed due to registry error: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalibrationError {
    #[error("Calibration functions support 1 to {max} terms; {0} were requested", max=MAX_CALIBRATION_TERMS)]
    BadTermCount(usize),
    #[error("Calibration expects {0} coefficients but was given {1}")]
    CoefficientCount(usize, usize),
    #[error("Calibration fit needs at least {0} points but was given {1}")]
    NotEnoughPoints(usize, usize),
    #[error("Calibration fit was given {0} channels and {1} values")]
    MismatchedLengths(usize, usize),
    #[error("Calibration fit is singular; the channels do not constrain all coefficients")]
    Singular,
    #[error("Calibration fit was given a negative energy {0} for a square-root energy function")]
    NegativeEnergy(f64),
    #[error("Calibration could not invert value {0} to a channel")]
    NoInverse(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MonitorError {
    #[error("Monitors cannot be updated before the update interval is set")]
    IntervalNotSet,
    #[error("Monitor update interval must be positive, was given {0}")]
    InvalidInterval(f64),
    #[error("Monitor failed due to registry error: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("Slot {0} is outside the valid range {min}..={max}", min=MIN_SLOT, max=MAX_SLOT)]
    SlotOutOfRange(u8),
    #[error("Channel {0} is outside the valid range 0..={max}", max=MAX_CHANNEL)]
    ChannelOutOfRange(u8),
    #[error("Threshold {0} is outside the valid range 0..={max}", max=MAX_THRESHOLD)]
    ThresholdOutOfRange(i32),
    #[error("Event parameter for slot {0}, channel {1} was declared twice")]
    DuplicateAddress(u8, u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompressionError {
    #[error("Cannot compress a raw range of {0} into a display range of {1}; both must be positive")]
    InvalidRange(u32, u32),
}

#[derive(Debug, Error)]
pub enum SortError {
    #[error("Sort routine {0} declared no event parameters")]
    NoParameters(String),
    #[error("Sort routine {0} is already active in this session")]
    GroupInUse(String),
    #[error("Sort routine failed due to event parameter error: {0}")]
    Parameter(#[from] ParameterError),
    #[error("Sort routine failed due to histogram error: {0}")]
    Histogram(#[from] HistogramError),
    #[error("Sort routine failed due to gate error: {0}")]
    Gate(#[from] GateError),
    #[error("Sort routine failed due to registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Sort routine failed due to monitor error: {0}")]
    Monitor(#[from] MonitorError),
    #[error("Sort routine failed due to calibration error: {0}")]
    Calibration(#[from] CalibrationError),
    #[error("Sort routine failed due to compression error: {0}")]
    Compression(#[from] CompressionError),
}

#[derive(Debug, Error)]
pub enum EventSourceError {
    #[error("Could not open event file because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Event size must be at least one word")]
    ZeroEventSize,
    #[error("Event file ended inside an event; read {0} of {1} bytes")]
    TruncatedEvent(usize, usize),
    #[error("Event source failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config names unknown sort routine {0:?}")]
    UnknownRoutine(String),
    #[error("Config event size must be at least 1")]
    BadEventSize,
    #[error("Config monitor interval must be positive, was given {0}")]
    BadInterval(f64),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to sort routine error: {0}")]
    SortError(#[from] SortError),
    #[error("Processor failed due to event source error: {0}")]
    SourceError(#[from] EventSourceError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to monitor error: {0}")]
    MonitorError(#[from] MonitorError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<SortStatus>),
}
