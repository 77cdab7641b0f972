// Naming
pub const MAX_NAME_LENGTH: usize = 20;
pub const FIRST_OBJECT_NUMBER: usize = 1;

// Calibration
pub const MAX_CALIBRATION_TERMS: usize = 5;
pub const INVERSE_MAX_ITERATIONS: usize = 100;
pub const INVERSE_TOLERANCE: f64 = 1.0e-6;

// Hardware addressing for event parameters
pub const MIN_SLOT: u8 = 1;
pub const MAX_SLOT: u8 = 24;
pub const MAX_CHANNEL: u8 = 31;
pub const MAX_THRESHOLD: i32 = 4095;

// Scalers: snapshots cover indices below the block size; software scalers sit above it
pub const HARDWARE_SCALER_BLOCK: usize = 1024;

// Monitors
pub const DEFAULT_MONITOR_INTERVAL: f64 = 10.0; // seconds
pub const MONITOR_POLL_MILLIS: u64 = 100;

// Peak finding
pub const PEAK_WINDOW_SIGMAS: f64 = 3.0;
pub const FWHM_TO_SIGMA: f64 = 2.354_820_045;
