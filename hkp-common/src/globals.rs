//! Build-time constants shared by the firmware and the config tool.

pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bits per analog sample. Raw readings are in `0..=MAX_SENSOR_VALUE`.
pub const ANALOG_RESOLUTION: u8 = 12;
pub const MAX_SENSOR_VALUE: u16 = (1 << ANALOG_RESOLUTION) - 1;

/// Full key travel in hundredths of a millimeter. Mapped travel is in
/// `0..=TRAVEL_DISTANCE_IN_0_01MM`.
pub const TRAVEL_DISTANCE_IN_0_01MM: u16 = 400;

/// Minimum gap between the hysteresis thresholds, and between the upper threshold and full travel.
pub const HYSTERESIS_TOLERANCE: u16 = 10;

/// Smallest accepted rapid trigger sensitivity.
pub const RAPID_TRIGGER_TOLERANCE: u16 = 10;

/// Raw sensor distance that must separate the rest and down positions before down learning accepts
/// a new reading.
pub const CALIBRATION_MIN_SPAN: u16 = 200;

/// Readings averaged per key when learning the rest position at boot.
pub const CALIBRATION_SAMPLES: u16 = 64;

/// Scan ticks a digital switch ignores further changes after it flips.
pub const DIGITAL_DEBOUNCE_TICKS: u8 = 10;

/// Longest device name, in characters.
pub const NAME_MAX: usize = 128;
/// Bytes kept for a device name. `name <text>` and `GET name=<text>` both fit in one line.
pub const NAME_MAX_BYTES: usize = 150;
pub const DEFAULT_NAME: &str = "hkp";

pub const DEFAULT_REST_POSITION: u16 = 3800;
pub const DEFAULT_DOWN_POSITION: u16 = 200;
pub const DEFAULT_LOWER_HYSTERESIS: u16 = 150;
pub const DEFAULT_UPPER_HYSTERESIS: u16 = 200;
pub const DEFAULT_RAPID_TRIGGER_SENSITIVITY: u16 = 35;

/// Default key characters handed out to analog keys in order, then digital keys.
pub const DEFAULT_KEY_CHARS: &[u8] = b"zxcvbnm,./asdfghjkl;";
