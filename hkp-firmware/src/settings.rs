//! The persisted keypad settings and the rules every change to them must pass.
//!
//! Setters never mutate in place. Each `with_*` method returns a validated copy which the caller
//! commits with a plain assignment, so a half-applied change is never observable by the scanner.

use hkp_common::{
    globals::{
        DEFAULT_DOWN_POSITION, DEFAULT_KEY_CHARS, DEFAULT_LOWER_HYSTERESIS, DEFAULT_NAME,
        DEFAULT_RAPID_TRIGGER_SENSITIVITY, DEFAULT_REST_POSITION, DEFAULT_UPPER_HYSTERESIS,
        HYSTERESIS_TOLERANCE, MAX_SENSOR_VALUE, NAME_MAX, NAME_MAX_BYTES,
        RAPID_TRIGGER_TOLERANCE, TRAVEL_DISTANCE_IN_0_01MM,
    },
    protocol::{setting, AnalogSetting, DigitalSetting},
};

pub type Name = heapless::String<NAME_MAX_BYTES>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingError {
    /// Upper and lower hysteresis would be closer than [`HYSTERESIS_TOLERANCE`].
    HysteresisGap,
    /// Upper hysteresis would be closer than [`HYSTERESIS_TOLERANCE`] to full travel.
    HysteresisCeiling,
    SensitivityRange,
    /// Rest position must stay above the down position.
    CalibrationOrder,
    SensorRange,
    NameLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogKeyConfig {
    pub rest_position: u16,
    pub down_position: u16,
    pub lower_hysteresis: u16,
    pub upper_hysteresis: u16,
    pub rapid_trigger: bool,
    pub continuous_rapid_trigger: bool,
    pub rapid_trigger_up_sensitivity: u16,
    pub rapid_trigger_down_sensitivity: u16,
    pub key_char: u8,
    pub hid_enabled: bool,
}

impl AnalogKeyConfig {
    pub const fn new(key_char: u8) -> Self {
        Self {
            rest_position: DEFAULT_REST_POSITION,
            down_position: DEFAULT_DOWN_POSITION,
            lower_hysteresis: DEFAULT_LOWER_HYSTERESIS,
            upper_hysteresis: DEFAULT_UPPER_HYSTERESIS,
            rapid_trigger: false,
            continuous_rapid_trigger: false,
            rapid_trigger_up_sensitivity: DEFAULT_RAPID_TRIGGER_SENSITIVITY,
            rapid_trigger_down_sensitivity: DEFAULT_RAPID_TRIGGER_SENSITIVITY,
            key_char,
            hid_enabled: true,
        }
    }

    pub fn with_lower_hysteresis(self, value: u16) -> Result<Self, SettingError> {
        if !at_least_apart(value, self.upper_hysteresis, HYSTERESIS_TOLERANCE) {
            return Err(SettingError::HysteresisGap);
        }
        Ok(Self {
            lower_hysteresis: value,
            ..self
        })
    }

    pub fn with_upper_hysteresis(self, value: u16) -> Result<Self, SettingError> {
        if !at_least_apart(self.lower_hysteresis, value, HYSTERESIS_TOLERANCE) {
            return Err(SettingError::HysteresisGap);
        }
        if !at_least_apart(value, TRAVEL_DISTANCE_IN_0_01MM, HYSTERESIS_TOLERANCE) {
            return Err(SettingError::HysteresisCeiling);
        }
        Ok(Self {
            upper_hysteresis: value,
            ..self
        })
    }

    pub fn with_rapid_trigger_up_sensitivity(self, value: u16) -> Result<Self, SettingError> {
        Ok(Self {
            rapid_trigger_up_sensitivity: check_sensitivity(value)?,
            ..self
        })
    }

    pub fn with_rapid_trigger_down_sensitivity(self, value: u16) -> Result<Self, SettingError> {
        Ok(Self {
            rapid_trigger_down_sensitivity: check_sensitivity(value)?,
            ..self
        })
    }

    pub fn with_rest_position(self, value: u16) -> Result<Self, SettingError> {
        if value > MAX_SENSOR_VALUE {
            return Err(SettingError::SensorRange);
        }
        if value <= self.down_position {
            return Err(SettingError::CalibrationOrder);
        }
        Ok(Self {
            rest_position: value,
            ..self
        })
    }

    pub fn with_down_position(self, value: u16) -> Result<Self, SettingError> {
        if value >= self.rest_position {
            return Err(SettingError::CalibrationOrder);
        }
        Ok(Self {
            down_position: value,
            ..self
        })
    }

    /// Returns a copy with `setting` applied, or why it was refused.
    pub fn apply(self, setting: AnalogSetting) -> Result<Self, SettingError> {
        match setting {
            AnalogSetting::RapidTrigger(on) => Ok(Self {
                rapid_trigger: on,
                ..self
            }),
            AnalogSetting::ContinuousRapidTrigger(on) => Ok(Self {
                continuous_rapid_trigger: on,
                ..self
            }),
            AnalogSetting::RapidTriggerUpSensitivity(v) => {
                self.with_rapid_trigger_up_sensitivity(v)
            }
            AnalogSetting::RapidTriggerDownSensitivity(v) => {
                self.with_rapid_trigger_down_sensitivity(v)
            }
            AnalogSetting::LowerHysteresis(v) => self.with_lower_hysteresis(v),
            AnalogSetting::UpperHysteresis(v) => self.with_upper_hysteresis(v),
            AnalogSetting::KeyChar(c) => Ok(Self {
                key_char: c.code(),
                ..self
            }),
            AnalogSetting::HidEnabled(on) => Ok(Self {
                hid_enabled: on,
                ..self
            }),
            AnalogSetting::RestPosition(v) => self.with_rest_position(v),
            AnalogSetting::DownPosition(v) => self.with_down_position(v),
        }
    }

    /// Checks a whole record, for example one read back from flash.
    pub fn validate(&self) -> Result<(), SettingError> {
        if self.rest_position > MAX_SENSOR_VALUE {
            return Err(SettingError::SensorRange);
        }
        if self.rest_position <= self.down_position {
            return Err(SettingError::CalibrationOrder);
        }
        if !at_least_apart(
            self.lower_hysteresis,
            self.upper_hysteresis,
            HYSTERESIS_TOLERANCE,
        ) {
            return Err(SettingError::HysteresisGap);
        }
        if !at_least_apart(
            self.upper_hysteresis,
            TRAVEL_DISTANCE_IN_0_01MM,
            HYSTERESIS_TOLERANCE,
        ) {
            return Err(SettingError::HysteresisCeiling);
        }
        check_sensitivity(self.rapid_trigger_up_sensitivity)?;
        check_sensitivity(self.rapid_trigger_down_sensitivity)?;
        Ok(())
    }

    /// Setting names and values in `GET` order.
    pub fn settings(&self) -> [(&'static str, u16); 10] {
        [
            (setting::RT, self.rapid_trigger.into()),
            (setting::CRT, self.continuous_rapid_trigger.into()),
            (setting::RTUS, self.rapid_trigger_up_sensitivity),
            (setting::RTDS, self.rapid_trigger_down_sensitivity),
            (setting::LH, self.lower_hysteresis),
            (setting::UH, self.upper_hysteresis),
            (setting::CHAR, self.key_char.into()),
            (setting::REST, self.rest_position),
            (setting::DOWN, self.down_position),
            (setting::HID, self.hid_enabled.into()),
        ]
    }
}

/// `high - low >= gap` without wrapping.
fn at_least_apart(low: u16, high: u16, gap: u16) -> bool {
    high.checked_sub(low).is_some_and(|d| d >= gap)
}

fn check_sensitivity(value: u16) -> Result<u16, SettingError> {
    if (RAPID_TRIGGER_TOLERANCE..=TRAVEL_DISTANCE_IN_0_01MM).contains(&value) {
        Ok(value)
    } else {
        Err(SettingError::SensitivityRange)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigitalKeyConfig {
    pub key_char: u8,
    pub hid_enabled: bool,
}

impl DigitalKeyConfig {
    pub const fn new(key_char: u8) -> Self {
        Self {
            key_char,
            hid_enabled: true,
        }
    }

    pub fn apply(self, setting: DigitalSetting) -> Self {
        match setting {
            DigitalSetting::KeyChar(c) => Self {
                key_char: c.code(),
                ..self
            },
            DigitalSetting::HidEnabled(on) => Self {
                hid_enabled: on,
                ..self
            },
        }
    }

    pub fn settings(&self) -> [(&'static str, u16); 2] {
        [
            (setting::CHAR, self.key_char.into()),
            (setting::HID, self.hid_enabled.into()),
        ]
    }
}

/// Everything that is saved to flash. `A` analog keys and `D` digital keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig<const A: usize, const D: usize> {
    pub name: Name,
    pub analog: [AnalogKeyConfig; A],
    pub digital: [DigitalKeyConfig; D],
}

impl<const A: usize, const D: usize> Default for DeviceConfig<A, D> {
    fn default() -> Self {
        let mut name = Name::new();
        let _ = name.push_str(DEFAULT_NAME);
        Self {
            name,
            analog: core::array::from_fn(|i| AnalogKeyConfig::new(default_key_char(i))),
            digital: core::array::from_fn(|i| DigitalKeyConfig::new(default_key_char(A + i))),
        }
    }
}

impl<const A: usize, const D: usize> DeviceConfig<A, D> {
    pub fn set_name(&mut self, name: &str) -> Result<(), SettingError> {
        self.name = check_name(name)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SettingError> {
        check_name(&self.name)?;
        self.analog.iter().try_for_each(AnalogKeyConfig::validate)
    }
}

/// A device name is 1 to [`NAME_MAX`] characters and at most [`NAME_MAX_BYTES`] bytes.
pub fn check_name(name: &str) -> Result<Name, SettingError> {
    if !(1..=NAME_MAX).contains(&name.chars().count()) {
        return Err(SettingError::NameLength);
    }
    Name::try_from(name).map_err(|_| SettingError::NameLength)
}

fn default_key_char(i: usize) -> u8 {
    DEFAULT_KEY_CHARS[i % DEFAULT_KEY_CHARS.len()]
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod test;
