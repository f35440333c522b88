//! The settings a keypad reports in reply to `get`.

use std::fmt;

use anyhow::{anyhow, Result};
use hkp_common::protocol::{
    field, parse_reply, setting, Reply, ANALOG_KEY_PREFIX, DIGITAL_KEY_PREFIX, GET_END,
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AnalogKeySettings {
    pub rapid_trigger: bool,
    pub continuous_rapid_trigger: bool,
    pub rapid_trigger_up_sensitivity: u16,
    pub rapid_trigger_down_sensitivity: u16,
    pub lower_hysteresis: u16,
    pub upper_hysteresis: u16,
    pub key_char: u8,
    pub rest_position: u16,
    pub down_position: u16,
    pub hid_enabled: bool,
}

impl AnalogKeySettings {
    fn set(&mut self, name: &str, value: u16) -> Result<()> {
        match name {
            setting::RT => self.rapid_trigger = value != 0,
            setting::CRT => self.continuous_rapid_trigger = value != 0,
            setting::RTUS => self.rapid_trigger_up_sensitivity = value,
            setting::RTDS => self.rapid_trigger_down_sensitivity = value,
            setting::LH => self.lower_hysteresis = value,
            setting::UH => self.upper_hysteresis = value,
            setting::CHAR => self.key_char = to_char(value)?,
            setting::REST => self.rest_position = value,
            setting::DOWN => self.down_position = value,
            setting::HID => self.hid_enabled = value != 0,
            _ => return Err(anyhow!("unknown key setting {name}")),
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DigitalKeySettings {
    pub key_char: u8,
    pub hid_enabled: bool,
}

impl DigitalKeySettings {
    fn set(&mut self, name: &str, value: u16) -> Result<()> {
        match name {
            setting::CHAR => self.key_char = to_char(value)?,
            setting::HID => self.hid_enabled = value != 0,
            _ => return Err(anyhow!("unknown digital key setting {name}")),
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    pub version: String,
    pub name: String,
    pub hysteresis_tolerance: u16,
    pub rapid_trigger_tolerance: u16,
    pub travel_distance: u16,
    pub analog_resolution: u16,
    pub analog: Vec<AnalogKeySettings>,
    pub digital: Vec<DigitalKeySettings>,
}

impl DeviceSettings {
    /// Builds the settings from a `get` dump. Lines after `GET END` and lines that are not `GET`
    /// replies are ignored.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut settings = Self::default();
        for line in lines {
            match parse_reply(line) {
                Some(Reply::End) => return Ok(settings),
                Some(reply) => settings.apply(reply)?,
                None => log::debug!("ignoring {line:?}"),
            }
        }
        Err(anyhow!("settings dump ended without {GET_END:?}"))
    }

    /// Records one `GET` reply.
    pub fn apply(&mut self, reply: Reply<'_>) -> Result<()> {
        match reply {
            Reply::Global { field, value } => self.set_global(field, value)?,
            Reply::AnalogKey {
                index,
                setting,
                value,
            } => {
                if self.analog.len() <= index {
                    self.analog.resize_with(index + 1, Default::default);
                }
                self.analog[index].set(setting, value)?;
            }
            Reply::DigitalKey {
                index,
                setting,
                value,
            } => {
                if self.digital.len() <= index {
                    self.digital.resize_with(index + 1, Default::default);
                }
                self.digital[index].set(setting, value)?;
            }
            Reply::End | Reply::Out { .. } => {}
        }
        Ok(())
    }

    fn set_global(&mut self, name: &str, value: &str) -> Result<()> {
        let number = || {
            value
                .parse::<u16>()
                .map_err(|_| anyhow!("invalid {name} value {value:?}"))
        };
        match name {
            field::VERSION => self.version = value.to_string(),
            field::NAME => self.name = value.to_string(),
            field::KEYS => self.analog.resize_with(number()?.into(), Default::default),
            field::DKEYS => self.digital.resize_with(number()?.into(), Default::default),
            field::HTOL => self.hysteresis_tolerance = number()?,
            field::RTOL => self.rapid_trigger_tolerance = number()?,
            field::TRDT => self.travel_distance = number()?,
            field::ARES => self.analog_resolution = number()?,
            _ => log::debug!("ignoring unknown field {name}"),
        }
        Ok(())
    }
}

/// Writes the settings as a script that `apply` accepts. Read only values become comments.
impl fmt::Display for DeviceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# version {}", self.version)?;
        writeln!(
            f,
            "# htol {} rtol {} trdt {} ares {}",
            self.hysteresis_tolerance,
            self.rapid_trigger_tolerance,
            self.travel_distance,
            self.analog_resolution
        )?;
        writeln!(f, "name {}", self.name)?;
        for (i, key) in self.analog.iter().enumerate() {
            let k = format!("{ANALOG_KEY_PREFIX}{}", i + 1);
            writeln!(f)?;
            // rest and lh are written twice so the pair validates whatever the old values were
            writeln!(f, "{k}.{} {}", setting::REST, key.rest_position)?;
            writeln!(f, "{k}.{} {}", setting::DOWN, key.down_position)?;
            writeln!(f, "{k}.{} {}", setting::REST, key.rest_position)?;
            writeln!(f, "{k}.{} {}", setting::RT, u8::from(key.rapid_trigger))?;
            writeln!(
                f,
                "{k}.{} {}",
                setting::CRT,
                u8::from(key.continuous_rapid_trigger)
            )?;
            writeln!(f, "{k}.{} {}", setting::RTUS, key.rapid_trigger_up_sensitivity)?;
            writeln!(f, "{k}.{} {}", setting::RTDS, key.rapid_trigger_down_sensitivity)?;
            writeln!(f, "{k}.{} {}", setting::LH, key.lower_hysteresis)?;
            writeln!(f, "{k}.{} {}", setting::UH, key.upper_hysteresis)?;
            writeln!(f, "{k}.{} {}", setting::LH, key.lower_hysteresis)?;
            writeln!(f, "{k}.{} {}", setting::CHAR, CharArg(key.key_char))?;
            writeln!(f, "{k}.{} {}", setting::HID, u8::from(key.hid_enabled))?;
        }
        for (i, key) in self.digital.iter().enumerate() {
            let k = format!("{DIGITAL_KEY_PREFIX}{}", i + 1);
            writeln!(f)?;
            writeln!(f, "{k}.{} {}", setting::CHAR, CharArg(key.key_char))?;
            writeln!(f, "{k}.{} {}", setting::HID, u8::from(key.hid_enabled))?;
        }
        Ok(())
    }
}

/// A `char` argument the keypad reads back as the same code. Literals are lower cased on the
/// keypad, and a single digit is a literal, so everything else is written as a two or more digit
/// code.
struct CharArg(u8);

impl fmt::Display for CharArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.0;
        if c.is_ascii_graphic() && !c.is_ascii_uppercase() && !c.is_ascii_digit() {
            write!(f, "{}", c as char)
        } else {
            write!(f, "{c:02}")
        }
    }
}

fn to_char(value: u16) -> Result<u8> {
    u8::try_from(value).map_err(|_| anyhow!("key char {value} out of range"))
}

#[cfg(test)]
#[path = "device_settings_test.rs"]
mod test;
