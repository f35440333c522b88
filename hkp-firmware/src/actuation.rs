//! Turns calibrated travel into press and release decisions.
//!
//! Travel runs from 0 (released) to [`TRAVEL_DISTANCE_IN_0_01MM`] (bottomed out). Each key runs
//! one of two policies, chosen by [`AnalogKeyConfig::rapid_trigger`]:
//!
//! * hysteresis: press at or above `upper_hysteresis`, release at or below `lower_hysteresis`.
//! * rapid trigger: press after moving `rapid_trigger_down_sensitivity` deeper than the shallowest
//!   point since the last flip, release after rising `rapid_trigger_up_sensitivity` from the
//!   deepest point.

use hkp_common::{globals::TRAVEL_DISTANCE_IN_0_01MM, math::travel_distance};

use crate::settings::AnalogKeyConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnalogKeyState {
    pub last_sensor_value: u16,
    pub last_mapped_value: u16,
    pub pressed: bool,
    /// Deepest travel while pressed, shallowest while released. `None` until the first sample.
    pub extremum: Option<u16>,
    /// In non-continuous rapid trigger a released key may only press again after it has been back
    /// in the release zone.
    armed: bool,
}

impl Default for AnalogKeyState {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalogKeyState {
    pub const fn new() -> Self {
        Self {
            last_sensor_value: 0,
            last_mapped_value: 0,
            pressed: false,
            extremum: None,
            armed: true,
        }
    }

    /// Feeds one raw reading. Returns the new pressed state if it changed.
    ///
    /// A key whose rest position is not above its down position keeps its state and its last
    /// mapped value.
    pub fn update(&mut self, config: &AnalogKeyConfig, raw: u16) -> Option<bool> {
        self.last_sensor_value = raw;
        let travel = travel_distance(
            raw,
            config.rest_position,
            config.down_position,
            TRAVEL_DISTANCE_IN_0_01MM,
        )?;
        self.last_mapped_value = travel;

        let pressed = if config.rapid_trigger {
            self.rapid_trigger(config, travel)
        } else {
            self.hysteresis(config, travel)
        };

        if pressed == self.pressed {
            return None;
        }
        self.pressed = pressed;
        self.extremum = Some(travel);
        Some(pressed)
    }

    /// Forgets the pressed state, for example after the host was told the key is up.
    pub fn release(&mut self) {
        self.pressed = false;
        self.extremum = None;
        self.armed = true;
    }

    fn hysteresis(&mut self, config: &AnalogKeyConfig, travel: u16) -> bool {
        self.extremum = None;
        self.armed = true;
        if self.pressed {
            travel > config.lower_hysteresis
        } else {
            travel >= config.upper_hysteresis
        }
    }

    fn rapid_trigger(&mut self, config: &AnalogKeyConfig, travel: u16) -> bool {
        let extremum = *self.extremum.get_or_insert(travel);
        let continuous = config.continuous_rapid_trigger;
        let in_release_zone = if continuous {
            travel == 0
        } else {
            travel <= config.lower_hysteresis
        };

        if continuous || in_release_zone {
            self.armed = true;
        }

        if self.pressed {
            let risen = extremum.checked_sub(travel);
            if in_release_zone || risen.is_some_and(|d| d >= config.rapid_trigger_up_sensitivity) {
                self.armed = continuous || in_release_zone;
                return false;
            }
            self.extremum = Some(extremum.max(travel));
            true
        } else {
            let sunk = travel.checked_sub(extremum);
            if self.armed
                && !in_release_zone
                && sunk.is_some_and(|d| d >= config.rapid_trigger_down_sensitivity)
            {
                return true;
            }
            self.extremum = Some(extremum.min(travel));
            false
        }
    }
}

#[cfg(test)]
#[path = "actuation_test.rs"]
mod test;
