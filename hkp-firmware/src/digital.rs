//! Debounced digital switches.
//!
//! A switch reports its first change immediately and then ignores the pin for
//! [`DIGITAL_DEBOUNCE_TICKS`] scans while the contacts settle.

use hkp_common::globals::DIGITAL_DEBOUNCE_TICKS;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DigitalKeyState {
    pub pressed: bool,
    settle: u8,
}

impl DigitalKeyState {
    pub const fn new() -> Self {
        Self {
            pressed: false,
            settle: 0,
        }
    }

    /// Feeds the current switch level. Returns the new pressed state if it changed.
    pub fn update(&mut self, is_down: bool) -> Option<bool> {
        if self.settle != 0 {
            self.settle -= 1;
            return None;
        }
        if is_down == self.pressed {
            return None;
        }
        self.pressed = is_down;
        self.settle = DIGITAL_DEBOUNCE_TICKS;
        Some(is_down)
    }

    pub fn release(&mut self) {
        self.pressed = false;
    }
}

#[cfg(test)]
#[path = "digital_test.rs"]
mod test;
