//! Learning the rest and down positions from the sensors themselves.

use hkp_common::{
    globals::{CALIBRATION_MIN_SPAN, CALIBRATION_SAMPLES},
    math::mean,
};

use crate::settings::AnalogKeyConfig;

/// Averages the first [`CALIBRATION_SAMPLES`] readings of each key to find its rest position.
pub struct RestCalibration<const N: usize> {
    sums: [u32; N],
    counts: [u16; N],
    samples: u16,
}

impl<const N: usize> Default for RestCalibration<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RestCalibration<N> {
    pub const fn new() -> Self {
        Self {
            sums: [0; N],
            counts: [0; N],
            samples: 0,
        }
    }

    /// Adds one scan worth of readings. Missing readings are skipped. Returns true once enough
    /// scans have been seen.
    pub fn add(&mut self, readings: &[Option<u16>; N]) -> bool {
        if self.is_complete() {
            return true;
        }
        for ((sum, count), raw) in self.sums.iter_mut().zip(self.counts.iter_mut()).zip(readings) {
            if let Some(raw) = raw {
                *sum += u32::from(*raw);
                *count += 1;
            }
        }
        self.samples += 1;
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.samples >= CALIBRATION_SAMPLES
    }

    /// Average reading of key `i`, if it produced any.
    pub fn rest_position(&self, i: usize) -> Option<u16> {
        let count = *self.counts.get(i)?;
        (count != 0).then(|| mean(self.sums[i], count))
    }
}

/// Returns `config` with its rest position set to `rest`. The down position is pushed below rest
/// when the two would be closer than [`CALIBRATION_MIN_SPAN`].
pub fn with_rest_position(config: AnalogKeyConfig, rest: u16) -> AnalogKeyConfig {
    let down_position = if rest.saturating_sub(config.down_position) < CALIBRATION_MIN_SPAN {
        rest.saturating_sub(CALIBRATION_MIN_SPAN)
    } else {
        config.down_position
    };
    AnalogKeyConfig {
        rest_position: rest,
        down_position,
        ..config
    }
}

/// A reading deeper than the down position becomes the new down position, provided it keeps at
/// least [`CALIBRATION_MIN_SPAN`] from rest.
pub fn learn_down_position(config: &AnalogKeyConfig, raw: u16) -> Option<u16> {
    let deep_enough =
        u32::from(raw) + u32::from(CALIBRATION_MIN_SPAN) <= u32::from(config.rest_position);
    (raw < config.down_position && deep_enough).then_some(raw)
}

#[cfg(test)]
#[path = "calibration_test.rs"]
mod test;
