/// Linearly maps a raw sensor reading onto key travel.
///
/// # Parameters
/// - `raw`: the sensor reading. Values outside the calibration points are clamped to them.
/// - `rest`: the reading of the key at rest (travel `0`).
/// - `down`: the reading of the fully pressed key (travel `max_travel`).
///
/// # Returns
/// - `None` if `rest <= down`; the key is miscalibrated and there is nothing to interpolate.
///
/// ```
/// use hkp_common::math::travel_distance;
///
/// assert_eq!(travel_distance(3800, 3800, 200, 400), Some(0));
/// assert_eq!(travel_distance(2000, 3800, 200, 400), Some(200));
/// assert_eq!(travel_distance(100, 3800, 200, 400), Some(400));
/// assert_eq!(travel_distance(100, 200, 200, 400), None);
/// ```
pub fn travel_distance(raw: u16, rest: u16, down: u16, max_travel: u16) -> Option<u16> {
    if rest <= down {
        return None;
    }
    let raw = raw.clamp(down, rest);
    let span = (rest - down) as u32;
    let travel = (rest - raw) as u32 * max_travel as u32 / span;
    Some(travel as u16)
}

/// Integer mean of `count` samples whose total is `sum`. Zero samples average to zero.
pub fn mean(sum: u32, count: u16) -> u16 {
    if count == 0 {
        0
    } else {
        (sum / count as u32) as u16
    }
}

#[cfg(test)]
#[path = "math_test.rs"]
mod test;
