use super::*;

#[test]
fn calibration_points() {
    assert_eq!(travel_distance(3800, 3800, 200, 400), Some(0));
    assert_eq!(travel_distance(200, 3800, 200, 400), Some(400));
}

#[test]
fn clamps_outside_calibration() {
    assert_eq!(travel_distance(4095, 3800, 200, 400), Some(0));
    assert_eq!(travel_distance(0, 3800, 200, 400), Some(400));
}

#[test]
fn miscalibrated() {
    assert_eq!(travel_distance(1000, 1000, 1000, 400), None);
    assert_eq!(travel_distance(1000, 900, 1000, 400), None);
}

#[test]
fn monotonic_toward_down() {
    let mut last = 0;
    for raw in (200..=3800).rev() {
        let travel = travel_distance(raw, 3800, 200, 400).unwrap();
        assert!(travel >= last, "raw {raw} mapped to {travel} after {last}");
        last = travel;
    }
    assert_eq!(last, 400);
}

#[test]
fn narrow_span() {
    assert_eq!(travel_distance(1000, 1001, 1000, 400), Some(400));
    assert_eq!(travel_distance(1001, 1001, 1000, 400), Some(0));
    assert_eq!(travel_distance(u16::MAX, u16::MAX, 0, 400), Some(0));
    assert_eq!(travel_distance(0, u16::MAX, 0, 400), Some(400));
}

#[test]
fn mean_of_samples() {
    assert_eq!(mean(0, 0), 0);
    assert_eq!(mean(3000 * 64, 64), 3000);
    assert_eq!(mean(7, 2), 3);
}
