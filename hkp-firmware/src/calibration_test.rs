use super::*;

#[test]
fn averages_rest_readings() {
    let mut cal = RestCalibration::<2>::new();
    let mut done = false;
    for i in 0..CALIBRATION_SAMPLES {
        assert!(!done);
        let wobble = if i % 2 == 0 { 10 } else { 0 };
        done = cal.add(&[Some(3000 + wobble), None]);
    }
    assert!(done);
    assert!(cal.is_complete());
    assert_eq!(cal.rest_position(0), Some(3005));
    assert_eq!(cal.rest_position(1), None);
    assert_eq!(cal.rest_position(2), None);

    // further scans are ignored
    assert!(cal.add(&[Some(0), Some(0)]));
    assert_eq!(cal.rest_position(0), Some(3005));
}

#[test]
fn rest_keeps_span_to_down() {
    let config = AnalogKeyConfig {
        rest_position: 3800,
        down_position: 200,
        ..AnalogKeyConfig::new(b'a')
    };

    let c = with_rest_position(config, 3600);
    assert_eq!((c.rest_position, c.down_position), (3600, 200));

    let c = with_rest_position(config, 300);
    assert_eq!((c.rest_position, c.down_position), (300, 100));

    let c = with_rest_position(config, 150);
    assert_eq!((c.rest_position, c.down_position), (150, 0));
    assert_eq!(c.validate(), Ok(()));
}

#[test]
fn down_follows_deeper_presses() {
    let config = AnalogKeyConfig {
        rest_position: 3800,
        down_position: 600,
        ..AnalogKeyConfig::new(b'a')
    };

    assert_eq!(learn_down_position(&config, 700), None);
    assert_eq!(learn_down_position(&config, 600), None);
    assert_eq!(learn_down_position(&config, 550), Some(550));
    assert_eq!(learn_down_position(&config, 0), Some(0));

    let config = AnalogKeyConfig {
        rest_position: 500,
        down_position: 400,
        ..config
    };
    assert_eq!(learn_down_position(&config, 301), None);
    assert_eq!(learn_down_position(&config, 300), Some(300));
}
