extern crate std;

use std::{
    format,
    string::{String, ToString},
    vec::Vec,
};

use embassy_sync::blocking_mutex::raw::NoopRawMutex;

use super::*;

type Reports = ReportChannel<NoopRawMutex, 16>;
type Replies = LineChannel<NoopRawMutex, 64>;

/// Rest at 400 and down at 0 make travel equal to `400 - raw`.
fn device() -> DeviceConfig<2, 1> {
    let mut config = DeviceConfig::default();
    for key in config.analog.iter_mut() {
        *key = AnalogKeyConfig {
            rest_position: 400,
            down_position: 0,
            lower_hysteresis: 100,
            upper_hysteresis: 300,
            ..*key
        };
    }
    config
}

fn travel(a: u16, b: u16) -> [Option<u16>; 2] {
    [Some(400 - a), Some(400 - b)]
}

fn events(reports: &Reports) -> Vec<KeyEvent> {
    core::iter::from_fn(|| reports.try_receive()).collect()
}

fn lines(replies: &Replies) -> Vec<String> {
    core::iter::from_fn(|| replies.try_receive())
        .map(|l| l.as_str().to_string())
        .collect()
}

fn key(key_char: u8, pressed: bool) -> KeyEvent {
    KeyEvent::Key { key_char, pressed }
}

#[test]
fn tick_reports_transitions() {
    let reports = Reports::default();
    let replies = Replies::default();
    let mut keypad = Keypad::new(device(), &reports, &replies);

    keypad.tick(&travel(0, 0), &[false]);
    keypad.tick(&travel(310, 0), &[false]);
    keypad.tick(&travel(200, 350), &[true]);
    keypad.tick(&travel(90, 350), &[true]);

    assert_eq!(
        events(&reports),
        [
            key(b'z', true),
            key(b'x', true),
            key(b'c', true),
            key(b'z', false)
        ]
    );
    assert!(keypad.analog_state(1).unwrap().pressed);
    assert!(keypad.digital_state(0).unwrap().pressed);
    assert!(lines(&replies).is_empty());
}

#[test]
fn hid_disabled_keys_are_silent() {
    let reports = Reports::default();
    let replies = Replies::default();
    let mut keypad = Keypad::new(device(), &reports, &replies);

    assert_eq!(keypad.execute("key2.hid 0"), Ok(Outcome::Done));
    assert_eq!(keypad.execute("dkey.hid false"), Ok(Outcome::Done));
    keypad.tick(&travel(0, 350), &[true]);

    assert!(events(&reports).is_empty());
    assert!(keypad.analog_state(1).unwrap().pressed);
}

#[test]
fn learns_down_position() {
    let reports = Reports::default();
    let replies = Replies::default();
    let mut keypad = Keypad::new(DeviceConfig::<2, 1>::default(), &reports, &replies);

    keypad.tick(&[Some(150), None], &[false]);

    assert_eq!(keypad.config().analog[0].down_position, 150);
    assert_eq!(keypad.analog_state(0).unwrap().last_mapped_value, 400);
    assert_eq!(events(&reports), [key(b'z', true)]);
}

#[test]
fn calibrates_rest_position() {
    let reports = Reports::default();
    let replies = Replies::default();
    let mut keypad = Keypad::new(DeviceConfig::<2, 1>::default(), &reports, &replies);

    let mut calibration = RestCalibration::<2>::new();
    while !calibration.add(&[Some(3000), Some(300)]) {}
    keypad.calibrate(&calibration);

    let analog = &keypad.config().analog;
    assert_eq!((analog[0].rest_position, analog[0].down_position), (3000, 200));
    assert_eq!((analog[1].rest_position, analog[1].down_position), (300, 100));
}

#[test]
fn applies_validated_settings() {
    let reports = Reports::default();
    let replies = Replies::default();
    let mut keypad = Keypad::new(device(), &reports, &replies);

    assert_eq!(keypad.execute("key1.uh 350"), Ok(Outcome::Done));
    assert_eq!(keypad.config().analog[0].upper_hysteresis, 350);

    assert_eq!(
        keypad.execute("KEY1.UH 395"),
        Err(CommandError::Setting(SettingError::HysteresisCeiling))
    );
    assert_eq!(keypad.config().analog[0].upper_hysteresis, 350);

    assert_eq!(
        keypad.execute("key1.rtus 5"),
        Err(CommandError::Setting(SettingError::SensitivityRange))
    );
    assert_eq!(keypad.execute("hkey1.rt 1"), Ok(Outcome::Done));
    assert!(keypad.config().analog[0].rapid_trigger);
    assert!(!keypad.config().analog[1].rapid_trigger);

    assert_eq!(keypad.execute("key.rtds 30"), Ok(Outcome::Done));
    assert!(keypad
        .config()
        .analog
        .iter()
        .all(|k| k.rapid_trigger_down_sensitivity == 30));

    assert_eq!(keypad.execute("dkey1.char 44"), Ok(Outcome::Done));
    assert_eq!(keypad.config().digital[0].key_char, 44);
}

#[test]
fn all_keys_validate_independently() {
    let reports = Reports::default();
    let replies = Replies::default();
    let mut keypad = Keypad::new(device(), &reports, &replies);

    keypad.execute("key2.uh 350").unwrap();
    assert_eq!(
        keypad.execute("key.lh 320"),
        Err(CommandError::Setting(SettingError::HysteresisGap))
    );
    assert_eq!(keypad.config().analog[0].lower_hysteresis, 100);
    assert_eq!(keypad.config().analog[1].lower_hysteresis, 320);
}

#[test]
fn rejects_bad_key_index() {
    let reports = Reports::default();
    let replies = Replies::default();
    let mut keypad = Keypad::new(device(), &reports, &replies);
    let before = keypad.config().clone();

    assert_eq!(
        keypad.execute("key3.lh 50"),
        Err(CommandError::KeyIndex)
    );
    assert_eq!(
        keypad.execute("dkey2.hid 0"),
        Err(CommandError::KeyIndex)
    );
    assert_eq!(
        keypad.execute("key0.lh 50"),
        Err(CommandError::Protocol(ProtocolError::InvalidTarget))
    );
    assert_eq!(keypad.config(), &before);
}

#[test]
fn sets_name() {
    let reports = Reports::default();
    let replies = Replies::default();
    let mut keypad = Keypad::new(device(), &reports, &replies);

    let long = format!("name {}", "n".repeat(130));
    assert_eq!(
        keypad.execute(&long),
        Err(CommandError::Setting(SettingError::NameLength))
    );
    assert_eq!(keypad.config().name.as_str(), "hkp");

    assert_eq!(keypad.execute("name Pad 2"), Ok(Outcome::Done));
    assert_eq!(keypad.config().name.as_str(), "Pad 2");
}

#[test]
fn reports_outcomes() {
    let reports = Reports::default();
    let replies = Replies::default();
    let mut keypad = Keypad::new(device(), &reports, &replies);

    assert_eq!(keypad.execute("save"), Ok(Outcome::Save));
    assert_eq!(keypad.execute("BOOT\r\n"), Ok(Outcome::Boot));
    assert_eq!(
        keypad.execute("reset"),
        Err(CommandError::Protocol(ProtocolError::UnknownCommand))
    );
    assert_eq!(
        keypad.execute("key1.speed 3"),
        Err(CommandError::Protocol(ProtocolError::UnknownSetting))
    );
    assert!(lines(&replies).is_empty());
}

#[test]
fn echoes_in_debug_builds() {
    let reports = Reports::default();
    let replies = Replies::default();
    let mut keypad = Keypad::new(device(), &reports, &replies);

    let result = keypad.execute("echo Hello there");
    if cfg!(debug_assertions) {
        assert_eq!(result, Ok(Outcome::Done));
        assert_eq!(lines(&replies), ["Hello there"]);
    } else {
        assert_eq!(result, Err(CommandError::Disabled));
        assert!(lines(&replies).is_empty());
    }
}

#[test]
fn dumps_settings() {
    let reports = Reports::default();
    let replies = Replies::default();
    let mut keypad = Keypad::new(device(), &reports, &replies);
    keypad.execute("key2.char B").unwrap();

    assert_eq!(keypad.execute("get"), Ok(Outcome::Done));

    let lines = lines(&replies);
    assert_eq!(lines.len(), 8 + 2 * 10 + 2 + 1);
    assert_eq!(lines[0], format!("GET version={FIRMWARE_VERSION}{VERSION_SUFFIX}"));
    assert_eq!(
        lines[1..8],
        [
            "GET keys=2",
            "GET dkeys=1",
            "GET name=hkp",
            "GET htol=10",
            "GET rtol=10",
            "GET trdt=400",
            "GET ares=12",
        ]
    );
    assert_eq!(
        lines[8..18],
        [
            "GET key1.rt=0",
            "GET key1.crt=0",
            "GET key1.rtus=35",
            "GET key1.rtds=35",
            "GET key1.lh=100",
            "GET key1.uh=300",
            "GET key1.char=122",
            "GET key1.rest=400",
            "GET key1.down=0",
            "GET key1.hid=1",
        ]
    );
    assert_eq!(lines[24], "GET key2.char=98");
    assert_eq!(lines[28..], ["GET dkey1.char=99", "GET dkey1.hid=1", "GET END"]);
}

#[test]
fn sends_one_reading_per_key() {
    let reports = Reports::default();
    let replies = Replies::default();
    let mut keypad = Keypad::new(device(), &reports, &replies);

    keypad.tick(&travel(100, 250), &[false]);
    assert_eq!(keypad.execute("out"), Ok(Outcome::Done));

    assert_eq!(lines(&replies), ["OUT key1=300 100", "OUT key2=150 250"]);
    assert!(!keypad.output_mode());
}

#[test]
fn streams_readings_every_tick() {
    let reports = Reports::default();
    let replies = Replies::default();
    let mut keypad = Keypad::new(device(), &reports, &replies);

    keypad.execute("out 1").unwrap();
    assert!(keypad.output_mode());
    keypad.tick(&travel(0, 0), &[false]);
    keypad.tick(&travel(350, 0), &[false]);
    keypad.execute("out 0").unwrap();
    keypad.tick(&travel(0, 0), &[false]);

    assert_eq!(
        lines(&replies),
        [
            "OUT key1=400 0",
            "OUT key2=400 0",
            "OUT key1=50 350",
            "OUT key2=400 0",
        ]
    );
    // the stream and HID coexist
    assert_eq!(events(&reports), [key(b'z', true), key(b'z', false)]);
}

#[test]
fn stream_drops_lines_when_host_is_slow() {
    let reports = Reports::default();
    let replies = LineChannel::<NoopRawMutex, 3>::default();
    let mut keypad = Keypad::new(device(), &reports, &replies);

    keypad.execute("out true").unwrap();
    for _ in 0..5 {
        keypad.tick(&travel(0, 0), &[false]);
    }

    assert!(replies.try_receive().is_some());
    assert!(replies.try_receive().is_some());
    assert!(replies.try_receive().is_some());
    assert!(replies.try_receive().is_none());
}

#[test]
fn get_and_out_never_wait_for_the_host() {
    let reports = Reports::default();
    let replies = LineChannel::<NoopRawMutex, 4>::default();
    let mut keypad = Keypad::new(device(), &reports, &replies);
    let drain = || {
        core::iter::from_fn(|| replies.try_receive())
            .map(|l| l.as_str().to_string())
            .collect::<Vec<_>>()
    };

    // the dump stops at the first line with no room, so no GET END reaches the host
    assert_eq!(keypad.execute("get"), Ok(Outcome::Done));
    assert_eq!(keypad.execute("out"), Ok(Outcome::Done));
    let dump = drain();
    assert_eq!(dump.len(), 4);
    assert_eq!(dump[1], "GET keys=2");
    assert!(!dump.iter().any(|l| l == "GET END"));

    // once the host catches up the keypad answers in full again
    keypad.tick(&travel(100, 0), &[false]);
    assert_eq!(keypad.execute("out"), Ok(Outcome::Done));
    assert_eq!(drain(), ["OUT key1=300 100", "OUT key2=400 0"]);
}

#[test]
fn releases_old_char_before_change() {
    let reports = Reports::default();
    let replies = Replies::default();
    let mut keypad = Keypad::new(device(), &reports, &replies);

    keypad.tick(&travel(350, 0), &[true]);
    keypad.execute("key1.char b").unwrap();
    keypad.execute("dkey1.char 44").unwrap();
    assert!(!keypad.analog_state(0).unwrap().pressed);
    assert!(!keypad.digital_state(0).unwrap().pressed);

    keypad.tick(&travel(350, 0), &[true]);

    assert_eq!(
        events(&reports),
        [
            key(b'z', true),
            key(b'c', true),
            key(b'z', false),
            key(b'c', false),
            key(b'b', true),
        ]
    );
}

#[test]
fn disabling_hid_releases_pressed_key() {
    let reports = Reports::default();
    let replies = Replies::default();
    let mut keypad = Keypad::new(device(), &reports, &replies);

    keypad.tick(&travel(350, 0), &[false]);
    keypad.execute("key1.char z").unwrap();
    assert!(keypad.analog_state(0).unwrap().pressed);

    keypad.execute("key1.hid 0").unwrap();
    keypad.tick(&travel(350, 0), &[false]);
    keypad.tick(&travel(0, 0), &[false]);

    assert_eq!(events(&reports), [key(b'z', true), key(b'z', false)]);
}
