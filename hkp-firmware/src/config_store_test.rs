use crate::flash_test_stub::NorFlashStub;

use super::*;

type Store = FlashConfigStore<NorFlashStub<512>>;

fn store() -> Store {
    FlashConfigStore::new(NorFlashStub::default(), 128, 256)
}

fn custom() -> DeviceConfig<2, 1> {
    let mut config = DeviceConfig::<2, 1>::default();
    config.set_name("Desk pad").unwrap();
    config.analog[1] = AnalogKeyConfig {
        rest_position: 3100,
        down_position: 900,
        lower_hysteresis: 120,
        upper_hysteresis: 250,
        rapid_trigger: true,
        continuous_rapid_trigger: true,
        rapid_trigger_up_sensitivity: 15,
        rapid_trigger_down_sensitivity: 40,
        key_char: 0x80,
        hid_enabled: false,
    };
    config.digital[0].key_char = b'q';
    config
}

#[test]
fn blank_flash_gives_defaults() {
    let mut store = store();
    assert_eq!(
        ConfigStore::<2, 1>::load(&mut store),
        Err(StoreError::Blank)
    );
    let config: DeviceConfig<2, 1> = store.load_or_default();
    assert_eq!(config, DeviceConfig::default());
}

#[test]
fn saves_and_loads() {
    let mut store = store();
    let config = custom();
    store.save(&config).unwrap();

    let loaded: DeviceConfig<2, 1> = store.load().unwrap();
    assert_eq!(loaded, config);
    assert_eq!(store.flash().erases, [(128, 192)]);
    assert!(store.flash().buf[..128].iter().all(|b| *b == 0xff));
}

#[test]
fn save_overwrites_previous_record() {
    let mut store = store();
    store.save(&custom()).unwrap();
    let config = DeviceConfig::<2, 1>::default();
    store.save(&config).unwrap();

    let loaded: DeviceConfig<2, 1> = store.load().unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn detects_damage() {
    let mut store = store();
    store.save(&custom()).unwrap();
    store.flash.buf[128 + 20] ^= 0x10;

    assert_eq!(
        ConfigStore::<2, 1>::load(&mut store),
        Err(StoreError::Corrupt)
    );
    let config: DeviceConfig<2, 1> = store.load_or_default();
    assert_eq!(config, DeviceConfig::default());
}

#[test]
fn detects_foreign_data() {
    let mut store = store();
    store.flash.buf[128..136].copy_from_slice(b"not hkp!");
    assert_eq!(
        ConfigStore::<2, 1>::load(&mut store),
        Err(StoreError::Corrupt)
    );
}

#[test]
fn rejects_invalid_settings() {
    let mut store = store();
    let mut config = custom();
    config.analog[0].down_position = config.analog[0].rest_position;
    store.save(&config).unwrap();

    assert_eq!(
        ConfigStore::<2, 1>::load(&mut store),
        Err(StoreError::Corrupt)
    );
}

#[test]
fn detects_key_count_change() {
    let mut store = store();
    store.save(&custom()).unwrap();
    assert_eq!(
        ConfigStore::<3, 1>::load(&mut store),
        Err(StoreError::Mismatch)
    );
    assert_eq!(
        ConfigStore::<2, 0>::load(&mut store),
        Err(StoreError::Mismatch)
    );
}

#[test]
fn flash_failure_keeps_old_record() {
    let mut store = store();
    let config = custom();
    store.save(&config).unwrap();

    store.flash.fail = true;
    assert_eq!(
        store.save(&DeviceConfig::<2, 1>::default()),
        Err(StoreError::Flash)
    );
    store.flash.fail = false;

    let loaded: DeviceConfig<2, 1> = store.load().unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn record_must_fit_region() {
    let mut store = FlashConfigStore::new(NorFlashStub::<512>::default(), 0, 32);
    assert_eq!(
        store.save(&DeviceConfig::<2, 1>::default()),
        Err(StoreError::Full)
    );
    assert!(store.flash().erases.is_empty());
}

#[test]
fn checksum() {
    assert_eq!(fletcher16(b""), 0);
    assert_eq!(fletcher16(b"abcde"), 0xc8f0);
    assert_eq!(fletcher16(b"abcdef"), 0x2057);
}
