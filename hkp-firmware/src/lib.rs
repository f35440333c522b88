#![no_std]
pub mod actuation;
pub mod calibration;
pub mod config_store;
pub mod digital;
pub mod exec;
pub mod firmware_functions;
pub mod hid;
pub mod key_reporter;
pub mod key_scanner;
pub mod keypad;
pub mod serial;
pub mod settings;
pub mod usb;

#[cfg(any(test, feature = "test-utils"))]
pub mod flash_test_stub;
#[cfg(any(test, feature = "test-utils"))]
pub mod switch_test_stub;
#[cfg(any(test, feature = "test-utils"))]
pub mod time_driver_test_stub;
#[cfg(any(test, feature = "test-utils"))]
pub mod usb_test_stub;

#[macro_use]
mod macros;

/// Bytes needed for one bit per keyboard usage `0..=0xff`.
pub(crate) const KEY_BITS_SIZE: usize = 32;

/// Sets the bit for `kc`. Returns false if it was already set.
fn add_key_bit(keys_down: &mut [u8], kc: u8) -> bool {
    let i = (kc >> 3) as usize;
    if i >= keys_down.len() {
        crate::error!("invalid key! {}", kc);
        return false;
    }
    let bp = 1 << (kc & 7);
    let old = keys_down[i];
    keys_down[i] |= bp;
    old & bp == 0
}

/// Clears the bit for `kc`. Returns false if it was already clear.
fn del_key_bit(keys_down: &mut [u8], kc: u8) -> bool {
    let i = (kc >> 3) as usize;
    if i >= keys_down.len() {
        crate::error!("invalid key! {}", kc);
        return false;
    }
    let bp = 1 << (kc & 7);
    let old = keys_down[i];
    keys_down[i] &= !bp;
    old & bp != 0
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod test;
