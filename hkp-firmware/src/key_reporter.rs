use embassy_sync::{blocking_mutex::raw::RawMutex, channel::Channel};
use embassy_usb::driver::Driver;
use hkp_common::keycodes::{
    hid_key,
    key_range::{LEFT_SHIFT, MODIFIER_MIN},
    HidKey,
};

use crate::{add_key_bit, del_key_bit, hid::HidWriter, warn};

/// NKRO keyboard report id.
pub const KEYBOARD_REPORT_ID: u8 = 6;
const LEFT_SHIFT_BIT: u8 = 1 << (LEFT_SHIFT - MODIFIER_MIN);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyEvent {
    /// A key character went down or up.
    Key { key_char: u8, pressed: bool },
    /// Release everything. Sent when events were lost.
    Clear,
}

pub struct ReportChannel<M: RawMutex, const N: usize>(Channel<M, KeyEvent, N>);
impl<M: RawMutex, const N: usize> Default for ReportChannel<M, N> {
    fn default() -> Self {
        Self(Channel::new())
    }
}
impl<M: RawMutex, const N: usize> ReportChannel<M, N> {
    pub async fn receive(&self) -> KeyEvent {
        self.0.receive().await
    }

    pub fn try_receive(&self) -> Option<KeyEvent> {
        self.0.try_receive().ok()
    }

    /// Queues `event` without waiting. If the queue is full everything queued is dropped and
    /// replaced with [`KeyEvent::Clear`] so no key is left down on the host.
    pub fn report(&self, event: KeyEvent) {
        if self.0.try_send(event).is_err() {
            warn!("report queue full");
            self.0.clear();
            let _ = self.0.try_send(KeyEvent::Clear);
        }
    }
}

pub struct Reporter<'d, D: Driver<'d>, const DESC_SIZE: usize> {
    hid_writer: HidWriter<'d, D, DESC_SIZE>,
    keyboard_report: [u8; crate::KEY_BITS_SIZE + 2],
    /// Modifier keys held in their own right.
    modifiers: u8,
    /// Usages currently down on behalf of a character that needs Left Shift.
    shifted: [u8; crate::KEY_BITS_SIZE],
}

impl<'d, D: Driver<'d>, const DESC_SIZE: usize> Reporter<'d, D, DESC_SIZE> {
    pub fn new(hid_writer: HidWriter<'d, D, DESC_SIZE>) -> Self {
        let mut keyboard_report = [0; crate::KEY_BITS_SIZE + 2];
        keyboard_report[0] = KEYBOARD_REPORT_ID;
        Self {
            hid_writer,
            keyboard_report,
            modifiers: 0,
            shifted: [0; crate::KEY_BITS_SIZE],
        }
    }

    pub async fn run<M: RawMutex, const N: usize>(&mut self, channel: &ReportChannel<M, N>) -> ! {
        loop {
            let event = channel.receive().await;
            self.report(event).await;
        }
    }

    async fn write_keyboard_report(&mut self) {
        self.keyboard_report[1] = self.modifiers
            | if self.shifted.iter().any(|b| *b != 0) {
                LEFT_SHIFT_BIT
            } else {
                0
            };
        if let Err(e) = self.hid_writer.write(&self.keyboard_report).await {
            warn!("Failed to send report: {:?}", e);
        }
    }

    pub async fn report(&mut self, event: KeyEvent) {
        match event {
            KeyEvent::Key { key_char, pressed } => {
                let Some(key) = hid_key(key_char) else {
                    warn!("no HID usage for key char {}", key_char);
                    return;
                };
                if pressed {
                    if !self.add_key(key) {
                        // already down; let the host see it go up first
                        self.remove_key(key);
                        self.write_keyboard_report().await;
                        self.add_key(key);
                    }
                } else {
                    self.remove_key(key);
                }
                self.write_keyboard_report().await;
            }
            KeyEvent::Clear => {
                self.keyboard_report.iter_mut().skip(1).for_each(|b| *b = 0);
                self.modifiers = 0;
                self.shifted.fill(0);
                self.write_keyboard_report().await;
            }
        }
    }

    fn add_key(&mut self, key: HidKey) -> bool {
        if key.is_modifier() {
            let bit = 1 << (key.usage - MODIFIER_MIN);
            let old = self.modifiers;
            self.modifiers |= bit;
            return old & bit == 0;
        }
        let added = add_key_bit(&mut self.keyboard_report[2..], key.usage);
        if added && key.shift {
            add_key_bit(&mut self.shifted, key.usage);
        }
        added
    }

    fn remove_key(&mut self, key: HidKey) {
        if key.is_modifier() {
            self.modifiers &= !(1 << (key.usage - MODIFIER_MIN));
            return;
        }
        // the usage is up whichever char released it, so its shift goes with it
        if del_key_bit(&mut self.keyboard_report[2..], key.usage) {
            del_key_bit(&mut self.shifted, key.usage);
        }
    }
}

#[cfg(test)]
#[path = "key_reporter_test.rs"]
mod test;
