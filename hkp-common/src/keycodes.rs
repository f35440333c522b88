//! Translation of `keyChar` values into HID keyboard usages.
//!
//! A key character uses the same encoding as the Arduino keyboard library so existing
//! configurations keep working:
//!
//! - `0x00..=0x7f`: ASCII. Upper case letters and shifted symbols also hold Left Shift.
//! - `0x80..=0x87`: modifiers, Left Control through Right GUI.
//! - `0x88..=0xff`: a raw HID usage offset by [`key_char::RAW_USAGE_BASE`].

pub mod key_range {
    pub const BASIC_A: u8 = 0x04;
    pub const BASIC_1: u8 = 0x1e;
    pub const BASIC_0: u8 = 0x27;
    pub const ENTER: u8 = 0x28;
    pub const ESCAPE: u8 = 0x29;
    pub const BACKSPACE: u8 = 0x2a;
    pub const TAB: u8 = 0x2b;
    pub const SPACE: u8 = 0x2c;
    pub const MODIFIER_MIN: u8 = 0xe0;
    pub const MODIFIER_MAX: u8 = 0xe7;
    pub const LEFT_SHIFT: u8 = 0xe1;
}

pub mod key_char {
    pub const MODIFIER_BASE: u8 = 0x80;
    pub const RAW_USAGE_BASE: u8 = 0x88;
}

use key_range::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HidKey {
    pub usage: u8,
    /// The character needs Left Shift held to be typed.
    pub shift: bool,
}
impl HidKey {
    const fn plain(usage: u8) -> Option<Self> {
        Some(Self {
            usage,
            shift: false,
        })
    }

    const fn shifted(usage: u8) -> Option<Self> {
        Some(Self { usage, shift: true })
    }

    pub const fn is_modifier(&self) -> bool {
        self.usage >= MODIFIER_MIN && self.usage <= MODIFIER_MAX
    }
}

/// Returns the HID usage for `key_char`, or `None` when the character has no key.
pub const fn hid_key(key_char: u8) -> Option<HidKey> {
    match key_char {
        b'a'..=b'z' => HidKey::plain(key_char - b'a' + BASIC_A),
        b'A'..=b'Z' => HidKey::shifted(key_char - b'A' + BASIC_A),
        b'1'..=b'9' => HidKey::plain(key_char - b'1' + BASIC_1),
        b'0' => HidKey::plain(BASIC_0),
        b'\n' | b'\r' => HidKey::plain(ENTER),
        0x1b => HidKey::plain(ESCAPE),
        0x08 => HidKey::plain(BACKSPACE),
        b'\t' => HidKey::plain(TAB),
        b' ' => HidKey::plain(SPACE),
        b'-' => HidKey::plain(0x2d),
        b'_' => HidKey::shifted(0x2d),
        b'=' => HidKey::plain(0x2e),
        b'+' => HidKey::shifted(0x2e),
        b'[' => HidKey::plain(0x2f),
        b'{' => HidKey::shifted(0x2f),
        b']' => HidKey::plain(0x30),
        b'}' => HidKey::shifted(0x30),
        b'\\' => HidKey::plain(0x31),
        b'|' => HidKey::shifted(0x31),
        b';' => HidKey::plain(0x33),
        b':' => HidKey::shifted(0x33),
        b'\'' => HidKey::plain(0x34),
        b'"' => HidKey::shifted(0x34),
        b'`' => HidKey::plain(0x35),
        b'~' => HidKey::shifted(0x35),
        b',' => HidKey::plain(0x36),
        b'<' => HidKey::shifted(0x36),
        b'.' => HidKey::plain(0x37),
        b'>' => HidKey::shifted(0x37),
        b'/' => HidKey::plain(0x38),
        b'?' => HidKey::shifted(0x38),
        b'!' => HidKey::shifted(BASIC_1),
        b'@' => HidKey::shifted(BASIC_1 + 1),
        b'#' => HidKey::shifted(BASIC_1 + 2),
        b'$' => HidKey::shifted(BASIC_1 + 3),
        b'%' => HidKey::shifted(BASIC_1 + 4),
        b'^' => HidKey::shifted(BASIC_1 + 5),
        b'&' => HidKey::shifted(BASIC_1 + 6),
        b'*' => HidKey::shifted(BASIC_1 + 7),
        b'(' => HidKey::shifted(BASIC_1 + 8),
        b')' => HidKey::shifted(BASIC_0),
        key_char::MODIFIER_BASE..=0x87 => {
            HidKey::plain(key_char - key_char::MODIFIER_BASE + MODIFIER_MIN)
        }
        key_char::RAW_USAGE_BASE..=0xff => {
            let usage = key_char - key_char::RAW_USAGE_BASE;
            if usage < BASIC_A {
                None
            } else {
                HidKey::plain(usage)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "keycodes_test.rs"]
mod test;
