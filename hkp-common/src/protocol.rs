//! The serial text protocol spoken over the CDC interface.
//!
//! The host sends one command per line with space separated tokens. Commands and setting names
//! are matched without regard to case. Replies are the `GET ...` settings dump and the `OUT ...`
//! readings; everything else is answered with silence.

use core::fmt;

pub const GET_PREFIX: &str = "GET ";
pub const GET_END: &str = "GET END";
pub const OUT_PREFIX: &str = "OUT ";

pub const ANALOG_KEY_PREFIX: &str = "key";
pub const LEGACY_ANALOG_KEY_PREFIX: &str = "hkey";
pub const DIGITAL_KEY_PREFIX: &str = "dkey";

/// Longest command line accepted from the host; longer lines are dropped whole.
pub const MAX_LINE_LEN: usize = 160;
/// Longest reply line sent to the host, excluding the line terminator.
pub const MAX_REPLY_LEN: usize = 160;

pub mod field {
    pub const VERSION: &str = "version";
    pub const KEYS: &str = "keys";
    pub const DKEYS: &str = "dkeys";
    pub const NAME: &str = "name";
    pub const HTOL: &str = "htol";
    pub const RTOL: &str = "rtol";
    pub const TRDT: &str = "trdt";
    pub const ARES: &str = "ares";
}

pub mod setting {
    pub const RT: &str = "rt";
    pub const CRT: &str = "crt";
    pub const RTUS: &str = "rtus";
    pub const RTDS: &str = "rtds";
    pub const LH: &str = "lh";
    pub const UH: &str = "uh";
    pub const CHAR: &str = "char";
    pub const HID: &str = "hid";
    pub const REST: &str = "rest";
    pub const DOWN: &str = "down";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    Empty,
    UnknownCommand,
    UnknownSetting,
    InvalidTarget,
    InvalidValue,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProtocolError::Empty => "empty line",
            ProtocolError::UnknownCommand => "unknown command",
            ProtocolError::UnknownSetting => "unknown setting",
            ProtocolError::InvalidTarget => "invalid key index",
            ProtocolError::InvalidValue => "invalid value",
        })
    }
}

/// Which keys a key command applies to. Indexes are zero based; the wire form is one based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    All,
    Index(usize),
}

/// A `char` argument: either a single literal character or a decimal key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyChar {
    Literal(u8),
    Code(u8),
}

impl KeyChar {
    pub const fn code(self) -> u8 {
        match self {
            KeyChar::Literal(c) | KeyChar::Code(c) => c,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogSetting {
    RapidTrigger(bool),
    ContinuousRapidTrigger(bool),
    RapidTriggerUpSensitivity(u16),
    RapidTriggerDownSensitivity(u16),
    LowerHysteresis(u16),
    UpperHysteresis(u16),
    KeyChar(KeyChar),
    HidEnabled(bool),
    RestPosition(u16),
    DownPosition(u16),
}

impl AnalogSetting {
    fn parse(name: &str, arg: &str) -> Result<Self, ProtocolError> {
        let setting = if is(name, setting::RT) {
            Self::RapidTrigger(parse_bool(arg))
        } else if is(name, setting::CRT) {
            Self::ContinuousRapidTrigger(parse_bool(arg))
        } else if is(name, setting::RTUS) {
            Self::RapidTriggerUpSensitivity(parse_number(arg)?)
        } else if is(name, setting::RTDS) {
            Self::RapidTriggerDownSensitivity(parse_number(arg)?)
        } else if is(name, setting::LH) {
            Self::LowerHysteresis(parse_number(arg)?)
        } else if is(name, setting::UH) {
            Self::UpperHysteresis(parse_number(arg)?)
        } else if is(name, setting::REST) {
            Self::RestPosition(parse_number(arg)?)
        } else if is(name, setting::DOWN) {
            Self::DownPosition(parse_number(arg)?)
        } else {
            match DigitalSetting::parse(name, arg)? {
                DigitalSetting::KeyChar(c) => Self::KeyChar(c),
                DigitalSetting::HidEnabled(on) => Self::HidEnabled(on),
            }
        };
        Ok(setting)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::RapidTrigger(_) => setting::RT,
            Self::ContinuousRapidTrigger(_) => setting::CRT,
            Self::RapidTriggerUpSensitivity(_) => setting::RTUS,
            Self::RapidTriggerDownSensitivity(_) => setting::RTDS,
            Self::LowerHysteresis(_) => setting::LH,
            Self::UpperHysteresis(_) => setting::UH,
            Self::KeyChar(_) => setting::CHAR,
            Self::HidEnabled(_) => setting::HID,
            Self::RestPosition(_) => setting::REST,
            Self::DownPosition(_) => setting::DOWN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitalSetting {
    KeyChar(KeyChar),
    HidEnabled(bool),
}

impl DigitalSetting {
    fn parse(name: &str, arg: &str) -> Result<Self, ProtocolError> {
        if is(name, setting::CHAR) {
            Ok(Self::KeyChar(parse_key_char(arg)?))
        } else if is(name, setting::HID) {
            Ok(Self::HidEnabled(parse_bool(arg)))
        } else {
            Err(ProtocolError::UnknownSetting)
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::KeyChar(_) => setting::CHAR,
            Self::HidEnabled(_) => setting::HID,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Boot,
    Save,
    Get,
    /// Everything after `name `, case preserved.
    Name(&'a str),
    /// `None` asks for one reading of every key, `Some` switches streaming on or off.
    Out(Option<bool>),
    Echo(&'a str),
    AnalogKey(Target, AnalogSetting),
    DigitalKey(Target, DigitalSetting),
}

/// Parses one command line. The line terminator may or may not be present.
pub fn parse_command(line: &str) -> Result<Command<'_>, ProtocolError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(ProtocolError::Empty);
    }
    let (command, payload) = line.split_once(' ').unwrap_or((line, ""));
    let arg = payload.split(' ').next().unwrap_or("");

    if is(command, "boot") {
        Ok(Command::Boot)
    } else if is(command, "save") {
        Ok(Command::Save)
    } else if is(command, "get") {
        Ok(Command::Get)
    } else if is(command, "name") {
        Ok(Command::Name(payload))
    } else if is(command, "out") {
        Ok(Command::Out((!arg.is_empty()).then(|| parse_bool(arg))))
    } else if is(command, "echo") {
        Ok(Command::Echo(payload))
    } else if let Some(key) = strip_prefix_ignore_case(command, LEGACY_ANALOG_KEY_PREFIX)
        .or_else(|| strip_prefix_ignore_case(command, ANALOG_KEY_PREFIX))
    {
        let (target, name) = split_key(key)?;
        Ok(Command::AnalogKey(target, AnalogSetting::parse(name, arg)?))
    } else if let Some(key) = strip_prefix_ignore_case(command, DIGITAL_KEY_PREFIX) {
        let (target, name) = split_key(key)?;
        Ok(Command::DigitalKey(target, DigitalSetting::parse(name, arg)?))
    } else {
        Err(ProtocolError::UnknownCommand)
    }
}

fn split_key(key: &str) -> Result<(Target, &str), ProtocolError> {
    let (index, name) = key.split_once('.').ok_or(ProtocolError::UnknownSetting)?;
    Ok((parse_target(index)?, name))
}

fn parse_target(index: &str) -> Result<Target, ProtocolError> {
    if index.is_empty() {
        return Ok(Target::All);
    }
    match parse_index(index) {
        Some(i) => Ok(Target::Index(i)),
        None => Err(ProtocolError::InvalidTarget),
    }
}

/// One based decimal index to zero based.
fn parse_index(index: &str) -> Option<usize> {
    if !is_decimal(index) {
        return None;
    }
    index.parse::<usize>().ok()?.checked_sub(1)
}

fn parse_bool(arg: &str) -> bool {
    arg == "1" || is(arg, "true")
}

fn parse_number(arg: &str) -> Result<u16, ProtocolError> {
    if !is_decimal(arg) {
        return Err(ProtocolError::InvalidValue);
    }
    arg.parse().map_err(|_| ProtocolError::InvalidValue)
}

fn parse_key_char(arg: &str) -> Result<KeyChar, ProtocolError> {
    match arg.as_bytes() {
        [c] => Ok(KeyChar::Literal(c.to_ascii_lowercase())),
        _ if is_decimal(arg) => arg
            .parse()
            .map(KeyChar::Code)
            .map_err(|_| ProtocolError::InvalidValue),
        _ => Err(ProtocolError::InvalidValue),
    }
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is(token: &str, word: &str) -> bool {
    token.eq_ignore_ascii_case(word)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// A reply line from the keypad.
///
/// The firmware builds these with numeric or text values and writes them with `Display`;
/// the host parses them back with [`parse_reply`], which always yields text global values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply<'a, V = &'a str> {
    Global {
        field: &'a str,
        value: V,
    },
    AnalogKey {
        index: usize,
        setting: &'a str,
        value: u16,
    },
    DigitalKey {
        index: usize,
        setting: &'a str,
        value: u16,
    },
    End,
    Out {
        index: usize,
        raw: u16,
        mapped: u16,
    },
}

/// A reply whose global value is text, as [`parse_reply`] yields and as variants without a
/// global value are written.
pub type TextReply<'a> = Reply<'a, &'a str>;

impl<V: fmt::Display> fmt::Display for Reply<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Global { field, value } => write!(f, "{GET_PREFIX}{field}={value}"),
            Reply::AnalogKey {
                index,
                setting,
                value,
            } => write!(
                f,
                "{GET_PREFIX}{ANALOG_KEY_PREFIX}{}.{setting}={value}",
                index + 1
            ),
            Reply::DigitalKey {
                index,
                setting,
                value,
            } => write!(
                f,
                "{GET_PREFIX}{DIGITAL_KEY_PREFIX}{}.{setting}={value}",
                index + 1
            ),
            Reply::End => f.write_str(GET_END),
            Reply::Out { index, raw, mapped } => write!(
                f,
                "{OUT_PREFIX}{ANALOG_KEY_PREFIX}{}={raw} {mapped}",
                index + 1
            ),
        }
    }
}

/// Parses a reply line. Returns `None` for anything that is not a `GET` or `OUT` line.
pub fn parse_reply(line: &str) -> Option<TextReply<'_>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line == GET_END {
        return Some(Reply::End);
    }
    if let Some(rest) = line.strip_prefix(GET_PREFIX) {
        let (field, value) = rest.split_once('=')?;
        let Some((key, setting)) = field.split_once('.') else {
            return Some(Reply::Global { field, value });
        };
        let value = value.parse().ok()?;
        if let Some(n) = key.strip_prefix(DIGITAL_KEY_PREFIX) {
            return Some(Reply::DigitalKey {
                index: parse_index(n)?,
                setting,
                value,
            });
        }
        return Some(Reply::AnalogKey {
            index: parse_index(strip_analog_prefix(key)?)?,
            setting,
            value,
        });
    }
    let (key, readings) = line.strip_prefix(OUT_PREFIX)?.split_once('=')?;
    let (raw, mapped) = readings.split_once(' ')?;
    Some(Reply::Out {
        index: parse_index(strip_analog_prefix(key)?)?,
        raw: raw.parse().ok()?,
        mapped: mapped.parse().ok()?,
    })
}

fn strip_analog_prefix(key: &str) -> Option<&str> {
    key.strip_prefix(LEGACY_ANALOG_KEY_PREFIX)
        .or_else(|| key.strip_prefix(ANALOG_KEY_PREFIX))
}

#[cfg(test)]
#[path = "protocol_test.rs"]
mod test;
