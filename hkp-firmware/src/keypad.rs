//! The key actuation engine and the commands that change it.
//!
//! [`Keypad`] owns the device configuration and the runtime state of every key. The scanner calls
//! [`Keypad::tick`] once per scan and [`Keypad::execute`] for each command line in between, so a
//! tick never observes a half-applied change.

use core::{
    fmt::{self, Write},
    mem,
};

use embassy_sync::blocking_mutex::raw::RawMutex;
use hkp_common::{
    globals::{
        ANALOG_RESOLUTION, FIRMWARE_VERSION, HYSTERESIS_TOLERANCE, RAPID_TRIGGER_TOLERANCE,
        TRAVEL_DISTANCE_IN_0_01MM,
    },
    protocol::{
        field, parse_command, AnalogSetting, Command, DigitalSetting, ProtocolError, Reply,
        Target, TextReply,
    },
};

use crate::{
    actuation::AnalogKeyState,
    calibration::{learn_down_position, with_rest_position, RestCalibration},
    debug,
    digital::DigitalKeyState,
    key_reporter::{KeyEvent, ReportChannel},
    serial::{format_line, Line, LineChannel},
    settings::{AnalogKeyConfig, DeviceConfig, DigitalKeyConfig, SettingError},
    warn,
};

const VERSION_SUFFIX: &str = if cfg!(debug_assertions) { "-dev" } else { "" };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    Protocol(ProtocolError),
    /// The key index is past the last key.
    KeyIndex,
    Setting(SettingError),
    /// The command is not available in this build.
    Disabled,
}

impl From<ProtocolError> for CommandError {
    fn from(value: ProtocolError) -> Self {
        Self::Protocol(value)
    }
}

impl From<SettingError> for CommandError {
    fn from(value: SettingError) -> Self {
        Self::Setting(value)
    }
}

/// What the caller still has to do after a command was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    Done,
    Save,
    Boot,
}

pub struct Keypad<
    'c,
    M: RawMutex,
    const A: usize,
    const D: usize,
    const REPORT_N: usize,
    const LINE_N: usize,
> {
    config: DeviceConfig<A, D>,
    analog: [AnalogKeyState; A],
    digital: [DigitalKeyState; D],
    output_mode: bool,
    reports: &'c ReportChannel<M, REPORT_N>,
    replies: &'c LineChannel<M, LINE_N>,
}

impl<
        'c,
        M: RawMutex,
        const A: usize,
        const D: usize,
        const REPORT_N: usize,
        const LINE_N: usize,
    > Keypad<'c, M, A, D, REPORT_N, LINE_N>
{
    pub fn new(
        config: DeviceConfig<A, D>,
        reports: &'c ReportChannel<M, REPORT_N>,
        replies: &'c LineChannel<M, LINE_N>,
    ) -> Self {
        Self {
            config,
            analog: [AnalogKeyState::new(); A],
            digital: [DigitalKeyState::new(); D],
            output_mode: false,
            reports,
            replies,
        }
    }

    pub fn config(&self) -> &DeviceConfig<A, D> {
        &self.config
    }

    pub fn analog_state(&self, index: usize) -> Option<&AnalogKeyState> {
        self.analog.get(index)
    }

    pub fn digital_state(&self, index: usize) -> Option<&DigitalKeyState> {
        self.digital.get(index)
    }

    /// True while readings are streamed to the host every tick.
    pub fn output_mode(&self) -> bool {
        self.output_mode
    }

    /// Commits learned rest positions. Keys without readings keep their configured rest position.
    pub fn calibrate(&mut self, calibration: &RestCalibration<A>) {
        for (i, (config, state)) in self
            .config
            .analog
            .iter_mut()
            .zip(self.analog.iter_mut())
            .enumerate()
        {
            if let Some(rest) = calibration.rest_position(i) {
                *config = with_rest_position(*config, rest);
                *state = AnalogKeyState::new();
                debug!(
                    "key{} rest={} down={}",
                    i + 1,
                    config.rest_position,
                    config.down_position
                );
            }
        }
    }

    /// Evaluates one scan. `readings` holds the raw sample of every analog key, `None` where the
    /// sampler failed, and `switches` the level of every digital key.
    pub fn tick(&mut self, readings: &[Option<u16>; A], switches: &[bool; D]) {
        for (i, ((config, state), raw)) in self
            .config
            .analog
            .iter_mut()
            .zip(self.analog.iter_mut())
            .zip(readings)
            .enumerate()
        {
            let Some(raw) = *raw else {
                continue;
            };
            if let Some(down) = learn_down_position(config, raw) {
                config.down_position = down;
            }
            if let Some(pressed) = state.update(config, raw) {
                debug!("key{} pressed={}", i + 1, pressed);
                if config.hid_enabled {
                    self.reports.report(KeyEvent::Key {
                        key_char: config.key_char,
                        pressed,
                    });
                }
            }
        }

        for (i, ((config, state), is_down)) in self
            .config
            .digital
            .iter()
            .zip(self.digital.iter_mut())
            .zip(switches)
            .enumerate()
        {
            if let Some(pressed) = state.update(*is_down) {
                debug!("dkey{} pressed={}", i + 1, pressed);
                if config.hid_enabled {
                    self.reports.report(KeyEvent::Key {
                        key_char: config.key_char,
                        pressed,
                    });
                }
            }
        }

        if self.output_mode {
            self.stream_readings();
        }
    }

    /// Parses and applies one command line.
    pub fn execute(&mut self, line: &str) -> Result<Outcome, CommandError> {
        let command = parse_command(line)?;
        self.apply(command)
    }

    pub fn apply(&mut self, command: Command<'_>) -> Result<Outcome, CommandError> {
        match command {
            Command::Boot => return Ok(Outcome::Boot),
            Command::Save => return Ok(Outcome::Save),
            Command::Get => {
                if self.send_settings().is_none() {
                    warn!("outbound queue full; settings dump cut short");
                }
            }
            Command::Name(name) => self.config.set_name(name)?,
            Command::Out(None) => {
                if self.send_readings().is_none() {
                    warn!("outbound queue full; readings cut short");
                }
            }
            Command::Out(Some(on)) => self.output_mode = on,
            Command::Echo(text) => {
                if !cfg!(debug_assertions) {
                    return Err(CommandError::Disabled);
                }
                if self.reply(text).is_none() {
                    warn!("outbound queue full; echo dropped");
                }
            }
            Command::AnalogKey(target, setting) => self.set_analog(target, setting)?,
            Command::DigitalKey(target, setting) => self.set_digital(target, setting)?,
        }
        Ok(Outcome::Done)
    }

    fn set_analog(&mut self, target: Target, setting: AnalogSetting) -> Result<(), CommandError> {
        match target {
            Target::Index(i) => {
                let config = self
                    .config
                    .analog
                    .get(i)
                    .ok_or(CommandError::KeyIndex)?
                    .apply(setting)?;
                self.commit_analog(i, config);
                Ok(())
            }
            Target::All => {
                let mut result = Ok(());
                for i in 0..A {
                    match self.config.analog[i].apply(setting) {
                        Ok(config) => self.commit_analog(i, config),
                        Err(e) => {
                            debug!("key{}.{} rejected: {:?}", i + 1, setting.name(), e);
                            result = Err(e.into());
                        }
                    }
                }
                result
            }
        }
    }

    fn set_digital(&mut self, target: Target, setting: DigitalSetting) -> Result<(), CommandError> {
        match target {
            Target::Index(i) => {
                let config = self
                    .config
                    .digital
                    .get(i)
                    .ok_or(CommandError::KeyIndex)?
                    .apply(setting);
                self.commit_digital(i, config);
            }
            Target::All => {
                for i in 0..D {
                    let config = self.config.digital[i].apply(setting);
                    self.commit_digital(i, config);
                }
            }
        }
        Ok(())
    }

    fn commit_analog(&mut self, i: usize, config: AnalogKeyConfig) {
        let old = mem::replace(&mut self.config.analog[i], config);
        let state = &mut self.analog[i];
        if state.pressed
            && withdraws(old.key_char, old.hid_enabled, config.key_char, config.hid_enabled)
        {
            self.reports.report(KeyEvent::Key {
                key_char: old.key_char,
                pressed: false,
            });
            state.release();
        }
    }

    fn commit_digital(&mut self, i: usize, config: DigitalKeyConfig) {
        let old = mem::replace(&mut self.config.digital[i], config);
        let state = &mut self.digital[i];
        if state.pressed
            && withdraws(old.key_char, old.hid_enabled, config.key_char, config.hid_enabled)
        {
            self.reports.report(KeyEvent::Key {
                key_char: old.key_char,
                pressed: false,
            });
            state.release();
        }
    }

    /// Queues the settings dump. Stops at the first line the outbound queue has no room for, so
    /// the host sees no `GET END` and knows the dump is incomplete.
    fn send_settings(&self) -> Option<()> {
        let mut version = Line::new();
        if write!(version, "{FIRMWARE_VERSION}{VERSION_SUFFIX}").is_err() {
            warn!("version too long");
        }
        self.reply(global(field::VERSION, version.as_str()))?;
        self.reply(global(field::KEYS, A))?;
        self.reply(global(field::DKEYS, D))?;
        self.reply(global(field::NAME, self.config.name.as_str()))?;
        self.reply(global(field::HTOL, HYSTERESIS_TOLERANCE))?;
        self.reply(global(field::RTOL, RAPID_TRIGGER_TOLERANCE))?;
        self.reply(global(field::TRDT, TRAVEL_DISTANCE_IN_0_01MM))?;
        self.reply(global(field::ARES, ANALOG_RESOLUTION))?;

        for (index, key) in self.config.analog.iter().enumerate() {
            for (setting, value) in key.settings() {
                self.reply(TextReply::AnalogKey {
                    index,
                    setting,
                    value,
                })?;
            }
        }
        for (index, key) in self.config.digital.iter().enumerate() {
            for (setting, value) in key.settings() {
                self.reply(TextReply::DigitalKey {
                    index,
                    setting,
                    value,
                })?;
            }
        }
        self.reply(TextReply::End)
    }

    fn send_readings(&self) -> Option<()> {
        for (index, state) in self.analog.iter().enumerate() {
            self.reply(out(index, state))?;
        }
        Some(())
    }

    /// Queues this tick's readings without waiting. Lines the host has no room for are dropped.
    fn stream_readings(&self) {
        for (index, state) in self.analog.iter().enumerate() {
            let Some(line) = format_line(out(index, state)) else {
                continue;
            };
            if !self.replies.try_send(line) {
                break;
            }
        }
    }

    /// Queues one line without waiting. `None` if the outbound queue is full.
    fn reply(&self, reply: impl fmt::Display) -> Option<()> {
        match format_line(reply) {
            Some(line) => self.replies.try_send(line).then_some(()),
            None => {
                warn!("reply too long");
                Some(())
            }
        }
    }
}

/// Whether the host must be told a pressed key went up before the change is committed.
fn withdraws(old_char: u8, old_hid: bool, new_char: u8, new_hid: bool) -> bool {
    old_hid && (old_char != new_char || !new_hid)
}

fn global<V: fmt::Display>(field: &str, value: V) -> Reply<'_, V> {
    Reply::Global { field, value }
}

fn out(index: usize, state: &AnalogKeyState) -> TextReply<'static> {
    Reply::Out {
        index,
        raw: state.last_sensor_value,
        mapped: state.last_mapped_value,
    }
}

#[cfg(test)]
#[path = "keypad_test.rs"]
mod test;
