//! Keeps the device configuration in a reserved region of NOR flash.
//!
//! The region holds a single record, rewritten in place on every save:
//!
//! | bytes | content |
//! |---|---|
//! | 4 | magic |
//! | 1 | format version |
//! | 1, 1 | analog and digital key counts |
//! | 1 + n | name length and name |
//! | 14 per analog key | positions, thresholds, flags, key char |
//! | 2 per digital key | key char, flags |
//! | 2 | Fletcher-16 of everything before |
//!
//! Multi-byte values are little endian.

use embedded_storage::nor_flash::NorFlash;

use crate::{
    settings::{AnalogKeyConfig, DeviceConfig, DigitalKeyConfig, Name},
    warn,
};

const FORMAT_MAGIC_NUMBER: [u8; 4] = 0x484b5001u32.to_be_bytes();
const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = FORMAT_MAGIC_NUMBER.len() + 4;
const ANALOG_RECORD_LEN: usize = 6 * 2 + 2;
const DIGITAL_RECORD_LEN: usize = 2;
const CHECKSUM_LEN: usize = 2;
pub const MAX_RECORD_LEN: usize = 1024;

const RAPID_TRIGGER_FLAG: u8 = 1;
const CONTINUOUS_FLAG: u8 = 2;
const HID_FLAG: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// The flash driver reported an error.
    Flash,
    /// Nothing has been saved yet.
    Blank,
    /// The record is damaged or holds settings that fail validation.
    Corrupt,
    /// The record was saved for a different number of keys.
    Mismatch,
    /// The record does not fit in the region.
    Full,
}

pub trait ConfigStore<const A: usize, const D: usize> {
    fn load(&mut self) -> Result<DeviceConfig<A, D>, StoreError>;

    /// Writes `config`. The caller's copy is never touched, whatever the outcome.
    fn save(&mut self, config: &DeviceConfig<A, D>) -> Result<(), StoreError>;

    /// The saved configuration, or the defaults if there is none usable.
    fn load_or_default(&mut self) -> DeviceConfig<A, D> {
        match self.load() {
            Ok(config) => config,
            Err(StoreError::Blank) => DeviceConfig::default(),
            Err(e) => {
                warn!("saved config unusable: {:?}", e);
                DeviceConfig::default()
            }
        }
    }
}

pub struct FlashConfigStore<F: NorFlash> {
    flash: F,
    offset: u32,
    size: usize,
}

impl<F: NorFlash> FlashConfigStore<F> {
    /// Uses `size` bytes of `flash` starting at `offset`. `offset` must be erase aligned.
    pub fn new(flash: F, offset: u32, size: usize) -> Self {
        Self {
            flash,
            offset,
            size,
        }
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), StoreError> {
        let len = round_up(buf.len(), F::READ_SIZE);
        let mut block = [0; MAX_RECORD_LEN + 16];
        let block = block.get_mut(..len).ok_or(StoreError::Full)?;
        self.flash
            .read(self.offset, block)
            .map_err(|_| StoreError::Flash)?;
        buf.copy_from_slice(&block[..buf.len()]);
        Ok(())
    }
}

impl<F: NorFlash, const A: usize, const D: usize> ConfigStore<A, D> for FlashConfigStore<F> {
    fn load(&mut self) -> Result<DeviceConfig<A, D>, StoreError> {
        let mut header = [0; HEADER_LEN];
        self.read(&mut header)?;
        if header.iter().all(|b| *b == 0xff) {
            return Err(StoreError::Blank);
        }
        if header[..4] != FORMAT_MAGIC_NUMBER || header[4] != FORMAT_VERSION {
            return Err(StoreError::Corrupt);
        }
        if usize::from(header[5]) != A || usize::from(header[6]) != D {
            return Err(StoreError::Mismatch);
        }

        let len = record_len(A, D, usize::from(header[7]));
        if len > self.size {
            return Err(StoreError::Corrupt);
        }
        let mut buf = [0; MAX_RECORD_LEN];
        let buf = buf.get_mut(..len).ok_or(StoreError::Corrupt)?;
        self.read(buf)?;

        let (body, sum) = buf.split_at(len - CHECKSUM_LEN);
        if fletcher16(body).to_le_bytes() != sum {
            return Err(StoreError::Corrupt);
        }
        let config = decode(&mut Decoder::new(&body[HEADER_LEN - 1..]))?;
        config.validate().map_err(|_| StoreError::Corrupt)?;
        Ok(config)
    }

    fn save(&mut self, config: &DeviceConfig<A, D>) -> Result<(), StoreError> {
        let mut encoder = Encoder::new();
        encode(&mut encoder, config)?;
        let sum = fletcher16(encoder.bytes());
        encoder.put_u16(sum)?;

        let len = round_up(encoder.len, F::WRITE_SIZE);
        let erase_len = round_up(len, F::ERASE_SIZE);
        if erase_len > self.size {
            return Err(StoreError::Full);
        }
        let data = encoder.buf.get(..len).ok_or(StoreError::Full)?;

        self.flash
            .erase(self.offset, self.offset + erase_len as u32)
            .map_err(|_| StoreError::Flash)?;
        self.flash
            .write(self.offset, data)
            .map_err(|_| StoreError::Flash)
    }
}

fn record_len(analog: usize, digital: usize, name_len: usize) -> usize {
    HEADER_LEN
        + name_len
        + analog * ANALOG_RECORD_LEN
        + digital * DIGITAL_RECORD_LEN
        + CHECKSUM_LEN
}

fn encode<const A: usize, const D: usize>(
    e: &mut Encoder,
    config: &DeviceConfig<A, D>,
) -> Result<(), StoreError> {
    e.put(&FORMAT_MAGIC_NUMBER)?;
    e.put_u8(FORMAT_VERSION)?;
    e.put_u8(u8::try_from(A).map_err(|_| StoreError::Full)?)?;
    e.put_u8(u8::try_from(D).map_err(|_| StoreError::Full)?)?;
    e.put_u8(u8::try_from(config.name.len()).map_err(|_| StoreError::Full)?)?;
    e.put(config.name.as_bytes())?;

    for key in &config.analog {
        for v in [
            key.rest_position,
            key.down_position,
            key.lower_hysteresis,
            key.upper_hysteresis,
            key.rapid_trigger_up_sensitivity,
            key.rapid_trigger_down_sensitivity,
        ] {
            e.put_u16(v)?;
        }
        e.put_u8(flags(key.rapid_trigger, key.continuous_rapid_trigger, key.hid_enabled))?;
        e.put_u8(key.key_char)?;
    }
    for key in &config.digital {
        e.put_u8(key.key_char)?;
        e.put_u8(flags(false, false, key.hid_enabled))?;
    }
    Ok(())
}

/// Decodes everything after the key counts.
fn decode<const A: usize, const D: usize>(
    d: &mut Decoder<'_>,
) -> Result<DeviceConfig<A, D>, StoreError> {
    let name_len = usize::from(d.u8()?);
    let name = core::str::from_utf8(d.take(name_len)?).map_err(|_| StoreError::Corrupt)?;
    let name = Name::try_from(name).map_err(|_| StoreError::Corrupt)?;

    let mut config = DeviceConfig::<A, D> {
        name,
        ..DeviceConfig::default()
    };
    for key in config.analog.iter_mut() {
        let rest_position = d.u16()?;
        let down_position = d.u16()?;
        let lower_hysteresis = d.u16()?;
        let upper_hysteresis = d.u16()?;
        let rapid_trigger_up_sensitivity = d.u16()?;
        let rapid_trigger_down_sensitivity = d.u16()?;
        let flags = d.u8()?;
        *key = AnalogKeyConfig {
            rest_position,
            down_position,
            lower_hysteresis,
            upper_hysteresis,
            rapid_trigger: flags & RAPID_TRIGGER_FLAG != 0,
            continuous_rapid_trigger: flags & CONTINUOUS_FLAG != 0,
            rapid_trigger_up_sensitivity,
            rapid_trigger_down_sensitivity,
            key_char: d.u8()?,
            hid_enabled: flags & HID_FLAG != 0,
        };
    }
    for key in config.digital.iter_mut() {
        let key_char = d.u8()?;
        *key = DigitalKeyConfig {
            key_char,
            hid_enabled: d.u8()? & HID_FLAG != 0,
        };
    }
    Ok(config)
}

fn flags(rapid_trigger: bool, continuous: bool, hid_enabled: bool) -> u8 {
    let mut flags = 0;
    if rapid_trigger {
        flags |= RAPID_TRIGGER_FLAG;
    }
    if continuous {
        flags |= CONTINUOUS_FLAG;
    }
    if hid_enabled {
        flags |= HID_FLAG;
    }
    flags
}

struct Encoder {
    buf: [u8; MAX_RECORD_LEN],
    len: usize,
}

impl Encoder {
    fn new() -> Self {
        // erased flash reads back 0xff, so pad with it
        Self {
            buf: [0xff; MAX_RECORD_LEN],
            len: 0,
        }
    }

    fn bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    fn put(&mut self, data: &[u8]) -> Result<(), StoreError> {
        let end = self.len + data.len();
        self.buf
            .get_mut(self.len..end)
            .ok_or(StoreError::Full)?
            .copy_from_slice(data);
        self.len = end;
        Ok(())
    }

    fn put_u8(&mut self, v: u8) -> Result<(), StoreError> {
        self.put(&[v])
    }

    fn put_u16(&mut self, v: u16) -> Result<(), StoreError> {
        self.put(&v.to_le_bytes())
    }
}

struct Decoder<'b> {
    buf: &'b [u8],
    pos: usize,
}

impl<'b> Decoder<'b> {
    fn new(buf: &'b [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'b [u8], StoreError> {
        let data = self
            .buf
            .get(self.pos..self.pos + len)
            .ok_or(StoreError::Corrupt)?;
        self.pos += len;
        Ok(data)
    }

    fn u8(&mut self) -> Result<u8, StoreError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, StoreError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }
}

fn fletcher16(data: &[u8]) -> u16 {
    let (mut a, mut b) = (0u16, 0u16);
    for &byte in data {
        a = (a + u16::from(byte)) % 255;
        b = (b + a) % 255;
    }
    (b << 8) | a
}

fn round_up(len: usize, align: usize) -> usize {
    len.div_ceil(align) * align
}

#[cfg(test)]
#[path = "config_store_test.rs"]
mod test;
