//! Talks the keypad's line protocol over the bulk endpoints of its CDC data interface.

use std::{
    sync::{
        mpsc::{self, RecvTimeoutError},
        Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use futures_lite::future::block_on;
use hkp_common::protocol::{parse_reply, Reply, GET_END, MAX_LINE_LEN};
use nusb::transfer::{ControlOut, ControlType, Direction, EndpointType, Recipient, RequestBuffer};

use crate::device_settings::DeviceSettings;

const CDC_CLASS_COMM: u8 = 0x02;
const CDC_CLASS_DATA: u8 = 0x0a;
const SET_CONTROL_LINE_STATE: u8 = 0x22;
const DTR: u16 = 0x01;

const MAX_PACKET: u16 = 64;

/// How long to wait for the next line of a reply.
pub const REPLY_TIMEOUT: Duration = Duration::from_millis(500);

pub trait KeypadInterface {
    fn bulk_out(&self, endpoint: u8, buf: Vec<u8>) -> Result<()>;
    fn bulk_in(&self, endpoint: u8, max_len: u16) -> Result<Vec<u8>>;
}

impl KeypadInterface for nusb::Interface {
    fn bulk_out(&self, endpoint: u8, buf: Vec<u8>) -> Result<()> {
        block_on((self as &nusb::Interface).bulk_out(endpoint, buf))
            .into_result()
            .map_err(|err| anyhow!("USB comms error: {}", err))?;
        Ok(())
    }

    fn bulk_in(&self, endpoint: u8, max_len: u16) -> Result<Vec<u8>> {
        block_on((self as &nusb::Interface).bulk_in(endpoint, RequestBuffer::new(max_len as usize)))
            .into_result()
            .map_err(|err| anyhow!("USB comms error: {}", err))
    }
}

/// Splits received bytes into lines at `\r` or `\n`, skipping empty lines.
#[derive(Default)]
pub struct LineSplitter {
    partial: Vec<u8>,
}

impl LineSplitter {
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        let mut lines = vec![];
        for &b in data {
            if b == b'\r' || b == b'\n' {
                if !self.partial.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.partial).into_owned());
                    self.partial.clear();
                }
            } else {
                self.partial.push(b);
            }
        }
        lines
    }
}

pub struct LineReceiver(mpsc::Receiver<String>);

impl LineReceiver {
    pub fn recv(&self) -> Result<String, RecvTimeoutError> {
        self.0.recv_timeout(REPLY_TIMEOUT)
    }

    /// Waits for a line without a time limit.
    pub fn recv_forever(&self) -> Result<String> {
        self.0
            .recv()
            .map_err(|_| anyhow!("keypad stopped sending"))
    }
}

/// One `OUT` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    /// Zero based analog key index.
    pub index: usize,
    pub raw: u16,
    pub mapped: u16,
}

pub struct KeypadCtl<I: KeypadInterface> {
    intf: I,
    epout: u8,
    epin: u8,
    subscriber: Mutex<Option<mpsc::Sender<String>>>,
}

impl KeypadCtl<nusb::Interface> {
    /// Claims the CDC data interface of `dev` and raises DTR so the keypad starts answering.
    pub fn open(dev: &nusb::Device) -> Result<Self> {
        let mut comm = None;
        let mut data = None;
        for config in dev.configurations() {
            for intf in config.interfaces() {
                for alt in intf.alt_settings() {
                    match alt.class() {
                        CDC_CLASS_COMM => comm = Some(alt.interface_number()),
                        CDC_CLASS_DATA => {
                            let mut epout = 0;
                            let mut epin = 0;
                            for ep in alt.endpoints() {
                                if ep.transfer_type() != EndpointType::Bulk {
                                    continue;
                                }
                                match ep.direction() {
                                    Direction::Out => epout = ep.address(),
                                    Direction::In => epin = ep.address(),
                                }
                            }
                            data = Some((alt.interface_number(), epout, epin));
                        }
                        _ => {}
                    }
                }
            }
        }
        let (Some(comm), Some((number, epout, epin))) = (comm, data) else {
            return Err(anyhow!("Keypad serial interface not found"));
        };

        let intf = dev.detach_and_claim_interface(number)?;
        block_on(intf.control_out(ControlOut {
            control_type: ControlType::Class,
            recipient: Recipient::Interface,
            request: SET_CONTROL_LINE_STATE,
            value: DTR,
            index: comm.into(),
            data: &[],
        }))
        .into_result()
        .map_err(|err| anyhow!("USB comms error: {}", err))?;

        Ok(Self::new(intf, epout, epin))
    }
}

impl<I: KeypadInterface> KeypadCtl<I> {
    pub fn new(intf: I, epout: u8, epin: u8) -> Self {
        Self {
            intf,
            epout,
            epin,
            subscriber: Mutex::new(None),
        }
    }

    /// Reads from the keypad until the interface fails, handing each line to the current
    /// subscriber. Lines arriving with no subscriber are dropped.
    pub fn listen(&self) -> Result<()> {
        let mut splitter = LineSplitter::default();
        loop {
            let data = self.intf.bulk_in(self.epin, MAX_PACKET)?;
            for line in splitter.push(&data) {
                log::debug!("< {line}");
                let guard = self
                    .subscriber
                    .lock()
                    .map_err(|_| anyhow!("subscriber lock poisoned"))?;
                if let Some(sender) = guard.as_ref() {
                    let _ = sender.send(line);
                }
            }
        }
    }

    /// Routes lines read by [`Self::listen`] to the returned receiver. Replaces any earlier
    /// subscriber.
    pub fn subscribe(&self) -> Result<LineReceiver> {
        let (sender, receiver) = mpsc::channel();
        *self
            .subscriber
            .lock()
            .map_err(|_| anyhow!("subscriber lock poisoned"))? = Some(sender);
        Ok(LineReceiver(receiver))
    }

    /// Sends one command line. The keypad ignores lines it does not understand, so nothing is
    /// checked here.
    pub fn send_line(&self, line: &str) -> Result<()> {
        if line.len() > MAX_LINE_LEN {
            return Err(anyhow!("line longer than {MAX_LINE_LEN} bytes"));
        }
        log::debug!("> {line}");
        let mut buf = Vec::with_capacity(line.len() + 2);
        buf.extend_from_slice(line.as_bytes());
        buf.extend_from_slice(b"\r\n");
        for chunk in buf.chunks(MAX_PACKET as usize) {
            self.intf.bulk_out(self.epout, chunk.to_vec())?;
        }
        Ok(())
    }

    /// Sends `get` and collects the dump.
    pub fn fetch_settings(&self) -> Result<DeviceSettings> {
        let receiver = self.subscribe()?;
        self.send_line("get")?;
        let mut lines = vec![];
        loop {
            let line = receiver
                .recv()
                .map_err(|_| anyhow!("keypad did not finish the settings dump"))?;
            let end = line == GET_END;
            lines.push(line);
            if end {
                return DeviceSettings::from_lines(lines.iter().map(String::as_str));
            }
        }
    }

    /// Sends `out` and collects one reading per analog key.
    pub fn fetch_readings(&self, keys: usize) -> Result<Vec<Reading>> {
        let receiver = self.subscribe()?;
        self.send_line("out")?;
        let mut readings = Vec::with_capacity(keys);
        while readings.len() < keys {
            let line = receiver
                .recv()
                .map_err(|_| anyhow!("keypad sent {} of {keys} readings", readings.len()))?;
            if let Some(reading) = to_reading(&line) {
                readings.push(reading);
            }
        }
        Ok(readings)
    }

    /// Switches calibration streaming on and hands each reading to `f` until it returns false,
    /// then switches streaming off again.
    pub fn stream_readings(&self, mut f: impl FnMut(Reading) -> bool) -> Result<()> {
        let receiver = self.subscribe()?;
        self.send_line("out 1")?;
        let result = loop {
            match receiver.recv_forever() {
                Ok(line) => {
                    if let Some(reading) = to_reading(&line) {
                        if !f(reading) {
                            break Ok(());
                        }
                    }
                }
                Err(err) => break Err(err),
            }
        };
        self.send_line("out 0")?;
        result
    }
}

fn to_reading(line: &str) -> Option<Reading> {
    match parse_reply(line)? {
        Reply::Out { index, raw, mapped } => Some(Reading { index, raw, mapped }),
        _ => None,
    }
}

#[cfg(test)]
#[path = "serial_coms_test.rs"]
mod test;
