//! Line transport between the CDC serial interface and the keypad.
//!
//! The reader collects bytes into lines and queues them for the scanner. The writer drains
//! replies to the host, one line per `\r\n` terminated write.

use core::fmt::{self, Write};

use embassy_sync::{blocking_mutex::raw::RawMutex, channel::Channel};
use embassy_usb::{
    class::cdc_acm,
    driver::{Driver, EndpointError},
};
use hkp_common::protocol::{MAX_LINE_LEN, MAX_REPLY_LEN};

use crate::{debug, warn};

pub const LINE_CAPACITY: usize = if MAX_LINE_LEN > MAX_REPLY_LEN {
    MAX_LINE_LEN
} else {
    MAX_REPLY_LEN
};

pub type Line = heapless::String<LINE_CAPACITY>;

/// Formats `value` as a line, or `None` if it does not fit.
pub fn format_line(value: impl fmt::Display) -> Option<Line> {
    let mut line = Line::new();
    write!(line, "{value}").ok()?;
    Some(line)
}

pub enum LineReadEvent<'a> {
    None,
    Complete(&'a [u8]),
    Overflow,
}

/// Splits a byte stream at `\r` or `\n`. Empty lines are skipped and a line longer than `N` is
/// dropped up to its terminator.
pub struct LineReader<const N: usize> {
    line_buf: [u8; N],
    line_len: usize,
    overflowed: bool,
}

impl<const N: usize> Default for LineReader<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LineReader<N> {
    pub const fn new() -> Self {
        Self {
            line_buf: [0; N],
            line_len: 0,
            overflowed: false,
        }
    }

    pub fn push_byte(&mut self, byte: u8) -> LineReadEvent<'_> {
        if byte == b'\r' || byte == b'\n' {
            if self.overflowed {
                self.overflowed = false;
                return LineReadEvent::None;
            }
            if self.line_len == 0 {
                return LineReadEvent::None;
            }
            let len = self.line_len;
            self.line_len = 0;
            return LineReadEvent::Complete(&self.line_buf[..len]);
        }

        if self.overflowed {
            return LineReadEvent::None;
        }

        if self.line_len < N {
            self.line_buf[self.line_len] = byte;
            self.line_len += 1;
            return LineReadEvent::None;
        }

        self.line_len = 0;
        self.overflowed = true;
        LineReadEvent::Overflow
    }
}

pub struct LineChannel<M: RawMutex, const N: usize>(Channel<M, Line, N>);
impl<M: RawMutex, const N: usize> Default for LineChannel<M, N> {
    fn default() -> Self {
        Self(Channel::new())
    }
}
impl<M: RawMutex, const N: usize> LineChannel<M, N> {
    pub async fn send(&self, line: Line) {
        self.0.send(line).await;
    }

    /// Queues `line` unless the channel is full. Returns false if the line was dropped.
    pub fn try_send(&self, line: Line) -> bool {
        self.0.try_send(line).is_ok()
    }

    pub async fn receive(&self) -> Line {
        self.0.receive().await
    }

    pub fn try_receive(&self) -> Option<Line> {
        self.0.try_receive().ok()
    }
}

#[allow(async_fn_in_trait)]
pub trait PacketReceiver {
    async fn wait_connection(&mut self);
    async fn read_packet(&mut self, buf: &mut [u8]) -> Result<usize, EndpointError>;
}

#[allow(async_fn_in_trait)]
pub trait PacketSender {
    /// True while the host has the port open.
    fn connected(&self) -> bool;
    fn max_packet_size(&self) -> u16;
    async fn write_packet(&mut self, data: &[u8]) -> Result<(), EndpointError>;
}

impl<'d, D: Driver<'d>> PacketReceiver for cdc_acm::Receiver<'d, D> {
    async fn wait_connection(&mut self) {
        cdc_acm::Receiver::wait_connection(self).await
    }

    async fn read_packet(&mut self, buf: &mut [u8]) -> Result<usize, EndpointError> {
        cdc_acm::Receiver::read_packet(self, buf).await
    }
}

impl<'d, D: Driver<'d>> PacketSender for cdc_acm::Sender<'d, D> {
    fn connected(&self) -> bool {
        self.dtr()
    }

    fn max_packet_size(&self) -> u16 {
        cdc_acm::Sender::max_packet_size(self)
    }

    async fn write_packet(&mut self, data: &[u8]) -> Result<(), EndpointError> {
        cdc_acm::Sender::write_packet(self, data).await
    }
}

/// Reads command lines from the host forever.
pub async fn read_lines<R: PacketReceiver, M: RawMutex, const N: usize>(
    receiver: &mut R,
    inbound: &LineChannel<M, N>,
) -> ! {
    let mut reader = LineReader::<MAX_LINE_LEN>::new();
    let mut buf = [0; 64];
    loop {
        receiver.wait_connection().await;
        debug!("serial connected");
        loop {
            let n = match receiver.read_packet(&mut buf).await {
                Ok(n) => n,
                Err(EndpointError::Disabled) => break,
                Err(e) => {
                    warn!("serial read failed: {:?}", e);
                    continue;
                }
            };
            for &byte in &buf[..n] {
                let line = match reader.push_byte(byte) {
                    LineReadEvent::Complete(bytes) => core::str::from_utf8(bytes)
                        .ok()
                        .and_then(|s| Line::try_from(s).ok()),
                    LineReadEvent::Overflow => {
                        warn!("serial line too long");
                        None
                    }
                    LineReadEvent::None => None,
                };
                if let Some(line) = line {
                    inbound.send(line).await;
                }
            }
        }
    }
}

/// Writes reply lines to the host forever. Lines queued while no host is listening are dropped.
pub async fn write_lines<S: PacketSender, M: RawMutex, const N: usize>(
    sender: &mut S,
    outbound: &LineChannel<M, N>,
) -> ! {
    loop {
        let line = outbound.receive().await;
        if !sender.connected() {
            continue;
        }
        if let Err(e) = write_line(sender, &line).await {
            warn!("serial write failed: {:?}", e);
        }
    }
}

async fn write_line<S: PacketSender>(sender: &mut S, line: &Line) -> Result<(), EndpointError> {
    let mut buf = [0; LINE_CAPACITY + 2];
    let len = line.len() + 2;
    buf[..line.len()].copy_from_slice(line.as_bytes());
    buf[line.len()..len].copy_from_slice(b"\r\n");

    let max_packet_size = usize::from(sender.max_packet_size());
    for chunk in buf[..len].chunks(max_packet_size) {
        sender.write_packet(chunk).await?;
    }
    if len % max_packet_size == 0 {
        sender.write_packet(&[]).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "serial_test.rs"]
mod test;
