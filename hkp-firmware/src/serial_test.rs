extern crate std;

use std::{collections::VecDeque, vec::Vec};

use embassy_futures::{
    block_on,
    select::{select, Either},
};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use hkp_common::protocol::TextReply;

use super::*;

fn complete(event: LineReadEvent<'_>) -> Option<Vec<u8>> {
    match event {
        LineReadEvent::Complete(bytes) => Some(bytes.to_vec()),
        _ => None,
    }
}

#[test]
fn reads_lines() {
    let mut reader = LineReader::<8>::new();
    for b in b"get" {
        assert!(matches!(reader.push_byte(*b), LineReadEvent::None));
    }
    assert_eq!(complete(reader.push_byte(b'\r')).unwrap(), b"get");
    assert!(matches!(reader.push_byte(b'\n'), LineReadEvent::None));
    for b in b"save" {
        reader.push_byte(*b);
    }
    assert_eq!(complete(reader.push_byte(b'\n')).unwrap(), b"save");
}

#[test]
fn drops_long_lines() {
    let mut reader = LineReader::<4>::new();
    for b in b"name" {
        assert!(matches!(reader.push_byte(*b), LineReadEvent::None));
    }
    assert!(matches!(reader.push_byte(b'x'), LineReadEvent::Overflow));
    assert!(matches!(reader.push_byte(b'y'), LineReadEvent::None));
    assert!(matches!(reader.push_byte(b'\n'), LineReadEvent::None));
    for b in b"out" {
        reader.push_byte(*b);
    }
    assert_eq!(complete(reader.push_byte(b'\n')).unwrap(), b"out");
}

#[test]
fn formats_lines() {
    let line = format_line(TextReply::Out {
        index: 0,
        raw: 3800,
        mapped: 0,
    })
    .unwrap();
    assert_eq!(line.as_str(), "OUT key1=3800 0");

    let long = "x".repeat(LINE_CAPACITY + 1);
    assert!(format_line(long.as_str()).is_none());
}

#[test]
fn line_channel_drops_when_full() {
    let channel = LineChannel::<NoopRawMutex, 2>::default();
    assert!(channel.try_send(format_line("a").unwrap()));
    assert!(channel.try_send(format_line("b").unwrap()));
    assert!(!channel.try_send(format_line("c").unwrap()));
    assert_eq!(channel.try_receive().unwrap().as_str(), "a");
    assert_eq!(channel.try_receive().unwrap().as_str(), "b");
    assert!(channel.try_receive().is_none());
}

struct FakeReceiver {
    packets: VecDeque<&'static [u8]>,
}

impl PacketReceiver for FakeReceiver {
    async fn wait_connection(&mut self) {}

    async fn read_packet(&mut self, buf: &mut [u8]) -> Result<usize, EndpointError> {
        match self.packets.pop_front() {
            Some(p) => {
                buf[..p.len()].copy_from_slice(p);
                Ok(p.len())
            }
            None => core::future::pending().await,
        }
    }
}

#[test]
fn reader_task_splits_packets() {
    let mut receiver = FakeReceiver {
        packets: VecDeque::from([&b"key1.uh 3"[..], b"00\r\nGE", b"T\n"]),
    };
    let inbound = LineChannel::<NoopRawMutex, 4>::default();

    let lines = block_on(async {
        let collect = async { (inbound.receive().await, inbound.receive().await) };
        match select(read_lines(&mut receiver, &inbound), collect).await {
            Either::First(_) => unreachable!(),
            Either::Second(lines) => lines,
        }
    });
    assert_eq!(lines.0.as_str(), "key1.uh 300");
    assert_eq!(lines.1.as_str(), "GET");
}

#[derive(Default)]
struct FakeSender {
    connected: bool,
    packets: Vec<Vec<u8>>,
}

impl PacketSender for FakeSender {
    fn connected(&self) -> bool {
        self.connected
    }

    fn max_packet_size(&self) -> u16 {
        8
    }

    async fn write_packet(&mut self, data: &[u8]) -> Result<(), EndpointError> {
        self.packets.push(data.to_vec());
        Ok(())
    }
}

#[test]
fn writes_terminated_packets() {
    let mut sender = FakeSender {
        connected: true,
        ..Default::default()
    };
    block_on(async {
        write_line(&mut sender, &format_line("GET END").unwrap())
            .await
            .unwrap();
        write_line(&mut sender, &format_line("OUT key1=1 2").unwrap())
            .await
            .unwrap();
    });
    assert_eq!(
        sender.packets,
        [
            &b"GET END\r"[..],
            b"\n",
            b"OUT key1",
            b"=1 2\r\n",
        ]
    );

    sender.packets.clear();
    block_on(write_line(&mut sender, &format_line("OUT k1").unwrap())).unwrap();
    assert_eq!(sender.packets, [&b"OUT k1\r\n"[..], b""]);
}

#[test]
fn writer_task_drops_lines_without_host() {
    let mut sender = FakeSender::default();
    let outbound = LineChannel::<NoopRawMutex, 4>::default();
    outbound.try_send(format_line("GET END").unwrap());

    block_on(async {
        let stop = async {
            // one yield lets the writer drain the queue
            embassy_futures::yield_now().await;
        };
        select(write_lines(&mut sender, &outbound), stop).await;
    });
    assert!(sender.packets.is_empty());
    assert!(outbound.try_receive().is_none());
}
