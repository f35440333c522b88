use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;

use crate::usb_test_stub::{MyDriver, MyEndpointIn};

use super::*;

extern crate alloc;
use alloc::vec;

macro_rules! setup {
    ($messages:ident, $rep:ident, $x:tt) => {
        block_on(async {
            let ep_in = MyEndpointIn::default();
            let $messages = ep_in.messages.clone();
            let hid_writer = HidWriter::<'_, MyDriver, 34>::new(ep_in);
            let mut $rep = Reporter::new(hid_writer);

            $x
        });
    };
}

fn key(key_char: u8, pressed: bool) -> KeyEvent {
    KeyEvent::Key { key_char, pressed }
}

#[test]
fn basic_report() {
    setup!(messages, reporter, {
        reporter.report(key(b'b', true)).await;
        reporter.report(key(b'a', true)).await;
        reporter.report(key(b'a', false)).await;

        assert_eq!(messages.get().len(), 34);
        assert_eq!(&messages.get()[..5], &vec![6, 0, 48, 0, 0]);
        assert_eq!(&messages.get()[..5], &vec![6, 0, 32, 0, 0]);
        assert!(messages.is_empty());
    });
}

#[test]
fn shifted_chars() {
    setup!(messages, reporter, {
        reporter.report(key(b'A', true)).await;
        reporter.report(key(b'!', true)).await;
        reporter.report(key(b'A', false)).await;
        reporter.report(key(b'!', false)).await;

        assert_eq!(&messages.get()[..5], &vec![6, 2, 16, 0, 0]);
        assert_eq!(&messages.get()[..7], &vec![6, 2, 16, 0, 0, 64, 0]);
        assert_eq!(&messages.get()[..7], &vec![6, 2, 0, 0, 0, 64, 0]);
        assert_eq!(&messages.get()[..7], &vec![6, 0, 0, 0, 0, 0, 0]);
    });
}

#[test]
fn chars_sharing_a_usage_release_shift() {
    setup!(messages, reporter, {
        reporter.report(key(b'A', true)).await;
        reporter.report(key(b'a', true)).await;
        reporter.report(key(b'a', false)).await;
        reporter.report(key(b'A', false)).await;

        assert_eq!(&messages.get()[..3], &vec![6, 2, 16]);
        // `a` takes the usage over from `A` without shift
        assert_eq!(&messages.get()[..3], &vec![6, 0, 0]);
        assert_eq!(&messages.get()[..3], &vec![6, 0, 16]);
        assert_eq!(&messages.get()[..3], &vec![6, 0, 0]);
        assert_eq!(&messages.get()[..3], &vec![6, 0, 0]);
        assert!(messages.is_empty());
    });
}

#[test]
fn modifier_chars() {
    setup!(messages, reporter, {
        // left ctrl, then left shift held as a key of its own
        reporter.report(key(0x80, true)).await;
        reporter.report(key(0x81, true)).await;
        reporter.report(key(b'A', true)).await;
        reporter.report(key(b'A', false)).await;
        reporter.report(key(0x80, false)).await;

        assert_eq!(&messages.get()[..3], &vec![6, 1, 0]);
        assert_eq!(&messages.get()[..3], &vec![6, 3, 0]);
        assert_eq!(&messages.get()[..3], &vec![6, 3, 16]);
        assert_eq!(&messages.get()[..3], &vec![6, 3, 0]);
        assert_eq!(&messages.get()[..3], &vec![6, 2, 0]);
    });
}

#[test]
fn repeated_press() {
    setup!(messages, reporter, {
        reporter.report(key(b'a', true)).await;
        reporter.report(key(b'a', true)).await;

        assert_eq!(&messages.get()[..3], &vec![6, 0, 16]);
        assert_eq!(&messages.get()[..3], &vec![6, 0, 0]);
        assert_eq!(&messages.get()[..3], &vec![6, 0, 16]);
    });
}

#[test]
fn unmapped_char_is_ignored() {
    setup!(messages, reporter, {
        reporter.report(key(0, true)).await;
        reporter.report(key(0x89, true)).await;
        assert!(messages.is_empty());
    });
}

#[test]
fn clear() {
    setup!(messages, reporter, {
        reporter.report(key(b'Z', true)).await;
        reporter.report(key(0x87, true)).await;
        reporter.report(KeyEvent::Clear).await;
        messages.get();
        messages.get();

        let report = messages.get();
        assert_eq!(report[0], 6);
        assert!(report[1..].iter().all(|b| *b == 0));

        // shift is no longer owed to the released char
        reporter.report(key(b'z', true)).await;
        assert_eq!(&messages.get()[..6], &vec![6, 0, 0, 0, 0, 0x20]);
    });
}

#[test]
fn overflowing_channel_sends_clear() {
    let channel = ReportChannel::<NoopRawMutex, 3>::default();
    channel.report(key(b'a', true));
    channel.report(key(b'b', true));
    channel.report(key(b'c', true));
    channel.report(key(b'd', true));

    assert_eq!(channel.try_receive(), Some(KeyEvent::Clear));
    assert_eq!(channel.try_receive(), None);

    channel.report(key(b'e', false));
    assert_eq!(channel.try_receive(), Some(key(b'e', false)));
}
