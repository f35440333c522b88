//! Host time driver for tests.
//!
//! Until a thread calls [set_time] it follows the wall clock and timers poll until they expire.
//! After that the clock only moves when a timer is scheduled, jumping straight to its deadline, so
//! a `Ticker` loop runs as fast as the test can poll it.

extern crate std;

use core::{cell::Cell, task::Waker};
use embassy_time_driver::Driver;
use std::time::SystemTime;

struct StubTimeDriver;

impl Driver for StubTimeDriver {
    fn now(&self) -> u64 {
        CLOCK.with(|clock| clock.get().unwrap_or_else(wall_clock_micros))
    }

    fn schedule_wake(&self, at: u64, waker: &Waker) {
        CLOCK.with(|clock| {
            if let Some(now) = clock.get() {
                clock.set(Some(now.max(at)));
            }
        });
        waker.wake_by_ref();
    }
}

fn wall_clock_micros() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_or(0, |d| d.as_micros() as u64)
}

std::thread_local! {
    static CLOCK: Cell<Option<u64>> = const { Cell::new(None) };
}

embassy_time_driver::time_driver_impl!(static TIME_DRIVER: StubTimeDriver = StubTimeDriver);

/// Freezes this thread's clock at `micros`.
pub fn set_time(micros: u64) {
    CLOCK.with(|clock| clock.set(Some(micros)));
}

pub fn now() -> u64 {
    StubTimeDriver.now()
}
