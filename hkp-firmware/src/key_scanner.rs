//! The fixed rate scan loop.
//!
//! Each tick samples every analog key and reads every switch, then hands the readings to the
//! [`Keypad`]. Command lines from the host are applied between ticks, never during one.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Ticker};
use embedded_hal::digital::InputPin;

use crate::{
    calibration::RestCalibration,
    config_store::ConfigStore,
    debug, firmware_functions, info,
    keypad::{Keypad, Outcome},
    serial::LineChannel,
    warn,
};

/// Produces one raw reading per analog key without blocking.
pub trait AnalogSampler<const N: usize> {
    /// `None` marks a key whose conversion failed this tick.
    fn sample(&mut self) -> [Option<u16>; N];
}

pub struct KeyScanner<
    'c,
    S: AnalogSampler<A>,
    I: InputPin,
    C: ConfigStore<A, D>,
    M: RawMutex,
    const A: usize,
    const D: usize,
    const REPORT_N: usize,
    const LINE_N: usize,
> {
    sampler: S,
    /// Digital keys, pressed when the pin reads low.
    switches: [I; D],
    keypad: Keypad<'c, M, A, D, REPORT_N, LINE_N>,
    inbound: &'c LineChannel<M, LINE_N>,
    store: C,
    period: Duration,
}

impl<
        'c,
        S: AnalogSampler<A>,
        I: InputPin,
        C: ConfigStore<A, D>,
        M: RawMutex,
        const A: usize,
        const D: usize,
        const REPORT_N: usize,
        const LINE_N: usize,
    > KeyScanner<'c, S, I, C, M, A, D, REPORT_N, LINE_N>
{
    pub fn new(
        sampler: S,
        switches: [I; D],
        keypad: Keypad<'c, M, A, D, REPORT_N, LINE_N>,
        inbound: &'c LineChannel<M, LINE_N>,
        store: C,
        period: Duration,
    ) -> Self {
        Self {
            sampler,
            switches,
            keypad,
            inbound,
            store,
            period,
        }
    }

    pub fn keypad(&self) -> &Keypad<'c, M, A, D, REPORT_N, LINE_N> {
        &self.keypad
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    /// Learns rest positions, then scans and serves commands forever.
    pub async fn run(&mut self) -> ! {
        self.calibrate().await;

        let inbound = self.inbound;
        let mut ticker = Ticker::every(self.period);
        loop {
            match select(ticker.next(), inbound.receive()).await {
                Either::First(()) => self.scan(),
                Either::Second(line) => self.handle_line(&line),
            }
        }
    }

    /// One tick.
    pub fn scan(&mut self) {
        let readings = self.sampler.sample();
        let switches = core::array::from_fn(|i| self.switches[i].is_low().unwrap_or(false));
        self.keypad.tick(&readings, &switches);
    }

    /// Averages readings over the calibration window and commits them as rest positions.
    pub async fn calibrate(&mut self) {
        let mut calibration = RestCalibration::<A>::new();
        let mut ticker = Ticker::every(self.period);
        while !calibration.add(&self.sampler.sample()) {
            ticker.next().await;
        }
        self.keypad.calibrate(&calibration);
        info!("rest positions calibrated");
    }

    pub fn handle_line(&mut self, line: &str) {
        match self.keypad.execute(line) {
            Ok(Outcome::Done) => {}
            Ok(Outcome::Save) => match self.store.save(self.keypad.config()) {
                Ok(()) => info!("config saved"),
                Err(e) => warn!("config save failed: {:?}", e),
            },
            Ok(Outcome::Boot) => {
                if !firmware_functions::reset_to_usb_boot() {
                    warn!("no usb boot handler");
                }
            }
            Err(e) => debug!("command ignored: {:?}", e),
        }
    }
}

#[cfg(test)]
#[path = "key_scanner_test.rs"]
mod test;
