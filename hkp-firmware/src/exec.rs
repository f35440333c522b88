//! Wires the keypad together and runs it.
//!
//! A board hands [`KeypadBuilder`] its USB driver, analog sampler, switch pins and config store,
//! then awaits [`HkpKeypad::run`] from its main task.

use embassy_futures::{
    join::join,
    select::{select4, Either4},
};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_time::Duration;
use embassy_usb::{class::cdc_acm, driver::Driver, Config};
use embedded_hal::digital::InputPin;
use static_cell::StaticCell;

use crate::{
    config_store::ConfigStore,
    firmware_functions::{self, ResetFn},
    info,
    key_reporter::{ReportChannel, Reporter},
    key_scanner::{AnalogSampler, KeyScanner},
    keypad::Keypad,
    serial::{read_lines, write_lines, LineChannel},
    usb::{Configurator, State, UsbBuffers},
};

// Key events queued before the oldest are dropped for a Clear
const REPORT_BUFFER_SIZE: usize = 32;
// Lines queued in each direction. A whole `get` dump has to fit.
const LINE_BUFFER_SIZE: usize = 48;

const DEFAULT_SCAN_PERIOD: Duration = Duration::from_micros(500);

type Reports = ReportChannel<NoopRawMutex, REPORT_BUFFER_SIZE>;
type Lines = LineChannel<NoopRawMutex, LINE_BUFFER_SIZE>;

static REPORT_CHANNEL: StaticCell<Reports> = StaticCell::new();
static INBOUND_LINES: StaticCell<Lines> = StaticCell::new();
static OUTBOUND_LINES: StaticCell<Lines> = StaticCell::new();

static USB_BUFFERS: StaticCell<UsbBuffers> = StaticCell::new();
static KEYBOARD_STATE: StaticCell<State> = StaticCell::new();
static SERIAL_STATE: StaticCell<cdc_acm::State> = StaticCell::new();

pub struct KeypadBuilder<
    D: Driver<'static>,
    S: AnalogSampler<ANALOG_N>,
    I: InputPin,
    C: ConfigStore<ANALOG_N, DIGITAL_N>,
    const ANALOG_N: usize,
    const DIGITAL_N: usize,
> {
    reset: Option<ResetFn>,
    reset_to_usb_boot: Option<ResetFn>,
    usb_config: Config<'static>,
    driver: D,
    sampler: S,
    switches: [I; DIGITAL_N],
    store: C,
    scan_period: Duration,
}

pub struct HkpKeypad<
    D: Driver<'static>,
    S: AnalogSampler<ANALOG_N>,
    I: InputPin,
    C: ConfigStore<ANALOG_N, DIGITAL_N>,
    const ANALOG_N: usize,
    const DIGITAL_N: usize,
> {
    builder: KeypadBuilder<D, S, I, C, ANALOG_N, DIGITAL_N>,
    reports: &'static Reports,
    inbound: &'static Lines,
    outbound: &'static Lines,
}

impl<
        D: Driver<'static> + 'static,
        S: AnalogSampler<ANALOG_N>,
        I: InputPin,
        C: ConfigStore<ANALOG_N, DIGITAL_N>,
        const ANALOG_N: usize,
        const DIGITAL_N: usize,
    > HkpKeypad<D, S, I, C, ANALOG_N, DIGITAL_N>
{
    // key counts are stored as bytes
    const CHECK: () = assert!(ANALOG_N < 256 && DIGITAL_N < 256);

    pub async fn run(self) -> ! {
        #[allow(clippy::let_unit_value)]
        let () = Self::CHECK;

        let Self {
            builder,
            reports,
            inbound,
            outbound,
        } = self;
        let KeypadBuilder {
            reset,
            reset_to_usb_boot,
            mut usb_config,
            driver,
            sampler,
            switches,
            mut store,
            scan_period,
        } = builder;

        firmware_functions::handle_reset(reset);
        firmware_functions::handle_reset_to_usb_boot(reset_to_usb_boot);

        let config = store.load_or_default();
        info!("{} analog and {} digital keys", ANALOG_N, DIGITAL_N);
        let keypad = Keypad::new(config, reports, outbound);
        let mut scanner = KeyScanner::new(sampler, switches, keypad, inbound, store, scan_period);

        let configurator = Configurator::new(&mut usb_config);
        let usb_buffers: &'static mut UsbBuffers = USB_BUFFERS.init(UsbBuffers::default());
        let mut usb_builder = configurator.usb_builder(driver, usb_config, usb_buffers);

        let keyboard =
            configurator.add_keyboard(&mut usb_builder, KEYBOARD_STATE.init(State::new()));
        let (mut sender, mut receiver) =
            configurator.add_serial(&mut usb_builder, SERIAL_STATE.init(cdc_acm::State::new()));

        let mut usb = usb_builder.build();
        let mut reporter = Reporter::new(keyboard);

        match select4(
            usb.run(),
            reporter.run(reports),
            join(
                read_lines(&mut receiver, inbound),
                write_lines(&mut sender, outbound),
            ),
            scanner.run(),
        )
        .await
        {
            Either4::First(never) => never,
            Either4::Second(never) => never,
            Either4::Third((never, _)) => never,
            Either4::Fourth(never) => never,
        }
    }
}

impl<
        D: Driver<'static> + 'static,
        S: AnalogSampler<ANALOG_N>,
        I: InputPin,
        C: ConfigStore<ANALOG_N, DIGITAL_N>,
        const ANALOG_N: usize,
        const DIGITAL_N: usize,
    > KeypadBuilder<D, S, I, C, ANALOG_N, DIGITAL_N>
{
    pub fn new(
        vid: u16,
        pid: u16,
        driver: D,
        sampler: S,
        switches: [I; DIGITAL_N],
        store: C,
    ) -> Self {
        Self {
            reset: None,
            reset_to_usb_boot: None,
            usb_config: Config::new(vid, pid),
            driver,
            sampler,
            switches,
            store,
            scan_period: DEFAULT_SCAN_PERIOD,
        }
    }

    pub fn reset(mut self, value: ResetFn) -> Self {
        self.reset = Some(value);
        self
    }

    pub fn reset_to_usb_boot(mut self, value: ResetFn) -> Self {
        self.reset_to_usb_boot = Some(value);
        self
    }

    pub fn manufacturer(mut self, value: &'static str) -> Self {
        self.usb_config.manufacturer = Some(value);
        self
    }

    pub fn product(mut self, value: &'static str) -> Self {
        self.usb_config.product = Some(value);
        self
    }

    /// The config tool only lists devices whose serial number starts with `hkp:`.
    pub fn serial_number(mut self, value: &'static str) -> Self {
        self.usb_config.serial_number = Some(value);
        self
    }

    pub fn max_power(mut self, value: u16) -> Self {
        self.usb_config.max_power = value;
        self
    }

    pub fn scan_period(mut self, value: Duration) -> Self {
        self.scan_period = value;
        self
    }

    /// Can only be called once; the channels live in statics.
    pub fn build(self) -> HkpKeypad<D, S, I, C, ANALOG_N, DIGITAL_N> {
        HkpKeypad {
            builder: self,
            reports: REPORT_CHANNEL.init(Reports::default()),
            inbound: INBOUND_LINES.init(Lines::default()),
            outbound: OUTBOUND_LINES.init(Lines::default()),
        }
    }
}
