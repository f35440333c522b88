//! RP2040 boards: ADC sampling for the analog keys and the [`rp_run_keypad!`] main.

pub use embassy_rp::{adc, bind_interrupts, flash, gpio, init, peripherals, rom_data, usb};

use hkp_firmware::key_scanner::AnalogSampler;

/// Reads each analog key from its own ADC channel, one blocking conversion per key.
pub struct AdcSampler<'d, const N: usize> {
    adc: adc::Adc<'d, adc::Blocking>,
    channels: [adc::Channel<'d>; N],
}

impl<'d, const N: usize> AdcSampler<'d, N> {
    pub fn new(adc: adc::Adc<'d, adc::Blocking>, channels: [adc::Channel<'d>; N]) -> Self {
        Self { adc, channels }
    }
}

impl<const N: usize> AnalogSampler<N> for AdcSampler<'_, N> {
    fn sample(&mut self) -> [Option<u16>; N] {
        let adc = &mut self.adc;
        let mut channels = self.channels.iter_mut();
        core::array::from_fn(|_| {
            let channel = channels.next()?;
            adc.blocking_read(channel).ok()
        })
    }
}

/// Pins the element type of an empty switch list.
pub fn switches<const N: usize>(pins: [gpio::Input<'static>; N]) -> [gpio::Input<'static>; N] {
    pins
}

/// Adds a `main` that runs a keypad with analog keys on ADC pins and digital keys on GPIO pins.
///
/// Digital keys are pulled up and pressed when shorted to ground. The settings record lives in
/// the last erase sector of flash.
///
/// # Example `main.rs`
///
/// ```rust
/// #![no_std]
/// #![no_main]
///
/// hkp_builder::rp_run_keypad! {
///     vendor_id: 0x1209,
///     product_id: 0x0001,
///     manufacturer: "Example",
///     product: "Two key pad",
///     serial_number: "hkp:0001",
///     flash_size: 2 * 1024 * 1024,
///     analog: [PIN_26, PIN_27],
///     digital: [PIN_0],
/// }
/// ```
#[macro_export]
macro_rules! rp_run_keypad {
    (
        vendor_id: $vid:expr,
        product_id: $pid:expr,
        manufacturer: $manufacturer:expr,
        product: $product:expr,
        serial_number: $serial_number:expr,
        flash_size: $flash_size:expr,
        analog: [$($analog:ident),+ $(,)?],
        digital: [$($digital:ident),* $(,)?] $(,)?
    ) => {
        use hkp_builder::rp::{self, adc, bind_interrupts, flash, gpio, peripherals::USB, usb};

        const FLASH_SIZE: usize = $flash_size;
        const CONFIG_OFFSET: u32 = (FLASH_SIZE - flash::ERASE_SIZE) as u32;

        bind_interrupts!(struct Irqs {
            USBCTRL_IRQ => usb::InterruptHandler<USB>;
        });

        fn reset() {
            cortex_m::peripheral::SCB::sys_reset()
        }

        fn reset_to_usb_boot() {
            rp::rom_data::reset_to_usb_boot(0, 0);
            #[allow(clippy::empty_loop)]
            loop {}
        }

        #[embassy_executor::main]
        async fn main(_spawner: embassy_executor::Spawner) -> ! {
            let p = rp::init(Default::default());

            let driver = usb::Driver::new(p.USB, Irqs);
            let sampler = rp::AdcSampler::new(
                adc::Adc::new_blocking(p.ADC, adc::Config::default()),
                [$(adc::Channel::new_pin(p.$analog, gpio::Pull::None)),+],
            );
            let switches = rp::switches([$(gpio::Input::new(p.$digital, gpio::Pull::Up)),*]);
            let flash = flash::Flash::<_, flash::Blocking, FLASH_SIZE>::new_blocking(p.FLASH);
            let store = hkp_builder::config_store::FlashConfigStore::new(
                flash,
                CONFIG_OFFSET,
                flash::ERASE_SIZE,
            );

            hkp_builder::exec::KeypadBuilder::new($vid, $pid, driver, sampler, switches, store)
                .reset(&reset)
                .reset_to_usb_boot(&reset_to_usb_boot)
                .manufacturer($manufacturer)
                .product($product)
                .serial_number($serial_number)
                .build()
                .run()
                .await
        }
    };
}
