#![no_std]
#![no_main]

// Two hall-effect keys on ADC0 and ADC1 plus one mechanical switch on GP0.
hkp_builder::rp_run_keypad! {
    vendor_id: 0x6e0f,
    product_id: 0x0010,
    manufacturer: "Jacott",
    product: "HKP 3k",
    serial_number: "hkp:0010",
    flash_size: 2 * 1024 * 1024,
    analog: [PIN_26, PIN_27],
    digital: [PIN_0],
}
