//! USB composite device: an NKRO keyboard and a CDC-ACM serial port.

use core::mem::MaybeUninit;

use embassy_usb::{
    class::cdc_acm::{self, CdcAcmClass},
    control::{InResponse, OutResponse, Recipient, Request, RequestType},
    driver::Driver,
    types::InterfaceNumber,
    Builder, Config, Handler,
};

use crate::hid::HidWriter;

const HID_DESC_DESCTYPE_HID: u8 = 0x21;
const HID_DESC_DESCTYPE_HID_REPORT: u8 = 0x22;
const HID_DESC_SPEC_1_11: [u8; 2] = [0x11, 0x01];
const HID_DESC_COUNTRY_UNSPEC: u8 = 0x00;

const HID_REQ_GET_REPORT: u8 = 0x01;
const HID_REQ_GET_IDLE: u8 = 0x02;
const HID_REQ_GET_PROTOCOL: u8 = 0x03;
const HID_REQ_SET_REPORT: u8 = 0x09;
const HID_REQ_SET_IDLE: u8 = 0x0a;
const HID_REQ_SET_PROTOCOL: u8 = 0x0b;

const HID_CLASS: u8 = 3;
const HID_SUBCLASS_NONE: u8 = 0;
const HID_PROTOCOL_KEYBOARD: u8 = 1;

/// Report id 6: a modifier byte followed by one bit per usage `0x00..=0xfe`, plus the usual five
/// LED bits going the other way.
#[rustfmt::skip]
pub const KEYBOARD_REPORT_DESC: [u8; 59] = [
    0x05, 0x01, // USAGE_PAGE (Generic Desktop)
    0x09, 0x06, // USAGE (Keyboard)
    0xA1, 0x01, // COLLECTION (Application)
    0x85, 0x06, //   REPORT_ID (6)
    0x05, 0x07, //   USAGE_PAGE (Keyboard/Keypad)
    0x19, 0xE0, //   USAGE_MINIMUM (Left Control)
    0x29, 0xE7, //   USAGE_MAXIMUM (Right GUI)
    0x15, 0x00, //   LOGICAL_MINIMUM (0)
    0x25, 0x01, //   LOGICAL_MAXIMUM (1)
    0x95, 0x08, //   REPORT_COUNT (8)
    0x75, 0x01, //   REPORT_SIZE (1)
    0x81, 0x02, //   INPUT (Data, Variable, Absolute)
    0x05, 0x07, //   USAGE_PAGE (Keyboard/Keypad)
    0x19, 0x00, //   USAGE_MINIMUM (0)
    0x29, 0xFE, //   USAGE_MAXIMUM (0xfe)
    0x15, 0x00, //   LOGICAL_MINIMUM (0)
    0x25, 0x01, //   LOGICAL_MAXIMUM (1)
    0x95, 0xFF, //   REPORT_COUNT (255)
    0x75, 0x01, //   REPORT_SIZE (1)
    0x81, 0x02, //   INPUT (Data, Variable, Absolute)
    0x05, 0x08, //   USAGE_PAGE (LEDs)
    0x19, 0x01, //   USAGE_MINIMUM (Num Lock)
    0x29, 0x05, //   USAGE_MAXIMUM (Kana)
    0x95, 0x05, //   REPORT_COUNT (5)
    0x75, 0x01, //   REPORT_SIZE (1)
    0x91, 0x02, //   OUTPUT (Data, Variable, Absolute)
    0x95, 0x01, //   REPORT_COUNT (1)
    0x75, 0x03, //   REPORT_SIZE (3)
    0x91, 0x01, //   OUTPUT (Constant) padding
    0xC0,       // END_COLLECTION
];

/// Report id, modifiers and the usage bitmap.
pub const KEYBOARD_REPORT_SIZE: usize = crate::KEY_BITS_SIZE + 2;

/// Serial packet size; also the size the host reads in.
pub const CDC_PACKET_SIZE: u16 = 64;

/// Storage the keyboard interface's control handler lives in.
pub struct State<'d> {
    control: MaybeUninit<Control<'d>>,
}

impl Default for State<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl State<'_> {
    pub const fn new() -> Self {
        State {
            control: MaybeUninit::uninit(),
        }
    }
}

const CONFIG_SIZE: usize = 256;
const BOS_SIZE: usize = 32;
const MSOS_SIZE: usize = 0;
const CONTROL_SIZE: usize = 128;

pub struct UsbBuffers {
    config_descriptor_buf: [u8; CONFIG_SIZE],
    bos_descriptor_buf: [u8; BOS_SIZE],
    msos_descriptor_buf: [u8; MSOS_SIZE],
    control_buf: [u8; CONTROL_SIZE],
}

impl Default for UsbBuffers {
    fn default() -> Self {
        Self {
            config_descriptor_buf: [0; CONFIG_SIZE],
            bos_descriptor_buf: [0; BOS_SIZE],
            msos_descriptor_buf: [0; MSOS_SIZE],
            control_buf: [0; CONTROL_SIZE],
        }
    }
}

pub struct Configurator {
    max_packet_size: u16,
    poll_ms: u8,
}

impl Configurator {
    /// Marks `device_config` as a composite device with interface association descriptors, which
    /// the CDC function needs.
    pub fn new(device_config: &mut Config<'_>) -> Self {
        device_config.device_class = 0xEF;
        device_config.device_sub_class = 0x02;
        device_config.device_protocol = 0x01;
        device_config.composite_with_iads = true;
        Self {
            max_packet_size: u16::from(device_config.max_packet_size_0),
            poll_ms: 1,
        }
    }

    pub fn usb_builder<'d, D: Driver<'d>>(
        &self,
        driver: D,
        device_config: Config<'d>,
        buffers: &'d mut UsbBuffers,
    ) -> Builder<'d, D> {
        Builder::new(
            driver,
            device_config,
            &mut buffers.config_descriptor_buf,
            &mut buffers.bos_descriptor_buf,
            &mut buffers.msos_descriptor_buf,
            &mut buffers.control_buf,
        )
    }

    pub fn add_keyboard<'d, D: Driver<'d>>(
        &self,
        builder: &mut Builder<'d, D>,
        state: &'d mut State<'d>,
    ) -> HidWriter<'d, D, KEYBOARD_REPORT_SIZE> {
        let mut func = builder.function(HID_CLASS, HID_SUBCLASS_NONE, HID_PROTOCOL_KEYBOARD);
        let mut iface = func.interface();
        let if_num = iface.interface_number();
        let mut alt = iface.alt_setting(HID_CLASS, HID_SUBCLASS_NONE, HID_PROTOCOL_KEYBOARD, None);

        let control = Control::new(if_num, &KEYBOARD_REPORT_DESC);
        alt.descriptor(HID_DESC_DESCTYPE_HID, &control.hid_descriptor[2..]);
        let ep_in = alt.endpoint_interrupt_in(self.max_packet_size, self.poll_ms);
        drop(func);

        builder.handler(state.control.write(control));
        HidWriter::new(ep_in)
    }

    pub fn add_serial<'d, D: Driver<'d>>(
        &self,
        builder: &mut Builder<'d, D>,
        state: &'d mut cdc_acm::State<'d>,
    ) -> (cdc_acm::Sender<'d, D>, cdc_acm::Receiver<'d, D>) {
        CdcAcmClass::new(builder, state, CDC_PACKET_SIZE).split()
    }
}

struct Control<'d> {
    if_num: InterfaceNumber,
    report_descriptor: &'d [u8],
    hid_descriptor: [u8; 9],
    idle: u8,
}

impl<'d> Control<'d> {
    fn new(if_num: InterfaceNumber, report_descriptor: &'d [u8]) -> Self {
        let len = report_descriptor.len();
        Control {
            if_num,
            report_descriptor,
            hid_descriptor: [
                9, // length
                HID_DESC_DESCTYPE_HID,
                HID_DESC_SPEC_1_11[0],
                HID_DESC_SPEC_1_11[1],
                HID_DESC_COUNTRY_UNSPEC,
                1, // one report descriptor follows
                HID_DESC_DESCTYPE_HID_REPORT,
                (len & 0xFF) as u8,
                (len >> 8 & 0xFF) as u8,
            ],
            idle: 0,
        }
    }

    fn is_mine(&self, req: &Request) -> bool {
        req.index == u16::from(self.if_num.0)
    }
}

impl Handler for Control<'_> {
    fn reset(&mut self) {
        self.idle = 0;
    }

    fn control_out(&mut self, req: Request, _data: &[u8]) -> Option<OutResponse> {
        if (req.request_type, req.recipient) != (RequestType::Class, Recipient::Interface)
            || !self.is_mine(&req)
        {
            return None;
        }

        match req.request {
            HID_REQ_SET_IDLE => {
                self.idle = (req.value >> 8) as u8;
                Some(OutResponse::Accepted)
            }
            // LED state; nothing to show it on
            HID_REQ_SET_REPORT => Some(OutResponse::Accepted),
            HID_REQ_SET_PROTOCOL => {
                if req.value == 1 {
                    Some(OutResponse::Accepted)
                } else {
                    crate::warn!("HID boot protocol is unsupported");
                    Some(OutResponse::Rejected)
                }
            }
            _ => Some(OutResponse::Rejected),
        }
    }

    fn control_in<'a>(&'a mut self, req: Request, buf: &'a mut [u8]) -> Option<InResponse<'a>> {
        if !self.is_mine(&req) {
            return None;
        }

        match (req.request_type, req.recipient, req.request) {
            (RequestType::Standard, Recipient::Interface, Request::GET_DESCRIPTOR) => {
                match (req.value >> 8) as u8 {
                    HID_DESC_DESCTYPE_HID_REPORT => {
                        Some(InResponse::Accepted(self.report_descriptor))
                    }
                    HID_DESC_DESCTYPE_HID => Some(InResponse::Accepted(&self.hid_descriptor)),
                    _ => Some(InResponse::Rejected),
                }
            }
            (RequestType::Class, Recipient::Interface, HID_REQ_GET_IDLE) => {
                buf[0] = self.idle;
                Some(InResponse::Accepted(&buf[..1]))
            }
            (RequestType::Class, Recipient::Interface, HID_REQ_GET_PROTOCOL) => {
                // report protocol only
                buf[0] = 1;
                Some(InResponse::Accepted(&buf[..1]))
            }
            (RequestType::Class, Recipient::Interface, HID_REQ_GET_REPORT) => {
                Some(InResponse::Rejected)
            }
            (_, Recipient::Interface, _) => Some(InResponse::Rejected),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "usb_test.rs"]
mod test;
