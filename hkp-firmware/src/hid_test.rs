extern crate std;

use embassy_futures::block_on;
use embassy_usb::driver::{EndpointAddress, EndpointInfo, EndpointType};

use crate::usb_test_stub::{MyDriver, MyEndpointIn};

use super::*;

#[test]
fn splits_into_packets() {
    block_on(async {
        let ep_in = MyEndpointIn {
            info: EndpointInfo {
                addr: EndpointAddress::from(0),
                ep_type: EndpointType::Interrupt,
                max_packet_size: 16,
                interval_ms: 1,
            },
            ..Default::default()
        };
        let messages = ep_in.messages.clone();
        let mut writer = HidWriter::<'_, MyDriver, 64>::new(ep_in);

        writer.write(&[1; 34]).await.unwrap();
        assert_eq!(messages.get().len(), 16);
        assert_eq!(messages.get().len(), 16);
        assert_eq!(messages.get(), std::vec![1, 1]);

        // a short report filling whole packets is terminated by an empty packet
        writer.write(&[2; 32]).await.unwrap();
        assert_eq!(messages.get().len(), 16);
        assert_eq!(messages.get().len(), 16);
        assert!(messages.get().is_empty());
    });
}

#[test]
fn rejects_oversized_report() {
    block_on(async {
        let ep_in = MyEndpointIn::default();
        let messages = ep_in.messages.clone();
        let mut writer = HidWriter::<'_, MyDriver, 8>::new(ep_in);

        assert_eq!(
            writer.write(&[0; 9]).await,
            Err(EndpointError::BufferOverflow)
        );
        assert!(messages.is_empty());
    });
}
