use embassy_usb::driver::{Driver, Endpoint, EndpointError, EndpointIn};

pub struct HidWriter<'d, D: Driver<'d>, const N: usize> {
    ep_in: D::EndpointIn,
}

impl<'d, D: Driver<'d>, const N: usize> HidWriter<'d, D, N> {
    pub fn new(ep_in: <D>::EndpointIn) -> Self {
        Self { ep_in }
    }

    /// Writes `report`, at most `N` bytes, to its interrupt endpoint.
    pub async fn write(&mut self, report: &[u8]) -> Result<(), EndpointError> {
        if report.len() > N {
            return Err(EndpointError::BufferOverflow);
        }

        let max_packet_size = usize::from(self.ep_in.info().max_packet_size);
        let zlp_needed = report.len() < N && report.len() % max_packet_size == 0;
        for chunk in report.chunks(max_packet_size) {
            self.ep_in.write(chunk).await?;
        }

        if zlp_needed {
            self.ep_in.write(&[]).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "hid_test.rs"]
mod test;
