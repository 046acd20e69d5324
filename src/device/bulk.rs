//! USB bulk transfer support for the Galahad II LCD.
//!
//! This module uses `nusb` to claim the control interface and write to its
//! bulk OUT endpoint. Both video packets and the pump color command go through
//! the same endpoint; every write carries its own timeout.

use std::time::Duration;

use async_io::Timer;
use futures_lite::future::{self, block_on};
use nusb::transfer::{Direction, EndpointType, Queue};
use tracing::{debug, info, warn};

use super::stream::PacketSink;
use crate::error::{GalahadError, Result};
use crate::protocol::{GALAHAD2_LCD_PID, INTERFACE_CONTROL, LIANLI_VID};

/// Handle for bulk USB transfers to the Galahad LCD.
pub struct BulkDevice {
    device: nusb::Device,
    interface: nusb::Interface,
    queue: Queue<Vec<u8>>,
    endpoint: u8,
}

impl BulkDevice {
    /// Open the first Galahad II LCD and claim its control interface.
    ///
    /// Any kernel driver bound to the interface is detached first.
    pub fn open() -> Result<Self> {
        let device_info = nusb::list_devices()?
            .find(|d| d.vendor_id() == LIANLI_VID && d.product_id() == GALAHAD2_LCD_PID)
            .ok_or(GalahadError::DeviceNotFound)?;

        debug!(
            bus = device_info.bus_number(),
            address = device_info.device_address(),
            "found Galahad II LCD"
        );

        let device = device_info.open()?;

        let interface = device
            .detach_and_claim_interface(INTERFACE_CONTROL)
            .map_err(|e| {
                warn!("claiming interface {} failed: {}", INTERFACE_CONTROL, e);
                GalahadError::InterfaceNotAvailable(INTERFACE_CONTROL)
            })?;

        let endpoint = find_bulk_out_endpoint(&interface)
            .ok_or(GalahadError::EndpointNotFound(INTERFACE_CONTROL))?;

        info!(
            "claimed interface {} (bulk OUT 0x{:02X})",
            INTERFACE_CONTROL, endpoint
        );

        let queue = interface.bulk_out_queue(endpoint);

        Ok(Self {
            device,
            interface,
            queue,
            endpoint,
        })
    }

    /// Send raw data to the bulk endpoint, bounded by `timeout`.
    ///
    /// On timeout the pending transfer is cancelled before returning.
    pub fn write_bulk(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        self.queue.submit(data.to_vec());

        let queue = &mut self.queue;
        let completion = block_on(future::or(
            async { Some(queue.next_complete().await) },
            async {
                Timer::after(timeout).await;
                None
            },
        ));

        match completion {
            Some(completion) => completion
                .status
                .map_err(|e| GalahadError::Transfer(format!("{:?}", e))),
            None => {
                self.queue.cancel_all();
                while self.queue.pending() > 0 {
                    let _ = block_on(self.queue.next_complete());
                }
                Err(GalahadError::WriteTimeout(timeout.as_millis() as u64))
            }
        }
    }

    /// Release the interface and reset the device.
    ///
    /// Failures are logged, not returned: this runs on the way out.
    pub fn close(self) {
        let Self {
            device, interface, ..
        } = self;

        drop(interface);

        if let Err(e) = device.reset() {
            warn!("failed to reset device: {}", e);
        }
        info!("device released");
    }
}

impl PacketSink for BulkDevice {
    fn write_packet(&mut self, packet: &[u8], timeout: Duration) -> Result<()> {
        self.write_bulk(packet, timeout)
    }
}

impl std::fmt::Debug for BulkDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkDevice")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Find the first bulk OUT endpoint of the claimed interface.
fn find_bulk_out_endpoint(interface: &nusb::Interface) -> Option<u8> {
    interface
        .descriptors()
        .find_map(|alt| {
            alt.endpoints()
                .find(|ep| is_bulk_out(ep.direction(), ep.transfer_type()))
                .map(|ep| ep.address())
        })
}

fn is_bulk_out(direction: Direction, kind: EndpointType) -> bool {
    direction == Direction::Out && kind == EndpointType::Bulk
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_bulk_out_endpoints_match() {
        assert!(is_bulk_out(Direction::Out, EndpointType::Bulk));
        assert!(!is_bulk_out(Direction::In, EndpointType::Bulk));
        assert!(!is_bulk_out(Direction::Out, EndpointType::Interrupt));
        assert!(!is_bulk_out(Direction::Out, EndpointType::Isochronous));
    }
}
