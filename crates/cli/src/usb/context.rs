//! libusb context and device lookup

use super::device::{RusbHandle, map_rusb_error};
use common::{Error, UsbAccess, UsbResult};
use rusb::{Context, UsbContext};
use tracing::{debug, trace};

/// Process-wide libusb context
///
/// Dropping the last reference (including those held by open handles)
/// runs `libusb_exit`.
pub struct RusbAccess {
    context: Context,
}

impl RusbAccess {
    /// Initialize libusb
    pub fn new() -> common::Result<Self> {
        let context = Context::new().map_err(|e| Error::UsbInit(map_rusb_error(e)))?;
        debug!("Initialized libusb context");
        Ok(Self { context })
    }
}

impl UsbAccess for RusbAccess {
    type Handle = RusbHandle;

    fn open_device(&self, vendor_id: u16, product_id: u16) -> UsbResult<Option<RusbHandle>> {
        let devices = self.context.devices().map_err(map_rusb_error)?;

        for device in devices.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    trace!(
                        "Skipping device on bus {:03} address {:03}: {}",
                        device.bus_number(),
                        device.address(),
                        e
                    );
                    continue;
                }
            };

            if descriptor.vendor_id() != vendor_id || descriptor.product_id() != product_id {
                continue;
            }

            debug!(
                "Found {:04x}:{:04x} on bus {:03} address {:03}",
                vendor_id,
                product_id,
                device.bus_number(),
                device.address()
            );
            let handle = device.open().map_err(map_rusb_error)?;
            return Ok(Some(RusbHandle::new(handle)));
        }

        Ok(None)
    }
}
