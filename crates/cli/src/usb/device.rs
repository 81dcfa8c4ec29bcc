//! Opened device handle
//!
//! Thin adapter from [`UsbHandle`] onto `rusb::DeviceHandle`, mapping rusb
//! errors to protocol errors.

use common::{UsbHandle, UsbResult};
use protocol::{TransferRequest, UsbError};
use rusb::{Context, DeviceHandle};
use tracing::{debug, warn};

/// Opened libusb device
///
/// Dropping it runs `libusb_close`.
pub struct RusbHandle {
    handle: DeviceHandle<Context>,
}

impl RusbHandle {
    pub fn new(handle: DeviceHandle<Context>) -> Self {
        Self { handle }
    }
}

impl UsbHandle for RusbHandle {
    fn kernel_driver_active(&self, interface: u8) -> UsbResult<bool> {
        self.handle
            .kernel_driver_active(interface)
            .map_err(map_rusb_error)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> UsbResult<()> {
        self.handle
            .detach_kernel_driver(interface)
            .map_err(map_rusb_error)
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> UsbResult<()> {
        self.handle
            .attach_kernel_driver(interface)
            .map_err(map_rusb_error)
    }

    fn claim_interface(&mut self, interface: u8) -> UsbResult<()> {
        self.handle.claim_interface(interface).map_err(map_rusb_error)
    }

    fn release_interface(&mut self, interface: u8) -> UsbResult<()> {
        self.handle
            .release_interface(interface)
            .map_err(map_rusb_error)
    }

    fn read_control(&self, request: &TransferRequest, buf: &mut [u8]) -> UsbResult<usize> {
        debug!(
            "Control IN: request_type={:#x}, request={:#x}, value={:#x}, index={:#x}, len={}",
            request.request_type,
            request.request,
            request.value,
            request.index,
            buf.len()
        );

        self.handle
            .read_control(
                request.request_type,
                request.request,
                request.value,
                request.index,
                buf,
                request.timeout,
            )
            .map_err(|e| {
                warn!("Control IN transfer failed: {}", e);
                map_rusb_error(e)
            })
    }

    fn write_control(&self, request: &TransferRequest, buf: &[u8]) -> UsbResult<usize> {
        debug!(
            "Control OUT: request_type={:#x}, request={:#x}, value={:#x}, index={:#x}, len={}",
            request.request_type,
            request.request,
            request.value,
            request.index,
            buf.len()
        );

        self.handle
            .write_control(
                request.request_type,
                request.request,
                request.value,
                request.index,
                buf,
                request.timeout,
            )
            .map_err(|e| {
                warn!("Control OUT transfer failed: {}", e);
                map_rusb_error(e)
            })
    }
}

/// Map rusb::Error to protocol::UsbError
pub fn map_rusb_error(err: rusb::Error) -> UsbError {
    match err {
        rusb::Error::Timeout => UsbError::Timeout,
        rusb::Error::Pipe => UsbError::Pipe,
        rusb::Error::NoDevice => UsbError::NoDevice,
        rusb::Error::NotFound => UsbError::NotFound,
        rusb::Error::Busy => UsbError::Busy,
        rusb::Error::Overflow => UsbError::Overflow,
        rusb::Error::Io => UsbError::Io,
        rusb::Error::InvalidParam => UsbError::InvalidParam,
        rusb::Error::Access => UsbError::Access,
        rusb::Error::NotSupported => UsbError::NotSupported,
        _ => UsbError::Other {
            message: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_rusb_error() {
        assert_eq!(map_rusb_error(rusb::Error::Timeout), UsbError::Timeout);
        assert_eq!(map_rusb_error(rusb::Error::Pipe), UsbError::Pipe);
        assert_eq!(map_rusb_error(rusb::Error::NoDevice), UsbError::NoDevice);
        assert_eq!(map_rusb_error(rusb::Error::NotFound), UsbError::NotFound);
        assert_eq!(
            map_rusb_error(rusb::Error::NotSupported),
            UsbError::NotSupported
        );
    }

    #[test]
    fn test_map_rusb_error_other() {
        assert!(matches!(
            map_rusb_error(rusb::Error::NoMem),
            UsbError::Other { .. }
        ));
    }
}
