//! USB access-layer abstractions
//!
//! The tool only needs a narrow slice of libusb: open one device by VID/PID,
//! manage the kernel driver binding of one interface, and issue vendor
//! control transfers. Closing a handle is dropping it.

use protocol::{TransferRequest, UsbError};

/// Result type for raw access-layer calls
pub type UsbResult<T> = std::result::Result<T, UsbError>;

/// Process-wide USB context
pub trait UsbAccess {
    type Handle: UsbHandle;

    /// Open the first enumerated device matching `vendor_id`/`product_id`
    ///
    /// Returns `Ok(None)` when no device matches. Enumeration order is the
    /// host library's; with several identical devices the pick is arbitrary.
    fn open_device(&self, vendor_id: u16, product_id: u16) -> UsbResult<Option<Self::Handle>>;
}

/// An opened device
pub trait UsbHandle {
    fn kernel_driver_active(&self, interface: u8) -> UsbResult<bool>;

    fn detach_kernel_driver(&mut self, interface: u8) -> UsbResult<()>;

    fn attach_kernel_driver(&mut self, interface: u8) -> UsbResult<()>;

    fn claim_interface(&mut self, interface: u8) -> UsbResult<()>;

    fn release_interface(&mut self, interface: u8) -> UsbResult<()>;

    /// Device-to-host control transfer into `buf`, returning bytes received
    fn read_control(&self, request: &TransferRequest, buf: &mut [u8]) -> UsbResult<usize>;

    /// Host-to-device control transfer of `buf`, returning bytes sent
    fn write_control(&self, request: &TransferRequest, buf: &[u8]) -> UsbResult<usize>;
}
