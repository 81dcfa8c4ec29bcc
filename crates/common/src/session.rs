//! Device acquisition and teardown
//!
//! A [`Session`] owns the opened handle and the claimed interface. Acquisition
//! runs locate → detach kernel driver (if bound) → claim. Dropping the session
//! undoes the steps that succeeded in reverse: release the interface, reattach
//! the kernel driver, close the handle. This runs on every exit path,
//! including a failed claim.

use crate::error::{Error, Result};
use crate::usb_types::{UsbAccess, UsbHandle};
use protocol::UsbError;
use tracing::{debug, warn};

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Opened,
    InterfaceClaimed,
    TransferInProgress,
    Closed,
}

/// Which device and interface to acquire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Interface to claim for control transfers
    pub interface: u8,
    /// Give the interface back to the kernel driver on teardown
    pub reattach_kernel_driver: bool,
}

impl SessionConfig {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            interface: 0,
            reattach_kernel_driver: true,
        }
    }
}

/// Exclusive ownership of one device interface
pub struct Session<H: UsbHandle> {
    handle: H,
    interface: u8,
    reattach_kernel_driver: bool,
    driver_detached: bool,
    claimed: bool,
    state: SessionState,
}

impl<H: UsbHandle> Session<H> {
    /// Locate the device and take control of its interface
    pub fn acquire<A>(access: &A, config: &SessionConfig) -> Result<Self>
    where
        A: UsbAccess<Handle = H>,
    {
        let handle = locate(access, config.vendor_id, config.product_id)?;

        let mut session = Session {
            handle,
            interface: config.interface,
            reattach_kernel_driver: config.reattach_kernel_driver,
            driver_detached: false,
            claimed: false,
            state: SessionState::Opened,
        };

        session.detach_kernel_driver()?;
        session.claim_interface()?;

        Ok(session)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn interface(&self) -> u8 {
        self.interface
    }

    /// Whether acquisition took the interface away from a kernel driver
    pub fn driver_detached(&self) -> bool {
        self.driver_detached
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub(crate) fn begin_transfer(&mut self) {
        debug_assert!(self.claimed, "transfer on an unclaimed interface");
        self.state = SessionState::TransferInProgress;
    }

    pub(crate) fn end_transfer(&mut self) {
        self.state = SessionState::InterfaceClaimed;
    }

    fn detach_kernel_driver(&mut self) -> Result<()> {
        let interface = self.interface;

        let active = match self.handle.kernel_driver_active(interface) {
            Ok(active) => active,
            Err(UsbError::NotSupported) => {
                debug!("Kernel driver query not supported on this platform");
                false
            }
            Err(source) => return Err(Error::DriverDetach { interface, source }),
        };

        if !active {
            debug!("No kernel driver active on interface {}", interface);
            return Ok(());
        }

        debug!("Detaching kernel driver from interface {}", interface);
        self.handle
            .detach_kernel_driver(interface)
            .map_err(|source| Error::DriverDetach { interface, source })?;
        self.driver_detached = true;

        Ok(())
    }

    fn claim_interface(&mut self) -> Result<()> {
        let interface = self.interface;

        self.handle
            .claim_interface(interface)
            .map_err(|source| Error::InterfaceClaim { interface, source })?;
        self.claimed = true;
        self.state = SessionState::InterfaceClaimed;

        debug!("Claimed interface {}", interface);
        Ok(())
    }
}

impl<H: UsbHandle> Drop for Session<H> {
    fn drop(&mut self) {
        let interface = self.interface;

        if self.claimed {
            if let Err(e) = self.handle.release_interface(interface) {
                warn!("Failed to release interface {}: {}", interface, e);
            } else {
                debug!("Released interface {}", interface);
            }
        }

        if self.driver_detached && self.reattach_kernel_driver {
            if let Err(e) = self.handle.attach_kernel_driver(interface) {
                warn!(
                    "Could not reattach kernel driver to interface {}: {}",
                    interface, e
                );
            } else {
                debug!("Reattached kernel driver to interface {}", interface);
            }
        }

        self.state = SessionState::Closed;
        debug!("Closing device handle");
        // `handle` is dropped after this, which closes it
    }
}

/// Find and open the device
fn locate<A: UsbAccess>(access: &A, vendor_id: u16, product_id: u16) -> Result<A::Handle> {
    debug!("Looking for device {:04x}:{:04x}", vendor_id, product_id);

    match access.open_device(vendor_id, product_id) {
        Ok(Some(handle)) => {
            debug!("Opened device {:04x}:{:04x}", vendor_id, product_id);
            Ok(handle)
        }
        Ok(None) => Err(Error::DeviceNotFound {
            vendor_id,
            product_id,
        }),
        Err(source) => Err(Error::DeviceOpen {
            vendor_id,
            product_id,
            source,
        }),
    }
}
