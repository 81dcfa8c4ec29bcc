//! Test utilities for fx2eeprom
//!
//! Provides an in-memory USB access layer that records every call, for
//! testing acquisition ordering and transfer behavior without hardware.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{MockUsb, UsbCall};
//! use common::{Session, SessionConfig};
//!
//! let usb = MockUsb::new().with_device(0x04b4, 0x8613, 256);
//! let session = Session::acquire(&usb, &SessionConfig::new(0x04b4, 0x8613)).unwrap();
//! drop(session);
//!
//! assert_eq!(usb.calls().last(), Some(&UsbCall::Close));
//! ```

use crate::usb_types::{UsbAccess, UsbHandle, UsbResult};
use protocol::{TransferRequest, UsbError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Byte value of erased EEPROM cells
pub const ERASED: u8 = 0xFF;

/// Deterministic, non-repeating-per-page test data
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// One call into the access layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsbCall {
    Open { vendor_id: u16, product_id: u16 },
    KernelDriverActive(u8),
    DetachKernelDriver(u8),
    AttachKernelDriver(u8),
    ClaimInterface(u8),
    ReleaseInterface(u8),
    ReadControl {
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        length: usize,
    },
    WriteControl {
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        length: usize,
    },
    Close,
}

impl UsbCall {
    fn is_control(&self) -> bool {
        matches!(self, UsbCall::ReadControl { .. } | UsbCall::WriteControl { .. })
    }
}

/// Scripted misbehavior for the transfer at a given offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Move only this many bytes
    Short(usize),
    /// Fail with this error
    Error(UsbError),
}

struct MockDevice {
    vendor_id: u16,
    product_id: u16,
    eeprom: Vec<u8>,
}

#[derive(Default)]
struct MockState {
    devices: Vec<MockDevice>,
    calls: Vec<UsbCall>,
    kernel_driver_bound: bool,
    driver_query_error: Option<UsbError>,
    open_error: Option<UsbError>,
    detach_error: Option<UsbError>,
    claim_error: Option<UsbError>,
    faults: HashMap<u16, Fault>,
}

/// In-memory USB context
///
/// Clones share state, so a test can keep one to inspect the call log after
/// handing another to the code under test.
#[derive(Clone, Default)]
pub struct MockUsb {
    state: Rc<RefCell<MockState>>,
}

impl MockUsb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device with an erased EEPROM of `size` bytes
    pub fn with_device(self, vendor_id: u16, product_id: u16, size: usize) -> Self {
        self.with_eeprom(vendor_id, product_id, vec![ERASED; size])
    }

    /// Add a device with the given EEPROM contents
    pub fn with_eeprom(self, vendor_id: u16, product_id: u16, eeprom: Vec<u8>) -> Self {
        self.state.borrow_mut().devices.push(MockDevice {
            vendor_id,
            product_id,
            eeprom,
        });
        self
    }

    /// Report a kernel driver bound to every interface until detached
    pub fn with_kernel_driver(self) -> Self {
        self.state.borrow_mut().kernel_driver_bound = true;
        self
    }

    pub fn fail_driver_query(self, error: UsbError) -> Self {
        self.state.borrow_mut().driver_query_error = Some(error);
        self
    }

    pub fn fail_open(self, error: UsbError) -> Self {
        self.state.borrow_mut().open_error = Some(error);
        self
    }

    pub fn fail_detach(self, error: UsbError) -> Self {
        self.state.borrow_mut().detach_error = Some(error);
        self
    }

    pub fn fail_claim(self, error: UsbError) -> Self {
        self.state.borrow_mut().claim_error = Some(error);
        self
    }

    /// Misbehave on the control transfer whose `wValue` is `offset`
    pub fn with_fault(self, offset: u16, fault: Fault) -> Self {
        self.state.borrow_mut().faults.insert(offset, fault);
        self
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<UsbCall> {
        self.state.borrow().calls.clone()
    }

    /// Only the control transfers made so far
    pub fn control_calls(&self) -> Vec<UsbCall> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.is_control())
            .cloned()
            .collect()
    }

    /// Current EEPROM contents of the device at `index`
    pub fn eeprom(&self, index: usize) -> Vec<u8> {
        self.state.borrow().devices[index].eeprom.clone()
    }

    fn record(&self, call: UsbCall) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl UsbAccess for MockUsb {
    type Handle = MockHandle;

    fn open_device(&self, vendor_id: u16, product_id: u16) -> UsbResult<Option<MockHandle>> {
        self.record(UsbCall::Open {
            vendor_id,
            product_id,
        });

        let state = self.state.borrow();
        let Some(device) = state
            .devices
            .iter()
            .position(|d| d.vendor_id == vendor_id && d.product_id == product_id)
        else {
            return Ok(None);
        };

        if let Some(error) = state.open_error.clone() {
            return Err(error);
        }

        Ok(Some(MockHandle {
            usb: self.clone(),
            device,
        }))
    }
}

/// Handle to one [`MockUsb`] device
pub struct MockHandle {
    usb: MockUsb,
    device: usize,
}

impl MockHandle {
    /// Index of the opened device in the order it was added
    pub fn device_index(&self) -> usize {
        self.device
    }

    fn take_fault(&self, value: u16) -> Option<Fault> {
        self.usb.state.borrow_mut().faults.remove(&value)
    }
}

impl UsbHandle for MockHandle {
    fn kernel_driver_active(&self, interface: u8) -> UsbResult<bool> {
        self.usb.record(UsbCall::KernelDriverActive(interface));
        let state = self.usb.state.borrow();
        match state.driver_query_error.clone() {
            Some(error) => Err(error),
            None => Ok(state.kernel_driver_bound),
        }
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> UsbResult<()> {
        self.usb.record(UsbCall::DetachKernelDriver(interface));
        let mut state = self.usb.state.borrow_mut();
        if let Some(error) = state.detach_error.clone() {
            return Err(error);
        }
        state.kernel_driver_bound = false;
        Ok(())
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> UsbResult<()> {
        self.usb.record(UsbCall::AttachKernelDriver(interface));
        self.usb.state.borrow_mut().kernel_driver_bound = true;
        Ok(())
    }

    fn claim_interface(&mut self, interface: u8) -> UsbResult<()> {
        self.usb.record(UsbCall::ClaimInterface(interface));
        match self.usb.state.borrow().claim_error.clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn release_interface(&mut self, interface: u8) -> UsbResult<()> {
        self.usb.record(UsbCall::ReleaseInterface(interface));
        Ok(())
    }

    fn read_control(&self, request: &TransferRequest, buf: &mut [u8]) -> UsbResult<usize> {
        self.usb.record(UsbCall::ReadControl {
            request_type: request.request_type,
            request: request.request,
            value: request.value,
            index: request.index,
            length: buf.len(),
        });

        let limit = match self.take_fault(request.value) {
            Some(Fault::Error(error)) => return Err(error),
            Some(Fault::Short(n)) => n.min(buf.len()),
            None => buf.len(),
        };

        let state = self.usb.state.borrow();
        let eeprom = &state.devices[self.device].eeprom;
        let start = request.offset().min(eeprom.len());
        let end = (start + limit).min(eeprom.len());
        let n = end - start;
        buf[..n].copy_from_slice(&eeprom[start..end]);
        Ok(n)
    }

    fn write_control(&self, request: &TransferRequest, buf: &[u8]) -> UsbResult<usize> {
        self.usb.record(UsbCall::WriteControl {
            request_type: request.request_type,
            request: request.request,
            value: request.value,
            index: request.index,
            length: buf.len(),
        });

        let limit = match self.take_fault(request.value) {
            Some(Fault::Error(error)) => return Err(error),
            Some(Fault::Short(n)) => n.min(buf.len()),
            None => buf.len(),
        };

        let mut state = self.usb.state.borrow_mut();
        let eeprom = &mut state.devices[self.device].eeprom;
        let start = request.offset().min(eeprom.len());
        let end = (start + limit).min(eeprom.len());
        let n = end - start;
        eeprom[start..end].copy_from_slice(&buf[..n]);
        Ok(n)
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.usb.record(UsbCall::Close);
    }
}
