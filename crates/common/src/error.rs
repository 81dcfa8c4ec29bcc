//! Common error types
//!
//! Every variant is terminal for the operation. The CLI maps all of them to
//! the same non-zero exit status.

use protocol::{Direction, ProtocolError, UsbError};
use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to alloc memory: {0}")]
    Allocation(#[from] TryReserveError),

    #[error("Unable to init libusb: {0}")]
    UsbInit(UsbError),

    #[error("Unable to find device {vendor_id:04x}:{product_id:04x}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("Unable to open device {vendor_id:04x}:{product_id:04x}: {source}")]
    DeviceOpen {
        vendor_id: u16,
        product_id: u16,
        source: UsbError,
    },

    #[error("Unable to detach kernel driver from interface {interface}: {source}")]
    DriverDetach { interface: u8, source: UsbError },

    #[error("Unable to claim interface {interface}: {source}")]
    InterfaceClaim { interface: u8, source: UsbError },

    #[error("{direction} error at {offset}: expected {expected}, transfer failed: {source}")]
    Transfer {
        direction: Direction,
        offset: usize,
        expected: usize,
        source: UsbError,
    },

    #[error("Wrong size from stdin, expected {expected} read {actual}")]
    ShortInput { expected: usize, actual: usize },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
