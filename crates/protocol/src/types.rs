//! Transfer and USB error type definitions
//!
//! This module defines the request/result pair exchanged with the access
//! layer for a single chunk, and the access-layer error kinds.

use crate::error::ProtocolError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Transfer direction, from the host's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Device-to-host: EEPROM contents flow to standard output
    Read,
    /// Host-to-device: standard input flows into the EEPROM
    Write,
}

impl Direction {
    /// Parse the CLI mode argument
    ///
    /// Only a leading `r`/`R` selects a read. Every other value, including an
    /// empty string, selects a write.
    pub fn from_mode(mode: &str) -> Self {
        match mode.chars().next() {
            Some('r') | Some('R') => Direction::Read,
            _ => Direction::Write,
        }
    }

    /// Past-tense verb for the completion diagnostic
    pub fn past_tense(self) -> &'static str {
        match self {
            Direction::Read => "Read",
            Direction::Write => "Written",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => f.write_str("Read"),
            Direction::Write => f.write_str("Write"),
        }
    }
}

/// One vendor control transfer covering a single chunk
///
/// Built by [`EepromProtocol::request`](crate::EepromProtocol::request) and
/// never modified afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    pub direction: Direction,
    /// `bmRequestType`
    pub request_type: u8,
    /// `bRequest`
    pub request: u8,
    /// `wValue`: byte offset into the EEPROM
    pub value: u16,
    /// `wIndex`: memory location code
    pub index: u16,
    /// `wLength`: bytes to move in this transfer
    pub length: usize,
    pub timeout: Duration,
}

impl TransferRequest {
    /// Byte offset this request starts at
    pub fn offset(&self) -> usize {
        usize::from(self.value)
    }
}

/// Outcome of a completed control transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferResult {
    /// Bytes the access layer reports as transferred
    pub transferred: usize,
}

impl TransferResult {
    /// Check the result against the request that produced it
    ///
    /// Anything other than the exact requested length is a protocol violation.
    pub fn verify(&self, request: &TransferRequest) -> Result<(), ProtocolError> {
        if self.transferred == request.length {
            Ok(())
        } else {
            Err(ProtocolError::ShortTransfer {
                direction: request.direction,
                offset: request.offset(),
                expected: request.length,
                actual: self.transferred,
            })
        }
    }
}

/// USB error types
///
/// Maps to libusb error codes. See rusb::Error for details.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsbError {
    /// Transfer timed out
    #[error("Operation timed out")]
    Timeout,
    /// Endpoint stalled (protocol error)
    #[error("Pipe error (request stalled)")]
    Pipe,
    /// Device was disconnected
    #[error("No such device (it may have been disconnected)")]
    NoDevice,
    /// Device or endpoint not found
    #[error("Entity not found")]
    NotFound,
    /// Device is busy
    #[error("Resource busy")]
    Busy,
    /// Buffer overflow
    #[error("Overflow")]
    Overflow,
    /// I/O error
    #[error("Input/output error")]
    Io,
    /// Invalid parameter
    #[error("Invalid parameter")]
    InvalidParam,
    /// Access denied (permissions)
    #[error("Access denied (insufficient permissions)")]
    Access,
    /// Operation not supported on this platform
    #[error("Operation not supported or unimplemented on this platform")]
    NotSupported,
    /// Other error with message
    #[error("{message}")]
    Other { message: String },
}
