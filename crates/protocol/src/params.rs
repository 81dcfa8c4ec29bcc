//! Vendor request parameters
//!
//! Fixed constants of the `vend_ax` EEPROM protocol, grouped into a
//! serializable parameter set so they can be overridden from the config file.

use crate::chunk::Chunk;
use crate::error::{ProtocolError, Result};
use crate::types::{Direction, TransferRequest};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `bmRequestType` for reads: device-to-host, vendor, device recipient
pub const REQUEST_TYPE_READ: u8 = 0xC0;

/// `bmRequestType` for writes: host-to-device, vendor, device recipient
pub const REQUEST_TYPE_WRITE: u8 = 0x40;

/// `bRequest` for both EEPROM reads and writes
pub const EEPROM_REQUEST: u8 = 0xA2;

/// `wIndex` location code selecting the EEPROM
pub const EEPROM_LOCATION: u16 = 1 << 4;

/// Per-transfer timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u32 = 4000;

/// Largest payload moved by a single control transfer
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// `wLength` is a 16-bit field
pub const MAX_CONTROL_LENGTH: usize = u16::MAX as usize;

/// Bit 7 of `bmRequestType`: set for device-to-host
const DIRECTION_IN: u8 = 0x80;

/// Control transfer parameters for the EEPROM vendor requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EepromProtocol {
    /// `bmRequestType` for reads (must have the IN bit set)
    pub read_request_type: u8,
    /// `bmRequestType` for writes (must have the IN bit clear)
    pub write_request_type: u8,
    /// Vendor `bRequest` code
    pub request: u8,
    /// `wIndex` location code
    pub location: u16,
    /// Timeout per control transfer in milliseconds
    pub timeout_ms: u32,
    /// Maximum bytes per control transfer
    pub chunk_size: usize,
}

impl Default for EepromProtocol {
    fn default() -> Self {
        Self {
            read_request_type: REQUEST_TYPE_READ,
            write_request_type: REQUEST_TYPE_WRITE,
            request: EEPROM_REQUEST,
            location: EEPROM_LOCATION,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl EepromProtocol {
    /// Timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.timeout_ms))
    }

    /// `bmRequestType` for the given direction
    pub fn request_type(&self, direction: Direction) -> u8 {
        match direction {
            Direction::Read => self.read_request_type,
            Direction::Write => self.write_request_type,
        }
    }

    /// Build the control transfer for one chunk
    ///
    /// Fails if the chunk offset cannot be carried in `wValue`.
    pub fn request(&self, direction: Direction, chunk: Chunk) -> Result<TransferRequest> {
        let value = u16::try_from(chunk.offset).map_err(|_| ProtocolError::OffsetOutOfRange {
            direction,
            offset: chunk.offset,
        })?;

        Ok(TransferRequest {
            direction,
            request_type: self.request_type(direction),
            request: self.request,
            value,
            index: self.location,
            length: chunk.len,
            timeout: self.timeout(),
        })
    }

    /// Check that every chunk of a `length`-byte transfer is addressable
    ///
    /// Fails with the offset of the first chunk whose start does not fit in
    /// `wValue`, so a transfer that cannot complete is rejected before it
    /// touches the device.
    pub fn check_span(&self, direction: Direction, length: usize) -> Result<()> {
        let chunk_size = self.chunk_size.max(1);
        let Some(last) = length.checked_sub(1) else {
            return Ok(());
        };

        let last_start = last - last % chunk_size;
        if last_start <= usize::from(u16::MAX) {
            return Ok(());
        }

        let first_bad = (usize::from(u16::MAX) / chunk_size + 1) * chunk_size;
        Err(ProtocolError::OffsetOutOfRange {
            direction,
            offset: first_bad,
        })
    }

    /// Validate parameter values
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CONTROL_LENGTH {
            return Err(ProtocolError::InvalidParameter {
                name: "chunk_size",
                reason: format!(
                    "{} is outside 1..={}",
                    self.chunk_size, MAX_CONTROL_LENGTH
                ),
            });
        }

        if self.timeout_ms == 0 {
            return Err(ProtocolError::InvalidParameter {
                name: "timeout_ms",
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.read_request_type & DIRECTION_IN == 0 {
            return Err(ProtocolError::InvalidParameter {
                name: "read_request_type",
                reason: format!("{:#04x} is not a device-to-host request", self.read_request_type),
            });
        }

        if self.write_request_type & DIRECTION_IN != 0 {
            return Err(ProtocolError::InvalidParameter {
                name: "write_request_type",
                reason: format!(
                    "{:#04x} is not a host-to-device request",
                    self.write_request_type
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_vend_ax() {
        let params = EepromProtocol::default();
        assert_eq!(params.read_request_type, 0xC0);
        assert_eq!(params.write_request_type, 0x40);
        assert_eq!(params.request, 0xA2);
        assert_eq!(params.location, 0x10);
        assert_eq!(params.timeout(), Duration::from_millis(4000));
        assert_eq!(params.chunk_size, 4096);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_read_request() {
        let params = EepromProtocol::default();
        let req = params
            .request(Direction::Read, Chunk { offset: 4096, len: 1904 })
            .unwrap();
        assert_eq!(req.request_type, 0xC0);
        assert_eq!(req.request, 0xA2);
        assert_eq!(req.value, 4096);
        assert_eq!(req.index, 0x10);
        assert_eq!(req.length, 1904);
    }

    #[test]
    fn test_write_request() {
        let params = EepromProtocol::default();
        let req = params
            .request(Direction::Write, Chunk { offset: 0, len: 16 })
            .unwrap();
        assert_eq!(req.request_type, 0x40);
        assert_eq!(req.value, 0);
    }

    #[test]
    fn test_offset_out_of_range() {
        let params = EepromProtocol::default();
        let err = params
            .request(Direction::Read, Chunk { offset: 0x1_0000, len: 1 })
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::OffsetOutOfRange {
                direction: Direction::Read,
                offset: 0x1_0000,
            }
        );
    }

    #[test]
    fn test_check_span() {
        let params = EepromProtocol::default();
        assert!(params.check_span(Direction::Read, 0).is_ok());
        assert!(params.check_span(Direction::Read, 0x1_0000).is_ok());
        // Last chunk starts at 0xF000 + 4096 = 0x1_0000
        assert_eq!(
            params.check_span(Direction::Write, 0x1_0000 + 1),
            Err(ProtocolError::OffsetOutOfRange {
                direction: Direction::Write,
                offset: 0x1_0000,
            })
        );
    }

    #[test]
    fn test_check_span_byte_chunks() {
        let params = EepromProtocol {
            chunk_size: 1,
            ..EepromProtocol::default()
        };
        assert!(params.check_span(Direction::Read, 0x1_0000).is_ok());
        assert!(params.check_span(Direction::Read, 0x1_0001).is_err());
    }

    #[test]
    fn test_check_span_uneven_chunk_size() {
        let params = EepromProtocol {
            chunk_size: 3000,
            ..EepromProtocol::default()
        };
        // Chunk starting at 63000 fits, the next one starts at 66000
        assert!(params.check_span(Direction::Read, 66_000).is_ok());
        assert_eq!(
            params.check_span(Direction::Read, 66_001),
            Err(ProtocolError::OffsetOutOfRange {
                direction: Direction::Read,
                offset: 66_000,
            })
        );
    }

    #[test]
    fn test_validate_chunk_size() {
        let mut params = EepromProtocol::default();
        params.chunk_size = 0;
        assert!(params.validate().is_err());

        params.chunk_size = MAX_CONTROL_LENGTH + 1;
        assert!(params.validate().is_err());

        params.chunk_size = MAX_CONTROL_LENGTH;
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_validate_request_type_direction() {
        let mut params = EepromProtocol::default();
        params.read_request_type = 0x40;
        assert!(params.validate().is_err());

        let mut params = EepromProtocol::default();
        params.write_request_type = 0xC0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_validate_timeout() {
        let mut params = EepromProtocol::default();
        params.timeout_ms = 0;
        assert!(params.validate().is_err());
    }
}
