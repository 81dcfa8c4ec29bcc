//! Vendor EEPROM protocol for fx2eeprom
//!
//! This crate defines the wire-level side of the tool: the control transfer
//! parameters understood by the helper firmware (`vend_ax` and compatible),
//! the transfer request/result types, and the deterministic partitioning of
//! a bulk read or write into bounded-size chunks.
//!
//! It does not talk to USB itself. The access layer lives behind the traits
//! in the `common` crate.
//!
//! # Example
//!
//! ```
//! use protocol::{ChunkPlan, Direction, EepromProtocol};
//!
//! let params = EepromProtocol::default();
//! let chunks: Vec<_> = ChunkPlan::new(6000, params.chunk_size).collect();
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[1].len, 1904);
//!
//! let request = params.request(Direction::Read, chunks[1]).unwrap();
//! assert_eq!(request.value, 4096);
//! assert_eq!(request.index, 0x10);
//! ```

pub mod chunk;
pub mod error;
pub mod params;
pub mod types;

pub use chunk::{Chunk, ChunkPlan};
pub use error::{ProtocolError, Result};
pub use params::{
    DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT_MS, EEPROM_LOCATION, EEPROM_REQUEST, EepromProtocol,
    MAX_CONTROL_LENGTH, REQUEST_TYPE_READ, REQUEST_TYPE_WRITE,
};
pub use types::{Direction, TransferRequest, TransferResult, UsbError};
