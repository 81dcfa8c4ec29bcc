//! Protocol error types

use crate::types::Direction;
use thiserror::Error;

/// Protocol-level errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The device reported a different byte count than was requested
    #[error("{direction} error at {offset}: expected {expected}, got {actual}")]
    ShortTransfer {
        direction: Direction,
        offset: usize,
        expected: usize,
        actual: usize,
    },

    /// Cumulative offset no longer fits the 16-bit `wValue` field
    #[error("{direction} offset {offset} does not fit the 16-bit control value field")]
    OffsetOutOfRange { direction: Direction, offset: usize },

    /// Invalid protocol parameter (configuration)
    #[error("Invalid protocol parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_transfer_display() {
        let err = ProtocolError::ShortTransfer {
            direction: Direction::Read,
            offset: 4096,
            expected: 1904,
            actual: 12,
        };
        assert_eq!(err.to_string(), "Read error at 4096: expected 1904, got 12");
    }

    #[test]
    fn test_offset_out_of_range_display() {
        let err = ProtocolError::OffsetOutOfRange {
            direction: Direction::Write,
            offset: 65536,
        };
        let msg = err.to_string();
        assert!(msg.contains("Write"));
        assert!(msg.contains("65536"));
    }
}
