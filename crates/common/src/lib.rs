//! Common building blocks for fx2eeprom
//!
//! This crate holds everything between the command line and libusb:
//! the access-layer traits, device acquisition and teardown, the chunked
//! EEPROM transfer engine, error handling, and logging setup.
//!
//! The `rusb` binding of [`UsbAccess`] lives in the CLI crate. Tests drive
//! the same code through `test_utils::MockUsb`, enabled by the
//! `test-utils` feature.

pub mod engine;
pub mod error;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod usb_types;

pub use engine::{TransferEngine, TransferSummary};
pub use error::{Error, Result};
pub use logging::setup_logging;
pub use session::{Session, SessionConfig, SessionState};
pub use usb_types::{UsbAccess, UsbHandle, UsbResult};
