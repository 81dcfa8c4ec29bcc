//! USB subsystem
//!
//! Binds the access-layer traits from `common` to libusb through `rusb`.
//! Everything runs synchronously on the calling thread.

pub mod context;
pub mod device;

pub use context::RusbAccess;
