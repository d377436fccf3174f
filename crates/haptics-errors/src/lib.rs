//! Centralized error types for the haptics driver.
//!
//! Every fallible operation in the workspace reports one of four outcomes to
//! its caller:
//!
//! - **InvalidArgument**: caller input outside a declared range, empty or
//!   oversized sequences, unsupported enumerated values. Always detected
//!   before any hardware I/O.
//! - **Unsupported**: valid in general, but not available on this hardware
//!   configuration.
//! - **IllegalState**: hardware I/O failure, GPIO reset failure, or a previous
//!   playback still pending. Hardware may be left degraded.
//! - **ResourceExhausted**: an encoded waveform exceeds the format capacity or
//!   the free storage on the actuator.
//!
//! # Architecture
//!
//! - [`common`]: the top-level [`HapticError`] and its classification
//! - [`validation`]: input validation errors (become `InvalidArgument`)
//! - [`device`]: actuator and GPIO I/O errors (become `IllegalState`)
//!
//! # Example
//!
//! ```
//! use haptics_errors::prelude::*;
//! use haptics_errors::validate_range;
//!
//! fn check_delay(delay_ms: i32) -> HapticResult<u16> {
//!     validate_range!("delay_ms", delay_ms, 0, 10_000);
//!     Ok(delay_ms as u16)
//! }
//!
//! assert_eq!(check_delay(50), Ok(50));
//! let kind = check_delay(10_001).err().map(|e| e.kind());
//! assert_eq!(kind, Some(ErrorKind::InvalidArgument));
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod common;
pub mod device;
pub mod prelude;
pub mod validation;

pub use common::{ErrorKind, ErrorSeverity, HapticError};
pub use device::DeviceError;
pub use validation::ValidationError;

/// A specialized `Result` type for haptics operations.
pub type HapticResult<T> = std::result::Result<T, HapticError>;

/// A specialized `Result` type for raw actuator I/O.
pub type DeviceResult<T = ()> = std::result::Result<T, DeviceError>;
