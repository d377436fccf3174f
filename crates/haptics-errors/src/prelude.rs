//! Prelude module for convenient error handling imports.
//!
//! # Example
//!
//! ```
//! use haptics_errors::prelude::*;
//! use haptics_errors::validate;
//!
//! fn check_sequence(len: usize) -> HapticResult<()> {
//!     validate!(len > 0, ValidationError::empty("composite"));
//!     validate!(len <= 254, ValidationError::too_long("composite", len, 254));
//!     Ok(())
//! }
//!
//! assert_eq!(check_sequence(3), Ok(()));
//! assert!(matches!(check_sequence(0), Err(HapticError::InvalidArgument(_))));
//! ```

pub use crate::{
    DeviceResult, HapticResult,
    common::{ErrorKind, ErrorSeverity, HapticError},
    device::DeviceError,
    validation::ValidationError,
};

/// Return early with the given error when the condition does not hold.
#[macro_export]
macro_rules! validate {
    ($condition:expr, $error:expr) => {
        if !$condition {
            return Err($error.into());
        }
    };
}

/// Return early with an out of range error unless `min <= value <= max`.
///
/// NaN is never in range.
#[macro_export]
macro_rules! validate_range {
    ($field:expr, $value:expr, $min:expr, $max:expr) => {{
        let (value, min, max) = ($value, $min, $max);
        if !(min..=max).contains(&value) {
            return Err($crate::ValidationError::out_of_range($field, value, min, max).into());
        }
    }};
}
