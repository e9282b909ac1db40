//! Controller status codes and error handling.
//!
//! [`HalStatus`] names the errno a controller fails with; [`HalError`]
//! carries it through `?` and maps back with [`HalError::errno`].

use std::fmt;
use thiserror::Error;

/// errno-style status codes returned by interrupt and GPIO controllers.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HalStatus {
    NoSuchDevice = -6,
    Busy = -16,
    NotFound = -19,
    InvalidArgument = -22,
    NotSupported = -95,
}

impl HalStatus {
    /// Returns the raw errno value.
    pub fn as_raw(&self) -> i32 {
        *self as i32
    }
}

impl fmt::Display for HalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HalStatus::NoSuchDevice => "ENXIO",
            HalStatus::Busy => "EBUSY",
            HalStatus::NotFound => "ENODEV",
            HalStatus::InvalidArgument => "EINVAL",
            HalStatus::NotSupported => "EOPNOTSUPP",
        };
        write!(f, "{}", s)
    }
}

/// Error type for controller operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HalError {
    /// The controller returned an error status.
    #[error("controller operation failed: {status}")]
    Status { status: HalStatus },

    /// The resource is already claimed by another owner.
    #[error("{resource} is busy (owned by {owner})")]
    Busy { resource: String, owner: String },

    /// The GPIO number is not valid on this controller.
    #[error("invalid GPIO pin {pin}")]
    InvalidPin { pin: i64 },

    /// The controller cannot perform the requested operation.
    #[error("not supported: {feature}")]
    NotSupported { feature: String },

    /// The requested resource does not exist.
    #[error("not found: {item}")]
    NotFound { item: String },

    /// Invalid argument passed to the controller.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl HalError {
    /// Creates an error from a status code.
    pub fn from_status(status: HalStatus) -> Self {
        match status {
            HalStatus::NotSupported => HalError::NotSupported {
                feature: "unknown".to_string(),
            },
            HalStatus::NotFound | HalStatus::NoSuchDevice => HalError::NotFound {
                item: "unknown".to_string(),
            },
            HalStatus::InvalidArgument => HalError::InvalidArgument {
                message: format!("controller returned {}", status),
            },
            HalStatus::Busy => HalError::Status { status },
        }
    }

    /// Creates a busy error for a claimed resource.
    pub fn busy(resource: impl Into<String>, owner: impl Into<String>) -> Self {
        HalError::Busy {
            resource: resource.into(),
            owner: owner.into(),
        }
    }

    /// Creates a not supported error.
    pub fn not_supported(feature: impl Into<String>) -> Self {
        HalError::NotSupported {
            feature: feature.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        HalError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns the negative errno value matching this error.
    pub fn errno(&self) -> i32 {
        match self {
            HalError::Status { status } => status.as_raw(),
            HalError::Busy { .. } => HalStatus::Busy.as_raw(),
            HalError::InvalidPin { .. } | HalError::InvalidArgument { .. } => {
                HalStatus::InvalidArgument.as_raw()
            }
            HalError::NotSupported { .. } => HalStatus::NotSupported.as_raw(),
            HalError::NotFound { .. } => HalStatus::NotFound.as_raw(),
        }
    }
}

/// Result type for controller operations.
pub type HalResult<T> = Result<T, HalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_raw_values() {
        assert_eq!(HalStatus::Busy.as_raw(), -16);
        assert_eq!(HalStatus::InvalidArgument.as_raw(), -22);
        assert_eq!(HalStatus::NoSuchDevice.to_string(), "ENXIO");
    }

    #[test]
    fn test_error_from_status() {
        let err = HalError::from_status(HalStatus::NotFound);
        assert!(matches!(err, HalError::NotFound { .. }));

        let err = HalError::from_status(HalStatus::Busy);
        assert_eq!(err, HalError::Status { status: HalStatus::Busy });
        assert_eq!(err.errno(), -16);
    }

    #[test]
    fn test_errno_mapping() {
        assert_eq!(HalError::busy("GPIO 4", "counter0").errno(), -16);
        assert_eq!(HalError::InvalidPin { pin: -1 }.errno(), -22);
        assert_eq!(HalError::not_supported("to_irq").errno(), -95);
    }

    #[test]
    fn test_error_display() {
        let err = HalError::busy("GPIO 4", "pulse-a");
        assert_eq!(err.to_string(), "GPIO 4 is busy (owned by pulse-a)");
    }
}
