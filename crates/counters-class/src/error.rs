//! Error types for the counters device class.
//!
//! All errors implement `std::error::Error` via `thiserror` and map to a
//! conventional negative errno value through `errno()`.

use thiserror::Error;

use crate::device::DeviceId;

/// Result type alias for device class operations.
pub type CounterResult<T> = Result<T, CounterError>;

/// Errors returned by the attribute publishing interface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttributeError {
    /// An entry with the same path is already published.
    #[error("Attribute entry '{path}' already exists")]
    Exists {
        /// The conflicting path.
        path: String,
    },

    /// The interface refused to publish the device.
    #[error("Attribute interface rejected '{device}': {reason}")]
    Rejected {
        /// The device name.
        device: String,
        /// Reason given by the interface.
        reason: String,
    },

    /// No attribute is published at the path.
    #[error("No attribute at '{path}'")]
    NotFound {
        /// The requested path.
        path: String,
    },
}

impl AttributeError {
    /// Returns the negative errno value for this error.
    pub fn errno(&self) -> i32 {
        match self {
            AttributeError::Exists { .. } => -17,
            AttributeError::Rejected { .. } => -22,
            AttributeError::NotFound { .. } => -2,
        }
    }
}

/// Errors that can occur during device class operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterError {
    /// Memory for the device, its name or its payload could not be reserved.
    #[error("Unable to allocate {what}")]
    AllocationFailure {
        /// What was being allocated.
        what: String,
    },

    /// Malformed input to a write endpoint, or an operation invalid in the
    /// device's current state.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    /// The attribute interface rejected the device.
    #[error("Unable to register device '{device}': {source}")]
    RegistrationFailure {
        /// The device name.
        device: String,
        /// The publisher's error.
        #[source]
        source: AttributeError,
    },

    /// The handle refers to a destroyed device.
    #[error("No such device: {id}")]
    NoSuchDevice {
        /// The stale handle.
        id: DeviceId,
    },

    /// The endpoint does not permit the requested access.
    #[error("Attribute '{attribute}' is not {access}")]
    PermissionDenied {
        /// The attribute name.
        attribute: String,
        /// "readable" or "writable".
        access: &'static str,
    },

    /// Attribute lookup failed.
    #[error(transparent)]
    Attribute(#[from] AttributeError),
}

impl CounterError {
    /// Creates an allocation failure error.
    pub fn allocation(what: impl Into<String>) -> Self {
        Self::AllocationFailure { what: what.into() }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns the negative errno value for this error.
    pub fn errno(&self) -> i32 {
        match self {
            CounterError::AllocationFailure { .. } => -12,
            CounterError::InvalidArgument { .. } => -22,
            CounterError::RegistrationFailure { source, .. } => source.errno(),
            CounterError::NoSuchDevice { .. } => -19,
            CounterError::PermissionDenied { .. } => -13,
            CounterError::Attribute(err) => err.errno(),
        }
    }
}
