//! Error types for the pulse source registry and daemon configuration.

use std::path::PathBuf;

use thiserror::Error;

use counters_class::CounterError;
use counters_hal::HalError;

/// Result type alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised while binding pulse sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Device class failure (allocation, registration).
    #[error(transparent)]
    Counter(#[from] CounterError),

    /// GPIO reservation, interrupt mapping or attachment failure.
    #[error(transparent)]
    Hardware(#[from] HalError),

    /// No usable hardware description.
    #[error("Configuration unsupported: {reason}")]
    ConfigurationUnsupported {
        /// What is wrong with the description.
        reason: String,
    },

    /// The registry could not reserve its own bookkeeping.
    #[error("Unable to allocate {what}")]
    AllocationFailure {
        /// What was being allocated.
        what: String,
    },

    /// The registry already holds bound devices.
    #[error("Registry busy: {reason}")]
    Busy {
        /// Why the request was refused.
        reason: String,
    },

    /// The node has neither an interrupt nor a GPIO it can be derived from.
    #[error("No interrupt for '{node}'")]
    NoInterrupt {
        /// Node name.
        node: String,
    },
}

impl RegistryError {
    /// Creates a configuration unsupported error.
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::ConfigurationUnsupported {
            reason: reason.into(),
        }
    }

    /// Returns the negative errno value for this error.
    pub fn errno(&self) -> i32 {
        match self {
            RegistryError::Counter(err) => err.errno(),
            RegistryError::Hardware(err) => err.errno(),
            RegistryError::ConfigurationUnsupported { .. } => -19,
            RegistryError::AllocationFailure { .. } => -12,
            RegistryError::Busy { .. } => -16,
            RegistryError::NoInterrupt { .. } => -22,
        }
    }
}

/// Errors raised while loading the daemon configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
