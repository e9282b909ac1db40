//! Verification helpers for pulse counter tests
//!
//! Provides assertion helpers over the attribute tree and the simulated
//! controllers

use counters_class::CounterError;
use counters_hal::{GpioPin, IrqNumber};
use thiserror::Error;

use crate::fixtures::TestBench;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Counter error: {0}")]
    Counter(#[from] CounterError),

    #[error("Value mismatch for '{path}': expected '{expected}', got '{actual}'")]
    ValueMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Expected '{path}' to be absent")]
    UnexpectedPath { path: String },

    #[error("Expected {expected} live devices, found {actual}")]
    DeviceCountMismatch { expected: usize, actual: usize },

    #[error("Expected GPIO {pin} reserved={expected}")]
    GpioState { pin: GpioPin, expected: bool },

    #[error("Expected {expected} handlers on IRQ {irq}, found {actual}")]
    HandlerCountMismatch {
        irq: IrqNumber,
        expected: usize,
        actual: usize,
    },

    #[error("Class not idle: {devices} devices, {usage} usage references")]
    NotIdle { devices: usize, usage: usize },

    #[error("{count} GPIO reservations left behind")]
    LeakedGpio { count: usize },

    #[error("{count} interrupt handlers left behind")]
    LeakedHandlers { count: usize },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Bench state verification helper
pub struct CounterVerifier<'a> {
    bench: &'a TestBench,
}

impl<'a> CounterVerifier<'a> {
    pub fn new(bench: &'a TestBench) -> Self {
        Self { bench }
    }

    /// Verify that reading `path` yields `expected` (without the trailing
    /// newline)
    pub fn assert_attribute(&self, path: &str, expected: &str) -> VerifyResult<()> {
        let actual = self.bench.tree().read(self.bench.class(), path)?;
        let actual = actual.trim_end_matches('\n');
        if actual != expected {
            return Err(VerificationError::ValueMismatch {
                path: path.to_string(),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    /// Verify that nothing is published at `path`
    pub fn assert_absent(&self, path: &str) -> VerifyResult<()> {
        if self.bench.tree().contains(path) {
            return Err(VerificationError::UnexpectedPath {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    pub fn assert_device_count(&self, expected: usize) -> VerifyResult<()> {
        let actual = self.bench.class().device_count();
        if actual != expected {
            return Err(VerificationError::DeviceCountMismatch { expected, actual });
        }
        Ok(())
    }

    pub fn assert_gpio_reserved(&self, pin: GpioPin, expected: bool) -> VerifyResult<()> {
        if self.bench.gpio.is_requested(pin) != expected {
            return Err(VerificationError::GpioState { pin, expected });
        }
        Ok(())
    }

    pub fn assert_handlers(&self, irq: IrqNumber, expected: usize) -> VerifyResult<()> {
        let actual = self.bench.irq.handler_count(irq);
        if actual != expected {
            return Err(VerificationError::HandlerCountMismatch {
                irq,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Verify that no device, usage reference, handler or GPIO reservation
    /// is left
    pub fn assert_idle(&self) -> VerifyResult<()> {
        let class = self.bench.class();
        if !class.is_idle() {
            return Err(VerificationError::NotIdle {
                devices: class.device_count(),
                usage: class.usage_count(),
            });
        }
        let count = self.bench.gpio.requested_count();
        if count != 0 {
            return Err(VerificationError::LeakedGpio { count });
        }
        let count = self.bench.irq.total_handlers();
        if count != 0 {
            return Err(VerificationError::LeakedHandlers { count });
        }
        Ok(())
    }
}
