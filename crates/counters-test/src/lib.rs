//! Integration test infrastructure for pulse counter drivers
//!
//! Provides:
//! - A [`TestBench`] wiring the counter class, simulated controllers, a
//!   manual clock and an attribute tree together
//! - Hardware description fixtures
//! - A fault-injecting attribute publisher
//! - Verification helpers over attributes and controller state

pub mod fixtures;
mod verification;

pub use fixtures::*;
pub use verification::*;
