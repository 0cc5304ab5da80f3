//! Runtime bootstrap shared by the binary and integration tests.

pub mod error;
pub mod telemetry;
