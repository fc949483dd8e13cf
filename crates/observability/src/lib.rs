//! Process-wide tracing setup.

pub mod tracing;

pub use self::tracing::{LogConfig, init};
