//! Debug utilities for tracking allocations.
//!
//! Backtrace capture is only compiled when the `debug` feature is enabled.

#[cfg(feature = "debug")]
pub(crate) mod backtrace;
pub(crate) mod poison;
