//! Public API for slotpool.
//!
//! Configuration, statistics, errors and helpers shared by the allocator
//! and the handle tables.

pub mod category;
pub mod config;
pub mod error;
pub mod loader;
pub mod stats;
