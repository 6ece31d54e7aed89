//! Shared allocator state.

pub mod global;
