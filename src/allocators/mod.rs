//! Allocation backends.
//!
//! The pooled allocator and the handle tables built on it.

pub(crate) mod deferred;
pub(crate) mod entity_table;
pub(crate) mod handles;
pub(crate) mod pool;
pub(crate) mod resource_list;
