//! # slotpool
//!
//! Categorised pooled allocation and generational resource handles for game
//! engines.
//!
//! ## Features
//!
//! - Pooled allocator partitioned into per-subsystem categories
//! - Head and tail guards re-validated on every touch
//! - Per-category counters that reconcile against the allocation lists
//! - Leak reclamation and reporting at shutdown
//! - Opaque 128-bit resource handles with a domain, an index and a key
//! - Bucketed resource lists with lazy buckets and path deduplication
//! - Fixed-array entity tables sharing the same handle scheme
//! - Coded diagnostics through the `log` facade, with a strict mode for CI
//!
//! ## Quick Start
//!
//! ```rust
//! use slotpool::{PoolConfig, PooledAllocator, ResourceDomain, ResourceList, ResourceListAttributes};
//!
//! let pool = PooledAllocator::new(PoolConfig::default());
//!
//! let atts = ResourceListAttributes::new(ResourceDomain::Texture, 64, 16);
//! let mut textures: ResourceList<String> = ResourceList::new(&pool, atts).unwrap();
//!
//! let wall = textures.create_keyed("textures/wall.png").unwrap();
//! textures.get_mut(wall).unwrap().push_str("loaded");
//!
//! textures.destroy(wall);
//! assert!(textures.get(wall).is_none());
//!
//! drop(textures);
//! assert!(!pool.shutdown().has_leaks());
//! ```
//!
//! ## Fatal faults
//!
//! Allocator misuse and corruption (zero-size requests, double frees,
//! overwritten guards, counter overflow) log a diagnostic and panic with its
//! code. Stale or forged resource handles are never faults: lookups through
//! them simply find nothing.

pub mod api;
pub mod diagnostics;

mod allocators;
mod core;
mod debug;
mod sync;
mod util;

// Re-export public API at crate root for convenience
pub use api::category::{InvalidCategory, PoolCategory};
pub use api::config::{PoolConfig, ResourceListAttributes};
pub use api::error::{ResourceListError, ResourceListResult};
pub use api::loader::load_keyed;
pub use api::stats::{CategoryStats, PoolStats, ResourceListStats, ShutdownReport};

// Pooled allocation
pub use allocators::pool::{
    AllocationInfo, AllocationSite, PoolPtr, PooledAllocator, FOOTER_SIZE, HEADER_SIZE, HEAD_GUARD,
    TAIL_GUARD,
};
pub use crate::core::global;

// Handles
pub use allocators::handles::{
    decode_domain, encode, is_valid_for_domain, mint_key, ResourceDomain, ResourceHandle,
    DOMAIN_MASK, INTERNAL_DOMAIN_FLAG,
};

// Handle tables
pub use allocators::entity_table::EntityTable;
pub use allocators::resource_list::{Cursor, Iter, ResourceList};

// Diagnostics - Core types and predefined codes
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use diagnostics::{StrictMode, set_strict_mode, StrictModeGuard};
pub use diagnostics::{
    SP001, SP002, SP003, SP004, SP005, SP006, SP007, SP008, SP009, SP010, SP011, SP101, SP102,
    SP103, SP104, SP201, SP901, SP902,
};
