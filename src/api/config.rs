//! Allocator and resource list configuration.

use crate::allocators::handles::ResourceDomain;

/// Configuration for the pooled allocator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Enable allocation dumps and uninitialised-memory poisoning
    /// (default: on in debug builds, off in release)
    pub debugging_enabled: bool,

    /// Fill fresh, non-zeroed payload bytes with a recognisable pattern
    /// while debugging is enabled
    pub poison_uninit: bool,

    /// Log a warning per category with outstanding allocations at shutdown
    pub warn_on_leaks: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            debugging_enabled: cfg!(debug_assertions),
            poison_uninit: true,
            warn_on_leaks: true,
        }
    }
}

impl PoolConfig {
    /// Create a config with all debugging aids switched off.
    pub fn release() -> Self {
        Self {
            debugging_enabled: false,
            poison_uninit: false,
            warn_on_leaks: true,
        }
    }

    /// Create a config with all debugging aids switched on.
    pub fn debug() -> Self {
        Self {
            debugging_enabled: true,
            poison_uninit: true,
            warn_on_leaks: true,
        }
    }

    /// Create the default config, overridden by the environment.
    ///
    /// `SLOTPOOL_DEBUG` accepts `1`/`true`/`on` and `0`/`false`/`off`.
    /// Other values are ignored.
    pub fn from_env() -> Self {
        let config = Self::default();

        match std::env::var("SLOTPOOL_DEBUG") {
            Ok(value) => match parse_switch(&value) {
                Some(enabled) => config.with_debugging(enabled),
                None => config,
            },
            Err(_) => config,
        }
    }

    /// Builder pattern: enable debugging.
    pub fn with_debugging(mut self, enable: bool) -> Self {
        self.debugging_enabled = enable;
        self
    }

    /// Builder pattern: enable uninitialised-memory poisoning.
    pub fn with_poison_uninit(mut self, enable: bool) -> Self {
        self.poison_uninit = enable;
        self
    }

    /// Builder pattern: enable leak warnings at shutdown.
    pub fn with_leak_warnings(mut self, enable: bool) -> Self {
        self.warn_on_leaks = enable;
        self
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "on" => Some(true),
        "0" | "false" | "off" => Some(false),
        _ => None,
    }
}

/// Shape of a resource list.
///
/// `max_capacity` should be a multiple of `items_per_bucket`; a remainder
/// is truncated away when the list is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceListAttributes {
    /// Domain stamped into every handle the list creates
    pub domain: ResourceDomain,

    /// Maximum number of live items
    pub max_capacity: u32,

    /// Slots per lazily allocated bucket
    pub items_per_bucket: u32,
}

impl ResourceListAttributes {
    /// Create attributes for a list in `domain`.
    pub fn new(domain: ResourceDomain, max_capacity: u32, items_per_bucket: u32) -> Self {
        Self {
            domain,
            max_capacity,
            items_per_bucket,
        }
    }

    /// Builder pattern: set maximum capacity.
    pub fn with_max_capacity(mut self, max_capacity: u32) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Builder pattern: set items per bucket.
    pub fn with_items_per_bucket(mut self, items_per_bucket: u32) -> Self {
        self.items_per_bucket = items_per_bucket;
        self
    }

    /// Number of buckets the list will hold once truncated.
    pub fn bucket_count(&self) -> u32 {
        if self.items_per_bucket == 0 {
            0
        } else {
            self.max_capacity / self.items_per_bucket
        }
    }
}
