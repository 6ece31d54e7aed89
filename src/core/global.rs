//! Process-wide pooled allocator.
//!
//! Engines that want a single allocator for their whole lifetime can use
//! this instead of threading a [`PooledAllocator`] through every subsystem.
//! The instance is created lazily and can be initialised and shut down any
//! number of times.

use std::sync::OnceLock;

use crate::allocators::pool::PooledAllocator;
use crate::api::config::PoolConfig;
use crate::api::stats::ShutdownReport;

static GLOBAL: OnceLock<PooledAllocator> = OnceLock::new();

fn instance() -> &'static PooledAllocator {
    GLOBAL.get_or_init(PooledAllocator::uninitialised)
}

/// Initialise the process-wide allocator and return a handle to it.
pub fn init(config: PoolConfig) -> PooledAllocator {
    let pool = instance();
    pool.init(config);
    pool.clone()
}

/// The process-wide allocator.
///
/// Allocating through it before [`init`] is fatal.
pub fn allocator() -> PooledAllocator {
    instance().clone()
}

/// Shut the process-wide allocator down.
pub fn shutdown() -> ShutdownReport {
    instance().shutdown()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::category::PoolCategory;

    #[test]
    fn test_global_lifecycle() {
        let pool = init(PoolConfig::release());
        let ptr = allocator().allocate(PoolCategory::Commands, 24);
        assert_eq!(pool.payload_len(ptr), 24);

        let report = shutdown();
        assert_eq!(report.leaked_allocations, 1);
        assert!(!allocator().is_initialised());
    }
}
