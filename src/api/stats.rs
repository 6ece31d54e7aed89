//! Allocation statistics.

use crate::api::category::PoolCategory;
use crate::util::size::format_bytes;

/// Counters for a single allocation category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryStats {
    /// Number of live allocations.
    pub allocations: usize,

    /// Bytes requested by callers for live allocations.
    pub client_bytes: usize,

    /// Bytes used by live allocations including records and guards.
    pub total_bytes: usize,

    /// Highest `total_bytes` observed since init.
    pub peak_bytes: usize,
}

impl CategoryStats {
    /// Bytes spent on bookkeeping rather than payload.
    pub fn overhead_bytes(&self) -> usize {
        self.total_bytes.saturating_sub(self.client_bytes)
    }

    /// Whether the category holds no allocations.
    pub fn is_empty(&self) -> bool {
        self.allocations == 0
    }
}

/// A snapshot of every category's counters.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Per-category counters, indexed by [`PoolCategory::index`].
    pub categories: [CategoryStats; PoolCategory::COUNT],
}

impl PoolStats {
    /// Counters for one category.
    pub fn category(&self, category: PoolCategory) -> &CategoryStats {
        &self.categories[category.index()]
    }

    /// Live allocations across all categories.
    pub fn total_allocations(&self) -> usize {
        self.categories.iter().map(|c| c.allocations).sum()
    }

    /// Client bytes across all categories.
    pub fn total_client_bytes(&self) -> usize {
        self.categories.iter().map(|c| c.client_bytes).sum()
    }

    /// Total bytes across all categories.
    pub fn total_bytes(&self) -> usize {
        self.categories.iter().map(|c| c.total_bytes).sum()
    }
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Pool Statistics:")?;
        for category in PoolCategory::ALL {
            let stats = self.category(category);
            if stats.is_empty() && stats.peak_bytes == 0 {
                continue;
            }
            writeln!(
                f,
                "  {:<20} {:>6} allocs  {:>10} client  {:>10} total  {:>10} peak",
                category.name(),
                stats.allocations,
                format_bytes(stats.client_bytes),
                format_bytes(stats.total_bytes),
                format_bytes(stats.peak_bytes),
            )?;
        }
        writeln!(
            f,
            "  {:<20} {:>6} allocs  {:>10} client  {:>10} total",
            "All",
            self.total_allocations(),
            format_bytes(self.total_client_bytes()),
            format_bytes(self.total_bytes()),
        )?;
        Ok(())
    }
}

/// What [`PooledAllocator::shutdown`](crate::PooledAllocator::shutdown)
/// reclaimed.
#[derive(Debug, Clone, Default)]
pub struct ShutdownReport {
    /// Allocations still live at shutdown, across all categories.
    pub leaked_allocations: usize,

    /// Client bytes those allocations held.
    pub leaked_client_bytes: usize,

    /// Counters of each category immediately before reclamation.
    pub per_category: PoolStats,
}

impl ShutdownReport {
    pub(crate) fn from_stats(per_category: PoolStats) -> Self {
        Self {
            leaked_allocations: per_category.total_allocations(),
            leaked_client_bytes: per_category.total_client_bytes(),
            per_category,
        }
    }

    /// Whether any allocation was still live at shutdown.
    pub fn has_leaks(&self) -> bool {
        self.leaked_allocations > 0
    }

    /// Categories that still held allocations.
    pub fn leaking_categories(&self) -> impl Iterator<Item = PoolCategory> + '_ {
        PoolCategory::ALL
            .into_iter()
            .filter(move |c| !self.per_category.category(*c).is_empty())
    }
}

/// Occupancy of a resource list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceListStats {
    /// Live items.
    pub items: u32,

    /// Maximum live items.
    pub capacity: u32,

    /// Buckets currently backed by memory.
    pub allocated_buckets: u32,

    /// Buckets the list may hold.
    pub bucket_count: u32,

    /// Handles queued for deferred destruction.
    pub pending_destroys: usize,
}

impl ResourceListStats {
    /// Fraction of capacity in use, 0.0 to 1.0.
    pub fn occupancy(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.items as f64 / self.capacity as f64
    }
}

impl std::fmt::Display for ResourceListStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} items, {}/{} buckets, {} pending",
            self.items, self.capacity, self.allocated_buckets, self.bucket_count, self.pending_destroys
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals() {
        let mut stats = PoolStats::default();
        stats.categories[PoolCategory::Scene.index()] = CategoryStats {
            allocations: 2,
            client_bytes: 64,
            total_bytes: 200,
            peak_bytes: 200,
        };
        stats.categories[PoolCategory::Ui.index()] = CategoryStats {
            allocations: 1,
            client_bytes: 8,
            total_bytes: 80,
            peak_bytes: 120,
        };

        assert_eq!(stats.total_allocations(), 3);
        assert_eq!(stats.total_client_bytes(), 72);
        assert_eq!(stats.category(PoolCategory::Scene).overhead_bytes(), 136);
        assert!(stats.to_string().contains("Scene"));
        assert!(!stats.to_string().contains("Renderer"));
    }

    #[test]
    fn test_shutdown_report() {
        assert!(!ShutdownReport::default().has_leaks());

        let mut stats = PoolStats::default();
        stats.categories[PoolCategory::Hooks.index()].allocations = 1;
        stats.categories[PoolCategory::Hooks.index()].client_bytes = 16;
        let report = ShutdownReport::from_stats(stats);

        assert!(report.has_leaks());
        assert_eq!(report.leaked_client_bytes, 16);
        assert_eq!(report.leaking_categories().collect::<Vec<_>>(), vec![PoolCategory::Hooks]);
    }

    #[test]
    fn test_occupancy() {
        let stats = ResourceListStats {
            items: 2,
            capacity: 8,
            ..Default::default()
        };
        assert_eq!(stats.occupancy(), 0.25);
    }
}
