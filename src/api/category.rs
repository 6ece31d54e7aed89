//! Allocation categories.

/// The subsystem an allocation is charged to.
///
/// Every pooled allocation belongs to exactly one category, and each
/// category keeps its own allocation list and counters so outstanding
/// memory can be enumerated, summed or reclaimed per subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum PoolCategory {
    /// Allocations with no better home.
    Uncategorised = 0,
    /// Renderer state and render queues.
    Renderer,
    /// Scene graph and scene data.
    Scene,
    /// Entity tables and components.
    Entity,
    /// Menus, fonts and widgets.
    Ui,
    /// Input buffers.
    Input,
    /// Console commands.
    Commands,
    /// Engine hook tables.
    Hooks,
    /// File system paths and file buffers.
    Filesystem,
    /// Shared utility containers.
    Utilities,
    /// Log buffers.
    Logging,
    /// Resource lists and their buckets.
    ResourceManagement,
    /// Memory handed to the graphics library.
    Graphics,
    /// Test manager bookkeeping.
    TestManager,
}

impl PoolCategory {
    /// Number of categories.
    pub const COUNT: usize = 14;

    /// Every category, in index order.
    pub const ALL: [PoolCategory; Self::COUNT] = [
        PoolCategory::Uncategorised,
        PoolCategory::Renderer,
        PoolCategory::Scene,
        PoolCategory::Entity,
        PoolCategory::Ui,
        PoolCategory::Input,
        PoolCategory::Commands,
        PoolCategory::Hooks,
        PoolCategory::Filesystem,
        PoolCategory::Utilities,
        PoolCategory::Logging,
        PoolCategory::ResourceManagement,
        PoolCategory::Graphics,
        PoolCategory::TestManager,
    ];

    /// Position of this category in [`PoolCategory::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Human-readable name, as shown in dumps.
    pub fn name(self) -> &'static str {
        match self {
            PoolCategory::Uncategorised => "Uncategorised",
            PoolCategory::Renderer => "Renderer",
            PoolCategory::Scene => "Scene",
            PoolCategory::Entity => "Entity",
            PoolCategory::Ui => "UI",
            PoolCategory::Input => "Input",
            PoolCategory::Commands => "Commands",
            PoolCategory::Hooks => "Hooks",
            PoolCategory::Filesystem => "Filesystem",
            PoolCategory::Utilities => "Utilities",
            PoolCategory::Logging => "Logging",
            PoolCategory::ResourceManagement => "Resource Management",
            PoolCategory::Graphics => "Graphics",
            PoolCategory::TestManager => "Test Manager",
        }
    }
}

impl Default for PoolCategory {
    fn default() -> Self {
        Self::Uncategorised
    }
}

impl std::fmt::Display for PoolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A raw category value that does not name any category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidCategory(pub u32);

impl std::fmt::Display for InvalidCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid pool category {} (expected < {})", self.0, PoolCategory::COUNT)
    }
}

impl std::error::Error for InvalidCategory {}

impl TryFrom<u32> for PoolCategory {
    type Error = InvalidCategory;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        PoolCategory::ALL
            .get(raw as usize)
            .copied()
            .ok_or(InvalidCategory(raw))
    }
}
