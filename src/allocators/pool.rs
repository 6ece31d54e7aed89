//! Categorised pooled allocator.
//!
//! Every allocation is charged to a [`PoolCategory`], framed by a head and
//! tail guard, and linked into its category's list so outstanding memory can
//! be enumerated, summed, or reclaimed per subsystem. Allocations are handed
//! out as [`PoolPtr`] values (slot index plus generation) rather than raw
//! addresses, so a freed pointer can never alias a later allocation.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::api::category::PoolCategory;
use crate::api::config::PoolConfig;
use crate::api::stats::{CategoryStats, PoolStats, ShutdownReport};
use crate::debug::poison;
use crate::diagnostics::{
    self, Diagnostic, SP001, SP002, SP003, SP004, SP005, SP006, SP007, SP008, SP009, SP010,
    SP011, SP901,
};
use crate::sync::mutex::Mutex;

#[cfg(feature = "debug")]
use crate::debug::backtrace::AllocationTrace;

/// Value written immediately before every payload.
pub const HEAD_GUARD: u32 = 0xF9A2_3BAD;

/// Value written immediately after every payload.
pub const TAIL_GUARD: u32 = !HEAD_GUARD;

const GUARD_SIZE: usize = std::mem::size_of::<u32>();

/// Bytes of bookkeeping charged before each payload.
pub const HEADER_SIZE: usize = std::mem::size_of::<AllocationRecord>() + GUARD_SIZE;

/// Bytes of bookkeeping charged after each payload.
pub const FOOTER_SIZE: usize = GUARD_SIZE;

/// Reference to a pooled allocation.
///
/// A `PoolPtr` is only meaningful to the allocator that produced it. Once the
/// allocation is freed (or reclaimed at shutdown) the pointer goes stale and
/// every further use is reported as a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolPtr {
    index: u32,
    generation: u32,
}

impl PoolPtr {
    /// The null pointer.
    pub const fn null() -> Self {
        Self {
            index: u32::MAX,
            generation: 0,
        }
    }

    /// Check if this is the null pointer.
    pub fn is_null(&self) -> bool {
        self.index == u32::MAX
    }

    /// Get the raw slot index (for debugging).
    pub fn raw_index(&self) -> u32 {
        self.index
    }

    /// Get the generation (for debugging).
    pub fn raw_generation(&self) -> u32 {
        self.generation
    }
}

impl Default for PoolPtr {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Display for PoolPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("PoolPtr(null)")
        } else {
            write!(f, "PoolPtr({}v{})", self.index, self.generation)
        }
    }
}

/// Source location an allocation was requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationSite {
    /// Source file.
    pub file: &'static str,
    /// Line within `file`.
    pub line: u32,
}

impl AllocationSite {
    #[track_caller]
    fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl fmt::Display for AllocationSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Read-only description of a live allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationInfo {
    /// The allocation.
    pub ptr: PoolPtr,
    /// Category it is charged to.
    pub category: PoolCategory,
    /// Payload size in bytes.
    pub size: usize,
    /// Where it was allocated (or last reallocated).
    pub site: AllocationSite,
}

impl fmt::Display for AllocationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} bytes in {} allocated at {} ({})",
            self.size, self.category, self.site, self.ptr
        )
    }
}

/// Per-allocation bookkeeping.
///
/// `block` is laid out as head guard, payload, tail guard.
struct AllocationRecord {
    category: PoolCategory,
    site: AllocationSite,
    prev: Option<u32>,
    next: Option<u32>,
    block: Vec<u8>,
    #[cfg(feature = "debug")]
    trace: AllocationTrace,
}

impl AllocationRecord {
    fn new(category: PoolCategory, size: usize, site: AllocationSite) -> Self {
        let mut record = Self {
            category,
            site,
            prev: None,
            next: None,
            block: vec![0; size + 2 * GUARD_SIZE],
            #[cfg(feature = "debug")]
            trace: AllocationTrace::capture(),
        };
        record.write_guards();
        record
    }

    fn payload_len(&self) -> usize {
        self.block.len() - 2 * GUARD_SIZE
    }

    fn payload(&self) -> &[u8] {
        &self.block[GUARD_SIZE..GUARD_SIZE + self.payload_len()]
    }

    fn payload_mut(&mut self) -> &mut [u8] {
        let len = self.payload_len();
        &mut self.block[GUARD_SIZE..GUARD_SIZE + len]
    }

    fn write_guards(&mut self) {
        let tail = self.block.len() - GUARD_SIZE;
        self.block[..GUARD_SIZE].copy_from_slice(&HEAD_GUARD.to_le_bytes());
        self.block[tail..].copy_from_slice(&TAIL_GUARD.to_le_bytes());
    }

    fn check_guards(&self) -> Result<(), &'static Diagnostic> {
        let tail = self.block.len() - GUARD_SIZE;
        if read_guard(&self.block[..GUARD_SIZE]) != HEAD_GUARD {
            return Err(&SP004);
        }
        if read_guard(&self.block[tail..]) != TAIL_GUARD {
            return Err(&SP005);
        }
        Ok(())
    }

    fn info(&self, ptr: PoolPtr) -> AllocationInfo {
        AllocationInfo {
            ptr,
            category: self.category,
            size: self.payload_len(),
            site: self.site,
        }
    }
}

fn read_guard(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; GUARD_SIZE];
    raw.copy_from_slice(bytes);
    u32::from_le_bytes(raw)
}

fn charged_size(size: usize) -> Option<usize> {
    size.checked_add(HEADER_SIZE + FOOTER_SIZE)
}

struct RecordSlot {
    generation: u32,
    record: Option<AllocationRecord>,
}

#[derive(Debug, Clone, Copy, Default)]
struct CategoryPool {
    head: Option<u32>,
    tail: Option<u32>,
    stats: CategoryStats,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Fill {
    Poison,
    Zero,
}

/// A fatal fault detected while the state lock was held.
///
/// Raised only after the lock is released.
struct PoolFault {
    diag: &'static Diagnostic,
    context: String,
}

impl PoolFault {
    fn new(diag: &'static Diagnostic, context: String) -> Self {
        Self { diag, context }
    }

    fn raise(self) -> ! {
        diagnostics::fatal(self.diag, &self.context)
    }
}

fn or_fatal<T>(result: Result<T, PoolFault>) -> T {
    match result {
        Ok(value) => value,
        Err(fault) => fault.raise(),
    }
}

struct PoolState {
    initialised: bool,
    config: PoolConfig,
    debugging_enabled: bool,
    slots: Vec<RecordSlot>,
    free_slots: Vec<u32>,
    pools: [CategoryPool; PoolCategory::COUNT],
}

impl PoolState {
    fn new() -> Self {
        Self {
            initialised: false,
            config: PoolConfig::default(),
            debugging_enabled: false,
            slots: Vec::new(),
            free_slots: Vec::new(),
            pools: Default::default(),
        }
    }

    fn ensure_initialised(&self, op: &str) -> Result<(), PoolFault> {
        if self.initialised {
            Ok(())
        } else {
            Err(PoolFault::new(&SP008, op.to_string()))
        }
    }

    fn poisons_fresh_memory(&self) -> bool {
        self.debugging_enabled && self.config.poison_uninit
    }

    fn record_at(&self, index: u32) -> Option<&AllocationRecord> {
        self.slots.get(index as usize).and_then(|s| s.record.as_ref())
    }

    fn record_at_mut(&mut self, index: u32) -> Option<&mut AllocationRecord> {
        self.slots.get_mut(index as usize).and_then(|s| s.record.as_mut())
    }

    /// Resolve a pointer to its record, re-validating both guards.
    fn record(&self, ptr: PoolPtr, op: &str) -> Result<&AllocationRecord, PoolFault> {
        let record = self
            .slots
            .get(ptr.index as usize)
            .filter(|slot| slot.generation == ptr.generation)
            .and_then(|slot| slot.record.as_ref())
            .ok_or_else(|| PoolFault::new(&SP007, format!("{}({})", op, ptr)))?;

        record
            .check_guards()
            .map_err(|diag| PoolFault::new(diag, format!("{}({}): {}", op, ptr, record.info(ptr))))?;

        Ok(record)
    }

    fn record_mut(&mut self, ptr: PoolPtr, op: &str) -> Result<&mut AllocationRecord, PoolFault> {
        self.record(ptr, op)?;
        self.record_at_mut(ptr.index)
            .ok_or_else(|| PoolFault::new(&SP007, format!("{}({})", op, ptr)))
    }

    fn charge(&mut self, category: PoolCategory, size: usize, op: &str) -> Result<(), PoolFault> {
        let overflow = || PoolFault::new(&SP002, format!("{}: {} bytes in {}", op, size, category));
        let stats = &mut self.pools[category.index()].stats;

        let total = charged_size(size).ok_or_else(overflow)?;
        let allocations = stats.allocations.checked_add(1).ok_or_else(overflow)?;
        let client_bytes = stats.client_bytes.checked_add(size).ok_or_else(overflow)?;
        let total_bytes = stats.total_bytes.checked_add(total).ok_or_else(overflow)?;

        stats.allocations = allocations;
        stats.client_bytes = client_bytes;
        stats.total_bytes = total_bytes;
        stats.peak_bytes = stats.peak_bytes.max(total_bytes);
        Ok(())
    }

    fn refund(&mut self, category: PoolCategory, size: usize, op: &str) -> Result<(), PoolFault> {
        let underflow = || PoolFault::new(&SP003, format!("{}: {} bytes in {}", op, size, category));
        let stats = &mut self.pools[category.index()].stats;

        let total = charged_size(size).ok_or_else(underflow)?;
        let allocations = stats.allocations.checked_sub(1).ok_or_else(underflow)?;
        let client_bytes = stats.client_bytes.checked_sub(size).ok_or_else(underflow)?;
        let total_bytes = stats.total_bytes.checked_sub(total).ok_or_else(underflow)?;

        stats.allocations = allocations;
        stats.client_bytes = client_bytes;
        stats.total_bytes = total_bytes;
        Ok(())
    }

    fn link_tail(&mut self, index: u32, category: PoolCategory) {
        let pool = &mut self.pools[category.index()];
        let old_tail = pool.tail.replace(index);
        if pool.head.is_none() {
            pool.head = Some(index);
        }

        if let Some(tail) = old_tail.and_then(|t| self.record_at_mut(t)) {
            tail.next = Some(index);
        }
        if let Some(record) = self.record_at_mut(index) {
            record.category = category;
            record.prev = old_tail;
            record.next = None;
        }
    }

    fn unlink(&mut self, index: u32) {
        let Some((category, prev, next)) = self.record_at(index).map(|r| (r.category, r.prev, r.next))
        else {
            return;
        };

        match prev.and_then(|p| self.record_at_mut(p)) {
            Some(prev) => prev.next = next,
            None => self.pools[category.index()].head = next,
        }
        match next.and_then(|n| self.record_at_mut(n)) {
            Some(next) => next.prev = prev,
            None => self.pools[category.index()].tail = prev,
        }
        if let Some(record) = self.record_at_mut(index) {
            record.prev = None;
            record.next = None;
        }
    }

    fn allocate(
        &mut self,
        category: PoolCategory,
        size: usize,
        site: AllocationSite,
        fill: Fill,
    ) -> Result<PoolPtr, PoolFault> {
        let op = format!("allocate({}, {}) at {}", category, size, site);
        self.ensure_initialised(&op)?;
        if size == 0 {
            return Err(PoolFault::new(&SP001, op));
        }
        if self.free_slots.is_empty() && self.slots.len() >= u32::MAX as usize {
            return Err(PoolFault::new(&SP002, op));
        }
        self.charge(category, size, &op)?;

        let mut record = AllocationRecord::new(category, size, site);
        if fill == Fill::Poison && self.poisons_fresh_memory() {
            poison::poison_uninit(record.payload_mut());
        }

        let ptr = match self.free_slots.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.record = Some(record);
                PoolPtr {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(RecordSlot {
                    generation: 0,
                    record: Some(record),
                });
                PoolPtr {
                    index,
                    generation: 0,
                }
            }
        };

        self.link_tail(ptr.index, category);
        log::trace!("[slotpool] {} -> {}", op, ptr);
        Ok(ptr)
    }

    fn reallocate(
        &mut self,
        category: PoolCategory,
        ptr: PoolPtr,
        new_size: usize,
        site: AllocationSite,
    ) -> Result<PoolPtr, PoolFault> {
        if ptr.is_null() {
            return self.allocate(category, new_size, site, Fill::Poison);
        }

        let op = format!("reallocate({}, {}, {}) at {}", category, ptr, new_size, site);
        self.ensure_initialised(&op)?;
        if new_size == 0 {
            return Err(PoolFault::new(&SP001, op));
        }

        let (old_category, old_size) = {
            let record = self.record(ptr, &op)?;
            (record.category, record.payload_len())
        };

        self.refund(old_category, old_size, &op)?;
        self.charge(category, new_size, &op)?;
        let moved = old_category != category;
        if moved {
            self.unlink(ptr.index);
        }

        let poison_growth = self.poisons_fresh_memory();
        if let Some(record) = self.record_at_mut(ptr.index) {
            record.block.truncate(GUARD_SIZE + old_size.min(new_size));
            record.block.resize(new_size + 2 * GUARD_SIZE, 0);
            if poison_growth && new_size > old_size {
                poison::poison_uninit(&mut record.block[GUARD_SIZE + old_size..GUARD_SIZE + new_size]);
            }
            record.write_guards();
            record.site = site;
        }

        if moved {
            self.link_tail(ptr.index, category);
        }
        log::trace!("[slotpool] {} ({} -> {} bytes)", op, old_size, new_size);
        Ok(ptr)
    }

    fn free(&mut self, ptr: PoolPtr, site: AllocationSite) -> Result<(), PoolFault> {
        let op = format!("free({}) at {}", ptr, site);
        self.ensure_initialised(&op)?;
        if ptr.is_null() {
            return Err(PoolFault::new(&SP006, op));
        }

        let (category, size) = {
            let record = self.record(ptr, &op)?;
            (record.category, record.payload_len())
        };

        self.refund(category, size, &op)?;
        self.unlink(ptr.index);
        self.release_slot(ptr.index);
        log::trace!("[slotpool] {}", op);
        Ok(())
    }

    fn release_slot(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        slot.record = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(index);
    }

    fn walk(&self, category: PoolCategory) -> Result<Vec<AllocationInfo>, PoolFault> {
        let mut infos = Vec::with_capacity(self.pools[category.index()].stats.allocations);
        let mut cursor = self.pools[category.index()].head;

        while let Some(index) = cursor {
            let generation = self.slots[index as usize].generation;
            let ptr = PoolPtr { index, generation };
            let record = self.record(ptr, "walk_category")?;
            infos.push(record.info(ptr));
            cursor = record.next;
        }

        Ok(infos)
    }

    fn check_counters(&self) -> Result<(), PoolFault> {
        for category in PoolCategory::ALL {
            let mut walked = CategoryStats::default();
            for info in self.walk(category)? {
                walked.allocations += 1;
                walked.client_bytes += info.size;
                walked.total_bytes += charged_size(info.size).unwrap_or(usize::MAX);
            }

            let tracked = self.pools[category.index()].stats;
            if walked.allocations != tracked.allocations
                || walked.client_bytes != tracked.client_bytes
                || walked.total_bytes != tracked.total_bytes
            {
                return Err(PoolFault::new(
                    &SP901,
                    format!(
                        "{}: walked {} allocs/{} client/{} total, tracked {} allocs/{} client/{} total",
                        category,
                        walked.allocations,
                        walked.client_bytes,
                        walked.total_bytes,
                        tracked.allocations,
                        tracked.client_bytes,
                        tracked.total_bytes
                    ),
                ));
            }
        }
        Ok(())
    }

    fn stats(&self) -> PoolStats {
        let mut stats = PoolStats::default();
        for (out, pool) in stats.categories.iter_mut().zip(self.pools.iter()) {
            *out = pool.stats;
        }
        stats
    }

    fn dump_lines(&self, ptr: PoolPtr) -> Result<(AllocationInfo, Option<String>), PoolFault> {
        let record = self.record(ptr, "dump_allocation")?;
        #[cfg(feature = "debug")]
        let trace = Some(record.trace.render());
        #[cfg(not(feature = "debug"))]
        let trace = None;
        Ok((record.info(ptr), trace))
    }

    fn reclaim_all(&mut self) -> Result<(), PoolFault> {
        for index in 0..self.slots.len() as u32 {
            let Some((category, size)) = self.record_at(index).map(|r| (r.category, r.payload_len()))
            else {
                continue;
            };
            self.refund(category, size, "shutdown")?;
            self.release_slot(index);
        }

        for pool in self.pools.iter_mut() {
            pool.head = None;
            pool.tail = None;
        }
        self.check_counters()?;

        for pool in self.pools.iter_mut() {
            pool.stats = CategoryStats::default();
        }
        Ok(())
    }
}

/// The categorised pooled allocator.
///
/// Cheap to clone; clones share the same pools. All methods take `&self`.
///
/// # Example
///
/// ```rust
/// use slotpool::{PoolCategory, PoolConfig, PooledAllocator};
///
/// let pool = PooledAllocator::new(PoolConfig::default());
/// let ptr = pool.allocate(PoolCategory::Scene, 64);
/// pool.with_payload_mut(ptr, |bytes| bytes[0] = 7);
/// assert_eq!(pool.category_stats(PoolCategory::Scene).client_bytes, 64);
/// pool.free(ptr);
///
/// let report = pool.shutdown();
/// assert!(!report.has_leaks());
/// ```
#[derive(Clone)]
pub struct PooledAllocator {
    inner: Arc<Mutex<PoolState>>,
}

impl PooledAllocator {
    /// Create and initialise an allocator.
    pub fn new(config: PoolConfig) -> Self {
        let pool = Self::uninitialised();
        pool.init(config);
        pool
    }

    /// Create an allocator that must be initialised with
    /// [`init`](Self::init) before use.
    pub fn uninitialised() -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoolState::new())),
        }
    }

    /// Initialise the allocator.
    ///
    /// An allocator can be initialised again after [`shutdown`](Self::shutdown).
    /// Calling this on an initialised allocator has no effect.
    pub fn init(&self, config: PoolConfig) {
        let mut state = self.inner.lock();
        if state.initialised {
            log::warn!("[slotpool] init() called on an initialised allocator; ignoring");
            return;
        }

        state.debugging_enabled = config.debugging_enabled;
        state.config = config;
        state.initialised = true;
        log::debug!(
            "[slotpool] pooled allocator initialised (debugging {})",
            if state.debugging_enabled { "on" } else { "off" }
        );
    }

    /// Check if the allocator is initialised.
    pub fn is_initialised(&self) -> bool {
        self.inner.lock().initialised
    }

    /// Check if dumps and poisoning are enabled.
    pub fn is_debugging_enabled(&self) -> bool {
        self.inner.lock().debugging_enabled
    }

    /// Toggle dumps and poisoning.
    ///
    /// Ignored while the allocator is not initialised.
    pub fn set_debugging_enabled(&self, enabled: bool) {
        let mut state = self.inner.lock();
        if state.initialised {
            state.debugging_enabled = enabled;
        }
    }

    /// Allocate `size` bytes charged to `category`.
    ///
    /// Fresh payload bytes are unspecified; with debugging enabled they hold
    /// the uninitialised pattern.
    ///
    /// # Panics
    ///
    /// Fatal if the allocator is not initialised, `size` is zero, or a
    /// category counter would overflow.
    #[track_caller]
    pub fn allocate(&self, category: PoolCategory, size: usize) -> PoolPtr {
        let site = AllocationSite::caller();
        let result = self.inner.lock().allocate(category, size, site, Fill::Poison);
        or_fatal(result)
    }

    /// Allocate `count * element_size` zeroed bytes charged to `category`.
    ///
    /// # Panics
    ///
    /// As [`allocate`](Self::allocate), and fatal if the multiplication
    /// overflows.
    #[track_caller]
    pub fn allocate_zeroed(&self, category: PoolCategory, count: usize, element_size: usize) -> PoolPtr {
        let site = AllocationSite::caller();
        let Some(size) = count.checked_mul(element_size) else {
            diagnostics::fatal(
                &SP011,
                &format!("allocate_zeroed({}, {} x {}) at {}", category, count, element_size, site),
            );
        };
        let result = self.inner.lock().allocate(category, size, site, Fill::Zero);
        or_fatal(result)
    }

    /// Resize an allocation, moving it to `category`.
    ///
    /// A null `ptr` behaves as [`allocate`](Self::allocate). The payload is
    /// preserved up to the smaller of the two sizes and the returned pointer
    /// equals `ptr`.
    ///
    /// # Panics
    ///
    /// Fatal if `ptr` is stale, a guard was overwritten, `new_size` is zero,
    /// or a counter would overflow or underflow.
    #[track_caller]
    pub fn reallocate(&self, category: PoolCategory, ptr: PoolPtr, new_size: usize) -> PoolPtr {
        let site = AllocationSite::caller();
        let result = self.inner.lock().reallocate(category, ptr, new_size, site);
        or_fatal(result)
    }

    /// Free an allocation.
    ///
    /// # Panics
    ///
    /// Fatal on a null pointer, a stale pointer (double free), or an
    /// overwritten guard.
    #[track_caller]
    pub fn free(&self, ptr: PoolPtr) {
        let site = AllocationSite::caller();
        let result = self.inner.lock().free(ptr, site);
        or_fatal(result)
    }

    /// Free an allocation if it is still live.
    ///
    /// Used by owners whose reservations may already have been reclaimed by
    /// [`shutdown`](Self::shutdown).
    #[track_caller]
    pub(crate) fn free_if_live(&self, ptr: PoolPtr) -> bool {
        let site = AllocationSite::caller();
        let result = {
            let mut state = self.inner.lock();
            let live = state.initialised
                && state
                    .slots
                    .get(ptr.index as usize)
                    .map_or(false, |s| s.generation == ptr.generation && s.record.is_some());
            if !live {
                return false;
            }
            state.free(ptr, site)
        };
        or_fatal(result);
        true
    }

    /// Run `f` over the payload of `ptr`.
    ///
    /// `f` must not call back into this allocator.
    pub fn with_payload<R>(&self, ptr: PoolPtr, f: impl FnOnce(&[u8]) -> R) -> R {
        let state = self.inner.lock();
        let fault = match state.record(ptr, "with_payload") {
            Ok(record) => return f(record.payload()),
            Err(fault) => fault,
        };
        drop(state);
        fault.raise()
    }

    /// Run `f` over the payload of `ptr` mutably.
    ///
    /// `f` must not call back into this allocator.
    pub fn with_payload_mut<R>(&self, ptr: PoolPtr, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut state = self.inner.lock();
        let fault = match state.record_mut(ptr, "with_payload_mut") {
            Ok(record) => return f(record.payload_mut()),
            Err(fault) => fault,
        };
        drop(state);
        fault.raise()
    }

    /// Payload size of `ptr` in bytes.
    pub fn payload_len(&self, ptr: PoolPtr) -> usize {
        self.with_payload(ptr, |bytes| bytes.len())
    }

    /// Describe a live allocation.
    ///
    /// Returns `None` for null or stale pointers.
    pub fn allocation_info(&self, ptr: PoolPtr) -> Option<AllocationInfo> {
        let result = {
            let state = self.inner.lock();
            let live = state
                .slots
                .get(ptr.index as usize)
                .map_or(false, |s| s.generation == ptr.generation && s.record.is_some());
            if !live {
                return None;
            }
            state.record(ptr, "allocation_info").map(|r| r.info(ptr))
        };
        Some(or_fatal(result))
    }

    /// Every live allocation in `category`, in list order.
    pub fn walk_category(&self, category: PoolCategory) -> Vec<AllocationInfo> {
        let result = self.inner.lock().walk(category);
        or_fatal(result)
    }

    /// Counters for one category.
    pub fn category_stats(&self, category: PoolCategory) -> CategoryStats {
        self.inner.lock().pools[category.index()].stats
    }

    /// Counters for every category.
    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats()
    }

    /// Reconcile every category's counters against its allocation list.
    ///
    /// # Panics
    ///
    /// Fatal if any category's walked totals differ from its counters.
    pub fn check_counters(&self) {
        let result = self.inner.lock().check_counters();
        or_fatal(result)
    }

    /// Log one allocation.
    ///
    /// Requires debugging; otherwise warns and returns `None`.
    pub fn dump_allocation(&self, ptr: PoolPtr) -> Option<AllocationInfo> {
        let result = {
            let state = self.inner.lock();
            if !state.debugging_enabled {
                None
            } else {
                Some(state.dump_lines(ptr))
            }
        };

        let Some(result) = result else {
            diagnostics::emit_with_context(&SP010, "dump_allocation");
            return None;
        };
        let (info, trace) = or_fatal(result);
        log::info!("[slotpool] {}", info);
        if let Some(trace) = trace {
            log::info!("[slotpool] allocated from:\n{}", trace);
        }
        Some(info)
    }

    /// Log every live allocation followed by per-category totals.
    ///
    /// Requires debugging; otherwise warns and returns `None`.
    pub fn dump_all(&self) -> Option<PoolStats> {
        if !self.is_debugging_enabled() {
            diagnostics::emit_with_context(&SP010, "dump_all");
            return None;
        }

        for category in PoolCategory::ALL {
            for info in self.walk_category(category) {
                log::info!("[slotpool] {}", info);
            }
        }

        let stats = self.stats();
        log::info!("[slotpool] {}", stats);
        Some(stats)
    }

    /// Overwrite one raw byte relative to the start of a payload.
    ///
    /// Offset `-1` is the last head guard byte and offset `payload_len` the
    /// first tail guard byte. Guards are not checked. Returns `false` if
    /// `ptr` is stale or the offset falls outside the allocation's block.
    #[doc(hidden)]
    pub fn debug_poke(&self, ptr: PoolPtr, offset: isize, byte: u8) -> bool {
        let mut state = self.inner.lock();
        let Some(record) = state
            .slots
            .get_mut(ptr.index as usize)
            .filter(|s| s.generation == ptr.generation)
            .and_then(|s| s.record.as_mut())
        else {
            return false;
        };

        let position = GUARD_SIZE as isize + offset;
        if position < 0 || position as usize >= record.block.len() {
            return false;
        }
        record.block[position as usize] = byte;
        true
    }

    /// Free every outstanding allocation and shut the allocator down.
    ///
    /// Each category that still held allocations is reported as a leak.
    /// Every pointer handed out before shutdown is stale afterwards.
    ///
    /// # Panics
    ///
    /// Fatal if a guard was overwritten or the counters fail to reconcile
    /// to zero.
    pub fn shutdown(&self) -> ShutdownReport {
        let (report, warn_on_leaks, result) = {
            let mut state = self.inner.lock();
            if !state.initialised {
                return ShutdownReport::default();
            }

            let report = ShutdownReport::from_stats(state.stats());
            let result = state.check_counters().and_then(|_| state.reclaim_all());
            state.initialised = false;
            state.debugging_enabled = false;
            (report, state.config.warn_on_leaks, result)
        };
        or_fatal(result);

        if warn_on_leaks {
            for category in report.leaking_categories() {
                let stats = report.per_category.category(category);
                diagnostics::emit_with_context(
                    &SP009,
                    &format!("{}: {} allocations, {} bytes", category, stats.allocations, stats.client_bytes),
                );
            }
        }

        log::debug!(
            "[slotpool] pooled allocator shut down ({} leaked allocations reclaimed)",
            report.leaked_allocations
        );
        report
    }
}

impl Default for PooledAllocator {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl fmt::Debug for PooledAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("PooledAllocator")
            .field("initialised", &state.initialised)
            .field("debugging_enabled", &state.debugging_enabled)
            .field("live_slots", &(state.slots.len() - state.free_slots.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debug_pool() -> PooledAllocator {
        PooledAllocator::new(PoolConfig::debug())
    }

    #[test]
    fn test_allocate_and_free_counters() {
        let pool = debug_pool();
        let a = pool.allocate(PoolCategory::Renderer, 100);
        let b = pool.allocate(PoolCategory::Renderer, 28);

        let stats = pool.category_stats(PoolCategory::Renderer);
        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.client_bytes, 128);
        assert_eq!(stats.total_bytes, 128 + 2 * (HEADER_SIZE + FOOTER_SIZE));

        pool.free(a);
        pool.free(b);
        let stats = pool.category_stats(PoolCategory::Renderer);
        assert!(stats.is_empty());
        assert_eq!(stats.total_bytes, 0);
        assert_eq!(stats.peak_bytes, 128 + 2 * (HEADER_SIZE + FOOTER_SIZE));
    }

    #[test]
    fn test_fresh_memory_is_poisoned_when_debugging() {
        let pool = debug_pool();
        let ptr = pool.allocate(PoolCategory::Scene, 16);
        assert!(pool.with_payload(ptr, poison::is_uninit_poison));

        let zeroed = pool.allocate_zeroed(PoolCategory::Scene, 4, 4);
        assert!(pool.with_payload(zeroed, |bytes| bytes.iter().all(|&b| b == 0)));

        let release = PooledAllocator::new(PoolConfig::release());
        let plain = release.allocate(PoolCategory::Scene, 16);
        assert!(!release.with_payload(plain, poison::is_uninit_poison));
    }

    #[test]
    fn test_reallocate_preserves_payload_and_moves_category() {
        let pool = debug_pool();
        let ptr = pool.allocate(PoolCategory::Input, 4);
        pool.with_payload_mut(ptr, |bytes| bytes.copy_from_slice(&[1, 2, 3, 4]));

        let grown = pool.reallocate(PoolCategory::Commands, ptr, 8);
        assert_eq!(grown, ptr);
        pool.with_payload(grown, |bytes| {
            assert_eq!(bytes[..4], [1, 2, 3, 4]);
            assert!(poison::is_uninit_poison(&bytes[4..]));
        });
        assert!(pool.category_stats(PoolCategory::Input).is_empty());
        assert_eq!(pool.category_stats(PoolCategory::Commands).client_bytes, 8);

        let shrunk = pool.reallocate(PoolCategory::Commands, grown, 2);
        assert_eq!(pool.with_payload(shrunk, |bytes| bytes.to_vec()), vec![1, 2]);
        pool.check_counters();
    }

    #[test]
    fn test_reallocate_null_allocates() {
        let pool = debug_pool();
        let ptr = pool.reallocate(PoolCategory::Hooks, PoolPtr::null(), 12);
        assert!(!ptr.is_null());
        assert_eq!(pool.payload_len(ptr), 12);
    }

    #[test]
    fn test_walk_is_list_order() {
        let pool = debug_pool();
        let a = pool.allocate(PoolCategory::Ui, 1);
        let b = pool.allocate(PoolCategory::Ui, 2);
        let c = pool.allocate(PoolCategory::Ui, 3);

        pool.free(b);
        let d = pool.allocate(PoolCategory::Ui, 4);
        assert_eq!(d.raw_index(), b.raw_index());
        assert_ne!(d, b);

        let order: Vec<_> = pool.walk_category(PoolCategory::Ui).iter().map(|i| i.ptr).collect();
        assert_eq!(order, vec![a, c, d]);
    }

    #[test]
    fn test_counters_reconcile_after_mixed_operations() {
        let pool = debug_pool();
        let mut live = Vec::new();

        for round in 0..50usize {
            let category = PoolCategory::ALL[round % PoolCategory::COUNT];
            live.push(pool.allocate(category, round + 1));
            if round % 3 == 0 {
                let ptr = live.remove(round % live.len());
                pool.free(ptr);
            }
            if round % 5 == 0 && !live.is_empty() {
                let ptr = live[0];
                live[0] = pool.reallocate(PoolCategory::Utilities, ptr, round + 7);
            }
            pool.check_counters();
        }

        let walked: usize = PoolCategory::ALL
            .iter()
            .flat_map(|c| pool.walk_category(*c))
            .map(|info| info.size)
            .sum();
        assert_eq!(walked, pool.stats().total_client_bytes());
    }

    #[test]
    fn test_allocation_site_is_caller() {
        let pool = debug_pool();
        let ptr = pool.allocate(PoolCategory::Filesystem, 8);
        let info = pool.allocation_info(ptr).unwrap();
        assert!(info.site.file.ends_with("pool.rs"));
        assert_eq!(info.category, PoolCategory::Filesystem);

        pool.free(ptr);
        assert!(pool.allocation_info(ptr).is_none());
    }

    #[test]
    fn test_dump_requires_debugging() {
        let pool = PooledAllocator::new(PoolConfig::release());
        let ptr = pool.allocate(PoolCategory::Logging, 8);
        assert!(pool.dump_allocation(ptr).is_none());
        assert!(pool.dump_all().is_none());

        pool.set_debugging_enabled(true);
        assert_eq!(pool.dump_allocation(ptr).map(|i| i.size), Some(8));
        assert_eq!(pool.dump_all().map(|s| s.total_allocations()), Some(1));
    }

    #[test]
    fn test_shutdown_reclaims_and_reinit() {
        let pool = debug_pool();
        let leaked = pool.allocate(PoolCategory::TestManager, 32);
        pool.allocate(PoolCategory::TestManager, 8);

        let report = pool.shutdown();
        assert_eq!(report.leaked_allocations, 2);
        assert_eq!(report.leaked_client_bytes, 40);
        assert!(!pool.is_initialised());
        assert!(!pool.is_debugging_enabled());
        assert!(pool.stats().total_allocations() == 0);

        pool.init(PoolConfig::release());
        assert!(pool.allocation_info(leaked).is_none());
        assert!(!pool.free_if_live(leaked));
        assert!(!pool.shutdown().has_leaks());
    }

    #[test]
    fn test_debug_poke_bounds() {
        let pool = debug_pool();
        let ptr = pool.allocate(PoolCategory::Entity, 4);
        assert!(pool.debug_poke(ptr, 0, 9));
        assert!(!pool.debug_poke(ptr, -5, 0));
        assert!(!pool.debug_poke(ptr, 8, 0));
        assert_eq!(pool.with_payload(ptr, |bytes| bytes[0]), 9);
    }

    #[test]
    #[should_panic(expected = "SP001")]
    fn test_zero_size_is_fatal() {
        debug_pool().allocate(PoolCategory::Scene, 0);
    }

    #[test]
    #[should_panic(expected = "SP004")]
    fn test_head_guard_detected() {
        let pool = debug_pool();
        let ptr = pool.allocate(PoolCategory::Scene, 16);
        pool.debug_poke(ptr, -1, 0);
        pool.free(ptr);
    }

    #[test]
    #[should_panic(expected = "SP005")]
    fn test_tail_guard_detected() {
        let pool = debug_pool();
        let ptr = pool.allocate(PoolCategory::Scene, 16);
        pool.debug_poke(ptr, 16, 0);
        pool.with_payload(ptr, |_| ());
    }

    #[test]
    #[should_panic(expected = "SP006")]
    fn test_null_free_is_fatal() {
        debug_pool().free(PoolPtr::null());
    }

    #[test]
    #[should_panic(expected = "SP007")]
    fn test_double_free_is_fatal() {
        let pool = debug_pool();
        let ptr = pool.allocate(PoolCategory::Scene, 16);
        pool.free(ptr);
        pool.free(ptr);
    }

    #[test]
    #[should_panic(expected = "SP008")]
    fn test_uninitialised_is_fatal() {
        PooledAllocator::uninitialised().allocate(PoolCategory::Scene, 1);
    }

    #[test]
    #[should_panic(expected = "SP011")]
    fn test_zeroed_overflow_is_fatal() {
        debug_pool().allocate_zeroed(PoolCategory::Scene, usize::MAX, 2);
    }

    #[test]
    #[should_panic(expected = "SP002")]
    fn test_oversized_request_overflows_counters() {
        debug_pool().allocate(PoolCategory::Scene, usize::MAX);
    }

    #[test]
    #[should_panic(expected = "SP002")]
    fn test_allocation_count_overflow_is_fatal() {
        let pool = debug_pool();
        pool.inner.lock().pools[PoolCategory::Scene.index()].stats.allocations = usize::MAX;
        pool.allocate(PoolCategory::Scene, 8);
    }

    #[test]
    #[should_panic(expected = "SP003")]
    fn test_counter_underflow_on_free_is_fatal() {
        let pool = debug_pool();
        let ptr = pool.allocate(PoolCategory::Scene, 16);
        pool.inner.lock().pools[PoolCategory::Scene.index()].stats.client_bytes = 4;
        pool.free(ptr);
    }

    #[test]
    #[should_panic(expected = "SP901")]
    fn test_counter_mismatch_is_fatal() {
        let pool = debug_pool();
        pool.allocate(PoolCategory::Graphics, 16);
        pool.check_counters();

        pool.inner.lock().pools[PoolCategory::Graphics.index()].stats.client_bytes += 1;
        pool.check_counters();
    }

    #[test]
    fn test_reallocate_keeps_list_position() {
        let pool = debug_pool();
        let a = pool.allocate(PoolCategory::Ui, 4);
        let b = pool.allocate(PoolCategory::Ui, 4);

        pool.reallocate(PoolCategory::Ui, a, 32);
        let order: Vec<_> = pool.walk_category(PoolCategory::Ui).iter().map(|i| i.ptr).collect();
        assert_eq!(order, vec![a, b]);

        let c = pool.allocate(PoolCategory::Commands, 4);
        pool.reallocate(PoolCategory::Commands, a, 8);
        let order: Vec<_> = pool.walk_category(PoolCategory::Commands).iter().map(|i| i.ptr).collect();
        assert_eq!(order, vec![c, a]);
        pool.check_counters();
    }

    #[test]
    fn test_peak_resets_on_shutdown() {
        let pool = debug_pool();
        let ptr = pool.allocate(PoolCategory::Scene, 128);
        pool.free(ptr);
        assert!(pool.category_stats(PoolCategory::Scene).peak_bytes > 0);

        pool.shutdown();
        pool.init(PoolConfig::debug());
        assert_eq!(pool.category_stats(PoolCategory::Scene), CategoryStats::default());
    }
}
