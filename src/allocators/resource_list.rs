//! Bucketed generational slot table.
//!
//! A [`ResourceList`] holds up to `max_capacity` items of one type in
//! fixed-size buckets. Buckets are reserved from the pooled allocator on
//! first use and stay put until the list is dropped. Every occupied slot
//! carries a freshly minted key, and a handle resolves only while its key
//! still matches the slot.

use std::collections::HashMap;
use std::fmt;

use crate::allocators::deferred::DeferredDestroyQueue;
use crate::allocators::handles::{encode, is_valid_for_domain, mint_key, ResourceDomain, ResourceHandle};
use crate::allocators::pool::{PoolPtr, PooledAllocator};
use crate::api::category::PoolCategory;
use crate::api::config::ResourceListAttributes;
use crate::api::error::{ResourceListError, ResourceListResult};
use crate::api::stats::ResourceListStats;
use crate::diagnostics::{self, SP101, SP902};

type DeinitFn<T> = Box<dyn FnMut(&mut T) + Send>;

struct Slot<T> {
    key: u64,
    item: Option<T>,
    path: Option<Box<str>>,
}

impl<T> Slot<T> {
    fn empty() -> Self {
        Self {
            key: 0,
            item: None,
            path: None,
        }
    }

    fn is_occupied(&self) -> bool {
        self.item.is_some()
    }
}

/// One bucket of slots.
///
/// `reservation` charges the bucket's slot storage to the ResourceManagement
/// category. It is accounting only: the slots themselves live in `slots` and
/// the reserved bytes are never read or written.
struct Bucket<T> {
    reservation: PoolPtr,
    slots: Box<[Slot<T>]>,
    is_full: bool,
    is_not_empty: bool,
}

impl<T> Bucket<T> {
    fn new(pool: &PooledAllocator, items_per_bucket: u32) -> Self {
        let reservation = pool.allocate_zeroed(
            PoolCategory::ResourceManagement,
            items_per_bucket as usize,
            std::mem::size_of::<Slot<T>>(),
        );

        Self {
            reservation,
            slots: (0..items_per_bucket).map(|_| Slot::empty()).collect(),
            is_full: false,
            is_not_empty: false,
        }
    }

    fn update_flags(&mut self) {
        self.is_full = self.slots.iter().all(Slot::is_occupied);
        self.is_not_empty = self.slots.iter().any(Slot::is_occupied);
    }
}

/// A fixed-capacity table of `T` addressed by generational handles.
///
/// # Example
///
/// ```rust
/// use slotpool::{PoolConfig, PooledAllocator, ResourceDomain, ResourceList, ResourceListAttributes};
///
/// let pool = PooledAllocator::new(PoolConfig::default());
/// let atts = ResourceListAttributes::new(ResourceDomain::Texture, 8, 4);
/// let mut textures: ResourceList<u32> = ResourceList::new(&pool, atts).unwrap();
///
/// let handle = textures.create().unwrap();
/// *textures.get_mut(handle).unwrap() = 512;
/// assert!(textures.destroy(handle));
/// assert!(textures.get(handle).is_none());
/// ```
pub struct ResourceList<T> {
    pool: PooledAllocator,
    domain: ResourceDomain,
    capacity: u32,
    items_per_bucket: u32,
    buckets: Vec<Option<Bucket<T>>>,
    total: u32,
    paths: HashMap<Box<str>, ResourceHandle>,
    deinit: Option<DeinitFn<T>>,
    deferred: DeferredDestroyQueue,
}

impl<T> ResourceList<T> {
    /// Create an empty list.
    ///
    /// Capacity is truncated to a whole number of buckets, with a warning.
    pub fn new(pool: &PooledAllocator, attributes: ResourceListAttributes) -> ResourceListResult<Self> {
        let ResourceListAttributes {
            domain,
            max_capacity,
            items_per_bucket,
        } = attributes;

        if max_capacity == 0 {
            return Err(ResourceListError::InvalidArgument("capacity must be greater than zero"));
        }
        if items_per_bucket == 0 {
            return Err(ResourceListError::InvalidArgument(
                "items per bucket must be greater than zero",
            ));
        }
        if items_per_bucket > max_capacity {
            return Err(ResourceListError::InvalidArgument(
                "capacity must not be smaller than items per bucket",
            ));
        }

        let remainder = max_capacity % items_per_bucket;
        let capacity = max_capacity - remainder;
        if remainder > 0 {
            diagnostics::emit_with_context(
                &SP101,
                &format!(
                    "{} list: {} items per bucket left a remainder of {} from {}; capacity is now {}",
                    domain, items_per_bucket, remainder, max_capacity, capacity
                ),
            );
        }

        let bucket_count = (capacity / items_per_bucket) as usize;
        Ok(Self {
            pool: pool.clone(),
            domain,
            capacity,
            items_per_bucket,
            buckets: (0..bucket_count).map(|_| None).collect(),
            total: 0,
            paths: HashMap::new(),
            deinit: None,
            deferred: DeferredDestroyQueue::new(),
        })
    }

    /// Builder pattern: run `deinit` on every item before it is dropped.
    pub fn with_deinit(mut self, deinit: impl FnMut(&mut T) + Send + 'static) -> Self {
        self.deinit = Some(Box::new(deinit));
        self
    }

    /// Domain stamped into this list's handles.
    pub fn domain(&self) -> ResourceDomain {
        self.domain
    }

    /// Maximum number of live items.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Slots per bucket.
    pub fn items_per_bucket(&self) -> u32 {
        self.items_per_bucket
    }

    /// Number of live items.
    pub fn len(&self) -> u32 {
        self.total
    }

    /// Check if the list holds no items.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Check if every slot is occupied.
    pub fn is_full(&self) -> bool {
        self.total >= self.capacity
    }

    /// Buckets currently backed by pooled memory.
    pub fn allocated_buckets(&self) -> u32 {
        self.buckets.iter().filter(|b| b.is_some()).count() as u32
    }

    /// Occupancy snapshot.
    pub fn stats(&self) -> ResourceListStats {
        ResourceListStats {
            items: self.total,
            capacity: self.capacity,
            allocated_buckets: self.allocated_buckets(),
            bucket_count: self.buckets.len() as u32,
            pending_destroys: self.deferred.len(),
        }
    }

    fn split(&self, index: u32) -> (usize, usize) {
        (
            (index / self.items_per_bucket) as usize,
            (index % self.items_per_bucket) as usize,
        )
    }

    fn slot_at(&self, index: u32) -> Option<&Slot<T>> {
        let (bucket, slot) = self.split(index);
        self.buckets.get(bucket)?.as_ref()?.slots.get(slot)
    }

    /// Resolve a handle to its bucket and slot, checking domain, range,
    /// occupancy and key.
    fn locate(&self, handle: ResourceHandle) -> Option<(usize, usize)> {
        if !is_valid_for_domain(handle, self.domain, self.capacity) {
            return None;
        }

        let slot = self.slot_at(handle.index())?;
        if slot.is_occupied() && slot.key == handle.key() {
            Some(self.split(handle.index()))
        } else {
            None
        }
    }

    fn slot_mut(&mut self, (bucket, slot): (usize, usize)) -> Option<&mut Slot<T>> {
        self.buckets.get_mut(bucket)?.as_mut()?.slots.get_mut(slot)
    }

    /// Check if `handle` names a live item of this list.
    pub fn contains(&self, handle: ResourceHandle) -> bool {
        self.locate(handle).is_some()
    }

    /// Borrow the item `handle` names.
    ///
    /// Stale, forged or foreign handles resolve to `None`.
    pub fn get(&self, handle: ResourceHandle) -> Option<&T> {
        self.locate(handle)?;
        self.slot_at(handle.index())?.item.as_ref()
    }

    /// Mutably borrow the item `handle` names.
    pub fn get_mut(&mut self, handle: ResourceHandle) -> Option<&mut T> {
        let position = self.locate(handle)?;
        self.slot_mut(position)?.item.as_mut()
    }

    /// Path the item was created with, if it was created keyed.
    pub fn item_path(&self, handle: ResourceHandle) -> Option<&str> {
        self.locate(handle)?;
        self.slot_at(handle.index())?.path.as_deref()
    }

    /// Handle registered for `path`, if any.
    pub fn find_by_path(&self, path: &str) -> Option<ResourceHandle> {
        self.paths.get(path).copied()
    }

    /// Destroy the item `handle` names.
    ///
    /// Runs the deinit callback, frees the slot and forgets its path.
    /// Returns `false` without side effects for a handle that does not
    /// resolve.
    pub fn destroy(&mut self, handle: ResourceHandle) -> bool {
        let Some((bucket_index, slot_index)) = self.locate(handle) else {
            return false;
        };
        let Some(bucket) = self.buckets[bucket_index].as_mut() else {
            return false;
        };

        let slot = &mut bucket.slots[slot_index];
        if let Some(path) = slot.path.take() {
            self.paths.remove(&*path);
        }
        if let Some(mut item) = slot.item.take() {
            if let Some(deinit) = self.deinit.as_mut() {
                deinit(&mut item);
            }
        }
        slot.key = 0;

        bucket.update_flags();
        self.total -= 1;
        log::trace!("[slotpool] destroyed {}", handle);
        true
    }

    /// Destroy every item.
    pub fn clear(&mut self) {
        let handles: Vec<_> = self.iter().map(|(handle, _)| handle).collect();
        for handle in handles {
            self.destroy(handle);
        }
    }

    /// Queue `handle` for destruction on the next
    /// [`flush_deferred`](Self::flush_deferred).
    ///
    /// Only needs a shared borrow, so it can be called while iterating.
    pub fn defer_destroy(&self, handle: ResourceHandle) {
        self.deferred.push(handle);
    }

    /// Destroy every queued handle. Returns how many were destroyed.
    ///
    /// Handles that went stale while queued are skipped.
    pub fn flush_deferred(&mut self) -> usize {
        let queue = std::mem::take(&mut self.deferred);
        let destroyed = queue.drain(|handle| self.destroy(handle));
        self.deferred = queue;
        destroyed
    }

    /// Cursor at the first occupied slot.
    pub fn cursor(&self) -> Cursor<'_, T> {
        Cursor {
            list: self,
            index: self.next_occupied(0),
        }
    }

    /// Iterate live items in index order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            cursor: self.cursor(),
        }
    }

    /// First occupied index at or after `from`, or `capacity` if none.
    ///
    /// Buckets that were never allocated or hold nothing are skipped whole.
    fn next_occupied(&self, from: u32) -> u32 {
        let mut index = from;
        while index < self.capacity {
            let (bucket_index, slot_index) = self.split(index);
            match &self.buckets[bucket_index] {
                Some(bucket) if bucket.is_not_empty => {
                    if bucket.slots[slot_index].is_occupied() {
                        return index;
                    }
                    index += 1;
                }
                _ => index = (bucket_index as u32 + 1) * self.items_per_bucket,
            }
        }
        self.capacity
    }
}

impl<T: Default> ResourceList<T> {
    /// Create a new item holding `T::default()`.
    pub fn create(&mut self) -> ResourceListResult<ResourceHandle> {
        self.create_item(None)
    }

    /// Create a new item registered under `path`.
    ///
    /// If `path` is already registered, nothing is created and the error
    /// carries the existing handle.
    pub fn create_keyed(&mut self, path: &str) -> ResourceListResult<ResourceHandle> {
        if path.is_empty() {
            return Err(ResourceListError::InvalidArgument("path must not be empty"));
        }
        if let Some(existing) = self.find_by_path(path) {
            return Err(ResourceListError::PathAlreadyExisted(existing));
        }
        self.create_item(Some(path))
    }

    fn create_item(&mut self, path: Option<&str>) -> ResourceListResult<ResourceHandle> {
        if self.total >= self.capacity {
            return Err(ResourceListError::NoFreeSpace {
                capacity: self.capacity,
            });
        }

        let Some(bucket_index) = self
            .buckets
            .iter()
            .position(|b| b.as_ref().map_or(true, |b| !b.is_full))
        else {
            diagnostics::fatal(
                &SP902,
                &format!("{} list: {}/{} items but no bucket has room", self.domain, self.total, self.capacity),
            );
        };

        let items_per_bucket = self.items_per_bucket;
        let pool = &self.pool;
        let bucket = self.buckets[bucket_index].get_or_insert_with(|| Bucket::new(pool, items_per_bucket));

        let Some(slot_index) = bucket.slots.iter().position(|s| !s.is_occupied()) else {
            diagnostics::fatal(
                &SP902,
                &format!("{} list: bucket {} is not full but has no free slot", self.domain, bucket_index),
            );
        };

        let index = bucket_index as u32 * items_per_bucket + slot_index as u32;
        let key = mint_key(index);
        let handle = encode(self.domain, index, key);

        let slot = &mut bucket.slots[slot_index];
        slot.key = key;
        slot.item = Some(T::default());
        slot.path = path.map(Box::from);
        bucket.update_flags();

        if let Some(path) = path {
            self.paths.insert(Box::from(path), handle);
        }
        self.total += 1;
        log::trace!("[slotpool] created {}", handle);
        Ok(handle)
    }
}

impl<T> Drop for ResourceList<T> {
    fn drop(&mut self) {
        for bucket in self.buckets.iter_mut().filter_map(Option::as_mut) {
            if let Some(deinit) = self.deinit.as_mut() {
                for item in bucket.slots.iter_mut().filter_map(|s| s.item.as_mut()) {
                    deinit(item);
                }
            }
            self.pool.free_if_live(bucket.reservation);
        }
    }
}

impl<T> fmt::Debug for ResourceList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceList")
            .field("domain", &self.domain)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A position within a [`ResourceList`].
///
/// Borrows the list, so the list cannot change while a cursor is alive.
pub struct Cursor<'a, T> {
    list: &'a ResourceList<T>,
    index: u32,
}

impl<'a, T> Clone for Cursor<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for Cursor<'a, T> {}

impl<'a, T> Cursor<'a, T> {
    fn slot(&self) -> Option<&'a Slot<T>> {
        if self.index >= self.list.capacity {
            return None;
        }
        self.list.slot_at(self.index).filter(|s| s.is_occupied())
    }

    /// Check if the cursor points at a live item.
    pub fn is_valid(&self) -> bool {
        self.slot().is_some()
    }

    /// Move to the next live item.
    pub fn advance(&mut self) {
        if self.index < self.list.capacity {
            self.index = self.list.next_occupied(self.index + 1);
        }
    }

    /// The item under the cursor.
    pub fn item(&self) -> Option<&'a T> {
        self.slot()?.item.as_ref()
    }

    /// The path of the item under the cursor, if keyed.
    pub fn path(&self) -> Option<&'a str> {
        self.slot()?.path.as_deref()
    }

    /// A handle to the item under the cursor.
    pub fn handle(&self) -> Option<ResourceHandle> {
        let slot = self.slot()?;
        Some(encode(self.list.domain, self.index, slot.key))
    }
}

/// Iterator over `(handle, item)` pairs of a [`ResourceList`].
pub struct Iter<'a, T> {
    cursor: Cursor<'a, T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (ResourceHandle, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor.handle()?;
        let item = self.cursor.item()?;
        self.cursor.advance();
        Some((handle, item))
    }
}

impl<'a, T> IntoIterator for &'a ResourceList<T> {
    type Item = (ResourceHandle, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
