//! Fixed-array entity table.
//!
//! Uses the same handle scheme as [`ResourceList`](crate::ResourceList) but
//! keeps every slot in one up-front array. Each slot always holds a key:
//! keys are minted when the table is built and minted again on release, so
//! a released handle goes stale immediately.

use std::fmt;

use crate::allocators::handles::{encode, is_valid_for_domain, mint_key, ResourceDomain, ResourceHandle};
use crate::allocators::pool::{PoolPtr, PooledAllocator};
use crate::api::category::PoolCategory;
use crate::api::error::{ResourceListError, ResourceListResult};

struct EntitySlot<T> {
    key: u64,
    item: Option<T>,
}

/// A fixed-capacity table of entities.
pub struct EntityTable<T> {
    pool: PooledAllocator,
    // Charges the slot storage to the Entity category; never read or written.
    reservation: PoolPtr,
    slots: Box<[EntitySlot<T>]>,
    in_use: u32,
}

impl<T> EntityTable<T> {
    /// Create a table with `capacity` slots, charged to the Entity category.
    pub fn new(pool: &PooledAllocator, capacity: u32) -> ResourceListResult<Self> {
        if capacity == 0 {
            return Err(ResourceListError::InvalidArgument("capacity must be greater than zero"));
        }

        let reservation = pool.allocate_zeroed(
            PoolCategory::Entity,
            capacity as usize,
            std::mem::size_of::<EntitySlot<T>>(),
        );
        let slots = (0..capacity)
            .map(|index| EntitySlot {
                key: mint_key(index),
                item: None,
            })
            .collect();

        Ok(Self {
            pool: pool.clone(),
            reservation,
            slots,
            in_use: 0,
        })
    }

    /// Number of slots.
    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Number of acquired slots.
    pub fn len(&self) -> u32 {
        self.in_use
    }

    /// Check if no slot is acquired.
    pub fn is_empty(&self) -> bool {
        self.in_use == 0
    }

    /// Number of slots available to [`acquire`](Self::acquire).
    pub fn free_slots(&self) -> u32 {
        self.capacity() - self.in_use
    }

    fn locate(&self, handle: ResourceHandle) -> Option<usize> {
        if !is_valid_for_domain(handle, ResourceDomain::Entity, self.capacity()) {
            return None;
        }

        let index = handle.index() as usize;
        let slot = &self.slots[index];
        (slot.item.is_some() && slot.key == handle.key()).then_some(index)
    }

    /// Borrow the entity `handle` names.
    pub fn get(&self, handle: ResourceHandle) -> Option<&T> {
        let index = self.locate(handle)?;
        self.slots[index].item.as_ref()
    }

    /// Mutably borrow the entity `handle` names.
    pub fn get_mut(&mut self, handle: ResourceHandle) -> Option<&mut T> {
        let index = self.locate(handle)?;
        self.slots[index].item.as_mut()
    }

    /// Release the entity `handle` names, invalidating every handle to it.
    pub fn release(&mut self, handle: ResourceHandle) -> bool {
        let Some(index) = self.locate(handle) else {
            return false;
        };

        let slot = &mut self.slots[index];
        slot.item = None;
        slot.key = mint_key(index as u32);
        self.in_use -= 1;
        true
    }

    /// Iterate acquired entities in index order.
    pub fn iter(&self) -> impl Iterator<Item = (ResourceHandle, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let item = slot.item.as_ref()?;
            Some((encode(ResourceDomain::Entity, index as u32, slot.key), item))
        })
    }
}

impl<T: Default> EntityTable<T> {
    /// Acquire the first free slot, holding `T::default()`.
    pub fn acquire(&mut self) -> ResourceListResult<ResourceHandle> {
        let capacity = self.capacity();
        let Some((index, slot)) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.item.is_none())
        else {
            return Err(ResourceListError::NoFreeSpace { capacity });
        };

        slot.item = Some(T::default());
        self.in_use += 1;
        Ok(encode(ResourceDomain::Entity, index as u32, slot.key))
    }
}

impl<T> Drop for EntityTable<T> {
    fn drop(&mut self) {
        self.pool.free_if_live(self.reservation);
    }
}

impl<T> fmt::Debug for EntityTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityTable")
            .field("capacity", &self.capacity())
            .field("in_use", &self.in_use)
            .finish()
    }
}
