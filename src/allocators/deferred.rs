//! Deferred destroy queue for resource lists.
//!
//! Destroying a slot needs `&mut` access to its list, which a caller walking
//! the list does not have. Handles are queued through a shared reference
//! instead and destroyed on the next flush.

use crossbeam_queue::SegQueue;

use crate::allocators::handles::ResourceHandle;

/// Lock-free queue of handles awaiting destruction.
pub struct DeferredDestroyQueue {
    queue: SegQueue<ResourceHandle>,
}

impl DeferredDestroyQueue {
    /// Create a new deferred destroy queue.
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
        }
    }

    /// Queue a handle for destruction.
    pub fn push(&self, handle: ResourceHandle) {
        self.queue.push(handle);
    }

    /// Pop every queued handle, oldest first, into `destroy`.
    ///
    /// Returns how many calls to `destroy` reported success.
    pub fn drain(&self, mut destroy: impl FnMut(ResourceHandle) -> bool) -> usize {
        let mut destroyed = 0;
        while let Some(handle) = self.queue.pop() {
            if destroy(handle) {
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Check if there are pending destroys.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Get approximate number of pending destroys.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

impl Default for DeferredDestroyQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DeferredDestroyQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredDestroyQueue")
            .field("pending", &self.len())
            .finish()
    }
}
