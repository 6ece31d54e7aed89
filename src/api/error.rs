//! Recoverable resource list errors.

use thiserror::Error;

use crate::allocators::handles::ResourceHandle;

/// Errors returned by resource list operations.
///
/// Corruption and allocator misuse are not reported here; those are fatal.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceListError {
    /// An argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Every slot is occupied.
    #[error("no free space: all {capacity} slots are in use")]
    NoFreeSpace {
        /// Capacity of the list.
        capacity: u32,
    },

    /// The path is already registered. Carries the existing handle.
    #[error("path already existed as {0}")]
    PathAlreadyExisted(ResourceHandle),
}

impl ResourceListError {
    /// The already-registered handle, for `PathAlreadyExisted`.
    ///
    /// Callers treat this case as success with an existing instance.
    pub fn existing_handle(&self) -> Option<ResourceHandle> {
        match self {
            ResourceListError::PathAlreadyExisted(handle) => Some(*handle),
            _ => None,
        }
    }
}

/// Result type for resource list operations.
pub type ResourceListResult<T> = Result<T, ResourceListError>;
