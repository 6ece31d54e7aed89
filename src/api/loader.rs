//! Keyed resource loading.

use crate::allocators::handles::ResourceHandle;
use crate::allocators::resource_list::ResourceList;
use crate::api::error::ResourceListError;
use crate::diagnostics::{self, SP102, SP103, SP104};

/// Create (or find) the item for `rel_path` and run `loader` on it.
///
/// The path is trimmed first. If it is already loaded the existing handle is
/// returned and `loader` is not run. If the list is full, or `loader`
/// returns `false`, a warning is logged and the null handle is returned; a
/// failed item is destroyed again before returning.
///
/// `item_type` names the kind of resource in log output, e.g. `"texture"`.
///
/// ```rust
/// use slotpool::{load_keyed, PoolConfig, PooledAllocator, ResourceDomain, ResourceList, ResourceListAttributes};
///
/// let pool = PooledAllocator::new(PoolConfig::default());
/// let atts = ResourceListAttributes::new(ResourceDomain::Texture, 4, 4);
/// let mut textures: ResourceList<Vec<u8>> = ResourceList::new(&pool, atts).unwrap();
///
/// let handle = load_keyed(&mut textures, "texture", " wall.png ", |path, bytes| {
///     bytes.extend_from_slice(path.as_bytes());
///     true
/// });
/// assert_eq!(textures.item_path(handle), Some("wall.png"));
/// ```
pub fn load_keyed<T: Default>(
    list: &mut ResourceList<T>,
    item_type: &str,
    rel_path: &str,
    loader: impl FnOnce(&str, &mut T) -> bool,
) -> ResourceHandle {
    let path = rel_path.trim();
    if path.is_empty() {
        diagnostics::emit_with_context(&SP104, &format!("cannot load {} from {:?}", item_type, rel_path));
        return ResourceHandle::NULL;
    }

    let handle = match list.create_keyed(path) {
        Ok(handle) => handle,
        Err(ResourceListError::PathAlreadyExisted(existing)) => return existing,
        Err(ResourceListError::NoFreeSpace { capacity }) => {
            diagnostics::emit_with_context(
                &SP102,
                &format!(
                    "cannot load {} {}: reached maximum of {} instances",
                    item_type, path, capacity
                ),
            );
            return ResourceHandle::NULL;
        }
        Err(err) => {
            log::error!("[slotpool] failed to create {} {}: {}", item_type, path, err);
            return ResourceHandle::NULL;
        }
    };

    let loaded = match list.get_mut(handle) {
        Some(item) => loader(path, item),
        None => false,
    };

    if !loaded {
        diagnostics::emit_with_context(&SP103, &format!("failed to load {} {}", item_type, path));
        list.destroy(handle);
        return ResourceHandle::NULL;
    }

    log::debug!("[slotpool] loaded {} {} as {}", item_type, path, handle);
    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocators::handles::ResourceDomain;
    use crate::allocators::pool::PooledAllocator;
    use crate::api::config::{PoolConfig, ResourceListAttributes};

    fn textures(capacity: u32) -> (PooledAllocator, ResourceList<String>) {
        let pool = PooledAllocator::new(PoolConfig::debug());
        let atts = ResourceListAttributes::new(ResourceDomain::Texture, capacity, 1);
        let list = ResourceList::new(&pool, atts).unwrap();
        (pool, list)
    }

    #[test]
    fn test_load_trims_and_dedupes() {
        let (_pool, mut list) = textures(2);
        let mut loads = 0;

        let first = load_keyed(&mut list, "texture", "  a.png\n", |path, item| {
            loads += 1;
            item.push_str(path);
            true
        });
        let second = load_keyed(&mut list, "texture", "a.png", |_, _| {
            loads += 1;
            true
        });

        assert_eq!(first, second);
        assert_eq!(loads, 1);
        assert_eq!(list.get(first).map(String::as_str), Some("a.png"));
    }

    #[test]
    fn test_failed_load_releases_slot() {
        let (_pool, mut list) = textures(2);
        let handle = load_keyed(&mut list, "texture", "missing.png", |_, _| false);
        assert!(handle.is_null());
        assert!(list.is_empty());
        assert_eq!(list.find_by_path("missing.png"), None);
    }

    #[test]
    fn test_full_list_and_empty_path() {
        let (_pool, mut list) = textures(1);
        assert!(!load_keyed(&mut list, "texture", "a.png", |_, _| true).is_null());
        assert!(load_keyed(&mut list, "texture", "b.png", |_, _| true).is_null());
        assert!(load_keyed(&mut list, "texture", "   ", |_, _| true).is_null());
        assert_eq!(list.len(), 1);
    }
}
