//! Integration tests for slotpool.

use std::thread;

use slotpool::{
    decode_domain, encode, is_valid_for_domain, load_keyed, EntityTable, PoolCategory, PoolConfig,
    PoolPtr, PooledAllocator, ResourceDomain, ResourceHandle, ResourceList,
    ResourceListAttributes, ResourceListError,
};

fn texture_list(pool: &PooledAllocator, capacity: u32, per_bucket: u32) -> ResourceList<u64> {
    let atts = ResourceListAttributes::new(ResourceDomain::Texture, capacity, per_bucket);
    ResourceList::new(pool, atts).unwrap()
}

#[test]
fn test_capacity_and_generational_reuse() {
    let pool = PooledAllocator::new(PoolConfig::debug());
    let mut list = texture_list(&pool, 8, 4);

    let handles: Vec<ResourceHandle> = (0..8).map(|_| list.create().unwrap()).collect();
    assert_eq!(list.create(), Err(ResourceListError::NoFreeSpace { capacity: 8 }));
    assert_eq!(list.len(), 8);

    let third = handles[2];
    assert!(list.destroy(third));
    assert!(list.get(third).is_none());
    assert_eq!(list.len(), 7);

    let replacement = list.create().unwrap();
    assert_eq!(replacement.index(), 2);
    assert_ne!(replacement.key(), third.key());
    assert!(list.get(third).is_none());
    assert!(list.get(replacement).is_some());
}

#[test]
fn test_keyed_create_twice_returns_existing() {
    let pool = PooledAllocator::new(PoolConfig::debug());
    let mut list = texture_list(&pool, 8, 4);

    let first = list.create_keyed("foo.png").unwrap();
    let second = list.create_keyed("foo.png");

    assert_eq!(second, Err(ResourceListError::PathAlreadyExisted(first)));
    assert_eq!(second.unwrap_err().existing_handle(), Some(first));
    assert_eq!(list.len(), 1);
}

#[test]
fn test_handle_round_trip_over_domains() {
    let domains = [
        ResourceDomain::Entity,
        ResourceDomain::RenderablePrimitive,
        ResourceDomain::Texture,
        ResourceDomain::PixelWorld,
    ];

    for domain in domains {
        for index in [0u32, 1, 63, 64, u32::MAX - 1] {
            let handle = encode(domain, index, 0xABCD);
            assert_eq!(decode_domain(handle), Some(domain));
            assert_eq!(is_valid_for_domain(handle, domain, 64), index < 64);
            assert_eq!(ResourceHandle::from_bits(handle.to_bits()), handle);
        }
    }
}

#[test]
fn test_handles_never_null() {
    let pool = PooledAllocator::new(PoolConfig::release());
    let mut list = texture_list(&pool, 16, 4);

    for _ in 0..200 {
        let handle = list.create().unwrap();
        assert!(!handle.is_null());
        assert_ne!(handle.key(), 0);
        list.destroy(handle);
    }
}

#[test]
fn test_counters_reconcile_with_lists_in_use() {
    let pool = PooledAllocator::new(PoolConfig::debug());
    let mut textures = texture_list(&pool, 64, 8);
    let mut entities: EntityTable<[f32; 3]> = EntityTable::new(&pool, 16).unwrap();
    let mut scratch = Vec::new();

    for round in 0..40usize {
        textures.create().unwrap();
        entities.acquire().ok();
        scratch.push(pool.allocate(PoolCategory::Scene, round * 3 + 1));

        if round % 4 == 0 {
            let ptr = scratch.swap_remove(0);
            pool.free(ptr);
        }
        if round % 7 == 0 && !scratch.is_empty() {
            let last = scratch.len() - 1;
            scratch[last] = pool.reallocate(PoolCategory::Renderer, scratch[last], round + 64);
        }
        pool.check_counters();
    }

    let stats = pool.stats();
    for category in PoolCategory::ALL {
        let walked: usize = pool.walk_category(category).iter().map(|info| info.size).sum();
        assert_eq!(walked, stats.category(category).client_bytes);
    }

    drop(textures);
    drop(entities);
    for ptr in scratch {
        pool.free(ptr);
    }
    assert!(!pool.shutdown().has_leaks());
}

#[test]
fn test_shutdown_reports_leaks() {
    let pool = PooledAllocator::new(PoolConfig::debug());
    let leaked = pool.allocate(PoolCategory::Ui, 48);
    pool.allocate(PoolCategory::Input, 16);

    let report = pool.shutdown();
    assert_eq!(report.leaked_allocations, 2);
    assert_eq!(report.leaked_client_bytes, 64);
    assert_eq!(
        report.leaking_categories().collect::<Vec<_>>(),
        vec![PoolCategory::Ui, PoolCategory::Input]
    );
    assert_eq!(pool.stats().total_bytes(), 0);

    pool.init(PoolConfig::debug());
    assert!(pool.allocation_info(leaked).is_none());
}

#[test]
fn test_loader_uses_list() {
    let pool = PooledAllocator::new(PoolConfig::debug());
    let atts = ResourceListAttributes::new(ResourceDomain::PixelWorld, 4, 2);
    let mut worlds: ResourceList<Vec<u8>> = ResourceList::new(&pool, atts).unwrap();

    let world = load_keyed(&mut worlds, "pixel world", "worlds/cave.bin", |_, pixels| {
        pixels.resize(16, 0);
        true
    });
    assert_eq!(worlds.get(world).map(Vec::len), Some(16));
    assert_eq!(worlds.item_path(world), Some("worlds/cave.bin"));

    let broken = load_keyed(&mut worlds, "pixel world", "worlds/broken.bin", |_, _| false);
    assert!(broken.is_null());
    assert_eq!(worlds.len(), 1);
}

#[test]
fn test_shared_allocator_across_threads() {
    let pool = PooledAllocator::new(PoolConfig::release());

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || {
                let ptrs: Vec<PoolPtr> = (1..=25).map(|size| pool.allocate(PoolCategory::Filesystem, size)).collect();
                for ptr in ptrs {
                    pool.free(ptr);
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert!(pool.category_stats(PoolCategory::Filesystem).is_empty());
    pool.check_counters();
}

#[test]
#[should_panic(expected = "SP005")]
fn test_overrun_detected_on_free() {
    let pool = PooledAllocator::new(PoolConfig::debug());
    let ptr = pool.allocate(PoolCategory::Graphics, 32);
    let len = pool.payload_len(ptr) as isize;
    pool.debug_poke(ptr, len, 0xFF);
    pool.free(ptr);
}

#[test]
#[should_panic(expected = "SP004")]
fn test_underrun_detected_on_reallocate() {
    let pool = PooledAllocator::new(PoolConfig::debug());
    let ptr = pool.allocate(PoolCategory::Graphics, 32);
    pool.debug_poke(ptr, -1, 0x00);
    pool.reallocate(PoolCategory::Graphics, ptr, 64);
}

#[test]
#[should_panic(expected = "SP007")]
fn test_pointer_stale_after_shutdown() {
    let pool = PooledAllocator::new(PoolConfig::debug());
    let ptr = pool.allocate(PoolCategory::Hooks, 8);
    pool.shutdown();
    pool.init(PoolConfig::debug());
    pool.free(ptr);
}
