//! Generational resource handles.
//!
//! A [`ResourceHandle`] packs a domain tag, a slot index and a generation key
//! into an opaque 128-bit value. The codec here only knows how to build and
//! decode handles; whether a handle still names a live slot is decided by
//! the list that issued it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::diagnostics::{self, SP201};

/// High bit of the raw domain, set on every engine-owned handle.
pub const INTERNAL_DOMAIN_FLAG: u32 = 1 << 31;

/// Mask selecting the domain value from the raw domain.
pub const DOMAIN_MASK: u32 = !INTERNAL_DOMAIN_FLAG;

const KEY_MIX: u64 = 0x1234_BA55_FACE_5678;

/// The resource family a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ResourceDomain {
    /// Scene entities.
    Entity = 1,
    /// Renderable primitives.
    RenderablePrimitive = 2,
    /// Loaded textures.
    Texture = 3,
    /// Pixel worlds.
    PixelWorld = 4,
}

impl ResourceDomain {
    /// Number of raw domain values, including the invalid value zero.
    pub const COUNT: u32 = 5;

    /// Look up a domain by its raw value.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(ResourceDomain::Entity),
            2 => Some(ResourceDomain::RenderablePrimitive),
            3 => Some(ResourceDomain::Texture),
            4 => Some(ResourceDomain::PixelWorld),
            _ => None,
        }
    }

    /// Raw domain value, without the internal flag.
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            ResourceDomain::Entity => "Entity",
            ResourceDomain::RenderablePrimitive => "RenderablePrimitive",
            ResourceDomain::Texture => "Texture",
            ResourceDomain::PixelWorld => "PixelWorld",
        }
    }
}

impl fmt::Display for ResourceDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An opaque, non-owning reference to a resource slot.
///
/// Holding a handle does not keep its slot alive. Once the slot is destroyed
/// the handle goes stale, and lookups through it report "not found" even
/// after the slot index is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceHandle {
    domain: u32,
    index: u32,
    key: u64,
}

impl ResourceHandle {
    /// The null handle. Never produced by allocation.
    pub const NULL: ResourceHandle = ResourceHandle {
        domain: 0,
        index: 0,
        key: 0,
    };

    /// Build a handle from raw parts without validation.
    pub const fn from_raw_parts(domain: u32, index: u32, key: u64) -> Self {
        Self { domain, index, key }
    }

    /// Check if this is the null handle.
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// Raw domain, including the internal flag.
    pub fn raw_domain(&self) -> u32 {
        self.domain
    }

    /// Slot index within the issuing list.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation key.
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Decoded domain, or `None` if the handle is not an engine handle.
    pub fn domain(&self) -> Option<ResourceDomain> {
        decode_domain(*self)
    }

    /// Pack into an opaque 128-bit value.
    pub fn to_bits(&self) -> u128 {
        (u128::from(self.domain) << 96) | (u128::from(self.index) << 64) | u128::from(self.key)
    }

    /// Unpack a value produced by [`to_bits`](Self::to_bits).
    pub fn from_bits(bits: u128) -> Self {
        Self {
            domain: (bits >> 96) as u32,
            index: (bits >> 64) as u32,
            key: bits as u64,
        }
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("null");
        }
        match self.domain() {
            Some(domain) => write!(f, "{}[{}]#{:016x}", domain, self.index, self.key),
            None => write!(f, "?{:#x}[{}]#{:016x}", self.domain, self.index, self.key),
        }
    }
}

/// Build a handle for `domain`, marking it engine-owned.
pub fn encode(domain: ResourceDomain, index: u32, key: u64) -> ResourceHandle {
    ResourceHandle {
        domain: domain.raw() | INTERNAL_DOMAIN_FLAG,
        index,
        key,
    }
}

/// Decode the domain of `handle`.
///
/// Returns `None` unless the internal flag is set and the masked value names
/// a domain.
pub fn decode_domain(handle: ResourceHandle) -> Option<ResourceDomain> {
    if handle.domain & INTERNAL_DOMAIN_FLAG == 0 {
        return None;
    }
    ResourceDomain::from_raw(handle.domain & DOMAIN_MASK)
}

/// Check that `handle` belongs to `domain` and indexes within `capacity`.
///
/// Occupancy and key are not checked here.
pub fn is_valid_for_domain(handle: ResourceHandle, domain: ResourceDomain, capacity: u32) -> bool {
    decode_domain(handle) == Some(domain) && handle.index < capacity
}

/// Process-wide key clock. Advances once per mint.
static KEY_CLOCK: AtomicU64 = AtomicU64::new(1);

fn index_mix(index: u32) -> u64 {
    KEY_MIX ^ ((u64::from(!index) << 32) | u64::from(index))
}

/// Mint a fresh, non-zero generation key for slot `index`.
///
/// The clock tick is mixed with the index, so keys minted for one index
/// never repeat and keys minted at the same tick differ across indices.
pub fn mint_key(index: u32) -> u64 {
    mint_from(&KEY_CLOCK, index)
}

fn mint_from(clock: &AtomicU64, index: u32) -> u64 {
    let mix = index_mix(index);
    loop {
        let tick = clock.fetch_add(1, Ordering::Relaxed);
        let key = tick ^ mix;
        if key != 0 {
            return key;
        }
        diagnostics::emit_with_context(&SP201, &format!("index {} at tick {}", index, tick));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        for domain in [
            ResourceDomain::Entity,
            ResourceDomain::RenderablePrimitive,
            ResourceDomain::Texture,
            ResourceDomain::PixelWorld,
        ] {
            let handle = encode(domain, 7, 42);
            assert_eq!(decode_domain(handle), Some(domain));
            assert!(is_valid_for_domain(handle, domain, 8));
            assert!(!is_valid_for_domain(handle, domain, 7));
        }
    }

    #[test]
    fn test_domain_mismatch_and_external() {
        let handle = encode(ResourceDomain::Texture, 0, 1);
        assert!(!is_valid_for_domain(handle, ResourceDomain::PixelWorld, 8));

        let external = ResourceHandle::from_raw_parts(ResourceDomain::Texture.raw(), 0, 1);
        assert_eq!(decode_domain(external), None);

        let out_of_range = ResourceHandle::from_raw_parts(INTERNAL_DOMAIN_FLAG | ResourceDomain::COUNT, 0, 1);
        assert_eq!(decode_domain(out_of_range), None);
        assert_eq!(decode_domain(ResourceHandle::NULL), None);
    }

    #[test]
    fn test_bits_round_trip() {
        let handle = encode(ResourceDomain::PixelWorld, 0xDEAD, 0x0123_4567_89AB_CDEF);
        assert_eq!(ResourceHandle::from_bits(handle.to_bits()), handle);
        assert_eq!(ResourceHandle::NULL.to_bits(), 0);
    }

    #[test]
    fn test_minted_keys_differ() {
        let a = mint_key(3);
        let b = mint_key(3);
        let c = mint_key(4);
        assert_ne!(a, 0);
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn test_zero_key_is_perturbed() {
        let clock = AtomicU64::new(index_mix(5));
        let key = mint_from(&clock, 5);
        assert_ne!(key, 0);
        assert_eq!(key, (index_mix(5) + 1) ^ index_mix(5));
        assert_eq!(clock.load(Ordering::Relaxed), index_mix(5) + 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(ResourceHandle::NULL.to_string(), "null");
        assert_eq!(
            encode(ResourceDomain::Texture, 2, 0xff).to_string(),
            "Texture[2]#00000000000000ff"
        );
    }
}
