//! Carving rings out of a mapped region.
//!
//! A region is a raw byte range; peers agree on where inside it each ring
//! lives by exchanging byte offsets (typically baked into both binaries or
//! shipped alongside the contact token). These helpers validate a placement
//! against the region bounds and tie the resulting ring views to the
//! region's lifetime, so a region cannot be given back to its manager while
//! rings or endpoints inside it are still alive.

use crate::error::{FabricError, FabricResult};
use shm_region::Region;
use shm_ring::{ring_footprint, Ring, CACHE_LINE};
use std::ptr::NonNull;

/// Geometry of one ring: slot count and per-slot payload capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RingSpec {
    pub slot_count: u32,
    pub max_payload: usize,
}

impl RingSpec {
    /// Bytes the ring occupies at its placement offset.
    pub fn footprint(&self) -> FabricResult<usize> {
        Ok(ring_footprint(self.slot_count, self.max_payload)?)
    }
}

/// Initializes a ring at `offset` inside `region`.
///
/// The offset must be cache-line aligned and the ring's footprint must fit
/// inside the region.
pub fn create_ring_at(region: &Region, offset: usize, spec: RingSpec) -> FabricResult<Ring<'_>> {
    let footprint = spec.footprint()?;
    let base = placement(region, offset, footprint)?;
    // SAFETY: `placement` proved [base, base+footprint) lies inside the
    // region's mapping, which outlives the borrow tied to `region`.
    Ok(unsafe { Ring::create_at(base, spec.slot_count, spec.max_payload) }?)
}

/// Opens a view of a ring a peer (or this process) already initialized at
/// `offset` inside `region`.
pub fn open_ring_at(region: &Region, offset: usize) -> FabricResult<Ring<'_>> {
    // The header must fit before it can be read; the full footprint is
    // validated against the region once the geometry is known.
    let base = placement(region, offset, CACHE_LINE)?;
    // SAFETY: at least one cache line at `base` is inside the mapping, which
    // is all `open_at` touches before the geometry checks below.
    let ring = unsafe { Ring::open_at(base) }?;
    if offset + ring.footprint() > region.len() {
        return Err(FabricError::InvalidLayout("ring exceeds region bounds"));
    }
    Ok(ring)
}

fn placement(region: &Region, offset: usize, need: usize) -> FabricResult<NonNull<u8>> {
    if offset % CACHE_LINE != 0 {
        return Err(FabricError::InvalidLayout(
            "ring offset must be cache-line aligned",
        ));
    }
    let end = offset
        .checked_add(need)
        .ok_or(FabricError::InvalidLayout("ring placement overflows"))?;
    if end > region.len() {
        return Err(FabricError::InvalidLayout("ring exceeds region bounds"));
    }
    // SAFETY: `offset` is in bounds for the region's mapping.
    Ok(unsafe { NonNull::new_unchecked(region.as_ptr().add(offset)) })
}
