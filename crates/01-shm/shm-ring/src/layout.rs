//! In-memory layout of a ring placed inside a shared region.
//!
//! ```text
//! base (cache-line aligned)
//! +--------------------+----------+----------+-- ... --+----------+
//! | RingHeader (64 B)  | slot 0   | slot 1   |         | slot N-1 |
//! +--------------------+----------+----------+-- ... --+----------+
//!                        Slot (stride bytes, stride % 64 == 0):
//!                        [u32 status][u32 pad][usize len][payload ...][pad]
//! ```
//!
//! The header is written once at creation and read-only afterwards. Slot
//! status words are the only locations written by both sides; each has a
//! single writer at any given moment (sender flips EMPTY→FULL, receiver flips
//! FULL→EMPTY). Everything is addressed by byte offsets from `base` so the
//! layout is identical in every process that maps the region, regardless of
//! where the mapping lands.

use crate::error::{RingError, RingResult};
use std::mem::size_of;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicUsize};

/// Cache-line size assumed by the slot layout. Must match across peers.
pub const CACHE_LINE: usize = 64;

/// Slot is free for the sender to fill.
pub(crate) const STATUS_EMPTY: u32 = 0;
/// Slot carries a payload the receiver has not released yet.
pub(crate) const STATUS_FULL: u32 = 1;

/// Ring header occupying exactly one cache line at the placement address.
#[repr(C, align(64))]
pub(crate) struct RingHeader {
    /// Non-zero once the slot array below is fully initialized. The store of
    /// this flag is the last one made visible by the creator.
    pub ready: AtomicI32,
    pub slot_count: u32,
    pub max_payload: usize,
    pub slot_stride: usize,
    pub footprint: usize,
}

const _: () = assert!(size_of::<RingHeader>() == CACHE_LINE);

impl RingHeader {
    pub(crate) fn new(
        slot_count: u32,
        max_payload: usize,
        slot_stride: usize,
        footprint: usize,
    ) -> Self {
        Self {
            ready: AtomicI32::new(0),
            slot_count,
            max_payload,
            slot_stride,
            footprint,
        }
    }
}

/// Per-slot header preceding the inline payload bytes.
#[repr(C)]
pub(crate) struct SlotHeader {
    pub status: AtomicU32,
    pub _pad: u32,
    pub len: AtomicUsize,
}

impl SlotHeader {
    pub(crate) fn new() -> Self {
        Self {
            status: AtomicU32::new(STATUS_EMPTY),
            _pad: 0,
            len: AtomicUsize::new(0),
        }
    }
}

/// Stride of one slot: the smallest cache-line multiple that fits the slot
/// header plus `max_payload` bytes. Adjacent slots never share a cache line.
///
/// Fails when a single slot's byte footprint already overflows the address
/// space; a release build must report that, not wrap around and hand back a
/// small stride that later writes out of bounds.
pub fn slot_stride(max_payload: usize) -> RingResult<usize> {
    size_of::<SlotHeader>()
        .checked_add(max_payload)
        .and_then(|slot_bytes| align_up(slot_bytes, CACHE_LINE))
        .ok_or(RingError::GeometryOverflow {
            slot_count: 1,
            max_payload,
        })
}

/// Total byte footprint of a ring with the given geometry.
///
/// This is the amount of region space a caller must set aside at the
/// placement address before calling [`crate::Ring::create_at`]. Every step is
/// overflow-checked for the same reason as [`slot_stride`].
pub fn ring_footprint(slot_count: u32, max_payload: usize) -> RingResult<usize> {
    if slot_count == 0 || max_payload == 0 {
        return Err(RingError::InvalidConfig {
            slot_count,
            max_payload,
        });
    }
    let stride = slot_stride(max_payload).map_err(|_| RingError::GeometryOverflow {
        slot_count,
        max_payload,
    })?;
    (slot_count as usize)
        .checked_mul(stride)
        .and_then(|slot_bytes| size_of::<RingHeader>().checked_add(slot_bytes))
        .ok_or(RingError::GeometryOverflow {
            slot_count,
            max_payload,
        })
}

pub(crate) fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    value
        .checked_add(align - 1)
        .map(|padded| padded & !(align - 1))
}
