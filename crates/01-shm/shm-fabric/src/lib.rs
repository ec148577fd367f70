//! Glue between shared regions and the rings that live inside them.
//!
//! `shm-region` hands out raw mapped byte ranges; `shm-ring` lays queues out
//! at raw addresses. This crate connects the two safely: placements are
//! validated against region bounds, expressed as byte offsets (never
//! pointers) so both peers resolve them against their own mapping, and the
//! resulting rings and endpoints borrow the region — the borrow checker
//! rejects destroying a region while anything inside it is still in use.

mod carve;
mod duplex;
mod error;

pub use carve::{create_ring_at, open_ring_at, RingSpec};
pub use duplex::{attach_duplex, create_duplex, Duplex, DuplexPlan};
pub use error::{FabricError, FabricResult};

pub use shm_region::{
    BackendKind, ContactToken, Creator, Region, RegionError, RegionManager, RegionName, PAGE_SIZE,
};
pub use shm_ring::{
    ring_footprint, slot_stride, Received, Receiver, Ring, RingError, SendGrant, Sender, TrySend,
    CACHE_LINE,
};
