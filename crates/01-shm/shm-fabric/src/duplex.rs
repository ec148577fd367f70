//! Duplex ring pairs: one forward and one reverse ring in a single region.
//!
//! The request/reply shape most users want is two rings with mirrored roles.
//! Both peers compute the same [`DuplexPlan`] from the agreed geometry; the
//! creator initializes both rings and takes the forward sender, the attacher
//! opens them and takes the forward receiver. No inter-ring ordering exists —
//! peers layer their own happens-before via message contents.

use crate::carve::{create_ring_at, open_ring_at, RingSpec};
use crate::error::FabricResult;
use shm_region::Region;
use shm_ring::{Receiver, Sender};

/// Agreed placement of a duplex ring pair inside a region.
#[derive(Clone, Copy, Debug)]
pub struct DuplexPlan {
    spec: RingSpec,
    forward: usize,
    reverse: usize,
}

impl DuplexPlan {
    /// Plans a pair of `spec`-shaped rings starting at the region's base.
    pub fn new(spec: RingSpec) -> FabricResult<Self> {
        Self::at(0, spec)
    }

    /// Plans the pair starting at `offset`, leaving the bytes below for
    /// caller metadata. The offset must be cache-line aligned.
    pub fn at(offset: usize, spec: RingSpec) -> FabricResult<Self> {
        // Ring footprints are cache-line multiples, so the reverse ring is
        // aligned whenever the forward one is.
        let footprint = spec.footprint()?;
        Ok(Self {
            spec,
            forward: offset,
            reverse: offset + footprint,
        })
    }

    /// Geometry shared by both rings.
    pub fn spec(&self) -> RingSpec {
        self.spec
    }

    /// Offset of the creator→attacher ring.
    pub fn forward_offset(&self) -> usize {
        self.forward
    }

    /// Offset of the attacher→creator ring.
    pub fn reverse_offset(&self) -> usize {
        self.reverse
    }

    /// First byte past the pair; the region must be at least this large.
    pub fn end(&self) -> FabricResult<usize> {
        Ok(self.reverse + self.spec.footprint()?)
    }
}

/// One peer's pair of endpoints on a duplex.
pub struct Duplex<'r> {
    /// Sends toward the other peer.
    pub tx: Sender<'r>,
    /// Receives from the other peer.
    pub rx: Receiver<'r>,
}

/// Initializes both rings of `plan` inside `region` and returns the
/// creator-side endpoints (forward sender, reverse receiver).
pub fn create_duplex<'r>(region: &'r Region, plan: &DuplexPlan) -> FabricResult<Duplex<'r>> {
    let forward = create_ring_at(region, plan.forward, plan.spec)?;
    let reverse = create_ring_at(region, plan.reverse, plan.spec)?;
    Ok(Duplex {
        tx: Sender::open(&forward)?,
        rx: Receiver::open(&reverse)?,
    })
}

/// Opens both rings of `plan` inside an attached `region` and returns the
/// attacher-side endpoints (reverse sender, forward receiver).
pub fn attach_duplex<'r>(region: &'r Region, plan: &DuplexPlan) -> FabricResult<Duplex<'r>> {
    let forward = open_ring_at(region, plan.forward)?;
    let reverse = open_ring_at(region, plan.reverse)?;
    Ok(Duplex {
        tx: Sender::open(&reverse)?,
        rx: Receiver::open(&forward)?,
    })
}
