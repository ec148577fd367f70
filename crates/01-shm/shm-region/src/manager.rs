//! The region manager: one chosen backend plus ownership bookkeeping.
//!
//! The manager keeps two lists — regions this process created and regions it
//! merely attached to — because the two have different dispositions: created
//! regions must eventually take the OS-level destroy path, attachments must
//! only unmap. Splitting the lists lets finalize apply the right disposition
//! without a per-region role check and keeps ownership explicit.

use crate::backend::{Backend, BackendKind, Mapped, RegionName, RegionState};
use crate::contact::ContactToken;
use crate::error::{RegionError, RegionResult};
use crate::region::{Creator, Region};
use log::{debug, error, warn};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

/// Region ids come from a process-global counter, never from per-manager
/// state: a handle can then only ever match bookkeeping in the manager that
/// produced it. Managers share one OS pid, so the pid alone cannot tell two
/// instances of the same backend apart.
static NEXT_REGION_ID: AtomicU64 = AtomicU64::new(0);

/// Bookkeeping copy of a live region, enough for finalize to clean up even
/// when the caller never returned the handle.
struct RegionRecord {
    id: u64,
    addr: NonNull<u8>,
    len: usize,
    state: RegionState,
}

impl RegionRecord {
    /// Whether this record describes the given handle. The id is globally
    /// unique; the address check guards against a stale or forged handle.
    fn matches(&self, region: &Region) -> bool {
        self.id == region.id && self.addr == region.addr && self.len == region.len
    }
}

// SAFETY: records only describe mappings valid process-wide; plain data.
unsafe impl Send for RegionManager {}

/// Polymorphic façade over one shared-memory backend.
///
/// One manager per chosen backend per process. Every [`Region`] handle it
/// produces must come back through [`RegionManager::detach`] or
/// [`RegionManager::destroy`]; whatever is still outstanding is cleaned up
/// best-effort by [`RegionManager::finalize`] (also run on drop).
pub struct RegionManager {
    backend: Backend,
    created: Vec<RegionRecord>,
    attached: Vec<RegionRecord>,
    pid: u32,
    finalized: bool,
}

impl RegionManager {
    /// Selects a backend and runs its process-wide initialization.
    pub fn new(kind: BackendKind) -> RegionResult<Self> {
        Ok(Self {
            backend: Backend::init(kind)?,
            created: Vec::new(),
            attached: Vec::new(),
            pid: std::process::id(),
            finalized: false,
        })
    }

    /// The mechanism this manager was constructed with.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Number of regions this process created and still tracks.
    pub fn created_count(&self) -> usize {
        self.created.len()
    }

    /// Number of foreign regions this process is attached to.
    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    /// Creates a fresh shared region of at least `size` bytes, preferring
    /// `hint` as the mapping address.
    pub fn create(&mut self, size: usize, hint: Option<NonNull<u8>>) -> RegionResult<Region> {
        if size == 0 {
            return Err(RegionError::InvalidSize);
        }
        let mapped = self.backend.create_region(size, hint)?;
        Ok(self.track_created(mapped))
    }

    /// Creates a region under a caller-supplied identity.
    ///
    /// File paths and POSIX names replace whatever already exists; a SysV key
    /// in use is an error (the mechanism requires exclusive creation).
    pub fn create_named(
        &mut self,
        name: &RegionName<'_>,
        size: usize,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Region> {
        if size == 0 {
            return Err(RegionError::InvalidSize);
        }
        let mapped = self.backend.create_named_region(name, size, hint)?;
        Ok(self.track_created(mapped))
    }

    /// Serializes everything a peer needs to attach to `region`.
    pub fn contact(&self, region: &Region) -> RegionResult<ContactToken> {
        self.backend.region_contact(&region.state, region.len)
    }

    /// Attaches to a region identified by a peer's contact token.
    ///
    /// `peer_pid` records who created the region, when known. `size` matters
    /// only for backends whose tokens carry no length (SysV cross-checks it
    /// against the segment); the others read the length from the token.
    pub fn attach(
        &mut self,
        peer_pid: Option<u32>,
        token: &ContactToken,
        size: usize,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Region> {
        let mapped = self.backend.attach_region(token, size, hint)?;
        let creator = match peer_pid {
            Some(pid) => Creator::Peer(pid),
            None => Creator::Unknown,
        };
        Ok(self.track_attached(mapped, creator))
    }

    /// Attaches to a region by its OS-level identity instead of a token.
    pub fn attach_named(
        &mut self,
        name: &RegionName<'_>,
        size: usize,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Region> {
        let token = self.backend.named_contact(name, size)?;
        let mapped = self.backend.attach_region(&token, size, hint)?;
        Ok(self.track_attached(mapped, Creator::Unknown))
    }

    /// Unmaps an attached region without touching the underlying OS object.
    ///
    /// The handle must have been produced by this manager; handles from
    /// another manager instance (even of the same backend) are rejected.
    pub fn detach(&mut self, region: Region) -> RegionResult<()> {
        let Some(pos) = self.attached.iter().position(|r| r.matches(&region)) else {
            error!("detach of a region this manager is not attached to");
            return Err(RegionError::NotTracked);
        };
        self.attached.remove(pos);
        self.backend
            .detach_region(region.addr, region.len, &region.state)
    }

    /// Unmaps a region and removes the underlying OS object.
    ///
    /// Only the creator actually destroys; called on an attached foreign
    /// region this degrades to [`RegionManager::detach`] so a peer cannot
    /// delete an object it does not own.
    pub fn destroy(&mut self, region: Region) -> RegionResult<()> {
        if region.creator != Creator::Local(self.pid) {
            return self.detach(region);
        }
        let Some(pos) = self.created.iter().position(|r| r.matches(&region)) else {
            error!("destroy of a region this manager did not create");
            return Err(RegionError::NotTracked);
        };
        self.created.remove(pos);
        self.backend
            .destroy_region(region.addr, region.len, &region.state)
    }

    /// Destroys every remaining created region, detaches every remaining
    /// attachment (both best-effort), then tears down the backend.
    ///
    /// Handles still held by the caller dangle afterwards; close endpoints
    /// and give regions back before finalizing.
    pub fn finalize(mut self) {
        self.finalize_inner();
    }

    fn finalize_inner(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        for record in std::mem::take(&mut self.created) {
            debug!("finalize: destroying leftover created region #{}", record.id);
            if let Err(err) =
                self.backend
                    .destroy_region(record.addr, record.len, &record.state)
            {
                warn!("finalize: destroy of region #{} failed: {err}", record.id);
            }
        }
        for record in std::mem::take(&mut self.attached) {
            debug!("finalize: detaching leftover attachment #{}", record.id);
            if let Err(err) =
                self.backend
                    .detach_region(record.addr, record.len, &record.state)
            {
                warn!("finalize: detach of region #{} failed: {err}", record.id);
            }
        }
        self.backend.finalize();
    }

    fn track_created(&mut self, mapped: Mapped) -> Region {
        let region = self.region_from(mapped, Creator::Local(self.pid));
        self.created.push(RegionRecord {
            id: region.id,
            addr: region.addr,
            len: region.len,
            state: region.state.clone(),
        });
        region
    }

    fn track_attached(&mut self, mapped: Mapped, creator: Creator) -> Region {
        let region = self.region_from(mapped, creator);
        self.attached.push(RegionRecord {
            id: region.id,
            addr: region.addr,
            len: region.len,
            state: region.state.clone(),
        });
        region
    }

    fn region_from(&self, mapped: Mapped, creator: Creator) -> Region {
        Region {
            id: NEXT_REGION_ID.fetch_add(1, Ordering::Relaxed),
            addr: mapped.addr,
            len: mapped.len,
            creator,
            state: mapped.state,
        }
    }
}

impl Drop for RegionManager {
    fn drop(&mut self) {
        self.finalize_inner();
    }
}
