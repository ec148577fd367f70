//! Region handles: one mapped byte range as seen by this process.

use crate::backend::RegionState;
use std::ptr::NonNull;

/// Who brought a region into existence, as far as this process knows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Creator {
    /// This process created the region.
    Local(u32),
    /// A peer with the given pid created it; we only attached.
    Peer(u32),
    /// Attached without learning the creator's identity.
    Unknown,
}

/// Handle to one shared byte range mapped into this process.
///
/// The handle is produced and consumed by a [`crate::RegionManager`]; give it
/// back via `detach` or `destroy` when done. Dropping a handle on the floor
/// leaves the mapping in place until the manager finalizes — the OS object
/// may outlive the process if neither happens.
pub struct Region {
    pub(crate) id: u64,
    pub(crate) addr: NonNull<u8>,
    pub(crate) len: usize,
    pub(crate) creator: Creator,
    pub(crate) state: RegionState,
}

// SAFETY: the mapping is valid process-wide, not tied to the creating
// thread; all fields are plain data.
unsafe impl Send for Region {}

impl Region {
    /// Base address of the mapping in this process.
    pub fn as_ptr(&self) -> *mut u8 {
        self.addr.as_ptr()
    }

    /// Mapped length in bytes (the requested size rounded up to page
    /// granularity by the backend).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the region is empty (never true for a produced handle).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Creator identity recorded at create/attach time.
    pub fn creator(&self) -> Creator {
        self.creator
    }

    /// Read view of the full byte range.
    ///
    /// Peers share these bytes; the caller is responsible for coordinating
    /// access to any area a peer may write concurrently (ring internals do
    /// this on their own).
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the handle witnesses a live read/write mapping of `len`
        // bytes at `addr`.
        unsafe { std::slice::from_raw_parts(self.addr.as_ptr(), self.len) }
    }

    /// Write view of the full byte range; same sharing caveats as
    /// [`Region::as_slice`].
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; the mutable borrow keeps this process's other
        // users of the handle out.
        unsafe { std::slice::from_raw_parts_mut(self.addr.as_ptr(), self.len) }
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("addr", &self.addr)
            .field("len", &self.len)
            .field("creator", &self.creator)
            .finish_non_exhaustive()
    }
}
