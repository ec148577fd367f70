//! Thin mmap helpers shared by the file-backed backends.
//!
//! Placement is best-effort everywhere: a caller-supplied hint that the OS
//! does not honor produces a warning and the mapping proceeds at the address
//! the OS chose. A non-page-aligned hint is likewise a warning, not an error.

use crate::error::{RegionError, RegionResult};
use log::warn;
use std::ptr::{self, NonNull};

/// Page granularity regions are rounded to. Fixed at build time; must match
/// across peers on the same machine.
pub const PAGE_SIZE: usize = 4096;

/// Rounds a requested size up to page granularity.
pub(crate) fn round_to_page(size: usize) -> usize {
    (size + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// Converts an optional placement hint to the raw pointer the OS expects,
/// warning when the hint is not page-aligned.
pub(crate) fn hint_ptr(hint: Option<NonNull<u8>>) -> *mut libc::c_void {
    match hint {
        Some(addr) => {
            let raw = addr.as_ptr();
            if (raw as usize) % PAGE_SIZE != 0 {
                warn!(
                    "placement hint {:#x} is not page-aligned; mapping is best-effort",
                    raw as usize
                );
            }
            raw as *mut libc::c_void
        }
        None => ptr::null_mut(),
    }
}

/// Maps `len` bytes of `fd` shared and read-write, preferring `hint`.
pub(crate) fn map_shared_fd(
    fd: libc::c_int,
    len: usize,
    hint: Option<NonNull<u8>>,
) -> RegionResult<NonNull<u8>> {
    let wanted = hint_ptr(hint);
    // SAFETY: `fd` is an open descriptor sized to at least `len`; a hint is
    // advisory (no MAP_FIXED), so no existing mapping can be clobbered.
    let addr = unsafe {
        libc::mmap(
            wanted,
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        return Err(RegionError::os("mmap"));
    }
    if !wanted.is_null() && addr != wanted {
        warn!(
            "region mapped at {:#x} instead of hint {:#x}",
            addr as usize, wanted as usize
        );
    }
    NonNull::new(addr as *mut u8).ok_or_else(|| RegionError::os("mmap"))
}

/// Unmaps a range previously returned by [`map_shared_fd`].
pub(crate) fn unmap(addr: NonNull<u8>, len: usize) -> RegionResult<()> {
    // SAFETY: `addr`/`len` describe one whole mapping owned by the caller.
    if unsafe { libc::munmap(addr.as_ptr() as *mut libc::c_void, len) } != 0 {
        return Err(RegionError::os("munmap"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_rounding() {
        assert_eq!(round_to_page(1), PAGE_SIZE);
        assert_eq!(round_to_page(PAGE_SIZE), PAGE_SIZE);
        assert_eq!(round_to_page(PAGE_SIZE + 1), 2 * PAGE_SIZE);
    }
}
