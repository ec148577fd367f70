//! POSIX backend: named objects under the OS shared-memory namespace.
//!
//! Unnamed regions get `/df_shm_posixshm.<pid>.<counter>` names and are
//! created exclusively, so a stale object left by a recycled pid fails loudly
//! instead of being silently reused. Caller-named regions follow the
//! file-mapping convention: an existing object is truncated and reused.
//! Objects are mode 0600 and unlinked on destroy.

use crate::backend::{Mapped, RegionState};
use crate::contact::{self, ContactToken};
use crate::error::{RegionError, RegionResult};
use crate::mman::{map_shared_fd, round_to_page, unmap};
use log::{debug, warn};
use std::ffi::CString;
use std::ptr::NonNull;

pub(crate) struct PosixShm {
    pid: u32,
    next_id: u32,
}

impl PosixShm {
    pub(crate) fn init() -> RegionResult<Self> {
        Ok(Self {
            pid: std::process::id(),
            next_id: 0,
        })
    }

    pub(crate) fn create(
        &mut self,
        size: usize,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Mapped> {
        let name = format!("/df_shm_posixshm.{}.{}", self.pid, self.next_id);
        self.next_id += 1;
        let c_name = CString::new(name).map_err(|_| RegionError::InvalidName)?;

        // SAFETY: `c_name` is a valid NUL-terminated string.
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600 as libc::mode_t,
            )
        };
        if fd < 0 {
            return Err(RegionError::os("shm_open"));
        }

        let mapped = size_and_map(fd, c_name.clone(), round_to_page(size), hint);
        if mapped.is_err() {
            // The name was ours alone; take it back out of the namespace.
            // SAFETY: unlinking the object created above.
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
        }
        mapped
    }

    pub(crate) fn create_named(
        &mut self,
        name: &str,
        size: usize,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Mapped> {
        let c_name = CString::new(name).map_err(|_| RegionError::InvalidName)?;
        // An existing object under the name is truncated and reused.
        // SAFETY: `c_name` is a valid NUL-terminated string.
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR,
                0o600 as libc::mode_t,
            )
        };
        if fd < 0 {
            return Err(RegionError::os("shm_open"));
        }
        size_and_map(fd, c_name, round_to_page(size), hint)
    }

    pub(crate) fn contact(&self, name: &CString, len: usize) -> RegionResult<ContactToken> {
        contact::encode_named(name.to_bytes(), len)
    }

    pub(crate) fn attach(
        &mut self,
        token: &ContactToken,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Mapped> {
        let (name, len) = contact::decode_named(token)?;
        let c_name = CString::new(name).map_err(|_| RegionError::InvalidName)?;

        // SAFETY: `c_name` is a valid NUL-terminated string.
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };
        if fd < 0 {
            return Err(RegionError::os("shm_open"));
        }
        let addr = map_shared_fd(fd, len, hint);
        // SAFETY: descriptor from the shm_open above; the mapping outlives it.
        unsafe { libc::close(fd) };
        let addr = addr?;

        Ok(Mapped {
            addr,
            len,
            state: RegionState::Posix { name: c_name },
        })
    }

    pub(crate) fn detach(&mut self, addr: NonNull<u8>, len: usize) -> RegionResult<()> {
        unmap(addr, len)
    }

    pub(crate) fn destroy(
        &mut self,
        addr: NonNull<u8>,
        len: usize,
        name: &CString,
    ) -> RegionResult<()> {
        let unmapped = unmap(addr, len);
        if let Err(err) = &unmapped {
            warn!("unmap during destroy failed: {err}");
        }
        // SAFETY: `name` identifies an object this backend opened.
        if unsafe { libc::shm_unlink(name.as_ptr()) } != 0 {
            return Err(RegionError::os("shm_unlink"));
        }
        debug!("unlinked shared-memory object {name:?}");
        unmapped
    }

    pub(crate) fn finalize(&mut self) {
        // Names are per-region; nothing process-wide to tear down.
    }
}

fn size_and_map(
    fd: libc::c_int,
    name: CString,
    len: usize,
    hint: Option<NonNull<u8>>,
) -> RegionResult<Mapped> {
    // SAFETY: `fd` is an open descriptor owned by this call.
    if unsafe { libc::ftruncate(fd, len as libc::off_t) } != 0 {
        let err = RegionError::os("ftruncate");
        // SAFETY: closing the descriptor we were handed.
        unsafe { libc::close(fd) };
        return Err(err);
    }

    let addr = map_shared_fd(fd, len, hint);
    // SAFETY: the mapping (when it exists) no longer needs the descriptor.
    unsafe { libc::close(fd) };
    let addr = addr?;

    debug!("mapped shared-memory object {name:?} ({len} bytes)");
    Ok(Mapped {
        addr,
        len,
        state: RegionState::Posix { name },
    })
}
