//! File-mapping backend: a temporary backing file per region, mapped shared.
//!
//! Unnamed regions get a fresh `df_shm_mmap.<pid>.XXXXXX` file under the
//! system temp directory via `mkstemp` (mode 0600); named regions use the
//! caller's path, truncating whatever is already there. The descriptor is
//! closed as soon as the mapping exists; only the path is retained, since
//! destroy needs it for the unlink.

use crate::backend::{cstring_from_path, Mapped, RegionState};
use crate::contact::{self, ContactToken};
use crate::error::{RegionError, RegionResult};
use crate::mman::{map_shared_fd, round_to_page, unmap};
use log::{debug, warn};
use std::ffi::{CString, OsString};
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

pub(crate) struct FileMapping {
    dir: PathBuf,
    pid: u32,
}

impl FileMapping {
    pub(crate) fn init() -> RegionResult<Self> {
        Ok(Self {
            dir: std::env::temp_dir(),
            pid: std::process::id(),
        })
    }

    pub(crate) fn create(
        &mut self,
        size: usize,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Mapped> {
        let len = round_to_page(size);
        let template = self.dir.join(format!("df_shm_mmap.{}.XXXXXX", self.pid));
        let template = cstring_from_path(&template)?;

        let mut buf = template.into_bytes_with_nul();
        // SAFETY: `buf` is a valid NUL-terminated template ending in XXXXXX;
        // mkstemp rewrites the tail in place.
        let fd = unsafe { libc::mkstemp(buf.as_mut_ptr() as *mut libc::c_char) };
        if fd < 0 {
            return Err(RegionError::os("mkstemp"));
        }
        buf.pop();
        let path = PathBuf::from(OsString::from_vec(buf));

        let mapped = self.size_and_map(fd, &path, len, hint);
        if mapped.is_err() {
            // The file was ours alone; take it back out of the namespace.
            let _ = std::fs::remove_file(&path);
        }
        mapped
    }

    pub(crate) fn create_named(
        &mut self,
        path: &Path,
        size: usize,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Mapped> {
        let len = round_to_page(size);
        let c_path = cstring_from_path(path)?;
        // An existing file at the path is truncated and reused.
        // SAFETY: `c_path` is a valid NUL-terminated string.
        let fd = unsafe {
            libc::open(
                c_path.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_TRUNC,
                0o600 as libc::mode_t,
            )
        };
        if fd < 0 {
            return Err(RegionError::os("open"));
        }
        self.size_and_map(fd, path, len, hint)
    }

    fn size_and_map(
        &self,
        fd: libc::c_int,
        path: &Path,
        len: usize,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Mapped> {
        // SAFETY: `fd` is an open descriptor owned by this call.
        if unsafe { libc::ftruncate(fd, len as libc::off_t) } != 0 {
            let err = RegionError::os("ftruncate");
            // SAFETY: closing the descriptor we opened above.
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let addr = map_shared_fd(fd, len, hint);
        // SAFETY: the mapping (when it exists) keeps its own reference to the
        // file; the descriptor is no longer needed either way.
        unsafe { libc::close(fd) };
        let addr = addr?;

        debug!("mapped backing file {} ({len} bytes)", path.display());
        Ok(Mapped {
            addr,
            len,
            state: RegionState::File {
                path: path.to_path_buf(),
            },
        })
    }

    pub(crate) fn contact(&self, path: &Path, len: usize) -> RegionResult<ContactToken> {
        use std::os::unix::ffi::OsStrExt;
        contact::encode_named(path.as_os_str().as_bytes(), len)
    }

    pub(crate) fn attach(
        &mut self,
        token: &ContactToken,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Mapped> {
        let (name, len) = contact::decode_named(token)?;
        let path = PathBuf::from(OsString::from_vec(name.to_vec()));
        let c_path = CString::new(name).map_err(|_| RegionError::InvalidName)?;

        // SAFETY: `c_path` is a valid NUL-terminated string.
        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR) };
        if fd < 0 {
            return Err(RegionError::os("open"));
        }
        let addr = map_shared_fd(fd, len, hint);
        // SAFETY: descriptor from the open above; the mapping outlives it.
        unsafe { libc::close(fd) };
        let addr = addr?;

        Ok(Mapped {
            addr,
            len,
            state: RegionState::File { path },
        })
    }

    pub(crate) fn detach(&mut self, addr: NonNull<u8>, len: usize) -> RegionResult<()> {
        unmap(addr, len)
    }

    pub(crate) fn destroy(
        &mut self,
        addr: NonNull<u8>,
        len: usize,
        path: &Path,
    ) -> RegionResult<()> {
        let unmapped = unmap(addr, len);
        if let Err(err) = &unmapped {
            warn!("unmap during destroy failed: {err}");
        }
        // The unlink proceeds regardless; a dead mapping must not pin the
        // backing file in the namespace.
        std::fs::remove_file(path).map_err(|source| RegionError::Os {
            op: "unlink",
            source,
        })?;
        debug!("removed backing file {}", path.display());
        unmapped
    }

    pub(crate) fn finalize(&mut self) {
        // Backing files are per-region; nothing process-wide to tear down.
    }
}
