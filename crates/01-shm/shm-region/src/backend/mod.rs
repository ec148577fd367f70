//! The three OS shared-memory mechanisms behind one dispatch surface.
//!
//! A backend is chosen once, when the manager is constructed, and never
//! changes. Dispatch is a sealed enum with one branch per call: the variant
//! modules hold the mechanism-specific state and syscall sequences, this
//! module holds the uniform operation set the manager drives.

use crate::contact::ContactToken;
use crate::error::{RegionError, RegionResult};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

mod file_map;
mod posix_shm;
mod sysv;

/// Which OS mechanism a manager uses for its regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// Temporary backing file mapped with `mmap`.
    FileMapping,
    /// System V segment addressed by an integer key.
    SysV,
    /// POSIX named object under the OS shared-memory namespace.
    PosixShm,
}

/// Caller-supplied identity for a named region. Each backend accepts exactly
/// one shape.
#[derive(Clone, Copy, Debug)]
pub enum RegionName<'a> {
    /// Backing-file path (file-mapping backend).
    Path(&'a Path),
    /// Segment key (SysV backend).
    Key(libc::key_t),
    /// Shared-memory object name, conventionally with a leading `/`
    /// (POSIX backend).
    Shm(&'a str),
}

/// Backend-private per-region state carried by every region handle; the
/// manager keeps a copy per tracked region so finalize can clean up regions
/// whose handles were never returned.
#[derive(Clone, Debug)]
pub(crate) enum RegionState {
    File { path: PathBuf },
    SysV { shmid: libc::c_int, key: libc::key_t },
    Posix { name: CString },
}

/// A freshly mapped byte range plus its backend-private state.
pub(crate) struct Mapped {
    pub addr: NonNull<u8>,
    pub len: usize,
    pub state: RegionState,
}

pub(crate) enum Backend {
    FileMapping(file_map::FileMapping),
    SysV(sysv::SysV),
    PosixShm(posix_shm::PosixShm),
}

impl Backend {
    pub(crate) fn init(kind: BackendKind) -> RegionResult<Self> {
        Ok(match kind {
            BackendKind::FileMapping => Backend::FileMapping(file_map::FileMapping::init()?),
            BackendKind::SysV => Backend::SysV(sysv::SysV::init()?),
            BackendKind::PosixShm => Backend::PosixShm(posix_shm::PosixShm::init()?),
        })
    }

    pub(crate) fn kind(&self) -> BackendKind {
        match self {
            Backend::FileMapping(_) => BackendKind::FileMapping,
            Backend::SysV(_) => BackendKind::SysV,
            Backend::PosixShm(_) => BackendKind::PosixShm,
        }
    }

    pub(crate) fn create_region(
        &mut self,
        size: usize,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Mapped> {
        match self {
            Backend::FileMapping(b) => b.create(size, hint),
            Backend::SysV(b) => b.create(size, hint),
            Backend::PosixShm(b) => b.create(size, hint),
        }
    }

    pub(crate) fn create_named_region(
        &mut self,
        name: &RegionName<'_>,
        size: usize,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Mapped> {
        match (self, name) {
            (Backend::FileMapping(b), RegionName::Path(path)) => b.create_named(path, size, hint),
            (Backend::SysV(b), RegionName::Key(key)) => b.create_named(*key, size, hint),
            (Backend::PosixShm(b), RegionName::Shm(shm)) => b.create_named(shm, size, hint),
            (backend, _) => Err(RegionError::NameMismatch {
                backend: backend.kind(),
            }),
        }
    }

    pub(crate) fn region_contact(
        &self,
        state: &RegionState,
        len: usize,
    ) -> RegionResult<ContactToken> {
        match (self, state) {
            (Backend::FileMapping(b), RegionState::File { path }) => b.contact(path, len),
            (Backend::SysV(b), RegionState::SysV { key, .. }) => Ok(b.contact(*key)),
            (Backend::PosixShm(b), RegionState::Posix { name }) => b.contact(name, len),
            _ => Err(RegionError::NotTracked),
        }
    }

    /// Builds the token a peer would have produced for a named region, so
    /// `attach_named` can reuse the ordinary attach path.
    pub(crate) fn named_contact(
        &self,
        name: &RegionName<'_>,
        len: usize,
    ) -> RegionResult<ContactToken> {
        match (self, name) {
            (Backend::FileMapping(_), RegionName::Path(path)) => {
                crate::contact::encode_named(path.as_os_str().as_bytes(), len)
            }
            (Backend::SysV(_), RegionName::Key(key)) => Ok(crate::contact::encode_key(*key)),
            (Backend::PosixShm(_), RegionName::Shm(shm)) => {
                crate::contact::encode_named(shm.as_bytes(), len)
            }
            (backend, _) => Err(RegionError::NameMismatch {
                backend: backend.kind(),
            }),
        }
    }

    pub(crate) fn attach_region(
        &mut self,
        token: &ContactToken,
        size: usize,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Mapped> {
        match self {
            Backend::FileMapping(b) => b.attach(token, hint),
            Backend::SysV(b) => b.attach(token, size, hint),
            Backend::PosixShm(b) => b.attach(token, hint),
        }
    }

    pub(crate) fn detach_region(
        &mut self,
        addr: NonNull<u8>,
        len: usize,
        state: &RegionState,
    ) -> RegionResult<()> {
        match (self, state) {
            (Backend::FileMapping(b), RegionState::File { .. }) => b.detach(addr, len),
            (Backend::SysV(b), RegionState::SysV { .. }) => b.detach(addr),
            (Backend::PosixShm(b), RegionState::Posix { .. }) => b.detach(addr, len),
            _ => Err(RegionError::NotTracked),
        }
    }

    pub(crate) fn destroy_region(
        &mut self,
        addr: NonNull<u8>,
        len: usize,
        state: &RegionState,
    ) -> RegionResult<()> {
        match (self, state) {
            (Backend::FileMapping(b), RegionState::File { path }) => b.destroy(addr, len, path),
            (Backend::SysV(b), RegionState::SysV { shmid, .. }) => b.destroy(addr, *shmid),
            (Backend::PosixShm(b), RegionState::Posix { name }) => b.destroy(addr, len, name),
            _ => Err(RegionError::NotTracked),
        }
    }

    pub(crate) fn finalize(&mut self) {
        match self {
            Backend::FileMapping(b) => b.finalize(),
            Backend::SysV(b) => b.finalize(),
            Backend::PosixShm(b) => b.finalize(),
        }
    }
}

/// CString conversion for paths handed to libc.
pub(crate) fn cstring_from_path(path: &Path) -> RegionResult<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| RegionError::InvalidName)
}
