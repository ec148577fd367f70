//! System V backend: segments addressed by `ftok`-derived integer keys.
//!
//! One seed file `df_shm_sysv.<pid>` under the system temp directory serves
//! as the `ftok` input for the whole process; per-region keys come from an
//! incrementing project id. Segments are created exclusively (an existing
//! key, caller-supplied or not, is an error) with mode 0600 and are marked
//! for removal on destroy. The seed file is unlinked at finalize.

use crate::backend::{cstring_from_path, Mapped, RegionState};
use crate::contact::{self, ContactToken};
use crate::error::{RegionError, RegionResult};
use crate::mman::{hint_ptr, round_to_page};
use log::{debug, warn};
use std::mem;
use std::path::PathBuf;
use std::ptr::{self, NonNull};

pub(crate) struct SysV {
    seed: PathBuf,
    next_proj: libc::c_int,
}

impl SysV {
    pub(crate) fn init() -> RegionResult<Self> {
        let pid = std::process::id();
        let seed = std::env::temp_dir().join(format!("df_shm_sysv.{pid}"));
        let c_seed = cstring_from_path(&seed)?;
        // ftok resolves the path through the filesystem, so the seed must
        // exist on disk for the manager's lifetime.
        // SAFETY: `c_seed` is a valid NUL-terminated string.
        let fd = unsafe {
            libc::open(
                c_seed.as_ptr(),
                libc::O_CREAT | libc::O_RDWR,
                0o600 as libc::mode_t,
            )
        };
        if fd < 0 {
            return Err(RegionError::os("open"));
        }
        // SAFETY: descriptor from the open above; only the path matters.
        unsafe { libc::close(fd) };

        Ok(Self { seed, next_proj: 1 })
    }

    fn next_key(&mut self) -> RegionResult<libc::key_t> {
        let c_seed = cstring_from_path(&self.seed)?;
        let proj = self.next_proj;
        // ftok folds the project id down to its low byte; after 255 regions
        // the keys wrap and shmget's exclusive create reports the collision.
        self.next_proj = self.next_proj.wrapping_add(1);
        // SAFETY: `c_seed` names the seed file created in `init`.
        let key = unsafe { libc::ftok(c_seed.as_ptr(), proj) };
        if key == -1 {
            return Err(RegionError::os("ftok"));
        }
        Ok(key)
    }

    pub(crate) fn create(
        &mut self,
        size: usize,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Mapped> {
        let key = self.next_key()?;
        self.create_with_key(key, size, hint)
    }

    pub(crate) fn create_named(
        &mut self,
        key: libc::key_t,
        size: usize,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Mapped> {
        self.create_with_key(key, size, hint)
    }

    fn create_with_key(
        &mut self,
        key: libc::key_t,
        size: usize,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Mapped> {
        let len = round_to_page(size);
        // SAFETY: plain segment allocation; exclusive so a live key fails.
        let shmid =
            unsafe { libc::shmget(key, len, libc::IPC_CREAT | libc::IPC_EXCL | 0o600) };
        if shmid < 0 {
            return Err(RegionError::os("shmget"));
        }

        let addr = match attach_id(shmid, hint) {
            Ok(addr) => addr,
            Err(err) => {
                // Roll the segment back; nobody else can know the key yet.
                // SAFETY: `shmid` came from the shmget above.
                unsafe { libc::shmctl(shmid, libc::IPC_RMID, ptr::null_mut()) };
                return Err(err);
            }
        };

        debug!("created SysV segment key={key:#x} shmid={shmid} ({len} bytes)");
        Ok(Mapped {
            addr,
            len,
            state: RegionState::SysV { shmid, key },
        })
    }

    pub(crate) fn contact(&self, key: libc::key_t) -> ContactToken {
        contact::encode_key(key)
    }

    pub(crate) fn attach(
        &mut self,
        token: &ContactToken,
        size: usize,
        hint: Option<NonNull<u8>>,
    ) -> RegionResult<Mapped> {
        let key = contact::decode_key(token)?;
        // SAFETY: lookup of an existing segment; size 0 skips creation.
        let shmid = unsafe { libc::shmget(key, 0, 0) };
        if shmid < 0 {
            return Err(RegionError::os("shmget"));
        }

        // The token carries no length, so ask the segment itself. The caller
        // size is only a cross-check.
        // SAFETY: `ds` is a properly sized out-structure for IPC_STAT.
        let mut ds: libc::shmid_ds = unsafe { mem::zeroed() };
        if unsafe { libc::shmctl(shmid, libc::IPC_STAT, &mut ds) } != 0 {
            return Err(RegionError::os("shmctl"));
        }
        let len = ds.shm_segsz as usize;
        if size > 0 && round_to_page(size) > len {
            warn!(
                "attach requested {size} bytes but SysV segment key={key:#x} holds only {len}"
            );
        }

        let addr = attach_id(shmid, hint)?;
        Ok(Mapped {
            addr,
            len,
            state: RegionState::SysV { shmid, key },
        })
    }

    pub(crate) fn detach(&mut self, addr: NonNull<u8>) -> RegionResult<()> {
        detach_addr(addr)
    }

    pub(crate) fn destroy(&mut self, addr: NonNull<u8>, shmid: libc::c_int) -> RegionResult<()> {
        let detached = detach_addr(addr);
        if let Err(err) = &detached {
            warn!("shmdt during destroy failed: {err}");
        }
        // Mark for removal regardless; the segment dies once the last peer
        // detaches.
        // SAFETY: `shmid` identifies a segment this backend created.
        if unsafe { libc::shmctl(shmid, libc::IPC_RMID, ptr::null_mut()) } != 0 {
            return Err(RegionError::os("shmctl"));
        }
        debug!("removed SysV segment shmid={shmid}");
        detached
    }

    pub(crate) fn finalize(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.seed) {
            warn!("failed to unlink ftok seed {}: {err}", self.seed.display());
        }
    }
}

fn attach_id(shmid: libc::c_int, hint: Option<NonNull<u8>>) -> RegionResult<NonNull<u8>> {
    let wanted = hint_ptr(hint);
    // SAFETY: `shmid` identifies a live segment; a hint is advisory and the
    // call fails cleanly if the OS cannot honor it.
    let mut addr = unsafe { libc::shmat(shmid, wanted, 0) };
    if addr as isize == -1 && !wanted.is_null() {
        warn!(
            "shmat could not place segment at hint {:#x}; retrying at an OS-chosen address",
            wanted as usize
        );
        // SAFETY: same segment, OS-chosen placement.
        addr = unsafe { libc::shmat(shmid, ptr::null(), 0) };
    }
    if addr as isize == -1 {
        return Err(RegionError::os("shmat"));
    }
    if !wanted.is_null() && addr != wanted {
        warn!(
            "segment attached at {:#x} instead of hint {:#x}",
            addr as usize, wanted as usize
        );
    }
    NonNull::new(addr as *mut u8).ok_or_else(|| RegionError::os("shmat"))
}

fn detach_addr(addr: NonNull<u8>) -> RegionResult<()> {
    // SAFETY: `addr` is the base returned by shmat for this region.
    if unsafe { libc::shmdt(addr.as_ptr() as *const libc::c_void) } != 0 {
        return Err(RegionError::os("shmdt"));
    }
    Ok(())
}
