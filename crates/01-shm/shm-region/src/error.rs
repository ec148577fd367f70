use std::io;
use thiserror::Error;

use crate::backend::BackendKind;

pub type RegionResult<T> = Result<T, RegionError>;

#[derive(Debug, Error)]
pub enum RegionError {
    #[error("region size must be non-zero")]
    InvalidSize,

    #[error("region name contains a NUL byte")]
    InvalidName,

    #[error("{op} failed")]
    Os {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("contact token is malformed: {0}")]
    BadContact(&'static str),

    #[error("region name does not fit the {backend:?} backend")]
    NameMismatch { backend: BackendKind },

    #[error("region is not tracked by this manager")]
    NotTracked,
}

impl RegionError {
    /// Captures the calling thread's errno for a failed libc call.
    pub(crate) fn os(op: &'static str) -> Self {
        RegionError::Os {
            op,
            source: io::Error::last_os_error(),
        }
    }
}
