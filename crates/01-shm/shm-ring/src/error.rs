//! Error handling helpers for the ring crate.
//!
//! The ring layer intentionally keeps its error surface small: geometry
//! validation, placement validation, and payload bounds. Contended slots are
//! not errors; the `try_*` operations report them as dedicated would-block
//! outcomes instead.

use std::fmt;

/// Convenience result alias for fallible ring operations.
pub type RingResult<T, E = RingError> = Result<T, E>;

#[derive(Debug)]
/// Errors surfaced by ring construction and endpoint operations.
pub enum RingError {
    /// Slot count or payload capacity is zero.
    InvalidConfig { slot_count: u32, max_payload: usize },
    /// Geometry whose byte footprint overflows the address space.
    GeometryOverflow { slot_count: u32, max_payload: usize },
    /// The placement address is not aligned to a cache line.
    UnalignedBase { addr: usize },
    /// A payload does not fit into one slot.
    PayloadTooLarge { len: usize, max: usize },
    /// The ring header at the placement address has not been initialized.
    Uninitialized,
}

impl fmt::Display for RingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RingError::InvalidConfig {
                slot_count,
                max_payload,
            } => {
                write!(
                    f,
                    "ring requires non-zero geometry (slot_count={slot_count}, max_payload={max_payload})"
                )
            }
            RingError::GeometryOverflow {
                slot_count,
                max_payload,
            } => {
                write!(
                    f,
                    "ring geometry (slot_count={slot_count}, max_payload={max_payload}) overflows the addressable footprint"
                )
            }
            RingError::UnalignedBase { addr } => {
                write!(f, "ring base {addr:#x} is not cache-line aligned")
            }
            RingError::PayloadTooLarge { len, max } => {
                write!(f, "payload of {len} bytes exceeds slot capacity {max}")
            }
            RingError::Uninitialized => {
                write!(f, "ring is not initialized")
            }
        }
    }
}

impl std::error::Error for RingError {}
