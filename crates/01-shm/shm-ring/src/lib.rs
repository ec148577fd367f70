//! Single-producer/single-consumer ring queues placed inside shared memory.
//!
//! This crate implements the in-region half of the transport:
//! * [`ring_footprint`] / [`slot_stride`] – layout math for carving a region.
//! * [`Ring`] – in-place construction and attachment of one queue.
//! * [`Sender`] / [`Receiver`] – the two endpoints, with blocking, `try_*`,
//!   gather, and zero-copy grant/guard variants.
//! * [`RingError`] – lightweight error surface for geometry and bounds
//!   violations.
//!
//! Nothing here performs a system call: messages flow through cache-coherent
//! loads and stores on the slot array, ordered by release/acquire pairs on
//! the per-slot status words. Waiting is a busy spin; the expected contention
//! window is tens of nanoseconds and a kernel transition would dominate.
//!
//! The crate is deliberately ignorant of how the backing bytes came to be
//! shared; region setup and the safe carving API live in the neighbouring
//! crates.

mod endpoint;
mod error;
mod layout;
mod ring;

pub use endpoint::{Received, Receiver, SendGrant, Sender, TrySend};
pub use error::{RingError, RingResult};
pub use layout::{ring_footprint, slot_stride, CACHE_LINE};
pub use ring::Ring;
