//! Sender and receiver endpoints over one ring.
//!
//! Exactly one sender and one receiver may operate on a ring at any time,
//! possibly in different processes. Each endpoint owns a private cursor and a
//! precomputed cache of slot base addresses, so the hot path performs no
//! arithmetic beyond `slots[cursor]`.
//!
//! The protocol is per-slot state, not head/tail comparison: the sender spins
//! until the cursor slot is empty, writes payload and length, then publishes
//! with a release store of the status word; the receiver spins until the slot
//! is full, consumes through an acquire load, and hands the slot back with a
//! release store of empty. A ring of N slots therefore holds exactly N
//! in-flight messages.
//!
//! Dropping an endpoint releases only its local caches; the ring and any
//! in-flight payloads are untouched.

use crate::error::{RingError, RingResult};
use crate::layout::{SlotHeader, STATUS_EMPTY, STATUS_FULL};
use crate::ring::Ring;
use std::marker::PhantomData;
use std::mem::size_of;
use std::ptr::NonNull;
use std::sync::atomic::Ordering;

/// Outcome of a non-blocking enqueue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrySend {
    /// The payload was written and published.
    Queued,
    /// The cursor slot is still held by the receiver; nothing was touched.
    WouldBlock,
}

/// Sending half of a ring. Strictly process-local.
///
/// Opening two senders on the same ring, even in different processes, breaks
/// the single-producer discipline and the ring's behavior becomes undefined.
pub struct Sender<'a> {
    slots: Box<[NonNull<u8>]>,
    cursor: usize,
    max_payload: usize,
    _region: PhantomData<&'a ()>,
}

// SAFETY: the cached pointers address a shared mapping that is valid for the
// whole process and for the `'a` lifetime; the slot protocol synchronizes all
// cross-thread access through the status words.
unsafe impl Send for Sender<'_> {}

impl<'a> Sender<'a> {
    /// Opens the sending endpoint of `ring`.
    ///
    /// Fails when the ring's initialized flag is not set (never created, or
    /// destroyed in the meantime).
    pub fn open(ring: &Ring<'a>) -> RingResult<Sender<'a>> {
        Ok(Sender {
            slots: slot_cache(ring)?,
            cursor: 0,
            max_payload: ring.max_payload(),
            _region: PhantomData,
        })
    }

    /// Largest payload one enqueue can carry.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Whether the very next enqueue would succeed without waiting.
    ///
    /// This probes only the cursor slot; it does not count free slots.
    pub fn is_enqueue_possible(&self) -> bool {
        self.cursor_header().status.load(Ordering::Acquire) == STATUS_EMPTY
    }

    /// Copies `payload` into the next slot, spinning until it is free.
    ///
    /// An oversize payload fails immediately: the slot is left untouched and
    /// the cursor does not advance.
    pub fn enqueue(&mut self, payload: &[u8]) -> RingResult<()> {
        self.check_len(payload.len())?;
        self.wait_empty();
        self.write_single(payload);
        self.publish(payload.len());
        Ok(())
    }

    /// Gather variant of [`Sender::enqueue`]: concatenates `segments` in
    /// order into a single slot. The total length must fit one slot.
    pub fn enqueue_vectored(&mut self, segments: &[&[u8]]) -> RingResult<()> {
        let total = gather_len(segments);
        self.check_len(total)?;
        self.wait_empty();
        self.write_gather(segments);
        self.publish(total);
        Ok(())
    }

    /// Non-blocking [`Sender::enqueue`]. Never spins: a busy slot is reported
    /// as [`TrySend::WouldBlock`] with all state untouched.
    pub fn try_enqueue(&mut self, payload: &[u8]) -> RingResult<TrySend> {
        self.check_len(payload.len())?;
        if !self.is_enqueue_possible() {
            return Ok(TrySend::WouldBlock);
        }
        self.write_single(payload);
        self.publish(payload.len());
        Ok(TrySend::Queued)
    }

    /// Non-blocking [`Sender::enqueue_vectored`].
    pub fn try_enqueue_vectored(&mut self, segments: &[&[u8]]) -> RingResult<TrySend> {
        let total = gather_len(segments);
        self.check_len(total)?;
        if !self.is_enqueue_possible() {
            return Ok(TrySend::WouldBlock);
        }
        self.write_gather(segments);
        self.publish(total);
        Ok(TrySend::Queued)
    }

    /// Reserves the cursor slot for in-place writing, spinning until free.
    ///
    /// The grant exposes the slot's payload bytes directly; nothing becomes
    /// visible to the receiver until [`SendGrant::commit`]. Dropping an
    /// uncommitted grant leaves the slot empty and the cursor in place.
    pub fn grant(&mut self) -> SendGrant<'_, 'a> {
        self.wait_empty();
        SendGrant { sender: self }
    }

    /// Non-blocking [`Sender::grant`].
    pub fn try_grant(&mut self) -> Option<SendGrant<'_, 'a>> {
        if !self.is_enqueue_possible() {
            return None;
        }
        Some(SendGrant { sender: self })
    }

    fn check_len(&self, len: usize) -> RingResult<()> {
        if len > self.max_payload {
            return Err(RingError::PayloadTooLarge {
                len,
                max: self.max_payload,
            });
        }
        Ok(())
    }

    fn wait_empty(&self) {
        let header = self.cursor_header();
        while header.status.load(Ordering::Acquire) != STATUS_EMPTY {
            std::hint::spin_loop();
        }
    }

    fn write_single(&mut self, payload: &[u8]) {
        let dst = payload_ptr(self.slots[self.cursor]);
        // SAFETY: the slot is EMPTY and owned by this sender until publish;
        // `payload.len()` was bounds-checked against the slot capacity.
        unsafe { std::ptr::copy_nonoverlapping(payload.as_ptr(), dst, payload.len()) };
    }

    fn write_gather(&mut self, segments: &[&[u8]]) {
        let mut dst = payload_ptr(self.slots[self.cursor]);
        for segment in segments {
            // SAFETY: the summed segment lengths were bounds-checked, so the
            // running destination stays inside the slot's payload area.
            unsafe {
                std::ptr::copy_nonoverlapping(segment.as_ptr(), dst, segment.len());
                dst = dst.add(segment.len());
            }
        }
    }

    /// Makes the written payload visible and advances the cursor. The length
    /// store is ordered before the status store by the release fence on the
    /// status word.
    fn publish(&mut self, len: usize) {
        let header = self.cursor_header();
        header.len.store(len, Ordering::Relaxed);
        header.status.store(STATUS_FULL, Ordering::Release);
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    fn cursor_header(&self) -> &SlotHeader {
        // SAFETY: every cached pointer addresses a live, initialized slot.
        unsafe { slot_header(self.slots[self.cursor]) }
    }
}

/// Reservation of the sender's cursor slot for zero-copy writing.
pub struct SendGrant<'s, 'a> {
    sender: &'s mut Sender<'a>,
}

impl SendGrant<'_, '_> {
    /// Number of bytes the slot can carry.
    pub fn capacity(&self) -> usize {
        self.sender.max_payload
    }

    /// Writable view of the reserved slot's payload area.
    pub fn payload(&mut self) -> &mut [u8] {
        let ptr = payload_ptr(self.sender.slots[self.sender.cursor]);
        // SAFETY: the slot is EMPTY and reserved by this grant; the receiver
        // does not read payload bytes until the status word flips to FULL.
        unsafe { std::slice::from_raw_parts_mut(ptr, self.sender.max_payload) }
    }

    /// Publishes the first `written` bytes of the slot and advances the
    /// sender's cursor.
    ///
    /// # Panics
    ///
    /// Panics if `written` exceeds the slot capacity; the grant handed out a
    /// slice of exactly that capacity, so a larger claim is a logic error.
    pub fn commit(self, written: usize) {
        assert!(
            written <= self.sender.max_payload,
            "committed length {written} exceeds slot capacity {}",
            self.sender.max_payload
        );
        self.sender.publish(written);
    }
}

/// Receiving half of a ring. Strictly process-local.
pub struct Receiver<'a> {
    slots: Box<[NonNull<u8>]>,
    cursor: usize,
    max_payload: usize,
    _region: PhantomData<&'a ()>,
}

// SAFETY: same argument as for `Sender` — shared mapping, protocol-ordered
// access through the status words.
unsafe impl Send for Receiver<'_> {}

impl<'a> Receiver<'a> {
    /// Opens the receiving endpoint of `ring`.
    pub fn open(ring: &Ring<'a>) -> RingResult<Receiver<'a>> {
        Ok(Receiver {
            slots: slot_cache(ring)?,
            cursor: 0,
            max_payload: ring.max_payload(),
            _region: PhantomData,
        })
    }

    /// Largest payload one dequeue can yield.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Whether the very next dequeue would succeed without waiting.
    pub fn is_dequeue_possible(&self) -> bool {
        self.cursor_header().status.load(Ordering::Acquire) == STATUS_FULL
    }

    /// Waits for the cursor slot to fill and returns a borrowed view of it.
    ///
    /// The payload bytes live in the slot itself; the slot is handed back to
    /// the sender when the returned guard is released (or dropped).
    pub fn dequeue(&mut self) -> Received<'_, 'a> {
        let header = self.cursor_header();
        while header.status.load(Ordering::Acquire) != STATUS_FULL {
            std::hint::spin_loop();
        }
        self.received()
    }

    /// Non-blocking [`Receiver::dequeue`]. `None` means the cursor slot is
    /// still empty; nothing is touched.
    pub fn try_dequeue(&mut self) -> Option<Received<'_, 'a>> {
        if !self.is_dequeue_possible() {
            return None;
        }
        Some(self.received())
    }

    fn received(&mut self) -> Received<'_, 'a> {
        // The acquire load that observed FULL orders this length read after
        // the sender's stores.
        let len = self.cursor_header().len.load(Ordering::Relaxed);
        Received { receiver: self, len }
    }

    fn cursor_header(&self) -> &SlotHeader {
        // SAFETY: every cached pointer addresses a live, initialized slot.
        unsafe { slot_header(self.slots[self.cursor]) }
    }
}

/// Borrowed view of one dequeued payload.
///
/// The view pins the receiver: no further dequeue can start while it is
/// alive, and the payload slice cannot outlive it. Dropping the view releases
/// the slot back to the sender and advances the receiver's cursor.
pub struct Received<'r, 'a> {
    receiver: &'r mut Receiver<'a>,
    len: usize,
}

impl Received<'_, '_> {
    /// The payload bytes, in place inside the slot.
    pub fn payload(&self) -> &[u8] {
        let ptr = payload_ptr(self.receiver.slots[self.receiver.cursor]);
        // SAFETY: the slot is FULL and owned by this view until release; the
        // sender does not touch it before observing EMPTY.
        unsafe { std::slice::from_raw_parts(ptr, self.len) }
    }

    /// Stored payload length.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Hands the slot back to the sender. Equivalent to dropping the view;
    /// spelled out so call sites can make the release point explicit.
    pub fn release(self) {}
}

impl Drop for Received<'_, '_> {
    fn drop(&mut self) {
        let header = self.receiver.cursor_header();
        header.len.store(0, Ordering::Relaxed);
        // Orders all payload reads above before the slot changes hands.
        header.status.store(STATUS_EMPTY, Ordering::Release);
        self.receiver.cursor = (self.receiver.cursor + 1) % self.receiver.slots.len();
    }
}

fn slot_cache(ring: &Ring<'_>) -> RingResult<Box<[NonNull<u8>]>> {
    if !ring.is_ready() {
        return Err(RingError::Uninitialized);
    }
    Ok((0..ring.slot_count() as usize)
        .map(|i| ring.slot_base(i))
        .collect())
}

/// # Safety
///
/// `slot` must address a live, initialized slot inside a mapped ring.
unsafe fn slot_header<'x>(slot: NonNull<u8>) -> &'x SlotHeader {
    // SAFETY: forwarded from the caller.
    unsafe { &*(slot.as_ptr() as *const SlotHeader) }
}

fn payload_ptr(slot: NonNull<u8>) -> *mut u8 {
    // SAFETY: the payload area begins right after the slot header, in bounds
    // for the slot stride.
    unsafe { slot.as_ptr().add(size_of::<SlotHeader>()) }
}

fn gather_len(segments: &[&[u8]]) -> usize {
    segments.iter().map(|s| s.len()).sum()
}
