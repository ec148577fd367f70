//! Ring protocol scenarios across two mappings of one region.

use crate::{backpressure, gather, oversize};
use rand::prelude::*;
use shm_fabric::{
    create_ring_at, open_ring_at, BackendKind, Receiver, RegionManager, RingSpec, Sender,
};
use std::collections::VecDeque;

#[test]
fn gather_file_mapping() {
    gather(BackendKind::FileMapping);
}

#[test]
fn backpressure_file_mapping() {
    backpressure(BackendKind::FileMapping);
}

#[test]
fn oversize_file_mapping() {
    oversize(BackendKind::FileMapping);
}

/// Randomized cross-mapping stress: a concurrent sender and receiver agree
/// on every payload, with the receiver reading through its own attachment.
#[test]
fn cross_mapping_randomized_stream() {
    const SLOTS: u32 = 8;
    const MAX: usize = 512;
    const MESSAGES: usize = 40_000;

    let spec = RingSpec {
        slot_count: SLOTS,
        max_payload: MAX,
    };
    let mut mgr = RegionManager::new(BackendKind::FileMapping).expect("init manager");
    let footprint = spec.footprint().expect("footprint");
    let region = mgr.create(footprint, None).expect("create region");
    let token = mgr.contact(&region).expect("contact");

    let ring = create_ring_at(&region, 0, spec).expect("create ring");
    let mut tx = Sender::open(&ring).expect("open sender");

    let peer_region = mgr.attach(None, &token, footprint, None).expect("attach");
    let peer_ring = open_ring_at(&peer_region, 0).expect("open ring");
    let mut rx = Receiver::open(&peer_ring).expect("open receiver");

    // Both sides derive the same payload sequence from the same seed, so no
    // side channel is needed to agree on expectations.
    let payloads = |seed: u64| {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..MESSAGES)
            .map(|_| {
                let len = rng.gen_range(1..=MAX);
                let mut payload = vec![0u8; len];
                rng.fill_bytes(&mut payload);
                payload
            })
            .collect::<VecDeque<_>>()
    };

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for payload in payloads(0xFEED) {
                tx.enqueue(&payload).expect("enqueue");
            }
        });
        for expected in payloads(0xFEED) {
            let view = rx.dequeue();
            assert_eq!(view.payload(), expected.as_slice());
        }
    });

    drop((tx, rx));
    mgr.detach(peer_region).expect("detach");
    mgr.destroy(region).expect("destroy");
}
