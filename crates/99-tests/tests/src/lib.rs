//! End-to-end scenarios shared by the workspace integration tests.
//!
//! Each scenario takes the backend to exercise, so the parity suite can run
//! the same behavior across every mechanism and expect identical results.
//! "Two processes" is modeled as two mappings of the same OS object inside
//! one process: the attach path goes through the real contact token and the
//! real OS namespace, and the two mappings land at different addresses, so
//! everything but the pid boundary is exercised.

use shm_fabric::{
    attach_duplex, create_duplex, create_ring_at, open_ring_at, BackendKind, ContactToken,
    DuplexPlan, Receiver, RegionManager, RingSpec, Sender, TrySend,
};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

#[cfg(test)]
mod backend_parity;
#[cfg(test)]
mod ping_pong_rounds;
#[cfg(test)]
mod region_lifecycle;
#[cfg(test)]
mod ring_scenarios;

/// Every compiled-in backend, for parity sweeps.
pub fn all_backends() -> [BackendKind; 3] {
    [
        BackendKind::FileMapping,
        BackendKind::SysV,
        BackendKind::PosixShm,
    ]
}

/// Extracts the OS path/name out of a name-shaped contact token.
pub fn token_name(token: &ContactToken) -> PathBuf {
    let bytes = token.as_bytes();
    let nul = bytes
        .iter()
        .position(|&b| b == 0)
        .expect("name-shaped token");
    PathBuf::from(String::from_utf8(bytes[..nul].to_vec()).expect("utf8 name"))
}

/// S1 — create/attach/destroy round trip.
///
/// The creator writes a marker byte, the attacher observes it through its
/// own mapping, and after destroy the old token no longer attaches.
pub fn region_round_trip(kind: BackendKind) {
    let mut mgr = RegionManager::new(kind).expect("init manager");
    let mut region = mgr.create(4096, None).expect("create region");
    region.as_mut_slice()[0] = 0xAB;

    let token = mgr.contact(&region).expect("contact");
    let peer = mgr.attach(None, &token, 4096, None).expect("attach");
    assert_eq!(peer.as_slice()[0], 0xAB, "attached mapping mirrors creator");
    assert_ne!(peer.as_ptr(), region.as_ptr(), "mappings are independent");
    mgr.detach(peer).expect("detach");

    mgr.destroy(region).expect("destroy");
    assert!(
        mgr.attach(None, &token, 4096, None).is_err(),
        "token must go stale once the OS object is removed"
    );
}

/// Ownership discipline: destroy by a non-creator leaves the object alive.
pub fn non_creator_destroy_degrades(kind: BackendKind) {
    let mut creator = RegionManager::new(kind).expect("init creator");
    let mut region = creator.create(4096, None).expect("create region");
    region.as_mut_slice()[0] = 0x77;
    let token = creator.contact(&region).expect("contact");

    let mut other = RegionManager::new(kind).expect("init attacher");
    let foreign = other.attach(Some(1), &token, 4096, None).expect("attach");
    other.destroy(foreign).expect("destroy degrades to detach");

    // The object must still be attachable afterwards.
    let again = other.attach(None, &token, 4096, None).expect("re-attach");
    assert_eq!(again.as_slice()[0], 0x77);
    other.detach(again).expect("detach");

    creator.destroy(region).expect("creator destroy");
}

/// S3 — a gather enqueue crosses the mapping boundary as one payload.
pub fn gather(kind: BackendKind) {
    let spec = RingSpec {
        slot_count: 4,
        max_payload: 128,
    };
    let mut mgr = RegionManager::new(kind).expect("init manager");
    let footprint = spec.footprint().expect("footprint");
    let region = mgr.create(footprint, None).expect("create region");
    let token = mgr.contact(&region).expect("contact");

    let ring = create_ring_at(&region, 0, spec).expect("create ring");
    let mut tx = Sender::open(&ring).expect("open sender");

    let peer_region = mgr.attach(None, &token, footprint, None).expect("attach");
    let peer_ring = open_ring_at(&peer_region, 0).expect("open ring");
    let mut rx = Receiver::open(&peer_ring).expect("open receiver");

    let a = vec![b'x'; 10];
    let b = vec![b'y'; 20];
    let c = vec![b'z'; 30];
    tx.enqueue_vectored(&[&a, &b, &c]).expect("gather enqueue");

    {
        let view = rx.dequeue();
        assert_eq!(view.len(), 60);
        let mut expected = a.clone();
        expected.extend_from_slice(&b);
        expected.extend_from_slice(&c);
        assert_eq!(view.payload(), expected.as_slice());
    }

    drop((tx, rx));
    mgr.detach(peer_region).expect("detach");
    mgr.destroy(region).expect("destroy");
}

/// S4 — back-pressure: N un-released enqueues fill the ring; the blocked
/// sender resumes as soon as the receiver releases one slot.
pub fn backpressure(kind: BackendKind) {
    let spec = RingSpec {
        slot_count: 4,
        max_payload: 64,
    };
    let mut mgr = RegionManager::new(kind).expect("init manager");
    let footprint = spec.footprint().expect("footprint");
    let region = mgr.create(footprint, None).expect("create region");
    let token = mgr.contact(&region).expect("contact");

    let ring = create_ring_at(&region, 0, spec).expect("create ring");
    let mut tx = Sender::open(&ring).expect("open sender");

    let peer_region = mgr.attach(None, &token, footprint, None).expect("attach");
    let peer_ring = open_ring_at(&peer_region, 0).expect("open ring");
    let mut rx = Receiver::open(&peer_ring).expect("open receiver");

    for i in 0..4u8 {
        tx.enqueue(&[i; 8]).expect("fill ring");
    }
    assert!(!tx.is_enqueue_possible());
    assert_eq!(
        tx.try_enqueue(b"fifth").expect("in-bounds payload"),
        TrySend::WouldBlock
    );

    thread::scope(|scope| {
        scope.spawn(|| {
            // Give the sender time to park in its spin loop first.
            thread::sleep(Duration::from_millis(50));
            let view = rx.dequeue();
            assert_eq!(view.payload(), &[0u8; 8]);
        });
        tx.enqueue(b"fifth").expect("unblocks after one release");
    });

    for expected in [[1u8; 8].as_slice(), &[2; 8], &[3; 8], b"fifth"] {
        let view = rx.dequeue();
        assert_eq!(view.payload(), expected);
    }

    drop((tx, rx));
    mgr.detach(peer_region).expect("detach");
    mgr.destroy(region).expect("destroy");
}

/// S5 — an oversize payload fails without disturbing either endpoint.
pub fn oversize(kind: BackendKind) {
    let spec = RingSpec {
        slot_count: 4,
        max_payload: 64,
    };
    let mut mgr = RegionManager::new(kind).expect("init manager");
    let footprint = spec.footprint().expect("footprint");
    let region = mgr.create(footprint, None).expect("create region");
    let token = mgr.contact(&region).expect("contact");

    let ring = create_ring_at(&region, 0, spec).expect("create ring");
    let mut tx = Sender::open(&ring).expect("open sender");

    let peer_region = mgr.attach(None, &token, footprint, None).expect("attach");
    let peer_ring = open_ring_at(&peer_region, 0).expect("open ring");
    let mut rx = Receiver::open(&peer_ring).expect("open receiver");

    let oversize = vec![0u8; 65];
    assert!(tx.enqueue(&oversize).is_err());
    assert!(
        !rx.is_dequeue_possible(),
        "failed enqueue must not publish anything"
    );

    // The cursor did not advance: the next good payload lands in slot 0.
    tx.enqueue(b"first").expect("enqueue after error");
    {
        let view = rx.dequeue();
        assert_eq!(view.payload(), b"first");
    }

    drop((tx, rx));
    mgr.detach(peer_region).expect("detach");
    mgr.destroy(region).expect("destroy");
}

/// S2 — ping-pong over a duplex pair, `iterations` round trips.
pub fn ping_pong(kind: BackendKind, iterations: usize) {
    let spec = RingSpec {
        slot_count: 5,
        max_payload: 2048,
    };
    let plan = DuplexPlan::new(spec).expect("plan");
    let total = plan.end().expect("end");

    let mut mgr = RegionManager::new(kind).expect("init manager");
    let region = mgr.create(total, None).expect("create region");
    let token = mgr.contact(&region).expect("contact");
    let mut creator = create_duplex(&region, &plan).expect("create duplex");

    thread::scope(|scope| {
        let token = &token;
        scope.spawn(move || {
            let mut peer_mgr = RegionManager::new(kind).expect("init peer manager");
            let peer_region = peer_mgr
                .attach(None, token, total, None)
                .expect("attach region");
            let mut peer = attach_duplex(&peer_region, &plan).expect("attach duplex");

            for _ in 0..iterations {
                {
                    let view = peer.rx.dequeue();
                    assert_eq!(view.len(), 16);
                    assert_eq!(view.payload(), &[b'a'; 16]);
                }
                peer.tx.enqueue(&[b'b'; 16]).expect("send pong");
            }

            drop(peer);
            peer_mgr.detach(peer_region).expect("detach");
        });

        for _ in 0..iterations {
            creator.tx.enqueue(&[b'a'; 16]).expect("send ping");
            let view = creator.rx.dequeue();
            assert_eq!(view.len(), 16);
            assert_eq!(view.payload(), &[b'b'; 16]);
        }
    });

    drop(creator);
    mgr.destroy(region).expect("destroy");
}
