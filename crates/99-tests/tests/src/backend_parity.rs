//! Every backend runs the shared scenario suite with identical results.
//!
//! One test per backend so the mechanisms never race each other: SysV keys
//! and POSIX names derive from the pid plus a per-manager counter, so
//! concurrent creating managers of one kind would collide.

use crate::{
    backpressure, gather, non_creator_destroy_degrades, oversize, ping_pong, region_round_trip,
};
use shm_fabric::BackendKind;

fn run_suite(kind: BackendKind) {
    region_round_trip(kind);
    non_creator_destroy_degrades(kind);
    gather(kind);
    backpressure(kind);
    oversize(kind);
    ping_pong(kind, 10_000);
}

#[test]
fn parity_file_mapping() {
    run_suite(BackendKind::FileMapping);
}

#[test]
fn parity_sysv() {
    run_suite(BackendKind::SysV);
}

#[test]
fn parity_posix_shm() {
    run_suite(BackendKind::PosixShm);
}
