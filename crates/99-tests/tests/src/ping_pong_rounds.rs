//! Two-ring ping-pong between a creator thread and an attacher thread, each
//! driving its own mapping of the shared region.

use crate::ping_pong;
use shm_fabric::BackendKind;

#[test]
fn ping_pong_file_mapping() {
    ping_pong(BackendKind::FileMapping, 50_000);
}

/// Full-length latency scenario; run with `--ignored` when there is time.
#[test]
#[ignore]
fn slow_ping_pong_million_rounds() {
    ping_pong(BackendKind::FileMapping, 1_000_000);
}
