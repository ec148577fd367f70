//! Region lifecycle scenarios on the file-mapping backend, including the
//! namespace checks only this backend can express through plain paths.

use crate::{non_creator_destroy_degrades, region_round_trip, token_name};
use shm_fabric::{BackendKind, RegionManager, RegionName};

#[test]
fn round_trip_file_mapping() {
    region_round_trip(BackendKind::FileMapping);
}

#[test]
fn non_creator_destroy_file_mapping() {
    non_creator_destroy_degrades(BackendKind::FileMapping);
}

/// The backing file exists while the region lives and is unlinked by
/// destroy.
#[test]
fn destroy_unlinks_backing_file() {
    let mut mgr = RegionManager::new(BackendKind::FileMapping).expect("init manager");
    let region = mgr.create(4096, None).expect("create");
    let token = mgr.contact(&region).expect("contact");
    let path = token_name(&token);

    assert!(path.exists(), "backing file present while mapped");
    let name = path
        .file_name()
        .expect("file name")
        .to_string_lossy()
        .into_owned();
    assert!(
        name.starts_with(&format!("df_shm_mmap.{}.", std::process::id())),
        "backing file follows the name template: {name}"
    );

    mgr.destroy(region).expect("destroy");
    assert!(!path.exists(), "destroy unlinks the backing file");
}

/// Finalize reaps regions whose handles were never returned.
#[test]
fn finalize_cleans_leftover_regions() {
    let mut mgr = RegionManager::new(BackendKind::FileMapping).expect("init manager");
    let region = mgr.create(4096, None).expect("create");
    let token = mgr.contact(&region).expect("contact");
    let path = token_name(&token);

    std::mem::forget(region);
    mgr.finalize();
    assert!(!path.exists(), "finalize destroys leftover created regions");
}

/// Named regions replace an existing file rather than failing.
#[test]
fn named_create_replaces_existing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("replaceable");
    std::fs::write(&path, b"previous contents that should disappear").expect("seed file");

    let mut mgr = RegionManager::new(BackendKind::FileMapping).expect("init manager");
    let region = mgr
        .create_named(&RegionName::Path(&path), 4096, None)
        .expect("create named over existing file");
    assert!(
        region.as_slice().iter().all(|&b| b == 0),
        "replaced region starts zeroed"
    );
    mgr.destroy(region).expect("destroy");
}
