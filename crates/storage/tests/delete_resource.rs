#![forbid(unsafe_code)]

mod common;

use cms_core::model::Action;
use cms_storage::{BlobStore, CleanupPolicy, ErrorKind, PolicyStore, StoreError};
use common::*;

#[test]
fn delete_removes_rows_blobs_and_grants() {
    let (_dir, config) = storage();
    let mut manager = open(&config);
    let owner = ctx(4, 2);
    let request = article(manager.blobs(), "d", &[0, 1], true);
    let uuid = manager.create(&owner, request).expect("create");

    let outcome = manager.delete(&owner, &uuid).expect("delete");
    assert!(outcome.success);

    assert_eq!(footprint(&raw_db(&config)), [0, 0, 0, 0]);
    for path in ["d/att-0.bin", "d/att-1.bin", "d/primary.bin"] {
        assert!(!blob_exists(manager.blobs(), path), "{path} survived");
    }
    assert!(manager
        .policies()
        .resource_policies(&uuid.to_string())
        .expect("policies")
        .is_empty());
    assert!(!manager.authorize(&owner, &uuid, Action::Read).expect("authorize"));

    let err = manager.get(&owner, &uuid).expect_err("gone");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = manager.delete(&owner, &uuid).expect_err("second delete");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn resource_without_primary_deletes_cleanly() {
    let (_dir, config) = storage();
    let mut manager = open(&config);
    let owner = ctx(1, 1);
    let request = article(manager.blobs(), "np", &[3], false);
    let uuid = manager.create(&owner, request).expect("create");

    manager.delete(&owner, &uuid).expect("delete");
    assert!(!blob_exists(manager.blobs(), "np/att-3.bin"));
    assert_eq!(footprint(&raw_db(&config)), [0, 0, 0, 0]);
}

#[test]
fn strict_delete_rolls_back_when_a_blob_is_missing() {
    let (_dir, config) = storage();
    let mut manager = open(&config);
    let owner = ctx(1, 1);
    let request = article(manager.blobs(), "sd", &[0, 1], true);
    let uuid = manager.create(&owner, request).expect("create");
    manager.blobs().delete("sd/att-1.bin").expect("remove blob");

    let err = manager.delete(&owner, &uuid).expect_err("strict delete");
    assert!(err.is_missing_blob(), "unexpected error: {err:?}");

    let resource = manager.get(&owner, &uuid).expect("still readable");
    assert_eq!(resource.attachments.len(), 2);
    assert!(blob_exists(manager.blobs(), "sd/att-0.bin"));
    assert!(blob_exists(manager.blobs(), "sd/primary.bin"));
    assert_eq!(footprint(&raw_db(&config)), [1, 2, 2, 1]);
    assert!(manager.authorize(&owner, &uuid, Action::Delete).expect("authorize"));
}

#[test]
fn best_effort_delete_tolerates_a_missing_blob() {
    let (_dir, mut config) = storage();
    config.cleanup.delete = CleanupPolicy::BestEffort;
    let mut manager = open(&config);
    let owner = ctx(1, 1);
    let request = article(manager.blobs(), "be", &[0, 1], true);
    let uuid = manager.create(&owner, request).expect("create");
    manager.blobs().delete("be/primary.bin").expect("remove blob");

    assert!(manager.delete(&owner, &uuid).expect("delete").success);
    assert_eq!(footprint(&raw_db(&config)), [0, 0, 0, 0]);
    assert!(!blob_exists(manager.blobs(), "be/att-0.bin"));
}

#[test]
fn foreign_owner_cannot_delete() {
    let (_dir, config) = storage();
    let mut manager = open(&config);
    let owner = ctx(1, 1);
    let request = article(manager.blobs(), "fd", &[0], true);
    let uuid = manager.create(&owner, request).expect("create");

    let err = manager.delete(&ctx(2, 1), &uuid).expect_err("foreign delete");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(manager.get(&owner, &uuid).is_ok());
    assert!(blob_exists(manager.blobs(), "fd/att-0.bin"));
    assert_eq!(
        manager
            .policies()
            .resource_policies(&uuid.to_string())
            .expect("policies")
            .len(),
        3
    );
}

#[test]
fn failed_revocation_is_reported_and_swept_by_reconcile() {
    let (_dir, config) = storage();
    let (mut manager, faults) = open_flaky(&config);
    let owner = ctx(3, 3);
    let request = article(manager.blobs(), "rv", &[0], false);
    let uuid = manager.create(&owner, request).expect("create");

    faults.fail_revokes(true);
    let err = manager.delete(&owner, &uuid).expect_err("revocation fails");
    match &err {
        StoreError::PartialConsistency { uuid: reported, .. } => assert_eq!(*reported, uuid),
        other => panic!("expected PartialConsistency, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::PartialConsistency);
    assert_eq!(footprint(&raw_db(&config)), [0, 0, 0, 0]);
    assert_eq!(
        manager
            .policies()
            .resource_policies(&uuid.to_string())
            .expect("policies")
            .len(),
        3
    );

    faults.fail_revokes(false);
    let report = manager.reconcile().expect("reconcile");
    assert_eq!(report.scanned, 0);
    assert_eq!(report.revoked_stale, 3);
    assert!(manager.policies().resources().expect("resources").is_empty());
}

#[test]
fn blobs_referenced_by_another_resource_are_kept() {
    let (_dir, config) = storage();
    let mut manager = open(&config);
    let owner = ctx(2, 1);
    let request = article(manager.blobs(), "own", &[0], true);
    let doomed = manager.create(&owner, request).expect("create");

    let mut request = article(manager.blobs(), "other", &[], false);
    request.primary = Some(primary(manager.blobs(), "own/att-0.bin"));
    request.attachments = vec![attachment(manager.blobs(), 0, "own/primary.bin")];
    let survivor = manager.create(&owner, request).expect("create survivor");

    manager.delete(&owner, &doomed).expect("delete");
    assert!(blob_exists(manager.blobs(), "own/att-0.bin"));
    assert!(blob_exists(manager.blobs(), "own/primary.bin"));
    assert_eq!(footprint(&raw_db(&config)), [1, 1, 1, 1]);

    manager.delete(&owner, &survivor).expect("delete survivor");
    assert!(!blob_exists(manager.blobs(), "own/att-0.bin"));
    assert!(!blob_exists(manager.blobs(), "own/primary.bin"));
}
