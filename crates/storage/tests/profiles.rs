#![forbid(unsafe_code)]

mod common;

use cms_core::ids::SubjectId;
use cms_storage::{ErrorKind, StoreError};
use common::*;
use serde_json::json;

fn subject(value: i64) -> SubjectId {
    SubjectId::try_new(value).expect("subject id")
}

#[test]
fn profile_round_trip_keeps_email() {
    let (_dir, config) = storage();
    let mut manager = open(&config);

    let created = manager
        .create_profile(subject(10), "reader@example.org", json!({"display_name": "Reader"}))
        .expect("create profile");
    assert_eq!(created.email, "reader@example.org");

    let loaded = manager.get_profile(subject(10)).expect("get profile");
    assert_eq!(loaded, created);

    let data = json!({"display_name": "Renamed", "links": ["https://example.org"]});
    let updated = manager
        .update_profile(subject(10), data.clone())
        .expect("update profile");
    assert_eq!(updated.email, "reader@example.org");
    assert_eq!(updated.data, data);
    assert_eq!(manager.get_profile(subject(10)).expect("get again"), updated);
}

#[test]
fn unknown_subject_is_not_found() {
    let (_dir, config) = storage();
    let mut manager = open(&config);

    let err = manager.get_profile(subject(99)).expect_err("missing profile");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = manager
        .update_profile(subject(99), json!({}))
        .expect_err("missing profile update");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(count(&raw_db(&config), "profiles"), 0);
}

#[test]
fn profile_data_must_be_an_object() {
    let (_dir, config) = storage();
    let mut manager = open(&config);
    manager
        .create_profile(subject(1), "a@example.org", json!({}))
        .expect("create profile");

    let err = manager
        .update_profile(subject(1), json!(["not", "an", "object"]))
        .expect_err("array data");
    assert!(matches!(err, StoreError::InvalidInput(_)), "unexpected error: {err:?}");
    assert_eq!(manager.get_profile(subject(1)).expect("get").data, json!({}));
}

#[test]
fn duplicate_profile_is_rejected() {
    let (_dir, config) = storage();
    let mut manager = open(&config);
    manager
        .create_profile(subject(1), "a@example.org", json!({}))
        .expect("create profile");

    let err = manager
        .create_profile(subject(1), "b@example.org", json!({}))
        .expect_err("same subject");
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = manager
        .create_profile(subject(2), "a@example.org", json!({}))
        .expect_err("same email");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(count(&raw_db(&config), "profiles"), 1);
}
