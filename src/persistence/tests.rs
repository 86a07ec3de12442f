use std::time::Duration;

use chrono::Utc;
use tempfile::tempdir;
use tokio::time::Instant;

use super::{DeviceStore, SledStore};
use crate::registry::{Attribute, Device, DeviceFilter, DeviceReport, Liveness, UserData};
use crate::utils::{InternalError, RegistryError};

fn device(id: &str, reference: &str, kind: &str) -> Device {
    Device::from_report(
        DeviceReport {
            id: id.to_string(),
            reference: reference.to_string(),
            name: format!("name-{id}"),
            liveness: Liveness::Online,
            kind: kind.to_string(),
            attributes: vec![Attribute::new("a", "b")],
        },
        Utc::now(),
    )
}

fn soon() -> Instant {
    Instant::now() + Duration::from_secs(5)
}

#[tokio::test]
async fn test_create_and_read() {
    let dir = tempdir().unwrap();
    let store = SledStore::open(dir.path()).unwrap();

    let d = device("1", "r1", "sensor");
    store.create(d.clone(), soon()).await.unwrap();

    let read = store.read("1").await.unwrap();
    assert_eq!(read, d);
}

#[tokio::test]
async fn test_create_duplicate_fails() {
    let store = SledStore::temporary().unwrap();
    store.create(device("1", "r1", "sensor"), soon()).await.unwrap();
    let err = store.create(device("1", "r2", "sensor"), soon()).await.unwrap_err();
    assert!(matches!(err, RegistryError::InvalidInput(_)));
}

#[tokio::test]
async fn test_read_missing_is_not_found() {
    let store = SledStore::temporary().unwrap();
    let err = store.read("nope").await.unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));
}

#[tokio::test]
async fn test_read_all_filters() {
    let store = SledStore::temporary().unwrap();
    store.create(device("1", "r1", "sensor"), soon()).await.unwrap();
    store.create(device("2", "r1", "lamp"), soon()).await.unwrap();
    store.create(device("3", "r2", "sensor"), soon()).await.unwrap();

    let all = store.read_all(&DeviceFilter::default()).await.unwrap();
    assert_eq!(all.keys().collect::<Vec<_>>(), vec!["1", "2", "3"]);

    let by_ref = store
        .read_all(&DeviceFilter {
            reference: Some("r1".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_ref.keys().collect::<Vec<_>>(), vec!["1", "2"]);

    let by_ref_and_kind = store
        .read_all(&DeviceFilter {
            reference: Some("r1".into()),
            kind: Some("sensor".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_ref_and_kind.keys().collect::<Vec<_>>(), vec!["1"]);

    let by_ids = store
        .read_all(&DeviceFilter {
            ids: vec!["3".into(), "3".into(), "missing".into(), "1".into()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_ids.keys().collect::<Vec<_>>(), vec!["1", "3"]);
}

#[tokio::test]
async fn test_update_keeps_user_data_and_moves_reference() {
    let store = SledStore::temporary().unwrap();
    store.create(device("1", "r1", "sensor"), soon()).await.unwrap();

    let annotation = UserData {
        name: "kitchen".into(),
        attributes: vec![Attribute::new("room", "kitchen")],
        updated: Some(Utc::now()),
    };
    store.update_user_data("1", annotation.clone(), soon()).await.unwrap();

    let mut changed = device("1", "r2", "sensor");
    changed.name = "renamed".into();
    store.update(changed, soon()).await.unwrap();

    let read = store.read("1").await.unwrap();
    assert_eq!(read.name, "renamed");
    assert_eq!(read.reference, "r2");
    assert_eq!(read.user_data, annotation);

    let old_ref = store
        .read_all(&DeviceFilter {
            reference: Some("r1".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(old_ref.is_empty());
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let store = SledStore::temporary().unwrap();
    let err = store.update(device("1", "r1", "sensor"), soon()).await.unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));

    let err = store
        .update_user_data("1", UserData::default(), soon())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));
}

#[tokio::test]
async fn test_update_liveness_by_reference() {
    let store = SledStore::temporary().unwrap();
    store.create(device("1", "r1", "sensor"), soon()).await.unwrap();
    store.create(device("2", "r1", "sensor"), soon()).await.unwrap();
    store.create(device("3", "r2", "sensor"), soon()).await.unwrap();

    let now = Utc::now();
    let changed = store
        .update_liveness("r1", Liveness::Offline, now, soon())
        .await
        .unwrap();
    assert_eq!(changed, 2);

    assert_eq!(store.read("1").await.unwrap().liveness, Liveness::Offline);
    assert_eq!(store.read("2").await.unwrap().updated, Some(now));
    assert_eq!(store.read("3").await.unwrap().liveness, Liveness::Online);

    let none = store
        .update_liveness("unknown-ref", Liveness::Offline, now, soon())
        .await
        .unwrap();
    assert_eq!(none, 0);
}

#[tokio::test]
async fn test_delete_removes_index() {
    let store = SledStore::temporary().unwrap();
    store.create(device("1", "r1", "sensor"), soon()).await.unwrap();
    store.delete("1", soon()).await.unwrap();

    assert!(matches!(
        store.read("1").await.unwrap_err(),
        RegistryError::NotFound(_)
    ));
    assert_eq!(
        store
            .update_liveness("r1", Liveness::Offline, Utc::now(), soon())
            .await
            .unwrap(),
        0
    );
    assert!(matches!(
        store.delete("1", soon()).await.unwrap_err(),
        RegistryError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_writes_past_commit_by_are_aborted() {
    let store = SledStore::temporary().unwrap();
    let original = device("1", "r1", "sensor");
    store.create(original.clone(), soon()).await.unwrap();

    let passed = Instant::now();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let timed_out = |err: RegistryError| matches!(err, RegistryError::Internal(InternalError::Timeout));
    assert!(timed_out(
        store.create(device("2", "r1", "sensor"), passed).await.unwrap_err()
    ));
    assert!(timed_out(
        store.update(device("1", "r2", "lamp"), passed).await.unwrap_err()
    ));
    assert!(timed_out(
        store
            .update_user_data("1", UserData::default(), passed)
            .await
            .unwrap_err()
    ));
    assert!(timed_out(
        store
            .update_liveness("r1", Liveness::Offline, Utc::now(), passed)
            .await
            .unwrap_err()
    ));
    assert!(timed_out(store.delete("1", passed).await.unwrap_err()));

    // nothing above was committed
    assert!(matches!(
        store.read("2").await.unwrap_err(),
        RegistryError::NotFound(_)
    ));
    assert_eq!(store.read("1").await.unwrap(), original);
    let by_ref = store
        .read_all(&DeviceFilter {
            reference: Some("r1".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_ref.keys().collect::<Vec<_>>(), vec!["1"]);
}
