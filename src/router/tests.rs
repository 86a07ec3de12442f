use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::persistence::SledStore;
use crate::registry::{Deadline, DeviceRegistry, Liveness, LivenessStorage};
use crate::relay::MessageRelay;
use crate::topic::Topics;
use crate::transport::InboundMessage;
use crate::utils::{RegistryError, RouteError};

fn setup(mode: LivenessStorage) -> (Arc<DeviceRegistry<SledStore>>, MessageRouter<SledStore>) {
    let registry = Arc::new(DeviceRegistry::new(
        SledStore::temporary().unwrap(),
        Duration::from_secs(5),
        mode,
    ));
    let router = MessageRouter::new(Arc::clone(&registry), Topics::default());
    (registry, router)
}

fn set_message(reference: &str, id: &str, state: &str) -> InboundMessage {
    let payload = json!({
        "method": "set",
        "device_id": id,
        "data": {
            "name": "t",
            "state": state,
            "device_type": "sensor",
            "attributes": [{"key": "fw", "value": "1.2"}]
        }
    });
    InboundMessage::new(
        format!("device-manager/device/{reference}"),
        payload.to_string(),
    )
}

#[test]
fn test_decode_device_event() {
    let raw = r#"{"method":"set","device_id":"123","data":{"name":"t","state":"online","device_type":"sensor","attributes":[]}}"#;
    let event: DeviceEvent = serde_json::from_str(raw).unwrap();
    assert_eq!(event.method, "set");
    assert_eq!(event.device_id, "123");
    let data = event.data.unwrap();
    assert_eq!(data.kind, "sensor");
    assert_eq!(data.state, "online");

    let delete: DeviceEvent = serde_json::from_str(r#"{"method":"delete","device_id":"9"}"#).unwrap();
    assert!(delete.data.is_none());
}

#[test]
fn test_event_data_into_report() {
    let data = DeviceEventData {
        name: "t".into(),
        state: String::new(),
        kind: "sensor".into(),
        attributes: Vec::new(),
    };
    let report = data.into_report("1".into(), "ref1").unwrap();
    assert_eq!(report.reference, "ref1");
    assert_eq!(report.liveness, Liveness::Unknown);

    let bad = DeviceEventData {
        state: "sleeping".into(),
        ..Default::default()
    };
    assert!(matches!(
        bad.into_report("1".into(), "ref1"),
        Err(RegistryError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_set_then_last_will() {
    for mode in [LivenessStorage::Transient, LivenessStorage::Persisted] {
        let (registry, router) = setup(mode);

        router.handle(set_message("ref1", "123", "online")).await.unwrap();
        let device = registry.get(Deadline::none(), "123").await.unwrap();
        assert_eq!(device.reference, "ref1");
        assert_eq!(device.liveness, Liveness::Online);
        assert_eq!(device.kind, "sensor");

        router
            .handle(InboundMessage::new("device-manager/device/ref1/lw", ""))
            .await
            .unwrap();
        let device = registry.get(Deadline::none(), "123").await.unwrap();
        assert_eq!(device.liveness, Liveness::Offline);
    }
}

#[tokio::test]
async fn test_last_will_without_devices_succeeds() {
    let (_registry, router) = setup(LivenessStorage::Transient);
    router
        .handle(InboundMessage::new("device-manager/device/nobody/lw", "ignored"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_message() {
    let (registry, router) = setup(LivenessStorage::Transient);
    router.handle(set_message("ref1", "7", "online")).await.unwrap();

    let delete = InboundMessage::new(
        "device-manager/device/ref1",
        json!({"method": "delete", "device_id": "7"}).to_string(),
    );
    router.handle(delete.clone()).await.unwrap();
    assert!(matches!(
        registry.get(Deadline::none(), "7").await.unwrap_err(),
        RegistryError::NotFound(_)
    ));

    let err = router.handle(delete).await.unwrap_err();
    assert!(matches!(
        err,
        RouteError::Registry(RegistryError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_set_without_data_is_dropped() {
    let (registry, router) = setup(LivenessStorage::Transient);
    let message = InboundMessage::new(
        "device-manager/device/ref1",
        json!({"method": "set", "device_id": "1"}).to_string(),
    );
    assert!(matches!(
        router.handle(message).await.unwrap_err(),
        RouteError::MissingData
    ));

    let message = InboundMessage::new(
        "device-manager/device/ref1",
        json!({"method": "set", "device_id": "1", "data": null}).to_string(),
    );
    assert!(matches!(
        router.handle(message).await.unwrap_err(),
        RouteError::MissingData
    ));
    assert!(registry.get(Deadline::none(), "1").await.is_err());
}

#[tokio::test]
async fn test_bad_messages_are_rejected() {
    let (registry, router) = setup(LivenessStorage::Transient);

    let garbage = InboundMessage::new("device-manager/device/ref1", "{not json");
    assert!(matches!(
        router.handle(garbage).await.unwrap_err(),
        RouteError::Decode(_)
    ));

    let unknown = InboundMessage::new(
        "device-manager/device/ref1",
        json!({"method": "reboot", "device_id": "1"}).to_string(),
    );
    match router.handle(unknown).await.unwrap_err() {
        RouteError::UnknownMethod(method) => assert_eq!(method, "reboot"),
        other => panic!("unexpected error {other:?}"),
    }

    let unmatched = InboundMessage::new("device-manager/other/ref1", "{}");
    assert!(matches!(
        router.handle(unmatched).await.unwrap_err(),
        RouteError::UnmatchedTopic(_)
    ));

    let invalid = set_message("ref1", "", "online");
    assert!(matches!(
        router.handle(invalid).await.unwrap_err(),
        RouteError::Registry(RegistryError::InvalidInput(_))
    ));

    let bad_state = set_message("ref1", "1", "sleeping");
    assert!(matches!(
        router.handle(bad_state).await.unwrap_err(),
        RouteError::Registry(RegistryError::InvalidInput(_))
    ));

    let all = registry
        .list(Deadline::none(), &Default::default())
        .await
        .unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn test_custom_prefix() {
    let registry = Arc::new(DeviceRegistry::new(
        SledStore::temporary().unwrap(),
        Duration::from_secs(5),
        LivenessStorage::Transient,
    ));
    let router = MessageRouter::new(Arc::clone(&registry), Topics::new("site-a/"));
    assert_eq!(router.topics().devices, "site-a/device/+");

    let mut message = set_message("ref1", "1", "online");
    message.topic = "site-a/device/ref1".into();
    router.handle(message).await.unwrap();
    assert!(registry.get(Deadline::none(), "1").await.is_ok());

    let stale = set_message("ref1", "2", "online");
    assert!(matches!(
        router.handle(stale).await.unwrap_err(),
        RouteError::UnmatchedTopic(_)
    ));
}

#[tokio::test]
async fn test_relay_feeds_router_in_order() {
    let (registry, router) = setup(LivenessStorage::Transient);
    let router = Arc::new(router);

    let relay = MessageRelay::new(16, move |message| {
        let router = Arc::clone(&router);
        async move { router.handle(message).await }
    });
    relay.start();

    relay.put(set_message("ref1", "123", "online")).unwrap();
    relay
        .put(InboundMessage::new("device-manager/unknown", "x"))
        .unwrap();
    relay
        .put(InboundMessage::new("device-manager/device/ref1/lw", ""))
        .unwrap();
    relay.stop().await;

    let device = registry.get(Deadline::none(), "123").await.unwrap();
    assert_eq!(device.reference, "ref1");
    assert_eq!(device.liveness, Liveness::Offline);
}
