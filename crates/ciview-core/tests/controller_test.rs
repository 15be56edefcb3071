#![allow(clippy::unwrap_used)]
// End-to-end tests driving the controller against the mock protocol engine.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ciview_core::{
    Command, Controller, ControllerConfig, ControllerState, CoreError, DiagnosticKind,
    EntityStream, MockPort, MockPortConfig, Muid, Notification, PartialUpdate, PortCall,
    PortEvent, ProfileAddress, ProfileGroup, ProfileId, ProfileState, PropertyMetadata,
    PropertyUpdate, ProtocolPort, SetProfileRequest, Snapshot, SubscriptionState,
};
use pretty_assertions::assert_eq;
use tokio::sync::broadcast;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);
const TARGET: Muid = Muid(0x8765_4321);
const PROFILE: [u8; 5] = [0x7E, 0x00, 0x01, 0x02, 0x03];
const PROPERTY: &str = "mock.property.1";

// ── Helpers ─────────────────────────────────────────────────────────

async fn ready_with(config: ControllerConfig, mock: MockPortConfig) -> (Controller, MockPort) {
    let port = MockPort::new(mock);
    let controller = Controller::new(config, Arc::new(port.clone()));
    controller.init().await.unwrap();
    (controller, port)
}

async fn ready() -> (Controller, MockPort) {
    ready_with(ControllerConfig::default(), MockPortConfig::default()).await
}

async fn discovered() -> (Controller, MockPort) {
    let (controller, port) = ready().await;
    controller.send_discovery().await.unwrap();
    wait_for_log(&controller, "Discovery response received").await;
    (controller, port)
}

async fn wait_until<T, F>(stream: &mut EntityStream<T>, pred: F) -> Snapshot<T>
where
    T: Send + Sync + 'static,
    F: Fn(&[Arc<T>]) -> bool,
{
    timeout(WAIT, async {
        loop {
            let snap = stream.latest();
            if pred(snap.as_slice()) {
                return snap;
            }
            stream.changed().await.unwrap();
        }
    })
    .await
    .unwrap()
}

async fn wait_for_log(controller: &Controller, message: &str) {
    let mut logs = controller.logs();
    wait_until(&mut logs, |entries| entries.iter().any(|e| e.message == message)).await;
}

/// Collect notifications until one matches `stop`, returning everything
/// received including the match.
async fn collect_until<F>(rx: &mut broadcast::Receiver<Notification>, stop: F) -> Vec<Notification>
where
    F: Fn(&Notification) -> bool,
{
    timeout(WAIT, async {
        let mut seen = Vec::new();
        loop {
            let notification = rx.recv().await.unwrap();
            let done = stop(&notification);
            seen.push(notification);
            if done {
                return seen;
            }
        }
    })
    .await
    .unwrap()
}

fn profile_request(address: u8, enabled: bool, num_channels: u16) -> SetProfileRequest {
    SetProfileRequest {
        group: ProfileGroup::Index(0),
        address,
        profile_id: PROFILE.to_vec(),
        enabled,
        num_channels,
    }
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn discovery_populates_registry() {
    let (controller, _port) = discovered().await;

    let connections = controller.connections_snapshot();
    assert_eq!(connections.len(), 1);
    let connection = &connections[0];
    assert_eq!(connection.target(), TARGET);
    assert_eq!(connection.connection.product_instance_id, "Mock Device");
    assert_eq!(connection.connection.max_simultaneous_property_requests, 4);
    assert_eq!(
        connection.connection.device_info.manufacturer.label(),
        "Mock Manufacturer"
    );

    let profiles = controller.profiles_snapshot();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].target, TARGET);
    assert_eq!(profiles[0].item.profile_id, ProfileId::new(PROFILE));
    assert_eq!(profiles[0].item.address, ProfileAddress::FUNCTION_BLOCK);
    assert!(!profiles[0].item.enabled);

    let properties = controller.properties_snapshot();
    assert_eq!(properties.len(), 1);
    assert_eq!(properties[0].item.body_text(), Some(r#"{"value":123}"#));
}

#[tokio::test]
async fn rediscovery_does_not_duplicate() {
    let (controller, _port) = discovered().await;
    let mut rx = controller.notifications();
    controller.send_discovery().await.unwrap();
    controller.clear_logs().await.unwrap();

    let seen = collect_until(&mut rx, |n| matches!(n, Notification::LogsCleared)).await;
    assert!(
        !seen
            .iter()
            .any(|n| matches!(n, Notification::ConnectionsChanged(_))),
        "identical rediscovery should not publish"
    );
    assert_eq!(controller.connections_snapshot().len(), 1);
}

#[tokio::test]
async fn init_log_is_seeded_once() {
    let (controller, _port) = discovered().await;
    let initialized = controller
        .logs_snapshot()
        .iter()
        .filter(|e| e.message == "MIDI-CI Bridge initialized")
        .count();
    assert_eq!(initialized, 1);
}

// ── Profiles ────────────────────────────────────────────────────────

#[tokio::test]
async fn set_profile_confirms_with_one_notification() {
    let (controller, port) = discovered().await;
    port.clear_calls().await;
    let mut rx = controller.notifications();

    controller
        .set_profile(&profile_request(0x7F, true, 2))
        .await
        .unwrap();
    // Barrier: the clear is applied after everything already emitted.
    controller.clear_logs().await.unwrap();
    let seen = collect_until(&mut rx, |n| matches!(n, Notification::LogsCleared)).await;

    let profile_notifications: Vec<_> = seen
        .iter()
        .filter_map(|n| match n {
            Notification::ProfilesChanged(snap) => Some(snap),
            _ => None,
        })
        .collect();
    assert_eq!(profile_notifications.len(), 1);
    let expected = ProfileState {
        group: ProfileGroup::Index(0),
        address: ProfileAddress::FUNCTION_BLOCK,
        profile_id: ProfileId::new(PROFILE),
        enabled: true,
        num_channels_requested: 2,
    };
    assert_eq!(profile_notifications[0].len(), 1);
    assert_eq!(*profile_notifications[0][0].item, expected);

    let profiles = controller.profiles_snapshot();
    assert_eq!(profiles.len(), 1);
    assert_eq!(*profiles[0].item, expected);

    assert!(port.calls().await.iter().any(|c| matches!(
        c,
        PortCall::SetProfile {
            enabled: true,
            num_channels: 2,
            ..
        }
    )));
}

#[tokio::test]
async fn invalid_set_profile_never_reaches_port() {
    let (controller, port) = discovered().await;
    port.clear_calls().await;
    let before = controller.profiles_snapshot();

    for request in [
        profile_request(0x7F, true, 17),
        profile_request(200, true, 0),
        SetProfileRequest {
            profile_id: vec![0x7E, 0x00],
            ..profile_request(0x7F, true, 0)
        },
    ] {
        let err = controller.set_profile(&request).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument { .. }), "{err}");
    }

    assert!(port.calls().await.is_empty());
    assert_eq!(controller.profiles_snapshot(), before);
}

// ── Subscriptions ───────────────────────────────────────────────────

#[tokio::test]
async fn subscribe_and_unsubscribe_round_trip() {
    let (controller, _port) = discovered().await;
    let mut connections = controller.connections();

    controller.subscribe_property(PROPERTY, None).await.unwrap();
    wait_until(&mut connections, |c| {
        c[0].subscription(PROPERTY)
            .is_some_and(|s| s.state == SubscriptionState::Subscribed)
    })
    .await;

    controller.unsubscribe_property(PROPERTY).await.unwrap();
    wait_until(&mut connections, |c| {
        c[0].subscription(PROPERTY)
            .is_some_and(|s| s.state == SubscriptionState::Unsubscribed)
    })
    .await;
    assert_eq!(
        controller.subscription(TARGET, PROPERTY),
        Some(SubscriptionState::Unsubscribed)
    );
}

#[tokio::test(start_paused = true)]
async fn unsubscribe_while_pending_cancels() {
    let mock = MockPortConfig {
        response_delay: Duration::from_millis(100),
        ..MockPortConfig::default()
    };
    let (controller, _port) = ready_with(ControllerConfig::default(), mock).await;
    let mut connections = controller.connections();
    controller.send_discovery().await.unwrap();
    wait_until(&mut connections, |c| !c.is_empty()).await;

    let mut rx = controller.notifications();
    controller.subscribe_property(PROPERTY, None).await.unwrap();
    wait_until(&mut connections, |c| {
        c[0].subscription(PROPERTY)
            .is_some_and(|s| s.state == SubscriptionState::Subscribing)
    })
    .await;

    controller.unsubscribe_property(PROPERTY).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(
        controller.subscription(TARGET, PROPERTY),
        Some(SubscriptionState::Unsubscribed)
    );
    while let Ok(notification) = rx.try_recv() {
        assert!(
            !matches!(notification, Notification::Diagnostic(_)),
            "cancelled subscription produced {notification:?}"
        );
    }
}

// ── Diagnostics ─────────────────────────────────────────────────────

#[tokio::test]
async fn illegal_transition_is_reported_not_applied() {
    let (controller, port) = discovered().await;
    let mut rx = controller.notifications();

    port.emit(PortEvent::SubscriptionChanged {
        target: TARGET,
        property_id: PROPERTY.into(),
        state: SubscriptionState::Subscribed,
    });

    let seen = collect_until(&mut rx, |n| matches!(n, Notification::Diagnostic(_))).await;
    let Some(Notification::Diagnostic(diagnostic)) = seen.last() else {
        panic!("expected a diagnostic");
    };
    assert_eq!(diagnostic.kind, DiagnosticKind::IllegalTransition);
    assert_eq!(controller.subscription(TARGET, PROPERTY), None);

    wait_for_log(&controller, &format!("diagnostic: {}", diagnostic.message)).await;
}

#[tokio::test]
async fn events_after_a_failure_still_apply() {
    let (controller, port) = discovered().await;
    let mut profiles = controller.profiles();

    port.emit(PortEvent::PropertyUpdated(PropertyUpdate {
        target: TARGET,
        property_id: PROPERTY.into(),
        res_id: None,
        media_type: "application/json".into(),
        body: Bytes::from_static(b"x"),
        partial: Some(PartialUpdate::ByteRange { offset: 999 }),
    }));
    port.emit(PortEvent::ProfileChanged {
        target: TARGET,
        profile: ProfileState {
            group: ProfileGroup::Index(0),
            address: ProfileAddress::FUNCTION_BLOCK,
            profile_id: ProfileId::new(PROFILE),
            enabled: true,
            num_channels_requested: 1,
        },
    });

    wait_until(&mut profiles, |p| p.first().is_some_and(|p| p.item.enabled)).await;
    assert_eq!(
        controller.properties_snapshot()[0].item.body_text(),
        Some(r#"{"value":123}"#)
    );
}

#[tokio::test]
async fn diagnostics_can_stay_out_of_the_log() {
    let config = ControllerConfig {
        diagnostics_to_log: false,
        ..ControllerConfig::default()
    };
    let (controller, port) = ready_with(config, MockPortConfig::default()).await;
    let mut rx = controller.notifications();

    port.emit(PortEvent::ProfileRemoved {
        target: TARGET,
        key: ProfileState {
            group: ProfileGroup::Any,
            address: ProfileAddress::GROUP,
            profile_id: ProfileId::new(PROFILE),
            enabled: false,
            num_channels_requested: 0,
        }
        .key(),
    });
    collect_until(&mut rx, |n| matches!(n, Notification::Diagnostic(_))).await;

    assert!(
        !controller
            .logs_snapshot()
            .iter()
            .any(|e| e.message.starts_with("diagnostic:"))
    );
}

#[tokio::test]
async fn partial_json_update_merges_into_body() {
    let (controller, port) = discovered().await;
    let mut properties = controller.properties();

    port.emit(PortEvent::PropertyUpdated(PropertyUpdate {
        target: TARGET,
        property_id: PROPERTY.into(),
        res_id: None,
        media_type: "application/json".into(),
        body: Bytes::from_static(br#"{"/value":456,"/missing":1}"#),
        partial: Some(PartialUpdate::JsonPointer),
    }));

    let snap = wait_until(&mut properties, |p| {
        p[0].item.body_text() == Some(r#"{"value":456}"#)
    })
    .await;
    assert_eq!(snap.len(), 1);
}

// ── Local properties ────────────────────────────────────────────────

#[tokio::test]
async fn local_property_lifecycle() {
    let (controller, _port) = ready().await;
    let mut local = controller.local_properties();

    controller
        .create_property(PropertyMetadata::new("X-Local"))
        .await
        .unwrap();
    controller
        .create_property(PropertyMetadata::new("X-Other"))
        .await
        .unwrap();
    controller
        .update_property_value("X-Local", None, &b"{\"a\":1}"[..])
        .await
        .unwrap();
    controller
        .update_property_metadata("X-Local", PropertyMetadata::new("X-Renamed"))
        .await
        .unwrap();

    let snap = wait_until(&mut local, |p| p.first().is_some_and(|p| p.id() == "X-Renamed")).await;
    let ids: Vec<_> = snap.iter().map(|p| p.id().to_owned()).collect();
    assert_eq!(ids, vec!["X-Renamed", "X-Other"]);
    assert_eq!(
        snap[0].value.as_ref().unwrap().body_text(),
        Some("{\"a\":1}")
    );

    controller.remove_property("X-Other").await.unwrap();
    wait_until(&mut local, |p| p.len() == 1).await;
}

#[tokio::test]
async fn empty_resource_is_rejected() {
    let (controller, port) = ready().await;
    port.clear_calls().await;
    let err = controller
        .create_property(PropertyMetadata::new(""))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidArgument { .. }));
    assert!(port.calls().await.is_empty());
}

// ── Logs ────────────────────────────────────────────────────────────

#[tokio::test]
async fn clear_logs_leaves_log_empty() {
    let (controller, port) = discovered().await;
    assert!(!controller.logs_snapshot().is_empty());

    controller.clear_logs().await.unwrap();
    assert!(controller.logs_snapshot().is_empty());
    assert!(port.get_logs().await.unwrap().is_empty());
}

#[tokio::test]
async fn log_retention_keeps_newest() {
    let config = ControllerConfig {
        log_retention: ciview_core::LogRetention::MaxEntries(2),
        ..ControllerConfig::default()
    };
    let (controller, _port) = ready_with(config, MockPortConfig::default()).await;
    controller.send_discovery().await.unwrap();
    wait_for_log(&controller, "Discovery response received").await;

    let logs = controller.logs_snapshot();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].message, "Discovery inquiry sent");
}

// ── Lifecycle and errors ────────────────────────────────────────────

#[tokio::test]
async fn commands_require_initialization() {
    let port = MockPort::default();
    let controller = Controller::new(ControllerConfig::default(), Arc::new(port.clone()));
    assert_eq!(controller.state(), ControllerState::Uninitialized);

    let err = controller.send_discovery().await.unwrap_err();
    assert!(matches!(err, CoreError::NotInitialized));
    assert!(port.calls().await.is_empty());

    controller.init().await.unwrap();
    controller.init().await.unwrap();
    assert_eq!(controller.state(), ControllerState::Ready);

    controller.shutdown().await;
    assert_eq!(controller.state(), ControllerState::ShutDown);
    let err = controller.send_discovery().await.unwrap_err();
    assert!(matches!(err, CoreError::NotInitialized));
    assert!(matches!(
        controller.init().await.unwrap_err(),
        CoreError::NotInitialized
    ));
}

#[tokio::test]
async fn unavailable_port_maps_to_port_unavailable() {
    let port = MockPort::default();
    port.set_available(false);
    let controller = Controller::new(ControllerConfig::default(), Arc::new(port.clone()));
    assert!(matches!(
        controller.init().await.unwrap_err(),
        CoreError::PortUnavailable { .. }
    ));
    assert_eq!(controller.state(), ControllerState::Failed);

    port.set_available(true);
    controller.init().await.unwrap();
    port.set_available(false);
    assert!(matches!(
        controller.send_discovery().await.unwrap_err(),
        CoreError::PortUnavailable { .. }
    ));
}

#[tokio::test]
async fn get_muid_and_select_connection() {
    let (controller, port) = discovered().await;
    assert_eq!(controller.get_muid().await.unwrap(), Muid(0x1234_5678));

    controller.select_connection(TARGET).await.unwrap();
    let err = controller.select_connection(Muid(1)).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidArgument { .. }));
    assert!(
        !port
            .calls()
            .await
            .contains(&PortCall::SelectConnection { target: Muid(1) })
    );
}

#[tokio::test]
async fn execute_routes_raw_commands() {
    let (controller, port) = discovered().await;
    port.clear_calls().await;
    let result = controller
        .execute(Command::RefreshPropertyValue(
            ciview_core::RefreshPropertyRequest {
                property_id: PROPERTY.into(),
                ..Default::default()
            },
        ))
        .await
        .unwrap();
    assert_eq!(result, ciview_core::CommandResult::Forwarded);
    wait_for_log(&controller, "Property value refreshed: mock.property.1").await;
    assert_eq!(
        port.calls().await,
        vec![PortCall::RefreshPropertyValue {
            property_id: PROPERTY.into(),
            encoding: None,
            offset: None,
            limit: None,
        }]
    );
}

// ── Polling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn polling_picks_up_connections_without_events() {
    // Discover before the controller exists, so no events reach it.
    let port = MockPort::default();
    port.initialize().await.unwrap();
    port.send_discovery().await.unwrap();

    let config = ControllerConfig {
        poll_interval: Some(Duration::from_millis(20)),
        ..ControllerConfig::default()
    };
    let controller = Controller::new(config, Arc::new(port.clone()));
    controller.init().await.unwrap();
    assert!(controller.connections_snapshot().is_empty());

    let mut connections = controller.connections();
    let snap = wait_until(&mut connections, |c| !c.is_empty()).await;
    assert_eq!(snap[0].target(), TARGET);
    controller.shutdown().await;
}
