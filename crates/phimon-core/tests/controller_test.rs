// Engine lifecycle tests against a wiremock backend.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::matchers::{any, body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use phimon_core::session::SESSION_KEY;
use phimon_core::{
    Controller, CoreError, EnginePhase, MemoryBackend, MonitorConfig, NewSensor, SensorType,
    SessionBackend, TickOutcome,
};

// ── Helpers ─────────────────────────────────────────────────────────

const API: &str = "/api/phidget";
const NO_AUTO_POLL: Duration = Duration::from_secs(3600);

struct Harness {
    server: MockServer,
    backend: Arc<MemoryBackend>,
    ctrl: Controller,
    address: String,
    port: u16,
}

fn config(poll_interval: Duration) -> MonitorConfig {
    MonitorConfig {
        poll_interval,
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
        ..MonitorConfig::default()
    }
}

async fn harness_with(config: MonitorConfig) -> Harness {
    let server = MockServer::start().await;
    let backend = Arc::new(MemoryBackend::new());
    let ctrl = Controller::new(config, backend.clone());
    let addr = *server.address();
    Harness {
        server,
        backend,
        ctrl,
        address: addr.ip().to_string(),
        port: addr.port(),
    }
}

async fn harness() -> Harness {
    harness_with(config(NO_AUTO_POLL)).await
}

fn summary(id: &str, name: &str) -> Value {
    json!({
        "sensorId": id,
        "sensorType": "TEMPERATURE",
        "sensorName": name,
        "hubPort": 0,
        "value": null,
        "unit": "°C",
        "channel": 0,
        "attached": true,
        "status": "ATTACHED"
    })
}

fn reading(id: &str, name: &str, value: f64) -> Value {
    json!({
        "sensorId": id,
        "sensorType": "TEMPERATURE",
        "sensorName": name,
        "hubPort": 0,
        "channel": 0,
        "value": value,
        "unit": "°C",
        "timestamp": 1_700_000_000_000_i64,
        "attached": true
    })
}

fn status_body(connected: bool) -> Value {
    if connected {
        json!({
            "connected": true,
            "serverAddress": "hub",
            "port": 5661,
            "message": "Connected",
            "connectedAt": 1_700_000_000_000_i64
        })
    } else {
        json!({
            "connected": false,
            "serverAddress": null,
            "port": null,
            "message": "Not connected",
            "connectedAt": null
        })
    }
}

async fn mount_connect(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("{API}/connect")))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body(true)))
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, connected: bool) {
    Mock::given(method("GET"))
        .and(path(format!("{API}/status")))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body(connected)))
        .mount(server)
        .await;
}

async fn mount_inventory(server: &MockServer, body: Value, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(format!("{API}/sensors")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));
    match times {
        Some(n) => mock.up_to_n_times(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

async fn mount_readings(server: &MockServer, body: Value, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(format!("{API}/sensors/data")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));
    match times {
        Some(n) => mock.up_to_n_times(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

async fn connected_harness() -> Harness {
    let h = harness().await;
    mount_connect(&h.server).await;
    mount_inventory(&h.server, json!({ "s1": summary("s1", "Greenhouse") }), None).await;
    mount_readings(&h.server, json!({ "s1": reading("s1", "Greenhouse", 21.4) }), None).await;
    h.ctrl.connect(&h.address, h.port, None).await.unwrap();
    h
}

fn seed_session(backend: &MemoryBackend, address: &str, port: u16, age: TimeDelta) {
    let stamp = (Utc::now() - age).timestamp_millis();
    let record = json!({ "serverAddress": address, "port": port, "timestamp": stamp });
    backend.write(SESSION_KEY, &record.to_string()).unwrap();
}

// ── Connect ─────────────────────────────────────────────────────────

#[tokio::test]
async fn connect_populates_registry_and_saves_session() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path(format!("{API}/connect")))
        .and(body_json(json!({
            "serverAddress": h.address,
            "port": h.port,
            "password": "s3cret"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body(true)))
        .expect(1)
        .mount(&h.server)
        .await;
    mount_inventory(&h.server, json!({ "s1": summary("s1", "Greenhouse") }), None).await;
    mount_readings(&h.server, json!({ "s1": reading("s1", "Greenhouse", 21.4) }), None).await;

    let password = SecretString::from("s3cret".to_string());
    let status = h
        .ctrl
        .connect(&h.address, h.port, Some(&password))
        .await
        .unwrap();

    assert!(status.connected);
    assert_eq!(h.ctrl.phase(), EnginePhase::Connected);

    let sensors = h.ctrl.sensors_snapshot();
    assert_eq!(sensors.len(), 1);
    assert_eq!(sensors[0].sensor_id, "s1");
    assert_eq!(sensors[0].value, Some(21.4));
    assert_eq!(sensors[0].unit, "°C");

    let session = h.ctrl.sessions().load().unwrap();
    assert_eq!(session.server_address, h.address);
    assert_eq!(session.port, h.port);
    assert_eq!(h.ctrl.server().unwrap().port, h.port);

    h.ctrl.stop().await;
}

#[tokio::test]
async fn connect_rejected_by_backend() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/connect")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "connected": false,
            "message": "Hub did not respond"
        })))
        .mount(&h.server)
        .await;

    let err = h.ctrl.connect(&h.address, h.port, None).await.unwrap_err();

    match err {
        CoreError::Rejected { message } => assert_eq!(message, "Hub did not respond"),
        other => panic!("expected Rejected, got {other:?}"),
    }
    assert_eq!(h.ctrl.phase(), EnginePhase::Disconnected);
    assert!(h.ctrl.sessions().load().is_none());
}

#[tokio::test]
async fn connect_surfaces_server_message() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/connect")))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "CONNECTION_FAILED",
            "message": "Timed out waiting for attachment"
        })))
        .mount(&h.server)
        .await;

    let err = h.ctrl.connect(&h.address, h.port, None).await.unwrap_err();

    assert_eq!(err.to_string(), "Timed out waiting for attachment");
    assert_eq!(
        h.ctrl.last_error().as_deref(),
        Some("Timed out waiting for attachment")
    );
    assert_eq!(h.ctrl.phase(), EnginePhase::Disconnected);
    assert!(h.ctrl.sensors_snapshot().is_empty());
}

#[tokio::test]
async fn connect_while_connected_is_refused() {
    let h = connected_harness().await;

    let err = h.ctrl.connect(&h.address, h.port, None).await.unwrap_err();
    assert!(matches!(err, CoreError::AlreadyConnected { .. }));
    assert_eq!(h.ctrl.phase(), EnginePhase::Connected);

    h.ctrl.stop().await;
}

#[tokio::test]
async fn connect_fails_when_first_tick_loses_link() {
    let h = harness().await;
    mount_connect(&h.server).await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/sensors")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;
    mount_status(&h.server, false).await;

    let err = h.ctrl.connect(&h.address, h.port, None).await.unwrap_err();

    assert!(matches!(err, CoreError::ConnectionLost { .. }), "got {err:?}");
    assert_eq!(h.ctrl.phase(), EnginePhase::Disconnected);
    assert!(h.ctrl.sensors_snapshot().is_empty());
    assert!(h.ctrl.server().is_none());
    assert!(h.backend.read(SESSION_KEY).unwrap().is_none());
}

#[tokio::test]
async fn disconnect_during_connect_closes_remote_link() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/connect")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(status_body(true))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&h.server)
        .await;
    mount_inventory(&h.server, json!({ "s1": summary("s1", "A") }), None).await;
    mount_readings(&h.server, json!({ "s1": reading("s1", "A", 1.0) }), None).await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/disconnect")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&h.server)
        .await;

    let ctrl = h.ctrl.clone();
    let (address, port) = (h.address.clone(), h.port);
    let pending = tokio::spawn(async move { ctrl.connect(&address, port, None).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.ctrl.disconnect().await;

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(CoreError::Cancelled)), "got {result:?}");
    assert_eq!(h.ctrl.phase(), EnginePhase::Disconnected);
    assert!(h.ctrl.sensors_snapshot().is_empty());
    assert!(h.ctrl.server().is_none());
    h.server.verify().await;
}

// ── Reconciliation ──────────────────────────────────────────────────

#[tokio::test]
async fn removed_sensor_is_pruned_and_not_resurrected() {
    let h = harness().await;
    mount_connect(&h.server).await;
    mount_inventory(&h.server, json!({ "s1": summary("s1", "Greenhouse") }), Some(1)).await;
    mount_inventory(&h.server, json!({}), None).await;
    // Readings still mention s1 after it left the inventory.
    mount_readings(&h.server, json!({ "s1": reading("s1", "Greenhouse", 21.4) }), None).await;

    h.ctrl.connect(&h.address, h.port, None).await.unwrap();
    assert_eq!(h.ctrl.sensors_snapshot().len(), 1);

    let outcome = h.ctrl.refresh().await.unwrap();
    assert_eq!(outcome, TickOutcome::Applied { sensors: 0 });
    assert!(h.ctrl.sensors_snapshot().is_empty());

    h.ctrl.stop().await;
}

#[tokio::test]
async fn unknown_reading_is_inserted_and_sorted() {
    let h = harness().await;
    mount_connect(&h.server).await;
    mount_inventory(&h.server, json!({ "s1": summary("s1", "zone B") }), None).await;
    mount_readings(
        &h.server,
        json!({
            "s1": reading("s1", "zone B", 20.0),
            "s2": reading("s2", "Attic", 30.0)
        }),
        None,
    )
    .await;

    h.ctrl.connect(&h.address, h.port, None).await.unwrap();

    let names: Vec<String> = h
        .ctrl
        .sensors_snapshot()
        .iter()
        .map(|r| r.sensor_name.clone())
        .collect();
    assert_eq!(names, vec!["Attic", "zone B"]);

    h.ctrl.stop().await;
}

#[tokio::test]
async fn periodic_poll_picks_up_new_sensors() {
    let h = harness_with(config(Duration::from_millis(50))).await;
    mount_connect(&h.server).await;
    mount_inventory(&h.server, json!({ "s1": summary("s1", "A") }), Some(1)).await;
    mount_inventory(
        &h.server,
        json!({ "s1": summary("s1", "A"), "s2": summary("s2", "B") }),
        None,
    )
    .await;
    mount_readings(&h.server, json!({ "s1": reading("s1", "A", 1.0) }), None).await;

    h.ctrl.connect(&h.address, h.port, None).await.unwrap();
    let mut stream = h.ctrl.sensors();

    let grown = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if stream.current().len() == 2 {
                break;
            }
            stream.changed().await.unwrap();
        }
    })
    .await;
    assert!(grown.is_ok(), "registry never picked up the second sensor");

    h.ctrl.stop().await;
}

// ── Failure handling ────────────────────────────────────────────────

#[tokio::test]
async fn transient_failure_keeps_connection() {
    let h = connected_harness().await;

    h.server.reset().await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/sensors")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;
    mount_status(&h.server, true).await;

    let outcome = h.ctrl.refresh().await.unwrap();

    assert_eq!(outcome, TickOutcome::Transient);
    assert_eq!(h.ctrl.phase(), EnginePhase::Connected);
    assert_eq!(h.ctrl.sensors_snapshot().len(), 1);
    assert!(h.ctrl.last_error().is_some());
    assert!(h.ctrl.sessions().load().is_some());

    h.ctrl.stop().await;
}

#[tokio::test]
async fn backend_reporting_disconnected_is_a_loss() {
    let h = connected_harness().await;

    h.server.reset().await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/sensors")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;
    mount_status(&h.server, false).await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/disconnect")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let outcome = h.ctrl.refresh().await.unwrap();

    assert_eq!(outcome, TickOutcome::Lost);
    assert_eq!(h.ctrl.phase(), EnginePhase::Disconnected);
    assert!(h.ctrl.sensors_snapshot().is_empty());
    assert!(h.ctrl.sessions().load().is_none());
    assert!(h.ctrl.server().is_none());
    assert!(matches!(h.ctrl.refresh().await, Err(CoreError::NotConnected)));
}

#[tokio::test]
async fn unreachable_server_is_a_loss() {
    let h = harness_with(MonitorConfig {
        timeout: Duration::from_millis(300),
        ..config(NO_AUTO_POLL)
    })
    .await;
    mount_connect(&h.server).await;
    mount_inventory(&h.server, json!({ "s1": summary("s1", "A") }), Some(1)).await;
    mount_readings(&h.server, json!({ "s1": reading("s1", "A", 1.0) }), Some(1)).await;
    h.ctrl.connect(&h.address, h.port, None).await.unwrap();

    // Everything from here on answers slower than the client will wait.
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&h.server)
        .await;

    let outcome = h.ctrl.refresh().await.unwrap();

    assert_eq!(outcome, TickOutcome::Lost);
    assert_eq!(h.ctrl.phase(), EnginePhase::Disconnected);
    assert!(h.ctrl.sensors_snapshot().is_empty());
    assert!(h.ctrl.sessions().load().is_none());
    assert!(
        h.ctrl
            .last_error()
            .unwrap()
            .starts_with("Unable to connect to server")
    );
}

// ── Disconnect / stop ───────────────────────────────────────────────

#[tokio::test]
async fn disconnect_cleans_up_even_when_request_fails() {
    let h = connected_harness().await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/disconnect")))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&h.server)
        .await;

    h.ctrl.disconnect().await;

    assert_eq!(h.ctrl.phase(), EnginePhase::Disconnected);
    assert!(h.ctrl.sensors_snapshot().is_empty());
    assert!(h.backend.read(SESSION_KEY).unwrap().is_none());
    assert!(matches!(h.ctrl.refresh().await, Err(CoreError::NotConnected)));
}

#[tokio::test]
async fn in_flight_tick_is_discarded_after_disconnect() {
    let h = harness().await;
    mount_connect(&h.server).await;
    mount_inventory(&h.server, json!({ "s1": summary("s1", "A") }), None).await;
    mount_readings(&h.server, json!({ "s1": reading("s1", "A", 1.0) }), Some(1)).await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/sensors/data")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "s1": reading("s1", "A", 99.0) }))
                .set_delay(Duration::from_secs(1)),
        )
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/disconnect")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&h.server)
        .await;

    h.ctrl.connect(&h.address, h.port, None).await.unwrap();

    let ctrl = h.ctrl.clone();
    let pending = tokio::spawn(async move { ctrl.refresh().await });
    tokio::time::sleep(Duration::from_millis(200)).await;
    h.ctrl.disconnect().await;

    let outcome = pending.await.unwrap().unwrap();
    assert_eq!(outcome, TickOutcome::Discarded);
    assert!(h.ctrl.sensors_snapshot().is_empty());
    assert_eq!(h.ctrl.phase(), EnginePhase::Disconnected);
}

#[tokio::test]
async fn stop_keeps_session_for_next_start() {
    let h = connected_harness().await;
    mount_status(&h.server, true).await;

    h.ctrl.stop().await;
    assert_eq!(h.ctrl.phase(), EnginePhase::Idle);
    assert!(h.ctrl.sensors_snapshot().is_empty());
    assert!(h.ctrl.sessions().load().is_some());

    assert_eq!(h.ctrl.start().await, EnginePhase::Connected);
    assert_eq!(h.ctrl.sensors_snapshot().len(), 1);

    h.ctrl.stop().await;
}

// ── Session restore ─────────────────────────────────────────────────

#[tokio::test]
async fn start_restores_fresh_session() {
    let h = harness().await;
    mount_status(&h.server, true).await;
    mount_inventory(&h.server, json!({ "s1": summary("s1", "A") }), None).await;
    mount_readings(&h.server, json!({ "s1": reading("s1", "A", 5.0) }), None).await;
    seed_session(&h.backend, &h.address, h.port, TimeDelta::hours(1));
    let seeded = h.ctrl.sessions().load().unwrap();

    assert_eq!(h.ctrl.start().await, EnginePhase::Connected);
    assert_eq!(h.ctrl.sensors_snapshot().len(), 1);

    let refreshed = h.ctrl.sessions().load().unwrap();
    assert!(refreshed.established_at > seeded.established_at);

    h.ctrl.stop().await;
}

#[tokio::test]
async fn expired_session_is_not_checked() {
    let h = harness().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.server)
        .await;
    seed_session(&h.backend, &h.address, h.port, TimeDelta::hours(25));

    assert_eq!(h.ctrl.start().await, EnginePhase::Disconnected);
    // Expired records are ignored, not deleted.
    assert!(h.backend.read(SESSION_KEY).unwrap().is_some());
}

#[tokio::test]
async fn stale_backend_link_discards_session() {
    let h = harness().await;
    mount_status(&h.server, false).await;
    seed_session(&h.backend, &h.address, h.port, TimeDelta::minutes(5));

    assert_eq!(h.ctrl.start().await, EnginePhase::Disconnected);
    assert!(h.backend.read(SESSION_KEY).unwrap().is_none());
}

#[tokio::test]
async fn failing_status_discards_session() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/status")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;
    seed_session(&h.backend, &h.address, h.port, TimeDelta::minutes(5));

    assert_eq!(h.ctrl.start().await, EnginePhase::Disconnected);
    assert!(h.backend.read(SESSION_KEY).unwrap().is_none());
    assert!(h.ctrl.last_error().is_some());
}

// ── Sensor operations ───────────────────────────────────────────────

#[tokio::test]
async fn single_sensor_not_found() {
    let h = connected_harness().await;
    Mock::given(method("GET"))
        .and(path(format!("{API}/sensors/ghost/data")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "SENSOR_NOT_FOUND",
            "message": "Sensor with ID ghost not found"
        })))
        .mount(&h.server)
        .await;

    let err = h.ctrl.sensor_reading("ghost").await.unwrap_err();
    assert!(matches!(err, CoreError::SensorNotFound { sensor_id } if sensor_id == "ghost"));

    h.ctrl.stop().await;
}

#[tokio::test]
async fn register_sensor_returns_record() {
    let h = connected_harness().await;
    Mock::given(method("POST"))
        .and(path(format!("{API}/sensors/register")))
        .and(body_json(json!({
            "sensorType": "LIGHTSENSOR",
            "hubPort": 4,
            "channel": 0,
            "sensorName": "Window"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "sensorId": "LIGHTSENSOR_4_0",
            "sensorType": "LIGHTSENSOR",
            "sensorName": "Window",
            "hubPort": 4,
            "value": null,
            "unit": "lux",
            "channel": 0,
            "attached": false,
            "status": "REGISTERED"
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    let record = h
        .ctrl
        .register_sensor(&NewSensor {
            sensor_type: SensorType::LightSensor,
            hub_port: 4,
            channel: 0,
            serial_number: None,
            sensor_name: Some("Window".into()),
        })
        .await
        .unwrap();

    assert_eq!(record.sensor_id, "LIGHTSENSOR_4_0");
    assert_eq!(record.unit, "lux");
    assert!(!record.attached);

    h.ctrl.stop().await;
}
