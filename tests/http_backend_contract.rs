//! Alarm backend HTTP contract tests.
//!
//! Verify request paths, auth headers, 401 handling and response decoding for
//! the `reqwest` backend client against a `wiremock` server.

use pandora_bridge::backend::{
    AlarmAction, BackendApi, BackendError, BackendFactory, HttpBackendFactory, SessionEvent,
};
use pandora_bridge::config::BackendClientConfig;
use pandora_bridge::storage::{BackendConfig, CredentialsStore, DeviceCredentials, MemoryStore};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn paired_store() -> Arc<MemoryStore<DeviceCredentials>> {
    Arc::new(MemoryStore::with_value(DeviceCredentials::new(
        "phone-1", "tok-1",
    )))
}

fn factory(creds: Arc<MemoryStore<DeviceCredentials>>) -> HttpBackendFactory {
    HttpBackendFactory::new(BackendClientConfig::default(), creds)
}

fn client(server: &MockServer, factory: &HttpBackendFactory) -> Arc<dyn BackendApi> {
    factory
        .create(&BackendConfig::new(server.uri()))
        .expect("client")
}

fn device_json(id: i64, name: &str, rpm: i32) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "model": "DXL-5000",
        "data": {
            "fuel": 64,
            "voltage": 12.6,
            "engine_temp": 85,
            "out_temp": 10,
            "cabin_temp": 21,
            "engine_rpm": rpm,
            "x": 55.75,
            "y": 37.61
        }
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Request format
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_devices_sends_bearer_and_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/alarm/devices"))
        .and(header("authorization", "Bearer tok-1"))
        .and(header("cookie", "device_id=phone-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([device_json(7, "Car1", 900), device_json(8, "Car2", 0)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let factory = factory(paired_store());
    let devices = client(&server, &factory).list_devices().await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id, 7);
    assert_eq!(devices[0].data.fuel_tank, 64);
    assert!(devices[0].engine_running());
    assert!(!devices[1].engine_running());
}

#[tokio::test]
async fn command_posts_device_and_action() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/alarm/command"))
        .and(header("authorization", "Bearer tok-1"))
        .and(body_json(json!({"alarm_device_id": 7, "action": "start"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let factory = factory(paired_store());
    client(&server, &factory)
        .send_command(7, AlarmAction::Start)
        .await
        .unwrap();
}

#[tokio::test]
async fn pairing_calls_carry_no_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/devices/pairing/code/123456"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"device_id": "phone-9", "token": "tok-9"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/devices/pairing/cred"))
        .and(body_json(json!({
            "email": "driver@example.com",
            "password": "secret",
            "device_name": "Pixel Watch"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"device_id": "phone-10", "token": "tok-10"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Stale credentials are present but must not be sent.
    let factory = factory(paired_store());
    let client = client(&server, &factory);

    let by_code = client.pair_by_code("123456").await.unwrap();
    assert_eq!(by_code, DeviceCredentials::new("phone-9", "tok-9"));
    let by_account = client
        .pair_by_credentials("driver@example.com", "secret", "Pixel Watch")
        .await
        .unwrap();
    assert_eq!(by_account.device_id, "phone-10");

    for request in server.received_requests().await.unwrap() {
        assert!(request.headers.get("authorization").is_none());
        assert!(request.headers.get("cookie").is_none());
    }
}

#[tokio::test]
async fn unpair_deletes_device() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/devices/phone-1"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let factory = factory(paired_store());
    client(&server, &factory).unpair("phone-1").await.unwrap();
}

// ────────────────────────────────────────────────────────────────────────────
// Error handling
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unauthorized_clears_credentials_and_notifies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/alarm/devices"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let creds = paired_store();
    let factory = factory(Arc::clone(&creds));
    let mut events = factory.subscribe();

    let err = client(&server, &factory).list_devices().await.unwrap_err();
    assert!(matches!(err, BackendError::Unauthorized));
    assert!(err.is_unauthorized());
    assert!(CredentialsStore::load(creds.as_ref()).unwrap().is_none());
    assert_eq!(events.recv().await.unwrap(), SessionEvent::Unauthorized);
}

#[tokio::test]
async fn unauthorized_for_replaced_credentials_keeps_new_ones() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/alarm/devices"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(401).set_delay(std::time::Duration::from_millis(200)))
        .mount(&server)
        .await;

    let creds = paired_store();
    let factory = factory(Arc::clone(&creds));
    let mut events = factory.subscribe();

    let api = client(&server, &factory);
    let call = tokio::spawn(async move { api.list_devices().await });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let fresh = DeviceCredentials::new("phone-2", "tok-2");
    CredentialsStore::save(creds.as_ref(), &fresh).unwrap();

    let err = call.await.unwrap().unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(CredentialsStore::load(creds.as_ref()).unwrap(), Some(fresh));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn http_error_keeps_truncated_body() {
    let server = MockServer::start().await;
    let body = "x".repeat(2000);
    Mock::given(method("POST"))
        .and(path("/api/alarm/command"))
        .respond_with(ResponseTemplate::new(503).set_body_string(body))
        .mount(&server)
        .await;

    let creds = paired_store();
    let factory = factory(Arc::clone(&creds));
    let err = client(&server, &factory)
        .send_command(7, AlarmAction::Stop)
        .await
        .unwrap_err();

    match err {
        BackendError::Http { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message.len(), 500);
        }
        other => panic!("expected Http error, got {other:?}"),
    }
    // Only a 401 clears credentials.
    assert!(CredentialsStore::load(creds.as_ref()).unwrap().is_some());
}

#[tokio::test]
async fn malformed_device_list_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/alarm/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"devices": "nope"})))
        .mount(&server)
        .await;

    let factory = factory(paired_store());
    let err = client(&server, &factory).list_devices().await.unwrap_err();
    assert!(matches!(err, BackendError::Decode(_)));
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let factory = factory(paired_store());
    let client = factory
        .create(&BackendConfig::new("127.0.0.1").with_port(1))
        .unwrap();
    let err = client.list_devices().await.unwrap_err();
    assert!(matches!(err, BackendError::Network(_)));
}

// ────────────────────────────────────────────────────────────────────────────
// Readiness check
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ready_requires_ok_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ready"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;

    let factory = factory(paired_store());
    let client = factory
        .build_http(&BackendConfig::new(server.uri()))
        .unwrap();
    assert!(client.check_ready().await);
    assert!(client.base_url().ends_with('/'));
}

#[tokio::test]
async fn ready_rejects_other_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ready"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "starting"})))
        .mount(&server)
        .await;

    let factory = factory(paired_store());
    let client = factory
        .build_http(&BackendConfig::new(server.uri()))
        .unwrap();
    assert!(!client.check_ready().await);
}
