//! Wearable and phone bridged over a pair of newline-delimited JSON streams,
//! the same framing the `pandora-phone-bridge` binary speaks on stdin/stdout.

use async_trait::async_trait;
use pandora_bridge::backend::{
    AlarmAction, AlarmDevice, AlarmDeviceData, BackendApi, BackendError, BackendFactory,
};
use pandora_bridge::bridge::{
    CallError, CommandResponder, Correlator, PeerDirectory, SessionResolver, StdioTransport,
};
use pandora_bridge::storage::{BackendConfig, DeviceCredentials, MemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

struct OneCar;

#[async_trait]
impl BackendApi for OneCar {
    async fn pair_by_code(&self, _code: &str) -> Result<DeviceCredentials, BackendError> {
        Err(BackendError::Config("not used".to_owned()))
    }

    async fn pair_by_credentials(
        &self,
        _email: &str,
        _password: &str,
        _device_name: &str,
    ) -> Result<DeviceCredentials, BackendError> {
        Err(BackendError::Config("not used".to_owned()))
    }

    async fn list_devices(&self) -> Result<Vec<AlarmDevice>, BackendError> {
        Ok(vec![AlarmDevice {
            id: 42,
            name: "Volvo".to_owned(),
            model: String::new(),
            data: AlarmDeviceData {
                fuel_tank: 30,
                voltage: 12.1,
                engine_temp: -3,
                out_temp: -5,
                cabin_temp: -1,
                engine_rpm: 0,
                x: 0.0,
                y: 0.0,
            },
        }])
    }

    async fn send_command(&self, _device_id: i64, _action: AlarmAction) -> Result<(), BackendError> {
        Ok(())
    }

    async fn unpair(&self, _device_id: &str) -> Result<(), BackendError> {
        Ok(())
    }
}

struct OneCarFactory;

impl BackendFactory for OneCarFactory {
    fn create(&self, _config: &BackendConfig) -> Result<Arc<dyn BackendApi>, BackendError> {
        Ok(Arc::new(OneCar))
    }
}

fn sessions() -> Arc<SessionResolver> {
    Arc::new(SessionResolver::new(
        Arc::new(MemoryStore::with_value(BackendConfig::new("alarm.local"))),
        Arc::new(MemoryStore::with_value(DeviceCredentials::new("phone-1", "tok-1"))),
        Arc::new(OneCarFactory),
    ))
}

#[tokio::test]
async fn status_and_command_over_streams() {
    let (watch_io, phone_io) = tokio::io::duplex(64 * 1024);
    let (watch_rx, watch_tx) = tokio::io::split(watch_io);
    let (phone_rx, phone_tx) = tokio::io::split(phone_io);
    let shutdown = CancellationToken::new();

    let phone = StdioTransport::new("phone", "watch", phone_tx);
    let phone_reader = phone.spawn_reader(phone_rx, shutdown.clone());
    let responder = CommandResponder::attach(Arc::new(phone), sessions());

    let watch = StdioTransport::new("watch", "phone", watch_tx);
    let watch_reader = watch.spawn_reader(watch_rx, shutdown.clone());
    let correlator = Correlator::new(
        Arc::new(watch),
        PeerDirectory::discover(),
        Duration::from_secs(5),
    );

    let status = correlator.request_status().await.unwrap();
    assert_eq!(status.device_id, Some(42));
    assert_eq!(status.engine_temperature, Some(-3.0));

    let status = correlator.send_command(42, AlarmAction::Stop).await.unwrap();
    assert_eq!(status.device_id, Some(42));
    assert_eq!(correlator.pending_count(), 0);

    responder.shutdown().await;
    shutdown.cancel();
    phone_reader.await.unwrap().unwrap();
    watch_reader.await.unwrap().unwrap();
}

#[tokio::test]
async fn garbage_request_gets_protocol_error_frame() {
    let (mut host, phone_io) = tokio::io::duplex(64 * 1024);
    let (phone_rx, phone_tx) = tokio::io::split(phone_io);

    let phone = StdioTransport::new("phone", "watch", phone_tx);
    let reader = phone.spawn_reader(phone_rx, CancellationToken::new());
    let responder = CommandResponder::attach(Arc::new(phone), sessions());

    // `{oops` in base64.
    host.write_all(
        b"{\"source\":\"watch\",\"target\":\"phone\",\"path\":\"/pandora/status/get\",\"data\":\"e29vcHM=\"}\n",
    )
    .await
    .unwrap();

    let (host_rx, host_tx) = tokio::io::split(host);
    let mut lines = BufReader::new(host_rx).lines();
    let line = lines.next_line().await.unwrap().expect("response frame");
    let frame: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(frame["target"], "watch");
    assert_eq!(frame["path"], "/pandora/status/response");

    use base64::Engine as _;
    let data = base64::engine::general_purpose::STANDARD
        .decode(frame["data"].as_str().unwrap())
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&data).unwrap();
    assert_eq!(body["request_id"], serde_json::Value::Null);
    assert_eq!(body["status"]["error"], "INCOMPATIBLE_PROTOCOL");

    // EOF: in-flight work drains and the reader exits cleanly.
    drop(host_tx);
    drop(lines);
    reader.await.unwrap().unwrap();
    responder.drain().await;
}

#[tokio::test]
async fn silent_phone_times_out() {
    let (watch_io, _phone_io) = tokio::io::duplex(64 * 1024);
    let (watch_rx, watch_tx) = tokio::io::split(watch_io);
    let watch = StdioTransport::new("watch", "phone", watch_tx);
    let _reader = watch.spawn_reader(watch_rx, CancellationToken::new());
    let correlator = Correlator::new(
        Arc::new(watch),
        PeerDirectory::fixed("phone"),
        Duration::from_millis(50),
    );

    let err = correlator.request_status().await.unwrap_err();
    assert_eq!(err, CallError::Timeout);
    assert_eq!(correlator.pending_count(), 0);
}
