//! JSON-RPC transport against a mock device

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use meter_data_downloader::address::DeviceAddress;
use meter_data_downloader::device::shelly_rpc::ShellyRpcConnector;
use meter_data_downloader::device::{
    ChannelSelector, DeviceConnection, DeviceConnector, DeviceError, PageCursor, PageRequest,
};
use meter_data_downloader::downloader::{FetchExecutor, FetchJob, ProgressMode};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MAY_1: i64 = 1_746_057_600;

async fn mock_device() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shelly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": null,
            "id": "shellypro3em-a8032abe54dc",
            "mac": "A8032ABE54DC",
            "gen": 2
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({"method": "Shelly.GetDeviceInfo"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "src": "shellypro3em-a8032abe54dc",
            "result": {
                "mac": "A8032ABE54DC",
                "model": "SPEM-003CEBEU",
                "fw_id": "20240625-122451/1.3.3-gbdfd9b3"
            }
        })))
        .mount(&server)
        .await;
    server
}

fn address(server: &MockServer) -> DeviceAddress {
    DeviceAddress::parse(&server.uri()).unwrap()
}

fn request(cursor: Option<i64>) -> PageRequest {
    PageRequest {
        channel: ChannelSelector::Aggregate,
        window_start: MAY_1,
        window_end: MAY_1 + 3600,
        cursor,
    }
}

#[tokio::test]
async fn identity_is_read_from_device_info() {
    let server = mock_device().await;
    let connection = ShellyRpcConnector::default()
        .connect(&address(&server))
        .await
        .unwrap();

    let identity = connection.device_identity().await.unwrap();
    assert_eq!(identity.mac, "A8032ABE54DC");
    assert_eq!(identity.model, "SPEM-003CEBEU");
    assert_eq!(identity.firmware_id, "20240625-122451/1.3.3-gbdfd9b3");
}

#[tokio::test]
async fn history_page_follows_next_record_ts() {
    let server = mock_device().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({
            "method": "EMData.GetData",
            "params": {"id": 0, "ts": MAY_1, "end_ts": MAY_1 + 3600}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 2,
            "result": {
                "data": [{"ts": MAY_1, "period": 60, "values": [[1.5, 230.1], [null, 229.8]]}],
                "next_record_ts": MAY_1 + 120
            }
        })))
        .mount(&server)
        .await;

    let connection = ShellyRpcConnector::default()
        .connect(&address(&server))
        .await
        .unwrap();
    let page = connection.history_page(&request(None)).await.unwrap();

    assert_eq!(page.records.len(), 2);
    assert_eq!(page.records[1].timestamp, MAY_1 + 60);
    assert_eq!(page.records[1].fields, vec![None, Some(229.8)]);
    assert_eq!(page.next, PageCursor::Next(MAY_1 + 120));
    assert_eq!(page.position_consumed, 120);
}

#[tokio::test]
async fn single_channel_uses_em1_history() {
    let server = mock_device().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({
            "method": "EM1Data.GetData",
            "params": {"id": 2, "ts": MAY_1}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 2,
            "result": {"data": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let connection = ShellyRpcConnector::default()
        .connect(&address(&server))
        .await
        .unwrap();
    let page = connection
        .history_page(&PageRequest {
            channel: ChannelSelector::Channel(2),
            ..request(None)
        })
        .await
        .unwrap();

    assert!(page.records.is_empty());
    assert_eq!(page.next, PageCursor::Done);
    assert_eq!(page.position_consumed, 3600);
}

#[tokio::test]
async fn rpc_error_object_is_protocol_error() {
    let server = mock_device().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({"method": "EMData.GetData"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 2,
            "error": {"code": -105, "message": "Argument 'id', value 0 not found!"}
        })))
        .mount(&server)
        .await;

    let connection = ShellyRpcConnector::default()
        .connect(&address(&server))
        .await
        .unwrap();
    let err = connection.history_page(&request(None)).await.unwrap_err();

    match err {
        DeviceError::Protocol(message) => assert!(message.contains("-105")),
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn server_error_status_is_protocol_error() {
    let server = mock_device().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({"method": "EMData.GetData"})))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let connection = ShellyRpcConnector::default()
        .connect(&address(&server))
        .await
        .unwrap();
    let err = connection.history_page(&request(None)).await.unwrap_err();
    assert!(matches!(err, DeviceError::Protocol(_)));
}

#[tokio::test]
async fn slow_call_times_out() {
    let server = mock_device().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({"method": "EMData.GetData"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 2, "result": {"data": []}}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let connection = ShellyRpcConnector::default()
        .with_request_timeout(Duration::from_millis(200))
        .connect(&address(&server))
        .await
        .unwrap();
    let err = connection.history_page(&request(None)).await.unwrap_err();

    assert_eq!(
        err,
        DeviceError::Protocol("EMData.GetData timed out".to_string())
    );
}

#[tokio::test]
async fn failed_device_check_is_connection_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shelly"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = ShellyRpcConnector::default()
        .connect(&address(&server))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, DeviceError::Connection(_)));
}

#[tokio::test]
async fn calls_after_close_are_refused() {
    let server = mock_device().await;
    let mut connection = ShellyRpcConnector::default()
        .connect(&address(&server))
        .await
        .unwrap();

    connection.close().await.unwrap();
    connection.close().await.unwrap();

    let err = connection.device_identity().await.unwrap_err();
    assert_eq!(err, DeviceError::NotConnected);
}

#[tokio::test]
async fn executor_fetches_two_pages_over_http() {
    let server = mock_device().await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({
            "method": "EMData.GetData",
            "params": {"ts": MAY_1}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 2,
            "result": {
                "data": [{"ts": MAY_1, "period": 60, "values": [[1.5, 230.0], [2.0, 231.0]]}],
                "next_record_ts": MAY_1 + 120
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rpc"))
        .and(body_partial_json(json!({
            "method": "EMData.GetData",
            "params": {"ts": MAY_1 + 120}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3,
            "result": {
                "data": [{"ts": MAY_1 + 120, "period": 60, "values": [[null, 232.5]]}]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let template = temp_dir.path().join("[mac].log");
    let job = FetchJob::new(address(&server), "2025-05-01T00:00:00Z")
        .with_end("2025-05-01T01:00:00Z")
        .with_output(template.to_string_lossy().into_owned());

    let executor = FetchExecutor::new(Arc::new(ShellyRpcConnector::default()))
        .with_progress(ProgressMode::Off);
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let summary = executor.execute_at(&job, now).await.unwrap();

    assert_eq!(summary.calls_made, 2);
    assert_eq!(summary.items_returned, 3);
    assert_eq!(summary.identity.mac, "A8032ABE54DC");

    let contents = std::fs::read_to_string(&summary.output_path).unwrap();
    assert_eq!(
        contents,
        format!(
            "{},1.5,230\n{},2,231\n{},,232.5\n",
            MAY_1,
            MAY_1 + 60,
            MAY_1 + 120
        )
    );
}
