use std::time::Duration;

use chrono::{TimeZone, Utc};
use edge_agent::filesys::file::File;
use edge_agent::http::client::{HttpClient, EDGE_ID_HEADER};
use edge_agent::http::edge::{ControlPlaneClient, EdgeClient};
use edge_agent::storage::cursor::load_cursor;
use edge_api::{AsyncPollRequest, EdgeStackStatus, TunnelStatus};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, cursor_file: Option<File>) -> EdgeClient {
    let http = HttpClient::new(&server.uri(), "edge-1", Duration::from_secs(5), false).unwrap();
    EdgeClient::new(http, 7, None, cursor_file)
}

#[tokio::test]
async fn test_status_request_identifies_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/endpoints/7/edge/status"))
        .and(header(EDGE_ID_HEADER, "edge-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "REQUIRED",
            "port": 4100,
            "checkin": 5,
            "stacks": [{"ID": 3, "Version": 2}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let status = client(&server, None).get_environment_status().await.unwrap();
    assert_eq!(status.status, TunnelStatus::Required);
    assert_eq!(status.port, 4100);
    assert_eq!(status.stacks[0].version, 2);
}

#[tokio::test]
async fn test_stack_status_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/edge_stacks/3/status"))
        .and(body_json(json!({"Status": 2, "Error": "boom", "EndpointID": 7})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client(&server, None)
        .set_edge_stack_status(3, EdgeStackStatus::Error, "boom")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_log_uploads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/endpoints/7/edge/jobs/5/logs"))
        .and(body_json(json!({"FileContent": "done"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/endpoints/7/edge/stacks/3/logs"))
        .and(body_json(json!({"Logs": "web-1 | ready"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, None);
    client.send_job_log_file(5, "done").await.unwrap();
    client.send_stack_logs(3, "web-1 | ready").await.unwrap();
}

#[tokio::test]
async fn test_async_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/endpoints/edge/async"))
        .and(body_json(json!({})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "pingInterval": 10,
            "snapshotInterval": 0,
            "commandInterval": 30,
            "endpointID": 7,
            "commands": [{
                "id": 1,
                "type": "edgeStack",
                "timestamp": "2024-05-01T10:00:00Z",
                "operation": "remove",
                "value": {"ID": 3}
            }]
        })))
        .mount(&server)
        .await;

    let response = client(&server, None)
        .exchange_async(AsyncPollRequest::default())
        .await
        .unwrap();
    assert_eq!(response.ping_interval, 10);
    assert_eq!(response.command_interval, 30);
    assert_eq!(response.commands.len(), 1);
    assert_eq!(response.commands[0].command_type, "edgeStack");
}

#[tokio::test]
async fn test_error_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client(&server, None)
        .get_edge_stack_config(3)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_cursor_only_moves_forward_and_persists() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let file = File::new(dir.path().join("command_cursor.json"));
    let client = client(&server, Some(File::new(file.path())));

    let early = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let late = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
    client.set_last_command_timestamp(late).await.unwrap();
    client.set_last_command_timestamp(early).await.unwrap();

    assert_eq!(client.last_command_timestamp(), Some(late));
    assert_eq!(load_cursor(&file).await, Some(late));
}
