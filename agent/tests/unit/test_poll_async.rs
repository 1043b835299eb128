use std::time::Duration;

use chrono::{DateTime, Utc};
use edge_agent::poll::async_poll::{self, exchange, FAILSAFE_PING_INTERVAL};
use edge_agent::poll::coalescer::Flags;
use edge_agent::poll::PollService;
use edge_agent::workers::group::WorkerGroup;
use edge_api::AsyncPollResponse;

use crate::common::{poll_options, wait_until, Harness};

#[tokio::test]
async fn test_exchange_carries_requested_fields() {
    let mut h = Harness::new();
    let ctx = h.context();

    exchange(
        &ctx,
        Flags {
            ping: true,
            ..Flags::default()
        },
    )
    .await
    .unwrap();

    let ts = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    *h.client.cursor.lock().unwrap() = Some(ts);
    exchange(
        &ctx,
        Flags {
            command: true,
            snapshot: true,
            ..Flags::default()
        },
    )
    .await
    .unwrap();

    let requests = h.client.requests();
    assert!(requests[0].command_timestamp.is_none());
    assert!(requests[0].snapshot.is_none());
    assert_eq!(requests[1].command_timestamp, Some(ts));

    let snapshot = requests[1].snapshot.as_ref().unwrap();
    assert_eq!(snapshot.docker, Some(serde_json::json!({"ID": "fake-engine"})));
    assert!(snapshot.host.is_some());
}

#[tokio::test]
async fn test_command_flag_without_cursor_sends_epoch() {
    let mut h = Harness::new();
    let ctx = h.context();

    exchange(
        &ctx,
        Flags {
            command: true,
            ..Flags::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(
        h.client.requests()[0].command_timestamp,
        Some(DateTime::<Utc>::default())
    );
}

#[tokio::test]
async fn test_simultaneous_ticks_coalesce_into_one_request() {
    let mut h = Harness::new();
    let service = PollService::new(poll_options(true, Duration::from_millis(500)), h.context());
    service.start().await;

    assert!(wait_until(|| !h.client.requests().is_empty()).await);
    tokio::time::sleep(Duration::from_millis(250)).await;
    service.stop().await;

    let requests = h.client.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].command_timestamp.is_some());
    assert!(requests[0].snapshot.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_all_channels_disabled_falls_back_to_ping() {
    let mut h = Harness::new();
    let ctx = h.context();
    let options = poll_options(true, Duration::ZERO);

    let mut group = WorkerGroup::new("async poll");
    let signal = group.shutdown_signal();
    group.spawn(async move {
        async_poll::run(&options, &ctx, signal).await;
    });

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert!(h.client.requests().is_empty());

    tokio::time::sleep(Duration::from_secs(2)).await;
    let requests = h.client.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].command_timestamp.is_none());
    assert!(requests[0].snapshot.is_none());
    assert_eq!(h.client.timeouts.lock().unwrap()[0], FAILSAFE_PING_INTERVAL);

    group.stop().await;
}

#[tokio::test]
async fn test_response_intervals_retarget_timers() {
    let mut h = Harness::new();
    let ctx = h.context();
    let options = poll_options(true, Duration::from_millis(200));
    h.client.async_responses.lock().unwrap().push_back(AsyncPollResponse {
        ping_interval: 1,
        ..Default::default()
    });

    let mut group = WorkerGroup::new("async poll");
    let signal = group.shutdown_signal();
    group.spawn(async move {
        async_poll::run(&options, &ctx, signal).await;
    });

    assert!(wait_until(|| h.client.requests().len() == 1).await);
    let first = std::time::Instant::now();
    assert!(wait_until(|| h.client.timeouts().len() == 2).await);
    assert_eq!(
        h.client.timeouts(),
        vec![Duration::from_millis(200), Duration::from_secs(1)]
    );

    // Snapshot and command are off now; only the 1s ping remains
    assert!(wait_until(|| h.client.requests().len() == 2).await);
    assert!(first.elapsed() >= Duration::from_millis(800));
    let requests = h.client.requests();
    assert!(requests[1].snapshot.is_none());
    assert!(requests[1].command_timestamp.is_none());

    // An empty response disables everything, leaving the fail-safe ping
    assert!(wait_until(|| h.client.timeouts().len() == 3).await);
    assert_eq!(h.client.timeouts()[2], FAILSAFE_PING_INTERVAL);

    group.stop().await;
}
