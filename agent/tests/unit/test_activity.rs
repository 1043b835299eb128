use std::sync::Arc;
use std::time::Duration;

use edge_agent::edge::credentials::TunnelCredentials;
use edge_agent::tunnel::{TunnelClient, TunnelConfig};
use edge_agent::workers::activity::{self, ActivityTracker};
use edge_agent::workers::group::WorkerGroup;
use secrecy::SecretString;

use crate::common::FakeTunnel;

async fn open(tunnel: &FakeTunnel) {
    tunnel
        .create_tunnel(TunnelConfig {
            local_addr: "127.0.0.1:9001".to_string(),
            server_addr: "tunnel.example.com:8000".to_string(),
            server_fingerprint: String::new(),
            credentials: TunnelCredentials {
                username: "agent".to_string(),
                password: SecretString::from("s3cret".to_string()),
            },
            remote_port: 4100,
        })
        .await
        .unwrap();
}

fn spawn_monitor(tunnel: Arc<FakeTunnel>, tracker: Arc<ActivityTracker>) -> WorkerGroup {
    let mut group = WorkerGroup::new("activity");
    let signal = group.shutdown_signal();
    group.spawn(async move {
        activity::run(&activity::Options::default(), tunnel.as_ref(), &tracker, signal).await;
    });
    group
}

#[tokio::test(start_paused = true)]
async fn test_idle_tunnel_closed_after_timeout() {
    let tunnel = FakeTunnel::new();
    let tracker = Arc::new(ActivityTracker::new());
    open(&tunnel).await;
    tracker.touch();

    let group = spawn_monitor(tunnel.clone(), tracker.clone());

    tokio::time::sleep(Duration::from_secs(299)).await;
    assert!(tunnel.is_tunnel_open());

    tokio::time::sleep(Duration::from_secs(32)).await;
    assert!(!tunnel.is_tunnel_open());
    assert_eq!(tunnel.closes(), 1);

    group.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_touch_keeps_tunnel_open() {
    let tunnel = FakeTunnel::new();
    let tracker = Arc::new(ActivityTracker::new());
    open(&tunnel).await;
    tracker.touch();

    let group = spawn_monitor(tunnel.clone(), tracker.clone());

    tokio::time::sleep(Duration::from_secs(200)).await;
    tracker.touch();
    tokio::time::sleep(Duration::from_secs(200)).await;
    assert!(tunnel.is_tunnel_open());

    tokio::time::sleep(Duration::from_secs(140)).await;
    assert!(!tunnel.is_tunnel_open());

    group.stop().await;
}
