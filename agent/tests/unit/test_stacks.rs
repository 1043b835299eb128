use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::time::Duration;

use edge_agent::models::stack::{EngineType, StackAction, StackStatus};
use edge_api::{EdgeStackPayload, EdgeStackStatus};

use crate::common::{stack_manager, wait_until, FakeControlPlane, FakeDeployer};

fn payload(id: i64, name: &str, version: i64) -> EdgeStackPayload {
    EdgeStackPayload {
        id,
        name: name.to_string(),
        version,
        stack_file_content: format!("services:\n  {}:\n    image: nginx\n", name),
        prune: false,
        namespace: None,
        registry_credentials: Vec::new(),
    }
}

#[tokio::test]
async fn test_update_stacks_status_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeControlPlane::new();
    client.add_config(1, "web", "services: {}");
    let manager = stack_manager(client.clone(), FakeDeployer::new(), dir.path());

    let desired = HashMap::from([(1, 1)]);
    manager.update_stacks_status(desired.clone()).await.unwrap();
    manager.update_stacks_status(desired).await.unwrap();

    assert_eq!(client.config_requests.load(Ordering::SeqCst), 1);
    assert_eq!(client.count_status(1, EdgeStackStatus::Acknowledged), 1);

    let stack = manager.stack(1).await.unwrap();
    assert_eq!(stack.status, StackStatus::Pending);
    assert_eq!(stack.action, StackAction::Deploy);
    let manifest = dir.path().join("1").join("docker-compose.yml");
    assert_eq!(std::fs::read_to_string(manifest).unwrap(), "services: {}");
}

#[tokio::test]
async fn test_missing_stacks_are_scheduled_for_removal() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeControlPlane::new();
    client.add_config(1, "web", "services: {}");
    client.add_config(2, "db", "services: {}");
    let manager = stack_manager(client.clone(), FakeDeployer::new(), dir.path());

    manager
        .update_stacks_status(HashMap::from([(1, 1), (2, 1)]))
        .await
        .unwrap();
    manager
        .update_stacks_status(HashMap::from([(1, 1)]))
        .await
        .unwrap();

    assert_eq!(manager.stack(2).await.unwrap().action, StackAction::Delete);
    assert_eq!(manager.stack(1).await.unwrap().action, StackAction::Deploy);
}

#[tokio::test]
async fn test_unavailable_config_is_retried_next_poll() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeControlPlane::new();
    let manager = stack_manager(client.clone(), FakeDeployer::new(), dir.path());

    manager
        .update_stacks_status(HashMap::from([(7, 1)]))
        .await
        .unwrap();
    assert!(manager.stack(7).await.is_none());

    client.add_config(7, "late", "services: {}");
    manager
        .update_stacks_status(HashMap::from([(7, 1)]))
        .await
        .unwrap();
    assert!(manager.stack(7).await.is_some());
    assert_eq!(client.config_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_deploys_never_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeControlPlane::new();
    let deployer = FakeDeployer::with_delay(Duration::from_millis(30));
    let manager = stack_manager(client.clone(), deployer.clone(), dir.path());

    for id in 1..=5 {
        manager
            .deploy_stack(&payload(id, &format!("app{}", id), 1))
            .await
            .unwrap();
    }
    manager.start().await;

    let done = wait_until(|| {
        (1..=5).all(|id| client.count_status(id, EdgeStackStatus::Ok) == 1)
    })
    .await;
    manager.stop().await;

    assert!(done);
    assert_eq!(deployer.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pending_stacks_are_processed_in_arrival_order() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeControlPlane::new();
    let deployer = FakeDeployer::new();
    let manager = stack_manager(client.clone(), deployer.clone(), dir.path());

    for (id, name) in [(3, "c"), (1, "a"), (2, "b")] {
        manager.deploy_stack(&payload(id, name, 1)).await.unwrap();
    }
    manager.start().await;
    assert!(wait_until(|| deployer.calls().len() == 3).await);
    manager.stop().await;

    assert_eq!(
        deployer.calls(),
        vec!["deploy:edge_c", "deploy:edge_a", "deploy:edge_b"]
    );
}

#[tokio::test]
async fn test_result_of_superseded_version_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeControlPlane::new();
    let deployer = FakeDeployer::with_delay(Duration::from_millis(200));
    let manager = stack_manager(client.clone(), deployer.clone(), dir.path());

    manager.deploy_stack(&payload(1, "web", 1)).await.unwrap();
    manager.start().await;
    assert!(wait_until(|| deployer.calls().len() == 1).await);

    // Version 2 arrives while version 1 is still being applied
    manager.deploy_stack(&payload(1, "web", 2)).await.unwrap();

    assert!(wait_until(|| client.count_status(1, EdgeStackStatus::Ok) == 1).await);
    tokio::time::sleep(Duration::from_millis(300)).await;
    manager.stop().await;

    assert_eq!(deployer.calls().len(), 2);
    assert_eq!(client.count_status(1, EdgeStackStatus::Ok), 1);
    let stack = manager.stack(1).await.unwrap();
    assert_eq!(stack.version, 2);
    assert_eq!(stack.status, StackStatus::Done);
}

#[tokio::test]
async fn test_failed_deploy_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeControlPlane::new();
    let deployer = FakeDeployer::new();
    deployer.fail_deploy.store(true, Ordering::SeqCst);
    let manager = stack_manager(client.clone(), deployer, dir.path());

    manager.deploy_stack(&payload(4, "broken", 1)).await.unwrap();
    manager.start().await;
    assert!(wait_until(|| client.count_status(4, EdgeStackStatus::Error) == 1).await);
    manager.stop().await;

    let stack = manager.stack(4).await.unwrap();
    assert_eq!(stack.status, StackStatus::Error);
    assert!(stack.error.unwrap().contains("engine refused"));
    assert_eq!(client.count_status(4, EdgeStackStatus::Ok), 0);
}

#[tokio::test]
async fn test_failed_removal_is_retried() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeControlPlane::new();
    let deployer = FakeDeployer::new();
    let manager = stack_manager(client.clone(), deployer.clone(), dir.path());

    manager.deploy_stack(&payload(9, "web", 1)).await.unwrap();
    manager.start().await;
    assert!(wait_until(|| client.count_status(9, EdgeStackStatus::Ok) == 1).await);

    deployer.fail_remove.store(true, Ordering::SeqCst);
    manager.delete_stack(9).await.unwrap();
    let removes = || {
        deployer
            .calls()
            .iter()
            .filter(|c| c.starts_with("remove:"))
            .count()
    };
    assert!(wait_until(|| removes() >= 2).await);
    assert!(manager.stack(9).await.is_some());
    assert_eq!(client.count_status(9, EdgeStackStatus::Remove), 0);

    deployer.fail_remove.store(false, Ordering::SeqCst);
    assert!(wait_until(|| client.count_status(9, EdgeStackStatus::Remove) == 1).await);
    manager.stop().await;

    assert!(manager.stack(9).await.is_none());
    assert!(!dir.path().join("9").exists());
}

#[tokio::test]
async fn test_delete_of_unknown_stack_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeControlPlane::new();
    let manager = stack_manager(client.clone(), FakeDeployer::new(), dir.path());

    manager.delete_stack(42).await.unwrap();
    assert!(manager.stack(42).await.is_none());
    assert!(client.statuses.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_engine_switch() {
    let dir = tempfile::tempdir().unwrap();
    let manager = stack_manager(FakeControlPlane::new(), FakeDeployer::new(), dir.path());
    manager.start().await;

    manager.set_engine_status(EngineType::Standalone).await.unwrap();
    assert!(manager.is_running().await);

    manager.set_engine_status(EngineType::Swarm).await.unwrap();
    assert!(!manager.is_running().await);
    assert_eq!(manager.engine(), EngineType::Swarm);

    manager.start().await;
    manager.start().await;
    assert!(manager.is_running().await);
    manager.stop().await;
    manager.stop().await;
    assert!(!manager.is_running().await);
}
