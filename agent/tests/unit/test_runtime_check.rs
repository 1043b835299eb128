use std::time::Duration;

use edge_agent::models::stack::EngineType;
use edge_agent::poll::PollService;
use edge_agent::workers::runtime_check::check_runtime;

use crate::common::{poll_options, Harness};

fn service(h: &mut Harness) -> PollService {
    PollService::new(poll_options(false, Duration::from_secs(3600)), h.context())
}

#[tokio::test]
async fn test_responsible_node_runs_edge_duties() {
    let mut h = Harness::new();
    let poll = service(&mut h);

    assert_eq!(check_runtime(h.engine.as_ref(), &poll, &h.stacks).await, Some(true));
    assert!(poll.is_running().await);
    assert!(h.stacks.is_running().await);

    // Repeated checks keep a single set of workers
    assert_eq!(check_runtime(h.engine.as_ref(), &poll, &h.stacks).await, Some(true));
    assert!(poll.is_running().await);

    poll.stop().await;
    h.stacks.stop().await;
}

#[tokio::test]
async fn test_losing_leadership_stops_edge_duties() {
    let mut h = Harness::new();
    let poll = service(&mut h);
    check_runtime(h.engine.as_ref(), &poll, &h.stacks).await;

    h.engine.set_role(EngineType::Swarm, false);
    assert_eq!(check_runtime(h.engine.as_ref(), &poll, &h.stacks).await, Some(false));
    assert!(!poll.is_running().await);
    assert!(!h.stacks.is_running().await);
}

#[tokio::test]
async fn test_engine_change_switches_stack_manager() {
    let mut h = Harness::new();
    let poll = service(&mut h);

    h.engine.set_role(EngineType::Swarm, true);
    assert_eq!(check_runtime(h.engine.as_ref(), &poll, &h.stacks).await, Some(true));
    assert_eq!(h.stacks.engine(), EngineType::Swarm);
    assert!(h.stacks.is_running().await);

    poll.stop().await;
    h.stacks.stop().await;
}

#[tokio::test]
async fn test_unknown_role_changes_nothing() {
    let mut h = Harness::new();
    let poll = service(&mut h);
    check_runtime(h.engine.as_ref(), &poll, &h.stacks).await;

    *h.engine.role.lock().unwrap() = Err("daemon unreachable".to_string());
    assert_eq!(check_runtime(h.engine.as_ref(), &poll, &h.stacks).await, None);
    assert!(poll.is_running().await);
    assert!(h.stacks.is_running().await);

    poll.stop().await;
    h.stacks.stop().await;
}
