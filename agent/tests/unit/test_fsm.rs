use std::path::PathBuf;

use edge_agent::deploy::fsm::StackEvent;
use edge_agent::models::stack::{Stack, StackAction, StackStatus};

fn stack() -> Stack {
    let mut stack = Stack::new(1, 1, PathBuf::from("/var/lib/edge-agent/stacks/1"));
    stack.name = "web".to_string();
    stack.file_name = "docker-compose.yml".to_string();
    stack
}

#[test]
fn test_deploy_then_update_then_remove() {
    let mut stack = stack();
    assert!(stack.status.is_actionable());

    stack.process(StackEvent::StartDeploy).unwrap();
    stack.process(StackEvent::Deployed).unwrap();
    stack.process(StackEvent::Running).unwrap();
    assert_eq!(stack.status, StackStatus::Done);
    assert_eq!(stack.action, StackAction::Idle);
    assert!(!stack.status.is_actionable());

    stack.process(StackEvent::Schedule(StackAction::Update)).unwrap();
    assert_eq!(stack.status, StackStatus::Pending);
    stack.process(StackEvent::StartDeploy).unwrap();
    stack.process(StackEvent::Deployed).unwrap();
    stack.process(StackEvent::Running).unwrap();

    stack.process(StackEvent::Schedule(StackAction::Delete)).unwrap();
    stack.process(StackEvent::StartRemove).unwrap();
    assert_eq!(stack.status, StackStatus::Removing);
    assert_eq!(
        stack.manifest_path(),
        PathBuf::from("/var/lib/edge-agent/stacks/1/docker-compose.yml")
    );
}

#[test]
fn test_redeploy_while_awaiting_status() {
    let mut stack = stack();
    stack.process(StackEvent::StartDeploy).unwrap();
    stack.process(StackEvent::Deployed).unwrap();

    stack.process(StackEvent::Schedule(StackAction::Update)).unwrap();
    assert_eq!(stack.status, StackStatus::Pending);

    // The result of the superseded deployment no longer applies
    assert!(stack.process(StackEvent::Running).is_err());
    assert_eq!(stack.status, StackStatus::Pending);
}

#[test]
fn test_failed_removal_keeps_error_until_rescheduled() {
    let mut stack = stack();
    stack.process(StackEvent::Schedule(StackAction::Delete)).unwrap();
    stack.process(StackEvent::StartRemove).unwrap();
    stack
        .process(StackEvent::RemoveFailed("stack is busy".to_string()))
        .unwrap();
    assert_eq!(stack.status, StackStatus::Retry);
    assert_eq!(stack.error.as_deref(), Some("stack is busy"));

    stack.process(StackEvent::StartRemove).unwrap();
    assert_eq!(stack.status, StackStatus::Removing);

    stack.process(StackEvent::Schedule(StackAction::Deploy)).unwrap();
    assert!(stack.error.is_none());
    assert_eq!(stack.action, StackAction::Deploy);
}
