use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use edge_agent::models::command::LogRequest;
use edge_agent::models::stack::StackStatus;
use edge_agent::poll::dispatch::dispatch_commands;
use edge_agent::scheduler::Scheduler;
use edge_api::{EdgeStackStatus, RawCommand};
use serde_json::json;

use crate::common::{wait_until, Harness};

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn command(id: i64, command_type: &str, operation: &str, value: serde_json::Value) -> RawCommand {
    RawCommand {
        id,
        command_type: command_type.to_string(),
        endpoint_id: 1,
        timestamp: at(id),
        operation: operation.to_string(),
        path: String::new(),
        value,
    }
}

#[tokio::test]
async fn test_cursor_advances_past_every_command_in_order() {
    let mut h = Harness::new();
    let ctx = h.context();
    h.engine.fail_ops.store(true, Ordering::SeqCst);

    dispatch_commands(
        &ctx,
        vec![
            command(1, "teleport", "add", json!({})),
            command(
                2,
                "container",
                "add",
                json!({"ContainerName": "web-1", "ContainerOperation": "restart"}),
            ),
            command(
                3,
                "image",
                "add",
                json!({"ImageName": "nginx:latest", "ImageOperation": "delete"}),
            ),
        ],
    )
    .await;

    assert_eq!(*h.client.cursor_updates.lock().unwrap(), vec![at(1), at(2), at(3)]);
    assert_eq!(*h.client.cursor.lock().unwrap(), Some(at(3)));
    assert_eq!(
        h.engine.ops(),
        vec!["container:Restart:web-1:false", "image:nginx:latest"]
    );
}

#[tokio::test]
async fn test_edge_stack_command_deploys_once() {
    let mut h = Harness::new();
    let ctx = h.context();

    dispatch_commands(
        &ctx,
        vec![command(
            1,
            "edgeStack",
            "add",
            json!({"ID": 8, "Name": "web", "Version": 1, "StackFileContent": "services: {}"}),
        )],
    )
    .await;

    let manifest = h.stacks_dir().join("8").join("docker-compose.yml");
    assert_eq!(std::fs::read_to_string(manifest).unwrap(), "services: {}");

    h.stacks.start().await;
    assert!(wait_until(|| h.client.count_status(8, EdgeStackStatus::Ok) == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.stacks.stop().await;

    assert_eq!(
        h.client.statuses_for(8),
        vec![
            (EdgeStackStatus::Acknowledged, String::new()),
            (EdgeStackStatus::Ok, String::new()),
        ]
    );
    assert_eq!(h.stacks.stack(8).await.unwrap().status, StackStatus::Done);
}

#[tokio::test]
async fn test_edge_stack_remove_schedules_removal() {
    let mut h = Harness::new();
    let ctx = h.context();
    let value = json!({"ID": 8, "Name": "web", "Version": 1, "StackFileContent": "services: {}"});

    dispatch_commands(
        &ctx,
        vec![
            command(1, "edgeStack", "add", value.clone()),
            command(2, "edgeStack", "remove", value),
        ],
    )
    .await;

    h.stacks.start().await;
    assert!(wait_until(|| h.client.count_status(8, EdgeStackStatus::Remove) == 1).await);
    h.stacks.stop().await;

    assert_eq!(h.deployer.calls(), vec!["remove:edge_web"]);
    assert!(h.stacks.stack(8).await.is_none());
}

#[tokio::test]
async fn test_job_and_log_commands() {
    let mut h = Harness::new();
    let ctx = h.context();

    dispatch_commands(
        &ctx,
        vec![
            command(
                1,
                "edgeJob",
                "add",
                json!({"Id": 5, "CronExpression": "* * * * *", "Script": "ZWNobw==", "Version": 2}),
            ),
            command(
                2,
                "edgeLog",
                "add",
                json!({"EdgeStackID": 8, "EdgeStackName": "web"}),
            ),
        ],
    )
    .await;

    assert_eq!(h.scheduler.jobs_status().await[&5].version, 2);
    let request = tokio::time::timeout(Duration::from_secs(1), h.log_receiver.recv())
        .await
        .unwrap();
    assert_eq!(
        request,
        Some(LogRequest::Stack {
            id: 8,
            name: "web".to_string()
        })
    );
}
