use edge_agent::filesys::dir::Dir;
use edge_agent::models::command::LogRequest;
use edge_agent::models::stack::{composed_name, Stack};
use edge_agent::workers::log_collector::LogCollector;

use crate::common::Harness;

#[tokio::test]
async fn test_stack_logs_use_deployed_project_name() {
    let h = Harness::new();
    let collector = LogCollector {
        client: h.client.clone(),
        engine: h.engine.clone(),
        scheduler: h.scheduler.clone(),
        jobs_dir: Dir::new(h.dir.path().join("jobs")),
    };

    collector
        .collect(&LogRequest::Stack {
            id: 4,
            name: "web".to_string(),
        })
        .await
        .unwrap();

    let mut stack = Stack::new(4, 1, h.stacks_dir().join("4"));
    stack.name = "web".to_string();
    assert_eq!(composed_name("web"), stack.composed_name());
    assert_eq!(
        *h.client.stack_logs.lock().unwrap(),
        vec![(4, format!("logs of {}", stack.composed_name()))]
    );
}
