//! Integration tests

mod test_activity;
mod test_dispatch;
mod test_edge_client;
mod test_fsm;
mod test_log_collector;
mod test_poll_async;
mod test_runtime_check;
mod test_stacks;
mod test_tunnel;
