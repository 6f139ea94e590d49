//! End-to-end canary cycles against the in-memory platform

use std::sync::Arc;
use std::time::Duration;

use canary_engine::testing::{test_config, FakePlatform};
use canary_engine::{Canary, CanaryConfig};
use canary_metrics::{Operation, Unexpected};
use serde_json::Value;

fn canary(platform: &Arc<FakePlatform>) -> Canary {
    Canary::new(platform.context(CanaryConfig {
        change_guarantee: Duration::from_secs(1),
        ..test_config()
    }))
}

async fn run_cycle(canary: &Canary) {
    canary
        .start_cycle()
        .expect("cycle should start")
        .await
        .expect("cycle task should not fail");
}

fn assert_no_unexpected(canary: &Canary) {
    for kind in Unexpected::ALL {
        assert_eq!(canary.metrics().unexpected_count(kind), 0, "{}", kind);
    }
}

#[tokio::test(start_paused = true)]
async fn test_healthy_platform_passes_every_check() {
    let platform = Arc::new(FakePlatform::new());
    let canary = canary(&platform);

    run_cycle(&canary).await;

    assert_no_unexpected(&canary);
    let metrics = canary.metrics();
    for op in Operation::ALL {
        assert_eq!(metrics.errors(op), 0, "{}", op);
    }
    for op in [
        Operation::Auth,
        Operation::ConnectorLogin,
        Operation::ConnectorSubscribe,
        Operation::ConnectorPublish,
        Operation::DeviceDataRequest,
        Operation::NotificationPublish,
        Operation::NotificationRead,
        Operation::NotificationDelete,
        Operation::ProcessPreparedDeployment,
        Operation::ProcessDeployment,
        Operation::ProcessStart,
    ] {
        assert_eq!(metrics.count(op), 1, "{}", op);
    }
    assert_eq!(metrics.process_instance_duration_ms(), 42.0);

    let state = platform.snapshot();
    assert_eq!(state.logins, 1);
    assert_eq!(state.logouts, 1);
    assert!(state.online.is_empty());
    assert!(state.notifications.is_empty());
    assert!(state.deployments.is_empty());
    assert!(!canary.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_published_value_reads_back_as_number() {
    let platform = Arc::new(FakePlatform::new());
    let canary = canary(&platform);

    run_cycle(&canary).await;

    let state = platform.snapshot();
    let event = state
        .published
        .iter()
        .find(|m| m.topic.starts_with("event/"))
        .expect("sensor event published");
    let body: Value = serde_json::from_slice(&event.payload).unwrap();
    let published: i64 = body["data"].as_str().unwrap().parse().unwrap();

    let stored: Vec<&Value> = state.last_values.values().collect();
    assert_eq!(stored, vec![&Value::from(published)]);
    assert_eq!(canary.metrics().unexpected_count(Unexpected::DeviceData), 0);
}

#[tokio::test(start_paused = true)]
async fn test_string_last_value_is_unexpected_data() {
    let platform = Arc::new(FakePlatform::new());
    platform.behave(|b| b.string_last_values = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    assert_eq!(canary.metrics().unexpected_count(Unexpected::DeviceData), 1);
}

#[tokio::test(start_paused = true)]
async fn test_trigger_during_cycle_is_ignored() {
    let platform = Arc::new(FakePlatform::new());
    let canary = canary(&platform);

    let running = canary.start_cycle().expect("first trigger starts a cycle");
    assert!(canary.is_running());
    assert!(canary.start_cycle().is_none());
    assert!(canary.clone().start_cycle().is_none());

    running.await.unwrap();
    assert!(!canary.is_running());
    assert_eq!(platform.snapshot().logins, 1);

    run_cycle(&canary).await;
    assert_eq!(platform.snapshot().logins, 2);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_cycles_reuse_setup() {
    let platform = Arc::new(FakePlatform::new());
    let canary = canary(&platform);

    run_cycle(&canary).await;
    let first = platform.snapshot();
    run_cycle(&canary).await;
    let second = platform.snapshot();

    assert_eq!(second.devices.len(), 1);
    assert_eq!(second.device_types.len(), 1);
    assert_eq!(second.hubs.len(), 1);
    assert_eq!(first.devices[0].id, second.devices[0].id);
    assert_eq!(first.hubs[0].id, second.hubs[0].id);
    assert_no_unexpected(&canary);
}

#[tokio::test(start_paused = true)]
async fn test_stale_hub_is_repaired() {
    let platform = Arc::new(FakePlatform::new());
    let stale = platform.seed_hub("canary-hub", &["someone-else"]);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    let state = platform.snapshot();
    assert_eq!(state.hubs.len(), 1);
    assert_eq!(state.hubs[0].id, stale.id);
    assert!(state.hubs[0].lists_device(&state.devices[0]));
    assert_eq!(canary.metrics().errors(Operation::ConnectorLogin), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stale_index_is_reported() {
    let platform = Arc::new(FakePlatform::new());
    platform.behave(|b| b.stale_index = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    let metrics = canary.metrics();
    assert_eq!(metrics.unexpected_count(Unexpected::PermissionsMetadata), 1);
    assert_eq!(metrics.unexpected_count(Unexpected::DeviceRepoMetadata), 0);
}

#[tokio::test(start_paused = true)]
async fn test_device_not_online_while_connected_is_reported() {
    let platform = Arc::new(FakePlatform::new());
    platform.behave(|b| b.device_stays_offline = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    let metrics = canary.metrics();
    assert_eq!(metrics.unexpected_count(Unexpected::DeviceOfflineState), 1);
    assert_eq!(metrics.unexpected_count(Unexpected::DeviceOnlineState), 0);
}

#[tokio::test(start_paused = true)]
async fn test_device_online_after_disconnect_is_reported() {
    let platform = Arc::new(FakePlatform::new());
    platform.behave(|b| b.device_stays_online_after_disconnect = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    let metrics = canary.metrics();
    assert_eq!(metrics.unexpected_count(Unexpected::DeviceOnlineState), 1);
    assert_eq!(metrics.unexpected_count(Unexpected::DeviceOfflineState), 0);
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_failure_is_counted() {
    let platform = Arc::new(FakePlatform::new());
    platform.behave(|b| b.fail_subscribe = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    let metrics = canary.metrics();
    assert_eq!(metrics.errors(Operation::ConnectorSubscribe), 1);
    assert_eq!(metrics.errors(Operation::ConnectorPublish), 0);
    // Commands have nowhere to go
    assert_eq!(metrics.unexpected_count(Unexpected::ProcessCommandCount), 1);
    assert_eq!(metrics.unexpected_count(Unexpected::DeviceData), 0);
}

#[tokio::test(start_paused = true)]
async fn test_publish_failure_is_counted() {
    let platform = Arc::new(FakePlatform::new());
    platform.behave(|b| b.fail_publish = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    let metrics = canary.metrics();
    assert_eq!(metrics.errors(Operation::ConnectorPublish), 1);
    assert_eq!(metrics.errors(Operation::ConnectorSubscribe), 0);
    // No value was stored, so the read-back cannot match
    assert_eq!(metrics.unexpected_count(Unexpected::DeviceData), 1);
    assert!(platform.snapshot().last_values.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stale_registry_name_is_reported() {
    let platform = Arc::new(FakePlatform::new());
    platform.behave(|b| b.stale_registry_name = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    let metrics = canary.metrics();
    assert_eq!(metrics.unexpected_count(Unexpected::DeviceRepoMetadata), 1);
    assert_eq!(metrics.unexpected_count(Unexpected::PermissionsMetadata), 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_index_result_is_uncategorized() {
    let platform = Arc::new(FakePlatform::new());
    platform.behave(|b| b.empty_index = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    let metrics = canary.metrics();
    assert_eq!(metrics.unexpected_count(Unexpected::Uncategorized), 1);
    assert_eq!(metrics.unexpected_count(Unexpected::PermissionsMetadata), 0);
    assert_eq!(metrics.errors(Operation::PermissionsRequest), 0);
}

#[tokio::test(start_paused = true)]
async fn test_commands_are_counted_and_answered() {
    let platform = Arc::new(FakePlatform::new());
    let canary = canary(&platform);

    run_cycle(&canary).await;

    assert_eq!(
        canary
            .metrics()
            .unexpected_count(Unexpected::ProcessCommandCount),
        0
    );
    let state = platform.snapshot();
    let response = state
        .published
        .iter()
        .find(|m| m.topic.starts_with("response/"))
        .expect("command answered");
    let body: Value = serde_json::from_slice(&response.payload).unwrap();
    assert!(body["correlation_id"].as_str().unwrap().starts_with("correlation-"));
    assert_eq!(body["payload"], serde_json::json!({"data": ""}));
}

#[tokio::test(start_paused = true)]
async fn test_missing_command_is_counted_once() {
    let platform = Arc::new(FakePlatform::new());
    platform.behave(|b| b.suppress_commands = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    assert_eq!(
        canary
            .metrics()
            .unexpected_count(Unexpected::ProcessCommandCount),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn test_unfinished_instance_is_reported() {
    let platform = Arc::new(FakePlatform::new());
    platform.behave(|b| b.leave_instances_running = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    let metrics = canary.metrics();
    assert_eq!(metrics.unexpected_count(Unexpected::ProcessInstanceState), 1);
    assert_eq!(metrics.process_instance_duration_ms(), 0.0);
    assert!(platform.snapshot().deployments.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_selectables_are_counted_per_selectable() {
    let platform = Arc::new(FakePlatform::new());
    platform.behave(|b| b.hide_selectables = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    let metrics = canary.metrics();
    assert_eq!(
        metrics.unexpected_count(Unexpected::ProcessPreparedDeploymentSelectables),
        2
    );
    // Non-fatal: the process still runs
    assert_eq!(metrics.count(Operation::ProcessStart), 1);
}

#[tokio::test(start_paused = true)]
async fn test_leftover_deployments_are_removed() {
    let platform = Arc::new(FakePlatform::new());
    platform.seed_deployment();
    platform.seed_deployment();
    let canary = canary(&platform);

    run_cycle(&canary).await;

    assert!(platform.snapshot().deployments.is_empty());
    assert_eq!(canary.metrics().unexpected_count(Unexpected::Uncategorized), 0);
}

#[tokio::test(start_paused = true)]
async fn test_lost_notification_is_reported_and_old_ones_cleaned() {
    let platform = Arc::new(FakePlatform::new());
    platform.seed_notification("left over");
    platform.behave(|b| b.drop_notifications = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    assert_eq!(
        canary
            .metrics()
            .unexpected_count(Unexpected::NotificationState),
        1
    );
    assert!(platform.snapshot().notifications.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_broker_outage_does_not_stop_other_probes() {
    let platform = Arc::new(FakePlatform::new());
    platform.behave(|b| b.fail_connect = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    let metrics = canary.metrics();
    assert_eq!(metrics.errors(Operation::ConnectorLogin), 1);
    assert_eq!(metrics.count(Operation::ConnectorPublish), 0);
    assert_eq!(metrics.count(Operation::NotificationDelete), 1);
    assert_eq!(metrics.count(Operation::ProcessStart), 1);
    assert_eq!(metrics.unexpected_count(Unexpected::PermissionsMetadata), 0);
    // Nobody listens for commands without a connection
    assert_eq!(metrics.unexpected_count(Unexpected::ProcessCommandCount), 1);
    assert_eq!(metrics.unexpected_count(Unexpected::DeviceOnlineState), 0);
    assert_eq!(platform.snapshot().logouts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_probe_is_contained() {
    let platform = Arc::new(FakePlatform::new());
    platform.behave(|b| b.panic_on_notification_list = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    let metrics = canary.metrics();
    assert_eq!(metrics.unexpected_count(Unexpected::Uncategorized), 1);
    assert_eq!(metrics.count(Operation::ProcessStart), 1);
    assert_eq!(platform.snapshot().logouts, 1);
    assert!(!canary.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_login_failure_aborts_cycle() {
    let platform = Arc::new(FakePlatform::new());
    platform.behave(|b| b.fail_login = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    let metrics = canary.metrics();
    assert_eq!(metrics.errors(Operation::Auth), 1);
    assert_eq!(metrics.count(Operation::PermissionsRequest), 0);
    assert_eq!(platform.snapshot().logouts, 0);
    assert!(!canary.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_setup_failure_skips_probes_but_logs_out() {
    let platform = Arc::new(FakePlatform::new());
    platform.behave(|b| b.fail_permissions = true);
    let canary = canary(&platform);

    run_cycle(&canary).await;

    let metrics = canary.metrics();
    assert_eq!(metrics.errors(Operation::PermissionsRequest), 1);
    assert_eq!(metrics.count(Operation::NotificationPublish), 0);
    assert_eq!(metrics.count(Operation::ConnectorLogin), 0);
    assert_eq!(platform.snapshot().logouts, 1);
    assert!(!canary.is_running());
}
