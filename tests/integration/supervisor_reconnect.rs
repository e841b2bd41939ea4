//! A process built from a `ProcessSupervisor` over a `FakeInterface`
//! recovers from a connect failure at startup and from the interface
//! dying mid-run, without the caller ever seeing a fatal callback,
//! matching spec.md scenario S6.

use std::time::Duration;

use hbus::supervisor::{InterfaceState, ProcessSupervisor, SupervisorConfig};
use hbus_test_utils::FakeInterface;

#[tokio::test(start_paused = true)]
async fn process_recovers_from_a_failed_first_connect() {
    let process = ProcessSupervisor::new();
    let iface = FakeInterface::new("flaky", 2);
    let supervisor = process.register_interface(iface.clone(), SupervisorConfig::default()).await;

    process.start_all().await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(supervisor.state(), InterfaceState::Running);
    assert_eq!(iface.connect_calls(), 3);
    assert_eq!(iface.subscribe_calls(), 1);

    process.shutdown_all().await;
    assert_eq!(process.wait_for_stop().await, 0);
    assert_eq!(iface.disconnect_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn process_reconnects_after_the_interface_dies_mid_run() {
    let process = ProcessSupervisor::new();
    let iface = FakeInterface::new("steady", 0);
    let supervisor = process.register_interface(iface.clone(), SupervisorConfig::default()).await;

    process.start_all().await.unwrap();
    assert_eq!(supervisor.state(), InterfaceState::Running);
    assert_eq!(iface.connect_calls(), 1);

    iface.kill();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(supervisor.state(), InterfaceState::Running);
    assert_eq!(iface.connect_calls(), 2);
    assert_eq!(iface.subscribe_calls(), 2, "reconnect must re-subscribe, not just re-connect");

    process.shutdown_all().await;
    assert_eq!(process.wait_for_stop().await, 0);
}

#[tokio::test]
async fn non_reconnecting_interface_failure_shuts_the_whole_process_down() {
    let process = ProcessSupervisor::new();
    let iface = FakeInterface::new("one-shot", 0);
    let config = SupervisorConfig { auto_reconnect: false, ..Default::default() };
    process.register_interface(iface.clone(), config).await;

    process.start_all().await.unwrap();
    iface.kill();

    let code = process.wait_for_stop().await;
    assert_eq!(code, 1);
}
