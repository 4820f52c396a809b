/// Integration tests for primary/secondary failover over the
/// in-process hub: two buses heartbeating each other, one monitor per
/// side arbitrating the same pair.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sentinel_monitoring::transport::MemoryHub;
use sentinel_monitoring::{
    factory, FailoverPair, HostName, MonitoringConfig, NodeMonitoring,
    PrimarySecondaryRole, PrimarySecondaryServiceMonitor, RoleChangeHandler,
};

fn host(name: &str) -> HostName {
    name.parse().unwrap()
}

fn fast_config() -> MonitoringConfig {
    MonitoringConfig::new()
        .heartbeat_interval(Duration::from_millis(50))
        .timeout_multiplier(3)
        .sweep_interval(Duration::from_millis(25))
}

fn make_bus(hub: &MemoryHub, name: &str) -> NodeMonitoring {
    factory::create_with_connector(
        host(name),
        "failover-itest",
        Box::new(hub.connector(host(name))),
        None,
        fast_config(),
    )
    .expect("bus")
}

/// Collects every role notification it receives.
struct RoleLog(Mutex<Vec<PrimarySecondaryRole>>);

impl RoleLog {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Vec::new())))
    }

    fn roles(&self) -> Vec<PrimarySecondaryRole> {
        self.0.lock().expect("role log lock").clone()
    }
}

impl RoleChangeHandler for RoleLog {
    fn role_changed(&self, role: PrimarySecondaryRole) {
        self.0.lock().expect("role log lock").push(role);
    }
}

async fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

fn pair() -> FailoverPair {
    FailoverPair::new(host("primary-host"), host("secondary-host")).expect("pair")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failover_and_failback_fire_exactly_once_each() {
    let hub = MemoryHub::new();
    let primary_bus = make_bus(&hub, "primary-host");
    let secondary_bus = make_bus(&hub, "secondary-host");
    primary_bus.start(false).await.expect("start primary");
    secondary_bus.start(false).await.expect("start secondary");

    let primary_log = RoleLog::new();
    let primary_monitor = PrimarySecondaryServiceMonitor::new(
        &primary_bus,
        pair(),
        primary_log.clone(),
    )
    .expect("primary monitor");

    let secondary_log = RoleLog::new();
    let secondary_monitor = PrimarySecondaryServiceMonitor::new(
        &secondary_bus,
        pair(),
        secondary_log.clone(),
    )
    .expect("secondary monitor");

    // Let the secondary observe the primary's heartbeats first.
    assert!(
        wait_until(Duration::from_secs(2), || {
            secondary_bus.node_state(&host("primary-host")).is_some()
        })
        .await,
        "secondary sees primary heartbeats"
    );

    primary_monitor.enable_handler(true);
    secondary_monitor.enable_handler(true);

    assert_eq!(primary_log.roles(), vec![PrimarySecondaryRole::Primary]);
    assert_eq!(secondary_log.roles(), vec![PrimarySecondaryRole::Secondary]);

    // Primary goes silent → the secondary takes over, exactly once.
    primary_bus.stop().await;
    assert!(
        wait_until(Duration::from_secs(2), || {
            secondary_monitor.current_role() == Some(PrimarySecondaryRole::Primary)
        })
        .await,
        "secondary assumes Primary after the timeout"
    );
    assert_eq!(
        secondary_log.roles(),
        vec![PrimarySecondaryRole::Secondary, PrimarySecondaryRole::Primary]
    );

    // Primary returns → the secondary yields, exactly once; the
    // primary side never left Primary.
    primary_bus.start(false).await.expect("restart primary");
    assert!(
        wait_until(Duration::from_secs(2), || {
            secondary_monitor.current_role() == Some(PrimarySecondaryRole::Secondary)
        })
        .await,
        "secondary yields once the primary is back"
    );
    assert_eq!(
        secondary_log.roles(),
        vec![
            PrimarySecondaryRole::Secondary,
            PrimarySecondaryRole::Primary,
            PrimarySecondaryRole::Secondary
        ]
    );
    assert_eq!(primary_log.roles(), vec![PrimarySecondaryRole::Primary]);
    assert_eq!(
        primary_monitor.current_role(),
        Some(PrimarySecondaryRole::Primary)
    );

    primary_bus.stop().await;
    secondary_bus.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disabled_monitor_stays_silent_through_a_failover_window() {
    let hub = MemoryHub::new();
    let primary_bus = make_bus(&hub, "primary-host");
    let secondary_bus = make_bus(&hub, "secondary-host");
    primary_bus.start(false).await.expect("start primary");
    secondary_bus.start(false).await.expect("start secondary");

    let log = RoleLog::new();
    let monitor =
        PrimarySecondaryServiceMonitor::new(&secondary_bus, pair(), log.clone())
            .expect("monitor");

    assert!(
        wait_until(Duration::from_secs(2), || {
            secondary_bus.node_state(&host("primary-host")).is_some()
        })
        .await
    );

    monitor.enable_handler(true);
    assert_eq!(log.roles(), vec![PrimarySecondaryRole::Secondary]);

    // Pause failover, then let the primary die and return.
    monitor.enable_handler(false);

    primary_bus.stop().await;
    assert!(
        wait_until(Duration::from_secs(2), || {
            secondary_bus.node_state(&host("primary-host"))
                == Some(sentinel_monitoring::RemoteNodeState::Missing)
        })
        .await,
        "liveness still transitions underneath"
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        log.roles(),
        vec![PrimarySecondaryRole::Secondary],
        "no callback fires while disarmed"
    );

    // Re-enabling mid-outage re-evaluates: the role now differs, so
    // exactly one callback fires.
    monitor.enable_handler(true);
    assert_eq!(
        log.roles(),
        vec![PrimarySecondaryRole::Secondary, PrimarySecondaryRole::Primary]
    );

    // Disable again, let the primary come back, re-enable.
    monitor.enable_handler(false);
    primary_bus.start(false).await.expect("restart primary");
    assert!(
        wait_until(Duration::from_secs(2), || {
            secondary_bus.node_state(&host("primary-host"))
                == Some(sentinel_monitoring::RemoteNodeState::Active)
        })
        .await
    );
    monitor.enable_handler(true);
    assert_eq!(
        log.roles(),
        vec![
            PrimarySecondaryRole::Secondary,
            PrimarySecondaryRole::Primary,
            PrimarySecondaryRole::Secondary
        ]
    );

    primary_bus.stop().await;
    secondary_bus.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn third_party_arbiter_follows_the_pair() {
    let hub = MemoryHub::new();
    let arbiter_bus = make_bus(&hub, "arbiter-host");
    let primary_bus = make_bus(&hub, "primary-host");
    arbiter_bus.start(false).await.expect("start arbiter");
    primary_bus.start(false).await.expect("start primary");

    // The arbiter decides on behalf of the designated secondary.
    let log = RoleLog::new();
    let monitor = PrimarySecondaryServiceMonitor::with_subject(
        &arbiter_bus,
        pair(),
        host("secondary-host"),
        log.clone(),
    )
    .expect("arbiter monitor");

    assert!(
        wait_until(Duration::from_secs(2), || {
            arbiter_bus.node_state(&host("primary-host")).is_some()
        })
        .await
    );

    monitor.enable_handler(true);
    assert_eq!(log.roles(), vec![PrimarySecondaryRole::Secondary]);

    primary_bus.stop().await;
    assert!(
        wait_until(Duration::from_secs(2), || {
            monitor.current_role() == Some(PrimarySecondaryRole::Primary)
        })
        .await,
        "arbiter promotes the secondary when the primary dies"
    );

    arbiter_bus.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn subject_outside_pair_is_rejected() {
    let hub = MemoryHub::new();
    let bus = make_bus(&hub, "unrelated-host");

    let log = RoleLog::new();
    let result = PrimarySecondaryServiceMonitor::new(&bus, pair(), log);
    assert!(matches!(
        result,
        Err(sentinel_monitoring::MonitoringError::NotPairMember { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dropped_monitor_deregisters_its_observer() {
    let hub = MemoryHub::new();
    let primary_bus = make_bus(&hub, "primary-host");
    let secondary_bus = make_bus(&hub, "secondary-host");
    primary_bus.start(false).await.expect("start primary");
    secondary_bus.start(false).await.expect("start secondary");

    let log = RoleLog::new();
    {
        let monitor =
            PrimarySecondaryServiceMonitor::new(&secondary_bus, pair(), log.clone())
                .expect("monitor");
        assert!(
            wait_until(Duration::from_secs(2), || {
                secondary_bus.node_state(&host("primary-host")).is_some()
            })
            .await
        );
        monitor.enable_handler(true);
        assert_eq!(log.roles(), vec![PrimarySecondaryRole::Secondary]);
    }

    // Monitor is gone; a failover window must not reach its handler.
    primary_bus.stop().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(log.roles(), vec![PrimarySecondaryRole::Secondary]);

    secondary_bus.stop().await;
}
