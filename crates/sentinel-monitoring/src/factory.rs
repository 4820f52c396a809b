/// Construction entry points for buses and clients, plus the guarded
/// process-wide singleton.
///
/// The singleton is explicit state behind init-once/get/teardown
/// operations; there is no ambient global a caller can reach by name
/// without going through these functions.
use std::sync::{Arc, Mutex, OnceLock};

use sentinel_transport::{TcpMeshConnector, TransportConfig, TransportConnector};

use crate::bus::NodeMonitoring;
use crate::client::NodeMonitoringClient;
use crate::config::MonitoringConfig;
use crate::error::MonitoringError;
use crate::types::{HostName, NodeStateChangeHandler};

/// Create a full bus over the TCP mesh.
///
/// `transport.endpoints` are the peer listeners (excluding this node's
/// own). An optional initial node-state observer is registered before
/// anything can fire. Fails fast on invalid configuration.
pub fn create(
    my_hostname: HostName,
    service_name: &str,
    transport: TransportConfig,
    initial_state_handler: Option<Arc<dyn NodeStateChangeHandler>>,
    config: MonitoringConfig,
) -> Result<NodeMonitoring, MonitoringError> {
    let connector = TcpMeshConnector::new(transport)?;
    create_with_connector(
        my_hostname,
        service_name,
        Box::new(connector),
        initial_state_handler,
        config,
    )
}

/// Create a full bus over a custom transport connector.
pub fn create_with_connector(
    my_hostname: HostName,
    service_name: &str,
    connector: Box<dyn TransportConnector>,
    initial_state_handler: Option<Arc<dyn NodeStateChangeHandler>>,
    config: MonitoringConfig,
) -> Result<NodeMonitoring, MonitoringError> {
    let bus = NodeMonitoring::new(my_hostname, service_name, connector, config)?;
    if let Some(handler) = initial_state_handler {
        bus.add_node_state_change_handler(handler);
    }
    Ok(bus)
}

/// Create a publish-only client over the TCP mesh.
pub async fn create_client(
    my_hostname: HostName,
    transport: TransportConfig,
) -> Result<NodeMonitoringClient, MonitoringError> {
    let connector = TcpMeshConnector::new(transport)?;
    NodeMonitoringClient::connect(my_hostname, &connector).await
}

/// Create a publish-only client over a custom transport connector.
pub async fn create_client_with_connector(
    my_hostname: HostName,
    connector: &dyn TransportConnector,
) -> Result<NodeMonitoringClient, MonitoringError> {
    NodeMonitoringClient::connect(my_hostname, connector).await
}

fn singleton_slot() -> &'static Mutex<Option<Arc<NodeMonitoring>>> {
    static SLOT: OnceLock<Mutex<Option<Arc<NodeMonitoring>>>> = OnceLock::new();
    SLOT.get_or_init(|| Mutex::new(None))
}

/// Initialize the process-wide singleton bus, or return the existing
/// one.
///
/// A second call does not reconfigure anything: the already-created
/// instance is returned and a warning is logged, since it will not
/// reflect the newly passed parameters.
pub fn init_singleton(
    my_hostname: HostName,
    service_name: &str,
    transport: TransportConfig,
    initial_state_handler: Option<Arc<dyn NodeStateChangeHandler>>,
    config: MonitoringConfig,
) -> Result<Arc<NodeMonitoring>, MonitoringError> {
    let connector = TcpMeshConnector::new(transport)?;
    init_singleton_with_connector(
        my_hostname,
        service_name,
        Box::new(connector),
        initial_state_handler,
        config,
    )
}

/// [`init_singleton`] over a custom transport connector.
pub fn init_singleton_with_connector(
    my_hostname: HostName,
    service_name: &str,
    connector: Box<dyn TransportConnector>,
    initial_state_handler: Option<Arc<dyn NodeStateChangeHandler>>,
    config: MonitoringConfig,
) -> Result<Arc<NodeMonitoring>, MonitoringError> {
    let mut slot = singleton_slot().lock().expect("singleton lock");
    if let Some(existing) = slot.as_ref() {
        tracing::warn!(
            "returning the already-created singleton bus; the new parameters are ignored"
        );
        return Ok(existing.clone());
    }
    let bus = Arc::new(create_with_connector(
        my_hostname,
        service_name,
        connector,
        initial_state_handler,
        config,
    )?);
    *slot = Some(bus.clone());
    Ok(bus)
}

/// The singleton bus, if one was initialized.
pub fn singleton() -> Option<Arc<NodeMonitoring>> {
    singleton_slot().lock().expect("singleton lock").clone()
}

/// Release the singleton slot, returning the instance so the caller
/// can stop it. A later [`init_singleton`] creates a fresh bus.
pub fn teardown_singleton() -> Option<Arc<NodeMonitoring>> {
    singleton_slot().lock().expect("singleton lock").take()
}
