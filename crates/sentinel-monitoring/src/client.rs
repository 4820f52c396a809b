use tokio::sync::Mutex;

use sentinel_transport::{Transport, TransportConnector};

use crate::error::MonitoringError;
use crate::message::Message;
use crate::types::HostName;

/// Publish-only handle for processes that emit messages without
/// running the full subscriber loop: publish + identity + close.
///
/// Inbound frames are ignored: a client neither dispatches handlers
/// nor tracks liveness.
pub struct NodeMonitoringClient {
    my_hostname: HostName,
    transport: Mutex<Option<Box<dyn Transport>>>,
}

impl NodeMonitoringClient {
    /// Connect a client over the given transport connector.
    pub async fn connect(
        my_hostname: HostName,
        connector: &dyn TransportConnector,
    ) -> Result<Self, MonitoringError> {
        let transport = connector.connect().await?;
        Ok(Self {
            my_hostname,
            transport: Mutex::new(Some(transport)),
        })
    }

    /// Publish a message on its topic.
    ///
    /// The message's sender must be this client's own identity;
    /// spoofing another host's sender would corrupt liveness tracking
    /// on every receiver.
    pub async fn send_message(&self, message: &Message) -> Result<(), MonitoringError> {
        if message.sender() != &self.my_hostname {
            return Err(MonitoringError::SpoofedSender {
                sender: message.sender().clone(),
            });
        }
        let payload = message.to_bytes()?;
        let mut guard = self.transport.lock().await;
        let transport = guard
            .as_mut()
            .ok_or(MonitoringError::Transport(
                sentinel_transport::TransportError::Shutdown,
            ))?;
        transport
            .publish(message.topic(), payload)
            .await
            .map_err(Into::into)
    }

    /// The hostname this client publishes as.
    pub fn my_hostname(&self) -> &HostName {
        &self.my_hostname
    }

    /// Disconnect. Idempotent; sends after close fail.
    pub async fn close(&self) -> Result<(), MonitoringError> {
        let mut guard = self.transport.lock().await;
        if let Some(mut transport) = guard.take() {
            transport.close().await?;
        }
        Ok(())
    }
}
