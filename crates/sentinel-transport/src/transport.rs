use async_trait::async_trait;

use crate::TransportError;

/// An inbound frame delivered by the substrate.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// The pub/sub substrate the monitoring bus runs on.
///
/// Subscription is implicit and unfiltered: a connected transport
/// receives every frame published into its mesh or hub, and the layer
/// above filters by topic. This mirrors a SUB socket subscribed to the
/// empty prefix.
///
/// A transport is owned exclusively by the bus event loop; all methods
/// take `&mut self`. Publish fan-out semantics (best-effort vs. fail)
/// are implementation-specific and documented per implementation.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Publish a frame to the connected peers.
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Receive the next inbound frame.
    ///
    /// Returns [`TransportError::Shutdown`] once the transport is
    /// closed and the inbound queue is drained.
    async fn recv(&mut self) -> Result<Inbound, TransportError>;

    /// Disconnect from the substrate. Idempotent.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Factory for connected transports.
///
/// The bus takes a connector at construction time and connects at
/// `start`, so connection failures surface to the `start` caller.
#[async_trait]
pub trait TransportConnector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError>;
}
