use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::transport::{Inbound, Transport, TransportConnector};
use crate::{HostName, TransportError};

/// In-process pub/sub hub.
///
/// Wires any number of [`MemoryTransport`]s together: a frame published
/// by one registered node is delivered to every other registered node.
/// Used by tests and single-process demos in place of a real broker.
///
/// Cheap to clone; clones share the same hub.
#[derive(Clone, Default)]
pub struct MemoryHub {
    nodes: Arc<Mutex<HashMap<HostName, mpsc::UnboundedSender<Inbound>>>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector registering under `name` when connected.
    ///
    /// Frames published by the resulting transport are delivered to all
    /// other registered nodes, never back to `name` itself.
    pub fn connector(&self, name: HostName) -> MemoryConnector {
        MemoryConnector {
            hub: self.clone(),
            name,
        }
    }

    /// Number of currently connected nodes.
    pub fn connected_count(&self) -> usize {
        self.nodes.lock().expect("hub lock").len()
    }

    fn register(&self, name: HostName) -> mpsc::UnboundedReceiver<Inbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.nodes.lock().expect("hub lock").insert(name, tx);
        rx
    }

    fn unregister(&self, name: &HostName) {
        self.nodes.lock().expect("hub lock").remove(name);
    }

    fn fan_out(&self, from: &HostName, frame: Inbound) {
        let targets: Vec<mpsc::UnboundedSender<Inbound>> = {
            let nodes = self.nodes.lock().expect("hub lock");
            nodes
                .iter()
                .filter(|(name, _)| *name != from)
                .map(|(_, tx)| tx.clone())
                .collect()
        };
        for tx in targets {
            // A closed receiver means that node is gone, drop silently.
            let _ = tx.send(frame.clone());
        }
    }
}

/// Connector handing out [`MemoryTransport`]s for a [`MemoryHub`].
pub struct MemoryConnector {
    hub: MemoryHub,
    name: HostName,
}

#[async_trait]
impl TransportConnector for MemoryConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        let rx = self.hub.register(self.name.clone());
        Ok(Box::new(MemoryTransport {
            hub: self.hub.clone(),
            name: self.name.clone(),
            rx,
            closed: false,
        }))
    }
}

/// A node's handle into a [`MemoryHub`].
pub struct MemoryTransport {
    hub: MemoryHub,
    name: HostName,
    rx: mpsc::UnboundedReceiver<Inbound>,
    closed: bool,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Shutdown);
        }
        self.hub.fan_out(
            &self.name,
            Inbound {
                topic: topic.to_string(),
                payload,
            },
        );
        Ok(())
    }

    async fn recv(&mut self) -> Result<Inbound, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Shutdown)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.hub.unregister(&self.name);
            self.closed = true;
        }
        Ok(())
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        if !self.closed {
            self.hub.unregister(&self.name);
        }
    }
}
