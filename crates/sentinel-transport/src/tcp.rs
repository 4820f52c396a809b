use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::TransportConfig;
use crate::frame::{read_framed, write_framed, WireFrame};
use crate::transport::{Inbound, Transport, TransportConnector};
use crate::TransportError;

/// Brokerless TCP pub/sub mesh.
///
/// Every node binds a listener and fans published frames out to each
/// configured peer endpoint over length-prefixed TCP. Outbound
/// connections are established lazily on first publish and re-opened on
/// the next publish after a failure; a peer that is down simply misses
/// frames until it returns, the same way a PUB socket drops for absent
/// subscribers.
///
/// Publish is best-effort fan-out: failures to individual peers are
/// logged at debug level; the call errors only when no peer at all
/// could be reached.
pub struct TcpMeshTransport {
    local_addr: std::net::SocketAddr,
    max_frame_size: usize,
    peers: Vec<Peer>,
    incoming_rx: mpsc::Receiver<Inbound>,
    accept_task: JoinHandle<()>,
    closed: bool,
}

struct Peer {
    endpoint: String,
    stream: Option<TcpStream>,
}

impl TcpMeshTransport {
    /// Bind the local listener and prepare outbound peer slots.
    ///
    /// Connections to peers are not attempted here; a fleet can start
    /// in any order.
    pub async fn bind(config: TransportConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(TransportError::Bind)?;
        let local_addr = listener.local_addr().map_err(TransportError::Bind)?;

        let (incoming_tx, incoming_rx) = mpsc::channel(config.recv_buffer);
        let max_frame_size = config.max_frame_size;
        let accept_task = tokio::spawn(accept_loop(listener, incoming_tx, max_frame_size));

        let peers = config
            .endpoints
            .iter()
            .map(|endpoint| Peer {
                endpoint: endpoint.clone(),
                stream: None,
            })
            .collect();

        tracing::debug!("tcp mesh listening on {local_addr}");
        Ok(Self {
            local_addr,
            max_frame_size,
            peers,
            incoming_rx,
            accept_task,
            closed: false,
        })
    }

    /// The bound listener address (useful with an ephemeral port).
    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }
}

#[async_trait]
impl Transport for TcpMeshTransport {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Shutdown);
        }

        let frame = WireFrame::new(topic, payload);
        let data = frame.to_bytes()?;
        if data.len() > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                size: data.len(),
                max: self.max_frame_size,
            });
        }

        let mut delivered = 0usize;
        let mut last_failure = None;
        for peer in &mut self.peers {
            if peer.stream.is_none() {
                match TcpStream::connect(&peer.endpoint).await {
                    Ok(stream) => peer.stream = Some(stream),
                    Err(e) => {
                        tracing::debug!("connect to {} failed: {e}", peer.endpoint);
                        last_failure = Some(format!("{}: {e}", peer.endpoint));
                        continue;
                    }
                }
            }
            let stream = peer.stream.as_mut().expect("stream just ensured");
            match write_framed(stream, &data).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    // Dead connection, evict so the next publish reconnects.
                    tracing::debug!("write to {} failed: {e}", peer.endpoint);
                    last_failure = Some(format!("{}: {e}", peer.endpoint));
                    peer.stream = None;
                }
            }
        }

        if delivered == 0 && !self.peers.is_empty() {
            return Err(TransportError::Publish {
                topic: topic.to_string(),
                reason: last_failure.unwrap_or_else(|| "no peers reachable".into()),
            });
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Inbound, TransportError> {
        self.incoming_rx.recv().await.ok_or(TransportError::Shutdown)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.closed {
            self.accept_task.abort();
            for peer in &mut self.peers {
                peer.stream = None;
            }
            self.closed = true;
        }
        Ok(())
    }
}

impl Drop for TcpMeshTransport {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    incoming_tx: mpsc::Sender<Inbound>,
    max_frame_size: usize,
) {
    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!("accept failed: {e}");
                continue;
            }
        };
        let tx = incoming_tx.clone();
        tokio::spawn(read_loop(stream, remote, tx, max_frame_size));
    }
}

async fn read_loop(
    mut stream: TcpStream,
    remote: std::net::SocketAddr,
    incoming_tx: mpsc::Sender<Inbound>,
    max_frame_size: usize,
) {
    loop {
        let data = match read_framed(&mut stream, max_frame_size).await {
            Ok(data) => data,
            Err(e) => {
                // Normal peer disconnects land here too; keep it quiet.
                tracing::debug!("connection from {remote} ended: {e}");
                return;
            }
        };
        let frame = match WireFrame::from_bytes(&data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("bad frame from {remote}: {e}");
                continue;
            }
        };
        let inbound = Inbound {
            topic: frame.topic,
            payload: frame.payload,
        };
        if incoming_tx.send(inbound).await.is_err() {
            // Transport closed, receiver is gone.
            return;
        }
    }
}

/// Connector producing a bound [`TcpMeshTransport`].
pub struct TcpMeshConnector {
    config: TransportConfig,
}

impl TcpMeshConnector {
    /// A connector for the given configuration.
    ///
    /// The endpoint list is validated here so a misconfigured fleet
    /// fails before anything binds.
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        config.validate()?;
        Ok(Self { config })
    }
}

#[async_trait]
impl TransportConnector for TcpMeshConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, TransportError> {
        let transport = TcpMeshTransport::bind(self.config.clone()).await?;
        Ok(Box::new(transport))
    }
}
