use crate::TransportError;

/// Configuration for a transport instance.
///
/// All fields besides the endpoint list have sensible defaults. Use the
/// builder pattern:
///
/// ```rust
/// use sentinel_transport::TransportConfig;
///
/// let config = TransportConfig::new(vec!["10.0.0.2:7400".into(), "10.0.0.3:7400".into()])
///     .bind_addr("0.0.0.0:7400")
///     .max_frame_size(512 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Peer endpoints (`host:port`) published frames fan out to.
    /// The local node's own listener must not be in the list.
    pub(crate) endpoints: Vec<String>,
    /// Local listener bind address.
    pub(crate) bind_addr: String,
    /// Maximum incoming frame size in bytes.
    pub(crate) max_frame_size: usize,
    /// Channel buffer size for incoming frames.
    pub(crate) recv_buffer: usize,
}

impl TransportConfig {
    /// Create a new config for the given peer endpoints.
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            endpoints,
            bind_addr: "0.0.0.0:7400".to_string(),
            max_frame_size: 1024 * 1024, // 1 MB
            recv_buffer: 256,
        }
    }

    /// Set the local listener bind address (default: `0.0.0.0:7400`).
    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Set the maximum incoming frame size (default: 1 MB).
    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    /// Set the channel buffer size for incoming frames (default: 256).
    pub fn recv_buffer(mut self, capacity: usize) -> Self {
        self.recv_buffer = capacity;
        self
    }

    /// Validate the configuration.
    ///
    /// An empty endpoint list is rejected: a node with no peers has
    /// nothing to publish to and nothing to monitor.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.endpoints.is_empty() {
            return Err(TransportError::Config(
                "endpoint list must not be empty".into(),
            ));
        }
        if self.endpoints.iter().any(|e| e.trim().is_empty()) {
            return Err(TransportError::Config("blank endpoint in list".into()));
        }
        if self.max_frame_size == 0 {
            return Err(TransportError::Config("max_frame_size must be > 0".into()));
        }
        Ok(())
    }

    /// The configured peer endpoints.
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}
