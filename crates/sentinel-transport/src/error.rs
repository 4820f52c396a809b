/// Errors returned by the sentinel transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("connect to {endpoint} failed: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("publish on '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("receive failed: {0}")]
    Receive(String),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("frame serialization failed: {0}")]
    Serialization(String),

    #[error("frame deserialization failed: {0}")]
    Deserialization(String),

    #[error("transport is shut down")]
    Shutdown,

    #[error("invalid hostname: {0:?}")]
    InvalidHostName(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<rmp_serde::encode::Error> for TransportError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        TransportError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for TransportError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        TransportError::Deserialization(e.to_string())
    }
}
