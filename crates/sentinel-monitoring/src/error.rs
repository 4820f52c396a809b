use crate::types::HostName;

/// Errors returned by the monitoring layer.
///
/// Wraps transport errors and adds bus/election-specific variants.
#[derive(Debug, thiserror::Error)]
pub enum MonitoringError {
    #[error("transport error: {0}")]
    Transport(#[from] sentinel_transport::TransportError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("bus is already running")]
    AlreadyRunning,

    #[error("bus is not running")]
    NotRunning,

    #[error("topic '{topic}' already has a handler")]
    HandlerExists { topic: String },

    #[error("sender '{sender}' does not match this client's identity")]
    SpoofedSender { sender: HostName },

    #[error("subject '{subject}' is not a member of the failover pair")]
    NotPairMember { subject: HostName },

    #[error("message serialization failed: {0}")]
    Serialization(String),

    #[error("message deserialization failed: {0}")]
    Deserialization(String),
}

impl From<rmp_serde::encode::Error> for MonitoringError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        MonitoringError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for MonitoringError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        MonitoringError::Deserialization(e.to_string())
    }
}
