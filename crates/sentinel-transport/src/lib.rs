//! Sentinel transport layer.
//!
//! The pub/sub substrate the monitoring bus runs on, behind a stable
//! trait boundary: connect to a list of broker endpoints, publish
//! `(topic, bytes)`, receive frames asynchronously, disconnect.
//!
//! Two implementations ship with the crate:
//!
//! - [`TcpMeshTransport`] — every node binds a listener and fans
//!   published frames out to its peer endpoints over length-prefixed
//!   TCP. Suitable for small fleets without a dedicated broker.
//! - [`MemoryHub`] — an in-process hub wiring any number of transports
//!   together. Used by tests and single-process demos.
//!
//! Wire format: MessagePack ([`WireFrame`]) with a u32 length prefix.

mod config;
mod error;
mod frame;
mod memory;
mod tcp;
mod transport;

pub use config::TransportConfig;
pub use error::TransportError;
pub use frame::WireFrame;
pub use memory::{MemoryConnector, MemoryHub, MemoryTransport};
pub use tcp::{TcpMeshConnector, TcpMeshTransport};
pub use transport::{Inbound, Transport, TransportConnector};

use std::fmt;
use std::str::FromStr;

/// Network-resolvable identity of a cluster host.
///
/// Plain hostname string, validated non-blank. Displayed, parsed and
/// serialized as the bare name.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostName(String);

impl HostName {
    /// The hostname as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for HostName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostName({})", self.0)
    }
}

impl FromStr for HostName {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(TransportError::InvalidHostName(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<&str> for HostName {
    type Error = TransportError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl serde::Serialize for HostName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for HostName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
