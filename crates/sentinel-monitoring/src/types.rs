use serde::{Deserialize, Serialize};

pub use sentinel_transport::HostName;

use crate::message::Message;

/// Liveness judgment about a remote host, derived from observed traffic.
///
/// A host has no state at all until its first frame is seen; after that
/// it flips between the two values and is never forgotten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoteNodeState {
    Active,
    Missing,
}

/// Role of a process relative to its failover peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimarySecondaryRole {
    Primary,
    Secondary,
}

/// Callback registered for a specific topic. Invoked for inbound
/// messages addressed to this node, on a dispatcher worker, never on
/// the bus receive loop. Must not block for extended periods.
pub trait MessageHandler: Send + Sync {
    fn handle_message(&self, message: &Message);
}

impl<F> MessageHandler for F
where
    F: Fn(&Message) + Send + Sync,
{
    fn handle_message(&self, message: &Message) {
        self(message)
    }
}

/// Callback invoked when a remote host transitions between
/// [`RemoteNodeState::Active`] and [`RemoteNodeState::Missing`].
///
/// `timestamp_ms` is the observation time for Active transitions and
/// the detection time for Missing transitions. Invoked on a dispatcher
/// worker; notifications for the same host arrive in transition order.
pub trait NodeStateChangeHandler: Send + Sync {
    fn node_state_changed(&self, host: &HostName, state: RemoteNodeState, timestamp_ms: u64);
}

impl<F> NodeStateChangeHandler for F
where
    F: Fn(&HostName, RemoteNodeState, u64) + Send + Sync,
{
    fn node_state_changed(&self, host: &HostName, state: RemoteNodeState, timestamp_ms: u64) {
        self(host, state, timestamp_ms)
    }
}

/// Callback invoked when this process's failover role changes.
pub trait RoleChangeHandler: Send + Sync {
    fn role_changed(&self, role: PrimarySecondaryRole);
}

impl<F> RoleChangeHandler for F
where
    F: Fn(PrimarySecondaryRole) + Send + Sync,
{
    fn role_changed(&self, role: PrimarySecondaryRole) {
        self(role)
    }
}

/// Current Unix time in milliseconds.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
