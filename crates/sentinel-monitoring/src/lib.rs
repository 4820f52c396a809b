//! Cluster node-health monitoring and primary/secondary failover.
//!
//! Processes across a fleet publish and subscribe topic-addressed
//! [`Message`]s over a pub/sub substrate, derive per-host liveness
//! (Active/Missing) from the traffic they observe, and run a two-role
//! election on top so exactly one designated process acts as the
//! active service owner while a backup stands by.
//!
//! - [`NodeMonitoring`] — the bus: transport lifecycle, topic handler
//!   registry, liveness tracking, outbound publish.
//! - [`NodeMonitoringClient`] — publish-only handle.
//! - [`PrimarySecondaryServiceMonitor`] — fixed-pair failover arbiter
//!   driven by the bus's node-state events.
//! - [`factory`] — construction entry points and the guarded
//!   process-wide singleton.
//!
//! Wire format: MessagePack over the `sentinel-transport` substrate.

pub mod bus;
pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod failover;
pub mod liveness;
pub mod message;
pub mod registry;
pub mod types;

pub use bus::{LifecycleState, NodeMonitoring};
pub use client::NodeMonitoringClient;
pub use config::MonitoringConfig;
pub use error::MonitoringError;
pub use failover::{FailoverPair, PrimarySecondaryServiceMonitor};
pub use liveness::{LivenessTracker, NodeStateEvent};
pub use message::Message;
pub use registry::HandlerRegistry;
pub use types::{
    now_ms, HostName, MessageHandler, NodeStateChangeHandler, PrimarySecondaryRole,
    RemoteNodeState, RoleChangeHandler,
};

// The transport boundary, re-exported for consumers wiring custom
// substrates or the shipped TCP mesh / in-process hub.
pub use sentinel_transport as transport;
