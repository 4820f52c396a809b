/// Node liveness tracking — last-seen bookkeeping per remote host.
///
/// Pure state machine: record observed traffic, sweep for silence.
/// Timestamps are passed in explicitly; the bus event loop supplies
/// wall-clock time and runs the sweep on a timer.
use std::collections::HashMap;

use crate::types::{HostName, RemoteNodeState};

/// A single liveness transition to report to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStateEvent {
    pub host: HostName,
    pub state: RemoteNodeState,
    /// Observation time for Active, detection time for Missing.
    pub timestamp_ms: u64,
}

struct NodeRecord {
    last_seen_ms: u64,
    state: RemoteNodeState,
}

/// Tracks per-host last-seen time and Active/Missing state.
///
/// A host enters the map on its first observed frame and is never
/// removed; its state flips as traffic comes and goes. Events are
/// produced only on actual transitions, so consecutive duplicate
/// notifications cannot occur.
pub struct LivenessTracker {
    records: HashMap<HostName, NodeRecord>,
    timeout_ms: u64,
}

impl LivenessTracker {
    /// Create a tracker that declares a host Missing after
    /// `timeout_ms` of silence.
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            records: HashMap::new(),
            timeout_ms,
        }
    }

    /// Record traffic from `host` at `now_ms`.
    ///
    /// Returns an Active event when the host was previously unknown or
    /// Missing; `None` on repeated observations of an Active host.
    pub fn record_traffic(&mut self, host: &HostName, now_ms: u64) -> Option<NodeStateEvent> {
        match self.records.get_mut(host) {
            Some(record) => {
                record.last_seen_ms = now_ms;
                if record.state == RemoteNodeState::Missing {
                    record.state = RemoteNodeState::Active;
                    Some(NodeStateEvent {
                        host: host.clone(),
                        state: RemoteNodeState::Active,
                        timestamp_ms: now_ms,
                    })
                } else {
                    None
                }
            }
            None => {
                self.records.insert(
                    host.clone(),
                    NodeRecord {
                        last_seen_ms: now_ms,
                        state: RemoteNodeState::Active,
                    },
                );
                Some(NodeStateEvent {
                    host: host.clone(),
                    state: RemoteNodeState::Active,
                    timestamp_ms: now_ms,
                })
            }
        }
    }

    /// Scan every known host; any Active host silent for longer than
    /// the timeout transitions to Missing.
    ///
    /// Detection is eventual, not instantaneous: a dead host is
    /// reported only once a sweep runs after the timeout elapses.
    pub fn sweep(&mut self, now_ms: u64) -> Vec<NodeStateEvent> {
        let mut events = Vec::new();
        for (host, record) in &mut self.records {
            if record.state == RemoteNodeState::Active
                && now_ms.saturating_sub(record.last_seen_ms) > self.timeout_ms
            {
                record.state = RemoteNodeState::Missing;
                events.push(NodeStateEvent {
                    host: host.clone(),
                    state: RemoteNodeState::Missing,
                    timestamp_ms: now_ms,
                });
            }
        }
        events
    }

    /// Current state of `host`, or `None` if it was never observed.
    pub fn state_of(&self, host: &HostName) -> Option<RemoteNodeState> {
        self.records.get(host).map(|r| r.state)
    }

    /// All hosts ever observed.
    pub fn known_hosts(&self) -> Vec<HostName> {
        self.records.keys().cloned().collect()
    }

    /// Number of hosts ever observed.
    pub fn tracked_count(&self) -> usize {
        self.records.len()
    }
}
