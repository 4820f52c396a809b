/// Primary/secondary failover arbitration over the liveness stream.
///
/// Deterministic, fixed-pair election: the designated primary holds
/// the Primary role while it is considered alive; the designated
/// secondary takes over only while the primary is observed Missing,
/// and yields as soon as it returns. Each side reasons from its own
/// locally observed liveness, so a brief disagreement window during a
/// partition is possible; callers needing mutual exclusion
/// must add external fencing.
use std::sync::{Arc, Mutex};

use crate::bus::NodeMonitoring;
use crate::error::MonitoringError;
use crate::types::{
    HostName, NodeStateChangeHandler, PrimarySecondaryRole, RemoteNodeState, RoleChangeHandler,
};

/// The two hosts a monitor arbitrates between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverPair {
    primary: HostName,
    secondary: HostName,
}

impl FailoverPair {
    /// A pair of distinct designated-primary and designated-secondary
    /// hosts.
    pub fn new(primary: HostName, secondary: HostName) -> Result<Self, MonitoringError> {
        if primary == secondary {
            return Err(MonitoringError::Config(
                "failover pair must name two distinct hosts".into(),
            ));
        }
        Ok(Self { primary, secondary })
    }

    pub fn primary(&self) -> &HostName {
        &self.primary
    }

    pub fn secondary(&self) -> &HostName {
        &self.secondary
    }
}

/// Pure election core — consumes observations of the designated
/// primary and enable/disable commands, emits a role only when the
/// computed role differs from the last one notified.
///
/// A never-observed primary is presumed alive: failover requires an
/// observed Missing transition, never the absence of evidence.
struct RoleDecider {
    subject_is_primary: bool,
    /// The local node never observes itself, so a local designated
    /// primary is always considered alive.
    primary_is_local: bool,
    primary_missing: bool,
    enabled: bool,
    last_notified: Option<PrimarySecondaryRole>,
}

impl RoleDecider {
    fn new(subject_is_primary: bool, primary_is_local: bool) -> Self {
        Self {
            subject_is_primary,
            primary_is_local,
            primary_missing: false,
            enabled: false,
            last_notified: None,
        }
    }

    fn compute(&self) -> PrimarySecondaryRole {
        let primary_alive = self.primary_is_local || !self.primary_missing;
        match (self.subject_is_primary, primary_alive) {
            (true, true) | (false, false) => PrimarySecondaryRole::Primary,
            (true, false) | (false, true) => PrimarySecondaryRole::Secondary,
        }
    }

    /// Record an observation of the designated primary. Returns a role
    /// to notify when armed and the role actually changed.
    fn observe_primary(&mut self, state: RemoteNodeState) -> Option<PrimarySecondaryRole> {
        self.primary_missing = state == RemoteNodeState::Missing;
        if !self.enabled {
            return None;
        }
        self.transition()
    }

    /// Arm or disarm the election. Arming re-evaluates against the
    /// current liveness view (`primary_state`, `None` when the primary
    /// was never observed) and fires only if the role differs from the
    /// last value held before disabling.
    fn set_enabled(
        &mut self,
        enabled: bool,
        primary_state: Option<RemoteNodeState>,
    ) -> Option<PrimarySecondaryRole> {
        self.enabled = enabled;
        if !enabled {
            return None;
        }
        if let Some(state) = primary_state {
            self.primary_missing = state == RemoteNodeState::Missing;
        }
        self.transition()
    }

    fn transition(&mut self) -> Option<PrimarySecondaryRole> {
        let role = self.compute();
        if self.last_notified == Some(role) {
            return None;
        }
        self.last_notified = Some(role);
        Some(role)
    }

    fn current(&self) -> Option<PrimarySecondaryRole> {
        self.last_notified
    }
}

/// Drives a Primary/Secondary role decision for one subject of a
/// fixed pair, fed by a bus's node-state-change events.
///
/// Registers itself as a node-state observer on construction and
/// deregisters on drop. The role is undefined until
/// [`enable_handler(true)`](Self::enable_handler) arms the election.
/// Role callbacks fire on the bus's dispatcher, at most once per
/// liveness transition, never redundantly.
pub struct PrimarySecondaryServiceMonitor {
    bus: NodeMonitoring,
    pair: FailoverPair,
    subject: HostName,
    handler: Arc<dyn RoleChangeHandler>,
    decider: Arc<Mutex<RoleDecider>>,
    observer: Arc<dyn NodeStateChangeHandler>,
}

impl PrimarySecondaryServiceMonitor {
    /// Monitor the pair with the bus's own host as subject.
    ///
    /// The local host must be one of the pair.
    pub fn new(
        bus: &NodeMonitoring,
        pair: FailoverPair,
        handler: Arc<dyn RoleChangeHandler>,
    ) -> Result<Self, MonitoringError> {
        let subject = bus.my_hostname().clone();
        Self::with_subject(bus, pair, subject, handler)
    }

    /// Monitor the pair on behalf of `subject`: for a third-party
    /// arbiter that is itself neither of the pair's hosts.
    pub fn with_subject(
        bus: &NodeMonitoring,
        pair: FailoverPair,
        subject: HostName,
        handler: Arc<dyn RoleChangeHandler>,
    ) -> Result<Self, MonitoringError> {
        if subject != pair.primary && subject != pair.secondary {
            return Err(MonitoringError::NotPairMember { subject });
        }
        let subject_is_primary = subject == pair.primary;
        let primary_is_local = &pair.primary == bus.my_hostname();
        let decider = Arc::new(Mutex::new(RoleDecider::new(
            subject_is_primary,
            primary_is_local,
        )));

        let observer: Arc<dyn NodeStateChangeHandler> = {
            let decider = decider.clone();
            let handler = handler.clone();
            let primary = pair.primary.clone();
            Arc::new(
                move |host: &HostName, state: RemoteNodeState, _timestamp_ms: u64| {
                    if *host != primary {
                        return;
                    }
                    let role = decider.lock().expect("decider lock").observe_primary(state);
                    if let Some(role) = role {
                        tracing::debug!("failover: primary '{primary}' is {state:?}, assuming {role:?}");
                        handler.role_changed(role);
                    }
                },
            )
        };
        bus.add_node_state_change_handler(observer.clone());

        Ok(Self {
            bus: bus.clone(),
            pair,
            subject,
            handler,
            decider,
            observer,
        })
    }

    /// Arm or disarm role notifications.
    ///
    /// Disarmed, liveness events are still observed but produce no
    /// role transitions or callbacks; failover can be paused for
    /// planned maintenance without tearing the monitor down. Re-arming
    /// re-evaluates the current liveness view and fires only if the
    /// role differs from the last value notified.
    pub fn enable_handler(&self, enable: bool) {
        let primary_state = self.bus.node_state(&self.pair.primary);
        let role = self
            .decider
            .lock()
            .expect("decider lock")
            .set_enabled(enable, primary_state);
        tracing::debug!(
            "{} role monitoring for '{}'",
            if enable { "enabled" } else { "disabled" },
            self.subject
        );
        if let Some(role) = role {
            self.handler.role_changed(role);
        }
    }

    /// The last role notified, or `None` before the first armed
    /// evaluation.
    pub fn current_role(&self) -> Option<PrimarySecondaryRole> {
        self.decider.lock().expect("decider lock").current()
    }

    /// The arbitrated pair.
    pub fn pair(&self) -> &FailoverPair {
        &self.pair
    }

    /// The host this monitor decides the role for.
    pub fn subject(&self) -> &HostName {
        &self.subject
    }
}

impl Drop for PrimarySecondaryServiceMonitor {
    fn drop(&mut self) {
        self.bus.remove_node_state_change_handler(&self.observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decider(subject_is_primary: bool, primary_is_local: bool) -> RoleDecider {
        RoleDecider::new(subject_is_primary, primary_is_local)
    }

    #[test]
    fn role_is_undefined_until_enabled() {
        let mut d = decider(false, false);
        assert_eq!(d.current(), None);
        assert_eq!(d.observe_primary(RemoteNodeState::Missing), None);
        assert_eq!(d.current(), None);
    }

    #[test]
    fn first_enable_always_fires() {
        let mut d = decider(false, false);
        assert_eq!(
            d.set_enabled(true, Some(RemoteNodeState::Active)),
            Some(PrimarySecondaryRole::Secondary)
        );
    }

    #[test]
    fn local_primary_subject_is_always_primary() {
        let mut d = decider(true, true);
        assert_eq!(
            d.set_enabled(true, None),
            Some(PrimarySecondaryRole::Primary)
        );
        // The local node never sees itself go Missing, but even a
        // spurious observation must not dethrone it.
        assert_eq!(d.observe_primary(RemoteNodeState::Missing), None);
        assert_eq!(d.current(), Some(PrimarySecondaryRole::Primary));
    }

    #[test]
    fn secondary_takes_over_and_yields_exactly_once() {
        let mut d = decider(false, false);
        d.set_enabled(true, Some(RemoteNodeState::Active));

        assert_eq!(
            d.observe_primary(RemoteNodeState::Missing),
            Some(PrimarySecondaryRole::Primary)
        );
        // Repeated Missing observations change nothing.
        assert_eq!(d.observe_primary(RemoteNodeState::Missing), None);

        assert_eq!(
            d.observe_primary(RemoteNodeState::Active),
            Some(PrimarySecondaryRole::Secondary)
        );
        assert_eq!(d.observe_primary(RemoteNodeState::Active), None);
    }

    #[test]
    fn never_observed_primary_is_presumed_alive() {
        let mut d = decider(false, false);
        assert_eq!(
            d.set_enabled(true, None),
            Some(PrimarySecondaryRole::Secondary)
        );
    }

    #[test]
    fn disabled_window_suppresses_callbacks() {
        let mut d = decider(false, false);
        d.set_enabled(true, Some(RemoteNodeState::Active));
        assert_eq!(d.set_enabled(false, None), None);

        // Transitions happen while disarmed: observed, not notified.
        assert_eq!(d.observe_primary(RemoteNodeState::Missing), None);
        assert_eq!(d.observe_primary(RemoteNodeState::Active), None);

        // Re-arming with the same effective role stays silent.
        assert_eq!(d.set_enabled(true, Some(RemoteNodeState::Active)), None);
    }

    #[test]
    fn reenable_fires_when_role_differs() {
        let mut d = decider(false, false);
        d.set_enabled(true, Some(RemoteNodeState::Active));
        d.set_enabled(false, None);

        // Primary died while we were disarmed.
        d.observe_primary(RemoteNodeState::Missing);
        assert_eq!(
            d.set_enabled(true, Some(RemoteNodeState::Missing)),
            Some(PrimarySecondaryRole::Primary)
        );
    }

    #[test]
    fn arbiter_subject_primary_follows_its_liveness() {
        // Third-party arbiter deciding for the designated primary.
        let mut d = decider(true, false);
        assert_eq!(
            d.set_enabled(true, Some(RemoteNodeState::Active)),
            Some(PrimarySecondaryRole::Primary)
        );
        assert_eq!(
            d.observe_primary(RemoteNodeState::Missing),
            Some(PrimarySecondaryRole::Secondary)
        );
        assert_eq!(
            d.observe_primary(RemoteNodeState::Active),
            Some(PrimarySecondaryRole::Primary)
        );
    }

    #[test]
    fn pair_rejects_identical_hosts() {
        let host: HostName = "same".parse().unwrap();
        assert!(FailoverPair::new(host.clone(), host).is_err());
    }
}
