use std::time::Duration;

use crate::error::MonitoringError;

/// Configuration for a monitoring bus.
///
/// All fields have defaults; use the builder pattern:
///
/// ```rust
/// use std::time::Duration;
/// use sentinel_monitoring::MonitoringConfig;
///
/// let config = MonitoringConfig::new()
///     .heartbeat_interval(Duration::from_millis(1900))
///     .timeout_multiplier(2);
/// ```
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    /// Period of the heartbeat this node publishes.
    pub(crate) heartbeat_interval: Duration,
    /// A silent host is declared Missing after
    /// `heartbeat_interval * timeout_multiplier`.
    pub(crate) timeout_multiplier: u32,
    /// How often the liveness sweep runs. Defaults to the heartbeat
    /// interval.
    pub(crate) sweep_interval: Option<Duration>,
    /// Number of dispatcher workers invoking application callbacks.
    pub(crate) dispatch_workers: usize,
    /// Queue depth per dispatcher worker.
    pub(crate) dispatch_buffer: usize,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitoringConfig {
    /// Create a config with defaults: 2 s heartbeat, 3× timeout,
    /// sweep every heartbeat interval, 3 dispatcher workers.
    pub fn new() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(2),
            timeout_multiplier: 3,
            sweep_interval: None,
            dispatch_workers: 3,
            dispatch_buffer: 64,
        }
    }

    /// Set the heartbeat publish period (default: 2 s).
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the missed-heartbeat timeout multiplier (default: 3).
    pub fn timeout_multiplier(mut self, multiplier: u32) -> Self {
        self.timeout_multiplier = multiplier;
        self
    }

    /// Set an explicit sweep period (default: the heartbeat interval).
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Set the dispatcher worker count (default: 3).
    pub fn dispatch_workers(mut self, workers: usize) -> Self {
        self.dispatch_workers = workers;
        self
    }

    /// Set the per-worker queue depth (default: 64).
    pub fn dispatch_buffer(mut self, buffer: usize) -> Self {
        self.dispatch_buffer = buffer;
        self
    }

    /// Validate the configuration. Called by the bus constructor so a
    /// bad config never half-constructs a bus.
    pub fn validate(&self) -> Result<(), MonitoringError> {
        if self.heartbeat_interval.is_zero() {
            return Err(MonitoringError::Config(
                "heartbeat_interval must be > 0".into(),
            ));
        }
        if self.timeout_multiplier == 0 {
            return Err(MonitoringError::Config(
                "timeout_multiplier must be >= 1".into(),
            ));
        }
        if self.dispatch_workers == 0 {
            return Err(MonitoringError::Config(
                "dispatch_workers must be >= 1".into(),
            ));
        }
        if self.dispatch_buffer == 0 {
            return Err(MonitoringError::Config(
                "dispatch_buffer must be >= 1".into(),
            ));
        }
        Ok(())
    }

    /// The silence window after which a host is declared Missing.
    pub(crate) fn timeout_ms(&self) -> u64 {
        self.heartbeat_interval.as_millis() as u64 * u64::from(self.timeout_multiplier)
    }

    /// The effective sweep period.
    pub(crate) fn effective_sweep_interval(&self) -> Duration {
        self.sweep_interval.unwrap_or(self.heartbeat_interval)
    }
}
