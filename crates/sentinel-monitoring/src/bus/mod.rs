/// The monitoring bus — the façade combining transport lifecycle, the
/// handler registry, liveness tracking and outbound publish.
///
/// One instance per process is typical (see [`crate::factory`] for the
/// guarded singleton); nothing prevents several buses with separate
/// transports.
mod dispatch;
mod r#loop;

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot, watch};

use sentinel_transport::TransportConnector;

use crate::config::MonitoringConfig;
use crate::error::MonitoringError;
use crate::liveness::LivenessTracker;
use crate::message::Message;
use crate::registry::HandlerRegistry;
use crate::types::{HostName, MessageHandler, NodeStateChangeHandler, RemoteNodeState};

use dispatch::Dispatcher;

/// Reserved topic name for heartbeats, scoped by service name so two
/// services sharing a broker do not feed each other's liveness.
const HEARTBEAT_TOPIC_SUFFIX: &str = ".alive";

/// Bus lifecycle: Stopped → Starting → Running → Stopping → Stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Commands the handle sends to the event loop.
pub(crate) enum Command {
    Publish {
        topic: String,
        payload: Vec<u8>,
        reply: oneshot::Sender<Result<(), MonitoringError>>,
    },
    Stop,
}

pub(crate) struct BusShared {
    my_hostname: HostName,
    service_name: String,
    heartbeat_topic: String,
    config: MonitoringConfig,
    registry: Mutex<HandlerRegistry>,
    liveness: Mutex<LivenessTracker>,
    lifecycle: watch::Sender<LifecycleState>,
    cmd_tx: Mutex<Option<mpsc::Sender<Command>>>,
    connector: Box<dyn TransportConnector>,
}

/// Handle to a monitoring bus instance.
///
/// Cheap to clone; all clones address the same bus. The transport is
/// connected at [`start`](NodeMonitoring::start) and owned by the
/// event loop; callers talk to the loop over channels.
#[derive(Clone)]
pub struct NodeMonitoring {
    shared: Arc<BusShared>,
}

impl NodeMonitoring {
    /// Create a bus for `my_hostname` within `service_name`.
    ///
    /// Fails fast on invalid configuration; a bad config never
    /// half-constructs a bus. The transport is not touched here.
    pub fn new(
        my_hostname: HostName,
        service_name: impl Into<String>,
        connector: Box<dyn TransportConnector>,
        config: MonitoringConfig,
    ) -> Result<Self, MonitoringError> {
        config.validate()?;
        let service_name = service_name.into();
        if service_name.trim().is_empty() {
            return Err(MonitoringError::Config(
                "service_name must not be empty".into(),
            ));
        }
        let heartbeat_topic = format!("{service_name}/{HEARTBEAT_TOPIC_SUFFIX}");
        let (lifecycle, _) = watch::channel(LifecycleState::Stopped);
        let liveness = LivenessTracker::new(config.timeout_ms());
        Ok(Self {
            shared: Arc::new(BusShared {
                my_hostname,
                service_name,
                heartbeat_topic,
                config,
                registry: Mutex::new(HandlerRegistry::new()),
                liveness: Mutex::new(liveness),
                lifecycle,
                cmd_tx: Mutex::new(None),
                connector,
            }),
        })
    }

    /// Start the bus: connect the transport and run the receive loop.
    ///
    /// With `join_caller = true` the loop runs on the calling task and
    /// this call returns only after [`stop`](Self::stop) is invoked
    /// from elsewhere. With `false` the loop is spawned and the call
    /// returns once the bus is Running.
    ///
    /// Starting a bus that is not Stopped fails with
    /// [`MonitoringError::AlreadyRunning`] and leaves it untouched.
    /// Transport connect failures surface here and leave the bus
    /// Stopped.
    pub async fn start(&self, join_caller: bool) -> Result<(), MonitoringError> {
        let mut claimed = false;
        self.shared.lifecycle.send_if_modified(|state| {
            if *state == LifecycleState::Stopped {
                *state = LifecycleState::Starting;
                claimed = true;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(MonitoringError::AlreadyRunning);
        }

        let transport = match self.shared.connector.connect().await {
            Ok(transport) => transport,
            Err(e) => {
                self.shared.lifecycle.send_replace(LifecycleState::Stopped);
                return Err(e.into());
            }
        };

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        *self.shared.cmd_tx.lock().expect("cmd_tx lock") = Some(cmd_tx);
        let dispatcher = Dispatcher::spawn(
            self.shared.config.dispatch_workers,
            self.shared.config.dispatch_buffer,
        );
        self.shared.lifecycle.send_replace(LifecycleState::Running);
        tracing::debug!(
            "bus for '{}' ({}) running, heartbeat every {:?}",
            self.shared.my_hostname,
            self.shared.service_name,
            self.shared.config.heartbeat_interval
        );

        if join_caller {
            r#loop::run_loop(self.shared.clone(), transport, cmd_rx, dispatcher).await;
        } else {
            tokio::spawn(r#loop::run_loop(
                self.shared.clone(),
                transport,
                cmd_rx,
                dispatcher,
            ));
        }
        Ok(())
    }

    /// Stop the bus. Idempotent; safe to call from any task; unblocks
    /// every task parked in `start(true)` or
    /// [`wait_for_exit`](Self::wait_for_exit).
    pub async fn stop(&self) {
        let mut rx = self.shared.lifecycle.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                LifecycleState::Stopped => return,
                LifecycleState::Running | LifecycleState::Stopping => {
                    let tx = self.shared.cmd_tx.lock().expect("cmd_tx lock").clone();
                    if let Some(tx) = tx {
                        // The loop may already be gone; waiting below
                        // covers that.
                        let _ = tx.send(Command::Stop).await;
                    }
                    while *rx.borrow_and_update() != LifecycleState::Stopped {
                        if rx.changed().await.is_err() {
                            return;
                        }
                    }
                    return;
                }
                LifecycleState::Starting => {
                    // A start is in flight; wait for it to settle.
                    if rx.changed().await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    /// Block until the bus reaches Stopped. Returns immediately when
    /// it is not running.
    pub async fn wait_for_exit(&self) {
        let mut rx = self.shared.lifecycle.subscribe();
        while *rx.borrow_and_update() != LifecycleState::Stopped {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Whether the bus is currently Running.
    pub fn is_running(&self) -> bool {
        *self.shared.lifecycle.borrow() == LifecycleState::Running
    }

    /// The hostname used as sender on outbound messages.
    pub fn my_hostname(&self) -> &HostName {
        &self.shared.my_hostname
    }

    /// The service name scoping this bus's heartbeat topic.
    pub fn service_name(&self) -> &str {
        &self.shared.service_name
    }

    /// Publish a message on its topic.
    ///
    /// Thread-safe and fire-and-forget: the loop publishes on the
    /// transport and reports the outcome back; there is no delivery
    /// confirmation. Fails with [`MonitoringError::NotRunning`] when
    /// the bus is stopped.
    pub async fn send_message(&self, message: &Message) -> Result<(), MonitoringError> {
        let payload = message.to_bytes()?;
        let tx = self
            .shared
            .cmd_tx
            .lock()
            .expect("cmd_tx lock")
            .clone()
            .ok_or(MonitoringError::NotRunning)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(Command::Publish {
            topic: message.topic().to_string(),
            payload,
            reply: reply_tx,
        })
        .await
        .map_err(|_| MonitoringError::NotRunning)?;
        reply_rx.await.map_err(|_| MonitoringError::NotRunning)?
    }

    /// Register a handler for `topic`; fails if the topic already has
    /// one, leaving the existing handler in place.
    pub fn add_message_handler(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), MonitoringError> {
        self.shared
            .registry
            .lock()
            .expect("registry lock")
            .add_message_handler(topic, handler)
    }

    /// Register a handler for `topic`, atomically replacing any
    /// existing one. Returns the replaced handler.
    pub fn add_or_replace_message_handler(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Option<Arc<dyn MessageHandler>> {
        self.shared
            .registry
            .lock()
            .expect("registry lock")
            .add_or_replace_message_handler(topic, handler)
    }

    /// Remove the handler for `topic`. Idempotent.
    pub fn remove_message_handler(&self, topic: &str) -> Option<Arc<dyn MessageHandler>> {
        self.shared
            .registry
            .lock()
            .expect("registry lock")
            .remove_message_handler(topic)
    }

    /// Add a node-state observer. Returns `false` if it is already
    /// registered.
    pub fn add_node_state_change_handler(&self, handler: Arc<dyn NodeStateChangeHandler>) -> bool {
        self.shared
            .registry
            .lock()
            .expect("registry lock")
            .add_node_state_change_handler(handler)
    }

    /// Remove a node-state observer. Removing a non-member is a no-op
    /// returning `false`.
    pub fn remove_node_state_change_handler(
        &self,
        handler: &Arc<dyn NodeStateChangeHandler>,
    ) -> bool {
        self.shared
            .registry
            .lock()
            .expect("registry lock")
            .remove_node_state_change_handler(handler)
    }

    /// Current liveness state of `host`, or `None` if it was never
    /// observed.
    pub fn node_state(&self, host: &HostName) -> Option<RemoteNodeState> {
        self.shared
            .liveness
            .lock()
            .expect("liveness lock")
            .state_of(host)
    }

    /// Every host this bus has ever observed traffic from.
    pub fn known_hosts(&self) -> Vec<HostName> {
        self.shared
            .liveness
            .lock()
            .expect("liveness lock")
            .known_hosts()
    }
}
