/// The bus event loop.
///
/// A single task that owns the connected transport and multiplexes
/// over inbound frames, handle commands, the heartbeat timer and the
/// liveness sweep. Every mutation of the liveness tracker happens
/// here; callbacks are handed to the dispatcher, never invoked inline.
use std::sync::Arc;

use tokio::sync::mpsc;

use sentinel_transport::{Inbound, Transport};

use crate::liveness::NodeStateEvent;
use crate::message::Message;
use crate::types::now_ms;

use super::dispatch::{DispatchJob, Dispatcher};
use super::{BusShared, Command, LifecycleState};

pub(super) async fn run_loop(
    shared: Arc<BusShared>,
    mut transport: Box<dyn Transport>,
    mut cmd_rx: mpsc::Receiver<Command>,
    dispatcher: Dispatcher,
) {
    let mut heartbeat = tokio::time::interval(shared.config.heartbeat_interval);
    let mut sweep = tokio::time::interval(shared.config.effective_sweep_interval());
    // Skip the immediate first tick on both intervals.
    heartbeat.tick().await;
    sweep.tick().await;

    loop {
        tokio::select! {
            result = transport.recv() => match result {
                Ok(inbound) => handle_inbound(&shared, &dispatcher, inbound).await,
                Err(e) => {
                    tracing::warn!("transport receive failed, stopping bus: {e}");
                    break;
                }
            },

            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Publish { topic, payload, reply }) => {
                    let result = transport
                        .publish(&topic, payload)
                        .await
                        .map_err(Into::into);
                    // A publish failure is the caller's problem, not
                    // the loop's; keep serving other topics.
                    let _ = reply.send(result);
                }
                Some(Command::Stop) | None => break,
            },

            _ = heartbeat.tick() => {
                publish_heartbeat(&shared, transport.as_mut()).await;
            }

            _ = sweep.tick() => {
                let events = {
                    let mut liveness = shared.liveness.lock().expect("liveness lock");
                    liveness.sweep(now_ms())
                };
                for event in events {
                    notify_observers(&shared, &dispatcher, event).await;
                }
            }
        }
    }

    shared.lifecycle.send_replace(LifecycleState::Stopping);
    if let Err(e) = transport.close().await {
        tracing::warn!("transport close failed: {e}");
    }
    dispatcher.shutdown().await;
    *shared.cmd_tx.lock().expect("cmd_tx lock") = None;
    shared.lifecycle.send_replace(LifecycleState::Stopped);
    tracing::debug!("bus for '{}' stopped", shared.my_hostname);
}

/// Decode an inbound frame, refresh the sender's liveness, and hand
/// the message to its topic handler if this node is addressed.
async fn handle_inbound(shared: &Arc<BusShared>, dispatcher: &Dispatcher, inbound: Inbound) {
    let message = match Message::from_bytes(&inbound.payload) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!("undecodable frame on '{}': {e}", inbound.topic);
            return;
        }
    };

    // All inbound traffic doubles as a heartbeat for its sender.
    if message.sender() != &shared.my_hostname {
        let event = {
            let mut liveness = shared.liveness.lock().expect("liveness lock");
            liveness.record_traffic(message.sender(), now_ms())
        };
        if let Some(event) = event {
            notify_observers(shared, dispatcher, event).await;
        }
    }

    // Heartbeats carry no application payload.
    if inbound.topic == shared.heartbeat_topic {
        return;
    }

    if !(message.is_broadcast() || message.targets_contains(&shared.my_hostname)) {
        return;
    }

    let handler = {
        let registry = shared.registry.lock().expect("registry lock");
        registry.handler_for(&inbound.topic)
    };
    match handler {
        Some(handler) => {
            dispatcher
                .submit(&inbound.topic, DispatchJob::Message { handler, message })
                .await;
        }
        None => {
            tracing::debug!("no handler for topic '{}', message dropped", inbound.topic);
        }
    }
}

/// Fan a liveness transition out to the observer snapshot, keyed by
/// host so per-host ordering is preserved.
async fn notify_observers(shared: &Arc<BusShared>, dispatcher: &Dispatcher, event: NodeStateEvent) {
    let observers = {
        let registry = shared.registry.lock().expect("registry lock");
        registry.observers()
    };
    if observers.is_empty() {
        return;
    }
    tracing::debug!("node '{}' is now {:?}", event.host, event.state);
    let key = event.host.as_str().to_string();
    dispatcher
        .submit(
            &key,
            DispatchJob::NodeState {
                observers,
                host: event.host,
                state: event.state,
                timestamp_ms: event.timestamp_ms,
            },
        )
        .await;
}

async fn publish_heartbeat(shared: &Arc<BusShared>, transport: &mut dyn Transport) {
    let message = Message::broadcast(
        shared.my_hostname.clone(),
        shared.heartbeat_topic.clone(),
        Vec::<String>::new(),
    );
    match message.to_bytes() {
        Ok(bytes) => {
            if let Err(e) = transport.publish(&shared.heartbeat_topic, bytes).await {
                // Peers being down is normal; they will miss us and
                // mark us Missing on their side.
                tracing::debug!("heartbeat publish failed: {e}");
            }
        }
        Err(e) => tracing::warn!("heartbeat serialization failed: {e}"),
    }
}
