/// Dispatcher pool — runs application callbacks off the bus loop.
///
/// Jobs are routed to a worker by a stable key hash (topic for message
/// handlers, host for state-change notifications), so callbacks for
/// the same key execute in FIFO order while unrelated callbacks
/// proceed concurrently. A panicking callback is caught at the
/// boundary, logged, and never takes a worker down.
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::message::Message;
use crate::types::{HostName, MessageHandler, NodeStateChangeHandler, RemoteNodeState};

pub(crate) enum DispatchJob {
    /// Invoke a topic handler with a delivered message.
    Message {
        handler: Arc<dyn MessageHandler>,
        message: Message,
    },
    /// Notify an observer snapshot of a liveness transition, in
    /// registration order.
    NodeState {
        observers: Vec<Arc<dyn NodeStateChangeHandler>>,
        host: HostName,
        state: RemoteNodeState,
        timestamp_ms: u64,
    },
}

pub(crate) struct Dispatcher {
    workers: Vec<mpsc::Sender<DispatchJob>>,
    handles: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub(crate) fn spawn(workers: usize, buffer: usize) -> Self {
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let (tx, rx) = mpsc::channel(buffer);
            senders.push(tx);
            handles.push(tokio::spawn(worker_loop(rx)));
        }
        Self {
            workers: senders,
            handles,
        }
    }

    /// Queue a job on the worker owning `key`. Applies backpressure
    /// when that worker's queue is full.
    pub(crate) async fn submit(&self, key: &str, job: DispatchJob) {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.workers.len();
        // A closed worker means we are mid-shutdown; drop the job.
        let _ = self.workers[index].send(job).await;
    }

    /// Close the queues and wait for the workers to drain and exit.
    pub(crate) async fn shutdown(mut self) {
        self.workers.clear();
        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(mut rx: mpsc::Receiver<DispatchJob>) {
    while let Some(job) = rx.recv().await {
        run_job(job);
    }
}

fn run_job(job: DispatchJob) {
    match job {
        DispatchJob::Message { handler, message } => {
            let result = catch_unwind(AssertUnwindSafe(|| handler.handle_message(&message)));
            if let Err(panic) = result {
                tracing::warn!(
                    "message handler for topic '{}' panicked: {}",
                    message.topic(),
                    panic_text(panic.as_ref())
                );
            }
        }
        DispatchJob::NodeState {
            observers,
            host,
            state,
            timestamp_ms,
        } => {
            for observer in &observers {
                let result = catch_unwind(AssertUnwindSafe(|| {
                    observer.node_state_changed(&host, state, timestamp_ms)
                }));
                if let Err(panic) = result {
                    tracing::warn!(
                        "node state observer for '{host}' panicked: {}",
                        panic_text(panic.as_ref())
                    );
                }
            }
        }
    }
}

fn panic_text(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
