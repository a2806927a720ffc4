//! # Node Run Loop
//!
//! Each node owns one thread, one bus subscription and one frozen dispatch
//! table. An iteration drains the subscription, dispatches each decoded
//! message, runs the actor's periodic work and sleeps for the poll interval.
//! Stop is cooperative: the flag is checked at the top of every iteration.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use vany_bus::{decode, BusClient, Message, Subscription, SubscriptionError};
use vany_telemetry::{
    HistogramTimer, BUS_DECODE_FAILURES, BUS_MESSAGES_RECEIVED, HANDLER_INVOCATIONS,
    NODES_RUNNING,
};

use crate::{Actor, DispatchTable, HandlerError, NodeConfig, NodeContext, NodeError};

/// Lifecycle of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
    Created = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl NodeState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

#[derive(Debug)]
struct SharedState(AtomicU8);

impl SharedState {
    fn new() -> Self {
        Self(AtomicU8::new(NodeState::Created as u8))
    }

    fn get(&self) -> NodeState {
        NodeState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: NodeState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Move `from -> to` only if currently in `from`.
    fn transition(&self, from: NodeState, to: NodeState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Per-node counters.
#[derive(Debug, Default)]
pub struct NodeStats {
    received: AtomicU64,
    decode_failures: AtomicU64,
    dispatched: AtomicU64,
    handler_failures: AtomicU64,
    iterations: AtomicU64,
}

/// Point-in-time copy of [`NodeStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStatsSnapshot {
    /// Payloads taken off the subscription.
    pub received: u64,
    /// Payloads dropped because they did not decode.
    pub decode_failures: u64,
    /// Messages that matched a handler.
    pub dispatched: u64,
    /// Handler invocations that returned an error or panicked.
    pub handler_failures: u64,
    /// Completed run-loop iterations.
    pub iterations: u64,
}

impl NodeStats {
    fn snapshot(&self) -> NodeStatsSnapshot {
        NodeStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            iterations: self.iterations.load(Ordering::Relaxed),
        }
    }
}

/// Entry point for starting nodes.
pub struct Node;

impl Node {
    /// Subscribe, freeze the dispatch table and start the run loop.
    ///
    /// Fails if the configuration is invalid or the bus refuses the
    /// subscription; in both cases no thread is started.
    pub fn spawn<A: Actor>(
        actor: A,
        bus: Arc<dyn BusClient>,
        config: NodeConfig,
    ) -> Result<NodeHandle, NodeError> {
        config.validate()?;

        let name = actor.name().to_string();
        let state = Arc::new(SharedState::new());
        let stats = Arc::new(NodeStats::default());

        let mut table = DispatchTable::new();
        A::register(&mut table);

        let subscription = bus.subscribe(&config.topic).map_err(|e| {
            error!(node = %name, topic = %config.topic, error = %e, "Bus subscription failed");
            NodeError::BusConnect(e)
        })?;

        let ctx = NodeContext::new(name.clone(), config.topic.clone(), bus);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let run = RunLoop {
            actor,
            table,
            subscription,
            ctx,
            poll_interval: config.poll_interval,
            shutdown: shutdown_rx,
            state: state.clone(),
            stats: stats.clone(),
        };

        state.set(NodeState::Running);
        let thread = thread::Builder::new()
            .name(format!("node-{name}"))
            .spawn(move || run.run())
            .map_err(|e| {
                state.set(NodeState::Stopped);
                NodeError::Spawn(e)
            })?;

        info!(node = %name, topic = %config.topic, "Node started");

        Ok(NodeHandle {
            name,
            state,
            stats,
            shutdown: shutdown_tx,
            thread: Some(thread),
        })
    }
}

/// Owner's handle to a running node.
///
/// Dropping the handle signals stop without waiting for the thread.
pub struct NodeHandle {
    name: String,
    state: Arc<SharedState>,
    stats: Arc<NodeStats>,
    shutdown: watch::Sender<bool>,
    thread: Option<JoinHandle<()>>,
}

impl NodeHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> NodeState {
        self.state.get()
    }

    #[must_use]
    pub fn stats(&self) -> NodeStatsSnapshot {
        self.stats.snapshot()
    }

    /// Ask the loop to exit at the top of its next iteration.
    pub fn stop(&self) {
        self.state.transition(NodeState::Running, NodeState::Stopping);
        self.shutdown.send_replace(true);
    }

    /// Whether the node thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the node and wait for its thread.
    pub fn join(mut self) -> Result<(), NodeError> {
        self.stop();
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        thread.join().map_err(|payload| {
            self.state.set(NodeState::Stopped);
            NodeError::Panicked(panic_message(payload.as_ref()))
        })
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
        }
    }
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

struct RunLoop<A: Actor> {
    actor: A,
    table: DispatchTable<A>,
    subscription: Subscription,
    ctx: NodeContext,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
    state: Arc<SharedState>,
    stats: Arc<NodeStats>,
}

impl<A: Actor> RunLoop<A> {
    fn run(mut self) {
        let _span = vany_telemetry::node_span!("node", node = %self.ctx.name()).entered();
        NODES_RUNNING.inc();
        debug!(node = %self.ctx.name(), capabilities = ?self.table.capabilities(), "Run loop entered");
        self.actor.on_start(&self.ctx);

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            if let Err(SubscriptionError::Closed) = self.drain() {
                warn!(node = %self.ctx.name(), "Bus closed, stopping node");
                break;
            }

            self.actor.tick(&self.ctx);
            self.stats.iterations.fetch_add(1, Ordering::Relaxed);

            thread::sleep(self.poll_interval);
        }

        self.state.set(NodeState::Stopping);
        self.actor.on_stop(&self.ctx);
        self.state.set(NodeState::Stopped);
        NODES_RUNNING.dec();
        info!(node = %self.ctx.name(), "Node stopped");
    }

    fn drain(&mut self) -> Result<(), SubscriptionError> {
        while let Some(payload) = self.subscription.poll()? {
            self.handle_payload(&payload);
        }
        Ok(())
    }

    fn handle_payload(&mut self, payload: &[u8]) {
        let name = self.ctx.name().to_string();
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        BUS_MESSAGES_RECEIVED.with_label_values(&[name.as_str()]).inc();

        let message = match decode(payload) {
            Ok(message) => message,
            Err(e) => {
                self.stats.decode_failures.fetch_add(1, Ordering::Relaxed);
                BUS_DECODE_FAILURES.with_label_values(&[name.as_str()]).inc();
                warn!(node = %name, error = %e, len = payload.len(), "Dropping undecodable payload");
                return;
            }
        };

        self.actor.on_message(&message, &self.ctx);

        let Some(handler) = self.table.lookup(&message.kind) else {
            return;
        };
        self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
        self.dispatch(handler, &message, &name);
    }

    fn dispatch(&mut self, handler: crate::HandlerFn<A>, message: &Message, name: &str) {
        let kind = message.kind.to_string();
        let _timer = HistogramTimer::handler(&kind);

        let actor = &mut self.actor;
        let ctx = &self.ctx;
        let result = panic::catch_unwind(AssertUnwindSafe(|| handler(actor, message, ctx)))
            .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload.as_ref()))));

        match result {
            Ok(()) => {
                HANDLER_INVOCATIONS.with_label_values(&[name, kind.as_str(), "ok"]).inc();
                debug!(node = %name, hash = %message.hash, kind = %kind, "Handled message");
            }
            Err(e) => {
                self.stats.handler_failures.fetch_add(1, Ordering::Relaxed);
                HANDLER_INVOCATIONS.with_label_values(&[name, kind.as_str(), "error"]).inc();
                error!(
                    node = %name,
                    hash = %message.hash,
                    sid = ?message.sid,
                    kind = %kind,
                    error = %e,
                    error_kind = e.kind(),
                    "Handler failed"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
