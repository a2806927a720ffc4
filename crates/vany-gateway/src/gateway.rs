//! # Gateway Node
//!
//! Bridges external client sessions to the bus.
//!
//! ```text
//!  transport ──enqueue_request()──→ [queue] ──tick()──→ publish(to="All", fresh hash, sid)
//!                                                          │
//!  transport ←──emit_to(sid)─── on_message(*_response) ←───┘ (via the bus)
//!            ←──broadcast()──── hello_response without sid
//! ```
//!
//! Session-scoped responses go only to the session named by their `sid`.
//! `hello` is not session-scoped: the gateway publishes it without a sid and
//! every `hello_response` is fanned out to all sessions.

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use vany_bus::{Capability, Message, MessageType, SessionId, BROADCAST_RECIPIENT};
use vany_node::{Actor, NodeContext};
use vany_telemetry::{
    GATEWAY_DELIVERY_FAILURES, GATEWAY_PENDING_REQUESTS, GATEWAY_REQUESTS_FORWARDED,
    GATEWAY_REQUEST_TIMEOUTS, GATEWAY_RESPONSES_DELIVERED,
};

use crate::pending::PendingRequestStore;
use crate::transport::{ClientTransport, OutboundFrame};
use crate::GatewayError;

/// Node name the gateway publishes under.
pub const GATEWAY_NODE_NAME: &str = "Gateway";

/// Default time a session waits for a response before being told it timed out.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub name: String,
    /// `None` disables expiry; unanswered requests then wait forever.
    pub request_timeout: Option<Duration>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: GATEWAY_NODE_NAME.to_string(),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

/// A request as received from a client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientRequest {
    /// Intended recipient. Logged only; every request is published to "All".
    pub to: String,
    pub kind: MessageType,
    pub data: Value,
    pub sid: Option<SessionId>,
}

#[derive(Debug)]
enum Command {
    Request(ClientRequest),
    SessionClosed(SessionId),
}

#[derive(Debug, Default)]
struct GatewayStats {
    forwarded: AtomicU64,
    publish_failures: AtomicU64,
    delivered: AtomicU64,
    broadcast: AtomicU64,
    delivery_failures: AtomicU64,
    timeouts: AtomicU64,
    ignored: AtomicU64,
}

/// Point-in-time copy of the gateway's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStatsSnapshot {
    /// Client requests published to the bus.
    pub forwarded: u64,
    /// Client requests the bus refused.
    pub publish_failures: u64,
    /// Responses delivered to a single session.
    pub delivered: u64,
    /// Responses fanned out to all sessions.
    pub broadcast: u64,
    /// Frames the transport could not deliver.
    pub delivery_failures: u64,
    /// Session requests that expired unanswered.
    pub timeouts: u64,
    /// Sid-less responses that had nowhere to go.
    pub ignored: u64,
}

/// Thread-safe intake for the gateway, used by transport code.
#[derive(Debug, Clone)]
pub struct GatewayHandle {
    commands: mpsc::UnboundedSender<Command>,
    stats: Arc<GatewayStats>,
}

impl GatewayHandle {
    /// Queue a client request for the gateway's next iteration.
    pub fn enqueue_request(
        &self,
        to: impl Into<String>,
        kind: impl Into<MessageType>,
        data: Value,
        sid: Option<SessionId>,
    ) -> Result<(), GatewayError> {
        self.enqueue(ClientRequest {
            to: to.into(),
            kind: kind.into(),
            data,
            sid,
        })
    }

    /// Queue an already-built request.
    pub fn enqueue(&self, request: ClientRequest) -> Result<(), GatewayError> {
        self.commands
            .send(Command::Request(request))
            .map_err(|_| GatewayError::Closed)
    }

    /// Tell the gateway a session is gone so its pending requests are dropped.
    pub fn session_closed(&self, sid: SessionId) -> Result<(), GatewayError> {
        self.commands
            .send(Command::SessionClosed(sid))
            .map_err(|_| GatewayError::Closed)
    }

    #[must_use]
    pub fn stats(&self) -> GatewayStatsSnapshot {
        let s = &self.stats;
        GatewayStatsSnapshot {
            forwarded: s.forwarded.load(Ordering::Relaxed),
            publish_failures: s.publish_failures.load(Ordering::Relaxed),
            delivered: s.delivered.load(Ordering::Relaxed),
            broadcast: s.broadcast.load(Ordering::Relaxed),
            delivery_failures: s.delivery_failures.load(Ordering::Relaxed),
            timeouts: s.timeouts.load(Ordering::Relaxed),
            ignored: s.ignored.load(Ordering::Relaxed),
        }
    }
}

/// The gateway actor.
pub struct Gateway {
    config: GatewayConfig,
    transport: Arc<dyn ClientTransport>,
    commands: mpsc::UnboundedReceiver<Command>,
    pending: Option<PendingRequestStore>,
    stats: Arc<GatewayStats>,
}

impl Gateway {
    /// Create the actor and the handle transports use to feed it.
    pub fn new(config: GatewayConfig, transport: Arc<dyn ClientTransport>) -> (Self, GatewayHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(GatewayStats::default());
        let pending = config.request_timeout.map(PendingRequestStore::new);

        let gateway = Self {
            config,
            transport,
            commands: rx,
            pending,
            stats: stats.clone(),
        };
        let handle = GatewayHandle {
            commands: tx,
            stats,
        };
        (gateway, handle)
    }

    fn forward(&mut self, request: ClientRequest, ctx: &NodeContext) {
        let session_scoped = request
            .kind
            .capability()
            .map_or(true, |cap| cap.is_session_scoped());
        let sid = if session_scoped { request.sid } else { None };

        let message = Message::new(
            self.config.name.as_str(),
            BROADCAST_RECIPIENT,
            request.kind,
            request.data,
        )
        .with_sid(sid);

        if let Err(e) = ctx.publish(&message) {
            self.stats.publish_failures.fetch_add(1, Ordering::Relaxed);
            warn!(
                node = %self.config.name,
                kind = %message.kind,
                sid = ?message.sid,
                error = %e,
                "Failed to forward client request"
            );
            return;
        }

        self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
        GATEWAY_REQUESTS_FORWARDED.inc();
        debug!(
            node = %self.config.name,
            hash = %message.hash,
            sid = ?message.sid,
            kind = %message.kind,
            intended = %request.to,
            "Forwarded client request"
        );

        if let (Some(pending), Some(sid)) = (&self.pending, message.sid) {
            pending.register(message.hash, message.kind, sid);
            GATEWAY_PENDING_REQUESTS.set(pending.pending_count() as f64);
        }
    }

    fn drain_commands(&mut self, ctx: &NodeContext) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Request(request) => self.forward(request, ctx),
                Command::SessionClosed(sid) => {
                    if let Some(pending) = &self.pending {
                        let dropped = pending.forget_session(&sid);
                        if dropped > 0 {
                            debug!(sid = %sid, dropped, "Dropped pending requests of closed session");
                        }
                    }
                }
            }
        }
    }

    fn expire_pending(&mut self) {
        let Some(pending) = &self.pending else {
            return;
        };
        let expired = pending.remove_expired(Instant::now());
        if expired.is_empty() {
            return;
        }
        GATEWAY_PENDING_REQUESTS.set(pending.pending_count() as f64);

        for request in expired {
            self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
            GATEWAY_REQUEST_TIMEOUTS.inc();
            let delivered = OutboundFrame::request_timeout(request.hash, &request.kind)
                .and_then(|frame| self.transport.emit_to(&request.sid, frame));
            if let Err(e) = delivered {
                debug!(sid = %request.sid, hash = %request.hash, error = %e, "Timeout notice not delivered");
            }
        }
    }

    fn deliver_to_session(&self, message: &Message, sid: &SessionId) {
        if let Some(pending) = &self.pending {
            if pending.complete(message.hash).is_some() {
                GATEWAY_PENDING_REQUESTS.set(pending.pending_count() as f64);
            }
        }

        let result = OutboundFrame::response(message)
            .and_then(|frame| self.transport.emit_to(sid, frame));

        match result {
            Ok(()) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                GATEWAY_RESPONSES_DELIVERED.with_label_values(&["session"]).inc();
                debug!(hash = %message.hash, sid = %sid, kind = %message.kind, from = %message.from, "Delivered response");
            }
            Err(e) => {
                self.stats.delivery_failures.fetch_add(1, Ordering::Relaxed);
                GATEWAY_DELIVERY_FAILURES.inc();
                warn!(hash = %message.hash, sid = %sid, kind = %message.kind, error = %e, "Response delivery failed");
            }
        }
    }

    fn broadcast(&self, message: &Message) {
        match OutboundFrame::response(message) {
            Ok(frame) => {
                let sessions = self.transport.broadcast(frame);
                self.stats.broadcast.fetch_add(1, Ordering::Relaxed);
                GATEWAY_RESPONSES_DELIVERED.with_label_values(&["broadcast"]).inc();
                debug!(hash = %message.hash, from = %message.from, sessions, "Broadcast response");
            }
            Err(e) => {
                self.stats.delivery_failures.fetch_add(1, Ordering::Relaxed);
                GATEWAY_DELIVERY_FAILURES.inc();
                warn!(hash = %message.hash, error = %e, "Broadcast encoding failed");
            }
        }
    }
}

impl Actor for Gateway {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn on_start(&mut self, _ctx: &NodeContext) {
        info!(
            node = %self.config.name,
            request_timeout = ?self.config.request_timeout,
            "Gateway accepting client requests"
        );
    }

    fn on_message(&mut self, message: &Message, _ctx: &NodeContext) {
        if !message.kind.is_response() {
            return;
        }
        match &message.sid {
            Some(sid) => self.deliver_to_session(message, sid),
            None if message.kind == MessageType::Response(Capability::Hello) => {
                self.broadcast(message);
            }
            None => {
                self.stats.ignored.fetch_add(1, Ordering::Relaxed);
                debug!(hash = %message.hash, kind = %message.kind, "Response without session ignored");
            }
        }
    }

    fn tick(&mut self, ctx: &NodeContext) {
        self.drain_commands(ctx);
        self.expire_pending();
    }

    fn on_stop(&mut self, _ctx: &NodeContext) {
        self.commands.close();
        let pending = self.pending.as_ref().map_or(0, PendingRequestStore::pending_count);
        info!(node = %self.config.name, pending, "Gateway stopped");
    }
}
