//! Pending session requests.
//!
//! Maps the correlation hash of every session-scoped request the gateway
//! forwarded to the session waiting on it. The first response completes the
//! entry; entries older than the timeout are expired so the session can be
//! told.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use vany_bus::{CorrelationHash, MessageType, SessionId};

/// A forwarded request awaiting its first response.
#[derive(Debug, Clone)]
struct PendingRequest {
    kind: MessageType,
    sid: SessionId,
    created_at: Instant,
}

/// A request that expired without a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredRequest {
    pub hash: CorrelationHash,
    pub kind: MessageType,
    pub sid: SessionId,
    pub elapsed: Duration,
}

/// Statistics for the pending store.
#[derive(Debug, Default)]
struct PendingStats {
    total_registered: AtomicU64,
    total_completed: AtomicU64,
    total_timeouts: AtomicU64,
    total_unmatched: AtomicU64,
}

/// Point-in-time copy of the store's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingStatsSnapshot {
    pub registered: u64,
    pub completed: u64,
    pub timeouts: u64,
    /// Responses whose hash was not pending (extra fan-in or late).
    pub unmatched: u64,
}

/// Pending request store keyed by correlation hash.
#[derive(Debug)]
pub struct PendingRequestStore {
    pending: DashMap<CorrelationHash, PendingRequest>,
    timeout: Duration,
    stats: PendingStats,
}

impl PendingRequestStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            timeout,
            stats: PendingStats::default(),
        }
    }

    /// Start tracking a forwarded request.
    pub fn register(&self, hash: CorrelationHash, kind: MessageType, sid: SessionId) {
        debug!(hash = %hash, kind = %kind, sid = %sid, "Registered pending request");
        self.pending.insert(
            hash,
            PendingRequest {
                kind,
                sid,
                created_at: Instant::now(),
            },
        );
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark the request answered.
    ///
    /// Returns the response time if `hash` was pending, `None` if it was
    /// already answered, expired or never tracked.
    pub fn complete(&self, hash: CorrelationHash) -> Option<Duration> {
        match self.pending.remove(&hash) {
            Some((_, request)) => {
                let response_time = request.created_at.elapsed();
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    hash = %hash,
                    kind = %request.kind,
                    sid = %request.sid,
                    response_time_ms = response_time.as_millis(),
                    "Completed pending request"
                );
                Some(response_time)
            }
            None => {
                self.stats.total_unmatched.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Remove and return every request older than the timeout at `now`.
    pub fn remove_expired(&self, now: Instant) -> Vec<ExpiredRequest> {
        let mut expired = Vec::new();

        self.pending.retain(|hash, request| {
            let elapsed = now.saturating_duration_since(request.created_at);
            if elapsed > self.timeout {
                warn!(
                    hash = %hash,
                    kind = %request.kind,
                    sid = %request.sid,
                    elapsed_ms = elapsed.as_millis(),
                    timeout_ms = self.timeout.as_millis(),
                    "Removing expired pending request"
                );
                expired.push(ExpiredRequest {
                    hash: *hash,
                    kind: request.kind.clone(),
                    sid: request.sid.clone(),
                    elapsed,
                });
                false
            } else {
                true
            }
        });

        self.stats
            .total_timeouts
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        expired
    }

    /// Drop every request belonging to `sid`, e.g. when the session closes.
    pub fn forget_session(&self, sid: &SessionId) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, request| &request.sid != sid);
        before.saturating_sub(self.pending.len())
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_pending(&self, hash: &CorrelationHash) -> bool {
        self.pending.contains_key(hash)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn stats(&self) -> PendingStatsSnapshot {
        PendingStatsSnapshot {
            registered: self.stats.total_registered.load(Ordering::Relaxed),
            completed: self.stats.total_completed.load(Ordering::Relaxed),
            timeouts: self.stats.total_timeouts.load(Ordering::Relaxed),
            unmatched: self.stats.total_unmatched.load(Ordering::Relaxed),
        }
    }
}
