//! Audit trail of accepted mutations.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::clock::now_ms;
use crate::util::ids::{GuestId, SongId};

/// Action recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Organizer created a song.
    CreateSong,
    /// Organizer moved a song through its lifecycle.
    Transition,
    /// Guest applied for a slot.
    Propose,
    /// Organizer approved a candidate.
    Approve,
    /// Organizer rejected or revoked a candidate.
    Reject,
    /// Candidate rejected by a lifecycle sweep.
    SweepReject,
}

/// Audit event structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Song concerned.
    pub song_id: SongId,
    /// Guest concerned, when the action targets a candidacy.
    pub guest: Option<GuestId>,
    /// Action taken.
    pub action: AuditAction,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub payload: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send {
    /// Record an audit event.
    fn record(&mut self, event: AuditEvent);
}

/// In-memory audit sink keeping the most recent events.
pub struct InMemoryAuditSink {
    events: VecDeque<AuditEvent>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(max_events.min(1024)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.iter().cloned().collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&mut self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        if self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Sink forwarding to another sink shared behind a mutex, so callers can keep
/// a handle for inspection after handing one to the engine.
pub struct SharedAuditSink<S> {
    inner: std::sync::Arc<parking_lot::Mutex<S>>,
}

impl<S> Clone for SharedAuditSink<S> {
    fn clone(&self) -> Self {
        Self {
            inner: std::sync::Arc::clone(&self.inner),
        }
    }
}

impl<S: AuditSink> SharedAuditSink<S> {
    /// Wrap a sink.
    pub fn new(sink: S) -> Self {
        Self {
            inner: std::sync::Arc::new(parking_lot::Mutex::new(sink)),
        }
    }

    /// Run a closure against the wrapped sink.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.lock())
    }
}

impl<S: AuditSink> AuditSink for SharedAuditSink<S> {
    fn record(&mut self, event: AuditEvent) {
        self.inner.lock().record(event);
    }
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    song_id: SongId,
    guest: Option<GuestId>,
    action: AuditAction,
    payload: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: Uuid::new_v4().to_string(),
        song_id,
        guest,
        action,
        created_at_ms: now_ms(),
        payload,
    }
}
