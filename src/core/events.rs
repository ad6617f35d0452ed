//! Change notifications and their per-session fan-out.
//!
//! Every accepted mutation produces one [`EventEnvelope`]. Envelopes for a
//! single song carry strictly increasing `seq` values (the song revision after
//! the mutation); nothing is promised about ordering across songs.
//!
//! Delivery is best-effort. Consumers should treat an event as a cue to pull a
//! fresh snapshot, or apply it with [`SongSnapshot::apply_event`] and re-fetch
//! when that reports a gap.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::core::ledger::SweptCandidacy;
use crate::core::model::{BucketSnapshot, Instrument, SongSnapshot, SongStatus};
use crate::util::ids::{SessionId, SongId};

/// Wire discriminator of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A song changed lifecycle status (or was created).
    SongStatus,
    /// A bucket's membership changed.
    SlotChange,
}

/// Payload of a `song_status` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongStatusChanged {
    /// Previous status; `None` when the song was just created.
    pub old_status: Option<SongStatus>,
    /// New status.
    pub new_status: SongStatus,
    /// Pending candidacies rejected by the move.
    #[serde(default)]
    pub auto_rejected: Vec<SweptCandidacy>,
}

/// Payload of a `slot_change` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotChanged {
    /// Bucket that changed.
    pub instrument: Instrument,
    /// Bucket state after the change.
    pub bucket: BucketSnapshot,
}

/// Event body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    /// Status change.
    SongStatus(SongStatusChanged),
    /// Bucket change.
    SlotChange(SlotChanged),
}

/// Message pushed to session subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Payload discriminator.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Session the song belongs to.
    pub session_id: SessionId,
    /// Song that changed.
    pub song_id: SongId,
    /// Song revision after the change.
    pub seq: u64,
    /// Event body.
    pub payload: EventPayload,
}

impl EventPayload {
    /// Discriminator matching this payload.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::SongStatus(_) => EventKind::SongStatus,
            Self::SlotChange(_) => EventKind::SlotChange,
        }
    }
}

impl EventEnvelope {
    /// Wrap a payload, deriving its discriminator.
    #[must_use]
    pub fn new(session_id: SessionId, song_id: SongId, seq: u64, payload: EventPayload) -> Self {
        Self {
            kind: payload.kind(),
            session_id,
            song_id,
            seq,
            payload,
        }
    }

    /// Build a `song_status` envelope.
    #[must_use]
    pub const fn song_status(
        session_id: SessionId,
        song_id: SongId,
        seq: u64,
        change: SongStatusChanged,
    ) -> Self {
        Self {
            kind: EventKind::SongStatus,
            session_id,
            song_id,
            seq,
            payload: EventPayload::SongStatus(change),
        }
    }

    /// Build a `slot_change` envelope.
    #[must_use]
    pub const fn slot_change(
        session_id: SessionId,
        song_id: SongId,
        seq: u64,
        change: SlotChanged,
    ) -> Self {
        Self {
            kind: EventKind::SlotChange,
            session_id,
            song_id,
            seq,
            payload: EventPayload::SlotChange(change),
        }
    }

    /// Serialize for transport.
    ///
    /// # Errors
    ///
    /// Propagates `serde_json` failures.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// What [`SongSnapshot::apply_event`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Event applied; snapshot advanced to its `seq`.
    Applied,
    /// Event for another song or already reflected. Ignored.
    Ignored,
    /// Events were missed. Snapshot unchanged; re-fetch.
    Gap,
}

impl SongSnapshot {
    /// Advance this snapshot by one event.
    pub fn apply_event(&mut self, event: &EventEnvelope) -> ReplayOutcome {
        if event.song_id != self.id || event.seq <= self.revision {
            return ReplayOutcome::Ignored;
        }
        if event.seq != self.revision + 1 {
            return ReplayOutcome::Gap;
        }
        match &event.payload {
            EventPayload::SongStatus(change) => {
                self.status = change.new_status;
                for swept in &change.auto_rejected {
                    if let Some(bucket) = self
                        .buckets
                        .iter_mut()
                        .find(|b| b.instrument == swept.instrument)
                    {
                        bucket.pending.retain(|g| *g != swept.guest);
                        bucket.rejected.push(swept.guest);
                    }
                }
            }
            EventPayload::SlotChange(change) => {
                if let Some(bucket) = self
                    .buckets
                    .iter_mut()
                    .find(|b| b.instrument == change.instrument)
                {
                    *bucket = change.bucket.clone();
                }
            }
        }
        self.revision = event.seq;
        ReplayOutcome::Applied
    }
}

/// Per-session fan-out of [`EventEnvelope`]s.
///
/// Each session gets its own `tokio::sync::broadcast` channel, created on first
/// subscription. Publishing never blocks; a subscriber that falls more than
/// `capacity` events behind observes `Lagged` and should re-fetch.
pub struct EventBroadcaster {
    capacity: usize,
    channels: RwLock<HashMap<SessionId, broadcast::Sender<EventEnvelope>>>,
}

impl EventBroadcaster {
    /// Create a broadcaster buffering up to `capacity` events per session.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to every future event of a session.
    pub fn subscribe(&self, session: SessionId) -> broadcast::Receiver<EventEnvelope> {
        if let Some(tx) = self.channels.read().get(&session) {
            return tx.subscribe();
        }
        let mut channels = self.channels.write();
        channels
            .entry(session)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Push an event to the session's current subscribers. Returns how many received it.
    pub fn publish(&self, event: EventEnvelope) -> usize {
        let channels = self.channels.read();
        let Some(tx) = channels.get(&event.session_id) else {
            return 0;
        };
        match tx.send(event) {
            Ok(n) => n,
            Err(_) => {
                tracing::trace!("no live subscribers");
                0
            }
        }
    }

    /// Live subscriber count for a session.
    #[must_use]
    pub fn subscriber_count(&self, session: SessionId) -> usize {
        self.channels
            .read()
            .get(&session)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Drop a session's channel. Its subscribers observe `Closed`.
    pub fn close(&self, session: SessionId) {
        self.channels.write().remove(&session);
    }
}
