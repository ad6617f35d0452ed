//! Organizer commands, guest submissions and queries over shared jam state.
//!
//! Every mutation follows the same path while holding the song's writer lock:
//!
//! 1. clone the song into a draft and apply the command to the draft,
//! 2. bump the revision and commit the whole draft to the [`JamStore`],
//! 3. swap the draft in and publish the event.
//!
//! A refused command or a failed commit drops the draft, so prior state is left
//! intact. Publishing under the lock keeps one song's events in revision order.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::coordinator::CandidacySubmitter;
use crate::core::events::{
    EventBroadcaster, EventEnvelope, EventPayload, SlotChanged, SongStatusChanged,
};
use crate::core::model::{
    BucketSnapshot, Candidacy, Instrument, NewSong, OnStageView, OpenSongView, SessionSnapshot,
    SongSnapshot, SongStatus, SubmitOutcome,
};
use crate::core::registry::JamSessionRegistry;
use crate::core::song::Song;
use crate::core::state_machine::StatusTransition;
use crate::core::store::{JamStore, SessionRecord};
use crate::core::JamError;
use crate::util::ids::{EventId, GuestId, SessionId, SongId};

type AuditEntry = (Option<GuestId>, AuditAction, Option<String>);

/// Outcome of a command applied to a draft song.
struct Applied<R> {
    value: R,
    payload: Option<EventPayload>,
    audit: Vec<AuditEntry>,
}

impl<R> Applied<R> {
    fn changed(value: R, payload: EventPayload, audit: Vec<AuditEntry>) -> Self {
        Self {
            value,
            payload: Some(payload),
            audit,
        }
    }

    const fn unchanged(value: R) -> Self {
        Self {
            value,
            payload: None,
            audit: Vec::new(),
        }
    }
}

/// The candidacy engine.
pub struct JamEngine {
    registry: JamSessionRegistry,
    broadcaster: EventBroadcaster,
    store: Arc<dyn JamStore>,
    audit: Option<Arc<Mutex<Box<dyn AuditSink>>>>,
}

impl std::fmt::Debug for JamEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JamEngine")
            .field("audit", &self.audit.is_some())
            .finish_non_exhaustive()
    }
}

impl JamEngine {
    /// Create an empty engine over a store.
    #[must_use]
    pub fn new(store: Arc<dyn JamStore>, event_capacity: usize) -> Self {
        Self::from_parts(
            JamSessionRegistry::new(),
            EventBroadcaster::new(event_capacity),
            store,
        )
    }

    /// Assemble an engine from an existing registry.
    #[must_use]
    pub fn from_parts(
        registry: JamSessionRegistry,
        broadcaster: EventBroadcaster,
        store: Arc<dyn JamStore>,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            store,
            audit: None,
        }
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Box<dyn AuditSink>) -> Self {
        self.audit = Some(Arc::new(Mutex::new(audit)));
        self
    }

    /// Session and song index.
    #[must_use]
    pub const fn registry(&self) -> &JamSessionRegistry {
        &self.registry
    }

    /// Event fan-out.
    #[must_use]
    pub const fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    /// Subscribe to a session's event stream.
    pub fn subscribe(&self, session: SessionId) -> broadcast::Receiver<EventEnvelope> {
        self.broadcaster.subscribe(session)
    }

    /// Open a jam session for an event.
    ///
    /// # Errors
    ///
    /// [`JamError::Store`] if the session could not be persisted.
    pub fn open_session(&self, event_id: EventId) -> Result<SessionId, JamError> {
        let id = SessionId::new();
        self.store.save_session(&SessionRecord { id, event_id })?;
        self.registry.insert_session(id, event_id);
        tracing::info!(session = %id, event = %event_id, "jam session opened");
        Ok(id)
    }

    /// Create a planned song at the end of a session.
    ///
    /// # Errors
    ///
    /// [`JamError::UnknownSession`], [`JamError::InvalidSong`], or [`JamError::Store`].
    pub fn create_song(&self, session: SessionId, new: NewSong) -> Result<SongSnapshot, JamError> {
        // The creation event goes out before the song is reachable by id, so
        // no later mutation of it can be published first.
        let mut created = None;
        self.registry
            .append_song(session, |position| {
                let song = Song::create(session, position, new)?;
                self.store.commit_song(&song.to_record())?;
                self.broadcaster.publish(EventEnvelope::song_status(
                    session,
                    song.id(),
                    song.revision(),
                    SongStatusChanged {
                        old_status: None,
                        new_status: song.status(),
                        auto_rejected: Vec::new(),
                    },
                ));
                created = Some(song.snapshot());
                Ok(song)
            })
            .inspect_err(|e| {
                tracing::warn!(session = %session, error = %e, "create_song refused");
            })?;

        let snapshot = created.ok_or(JamError::UnknownSession(session))?;
        self.record_audit(
            snapshot.id,
            vec![(None, AuditAction::CreateSong, Some(snapshot.title.clone()))],
        );
        tracing::info!(
            session = %session,
            song = %snapshot.id,
            title = %snapshot.title,
            "song created"
        );
        Ok(snapshot)
    }

    /// Move a song through its lifecycle.
    ///
    /// Entering `on_stage` or `canceled` rejects every pending candidacy in the
    /// same atomic step; the swept list travels on the emitted event.
    ///
    /// # Errors
    ///
    /// [`JamError::UnknownSong`], [`JamError::InvalidTransition`], or [`JamError::Store`].
    pub fn move_song_status(
        &self,
        song_id: SongId,
        target: SongStatus,
    ) -> Result<StatusTransition, JamError> {
        self.mutate(song_id, |song| {
            let transition = song.transition(target)?;
            let mut audit: Vec<AuditEntry> = vec![(
                None,
                AuditAction::Transition,
                Some(format!("{} -> {}", transition.from, transition.to)),
            )];
            audit.extend(transition.swept.iter().map(|s| {
                (
                    Some(s.guest),
                    AuditAction::SweepReject,
                    Some(s.instrument.to_string()),
                )
            }));
            let payload = EventPayload::SongStatus(SongStatusChanged {
                old_status: Some(transition.from),
                new_status: transition.to,
                auto_rejected: transition.swept.clone(),
            });
            Ok(Applied::changed(transition, payload, audit))
        })
        .inspect(|t| {
            tracing::info!(
                song = %song_id,
                from = %t.from,
                to = %t.to,
                swept = t.swept.len(),
                "song status changed"
            );
        })
        .inspect_err(|e| tracing::warn!(song = %song_id, error = %e, "move_song_status refused"))
    }

    /// Record a pending candidacy.
    ///
    /// # Errors
    ///
    /// [`JamError::AlreadyApplied`], [`JamError::SongNotOpen`], [`JamError::SlotFull`],
    /// [`JamError::UnknownSong`], [`JamError::UnknownInstrument`], or [`JamError::Store`].
    pub fn propose(
        &self,
        song_id: SongId,
        instrument: Instrument,
        guest: GuestId,
    ) -> Result<BucketSnapshot, JamError> {
        self.mutate(song_id, |song| {
            let status = song.status();
            let bucket = song.ledger_mut().propose(status, instrument, guest)?;
            Ok(Self::slot_applied(
                bucket,
                instrument,
                (Some(guest), AuditAction::Propose, Some(instrument.to_string())),
            ))
        })
        .inspect(|_| {
            tracing::info!(song = %song_id, guest = %guest, %instrument, "candidacy proposed");
        })
    }

    /// Approve a pending candidate.
    ///
    /// # Errors
    ///
    /// [`JamError::NotPending`], [`JamError::SlotFull`], [`JamError::UnknownSong`],
    /// [`JamError::UnknownInstrument`], or [`JamError::Store`].
    pub fn approve_candidate(
        &self,
        song_id: SongId,
        instrument: Instrument,
        guest: GuestId,
    ) -> Result<BucketSnapshot, JamError> {
        self.mutate(song_id, |song| {
            let bucket = song.ledger_mut().approve(instrument, guest)?;
            Ok(Self::slot_applied(
                bucket,
                instrument,
                (Some(guest), AuditAction::Approve, Some(instrument.to_string())),
            ))
        })
        .inspect(|_| {
            tracing::info!(song = %song_id, guest = %guest, %instrument, "candidate approved");
        })
        .inspect_err(|e| tracing::warn!(song = %song_id, error = %e, "approve refused"))
    }

    /// Reject a pending candidate or revoke an approved one. Idempotent.
    ///
    /// # Errors
    ///
    /// [`JamError::NotPending`] if the guest never applied for this bucket,
    /// [`JamError::UnknownSong`], [`JamError::UnknownInstrument`], or [`JamError::Store`].
    pub fn reject_candidate(
        &self,
        song_id: SongId,
        instrument: Instrument,
        guest: GuestId,
    ) -> Result<BucketSnapshot, JamError> {
        self.mutate(song_id, |song| {
            match song.ledger_mut().reject(instrument, guest)? {
                Some(bucket) => Ok(Self::slot_applied(
                    bucket,
                    instrument,
                    (Some(guest), AuditAction::Reject, Some(instrument.to_string())),
                )),
                None => {
                    tracing::debug!(song = %song_id, guest = %guest, "candidacy already rejected");
                    song.ledger()
                        .bucket_snapshot(instrument)
                        .map(Applied::unchanged)
                        .ok_or(JamError::UnknownInstrument {
                            song: song_id,
                            instrument,
                        })
                }
            }
        })
        .inspect_err(|e| tracing::warn!(song = %song_id, error = %e, "reject refused"))
    }

    /// Guest-facing submission. Expected refusals become outcomes rather than errors.
    ///
    /// # Errors
    ///
    /// Only for unexpected failures: unknown song or instrument, or store errors.
    pub fn submit_candidacy(
        &self,
        song_id: SongId,
        instrument: Instrument,
        guest: GuestId,
    ) -> Result<SubmitOutcome, JamError> {
        match self.propose(song_id, instrument, guest) {
            Ok(_) => Ok(SubmitOutcome::Accepted),
            Err(JamError::AlreadyApplied { .. }) => {
                tracing::debug!(song = %song_id, guest = %guest, "duplicate submission");
                Ok(SubmitOutcome::AlreadyApplied)
            }
            Err(JamError::SongNotOpen { .. }) => Ok(SubmitOutcome::SongNotOpen),
            Err(JamError::SlotFull { .. }) => Ok(SubmitOutcome::SlotFull),
            Err(e) => {
                tracing::warn!(song = %song_id, guest = %guest, error = %e, "submission failed");
                Err(e)
            }
        }
    }

    /// Open songs joined with the caller's candidacy.
    ///
    /// # Errors
    ///
    /// [`JamError::UnknownSession`].
    pub fn list_open_songs(
        &self,
        session: SessionId,
        guest: GuestId,
    ) -> Result<Vec<OpenSongView>, JamError> {
        self.registry.list_open_songs(session, guest)
    }

    /// Songs on stage where the caller is approved.
    ///
    /// # Errors
    ///
    /// [`JamError::UnknownSession`].
    pub fn list_my_on_stage_songs(
        &self,
        session: SessionId,
        guest: GuestId,
    ) -> Result<Vec<OnStageView>, JamError> {
        self.registry.list_my_on_stage_songs(session, guest)
    }

    /// Full-state snapshot of a session.
    ///
    /// # Errors
    ///
    /// [`JamError::UnknownSession`].
    pub fn session_snapshot(&self, session: SessionId) -> Result<SessionSnapshot, JamError> {
        self.registry.session_snapshot(session)
    }

    /// Snapshot of a single song.
    ///
    /// # Errors
    ///
    /// [`JamError::UnknownSong`].
    pub fn song_snapshot(&self, song: SongId) -> Result<SongSnapshot, JamError> {
        self.registry.song_snapshot(song)
    }

    /// A guest's candidacy on a song, whatever its status.
    ///
    /// # Errors
    ///
    /// [`JamError::UnknownSong`].
    pub fn candidacy(&self, song: SongId, guest: GuestId) -> Result<Option<Candidacy>, JamError> {
        self.registry.candidacy(song, guest)
    }

    fn slot_applied(
        bucket: BucketSnapshot,
        instrument: Instrument,
        audit: AuditEntry,
    ) -> Applied<BucketSnapshot> {
        let payload = EventPayload::SlotChange(SlotChanged {
            instrument,
            bucket: bucket.clone(),
        });
        Applied::changed(bucket, payload, vec![audit])
    }

    fn mutate<R, F>(&self, song_id: SongId, op: F) -> Result<R, JamError>
    where
        F: FnOnce(&mut Song) -> Result<Applied<R>, JamError>,
    {
        let cell = self.registry.song_cell(song_id)?;
        let mut song = cell.write();
        let mut draft = song.clone();
        let applied = op(&mut draft)?;
        let Some(payload) = applied.payload else {
            return Ok(applied.value);
        };
        let seq = draft.bump_revision();
        self.store.commit_song(&draft.to_record()).inspect_err(|e| {
            tracing::error!(song = %song_id, error = %e, "commit failed, mutation discarded");
        })?;
        let session = draft.session_id();
        *song = draft;
        self.broadcaster
            .publish(EventEnvelope::new(session, song_id, seq, payload));
        drop(song);
        self.record_audit(song_id, applied.audit);
        Ok(applied.value)
    }

    fn record_audit(&self, song_id: SongId, entries: Vec<AuditEntry>) {
        let Some(audit) = &self.audit else {
            return;
        };
        let mut sink = audit.lock();
        for (guest, action, payload) in entries {
            sink.record(build_audit_event(song_id, guest, action, payload));
        }
    }
}

#[async_trait]
impl CandidacySubmitter for JamEngine {
    async fn submit(
        &self,
        song: SongId,
        instrument: Instrument,
        guest: GuestId,
    ) -> Result<SubmitOutcome, JamError> {
        self.submit_candidacy(song, instrument, guest)
    }
}
