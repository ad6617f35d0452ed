//! Song aggregate: metadata, lifecycle status and slot ledger.

use crate::core::ledger::SlotLedger;
use crate::core::model::{NewSong, SongSnapshot, SongStatus};
use crate::core::state_machine::{SongStateMachine, StatusTransition};
use crate::core::store::SongRecord;
use crate::core::JamError;
use crate::util::ids::{SessionId, SongId};

/// A song and everything the engine tracks about it.
#[derive(Debug, Clone)]
pub struct Song {
    id: SongId,
    session_id: SessionId,
    position: u32,
    title: String,
    artist: String,
    status: SongStatus,
    ledger: SlotLedger,
    revision: u64,
}

impl Song {
    /// Create a planned song.
    ///
    /// # Errors
    ///
    /// [`JamError::InvalidSong`] for an empty title or invalid buckets.
    pub fn create(session_id: SessionId, position: u32, new: NewSong) -> Result<Self, JamError> {
        if new.title.trim().is_empty() {
            return Err(JamError::InvalidSong("title must not be empty".into()));
        }
        let id = SongId::new();
        let ledger = SlotLedger::new(id, &new.buckets)?;
        Ok(Self {
            id,
            session_id,
            position,
            title: new.title,
            artist: new.artist,
            status: SongStatus::Planned,
            ledger,
            revision: 0,
        })
    }

    /// Rebuild from a stored record.
    ///
    /// # Errors
    ///
    /// [`JamError::Store`] if the record is inconsistent.
    pub fn from_record(record: SongRecord) -> Result<Self, JamError> {
        let ledger = SlotLedger::restore(record.id, &record.buckets, record.candidacies)?;
        Ok(Self {
            id: record.id,
            session_id: record.session_id,
            position: record.position,
            title: record.title,
            artist: record.artist,
            status: record.status,
            ledger,
            revision: record.revision,
        })
    }

    /// Persisted form.
    #[must_use]
    pub fn to_record(&self) -> SongRecord {
        SongRecord {
            id: self.id,
            session_id: self.session_id,
            position: self.position,
            title: self.title.clone(),
            artist: self.artist.clone(),
            status: self.status,
            buckets: self.ledger.specs(),
            candidacies: self.ledger.candidacies(),
            revision: self.revision,
        }
    }

    /// Read view.
    #[must_use]
    pub fn snapshot(&self) -> SongSnapshot {
        SongSnapshot {
            id: self.id,
            session_id: self.session_id,
            title: self.title.clone(),
            artist: self.artist.clone(),
            status: self.status,
            buckets: self.ledger.snapshots(),
            revision: self.revision,
        }
    }

    /// Song identifier.
    #[must_use]
    pub const fn id(&self) -> SongId {
        self.id
    }

    /// Owning session.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Order inside the session.
    #[must_use]
    pub const fn position(&self) -> u32 {
        self.position
    }

    /// Lifecycle status.
    #[must_use]
    pub const fn status(&self) -> SongStatus {
        self.status
    }

    /// Mutation counter.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Slot ledger.
    #[must_use]
    pub const fn ledger(&self) -> &SlotLedger {
        &self.ledger
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut SlotLedger {
        &mut self.ledger
    }

    /// Move through the lifecycle, applying the sweep if the target requires it.
    ///
    /// # Errors
    ///
    /// [`JamError::InvalidTransition`]; the song is unchanged.
    pub fn transition(&mut self, target: SongStatus) -> Result<StatusTransition, JamError> {
        SongStateMachine::apply(&mut self.status, &mut self.ledger, target)
    }

    pub(crate) fn bump_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}
