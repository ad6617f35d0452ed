//! Sessions, their songs, and the read projections served to guests.
//!
//! Each song lives in its own `RwLock`: writers are serialized per song, and
//! readers take a read guard only long enough to copy a snapshot, so a
//! projection never observes a bucket mid-mutation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::model::{
    Candidacy, CandidacyStatus, MyCandidacy, OnStageView, OpenSongView, SessionSnapshot,
    SongSnapshot, SongStatus,
};
use crate::core::song::Song;
use crate::core::store::{SessionRecord, SongRecord};
use crate::core::JamError;
use crate::util::ids::{EventId, GuestId, SessionId, SongId};

/// Shared handle to one song's state.
pub type SongCell = Arc<RwLock<Song>>;

struct SessionEntry {
    event_id: EventId,
    songs: Vec<SongCell>,
}

/// In-memory index of sessions and songs.
#[derive(Default)]
pub struct JamSessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    songs: RwLock<HashMap<SongId, SongCell>>,
}

impl JamSessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from stored records. Songs are ordered by their stored position.
    ///
    /// # Errors
    ///
    /// [`JamError::Store`] if a song references a missing session or is inconsistent.
    pub fn restore(sessions: Vec<SessionRecord>, songs: Vec<SongRecord>) -> Result<Self, JamError> {
        let registry = Self::new();
        {
            let mut map = registry.sessions.write();
            for record in sessions {
                map.insert(
                    record.id,
                    SessionEntry {
                        event_id: record.event_id,
                        songs: Vec::new(),
                    },
                );
            }
        }
        let mut songs = songs;
        songs.sort_by_key(|s| s.position);
        for record in songs {
            let session = record.session_id;
            let song = Song::from_record(record)?;
            let id = song.id();
            let cell: SongCell = Arc::new(RwLock::new(song));
            registry
                .sessions
                .write()
                .get_mut(&session)
                .ok_or_else(|| {
                    JamError::Store(format!("song {id} references unknown session {session}"))
                })?
                .songs
                .push(Arc::clone(&cell));
            registry.songs.write().insert(id, cell);
        }
        Ok(registry)
    }

    /// Register a session. Returns false if it already existed.
    pub fn insert_session(&self, id: SessionId, event_id: EventId) -> bool {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&id) {
            return false;
        }
        sessions.insert(
            id,
            SessionEntry {
                event_id,
                songs: Vec::new(),
            },
        );
        true
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    /// Append a song built by `build` at the session's next position.
    ///
    /// The session stays write-locked while `build` runs, so concurrent
    /// appends get distinct positions.
    ///
    /// # Errors
    ///
    /// [`JamError::UnknownSession`], or whatever `build` returns.
    pub fn append_song<F>(&self, session: SessionId, build: F) -> Result<SongCell, JamError>
    where
        F: FnOnce(u32) -> Result<Song, JamError>,
    {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(&session)
            .ok_or(JamError::UnknownSession(session))?;
        let position = u32::try_from(entry.songs.len())
            .map_err(|_| JamError::InvalidSong("session holds too many songs".into()))?;
        let song = build(position)?;
        let id = song.id();
        let cell: SongCell = Arc::new(RwLock::new(song));
        entry.songs.push(Arc::clone(&cell));
        self.songs.write().insert(id, Arc::clone(&cell));
        Ok(cell)
    }

    /// Handle to a song.
    ///
    /// # Errors
    ///
    /// [`JamError::UnknownSong`].
    pub fn song_cell(&self, song: SongId) -> Result<SongCell, JamError> {
        self.songs
            .read()
            .get(&song)
            .cloned()
            .ok_or(JamError::UnknownSong(song))
    }

    fn session_cells(&self, session: SessionId) -> Result<(EventId, Vec<SongCell>), JamError> {
        let sessions = self.sessions.read();
        let entry = sessions
            .get(&session)
            .ok_or(JamError::UnknownSession(session))?;
        Ok((entry.event_id, entry.songs.clone()))
    }

    /// Snapshot of one song.
    ///
    /// # Errors
    ///
    /// [`JamError::UnknownSong`].
    pub fn song_snapshot(&self, song: SongId) -> Result<SongSnapshot, JamError> {
        Ok(self.song_cell(song)?.read().snapshot())
    }

    /// Full state of a session.
    ///
    /// # Errors
    ///
    /// [`JamError::UnknownSession`].
    pub fn session_snapshot(&self, session: SessionId) -> Result<SessionSnapshot, JamError> {
        let (event_id, cells) = self.session_cells(session)?;
        Ok(SessionSnapshot {
            id: session,
            event_id,
            songs: cells.iter().map(|c| c.read().snapshot()).collect(),
        })
    }

    /// A guest's candidacy record on a song.
    ///
    /// # Errors
    ///
    /// [`JamError::UnknownSong`].
    pub fn candidacy(&self, song: SongId, guest: GuestId) -> Result<Option<Candidacy>, JamError> {
        Ok(self.song_cell(song)?.read().ledger().candidacy(guest).cloned())
    }

    /// Songs open for candidates, each joined with the caller's own candidacy.
    ///
    /// # Errors
    ///
    /// [`JamError::UnknownSession`].
    pub fn list_open_songs(
        &self,
        session: SessionId,
        guest: GuestId,
    ) -> Result<Vec<OpenSongView>, JamError> {
        let (_, cells) = self.session_cells(session)?;
        Ok(cells
            .iter()
            .filter_map(|cell| {
                let song = cell.read();
                (song.status() == SongStatus::OpenForCandidates).then(|| OpenSongView {
                    song: song.snapshot(),
                    mine: song.ledger().candidacy(guest).map(|c| MyCandidacy {
                        instrument: c.instrument,
                        status: c.status,
                    }),
                })
            })
            .collect())
    }

    /// Songs on stage where the caller holds an approved slot.
    ///
    /// # Errors
    ///
    /// [`JamError::UnknownSession`].
    pub fn list_my_on_stage_songs(
        &self,
        session: SessionId,
        guest: GuestId,
    ) -> Result<Vec<OnStageView>, JamError> {
        let (_, cells) = self.session_cells(session)?;
        Ok(cells
            .iter()
            .filter_map(|cell| {
                let song = cell.read();
                if song.status() != SongStatus::OnStage {
                    return None;
                }
                song.ledger()
                    .candidacy(guest)
                    .filter(|c| c.status == CandidacyStatus::Approved)
                    .map(|c| OnStageView {
                        song: song.snapshot(),
                        instrument: c.instrument,
                    })
            })
            .collect())
    }
}
