//! In-memory store for development and tests, with commit fault injection.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::core::{JamError, JamStore, SessionRecord, SongRecord};
use crate::util::ids::SongId;

#[derive(Default)]
struct Inner {
    sessions: Vec<SessionRecord>,
    songs: HashMap<SongId, SongRecord>,
    order: Vec<SongId>,
    fail_next: u32,
    commits: u64,
}

/// Store keeping every record in process memory.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` song commits fail with [`JamError::Store`].
    pub fn fail_next_commits(&self, n: u32) {
        self.inner.lock().fail_next = n;
    }

    /// Number of successful song commits.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.inner.lock().commits
    }

    /// Stored copy of a song.
    #[must_use]
    pub fn song(&self, id: SongId) -> Option<SongRecord> {
        self.inner.lock().songs.get(&id).cloned()
    }
}

impl JamStore for InMemoryStore {
    fn save_session(&self, session: &SessionRecord) -> Result<(), JamError> {
        let mut inner = self.inner.lock();
        if inner.sessions.iter().any(|s| s.id == session.id) {
            return Err(JamError::Store(format!("session {} already stored", session.id)));
        }
        inner.sessions.push(session.clone());
        Ok(())
    }

    fn commit_song(&self, song: &SongRecord) -> Result<(), JamError> {
        let mut inner = self.inner.lock();
        if inner.fail_next > 0 {
            inner.fail_next -= 1;
            return Err(JamError::Store("injected commit failure".into()));
        }
        if !inner.sessions.iter().any(|s| s.id == song.session_id) {
            return Err(JamError::Store(format!(
                "song {} references unknown session {}",
                song.id, song.session_id
            )));
        }
        let mut guests = HashSet::with_capacity(song.candidacies.len());
        if !song.candidacies.iter().all(|c| guests.insert(c.guest)) {
            return Err(JamError::Store(format!(
                "duplicate candidacy for one guest on song {}",
                song.id
            )));
        }
        match inner.songs.get(&song.id) {
            Some(stored) if stored.revision >= song.revision => {
                return Err(JamError::Store(format!(
                    "stale revision {} for song {} (stored {})",
                    song.revision, song.id, stored.revision
                )));
            }
            Some(_) => {}
            None => inner.order.push(song.id),
        }
        inner.songs.insert(song.id, song.clone());
        inner.commits += 1;
        Ok(())
    }

    fn load_sessions(&self) -> Result<Vec<SessionRecord>, JamError> {
        Ok(self.inner.lock().sessions.clone())
    }

    fn load_songs(&self) -> Result<Vec<SongRecord>, JamError> {
        let inner = self.inner.lock();
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.songs.get(id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Candidacy, CandidacyStatus, Instrument, SongStatus};
    use crate::util::ids::{EventId, GuestId, SessionId};

    fn record(session: SessionId, revision: u64) -> SongRecord {
        SongRecord {
            id: SongId::new(),
            session_id: session,
            position: 0,
            title: "Superstition".into(),
            artist: "Stevie Wonder".into(),
            status: SongStatus::Planned,
            buckets: vec![],
            candidacies: vec![],
            revision,
        }
    }

    fn store_with_session() -> (InMemoryStore, SessionId) {
        let store = InMemoryStore::new();
        let session = SessionId::new();
        store
            .save_session(&SessionRecord {
                id: session,
                event_id: EventId::new(),
            })
            .unwrap();
        (store, session)
    }

    #[test]
    fn test_injected_failures_are_consumed() {
        let (store, session) = store_with_session();
        store.fail_next_commits(1);
        let song = record(session, 0);
        assert!(matches!(store.commit_song(&song), Err(JamError::Store(_))));
        store.commit_song(&song).unwrap();
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn test_stale_revision_is_refused() {
        let (store, session) = store_with_session();
        let mut song = record(session, 0);
        store.commit_song(&song).unwrap();
        assert!(store.commit_song(&song).is_err());
        song.revision = 1;
        store.commit_song(&song).unwrap();
        assert_eq!(store.song(song.id).unwrap().revision, 1);
    }

    #[test]
    fn test_one_record_per_guest() {
        let (store, session) = store_with_session();
        let mut song = record(session, 0);
        let guest = GuestId::new();
        for (seq, instrument) in [Instrument::Bass, Instrument::Drums].into_iter().enumerate() {
            song.candidacies.push(Candidacy {
                guest,
                instrument,
                status: CandidacyStatus::Pending,
                seq: seq as u64,
            });
        }
        assert!(store.commit_song(&song).is_err());
    }
}
