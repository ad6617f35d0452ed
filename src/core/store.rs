//! Contract with the external durable store.
//!
//! The engine never owns persistence. It prepares every mutation on a draft
//! copy of a song, hands the whole [`SongRecord`] to [`JamStore::commit_song`],
//! and only publishes the draft if the commit succeeds.

use serde::{Deserialize, Serialize};

use crate::core::model::{BucketSpec, Candidacy, SongStatus};
use crate::core::JamError;
use crate::util::ids::{EventId, SessionId, SongId};

/// Persisted shape of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier.
    pub id: SessionId,
    /// Owning event.
    pub event_id: EventId,
}

/// Persisted shape of a song with its buckets and candidacies.
///
/// `(id, candidacies[].guest)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongRecord {
    /// Song identifier.
    pub id: SongId,
    /// Owning session.
    pub session_id: SessionId,
    /// Order of the song inside its session.
    pub position: u32,
    /// Title.
    pub title: String,
    /// Artist.
    pub artist: String,
    /// Lifecycle status.
    pub status: SongStatus,
    /// Bucket definitions.
    pub buckets: Vec<BucketSpec>,
    /// Every candidacy record, rejected ones included.
    pub candidacies: Vec<Candidacy>,
    /// Mutation counter.
    pub revision: u64,
}

/// Durable store used by the engine.
///
/// Calls happen while the engine holds the song's writer lock, so
/// implementations must not block for long.
pub trait JamStore: Send + Sync {
    /// Persist a new session.
    ///
    /// # Errors
    ///
    /// [`JamError::Store`] on backend failure.
    fn save_session(&self, session: &SessionRecord) -> Result<(), JamError>;

    /// Atomically replace the stored state of one song.
    ///
    /// # Errors
    ///
    /// [`JamError::Store`] on backend failure; nothing was written.
    fn commit_song(&self, song: &SongRecord) -> Result<(), JamError>;

    /// Load every stored session.
    ///
    /// # Errors
    ///
    /// [`JamError::Store`] on backend failure.
    fn load_sessions(&self) -> Result<Vec<SessionRecord>, JamError>;

    /// Load every stored song.
    ///
    /// # Errors
    ///
    /// [`JamError::Store`] on backend failure.
    fn load_songs(&self) -> Result<Vec<SongRecord>, JamError>;
}
