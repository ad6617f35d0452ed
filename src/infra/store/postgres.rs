//! Postgres-backed store adapter (schema and interface stubs).

use crate::core::{JamError, JamStore, SessionRecord, SongRecord};

/// Postgres store placeholder.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresStore;

impl PostgresStore {
    /// Create the adapter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Migration statements for the jam schema.
    #[must_use]
    pub const fn migrations() -> &'static [&'static str] {
        &[r"
CREATE TABLE IF NOT EXISTS jam_sessions (
    id UUID PRIMARY KEY,
    event_id UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE TABLE IF NOT EXISTS jam_songs (
    id UUID PRIMARY KEY,
    session_id UUID NOT NULL REFERENCES jam_sessions (id),
    position INT NOT NULL,
    title TEXT NOT NULL,
    artist TEXT NOT NULL,
    status TEXT NOT NULL,
    revision BIGINT NOT NULL DEFAULT 0,
    UNIQUE (session_id, position)
);
CREATE TABLE IF NOT EXISTS jam_song_buckets (
    song_id UUID NOT NULL REFERENCES jam_songs (id),
    instrument TEXT NOT NULL,
    capacity INT NOT NULL CHECK (capacity > 0),
    ordinal INT NOT NULL,
    PRIMARY KEY (song_id, instrument)
);
CREATE TABLE IF NOT EXISTS jam_candidacies (
    song_id UUID NOT NULL REFERENCES jam_songs (id),
    guest_id UUID NOT NULL,
    instrument TEXT NOT NULL,
    status TEXT NOT NULL,
    seq BIGINT NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (song_id, guest_id)
);
CREATE INDEX IF NOT EXISTS idx_jam_candidacies_guest ON jam_candidacies (guest_id);
CREATE INDEX IF NOT EXISTS idx_jam_songs_session_status ON jam_songs (session_id, status);
"]
    }
}

fn not_wired() -> JamError {
    JamError::Store("postgres store not wired to database client".into())
}

impl JamStore for PostgresStore {
    fn save_session(&self, _session: &SessionRecord) -> Result<(), JamError> {
        Err(not_wired())
    }

    fn commit_song(&self, _song: &SongRecord) -> Result<(), JamError> {
        Err(not_wired())
    }

    fn load_sessions(&self) -> Result<Vec<SessionRecord>, JamError> {
        Err(not_wired())
    }

    fn load_songs(&self) -> Result<Vec<SongRecord>, JamError> {
        Err(not_wired())
    }
}
