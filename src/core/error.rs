//! Error types for candidacy engine operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::model::{Instrument, SongStatus};
use crate::util::ids::{GuestId, SessionId, SongId};

/// Errors produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JamError {
    /// Requested status change is not an edge of the song lifecycle.
    #[error("invalid transition from {current} to {requested}")]
    InvalidTransition {
        /// Status the song is in.
        current: SongStatus,
        /// Status that was requested.
        requested: SongStatus,
    },
    /// Every slot of the bucket is already approved.
    #[error("no free {instrument} slot on song {song}")]
    SlotFull {
        /// Song.
        song: SongId,
        /// Full bucket.
        instrument: Instrument,
    },
    /// Candidate has no pending candidacy in the bucket.
    #[error("guest {guest} is not pending for {instrument} on song {song}")]
    NotPending {
        /// Song.
        song: SongId,
        /// Bucket that was addressed.
        instrument: Instrument,
        /// Candidate.
        guest: GuestId,
    },
    /// The guest already has a candidacy record on the song.
    #[error("guest {guest} already applied to song {song}")]
    AlreadyApplied {
        /// Song.
        song: SongId,
        /// Guest.
        guest: GuestId,
    },
    /// The song is not accepting candidates.
    #[error("song {song} is not open for candidates (status {status})")]
    SongNotOpen {
        /// Song.
        song: SongId,
        /// Its current status.
        status: SongStatus,
    },
    /// No session with this identifier.
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    /// No song with this identifier.
    #[error("unknown song {0}")]
    UnknownSong(SongId),
    /// The song has no bucket for this instrument.
    #[error("song {song} has no {instrument} bucket")]
    UnknownInstrument {
        /// Song.
        song: SongId,
        /// Missing instrument.
        instrument: Instrument,
    },
    /// Song definition rejected.
    #[error("invalid song: {0}")]
    InvalidSong(String),
    /// A submission for this song is already being attempted.
    #[error("submission already in flight for song {0}")]
    SubmissionInFlight(SongId),
    /// Durable store failure.
    #[error("store error: {0}")]
    Store(String),
    /// Engine configuration rejected.
    #[error("config invalid: {0}")]
    Config(String),
}

/// How a caller should react to a [`JamError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller bug or stale UI affordance. Do not retry.
    Programming,
    /// Business rule refused the command. Surface to the actor.
    BusinessRule,
    /// Expected race, equivalent to success.
    BenignConflict,
    /// Caller acted on outdated state and should refresh.
    StaleClient,
    /// Addressed entity does not exist.
    NotFound,
    /// Infrastructure failure. State was left intact.
    Backend,
}

impl JamError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTransition { .. } | Self::InvalidSong(_) | Self::Config(_) => {
                ErrorKind::Programming
            }
            Self::SlotFull { .. } | Self::NotPending { .. } | Self::SubmissionInFlight(_) => {
                ErrorKind::BusinessRule
            }
            Self::AlreadyApplied { .. } => ErrorKind::BenignConflict,
            Self::SongNotOpen { .. } => ErrorKind::StaleClient,
            Self::UnknownSession(_) | Self::UnknownSong(_) | Self::UnknownInstrument { .. } => {
                ErrorKind::NotFound
            }
            Self::Store(_) => ErrorKind::Backend,
        }
    }

    /// Whether retrying the same command may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Backend)
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
