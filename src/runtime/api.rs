//! API-facing request/response models.
//!
//! Transport layers (HTTP handlers, RPC) deserialize these, call the engine
//! and serialize the result. Refusals travel as [`ErrorResponse`] bodies.

use serde::{Deserialize, Serialize};

use crate::core::{
    BucketSnapshot, ErrorKind, Instrument, JamEngine, JamError, SongStatus, StatusTransition,
    SubmitOutcome,
};
use crate::util::ids::{GuestId, SongId};

/// Guest submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCandidacyRequest {
    /// Target song.
    pub song_id: SongId,
    /// Requested instrument.
    pub instrument: Instrument,
    /// Submitting guest.
    pub guest_id: GuestId,
}

/// Guest submission result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitCandidacyResponse {
    /// Outcome of the submission.
    pub outcome: SubmitOutcome,
}

/// Organizer decision on a candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDecisionRequest {
    /// Song.
    pub song_id: SongId,
    /// Bucket.
    pub instrument: Instrument,
    /// Candidate.
    pub guest_id: GuestId,
    /// Approve when true, reject otherwise.
    pub approve: bool,
}

/// Organizer status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSongStatusRequest {
    /// Song.
    pub song_id: SongId,
    /// Target status.
    pub target: SongStatus,
}

/// Refusal body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error class.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Whether the same request may succeed later.
    pub retryable: bool,
}

impl From<&JamError> for ErrorResponse {
    fn from(e: &JamError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
            retryable: e.is_retryable(),
        }
    }
}

impl From<JamError> for ErrorResponse {
    fn from(e: JamError) -> Self {
        Self::from(&e)
    }
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Healthy flag.
    pub ok: bool,
    /// Sessions currently loaded.
    pub sessions: usize,
}

/// Handle a guest submission.
///
/// # Errors
///
/// Unexpected failures only; expected refusals are outcomes.
pub fn submit_candidacy(
    engine: &JamEngine,
    req: &SubmitCandidacyRequest,
) -> Result<SubmitCandidacyResponse, ErrorResponse> {
    engine
        .submit_candidacy(req.song_id, req.instrument, req.guest_id)
        .map(|outcome| SubmitCandidacyResponse { outcome })
        .map_err(ErrorResponse::from)
}

/// Handle an organizer approve or reject.
///
/// # Errors
///
/// The engine's refusal.
pub fn decide_candidate(
    engine: &JamEngine,
    req: &CandidateDecisionRequest,
) -> Result<BucketSnapshot, ErrorResponse> {
    let result = if req.approve {
        engine.approve_candidate(req.song_id, req.instrument, req.guest_id)
    } else {
        engine.reject_candidate(req.song_id, req.instrument, req.guest_id)
    };
    result.map_err(ErrorResponse::from)
}

/// Handle an organizer status change.
///
/// # Errors
///
/// The engine's refusal.
pub fn move_song_status(
    engine: &JamEngine,
    req: &MoveSongStatusRequest,
) -> Result<StatusTransition, ErrorResponse> {
    engine
        .move_song_status(req.song_id, req.target)
        .map_err(ErrorResponse::from)
}

/// Liveness probe.
#[must_use]
pub fn health(engine: &JamEngine) -> Health {
    Health {
        ok: true,
        sessions: engine.registry().session_count(),
    }
}
