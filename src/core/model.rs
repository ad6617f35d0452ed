//! Domain vocabulary and read snapshots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::JamError;
use crate::util::ids::{EventId, GuestId, SessionId, SongId};

/// Closed vocabulary of instrument roles a song can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instrument {
    /// Lead or backing vocals.
    Vocals,
    /// Electric or acoustic guitar.
    Guitar,
    /// Bass guitar or upright bass.
    Bass,
    /// Drum kit.
    Drums,
    /// Piano, organ, synths.
    Keys,
    /// Brass and woodwinds.
    Horns,
    /// Hand percussion.
    Percussion,
    /// Bowed strings.
    Strings,
    /// Anything else.
    Other,
}

impl Instrument {
    /// Every instrument key, in display order.
    pub const ALL: [Self; 9] = [
        Self::Vocals,
        Self::Guitar,
        Self::Bass,
        Self::Drums,
        Self::Keys,
        Self::Horns,
        Self::Percussion,
        Self::Strings,
        Self::Other,
    ];

    /// Wire key of the instrument.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vocals => "vocals",
            Self::Guitar => "guitar",
            Self::Bass => "bass",
            Self::Drums => "drums",
            Self::Keys => "keys",
            Self::Horns => "horns",
            Self::Percussion => "percussion",
            Self::Strings => "strings",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Instrument {
    type Err = JamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| JamError::InvalidSong(format!("unknown instrument key `{s}`")))
    }
}

/// Lifecycle status of a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SongStatus {
    /// Created, not yet accepting candidates.
    Planned,
    /// Guests may apply for instrument slots.
    OpenForCandidates,
    /// Being performed.
    OnStage,
    /// Performed. Terminal.
    Played,
    /// Dropped from the set. Terminal.
    Canceled,
}

impl SongStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Played | Self::Canceled)
    }

    /// Wire key of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::OpenForCandidates => "open_for_candidates",
            Self::OnStage => "on_stage",
            Self::Played => "played",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for SongStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one guest's application for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidacyStatus {
    /// Waiting for an organizer decision.
    Pending,
    /// Holds one of the bucket's slots.
    Approved,
    /// Refused, revoked, or swept. Kept for idempotence.
    Rejected,
}

impl fmt::Display for CandidacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        })
    }
}

/// Result of a guest submission, as reported to the guest-facing collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmitOutcome {
    /// Candidacy recorded as pending.
    Accepted,
    /// The guest already had a record on this song. Treated as success.
    AlreadyApplied,
    /// The song is not accepting candidates; refresh.
    SongNotOpen,
    /// Every slot of the instrument is taken.
    SlotFull,
}

impl SubmitOutcome {
    /// Whether the guest should consider the application made.
    #[must_use]
    pub const fn is_submitted(self) -> bool {
        matches!(self, Self::Accepted | Self::AlreadyApplied)
    }
}

/// A guest's application for an instrument on a song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidacy {
    /// Applying guest.
    pub guest: GuestId,
    /// Requested instrument.
    pub instrument: Instrument,
    /// Current status.
    pub status: CandidacyStatus,
    /// Position in the song's proposal order.
    pub seq: u64,
}

/// Instrument requirement supplied when a song is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSpec {
    /// Instrument key.
    pub instrument: Instrument,
    /// Number of slots, at least one.
    pub capacity: u32,
}

/// Organizer input for `create_song`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSong {
    /// Song title.
    pub title: String,
    /// Performing artist of the original.
    pub artist: String,
    /// Enabled instruments with their capacities, in display order.
    pub buckets: Vec<BucketSpec>,
}

impl NewSong {
    /// Start a new song definition with no instruments.
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            buckets: Vec::new(),
        }
    }

    /// Enable an instrument with the given capacity.
    #[must_use]
    pub fn with_bucket(mut self, instrument: Instrument, capacity: u32) -> Self {
        self.buckets.push(BucketSpec {
            instrument,
            capacity,
        });
        self
    }
}

/// Point-in-time view of one instrument bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSnapshot {
    /// Instrument key.
    pub instrument: Instrument,
    /// Slot capacity.
    pub capacity: u32,
    /// Approved guests in approval order.
    pub approved: Vec<GuestId>,
    /// Pending guests in proposal order.
    pub pending: Vec<GuestId>,
    /// Rejected guests in rejection order.
    pub rejected: Vec<GuestId>,
}

impl BucketSnapshot {
    /// Free slots left.
    #[must_use]
    pub fn open_slots(&self) -> u32 {
        let taken = u32::try_from(self.approved.len()).unwrap_or(u32::MAX);
        self.capacity.saturating_sub(taken)
    }
}

/// Point-in-time view of a song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SongSnapshot {
    /// Song identifier.
    pub id: SongId,
    /// Owning session.
    pub session_id: SessionId,
    /// Title.
    pub title: String,
    /// Artist.
    pub artist: String,
    /// Lifecycle status.
    pub status: SongStatus,
    /// Buckets in display order.
    pub buckets: Vec<BucketSnapshot>,
    /// Number of mutations applied since creation.
    pub revision: u64,
}

impl SongSnapshot {
    /// Bucket for an instrument, if enabled.
    #[must_use]
    pub fn bucket(&self, instrument: Instrument) -> Option<&BucketSnapshot> {
        self.buckets.iter().find(|b| b.instrument == instrument)
    }
}

/// Full state of a session, as served to polling consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub id: SessionId,
    /// Event that owns the session.
    pub event_id: EventId,
    /// Songs in session order.
    pub songs: Vec<SongSnapshot>,
}

/// A guest's own candidacy, as shown next to a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyCandidacy {
    /// Instrument applied for.
    pub instrument: Instrument,
    /// Current status.
    pub status: CandidacyStatus,
}

/// Row of the "open songs" projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSongView {
    /// The open song.
    pub song: SongSnapshot,
    /// Caller's candidacy on it, if any.
    pub mine: Option<MyCandidacy>,
}

/// Row of the "my on-stage songs" projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnStageView {
    /// The song currently on stage.
    pub song: SongSnapshot,
    /// Instrument the caller was approved for.
    pub instrument: Instrument,
}
