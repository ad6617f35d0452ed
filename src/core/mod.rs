//! Domain layer: slot accounting, song lifecycle, events and the engine facade.

pub mod audit;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod model;
pub mod registry;
pub mod song;
pub mod spawn;
pub mod state_machine;
pub mod store;

pub use audit::{
    build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, SharedAuditSink,
};
pub use coordinator::{
    CandidacyCoordinator, CandidacySubmitter, SchedulerHandle, SelectionPhase, SelectionView,
    SubmissionReport,
};
pub use engine::JamEngine;
pub use error::{AppResult, ErrorKind, JamError};
pub use events::{
    EventBroadcaster, EventEnvelope, EventKind, EventPayload, ReplayOutcome, SlotChanged,
    SongStatusChanged,
};
pub use ledger::{InstrumentBucket, SlotLedger, SweptCandidacy};
pub use model::{
    BucketSnapshot, BucketSpec, Candidacy, CandidacyStatus, Instrument, MyCandidacy, NewSong,
    OnStageView, OpenSongView, SessionSnapshot, SongSnapshot, SongStatus, SubmitOutcome,
};
pub use registry::{JamSessionRegistry, SongCell};
pub use song::Song;
pub use spawn::Spawn;
pub use state_machine::{SongStateMachine, StatusTransition};
pub use store::{JamStore, SessionRecord, SongRecord};
