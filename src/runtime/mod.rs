//! Runtime adapters, API surface and consumer live feeds.

pub mod api;
pub mod live_feed;
pub mod tokio_spawner;

pub use api::{
    CandidateDecisionRequest, ErrorResponse, Health, MoveSongStatusRequest,
    SubmitCandidacyRequest, SubmitCandidacyResponse,
};
pub use live_feed::{
    Coalescer, EngineFeed, EventStream, FeedConnector, FeedError, FeedHandle, FeedMode,
    FeedSignal, FeedStateMachine, LiveFeed, SnapshotFetcher,
};
pub use tokio_spawner::TokioSpawner;
