//! Shared utilities.

pub mod clock;
pub mod ids;
pub mod telemetry;

pub use clock::now_ms;
pub use ids::{EventId, GuestId, SessionId, SongId};
pub use telemetry::init_tracing;
