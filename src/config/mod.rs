//! Configuration models for the engine, the guest scheduler and live feeds.

pub mod engine;

pub use engine::{EngineConfig, FeedConfig};
