//! Infrastructure adapters for the durable store.

pub mod store;

pub use store::{InMemoryStore, PostgresStore};
