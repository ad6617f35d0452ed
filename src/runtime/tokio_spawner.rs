//! Tokio runtime spawner implementation.

use std::future::Future;

use tokio::runtime::{Handle, TryCurrentError};

use crate::core::Spawn;

/// Spawner that runs background work (guest schedulers, live feeds) on a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioSpawner {
    handle: Handle,
}

impl TokioSpawner {
    /// Spawn onto the runtime behind `handle`.
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Spawn onto the runtime the caller is running in.
    ///
    /// # Errors
    ///
    /// When called outside a tokio runtime.
    pub fn current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

impl Spawn for TokioSpawner {
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        drop(self.handle.spawn(fut));
    }
}
