//! Runtime seam for background work.

use std::future::Future;

/// Abstraction for spawning futures on a runtime.
pub trait Spawn {
    /// Spawn a detached task.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
