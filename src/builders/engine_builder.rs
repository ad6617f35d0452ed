//! Builder that assembles a [`JamEngine`] from configuration and a store.

use std::sync::Arc;

use anyhow::Context;

use crate::config::EngineConfig;
use crate::core::{
    AppResult, AuditSink, CandidacyCoordinator, CandidacySubmitter, EventBroadcaster,
    InMemoryAuditSink, JamEngine, JamError, JamSessionRegistry, JamStore, SchedulerHandle, Spawn,
};
use crate::infra::InMemoryStore;
use crate::util::ids::GuestId;

/// Builder for [`JamEngine`].
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    store: Option<Arc<dyn JamStore>>,
    audit: Option<Box<dyn AuditSink>>,
}

impl EngineBuilder {
    /// Start with default configuration and an in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist through this store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn JamStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Record mutations to this audit sink. Defaults to an in-memory ring
    /// buffer of `audit_capacity` entries.
    #[must_use]
    pub fn with_audit_sink(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Configuration the engine will be built with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate configuration, load stored sessions and songs, and build the engine.
    ///
    /// # Errors
    ///
    /// [`JamError::Config`] for invalid configuration, [`JamError::Store`]
    /// if hydration fails.
    pub fn build(self) -> Result<JamEngine, JamError> {
        self.config.validate().map_err(JamError::Config)?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()) as Arc<dyn JamStore>);
        let sessions = store.load_sessions()?;
        let songs = store.load_songs()?;
        let (session_count, song_count) = (sessions.len(), songs.len());
        let registry = JamSessionRegistry::restore(sessions, songs)?;
        tracing::info!(
            sessions = session_count,
            songs = song_count,
            "jam engine hydrated from store"
        );

        let engine = JamEngine::from_parts(
            registry,
            EventBroadcaster::new(self.config.event_capacity),
            store,
        );
        let audit = self
            .audit
            .unwrap_or_else(|| {
                Box::new(InMemoryAuditSink::new(self.config.audit_capacity)) as Box<dyn AuditSink>
            });
        Ok(engine.with_audit(audit))
    }

    /// Build an in-memory engine from a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Fails with context when the document does not parse or validate, or
    /// when the build itself fails.
    pub fn build_from_json(input: &str) -> AppResult<JamEngine> {
        let config = EngineConfig::from_json_str(input)
            .map_err(anyhow::Error::msg)
            .context("loading engine configuration from JSON")?;
        Self::new()
            .with_config(config)
            .build()
            .context("building jam engine")
    }

    /// Build an in-memory engine from `.env` and `JAM_*` variables.
    ///
    /// # Errors
    ///
    /// Fails with context when the environment holds an invalid value, or
    /// when the build itself fails.
    pub fn build_from_env() -> AppResult<JamEngine> {
        let config = EngineConfig::from_env()
            .map_err(anyhow::Error::msg)
            .context("loading engine configuration from environment")?;
        Self::new()
            .with_config(config)
            .build()
            .context("building jam engine")
    }

    /// Coordinator for one guest using the configured commit delay.
    pub fn coordinator_for<S>(
        config: &EngineConfig,
        guest: GuestId,
        submitter: Arc<S>,
    ) -> CandidacyCoordinator<S>
    where
        S: CandidacySubmitter + ?Sized,
    {
        CandidacyCoordinator::new(guest, submitter, config.commit_delay())
    }

    /// Coordinator for one guest with its scheduler already running on
    /// `spawner`, ticking every `scheduler_tick_ms`.
    pub fn spawn_coordinator<S, Sp>(
        config: &EngineConfig,
        guest: GuestId,
        submitter: Arc<S>,
        spawner: &Sp,
    ) -> (Arc<CandidacyCoordinator<S>>, SchedulerHandle)
    where
        S: CandidacySubmitter + ?Sized,
        Sp: Spawn,
    {
        let coordinator = Arc::new(Self::coordinator_for(config, guest, submitter));
        let handle = coordinator.spawn_scheduler(spawner, config.scheduler_tick());
        tracing::debug!(
            guest = %guest,
            tick_ms = config.scheduler_tick_ms,
            "candidacy scheduler started"
        );
        (coordinator, handle)
    }
}
