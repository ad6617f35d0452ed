//! Consumer side of session event streams.
//!
//! A viewer keeps one consistent [`SessionSnapshot`] up to date. Events are
//! only a cue to re-fetch: bursts collapse into one fetch after a quiet period.
//! Transport trouble moves the feed through three modes:
//!
//! ```text
//!   Reconnecting --connect ok--> Subscribed --error--> Reconnecting
//!        |                                                  |
//!        +------ N consecutive failures --> DegradedPolling +
//! ```
//!
//! Degraded feeds poll the snapshot endpoint and keep trying to reconnect at
//! the poll cadence. A rate-limit answer from any query pauses queries for a
//! fixed cool-down.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;

use crate::config::FeedConfig;
use crate::core::{EventEnvelope, JamEngine, JamError, SessionSnapshot, Spawn};
use crate::util::ids::SessionId;

/// Transport-level failure. Never fatal to the feed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// Connection or request failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The stream ended.
    #[error("stream closed")]
    Closed,
    /// The backend asked us to slow down.
    #[error("rate limited")]
    RateLimited,
}

/// Something received from an event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSignal {
    /// An event.
    Event(EventEnvelope),
    /// The stream skipped this many events.
    Lagged(u64),
}

/// An open subscription.
#[async_trait]
pub trait EventStream: Send {
    /// Wait for the next signal.
    async fn next_signal(&mut self) -> Result<FeedSignal, FeedError>;
}

/// Opens subscriptions.
#[async_trait]
pub trait FeedConnector: Send + Sync + 'static {
    /// Subscribe to a session's events.
    async fn connect(&self, session: SessionId) -> Result<Box<dyn EventStream>, FeedError>;
}

/// Full-state query used after (re)connects, bursts and while polling.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync + 'static {
    /// Fetch a consistent snapshot.
    async fn fetch(&self, session: SessionId) -> Result<SessionSnapshot, FeedError>;
}

/// Connection mode of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Receiving events.
    Subscribed,
    /// Waiting to retry a connection.
    Reconnecting {
        /// Consecutive failures so far.
        attempt: u32,
    },
    /// Polling snapshots while the stream is unavailable.
    DegradedPolling,
}

/// Pure mode and timing logic of a feed. Time is always passed in.
#[derive(Debug, Clone)]
pub struct FeedStateMachine {
    config: FeedConfig,
    mode: FeedMode,
    failures: u32,
    cooldown_until: Option<Instant>,
}

impl FeedStateMachine {
    /// Start in `Reconnecting { attempt: 0 }`, which connects immediately.
    #[must_use]
    pub const fn new(config: FeedConfig) -> Self {
        Self {
            config,
            mode: FeedMode::Reconnecting { attempt: 0 },
            failures: 0,
            cooldown_until: None,
        }
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> FeedMode {
        self.mode
    }

    /// Consecutive failures since the last successful connect.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// End of the rate-limit pause, if one is running at `now`.
    #[must_use]
    pub fn cooldown_until(&self, now: Instant) -> Option<Instant> {
        self.cooldown_until.filter(|until| *until > now)
    }

    /// Whether queries are allowed at `now`.
    #[must_use]
    pub fn can_query(&self, now: Instant) -> bool {
        self.cooldown_until(now).is_none()
    }

    /// Exponential reconnect delay for the given attempt, capped.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = 2_u64.saturating_pow(attempt - 1);
        let ms = self
            .config
            .reconnect_base_ms
            .saturating_mul(exp)
            .min(self.config.reconnect_max_ms);
        Duration::from_millis(ms)
    }

    /// How long to wait before the next connection attempt.
    #[must_use]
    pub fn connect_delay(&self, now: Instant) -> Duration {
        let delay = match self.mode {
            FeedMode::Subscribed => Duration::ZERO,
            FeedMode::Reconnecting { attempt } => self.backoff(attempt),
            FeedMode::DegradedPolling => self.config.poll_interval(),
        };
        let cooldown = self
            .cooldown_until(now)
            .map_or(Duration::ZERO, |until| until - now);
        delay.max(cooldown)
    }

    /// A subscription was established.
    pub fn on_connected(&mut self) {
        self.failures = 0;
        self.mode = FeedMode::Subscribed;
    }

    /// A connect or the stream failed.
    pub fn on_error(&mut self, error: &FeedError, now: Instant) {
        if *error == FeedError::RateLimited {
            self.on_rate_limited(now);
        }
        self.failures = self.failures.saturating_add(1);
        self.mode = if self.failures >= self.config.degrade_after_failures {
            FeedMode::DegradedPolling
        } else {
            FeedMode::Reconnecting {
                attempt: self.failures,
            }
        };
    }

    /// A query was refused for rate limiting.
    pub fn on_rate_limited(&mut self, now: Instant) {
        self.cooldown_until = Some(now + self.config.rate_limit_cooldown());
    }
}

/// Collapses event bursts into one re-fetch after a quiet period.
///
/// A burst that never goes quiet still fires `max_wait` after its first event.
#[derive(Debug, Clone)]
pub struct Coalescer {
    quiet: Duration,
    max_wait: Duration,
    first: Option<Instant>,
    deadline: Option<Instant>,
    absorbed: u64,
}

impl Coalescer {
    /// Fire `quiet` after the last event, or `max_wait` after the first.
    #[must_use]
    pub const fn new(quiet: Duration, max_wait: Duration) -> Self {
        Self {
            quiet,
            max_wait,
            first: None,
            deadline: None,
            absorbed: 0,
        }
    }

    /// Note an event at `now`, pushing the deadline back up to the cap.
    pub fn push(&mut self, now: Instant) {
        let first = *self.first.get_or_insert(now);
        let quiet_end = now + self.quiet;
        let cap = first + self.max_wait;
        let next = quiet_end.min(cap);
        self.deadline = Some(self.deadline.map_or(next, |d| d.max(next)));
        self.absorbed += 1;
    }

    /// Postpone a pending fetch to at least `until`.
    pub fn defer_until(&mut self, until: Instant) {
        if let Some(deadline) = self.deadline.as_mut() {
            *deadline = (*deadline).max(until);
        }
    }

    /// When the pending fetch is due.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether a fetch is owed.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the pending fetch if due at `now`. Returns the events it covers.
    pub fn take_due(&mut self, now: Instant) -> Option<u64> {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                self.first = None;
                Some(std::mem::take(&mut self.absorbed))
            }
            _ => None,
        }
    }
}

/// Read side of a running [`LiveFeed`].
#[derive(Clone)]
pub struct FeedHandle {
    snapshots: watch::Receiver<Option<SessionSnapshot>>,
    mode: watch::Receiver<FeedMode>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl FeedHandle {
    /// Latest fetched snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> FeedMode {
        *self.mode.borrow()
    }

    /// Receiver notified on every new snapshot.
    #[must_use]
    pub fn snapshots(&self) -> watch::Receiver<Option<SessionSnapshot>> {
        self.snapshots.clone()
    }

    /// Receiver notified on every mode change.
    #[must_use]
    pub fn modes(&self) -> watch::Receiver<FeedMode> {
        self.mode.clone()
    }

    /// Stop the feed.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

enum PumpEnd {
    Shutdown,
    Failed(FeedError),
}

/// Async driver keeping a session snapshot fresh.
pub struct LiveFeed<C: ?Sized, F: ?Sized> {
    session: SessionId,
    connector: Arc<C>,
    fetcher: Arc<F>,
    quiet: Duration,
    max_wait: Duration,
    machine: FeedStateMachine,
    snapshots: watch::Sender<Option<SessionSnapshot>>,
    mode: watch::Sender<FeedMode>,
    shutdown: watch::Receiver<bool>,
}

impl<C, F> LiveFeed<C, F>
where
    C: FeedConnector + ?Sized,
    F: SnapshotFetcher + ?Sized,
{
    /// Create a feed and its handle. Nothing runs until [`Self::run`] or [`Self::spawn`].
    pub fn new(
        session: SessionId,
        connector: Arc<C>,
        fetcher: Arc<F>,
        config: FeedConfig,
    ) -> (Self, FeedHandle) {
        let machine = FeedStateMachine::new(config.clone());
        let (snap_tx, snap_rx) = watch::channel(None);
        let (mode_tx, mode_rx) = watch::channel(machine.mode());
        let (stop_tx, stop_rx) = watch::channel(false);
        let feed = Self {
            session,
            connector,
            fetcher,
            quiet: config.coalesce_quiet(),
            max_wait: config.coalesce_max_wait(),
            machine,
            snapshots: snap_tx,
            mode: mode_tx,
            shutdown: stop_rx,
        };
        let handle = FeedHandle {
            snapshots: snap_rx,
            mode: mode_rx,
            shutdown: Arc::new(stop_tx),
        };
        (feed, handle)
    }

    /// Run on `spawner` until shut down.
    pub fn spawn<Sp: Spawn>(self, spawner: &Sp) {
        spawner.spawn(self.run());
    }

    /// Drive the feed until the handle asks it to stop.
    pub async fn run(mut self) {
        tracing::debug!(session = %self.session, "live feed started");
        loop {
            let wait = self.machine.connect_delay(Instant::now());
            if !self.sleep(wait).await {
                break;
            }
            if self.machine.mode() == FeedMode::DegradedPolling {
                self.refresh().await;
            }
            let connected = tokio::select! {
                r = self.connector.connect(self.session) => r,
                _ = self.shutdown.changed() => break,
            };
            let end = match connected {
                Ok(stream) => {
                    self.machine.on_connected();
                    self.publish_mode();
                    tracing::info!(session = %self.session, "live feed subscribed");
                    self.refresh().await;
                    self.pump(stream).await
                }
                Err(e) => PumpEnd::Failed(e),
            };
            match end {
                PumpEnd::Shutdown => break,
                PumpEnd::Failed(e) => {
                    self.machine.on_error(&e, Instant::now());
                    self.publish_mode();
                    tracing::warn!(
                        session = %self.session,
                        error = %e,
                        mode = ?self.machine.mode(),
                        "live feed transport error"
                    );
                }
            }
        }
        tracing::debug!(session = %self.session, "live feed stopped");
    }

    async fn pump(&mut self, mut stream: Box<dyn EventStream>) -> PumpEnd {
        let mut coalescer = Coalescer::new(self.quiet, self.max_wait);
        loop {
            let deadline = coalescer.deadline();
            tokio::select! {
                signal = stream.next_signal() => match signal {
                    Ok(FeedSignal::Event(event)) if event.session_id != self.session => {}
                    Ok(_) => coalescer.push(Instant::now()),
                    Err(e) => {
                        if coalescer.is_pending() {
                            self.refresh().await;
                        }
                        return PumpEnd::Failed(e);
                    }
                },
                () = sleep_until_opt(deadline) => {
                    let now = Instant::now();
                    if let Some(until) = self.machine.cooldown_until(now) {
                        coalescer.defer_until(until);
                    } else if let Some(count) = coalescer.take_due(now) {
                        tracing::trace!(session = %self.session, count, "coalesced events");
                        self.refresh().await;
                    }
                }
                _ = self.shutdown.changed() => return PumpEnd::Shutdown,
            }
        }
    }

    async fn refresh(&mut self) {
        let now = Instant::now();
        if !self.machine.can_query(now) {
            tracing::debug!(session = %self.session, "snapshot fetch skipped during cool-down");
            return;
        }
        match self.fetcher.fetch(self.session).await {
            Ok(snapshot) => {
                self.snapshots.send_replace(Some(snapshot));
            }
            Err(FeedError::RateLimited) => {
                self.machine.on_rate_limited(Instant::now());
                tracing::warn!(
                    session = %self.session,
                    "snapshot fetch rate limited, cooling down"
                );
            }
            Err(e) => {
                tracing::warn!(session = %self.session, error = %e, "snapshot fetch failed");
            }
        }
    }

    fn publish_mode(&self) {
        self.mode.send_replace(self.machine.mode());
    }

    async fn sleep(&mut self, wait: Duration) -> bool {
        if wait.is_zero() {
            return !*self.shutdown.borrow();
        }
        tokio::select! {
            () = tokio::time::sleep(wait) => true,
            _ = self.shutdown.changed() => false,
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// In-process feed source backed by a [`JamEngine`].
#[derive(Clone)]
pub struct EngineFeed {
    engine: Arc<JamEngine>,
}

impl EngineFeed {
    /// Serve feeds from this engine.
    #[must_use]
    pub const fn new(engine: Arc<JamEngine>) -> Self {
        Self { engine }
    }
}

struct BroadcastStream {
    rx: broadcast::Receiver<EventEnvelope>,
}

#[async_trait]
impl EventStream for BroadcastStream {
    async fn next_signal(&mut self) -> Result<FeedSignal, FeedError> {
        match self.rx.recv().await {
            Ok(event) => Ok(FeedSignal::Event(event)),
            Err(broadcast::error::RecvError::Lagged(n)) => Ok(FeedSignal::Lagged(n)),
            Err(broadcast::error::RecvError::Closed) => Err(FeedError::Closed),
        }
    }
}

#[async_trait]
impl FeedConnector for EngineFeed {
    async fn connect(&self, session: SessionId) -> Result<Box<dyn EventStream>, FeedError> {
        self.engine
            .session_snapshot(session)
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Ok(Box::new(BroadcastStream {
            rx: self.engine.subscribe(session),
        }))
    }
}

#[async_trait]
impl SnapshotFetcher for EngineFeed {
    async fn fetch(&self, session: SessionId) -> Result<SessionSnapshot, FeedError> {
        self.engine
            .session_snapshot(session)
            .map_err(|e: JamError| FeedError::Transport(e.to_string()))
    }
}
