//! Guest-side application protocol.
//!
//! A guest picks an instrument per song; the pick stays local until a fixed
//! commit-delay window, armed by the first pick on that song, expires. Picks
//! made inside the window replace (or, when repeated, clear) the selection
//! without restarting it. On expiry the selection is submitted once:
//!
//! - `accepted` marks it submitted with status `pending`,
//! - `already-applied` marks it submitted and keeps any known status,
//! - anything else marks it failed; re-selecting arms a fresh window.
//!
//! No lock is held while a submission is awaited; the `Attempting` phase keeps
//! a second tick from submitting the same song concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::core::model::{CandidacyStatus, Instrument, SessionSnapshot, SubmitOutcome};
use crate::core::spawn::Spawn;
use crate::core::JamError;
use crate::util::ids::{GuestId, SongId};

/// Target of committed selections, typically [`crate::core::JamEngine`].
#[async_trait]
pub trait CandidacySubmitter: Send + Sync + 'static {
    /// Submit one candidacy.
    async fn submit(
        &self,
        song: SongId,
        instrument: Instrument,
        guest: GuestId,
    ) -> Result<SubmitOutcome, JamError>;
}

/// Where a song's selection stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPhase {
    /// Nothing armed.
    Idle,
    /// Window running until `deadline`.
    Armed {
        /// When the selection will be submitted.
        deadline: Instant,
    },
    /// Submission in flight.
    Attempting,
    /// Submitted; only an organizer can change it now.
    Submitted,
    /// Last attempt failed; a new selection re-arms.
    Failed,
}

/// Read view of a song's selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionView {
    /// Currently selected instrument.
    pub instrument: Option<Instrument>,
    /// Phase of the protocol.
    pub phase: SelectionPhase,
    /// Last known server-side status.
    pub outcome: Option<CandidacyStatus>,
    /// Reason of the last failed attempt.
    pub last_error: Option<String>,
}

/// What a tick did for one song.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionReport {
    /// The server accepted the candidacy or already had it.
    Submitted {
        /// Song.
        song: SongId,
        /// Instrument submitted.
        instrument: Instrument,
        /// Server response.
        outcome: SubmitOutcome,
    },
    /// The attempt failed; the guest may re-select.
    Failed {
        /// Song.
        song: SongId,
        /// Instrument submitted.
        instrument: Instrument,
        /// Why.
        reason: String,
    },
    /// The window expired with no selection; nothing was sent.
    Lapsed {
        /// Song.
        song: SongId,
    },
}

#[derive(Debug, Clone)]
struct Selection {
    instrument: Option<Instrument>,
    phase: SelectionPhase,
    outcome: Option<CandidacyStatus>,
    last_error: Option<String>,
}

impl Selection {
    const fn idle() -> Self {
        Self {
            instrument: None,
            phase: SelectionPhase::Idle,
            outcome: None,
            last_error: None,
        }
    }

    fn view(&self) -> SelectionView {
        SelectionView {
            instrument: self.instrument,
            phase: self.phase,
            outcome: self.outcome,
            last_error: self.last_error.clone(),
        }
    }
}

/// Stops a scheduler started by [`CandidacyCoordinator::spawn_scheduler`].
///
/// Dropping the handle stops the scheduler as well.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
}

impl SchedulerHandle {
    /// Ask the scheduler to stop after its current tick.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Per-guest selection state and commit-delay scheduling.
pub struct CandidacyCoordinator<S: ?Sized> {
    guest: GuestId,
    commit_delay: Duration,
    submitter: Arc<S>,
    selections: Mutex<HashMap<SongId, Selection>>,
}

impl<S> CandidacyCoordinator<S>
where
    S: CandidacySubmitter + ?Sized,
{
    /// Create a coordinator for one guest.
    pub fn new(guest: GuestId, submitter: Arc<S>, commit_delay: Duration) -> Self {
        Self {
            guest,
            commit_delay,
            submitter,
            selections: Mutex::new(HashMap::new()),
        }
    }

    /// Guest this coordinator acts for.
    #[must_use]
    pub const fn guest(&self) -> GuestId {
        self.guest
    }

    /// Length of the commit-delay window.
    #[must_use]
    pub const fn commit_delay(&self) -> Duration {
        self.commit_delay
    }

    /// Select (or toggle off) an instrument on a song, now.
    ///
    /// # Errors
    ///
    /// See [`Self::select_at`].
    pub fn select(&self, song: SongId, instrument: Instrument) -> Result<SelectionView, JamError> {
        self.select_at(song, instrument, Instant::now())
    }

    /// Select (or toggle off) an instrument on a song at `now`.
    ///
    /// # Errors
    ///
    /// - [`JamError::SubmissionInFlight`] while an attempt is running.
    /// - [`JamError::AlreadyApplied`] once the song was submitted.
    pub fn select_at(
        &self,
        song: SongId,
        instrument: Instrument,
        now: Instant,
    ) -> Result<SelectionView, JamError> {
        let mut selections = self.selections.lock();
        let entry = selections.entry(song).or_insert_with(Selection::idle);
        match entry.phase {
            SelectionPhase::Attempting => return Err(JamError::SubmissionInFlight(song)),
            SelectionPhase::Submitted => {
                return Err(JamError::AlreadyApplied {
                    song,
                    guest: self.guest,
                })
            }
            SelectionPhase::Armed { .. } => {
                entry.instrument = if entry.instrument == Some(instrument) {
                    None
                } else {
                    Some(instrument)
                };
            }
            SelectionPhase::Idle | SelectionPhase::Failed => {
                entry.instrument = Some(instrument);
                entry.phase = SelectionPhase::Armed {
                    deadline: now + self.commit_delay,
                };
                entry.last_error = None;
            }
        }
        tracing::debug!(song = %song, instrument = ?entry.instrument, "selection updated");
        Ok(entry.view())
    }

    /// Current selection for a song.
    #[must_use]
    pub fn selection(&self, song: SongId) -> Option<SelectionView> {
        self.selections.lock().get(&song).map(Selection::view)
    }

    /// Last known server-side status for a song.
    #[must_use]
    pub fn outcome(&self, song: SongId) -> Option<CandidacyStatus> {
        self.selections.lock().get(&song).and_then(|s| s.outcome)
    }

    /// Earliest armed deadline, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.selections
            .lock()
            .values()
            .filter_map(|s| match s.phase {
                SelectionPhase::Armed { deadline } => Some(deadline),
                _ => None,
            })
            .min()
    }

    /// Record a server-side status learned from an event or snapshot.
    ///
    /// A known record means the song counts as submitted.
    pub fn observe(&self, song: SongId, status: CandidacyStatus) {
        let mut selections = self.selections.lock();
        let entry = selections.entry(song).or_insert_with(Selection::idle);
        entry.outcome = Some(status);
        if entry.phase != SelectionPhase::Attempting {
            entry.phase = SelectionPhase::Submitted;
        }
    }

    /// Reconcile every song of a session snapshot with the guest's records in it.
    pub fn observe_snapshot(&self, snapshot: &SessionSnapshot) {
        for song in &snapshot.songs {
            let found = song.buckets.iter().find_map(|b| {
                if b.approved.contains(&self.guest) {
                    Some((b.instrument, CandidacyStatus::Approved))
                } else if b.pending.contains(&self.guest) {
                    Some((b.instrument, CandidacyStatus::Pending))
                } else if b.rejected.contains(&self.guest) {
                    Some((b.instrument, CandidacyStatus::Rejected))
                } else {
                    None
                }
            });
            if let Some((instrument, status)) = found {
                self.observe(song.id, status);
                if let Some(entry) = self.selections.lock().get_mut(&song.id) {
                    entry.instrument.get_or_insert(instrument);
                }
            }
        }
    }

    /// Submit every selection whose window has expired, now.
    pub async fn tick(&self) -> Vec<SubmissionReport> {
        self.tick_at(Instant::now()).await
    }

    /// Submit every selection whose window expired at or before `now`.
    pub async fn tick_at(&self, now: Instant) -> Vec<SubmissionReport> {
        let due = self.take_due(now);
        let mut reports = Vec::with_capacity(due.len());
        for (song, instrument) in due {
            let Some(instrument) = instrument else {
                reports.push(SubmissionReport::Lapsed { song });
                continue;
            };
            let result = self.submitter.submit(song, instrument, self.guest).await;
            reports.push(self.settle(song, instrument, result));
        }
        reports
    }

    fn take_due(&self, now: Instant) -> Vec<(SongId, Option<Instrument>)> {
        let mut selections = self.selections.lock();
        selections
            .iter_mut()
            .filter_map(|(song, s)| match s.phase {
                SelectionPhase::Armed { deadline } if deadline <= now => {
                    s.phase = if s.instrument.is_some() {
                        SelectionPhase::Attempting
                    } else {
                        SelectionPhase::Idle
                    };
                    Some((*song, s.instrument))
                }
                _ => None,
            })
            .collect()
    }

    fn settle(
        &self,
        song: SongId,
        instrument: Instrument,
        result: Result<SubmitOutcome, JamError>,
    ) -> SubmissionReport {
        let mut selections = self.selections.lock();
        let entry = selections.entry(song).or_insert_with(Selection::idle);
        match result {
            Ok(outcome @ (SubmitOutcome::Accepted | SubmitOutcome::AlreadyApplied)) => {
                entry.phase = SelectionPhase::Submitted;
                entry.last_error = None;
                if outcome == SubmitOutcome::Accepted {
                    entry.outcome = Some(CandidacyStatus::Pending);
                }
                tracing::info!(song = %song, guest = %self.guest, ?outcome, "candidacy submitted");
                SubmissionReport::Submitted {
                    song,
                    instrument,
                    outcome,
                }
            }
            Ok(outcome) => {
                let reason = format!("{outcome:?}");
                Self::fail(entry, song, instrument, reason)
            }
            Err(e) => Self::fail(entry, song, instrument, e.to_string()),
        }
    }

    fn fail(
        entry: &mut Selection,
        song: SongId,
        instrument: Instrument,
        reason: String,
    ) -> SubmissionReport {
        tracing::warn!(song = %song, %instrument, %reason, "candidacy submission failed");
        entry.phase = SelectionPhase::Failed;
        entry.last_error = Some(reason.clone());
        SubmissionReport::Failed {
            song,
            instrument,
            reason,
        }
    }
}

impl<S> CandidacyCoordinator<S>
where
    S: CandidacySubmitter + ?Sized,
{
    /// Tick periodically on `spawner` until the returned handle is shut down or dropped.
    pub fn spawn_scheduler<Sp: Spawn>(
        self: &Arc<Self>,
        spawner: &Sp,
        every: Duration,
    ) -> SchedulerHandle {
        let (tx, mut rx) = watch::channel(false);
        let this = Arc::clone(self);
        spawner.spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let reports = this.tick().await;
                        if !reports.is_empty() {
                            tracing::debug!(
                                count = reports.len(),
                                "scheduler tick settled selections"
                            );
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("candidacy scheduler stopped");
        });
        SchedulerHandle { shutdown: tx }
    }
}
