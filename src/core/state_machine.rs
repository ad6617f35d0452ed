//! Song lifecycle rules.
//!
//! ```text
//! planned -> open_for_candidates -> on_stage -> played
//!    \               |                  |
//!     `------------> canceled <---------'
//! ```
//!
//! `played` and `canceled` are terminal. Entering `on_stage` or `canceled`
//! sweeps every pending candidacy to `rejected`.

use serde::{Deserialize, Serialize};

use crate::core::ledger::{SlotLedger, SweptCandidacy};
use crate::core::model::SongStatus;
use crate::core::JamError;

/// Result of an accepted status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    /// Status before the move.
    pub from: SongStatus,
    /// Status after the move.
    pub to: SongStatus,
    /// Pending candidacies rejected by the move.
    pub swept: Vec<SweptCandidacy>,
}

/// Transition table and side effects of the song lifecycle.
pub struct SongStateMachine;

impl SongStateMachine {
    /// Whether `from -> to` is an edge of the lifecycle.
    #[must_use]
    pub const fn is_valid(from: SongStatus, to: SongStatus) -> bool {
        use SongStatus::{Canceled, OnStage, OpenForCandidates, Planned, Played};
        matches!(
            (from, to),
            (Planned, OpenForCandidates)
                | (OpenForCandidates, OnStage)
                | (OnStage, Played)
                | (Planned | OpenForCandidates | OnStage, Canceled)
        )
    }

    /// Whether entering `to` rejects outstanding pending candidacies.
    #[must_use]
    pub const fn sweeps_pending(to: SongStatus) -> bool {
        matches!(to, SongStatus::OnStage | SongStatus::Canceled)
    }

    /// Validate a move without applying it.
    ///
    /// # Errors
    ///
    /// [`JamError::InvalidTransition`] when `current -> requested` is not an edge.
    pub fn check(current: SongStatus, requested: SongStatus) -> Result<(), JamError> {
        if Self::is_valid(current, requested) {
            Ok(())
        } else {
            Err(JamError::InvalidTransition { current, requested })
        }
    }

    /// Apply a move to a song's status and ledger together.
    ///
    /// Nothing is modified when the move is refused.
    ///
    /// # Errors
    ///
    /// [`JamError::InvalidTransition`] when `*status -> target` is not an edge.
    pub fn apply(
        status: &mut SongStatus,
        ledger: &mut SlotLedger,
        target: SongStatus,
    ) -> Result<StatusTransition, JamError> {
        let from = *status;
        Self::check(from, target)?;
        let swept = if Self::sweeps_pending(target) {
            ledger.sweep_pending()
        } else {
            Vec::new()
        };
        *status = target;
        Ok(StatusTransition {
            from,
            to: target,
            swept,
        })
    }
}
