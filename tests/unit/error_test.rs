//! Tests for error types

use jam_slot_engine::core::{ErrorKind, Instrument, JamError, SongStatus};
use jam_slot_engine::util::{GuestId, SongId};

#[test]
fn test_invalid_transition_message() {
    let err = JamError::InvalidTransition {
        current: SongStatus::Played,
        requested: SongStatus::OnStage,
    };
    assert_eq!(format!("{err}"), "invalid transition from played to on_stage");
    assert_eq!(err.kind(), ErrorKind::Programming);
}

#[test]
fn test_business_rule_errors() {
    let song = SongId::new();
    let full = JamError::SlotFull {
        song,
        instrument: Instrument::Drums,
    };
    let not_pending = JamError::NotPending {
        song,
        instrument: Instrument::Drums,
        guest: GuestId::new(),
    };
    assert_eq!(full.kind(), ErrorKind::BusinessRule);
    assert_eq!(not_pending.kind(), ErrorKind::BusinessRule);
    assert!(!full.is_retryable());
}

#[test]
fn test_already_applied_is_benign() {
    let err = JamError::AlreadyApplied {
        song: SongId::new(),
        guest: GuestId::new(),
    };
    assert_eq!(err.kind(), ErrorKind::BenignConflict);
}

#[test]
fn test_song_not_open_is_stale_client() {
    let err = JamError::SongNotOpen {
        song: SongId::new(),
        status: SongStatus::Planned,
    };
    assert_eq!(err.kind(), ErrorKind::StaleClient);
}

#[test]
fn test_store_error_is_retryable() {
    let err = JamError::Store("connection reset".to_string());
    assert_eq!(format!("{err}"), "store error: connection reset");
    assert!(err.is_retryable());
    assert!(!JamError::UnknownSong(SongId::new()).is_retryable());
}

#[test]
fn test_error_kind_wire_name() {
    let json = serde_json::to_string(&ErrorKind::BenignConflict).unwrap();
    assert_eq!(json, "\"benign_conflict\"");
}
