//! Tests for utility functions

use jam_slot_engine::util::{now_ms, EventId, GuestId, SessionId, SongId};

#[test]
fn test_ids_are_unique() {
    assert_ne!(SongId::new(), SongId::new());
    assert_ne!(GuestId::new(), GuestId::new());
}

#[test]
fn test_id_display_and_parse() {
    let id = SessionId::new();
    let parsed: SessionId = id.to_string().parse().unwrap();
    assert_eq!(parsed, id);
    assert!("not-a-uuid".parse::<EventId>().is_err());
}

#[test]
fn test_id_serializes_as_plain_uuid() {
    let id = GuestId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
}

#[test]
fn test_now_ms_is_monotonic_enough() {
    let a = now_ms();
    let b = now_ms();
    assert!(b >= a);
    assert!(a > 0);
}

#[test]
fn test_init_tracing_is_idempotent() {
    jam_slot_engine::util::init_tracing();
    jam_slot_engine::util::init_tracing();
    tracing::info!("tracing installed");
}
