//! Tests for audit sink

use jam_slot_engine::core::{
    build_audit_event, AuditAction, AuditSink, InMemoryAuditSink, SharedAuditSink,
};
use jam_slot_engine::util::{GuestId, SongId};

#[test]
fn test_in_memory_audit_sink() {
    let mut sink = InMemoryAuditSink::new(10);
    let song = SongId::new();
    let guest = GuestId::new();

    sink.record(build_audit_event(
        song,
        Some(guest),
        AuditAction::Propose,
        Some("bass".to_string()),
    ));

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].song_id, song);
    assert_eq!(events[0].guest, Some(guest));
    assert_eq!(events[0].action, AuditAction::Propose);
    assert_eq!(events[0].payload.as_deref(), Some("bass"));
}

#[test]
fn test_audit_sink_overflow() {
    let mut sink = InMemoryAuditSink::new(2);
    let song = SongId::new();

    sink.record(build_audit_event(song, None, AuditAction::CreateSong, None));
    sink.record(build_audit_event(song, None, AuditAction::Transition, None));
    sink.record(build_audit_event(song, None, AuditAction::Approve, None));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].action, AuditAction::Transition); // oldest dropped
    assert_eq!(events[1].action, AuditAction::Approve);
}

#[test]
fn test_shared_sink_keeps_inspection_handle() {
    let shared = SharedAuditSink::new(InMemoryAuditSink::new(8));
    let mut boxed: Box<dyn AuditSink> = Box::new(shared.clone());
    boxed.record(build_audit_event(SongId::new(), None, AuditAction::Reject, None));
    assert_eq!(shared.with(|s| s.events().len()), 1);
}

#[test]
fn test_event_ids_are_unique() {
    let song = SongId::new();
    let a = build_audit_event(song, None, AuditAction::CreateSong, None);
    let b = build_audit_event(song, None, AuditAction::CreateSong, None);
    assert_ne!(a.event_id, b.event_id);
}
