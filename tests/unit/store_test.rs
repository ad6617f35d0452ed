//! Tests for store adapters

use jam_slot_engine::core::{JamError, JamStore, SessionRecord};
use jam_slot_engine::infra::{InMemoryStore, PostgresStore};
use jam_slot_engine::util::{EventId, SessionId};

#[test]
fn test_in_memory_store_round_trips_sessions() {
    let store = InMemoryStore::new();
    let record = SessionRecord {
        id: SessionId::new(),
        event_id: EventId::new(),
    };
    store.save_session(&record).unwrap();
    assert_eq!(store.load_sessions().unwrap(), vec![record.clone()]);
    assert!(store.save_session(&record).is_err());
    assert!(store.load_songs().unwrap().is_empty());
}

#[test]
fn test_postgres_migrations_enforce_one_candidacy_per_guest() {
    let sql = PostgresStore::migrations().join("\n");
    assert!(sql.contains("CREATE TABLE IF NOT EXISTS jam_candidacies"));
    assert!(sql.contains("UNIQUE (song_id, guest_id)"));
    assert!(sql.contains("CHECK (capacity > 0)"));
}

#[test]
fn test_postgres_store_not_wired() {
    let store = PostgresStore::new();
    assert!(matches!(store.load_sessions(), Err(JamError::Store(_))));
}
