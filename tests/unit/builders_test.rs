//! Tests for builder modules

use std::sync::Arc;
use std::time::Duration;

use jam_slot_engine::builders::EngineBuilder;
use jam_slot_engine::config::EngineConfig;
use jam_slot_engine::core::{
    AuditAction, InMemoryAuditSink, Instrument, JamError, JamStore, NewSong, SharedAuditSink,
    SongStatus,
};
use jam_slot_engine::infra::{InMemoryStore, PostgresStore};
use jam_slot_engine::runtime::TokioSpawner;
use jam_slot_engine::util::{EventId, GuestId};

#[test]
fn test_engine_builder_defaults() {
    let builder = EngineBuilder::new();
    assert_eq!(builder.config(), &EngineConfig::default());
    let engine = builder.build().unwrap();
    assert_eq!(engine.registry().session_count(), 0);
}

#[test]
fn test_engine_builder_rejects_invalid_config() {
    let config = EngineConfig {
        audit_capacity: 0,
        ..EngineConfig::default()
    };
    let result = EngineBuilder::new().with_config(config).build();
    assert!(matches!(result, Err(JamError::Config(_))));
}

#[test]
fn test_engine_builder_hydrates_from_store() {
    let store = Arc::new(InMemoryStore::new());
    let guest = GuestId::new();
    let (session, song) = {
        let engine = EngineBuilder::new()
            .with_store(store.clone() as Arc<dyn JamStore>)
            .build()
            .unwrap();
        let session = engine.open_session(EventId::new()).unwrap();
        engine
            .create_song(session, NewSong::new("Intro", "House band"))
            .unwrap();
        let song = engine
            .create_song(
                session,
                NewSong::new("Cissy Strut", "The Meters").with_bucket(Instrument::Bass, 1),
            )
            .unwrap();
        engine
            .move_song_status(song.id, SongStatus::OpenForCandidates)
            .unwrap();
        engine.propose(song.id, Instrument::Bass, guest).unwrap();
        (session, song.id)
    };

    let restored = EngineBuilder::new()
        .with_store(store as Arc<dyn JamStore>)
        .build()
        .unwrap();
    let snapshot = restored.session_snapshot(session).unwrap();
    assert_eq!(snapshot.songs.len(), 2);
    assert_eq!(snapshot.songs[1].id, song);
    assert_eq!(snapshot.songs[1].status, SongStatus::OpenForCandidates);
    assert_eq!(snapshot.songs[1].revision, 2);
    assert_eq!(
        snapshot.songs[1].bucket(Instrument::Bass).unwrap().pending,
        vec![guest]
    );

    // Restored state keeps enforcing one record per guest.
    assert!(matches!(
        restored.propose(song, Instrument::Bass, guest),
        Err(JamError::AlreadyApplied { .. })
    ));
}

#[test]
fn test_engine_builder_fails_on_unwired_store() {
    let result = EngineBuilder::new()
        .with_store(Arc::new(PostgresStore::new()))
        .build();
    assert!(matches!(result, Err(JamError::Store(_))));
}

#[test]
fn test_engine_builder_attaches_audit_sink() {
    let audit = SharedAuditSink::new(InMemoryAuditSink::new(16));
    let engine = EngineBuilder::new()
        .with_audit_sink(Box::new(audit.clone()))
        .build()
        .unwrap();
    let session = engine.open_session(EventId::new()).unwrap();
    engine
        .create_song(session, NewSong::new("So What", "Miles Davis"))
        .unwrap();
    let actions: Vec<_> = audit.with(|s| s.events().iter().map(|e| e.action).collect());
    assert_eq!(actions, vec![AuditAction::CreateSong]);
}

#[test]
fn test_coordinator_uses_configured_delay() {
    let engine = Arc::new(EngineBuilder::new().build().unwrap());
    let config = EngineConfig {
        commit_delay_ms: 1200,
        ..EngineConfig::default()
    };
    let coordinator = EngineBuilder::coordinator_for(&config, GuestId::new(), engine);
    assert_eq!(coordinator.commit_delay().as_millis(), 1200);
}

#[tokio::test(start_paused = true)]
async fn test_spawned_coordinator_ticks_at_configured_interval() {
    let engine = Arc::new(EngineBuilder::new().build().unwrap());
    let session = engine.open_session(EventId::new()).unwrap();
    let song = engine
        .create_song(
            session,
            NewSong::new("Cantaloupe Island", "Herbie Hancock").with_bucket(Instrument::Keys, 1),
        )
        .unwrap();
    engine
        .move_song_status(song.id, SongStatus::OpenForCandidates)
        .unwrap();
    let config = EngineConfig {
        commit_delay_ms: 500,
        scheduler_tick_ms: 1000,
        ..EngineConfig::default()
    };
    let guest = GuestId::new();
    let spawner = TokioSpawner::current().unwrap();
    let (coordinator, handle) =
        EngineBuilder::spawn_coordinator(&config, guest, engine.clone(), &spawner);

    coordinator.select(song.id, Instrument::Keys).unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(engine.candidacy(song.id, guest).unwrap(), None);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(engine.candidacy(song.id, guest).unwrap().is_some());

    handle.shutdown();
}

#[test]
fn test_build_from_json_reports_context() {
    let engine = EngineBuilder::build_from_json(r#"{ "event_capacity": 8 }"#).unwrap();
    assert!(engine.open_session(EventId::new()).is_ok());

    let err = EngineBuilder::build_from_json(r#"{ "commit_delay_ms": 0 }"#).unwrap_err();
    assert_eq!(err.to_string(), "loading engine configuration from JSON");
    assert!(format!("{err:#}").contains("commit_delay_ms"));
}
