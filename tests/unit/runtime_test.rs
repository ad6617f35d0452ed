//! Tests for runtime adapters and API models

use std::sync::Arc;

use jam_slot_engine::builders::EngineBuilder;
use jam_slot_engine::core::{ErrorKind, Instrument, NewSong, SongStatus, Spawn, SubmitOutcome};
use jam_slot_engine::runtime::api::{
    self, CandidateDecisionRequest, MoveSongStatusRequest, SubmitCandidacyRequest,
};
use jam_slot_engine::runtime::TokioSpawner;
use jam_slot_engine::util::{EventId, GuestId, SongId};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_spawner_spawn() {
    let spawner = TokioSpawner::current().expect("inside runtime");

    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn(async move {
        tx.send(123).unwrap();
    });

    let result = rx.await.expect("oneshot result");
    assert_eq!(result, 123);
}

#[test]
fn test_tokio_spawner_outside_runtime() {
    assert!(TokioSpawner::current().is_err());
}

#[test]
fn test_api_round_trip() {
    let engine = Arc::new(EngineBuilder::new().build().unwrap());
    let session = engine.open_session(EventId::new()).unwrap();
    let song = engine
        .create_song(
            session,
            NewSong::new("Chameleon", "Herbie Hancock").with_bucket(Instrument::Keys, 1),
        )
        .unwrap();
    api::move_song_status(
        &engine,
        &MoveSongStatusRequest {
            song_id: song.id,
            target: SongStatus::OpenForCandidates,
        },
    )
    .unwrap();

    let guest = GuestId::new();
    let req: SubmitCandidacyRequest = serde_json::from_value(serde_json::json!({
        "songId": song.id,
        "instrument": "keys",
        "guestId": guest,
    }))
    .unwrap();
    let resp = api::submit_candidacy(&engine, &req).unwrap();
    assert_eq!(resp.outcome, SubmitOutcome::Accepted);
    assert_eq!(
        serde_json::to_value(resp).unwrap(),
        serde_json::json!({ "outcome": "accepted" })
    );

    let bucket = api::decide_candidate(
        &engine,
        &CandidateDecisionRequest {
            song_id: song.id,
            instrument: Instrument::Keys,
            guest_id: guest,
            approve: true,
        },
    )
    .unwrap();
    assert_eq!(bucket.approved, vec![guest]);

    let health = api::health(&engine);
    assert!(health.ok);
    assert_eq!(health.sessions, 1);
}

#[test]
fn test_api_error_response() {
    let engine = EngineBuilder::new().build().unwrap();
    let err = api::move_song_status(
        &engine,
        &MoveSongStatusRequest {
            song_id: SongId::new(),
            target: SongStatus::OnStage,
        },
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert!(!err.retryable);
}
