//! # Jam Slot Engine
//!
//! Song-slot candidacy engine for live jam sessions.
//!
//! A session holds an ordered set of songs. Each song asks for instrument
//! roles with a fixed number of slots, and guests apply for those slots while
//! organizers approve, reject and move the song through its lifecycle:
//!
//! ```text
//! planned -> open_for_candidates -> on_stage -> played
//!    \               \                 \
//!     +---------------+-----------------+--> canceled
//! ```
//!
//! Entering `on_stage` (or `canceled`) rejects every still-pending candidacy
//! in the same atomic step.
//!
//! ## Key Features
//!
//! - **Capacity-safe approvals**: per-song writer locks serialize mutations, so
//!   an instrument never holds more approved guests than its capacity.
//! - **All-or-nothing mutations**: every command is applied to a draft, committed
//!   to the [`core::JamStore`], then published.
//! - **Idempotent guest protocol**: [`core::CandidacyCoordinator`] holds a
//!   selection for a commit-delay window and submits it once; duplicates come
//!   back as `already-applied`.
//! - **Live propagation**: per-session event streams with a per-song `seq`, and a
//!   consumer-side [`runtime::LiveFeed`] that coalesces bursts, reconnects with
//!   backoff, falls back to polling and honours rate-limit cool-downs.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use jam_slot_engine::builders::EngineBuilder;
//! use jam_slot_engine::core::{Instrument, NewSong, SongStatus};
//! use jam_slot_engine::util::{EventId, GuestId};
//!
//! let engine = Arc::new(EngineBuilder::new().build()?);
//! let session = engine.open_session(EventId::new())?;
//! let song = engine.create_song(
//!     session,
//!     NewSong::new("Superstition", "Stevie Wonder").with_bucket(Instrument::Drums, 1),
//! )?;
//! engine.move_song_status(song.id, SongStatus::OpenForCandidates)?;
//!
//! let guest = GuestId::new();
//! engine.submit_candidacy(song.id, Instrument::Drums, guest)?;
//! engine.approve_candidate(song.id, Instrument::Drums, guest)?;
//! ```
//!
//! For complete flows, see `tests/slot_engine_test.rs` and
//! `tests/candidacy_flow_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Domain: slot accounting, lifecycle, events and the engine facade.
pub mod core;
/// Configuration models for the engine and live feeds.
pub mod config;
/// Builders to assemble the engine from configuration.
pub mod builders;
/// Infrastructure adapters for storage backends.
pub mod infra;
/// Runtime adapters, API models and consumer live feeds.
pub mod runtime;
/// Shared utilities.
pub mod util;
