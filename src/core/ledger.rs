//! Per-song slot bookkeeping.
//!
//! A [`SlotLedger`] owns the instrument buckets of one song together with every
//! candidacy record ever made on it. It enforces:
//!
//! - `approved.len() <= capacity` for every bucket,
//! - approved and pending are disjoint,
//! - one candidacy record per guest per song, whatever its status.
//!
//! The ledger is plain data; serialization of writers is the caller's job
//! (see [`crate::core::JamEngine`]).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::model::{
    BucketSnapshot, BucketSpec, Candidacy, CandidacyStatus, Instrument, SongStatus,
};
use crate::core::JamError;
use crate::util::ids::{GuestId, SongId};

/// Capacity and membership for one instrument role.
#[derive(Debug, Clone)]
pub struct InstrumentBucket {
    instrument: Instrument,
    capacity: u32,
    approved: Vec<GuestId>,
    pending: Vec<GuestId>,
    rejected: Vec<GuestId>,
}

impl InstrumentBucket {
    fn new(spec: BucketSpec) -> Self {
        Self {
            instrument: spec.instrument,
            capacity: spec.capacity,
            approved: Vec::new(),
            pending: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// Instrument key.
    #[must_use]
    pub const fn instrument(&self) -> Instrument {
        self.instrument
    }

    /// Slot capacity.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    fn is_full(&self) -> bool {
        self.approved.len() >= self.capacity as usize
    }

    fn snapshot(&self) -> BucketSnapshot {
        BucketSnapshot {
            instrument: self.instrument,
            capacity: self.capacity,
            approved: self.approved.clone(),
            pending: self.pending.clone(),
            rejected: self.rejected.clone(),
        }
    }
}

/// A pending candidacy rejected by a lifecycle sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweptCandidacy {
    /// Guest whose request was rejected.
    pub guest: GuestId,
    /// Instrument they had requested.
    pub instrument: Instrument,
}

/// Buckets and candidacy records of a single song.
#[derive(Debug, Clone)]
pub struct SlotLedger {
    song: SongId,
    buckets: Vec<InstrumentBucket>,
    candidacies: HashMap<GuestId, Candidacy>,
    next_seq: u64,
}

impl SlotLedger {
    /// Build an empty ledger, validating the bucket definitions.
    ///
    /// # Errors
    ///
    /// [`JamError::InvalidSong`] if a capacity is zero or an instrument repeats.
    pub fn new(song: SongId, specs: &[BucketSpec]) -> Result<Self, JamError> {
        let mut buckets: Vec<InstrumentBucket> = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec.capacity == 0 {
                return Err(JamError::InvalidSong(format!(
                    "{} capacity must be at least 1",
                    spec.instrument
                )));
            }
            if buckets.iter().any(|b| b.instrument == spec.instrument) {
                return Err(JamError::InvalidSong(format!(
                    "{} listed more than once",
                    spec.instrument
                )));
            }
            buckets.push(InstrumentBucket::new(*spec));
        }
        Ok(Self {
            song,
            buckets,
            candidacies: HashMap::new(),
            next_seq: 0,
        })
    }

    /// Rebuild a ledger from stored candidacy records.
    ///
    /// # Errors
    ///
    /// [`JamError::Store`] if the records violate the bucket invariants.
    pub fn restore(
        song: SongId,
        specs: &[BucketSpec],
        records: Vec<Candidacy>,
    ) -> Result<Self, JamError> {
        let mut ledger = Self::new(song, specs).map_err(|e| JamError::Store(e.to_string()))?;
        let mut records = records;
        records.sort_by_key(|c| c.seq);
        for record in records {
            if ledger.candidacies.contains_key(&record.guest) {
                return Err(JamError::Store(format!(
                    "duplicate candidacy for guest {} on song {song}",
                    record.guest
                )));
            }
            let bucket = ledger
                .buckets
                .iter_mut()
                .find(|b| b.instrument == record.instrument)
                .ok_or_else(|| {
                    JamError::Store(format!(
                        "candidacy references missing {} bucket on song {song}",
                        record.instrument
                    ))
                })?;
            match record.status {
                CandidacyStatus::Pending => bucket.pending.push(record.guest),
                CandidacyStatus::Approved => {
                    if bucket.is_full() {
                        return Err(JamError::Store(format!(
                            "{} bucket over capacity on song {song}",
                            record.instrument
                        )));
                    }
                    bucket.approved.push(record.guest);
                }
                CandidacyStatus::Rejected => bucket.rejected.push(record.guest),
            }
            ledger.next_seq = ledger.next_seq.max(record.seq + 1);
            ledger.candidacies.insert(record.guest, record);
        }
        Ok(ledger)
    }

    /// Song the ledger belongs to.
    #[must_use]
    pub const fn song(&self) -> SongId {
        self.song
    }

    /// Buckets in display order.
    #[must_use]
    pub fn buckets(&self) -> &[InstrumentBucket] {
        &self.buckets
    }

    /// Bucket definitions, for persistence.
    #[must_use]
    pub fn specs(&self) -> Vec<BucketSpec> {
        self.buckets
            .iter()
            .map(|b| BucketSpec {
                instrument: b.instrument,
                capacity: b.capacity,
            })
            .collect()
    }

    /// Candidacy record of a guest, whatever its status.
    #[must_use]
    pub fn candidacy(&self, guest: GuestId) -> Option<&Candidacy> {
        self.candidacies.get(&guest)
    }

    /// All candidacy records in proposal order.
    #[must_use]
    pub fn candidacies(&self) -> Vec<Candidacy> {
        let mut all: Vec<Candidacy> = self.candidacies.values().cloned().collect();
        all.sort_by_key(|c| c.seq);
        all
    }

    /// Snapshot of one bucket.
    #[must_use]
    pub fn bucket_snapshot(&self, instrument: Instrument) -> Option<BucketSnapshot> {
        self.buckets
            .iter()
            .find(|b| b.instrument == instrument)
            .map(InstrumentBucket::snapshot)
    }

    /// Snapshots of every bucket in display order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<BucketSnapshot> {
        self.buckets.iter().map(InstrumentBucket::snapshot).collect()
    }

    fn bucket_mut(&mut self, instrument: Instrument) -> Result<&mut InstrumentBucket, JamError> {
        let song = self.song;
        self.buckets
            .iter_mut()
            .find(|b| b.instrument == instrument)
            .ok_or(JamError::UnknownInstrument { song, instrument })
    }

    /// Insert a pending candidacy.
    ///
    /// # Errors
    ///
    /// - [`JamError::AlreadyApplied`] if the guest has any record on this song.
    /// - [`JamError::UnknownInstrument`] if the song has no such bucket.
    /// - [`JamError::SongNotOpen`] unless `status` is `open_for_candidates`.
    /// - [`JamError::SlotFull`] if every slot is already approved.
    pub fn propose(
        &mut self,
        status: SongStatus,
        instrument: Instrument,
        guest: GuestId,
    ) -> Result<BucketSnapshot, JamError> {
        let song = self.song;
        if self.candidacies.contains_key(&guest) {
            return Err(JamError::AlreadyApplied { song, guest });
        }
        let seq = self.next_seq;
        let bucket = self.bucket_mut(instrument)?;
        if status != SongStatus::OpenForCandidates {
            return Err(JamError::SongNotOpen { song, status });
        }
        if bucket.is_full() {
            return Err(JamError::SlotFull { song, instrument });
        }
        bucket.pending.push(guest);
        let snapshot = bucket.snapshot();
        self.candidacies.insert(
            guest,
            Candidacy {
                guest,
                instrument,
                status: CandidacyStatus::Pending,
                seq,
            },
        );
        self.next_seq += 1;
        Ok(snapshot)
    }

    /// Move a pending candidate into an approved slot.
    ///
    /// # Errors
    ///
    /// - [`JamError::UnknownInstrument`] if the song has no such bucket.
    /// - [`JamError::NotPending`] if the guest is not pending in this bucket.
    /// - [`JamError::SlotFull`] if the bucket has no free slot.
    pub fn approve(
        &mut self,
        instrument: Instrument,
        guest: GuestId,
    ) -> Result<BucketSnapshot, JamError> {
        let song = self.song;
        let bucket = self.bucket_mut(instrument)?;
        let Some(pos) = bucket.pending.iter().position(|g| *g == guest) else {
            return Err(JamError::NotPending {
                song,
                instrument,
                guest,
            });
        };
        if bucket.is_full() {
            return Err(JamError::SlotFull { song, instrument });
        }
        bucket.pending.remove(pos);
        bucket.approved.push(guest);
        let snapshot = bucket.snapshot();
        if let Some(record) = self.candidacies.get_mut(&guest) {
            record.status = CandidacyStatus::Approved;
        }
        Ok(snapshot)
    }

    /// Reject a pending candidate or revoke an approved one.
    ///
    /// Returns `Ok(None)` when the candidacy is already rejected.
    ///
    /// # Errors
    ///
    /// - [`JamError::UnknownInstrument`] if the song has no such bucket.
    /// - [`JamError::NotPending`] if the guest has no candidacy in this bucket.
    pub fn reject(
        &mut self,
        instrument: Instrument,
        guest: GuestId,
    ) -> Result<Option<BucketSnapshot>, JamError> {
        let song = self.song;
        let current = self
            .candidacies
            .get(&guest)
            .filter(|c| c.instrument == instrument)
            .map(|c| c.status);
        let bucket = self.bucket_mut(instrument)?;
        match current {
            None => Err(JamError::NotPending {
                song,
                instrument,
                guest,
            }),
            Some(CandidacyStatus::Rejected) => Ok(None),
            Some(_) => {
                bucket.pending.retain(|g| *g != guest);
                bucket.approved.retain(|g| *g != guest);
                bucket.rejected.push(guest);
                let snapshot = bucket.snapshot();
                if let Some(record) = self.candidacies.get_mut(&guest) {
                    record.status = CandidacyStatus::Rejected;
                }
                Ok(Some(snapshot))
            }
        }
    }

    /// Reject every pending candidacy in every bucket. Approved slots are untouched.
    pub fn sweep_pending(&mut self) -> Vec<SweptCandidacy> {
        let mut swept = Vec::new();
        for bucket in &mut self.buckets {
            for guest in bucket.pending.drain(..) {
                bucket.rejected.push(guest);
                swept.push(SweptCandidacy {
                    guest,
                    instrument: bucket.instrument,
                });
            }
        }
        for entry in &swept {
            if let Some(record) = self.candidacies.get_mut(&entry.guest) {
                record.status = CandidacyStatus::Rejected;
            }
        }
        swept
    }
}
