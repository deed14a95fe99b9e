use crate::{
    dao::models::Version,
    state::{
        game::{Signal, tap_delta},
        phase::Phase,
    },
};

/// Absolute score value queued for the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWrite {
    /// Local write sequence number.
    pub seq: u64,
    /// Score to write.
    pub value: i64,
}

/// Result of a tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    /// The tap changed the local score and queued a write.
    Applied {
        /// Delta applied (+1 or -3).
        delta: i64,
        /// Local score after the tap.
        score: i64,
        /// Write to hand to the store.
        write: PendingWrite,
    },
    /// Taps outside `Playing` do nothing.
    Ignored {
        /// Phase the tap arrived in.
        phase: Phase,
    },
}

/// Per-player score accumulator with optimistic local updates.
///
/// Taps fold over the current local value. While a score write is in flight
/// the store may echo older records (earlier score writes, heartbeats), so
/// authoritative records are held back until the latest write is
/// acknowledged. A held record is then applied only if the store wrote it
/// after that acknowledged write.
#[derive(Debug, Clone, Default)]
pub struct ScoreLedger {
    local: i64,
    pending: Option<PendingWrite>,
    next_seq: u64,
    confirmed_version: Version,
    held: Option<(i64, Version)>,
}

impl ScoreLedger {
    /// Ledger seeded from a fetched player record.
    pub fn new(score: i64, version: Version) -> Self {
        Self {
            local: score,
            pending: None,
            next_seq: 0,
            confirmed_version: version,
            held: None,
        }
    }

    /// Score to display.
    pub fn score(&self) -> i64 {
        self.local
    }

    /// Latest write not yet acknowledged.
    pub fn pending(&self) -> Option<PendingWrite> {
        self.pending
    }

    /// Apply a tap against the mirrored phase and signal.
    pub fn tap(&mut self, phase: Phase, signal: Signal) -> TapOutcome {
        let Some(delta) = tap_delta(phase, signal) else {
            return TapOutcome::Ignored { phase };
        };

        self.local += delta;
        self.next_seq += 1;
        let write = PendingWrite {
            seq: self.next_seq,
            value: self.local,
        };
        self.pending = Some(write);

        TapOutcome::Applied {
            delta,
            score: self.local,
            write,
        }
    }

    /// The store applied write `seq` at `version`; returns whether the local score changed.
    pub fn acknowledge(&mut self, seq: u64, version: Version) -> bool {
        self.confirmed_version = self.confirmed_version.max(version);
        if self.pending.is_some_and(|pending| pending.seq == seq) {
            self.pending = None;
            return self.release_held();
        }
        false
    }

    /// The store will never apply write `seq`; returns whether the local score changed.
    pub fn abandon(&mut self, seq: u64) -> bool {
        if self.pending.is_some_and(|pending| pending.seq == seq) {
            self.pending = None;
            return self.release_held();
        }
        false
    }

    /// Offer an authoritative record; returns whether it replaced the local value.
    ///
    /// Records at or below the newest acknowledged version are stale. Newer
    /// ones wait while a write is pending.
    pub fn reconcile(&mut self, score: i64, version: Version) -> bool {
        if version <= self.confirmed_version {
            return false;
        }
        if self.pending.is_some() {
            if self.held.is_none_or(|(_, held)| held < version) {
                self.held = Some((score, version));
            }
            return false;
        }
        self.held = None;
        self.confirmed_version = version;
        self.local = score;
        true
    }

    fn release_held(&mut self) -> bool {
        match self.held.take() {
            Some((score, version)) => self.reconcile(score, version),
            None => false,
        }
    }
}
