//! LapLight Ingest Metrics
//! =======================
//!
//! Per-batch and cumulative counters for the ingest path. Every sample
//! that reaches the core is accounted for exactly once: inserted, or
//! dropped for one of the reasons below.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::laplight_buffer::InsertOutcome;

/// Outcome counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub inserted: u64,
    pub stale: u64,
    pub duplicate: u64,
    /// Dropped because the car's buffer had no free slot
    pub full: u64,
    pub unknown_car: u64,
    /// Non-finite positions
    pub invalid: u64,
}

impl IngestReport {
    /// Counts one buffer insert outcome.
    pub fn record(&mut self, outcome: InsertOutcome) {
        match outcome {
            InsertOutcome::Inserted => self.inserted += 1,
            InsertOutcome::Stale => self.stale += 1,
            InsertOutcome::Duplicate => self.duplicate += 1,
            InsertOutcome::Full => self.full += 1,
        }
    }
    
    /// Samples seen, whatever happened to them.
    pub fn total(&self) -> u64 {
        self.inserted + self.stale + self.duplicate + self.full + self.unknown_car + self.invalid
    }
    
    /// Samples that did not make it into a buffer.
    pub fn dropped(&self) -> u64 {
        self.total() - self.inserted
    }
}

/// Cumulative view returned by `IngestStats::totals`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestTotals {
    pub batches: u64,
    pub fetch_failures: u64,
    pub samples: IngestReport,
}

/// Lock-free cumulative counters shared between the ingest task and
/// whoever wants to report on it.
#[derive(Debug, Default)]
pub struct IngestStats {
    batches: AtomicU64,
    fetch_failures: AtomicU64,
    inserted: AtomicU64,
    stale: AtomicU64,
    duplicate: AtomicU64,
    full: AtomicU64,
    unknown_car: AtomicU64,
    invalid: AtomicU64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Folds one batch report into the totals.
    pub fn absorb(&self, report: &IngestReport) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.inserted.fetch_add(report.inserted, Ordering::Relaxed);
        self.stale.fetch_add(report.stale, Ordering::Relaxed);
        self.duplicate.fetch_add(report.duplicate, Ordering::Relaxed);
        self.full.fetch_add(report.full, Ordering::Relaxed);
        self.unknown_car.fetch_add(report.unknown_car, Ordering::Relaxed);
        self.invalid.fetch_add(report.invalid, Ordering::Relaxed);
    }
    
    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }
    
    pub fn totals(&self) -> IngestTotals {
        IngestTotals {
            batches: self.batches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            samples: IngestReport {
                inserted: self.inserted.load(Ordering::Relaxed),
                stale: self.stale.load(Ordering::Relaxed),
                duplicate: self.duplicate.load(Ordering::Relaxed),
                full: self.full.load(Ordering::Relaxed),
                unknown_car: self.unknown_car.load(Ordering::Relaxed),
                invalid: self.invalid.load(Ordering::Relaxed),
            },
        }
    }
}
