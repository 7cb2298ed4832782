//! Per-car location buffer
//!
//! A bounded FIFO of timestamped samples. Samples are kept in arrival
//! order; pruning (not sorting) recovers a usable interpolation window by
//! retaining exactly one expired sample as the "previous" anchor in front
//! of everything that has not happened yet.

use laplight_env::LocationDto;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::TrackError;
use crate::laplight_interp::TRACK_LENGTH;

/// Default number of samples a single car may hold
pub const DEFAULT_BUFFER_CAPACITY: usize = 128;

/// Where a car was (or will be) at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix epoch milliseconds
    pub occurred_at: u64,
    
    /// Percentage of the lap in [0, 100)
    pub position: f64,
}

impl Sample {
    pub fn new(occurred_at: u64, position: f64) -> Self {
        Self { occurred_at, position }
    }
    
    fn same_as(&self, other: &Sample) -> bool {
        self.occurred_at == other.occurred_at && self.position == other.position
    }
}

impl TryFrom<&LocationDto> for Sample {
    type Error = TrackError;
    
    /// Finite positions outside [0, 100) are folded back onto the lap.
    fn try_from(dto: &LocationDto) -> Result<Self, Self::Error> {
        if !dto.location.is_finite() {
            return Err(TrackError::InvalidSample {
                car: dto.driver_number,
                reason: format!("non-finite location {}", dto.location),
            });
        }
        
        // rem_euclid rounds tiny negatives up to exactly TRACK_LENGTH
        let position = dto.location.rem_euclid(TRACK_LENGTH);
        let position = if position >= TRACK_LENGTH { 0.0 } else { position };
        Ok(Sample::new(dto.occurred_at, position))
    }
}

/// What happened to a sample offered to `LocationBuffer::insert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertOutcome {
    /// Stored at the tail
    Inserted,
    
    /// Already in the past on arrival
    Stale,
    
    /// Identical (occurred_at, position) already buffered
    Duplicate,
    
    /// No free slot; the new sample was dropped, existing ones kept
    Full,
}

/// The interpolation endpoints currently available for a car.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Anchors {
    Empty,
    Single(Sample),
    Pair { previous: Sample, next: Sample },
}

/// Bounded, arrival-ordered sample queue owned by one car.
#[derive(Debug, Clone)]
pub struct LocationBuffer {
    entries: VecDeque<Sample>,
    capacity: usize,
}

impl LocationBuffer {
    /// Creates an empty buffer. A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }
    
    /// Offers a sample observed at logical time `now_ms`.
    ///
    /// Rejections are checked in order: stale, duplicate, full.
    pub fn insert(&mut self, sample: Sample, now_ms: u64) -> InsertOutcome {
        if sample.occurred_at < now_ms {
            return InsertOutcome::Stale;
        }
        
        if self.entries.iter().any(|s| s.same_as(&sample)) {
            return InsertOutcome::Duplicate;
        }
        
        if self.entries.len() >= self.capacity {
            return InsertOutcome::Full;
        }
        
        self.entries.push_back(sample);
        InsertOutcome::Inserted
    }
    
    /// Drops samples that fell behind `now_ms`, keeping one anchor.
    ///
    /// Of all samples with `occurred_at < now_ms` only the most recent
    /// survives (ties go to the later arrival); it moves to the front,
    /// followed by every unexpired sample in arrival order. Returns the
    /// number of samples removed.
    pub fn prune(&mut self, now_ms: u64) -> usize {
        let anchor_idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, s)| s.occurred_at < now_ms)
            .max_by_key(|(_, s)| s.occurred_at)
            .map(|(idx, _)| idx);
        
        let Some(anchor_idx) = anchor_idx else {
            return 0;
        };
        
        let before = self.entries.len();
        let anchor = self.entries.remove(anchor_idx);
        self.entries.retain(|s| s.occurred_at >= now_ms);
        if let Some(anchor) = anchor {
            self.entries.push_front(anchor);
        }
        
        before - self.entries.len()
    }
    
    /// The first two buffered samples, in buffer order.
    pub fn anchors(&self) -> Anchors {
        match (self.entries.front(), self.entries.get(1)) {
            (None, _) => Anchors::Empty,
            (Some(only), None) => Anchors::Single(*only),
            (Some(previous), Some(next)) => Anchors::Pair {
                previous: *previous,
                next: *next,
            },
        }
    }
    
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.entries.iter()
    }
}

impl Default for LocationBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    
    fn timestamps(buffer: &LocationBuffer) -> Vec<u64> {
        buffer.iter().map(|s| s.occurred_at).collect()
    }
    
    #[test]
    fn test_insert_appends_in_arrival_order() {
        let mut buffer = LocationBuffer::new(8);
        
        assert_eq!(buffer.insert(Sample::new(3_000, 30.0), 0), InsertOutcome::Inserted);
        assert_eq!(buffer.insert(Sample::new(1_000, 10.0), 0), InsertOutcome::Inserted);
        assert_eq!(buffer.insert(Sample::new(2_000, 20.0), 0), InsertOutcome::Inserted);
        
        assert_eq!(timestamps(&buffer), vec![3_000, 1_000, 2_000]);
    }
    
    #[test]
    fn test_stale_sample_rejected() {
        let mut buffer = LocationBuffer::new(8);
        
        assert_eq!(buffer.insert(Sample::new(999, 10.0), 1_000), InsertOutcome::Stale);
        // occurred_at == now is not stale
        assert_eq!(buffer.insert(Sample::new(1_000, 10.0), 1_000), InsertOutcome::Inserted);
        assert_eq!(buffer.len(), 1);
    }
    
    #[test]
    fn test_duplicate_suppressed() {
        let mut buffer = LocationBuffer::new(8);
        let sample = Sample::new(1_000, 42.0);
        
        assert_eq!(buffer.insert(sample, 0), InsertOutcome::Inserted);
        assert_eq!(buffer.insert(sample, 0), InsertOutcome::Duplicate);
        assert_eq!(buffer.len(), 1);
        
        // Same instant, different position is a distinct sample
        assert_eq!(buffer.insert(Sample::new(1_000, 43.0), 0), InsertOutcome::Inserted);
        assert_eq!(buffer.len(), 2);
    }
    
    #[test]
    fn test_full_buffer_drops_newest() {
        let mut buffer = LocationBuffer::new(3);
        for i in 0..3 {
            assert_eq!(buffer.insert(Sample::new(i * 1_000, i as f64), 0), InsertOutcome::Inserted);
        }
        
        assert_eq!(buffer.insert(Sample::new(9_000, 9.0), 0), InsertOutcome::Full);
        assert_eq!(timestamps(&buffer), vec![0, 1_000, 2_000]);
    }
    
    #[test]
    fn test_zero_capacity_is_bumped() {
        let buffer = LocationBuffer::new(0);
        assert_eq!(buffer.capacity(), 1);
    }
    
    #[test]
    fn test_prune_keeps_latest_expired_anchor() {
        let mut buffer = LocationBuffer::new(8);
        for (t, p) in [(0, 10.0), (1_000, 20.0), (2_000, 30.0), (3_000, 40.0)] {
            buffer.insert(Sample::new(t, p), 0);
        }
        
        let removed = buffer.prune(2_500);
        
        assert_eq!(removed, 2);
        assert_eq!(timestamps(&buffer), vec![2_000, 3_000]);
    }
    
    #[test]
    fn test_prune_survives_out_of_order_arrival() {
        // The newest expired sample arrived last; a "delete everything before
        // the last stale index" policy would lose the 1_000 anchor here.
        let mut buffer = LocationBuffer::new(8);
        for t in [1_500, 3_000, 500, 1_000] {
            buffer.insert(Sample::new(t, t as f64 / 100.0), 0);
        }
        
        buffer.prune(2_000);
        
        assert_eq!(timestamps(&buffer), vec![1_500, 3_000]);
        match buffer.anchors() {
            Anchors::Pair { previous, next } => {
                assert_eq!(previous.occurred_at, 1_500);
                assert_eq!(next.occurred_at, 3_000);
            }
            other => panic!("expected a pair, got {:?}", other),
        }
    }
    
    #[test]
    fn test_prune_noop_when_nothing_expired() {
        let mut buffer = LocationBuffer::new(8);
        buffer.insert(Sample::new(5_000, 50.0), 0);
        buffer.insert(Sample::new(4_000, 40.0), 0);
        
        assert_eq!(buffer.prune(1_000), 0);
        assert_eq!(timestamps(&buffer), vec![5_000, 4_000]);
    }
    
    #[test]
    fn test_prune_everything_expired_leaves_single_anchor() {
        let mut buffer = LocationBuffer::new(8);
        for t in [0, 1_000, 2_000] {
            buffer.insert(Sample::new(t, t as f64 / 100.0), 0);
        }
        
        buffer.prune(10_000);
        
        assert_eq!(buffer.anchors(), Anchors::Single(Sample::new(2_000, 20.0)));
    }
    
    #[test]
    fn test_anchors_shapes() {
        let mut buffer = LocationBuffer::new(4);
        assert_eq!(buffer.anchors(), Anchors::Empty);
        
        buffer.insert(Sample::new(10, 1.0), 0);
        assert_eq!(buffer.anchors(), Anchors::Single(Sample::new(10, 1.0)));
        
        buffer.insert(Sample::new(20, 2.0), 0);
        assert_eq!(
            buffer.anchors(),
            Anchors::Pair {
                previous: Sample::new(10, 1.0),
                next: Sample::new(20, 2.0),
            }
        );
    }
    
    #[test]
    fn test_sample_from_dto() {
        let ok = LocationDto::new(1, 105.5, 10);
        let sample = Sample::try_from(&ok).unwrap();
        assert!((sample.position - 5.5).abs() < 1e-9);
        
        let negative = LocationDto::new(1, -2.0, 10);
        assert!((Sample::try_from(&negative).unwrap().position - 98.0).abs() < 1e-9);
        
        let nan = LocationDto::new(1, f64::NAN, 10);
        assert!(matches!(
            Sample::try_from(&nan),
            Err(TrackError::InvalidSample { .. })
        ));
    }
    
    #[test]
    fn test_tiny_negative_location_folds_to_start_line() {
        let sample = Sample::try_from(&LocationDto::new(1, -1e-17, 10)).unwrap();
        assert_eq!(sample.position, 0.0);
        
        let sample = Sample::try_from(&LocationDto::new(1, -1e-300, 10)).unwrap();
        assert_eq!(sample.position, 0.0);
    }
    
    proptest! {
        #[test]
        fn prop_sample_position_stays_on_lap(location in -1.0e6f64..1.0e6) {
            let sample = Sample::try_from(&LocationDto::new(1, location, 0)).unwrap();
            prop_assert!(sample.position >= 0.0 && sample.position < TRACK_LENGTH);
        }
        
        #[test]
        fn prop_double_insert_changes_contents_once(t in 0u64..1_000_000, p in 0.0f64..100.0) {
            let mut buffer = LocationBuffer::new(16);
            buffer.insert(Sample::new(t, p), 0);
            let once: Vec<Sample> = buffer.iter().copied().collect();
            
            prop_assert_eq!(buffer.insert(Sample::new(t, p), 0), InsertOutcome::Duplicate);
            let twice: Vec<Sample> = buffer.iter().copied().collect();
            prop_assert_eq!(once, twice);
        }
        
        #[test]
        fn prop_capacity_never_exceeded(capacity in 1usize..32, extra in 1usize..16) {
            let mut buffer = LocationBuffer::new(capacity);
            for i in 0..capacity {
                prop_assert_eq!(buffer.insert(Sample::new(i as u64, 1.0), 0), InsertOutcome::Inserted);
            }
            let before: Vec<Sample> = buffer.iter().copied().collect();
            
            for j in 0..extra {
                let late = Sample::new((capacity + j) as u64, 2.0);
                prop_assert_eq!(buffer.insert(late, 0), InsertOutcome::Full);
            }
            
            prop_assert_eq!(buffer.len(), capacity);
            prop_assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), before);
        }
        
        #[test]
        fn prop_prune_preserves_an_anchor(
            times in prop::collection::vec(0u64..10_000, 1..40),
            now in 0u64..12_000,
        ) {
            let mut buffer = LocationBuffer::new(64);
            for t in &times {
                buffer.insert(Sample::new(*t, (*t % 100) as f64), 0);
            }
            let had_past = buffer.iter().any(|s| s.occurred_at <= now);
            let latest_past = buffer.iter().filter(|s| s.occurred_at < now).map(|s| s.occurred_at).max();
            let future: usize = buffer.iter().filter(|s| s.occurred_at >= now).count();
            
            buffer.prune(now);
            
            if had_past {
                prop_assert!(buffer.iter().any(|s| s.occurred_at <= now));
            }
            
            // At most one expired sample survives, and it leads the buffer
            let expired: Vec<u64> = buffer.iter().filter(|s| s.occurred_at < now).map(|s| s.occurred_at).collect();
            prop_assert!(expired.len() <= 1);
            prop_assert_eq!(expired.first().copied(), latest_past);
            if let Some(t) = latest_past {
                prop_assert_eq!(buffer.iter().next().map(|s| s.occurred_at), Some(t));
            }
            prop_assert_eq!(buffer.len(), future + expired.len());
        }
    }
}
