//! A tracked car and its lock-protected sample state.

use laplight_env::{DriverNumber, RosterEntry, Rgb};
use parking_lot::Mutex;

use crate::laplight_buffer::{InsertOutcome, LocationBuffer, Sample};
use crate::laplight_interp::Snapshot;

/// Everything guarded by a car's lock.
#[derive(Debug)]
struct CarState {
    buffer: LocationBuffer,
    
    /// Most recent position handed to a reader (hold-last fallback)
    last_known: Option<f64>,
    
    /// Clock reading `last_known` was computed at
    last_known_at: u64,
}

/// One car from the roster.
///
/// Identity is immutable; the sample buffer and hold-last cache sit behind
/// a lock owned by this car alone, so ingest for one car never waits on
/// rendering of another.
#[derive(Debug)]
pub struct Car {
    number: DriverNumber,
    name: String,
    color: Option<Rgb>,
    state: Mutex<CarState>,
}

impl Car {
    pub fn new(entry: &RosterEntry, buffer_capacity: usize) -> Self {
        Self {
            number: entry.driver_number,
            name: entry.name.clone(),
            color: entry.color,
            state: Mutex::new(CarState {
                buffer: LocationBuffer::new(buffer_capacity),
                last_known: None,
                last_known_at: 0,
            }),
        }
    }
    
    pub fn number(&self) -> DriverNumber {
        self.number
    }
    
    pub fn name(&self) -> &str {
        &self.name
    }
    
    pub fn color(&self) -> Option<Rgb> {
        self.color
    }
    
    /// Write side: offers one sample to this car's buffer.
    pub fn insert(&self, sample: Sample, now_ms: u64) -> InsertOutcome {
        self.state.lock().buffer.insert(sample, now_ms)
    }
    
    /// Prunes against `now_ms` and copies out the interpolation inputs.
    pub fn snapshot(&self, now_ms: u64) -> Snapshot {
        let mut state = self.state.lock();
        state.buffer.prune(now_ms);
        Snapshot {
            anchors: state.buffer.anchors(),
            last_known: state.last_known,
        }
    }
    
    /// Read side: the car's position at `now_ms`, `None` if Unavailable.
    ///
    /// The lock is held for the prune/snapshot and again for the cache
    /// write; the interpolation itself runs unlocked.
    pub fn current_position(&self, now_ms: u64) -> Option<f64> {
        let snapshot = self.snapshot(now_ms);
        let position = snapshot.position_at(now_ms);
        
        if let Some(p) = position {
            self.remember(p, now_ms);
        }
        
        position
    }
    
    /// Caches `position` unless a reader at a later instant got there first.
    fn remember(&self, position: f64, now_ms: u64) {
        let mut state = self.state.lock();
        if state.last_known.is_none() || now_ms >= state.last_known_at {
            state.last_known = Some(position);
            state.last_known_at = now_ms;
        }
    }
    
    /// Last position returned by `current_position`, if any.
    pub fn last_known(&self) -> Option<f64> {
        self.state.lock().last_known
    }
    
    /// Number of samples currently buffered.
    pub fn buffered(&self) -> usize {
        self.state.lock().buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::Arc;
    
    fn car() -> Car {
        Car::new(&RosterEntry::new(1, "AAA"), 16)
    }
    
    #[test]
    fn test_empty_car_is_unavailable() {
        let car = car();
        assert_eq!(car.current_position(0), None);
        assert_eq!(car.current_position(1_000_000), None);
    }
    
    #[test]
    fn test_single_sample_held_verbatim() {
        let car = car();
        car.insert(Sample::new(10_000, 37.0), 0);
        
        assert_eq!(car.current_position(0), Some(37.0));
        assert_eq!(car.current_position(50_000), Some(37.0));
    }
    
    #[test]
    fn test_position_never_reverts_to_unavailable() {
        let car = car();
        car.insert(Sample::new(1_000, 10.0), 0);
        car.insert(Sample::new(2_000, 20.0), 0);
        
        // Before the window: nothing computed yet
        assert_eq!(car.current_position(500), None);
        
        let first = car.current_position(1_500);
        assert!(first.is_some());
        
        for now in [1_600, 2_000, 2_500, 10_000, 0] {
            assert!(car.current_position(now).is_some(), "unavailable at {}", now);
        }
    }
    
    #[test]
    fn test_hold_last_outside_window() {
        let car = car();
        car.insert(Sample::new(1_000, 10.0), 0);
        car.insert(Sample::new(2_000, 20.0), 0);
        car.insert(Sample::new(1_500, 99.0), 0);
        
        assert_relative_eq!(car.current_position(1_200).unwrap(), 12.0);
        
        // Prune at 2_100 leaves [2_000 anchor, nothing later] -> single
        assert_eq!(car.current_position(2_100), Some(20.0));
        assert_eq!(car.last_known(), Some(20.0));
    }
    
    #[test]
    fn test_late_reader_does_not_roll_back_cache() {
        let car = car();
        car.insert(Sample::new(1_000, 10.0), 0);
        car.insert(Sample::new(2_000, 20.0), 0);
        
        assert_eq!(car.current_position(2_100), Some(20.0));
        
        // A reader that computed at 1_200 finishes after the 2_100 reader
        car.remember(12.0, 1_200);
        assert_eq!(car.last_known(), Some(20.0));
        
        car.remember(21.0, 2_100);
        assert_eq!(car.last_known(), Some(21.0));
        car.remember(22.0, 2_200);
        assert_eq!(car.last_known(), Some(22.0));
    }
    
    #[test]
    fn test_concurrent_ingest_and_render() {
        let car = Arc::new(car());
        
        let writer = {
            let car = Arc::clone(&car);
            std::thread::spawn(move || {
                for i in 0..16u64 {
                    car.insert(Sample::new(i * 100, i as f64), 0);
                }
            })
        };
        
        let reader = {
            let car = Arc::clone(&car);
            std::thread::spawn(move || {
                for now in 0..500u64 {
                    if let Some(p) = car.current_position(now) {
                        assert!((0.0..100.0).contains(&p));
                    }
                }
            })
        };
        
        writer.join().unwrap();
        reader.join().unwrap();
        assert!(car.buffered() >= 1);
    }
}
