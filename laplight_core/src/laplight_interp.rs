//! Position interpolation on a closed-loop track.
//!
//! Pure computation over a snapshot taken under the car's lock; nothing in
//! here touches shared state.

use crate::laplight_buffer::{Anchors, Sample};

/// Length of the circular coordinate space (percent of a lap)
pub const TRACK_LENGTH: f64 = 100.0;

/// A previous anchor above this and a next anchor below `WRAP_LOWER`
/// means the car crossed the start/finish line between them.
pub const WRAP_UPPER: f64 = 90.0;
pub const WRAP_LOWER: f64 = 10.0;

/// Everything needed to answer "where is this car now", copied out of the
/// car's lock so the arithmetic runs without holding it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub anchors: Anchors,
    pub last_known: Option<f64>,
}

impl Snapshot {
    /// Resolves the position at `now_ms`, `None` meaning Unavailable.
    ///
    /// - no samples: hold the last computed position, if any
    /// - one sample: that sample, whatever the time
    /// - two or more: interpolate between the first two, or hold the last
    ///   computed position when `now_ms` is outside their window
    pub fn position_at(&self, now_ms: u64) -> Option<f64> {
        match self.anchors {
            Anchors::Empty => self.last_known,
            Anchors::Single(only) => Some(only.position),
            Anchors::Pair { previous, next } => {
                interpolate(&previous, &next, now_ms).or(self.last_known)
            }
        }
    }
}

/// Linear interpolation between two anchors, wrapping across the line.
///
/// Returns `None` when `now_ms` is outside `[previous, next]`; that
/// includes inverted pairs where `next` is older than `previous`.
pub fn interpolate(previous: &Sample, next: &Sample, now_ms: u64) -> Option<f64> {
    if now_ms < previous.occurred_at || now_ms > next.occurred_at {
        return None;
    }
    
    let span = next.occurred_at - previous.occurred_at;
    if span == 0 {
        return Some(previous.position);
    }
    
    let fraction = (now_ms - previous.occurred_at) as f64 / span as f64;
    
    let target = if crosses_line(previous.position, next.position) {
        next.position + TRACK_LENGTH
    } else {
        next.position
    };
    
    let position = previous.position + (target - previous.position) * fraction;
    
    Some(if position >= TRACK_LENGTH {
        position % TRACK_LENGTH
    } else {
        position
    })
}

fn crosses_line(previous: f64, next: f64) -> bool {
    previous > WRAP_UPPER && next < WRAP_LOWER
}

/// Shortest distance between two positions around the loop.
pub fn circular_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(TRACK_LENGTH);
    d.min(TRACK_LENGTH - d)
}
