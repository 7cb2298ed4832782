//! LapLight Core - race position reconstruction for LED track maps
//!
//! This library turns a sparse, unordered feed of timestamped lap positions
//! into a smooth per-car position at any render instant:
//! 1. **Clock Problem**: the host clock is untrusted; `TimeSource` re-bases
//!    from network time and once more from the feed itself
//! 2. **Ordering Problem**: samples arrive late, twice, or shuffled;
//!    `LocationBuffer` filters and prunes them against the logical clock
//! 3. **Wrap Problem**: positions are circular; `interpolate` crosses the
//!    start/finish line instead of sweeping backwards across the track

pub mod car;
pub mod error;
pub mod laplight_buffer;
pub mod laplight_interp;
pub mod laplight_time;
pub mod metrics;
pub mod node_runtime;
pub mod registry;
pub mod render;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types for convenience
pub use car::Car;
pub use error::TrackError;
pub use laplight_buffer::{Anchors, InsertOutcome, LocationBuffer, Sample};
pub use laplight_interp::{circular_distance, interpolate, Snapshot, TRACK_LENGTH};
pub use laplight_time::TimeSource;
pub use metrics::{IngestReport, IngestStats, IngestTotals};
pub use node_runtime::{load_roster, TrackerConfig, TrackerNode};
pub use registry::CarRegistry;
pub use render::{cell_index, CarPosition, Frame, FrameSink, StripRenderer};
