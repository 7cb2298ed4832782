//! Error types for the tracking core.

use laplight_env::{DriverNumber, EnvError};
use thiserror::Error;

/// Recoverable failures inside the tracking core.
///
/// None of these are fatal: the component that sees one logs it, drops
/// the offending sample or cycle, and carries on.
#[derive(Debug, Error)]
pub enum TrackError {
    /// A sample referenced a car that is not in the roster
    #[error("Unknown car {0}")]
    UnknownCar(DriverNumber),
    
    /// A sample carried a position that cannot be placed on the track
    #[error("Invalid sample for car {car}: {reason}")]
    InvalidSample { car: DriverNumber, reason: String },
    
    /// A collaborator fetch failed
    #[error(transparent)]
    Env(#[from] EnvError),
}
