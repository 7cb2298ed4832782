//! Core environment context trait for LapLight nodes.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that the tracking core can run
/// on a real host (tokio) and inside the deterministic simulator.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and the OS clock
/// - **Simulation**: `SimContext` - virtual clock advanced by the harness
#[async_trait]
pub trait RaceContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// The `TimeSource` measures elapsed time against this reading, so it
    /// must never go backwards.
    fn now(&self) -> Duration;
    
    /// Returns the local wall-clock time.
    ///
    /// Used only to seed the logical clock before any network time or
    /// sample-driven correction has happened.
    fn system_time(&self) -> SystemTime;
    
    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);
    
    /// Spawns a background task.
    ///
    /// The name is attached to the task's log span.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
