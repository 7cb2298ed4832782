//! Collaborator traits: where rosters, locations and network time come from.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{LocationDto, RosterEntry};

/// Source of the driver roster.
///
/// # Implementations
///
/// - **Production**: `HttpFeed` against the `/drivers` endpoint
/// - **Simulation**: `SimFeed` with an optional leading outage
#[async_trait]
pub trait RosterSource: Send + Sync + 'static {
    /// Fetches the full roster.
    ///
    /// An empty list is a valid answer; callers decide whether to retry.
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, EnvError>;
}

/// Source of location batches.
///
/// Batches carry no ordering or delivery guarantee: samples can repeat
/// across batches and arrive out of `occurred_at` order.
#[async_trait]
pub trait LocationSource: Send + Sync + 'static {
    /// Fetches the next batch of location samples.
    async fn fetch_locations(&self) -> Result<Vec<LocationDto>, EnvError>;
}

/// Authoritative wall-clock time, consulted once at boot.
#[async_trait]
pub trait TimeAuthority: Send + Sync + 'static {
    /// Returns the current time as Unix epoch milliseconds.
    async fn fetch_time_ms(&self) -> Result<u64, EnvError>;
}
