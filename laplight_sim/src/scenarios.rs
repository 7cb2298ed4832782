//! Fault scenarios for the simulation harness.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::context::DEFAULT_SIM_EPOCH_MS;
use crate::feed::FeedConfig;

/// 2023-07-02 00:00:00 UTC, the date of the replayed race
const REPLAY_EPOCH_MS: u64 = 1_688_256_000_000;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioId {
    /// LAP-001: clean feed, correct clocks
    Steady,
    
    /// LAP-002: every batch delivered in random order
    Reordered,
    
    /// LAP-003: location fetches fail at random
    FlakyNetwork,
    
    /// LAP-004: feed replays a race from months ago
    ReplayedClock,
    
    /// LAP-005: no network time, epoch-zero local clock, roster down at boot
    RosterOutage,
}

/// Everything a scenario changes about the simulated world.
#[derive(Debug, Clone)]
pub struct ScenarioProfile {
    /// Node's local wall clock at virtual time 0
    pub local_epoch: SystemTime,
    
    /// Feed behaviour
    pub feed: FeedConfig,
    
    /// Largest tolerated tracking error after warm-up (track percent)
    pub max_error: f64,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Steady,
            ScenarioId::Reordered,
            ScenarioId::FlakyNetwork,
            ScenarioId::ReplayedClock,
            ScenarioId::RosterOutage,
        ]
    }
    
    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Steady => "steady",
            ScenarioId::Reordered => "reordered",
            ScenarioId::FlakyNetwork => "flaky_network",
            ScenarioId::ReplayedClock => "replayed_clock",
            ScenarioId::RosterOutage => "roster_outage",
        }
    }
    
    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Steady => "In-order batches, synchronised clock, no faults",
            ScenarioId::Reordered => "Shuffled batches with overlapping samples",
            ScenarioId::FlakyNetwork => "30% of location fetches fail, up to 3 in a row",
            ScenarioId::ReplayedClock => "Dataset ~6 months behind real time, clock must snap once",
            ScenarioId::RosterOutage => "No NTP, local clock at 1970, roster fails 5 times",
        }
    }
    
    /// World setup for this scenario.
    pub fn profile(&self) -> ScenarioProfile {
        let correct_clock = UNIX_EPOCH + Duration::from_millis(DEFAULT_SIM_EPOCH_MS);
        let base = FeedConfig::default();
        
        match self {
            ScenarioId::Steady => ScenarioProfile {
                local_epoch: correct_clock,
                feed: base,
                max_error: 0.5,
            },
            ScenarioId::Reordered => ScenarioProfile {
                local_epoch: correct_clock,
                feed: FeedConfig { shuffle: true, ..base },
                max_error: 0.5,
            },
            ScenarioId::FlakyNetwork => ScenarioProfile {
                local_epoch: correct_clock,
                feed: FeedConfig {
                    failure_probability: 0.3,
                    max_consecutive_failures: 3,
                    ..base
                },
                max_error: 5.0,
            },
            ScenarioId::ReplayedClock => ScenarioProfile {
                local_epoch: correct_clock,
                feed: FeedConfig {
                    dataset_epoch_ms: REPLAY_EPOCH_MS,
                    ..base
                },
                max_error: 0.5,
            },
            ScenarioId::RosterOutage => ScenarioProfile {
                local_epoch: UNIX_EPOCH,
                feed: FeedConfig {
                    roster_failures: 5,
                    authority_available: false,
                    ..base
                },
                max_error: 0.5,
            },
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "steady" | "lap-001" => Ok(ScenarioId::Steady),
            "reordered" | "lap-002" => Ok(ScenarioId::Reordered),
            "flaky_network" | "flakynetwork" | "lap-003" => Ok(ScenarioId::FlakyNetwork),
            "replayed_clock" | "replayedclock" | "lap-004" => Ok(ScenarioId::ReplayedClock),
            "roster_outage" | "rosteroutage" | "lap-005" => Ok(ScenarioId::RosterOutage),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
