//! Simulated collaborators: roster, location feed and time authority.
//!
//! The feed reads the virtual clock to decide what "now" is on the
//! dataset timeline and serves exact oracle samples from it, with the
//! delivery faults a scenario asks for.

use async_trait::async_trait;
use laplight_env::{
    EnvError, LocationDto, LocationSource, RaceContext, RosterEntry, RosterSource, TimeAuthority,
};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

use crate::context::{SimContext, DEFAULT_SIM_EPOCH_MS};
use crate::oracle::TrackOracle;

/// Delivery behaviour of a `SimFeed`.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// True Unix time (ms) at virtual time 0; what the time authority reports
    pub true_epoch_ms: u64,
    
    /// Dataset time (ms) at virtual time 0; differs from `true_epoch_ms`
    /// when the feed replays an old race
    pub dataset_epoch_ms: u64,
    
    /// How far ahead of dataset "now" each batch reaches (default: 3 s)
    pub lead_ms: u64,
    
    /// Spacing of samples on the dataset timeline (default: 1 s)
    pub sample_interval_ms: u64,
    
    /// Deliver each batch in random order
    pub shuffle: bool,
    
    /// Chance that a location fetch fails
    pub failure_probability: f64,
    
    /// Upper bound on back-to-back location failures
    pub max_consecutive_failures: u32,
    
    /// Roster fetches that fail before the first success
    pub roster_failures: u64,
    
    /// Whether the time authority answers at all
    pub authority_available: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            true_epoch_ms: DEFAULT_SIM_EPOCH_MS,
            dataset_epoch_ms: DEFAULT_SIM_EPOCH_MS,
            lead_ms: 3_000,
            sample_interval_ms: 1_000,
            shuffle: false,
            failure_probability: 0.0,
            max_consecutive_failures: 3,
            roster_failures: 0,
            authority_available: true,
        }
    }
}

/// Mutable fault-injection state.
struct FaultState {
    rng: ChaCha8Rng,
    consecutive_failures: u32,
}

/// Oracle-backed roster, location and time source.
pub struct SimFeed {
    context: Arc<SimContext>,
    oracle: Arc<TrackOracle>,
    config: FeedConfig,
    faults: Mutex<FaultState>,
    roster_calls: AtomicU64,
    location_calls: AtomicU64,
    injected_failures: AtomicU64,
}

impl SimFeed {
    /// Creates a feed; `network_seed` drives shuffling and failures only.
    pub fn new(
        context: Arc<SimContext>,
        oracle: Arc<TrackOracle>,
        config: FeedConfig,
        network_seed: u64,
    ) -> Self {
        Self {
            context,
            oracle,
            config,
            faults: Mutex::new(FaultState {
                rng: ChaCha8Rng::seed_from_u64(network_seed),
                consecutive_failures: 0,
            }),
            roster_calls: AtomicU64::new(0),
            location_calls: AtomicU64::new(0),
            injected_failures: AtomicU64::new(0),
        }
    }
    
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }
    
    /// Current instant on the dataset timeline.
    pub fn dataset_now_ms(&self) -> u64 {
        self.config.dataset_epoch_ms + self.elapsed_ms()
    }
    
    /// Current instant on the true timeline.
    pub fn true_now_ms(&self) -> u64 {
        self.config.true_epoch_ms + self.elapsed_ms()
    }
    
    pub fn roster_calls(&self) -> u64 {
        self.roster_calls.load(Ordering::Relaxed)
    }
    
    pub fn location_calls(&self) -> u64 {
        self.location_calls.load(Ordering::Relaxed)
    }
    
    pub fn injected_failures(&self) -> u64 {
        self.injected_failures.load(Ordering::Relaxed)
    }
    
    /// Samples at every interval boundary in `(now, now + lead]`.
    pub fn batch_at(&self, dataset_now_ms: u64) -> Vec<LocationDto> {
        let interval = self.config.sample_interval_ms.max(1);
        let first = dataset_now_ms / interval + 1;
        let last = (dataset_now_ms + self.config.lead_ms) / interval;
        
        (first..=last)
            .flat_map(|slot| self.oracle.samples_at(slot * interval))
            .collect()
    }
    
    fn elapsed_ms(&self) -> u64 {
        self.context.now().as_millis() as u64
    }
    
    /// Rolls the dice for this fetch. Returns true when it should fail.
    fn inject_failure(&self, faults: &mut FaultState) -> bool {
        let fail = self.config.failure_probability > 0.0
            && faults.consecutive_failures < self.config.max_consecutive_failures
            && faults.rng.gen_bool(self.config.failure_probability.min(1.0));
        
        if fail {
            faults.consecutive_failures += 1;
            self.injected_failures.fetch_add(1, Ordering::Relaxed);
        } else {
            faults.consecutive_failures = 0;
        }
        fail
    }
}

#[async_trait]
impl RosterSource for SimFeed {
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, EnvError> {
        let call = self.roster_calls.fetch_add(1, Ordering::Relaxed);
        if call < self.config.roster_failures {
            debug!("simulated roster outage (attempt {})", call + 1);
            return Err(EnvError::network("roster endpoint unreachable"));
        }
        Ok(self.oracle.roster())
    }
}

#[async_trait]
impl LocationSource for SimFeed {
    async fn fetch_locations(&self) -> Result<Vec<LocationDto>, EnvError> {
        self.location_calls.fetch_add(1, Ordering::Relaxed);
        let dataset_now = self.dataset_now_ms();
        let mut batch = self.batch_at(dataset_now);
        
        // A poisoned lock only means another fetch panicked mid-roll
        let mut faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        if self.inject_failure(&mut faults) {
            debug!("simulated location fetch failure at {}", dataset_now);
            return Err(EnvError::Timeout(5_000));
        }
        if self.config.shuffle {
            batch.shuffle(&mut faults.rng);
        }
        
        trace!("serving {} samples at {}", batch.len(), dataset_now);
        Ok(batch)
    }
}

#[async_trait]
impl TimeAuthority for SimFeed {
    async fn fetch_time_ms(&self) -> Result<u64, EnvError> {
        if self.config.authority_available {
            Ok(self.true_now_ms())
        } else {
            Err(EnvError::TimeAuthority("no reply from simulated server".to_string()))
        }
    }
}
