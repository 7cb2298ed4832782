//! Hand-cranked context and canned collaborators for unit tests.

use async_trait::async_trait;
use laplight_env::{EnvError, LocationDto, LocationSource, RaceContext, RosterEntry, RosterSource, TimeAuthority};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Context whose monotonic clock only moves when told to.
///
/// `sleep` advances the clock by the requested amount and returns at once.
pub(crate) struct ManualContext {
    elapsed: Mutex<Duration>,
    wall_clock_ms: u64,
}

impl ManualContext {
    pub(crate) fn shared() -> Arc<Self> {
        Self::with_wall_clock(0)
    }
    
    pub(crate) fn with_wall_clock(wall_clock_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            elapsed: Mutex::new(Duration::ZERO),
            wall_clock_ms,
        })
    }
    
    pub(crate) fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }
}

#[async_trait]
impl RaceContext for ManualContext {
    fn now(&self) -> Duration {
        *self.elapsed.lock()
    }
    
    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.wall_clock_ms) + self.now()
    }
    
    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
    
    fn spawn<F>(&self, _name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(future);
    }
}

/// Time authority with a fixed answer.
pub(crate) struct FixedAuthority {
    reply: Option<u64>,
}

impl FixedAuthority {
    pub(crate) fn ok(epoch_ms: u64) -> Self {
        Self { reply: Some(epoch_ms) }
    }
    
    pub(crate) fn failing() -> Self {
        Self { reply: None }
    }
}

#[async_trait]
impl TimeAuthority for FixedAuthority {
    async fn fetch_time_ms(&self) -> Result<u64, EnvError> {
        self.reply
            .ok_or_else(|| EnvError::TimeAuthority("no reply".to_string()))
    }
}

/// Roster and location source replaying a script.
///
/// The roster answers with `roster_failures` errors, then `empty_rosters`
/// empty lists, then the configured roster. Location batches are popped
/// in order; once exhausted every fetch returns an empty batch.
#[derive(Default)]
pub(crate) struct ScriptedFeed {
    roster: Vec<RosterEntry>,
    roster_failures: usize,
    empty_rosters: usize,
    roster_calls: AtomicUsize,
    batches: Mutex<VecDeque<Result<Vec<LocationDto>, EnvError>>>,
}

impl ScriptedFeed {
    pub(crate) fn new() -> Self {
        Self::default()
    }
    
    pub(crate) fn with_roster(mut self, roster: Vec<RosterEntry>) -> Self {
        self.roster = roster;
        self
    }
    
    pub(crate) fn roster_failures(mut self, count: usize) -> Self {
        self.roster_failures = count;
        self
    }
    
    pub(crate) fn empty_rosters(mut self, count: usize) -> Self {
        self.empty_rosters = count;
        self
    }
    
    pub(crate) fn push_batch(self, batch: Result<Vec<LocationDto>, EnvError>) -> Self {
        self.batches.lock().push_back(batch);
        self
    }
    
    pub(crate) fn roster_calls(&self) -> usize {
        self.roster_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RosterSource for ScriptedFeed {
    async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, EnvError> {
        let call = self.roster_calls.fetch_add(1, Ordering::SeqCst);
        if call < self.roster_failures {
            return Err(EnvError::network("connection refused"));
        }
        if call < self.roster_failures + self.empty_rosters {
            return Ok(Vec::new());
        }
        Ok(self.roster.clone())
    }
}

#[async_trait]
impl LocationSource for ScriptedFeed {
    async fn fetch_locations(&self) -> Result<Vec<LocationDto>, EnvError> {
        self.batches.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}
