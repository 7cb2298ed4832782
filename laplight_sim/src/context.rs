//! Simulation context implementing RaceContext for deterministic testing.

use async_trait::async_trait;
use laplight_env::RaceContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::Instrument;

/// 2024-01-01 00:00:00 UTC
pub const DEFAULT_SIM_EPOCH_MS: u64 = 1_704_067_200_000;

/// Simulation context backed by a virtual clock.
///
/// This implements `RaceContext` using:
/// - A virtual clock that only moves when the harness says so
/// - Simulated sleep that advances virtual time
/// - A configurable local wall clock, so a node can boot with a wrong idea
///   of the date
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,
    
    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<AtomicU64>,
    
    /// Local wall clock at virtual time 0
    epoch: SystemTime,
}

impl SimContext {
    /// Creates a new SimContext with the given seed and a correct local clock.
    pub fn new(seed: u64) -> Self {
        Self::with_epoch(seed, UNIX_EPOCH + Duration::from_millis(DEFAULT_SIM_EPOCH_MS))
    }
    
    /// Creates a context whose local wall clock starts at `epoch`.
    pub fn with_epoch(seed: u64, epoch: SystemTime) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(AtomicU64::new(0)),
            epoch,
        }
    }
    
    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }
    
    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        self.virtual_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
    
    /// Sets the virtual time to a specific value.
    ///
    /// Callers must not move time backwards; the node clock assumes a
    /// monotonic source.
    pub fn set_time(&self, time_ns: u64) {
        self.virtual_time_ns.fetch_max(time_ns, Ordering::SeqCst);
    }
    
    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.virtual_time_ns.load(Ordering::SeqCst)
    }
    
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            epoch: self.epoch,
        }
    }
}

#[async_trait]
impl RaceContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }
    
    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }
    
    async fn sleep(&self, duration: Duration) {
        // In simulation, sleep advances virtual time
        self.advance_time(duration);
    }
    
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let span = tracing::debug_span!("sim_task", name = %name);
        tokio::spawn(future.instrument(span));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), Duration::ZERO);
        
        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(1));
        
        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));
    }
    
    #[test]
    fn test_set_time_never_rewinds() {
        let ctx = SimContext::new(1);
        ctx.set_time(2_000_000_000);
        ctx.set_time(1_000_000_000);
        assert_eq!(ctx.now(), Duration::from_secs(2));
    }
    
    #[test]
    fn test_system_time_follows_epoch() {
        let ctx = SimContext::with_epoch(7, UNIX_EPOCH);
        ctx.advance_time(Duration::from_secs(3));
        assert_eq!(ctx.system_time(), UNIX_EPOCH + Duration::from_secs(3));
        
        let default = SimContext::new(7);
        let ms = default.system_time().duration_since(UNIX_EPOCH).unwrap().as_millis();
        assert_eq!(ms as u64, DEFAULT_SIM_EPOCH_MS);
    }
    
    #[test]
    fn test_sim_context_clone_shares_time() {
        let ctx1 = SimContext::new(42);
        let ctx2 = ctx1.clone();
        
        ctx1.advance_time(Duration::from_secs(5));
        
        // Both should see the same time
        assert_eq!(ctx1.now(), ctx2.now());
        assert_eq!(ctx2.seed(), 42);
    }
    
    #[tokio::test]
    async fn test_sleep_advances_virtual_time() {
        let ctx = SimContext::new(42);
        ctx.sleep(Duration::from_millis(250)).await;
        assert_eq!(ctx.time_ns(), 250_000_000);
    }
}
