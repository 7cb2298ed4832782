//! The "TIME" Engine - logical race clock
//!
//! The host has no trustworthy clock of its own. It boots on a local
//! default epoch, optionally re-bases once from a network time authority,
//! and finally snaps onto the feed's timeline the first time a batch of
//! samples disagrees wildly with local time (replayed or simulated races).

use laplight_env::{RaceContext, TimeAuthority};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Drift beyond which the first disagreeing batch re-bases the clock
pub const DEFAULT_CORRECTION_THRESHOLD_MS: u64 = 100_000;

/// References past this are treated as garbage, never as a timeline
pub const MAX_PLAUSIBLE_EPOCH_MS: u64 = u64::MAX / 2;

/// Epoch-millisecond reading pinned to a monotonic instant.
#[derive(Debug, Clone, Copy)]
struct ClockBase {
    epoch_ms: u64,
    anchored_at: Duration,
}

/// Monotonic millisecond clock with a one-shot external correction.
///
/// `now_ms()` is the base reading plus monotonic time elapsed since the
/// base was set, so between re-bases it can never go backwards.
pub struct TimeSource<Ctx: RaceContext> {
    context: Arc<Ctx>,
    base: Mutex<ClockBase>,
    
    /// Latch closed by the first successful `correct()`
    corrected: AtomicBool,
    
    correction_threshold_ms: u64,
}

impl<Ctx: RaceContext> TimeSource<Ctx> {
    /// Creates a clock seeded from the context's local wall clock.
    pub fn new(context: Arc<Ctx>, correction_threshold_ms: u64) -> Self {
        let epoch_ms = unix_millis(context.system_time());
        Self::with_epoch(context, epoch_ms, correction_threshold_ms)
    }
    
    /// Creates a clock that reads `epoch_ms` right now.
    pub fn with_epoch(context: Arc<Ctx>, epoch_ms: u64, correction_threshold_ms: u64) -> Self {
        let anchored_at = context.now();
        Self {
            context,
            base: Mutex::new(ClockBase { epoch_ms, anchored_at }),
            corrected: AtomicBool::new(false),
            correction_threshold_ms,
        }
    }
    
    /// Current logical time in Unix epoch milliseconds. Never blocks on I/O.
    pub fn now_ms(&self) -> u64 {
        let base = *self.base.lock();
        let elapsed = self.context.now().saturating_sub(base.anchored_at);
        base.epoch_ms.saturating_add(elapsed.as_millis() as u64)
    }
    
    /// Whether the one-shot correction has already been applied.
    pub fn is_corrected(&self) -> bool {
        self.corrected.load(Ordering::Acquire)
    }
    
    pub fn correction_threshold_ms(&self) -> u64 {
        self.correction_threshold_ms
    }
    
    /// Re-bases the clock onto `reference_ms`, at most once per boot.
    ///
    /// Returns `false` without touching the clock if a correction already
    /// happened: correcting a corrected clock would compound the offset.
    /// An implausible reference is refused and leaves the latch open.
    pub fn correct(&self, reference_ms: u64) -> bool {
        if !is_plausible(reference_ms) {
            warn!("ignoring implausible clock reference {} ms", reference_ms);
            return false;
        }
        
        if self
            .corrected
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("clock already corrected, ignoring reference {}", reference_ms);
            return false;
        }
        
        let before = self.now_ms();
        self.rebase(reference_ms);
        info!(
            "clock corrected: {} -> {} ms (shift {:+} ms)",
            before,
            reference_ms,
            reference_ms as i128 - before as i128
        );
        true
    }
    
    /// Applies `correct(reference_ms)` only if local time is further than
    /// the threshold from the reference and no correction happened yet.
    pub fn correct_if_drifted(&self, reference_ms: u64) -> bool {
        if self.is_corrected() || !is_plausible(reference_ms) {
            return false;
        }
        
        let drift = self.now_ms().abs_diff(reference_ms);
        if drift <= self.correction_threshold_ms {
            return false;
        }
        
        debug!(
            "local clock {} ms away from feed (threshold {} ms)",
            drift, self.correction_threshold_ms
        );
        self.correct(reference_ms)
    }
    
    /// Best-effort boot-time sync against a network time authority.
    ///
    /// On failure the clock stays on its default epoch and the sample-driven
    /// correction is left to catch up. A successful sync does not close the
    /// correction latch: a replayed feed still needs to pull the clock.
    pub async fn synchronize_from_network<T>(&self, authority: &T) -> bool
    where
        T: TimeAuthority + ?Sized,
    {
        match authority.fetch_time_ms().await {
            Ok(server_ms) if !is_plausible(server_ms) => {
                warn!("network time {} ms is implausible, keeping local epoch", server_ms);
                false
            }
            Ok(server_ms) => {
                self.rebase(server_ms);
                info!("clock synchronised from network: {} ms", server_ms);
                true
            }
            Err(e) => {
                warn!("network time unavailable, keeping local epoch: {}", e);
                false
            }
        }
    }
    
    fn rebase(&self, epoch_ms: u64) {
        let anchored_at = self.context.now();
        *self.base.lock() = ClockBase { epoch_ms, anchored_at };
    }
}

fn is_plausible(epoch_ms: u64) -> bool {
    epoch_ms <= MAX_PLAUSIBLE_EPOCH_MS
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
