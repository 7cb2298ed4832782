//! Node Runtime - wires the clock, the roster and the two periodic tasks.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        TrackerNode                           │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ Context: RaceContext  (monotonic now, sleep, spawn)     │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                 │                                            │
//! │           ┌─────▼─────┐                                      │
//! │           │TimeSource │                                      │
//! │           └─────┬─────┘                                      │
//! │   ingest task   │                 render task                │
//! │   (~1 Hz, I/O)  │                 (60 Hz, no I/O)            │
//! │        │        ▼                        │                   │
//! │        └──► CarRegistry ──► Car[lock] ◄──┘                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let ctx = TokioContext::shared();
//! let feed = HttpFeed::new(roster_url, locations_url)?;
//! let node = Arc::new(
//!     TrackerNode::bootstrap(ctx, TrackerConfig::default(), &feed, &SntpClient::default()).await,
//! );
//!
//! tokio::spawn({ let node = node.clone(); async move { node.run_ingest(&feed).await } });
//! node.run_render(&StripRenderer::new(100), &mut sink).await;
//! ```

use laplight_env::{LocationDto, LocationSource, RaceContext, RosterEntry, RosterSource, TimeAuthority};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::error::TrackError;
use crate::laplight_buffer::{InsertOutcome, Sample, DEFAULT_BUFFER_CAPACITY};
use crate::laplight_time::{TimeSource, DEFAULT_CORRECTION_THRESHOLD_MS};
use crate::metrics::{IngestReport, IngestStats};
use crate::registry::{CarRegistry, DEFAULT_MAX_CARS};
use crate::render::{CarPosition, FrameSink, StripRenderer, DEFAULT_LED_COUNT};

/// Configuration for a tracker node.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Samples held per car (default: 128)
    pub buffer_capacity: usize,
    
    /// Roster size limit (default: 32)
    pub max_cars: usize,
    
    /// Drift that triggers the one-shot clock correction (default: 100 s)
    pub clock_correction_threshold_ms: u64,
    
    /// Pause between location fetches (default: 1 s)
    pub ingest_interval: Duration,
    
    /// Pause between roster attempts at startup (default: 1 s)
    pub retry_delay: Duration,
    
    /// Render loop rate (default: 60 Hz)
    pub render_rate_hz: u32,
    
    /// Cells on the LED strip (default: 100)
    pub led_count: usize,
}

impl TrackerConfig {
    /// Sleep between two render frames.
    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.render_rate_hz.max(1) as f64)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_cars: DEFAULT_MAX_CARS,
            clock_correction_threshold_ms: DEFAULT_CORRECTION_THRESHOLD_MS,
            ingest_interval: Duration::from_secs(1),
            retry_delay: Duration::from_secs(1),
            render_rate_hz: 60,
            led_count: DEFAULT_LED_COUNT,
        }
    }
}

/// A running tracker: clock, roster and ingest statistics.
///
/// Generic over the context so the same node runs on tokio or inside
/// the simulator's virtual clock. Share it between tasks with `Arc`.
pub struct TrackerNode<Ctx>
where
    Ctx: RaceContext,
{
    context: Arc<Ctx>,
    clock: TimeSource<Ctx>,
    registry: CarRegistry,
    config: TrackerConfig,
    stats: IngestStats,
}

impl<Ctx> TrackerNode<Ctx>
where
    Ctx: RaceContext,
{
    /// Assembles a node from already-built parts.
    pub fn new(
        context: Arc<Ctx>,
        config: TrackerConfig,
        clock: TimeSource<Ctx>,
        registry: CarRegistry,
    ) -> Self {
        Self {
            context,
            clock,
            registry,
            config,
            stats: IngestStats::new(),
        }
    }
    
    /// Startup sequence: best-effort network time, then the roster.
    ///
    /// Blocks (asynchronously) until the roster source returns at least
    /// one car.
    pub async fn bootstrap<R, T>(
        context: Arc<Ctx>,
        config: TrackerConfig,
        roster: &R,
        time_authority: &T,
    ) -> Self
    where
        R: RosterSource + ?Sized,
        T: TimeAuthority + ?Sized,
    {
        let clock = TimeSource::new(context.clone(), config.clock_correction_threshold_ms);
        clock.synchronize_from_network(time_authority).await;
        
        let entries = load_roster(&*context, roster, config.retry_delay).await;
        let registry = CarRegistry::load(&entries, config.max_cars, config.buffer_capacity);
        info!("tracking {} cars", registry.len());
        
        Self::new(context, config, clock, registry)
    }
    
    pub fn clock(&self) -> &TimeSource<Ctx> {
        &self.clock
    }
    
    pub fn registry(&self) -> &CarRegistry {
        &self.registry
    }
    
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }
    
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
    
    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }
    
    /// Routes one batch into the cars' buffers.
    ///
    /// The earliest timestamp of the batch gets a chance to correct the
    /// clock first, so a replayed feed is not rejected wholesale as stale.
    pub fn ingest_batch(&self, batch: &[LocationDto]) -> IngestReport {
        let mut report = IngestReport::default();
        
        if let Some(earliest) = batch.iter().map(|dto| dto.occurred_at).min() {
            self.clock.correct_if_drifted(earliest);
        }
        let now_ms = self.clock.now_ms();
        
        for dto in batch {
            let car = match self.registry.lookup(dto.driver_number) {
                Ok(car) => car,
                Err(e) => {
                    debug!("dropping sample: {}", e);
                    report.unknown_car += 1;
                    continue;
                }
            };
            
            let sample = match Sample::try_from(dto) {
                Ok(sample) => sample,
                Err(e) => {
                    warn!("dropping sample: {}", e);
                    report.invalid += 1;
                    continue;
                }
            };
            
            let outcome = car.insert(sample, now_ms);
            if outcome == InsertOutcome::Full {
                warn!(
                    "buffer full for {} {}, dropping sample at {}",
                    car.number(),
                    car.name(),
                    sample.occurred_at
                );
            }
            report.record(outcome);
        }
        
        if report.unknown_car > 0 {
            warn!("{} samples referenced cars outside the roster", report.unknown_car);
        }
        debug!(
            "batch of {}: {} inserted, {} stale, {} duplicate, {} full",
            batch.len(),
            report.inserted,
            report.stale,
            report.duplicate,
            report.full
        );
        
        self.stats.absorb(&report);
        report
    }
    
    /// One ingest cycle: fetch a batch and route it.
    pub async fn ingest_once<L>(&self, source: &L) -> Result<IngestReport, TrackError>
    where
        L: LocationSource + ?Sized,
    {
        let batch = source.fetch_locations().await?;
        Ok(self.ingest_batch(&batch))
    }
    
    /// One ingest cycle with failure bookkeeping. A failed fetch is counted
    /// and the cycle is skipped.
    pub async fn ingest_cycle<L>(&self, source: &L) -> Option<IngestReport>
    where
        L: LocationSource + ?Sized,
    {
        match self.ingest_once(source).await {
            Ok(report) => Some(report),
            Err(e) => {
                self.stats.record_fetch_failure();
                warn!("location fetch failed, skipping cycle: {}", e);
                None
            }
        }
    }
    
    /// Ingest task body. Runs for the life of the process.
    pub async fn run_ingest<L>(&self, source: &L)
    where
        L: LocationSource + ?Sized,
    {
        loop {
            self.ingest_cycle(source).await;
            self.context.sleep(self.config.ingest_interval).await;
        }
    }
    
    /// Every car's position at the current clock reading, in roster order.
    pub fn positions(&self) -> Vec<CarPosition> {
        self.positions_at(self.clock.now_ms())
    }
    
    /// Every car's position at `now_ms`, in roster order.
    pub fn positions_at(&self, now_ms: u64) -> Vec<CarPosition> {
        self.registry
            .iter()
            .map(|car| CarPosition {
                number: car.number(),
                color: car.color(),
                position: car.current_position(now_ms),
            })
            .collect()
    }
    
    /// Renders one frame and hands it to the sink. Returns the number of
    /// cars that had a position.
    pub fn render_once<S>(&self, renderer: &StripRenderer, sink: &mut S) -> usize
    where
        S: FrameSink + ?Sized,
    {
        let positions = self.positions();
        let frame = renderer.render(&positions);
        sink.show(&frame);
        
        let placed = positions.iter().filter(|p| p.position.is_some()).count();
        trace!("frame: {}/{} cars placed", placed, positions.len());
        placed
    }
    
    /// Render task body. Never performs I/O besides the sink.
    pub async fn run_render<S>(&self, renderer: &StripRenderer, sink: &mut S)
    where
        S: FrameSink + ?Sized,
    {
        let period = self.config.frame_period();
        loop {
            self.render_once(renderer, sink);
            self.context.sleep(period).await;
        }
    }
}

/// Fetches the roster until a non-empty one arrives.
///
/// There is no attempt limit: without a roster there is nothing to track.
pub async fn load_roster<Ctx, R>(context: &Ctx, source: &R, retry_delay: Duration) -> Vec<RosterEntry>
where
    Ctx: RaceContext,
    R: RosterSource + ?Sized,
{
    let mut attempt: u64 = 0;
    loop {
        attempt += 1;
        match source.fetch_roster().await {
            Ok(entries) if !entries.is_empty() => {
                info!("roster loaded with {} drivers after {} attempt(s)", entries.len(), attempt);
                return entries;
            }
            Ok(_) => warn!("roster attempt {} returned no drivers, retrying", attempt),
            Err(e) => warn!("roster attempt {} failed, retrying: {}", attempt, e),
        }
        context.sleep(retry_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Frame;
    use crate::test_support::{FixedAuthority, ManualContext, ScriptedFeed};
    use approx::assert_relative_eq;
    use laplight_env::{DriverNumber, EnvError, Rgb};
    
    fn node_at(epoch_ms: u64, roster: &[RosterEntry]) -> (Arc<ManualContext>, TrackerNode<ManualContext>) {
        let ctx = ManualContext::shared();
        let config = TrackerConfig::default();
        let clock = TimeSource::with_epoch(ctx.clone(), epoch_ms, config.clock_correction_threshold_ms);
        let registry = CarRegistry::load(roster, config.max_cars, config.buffer_capacity);
        (ctx.clone(), TrackerNode::new(ctx, config, clock, registry))
    }
    
    #[derive(Default)]
    struct CaptureSink {
        frames: Vec<Frame>,
    }
    
    impl FrameSink for CaptureSink {
        fn show(&mut self, frame: &Frame) {
            self.frames.push(frame.clone());
        }
    }
    
    #[test]
    fn test_config_default() {
        let config = TrackerConfig::default();
        assert_eq!(config.buffer_capacity, 128);
        assert_eq!(config.clock_correction_threshold_ms, 100_000);
        assert_eq!(config.ingest_interval, Duration::from_secs(1));
        assert_eq!(config.render_rate_hz, 60);
        assert!(config.frame_period() < Duration::from_millis(17));
    }
    
    #[test]
    fn test_single_car_scenario() {
        let (ctx, node) = node_at(0, &[RosterEntry::new(1, "AAA")]);
        
        node.ingest_batch(&[LocationDto::new(1, 10.0, 0), LocationDto::new(1, 20.0, 1_000)]);
        
        ctx.advance(Duration::from_millis(500));
        let positions = node.positions();
        assert_relative_eq!(positions[0].position.unwrap(), 15.0);
        
        node.ingest_batch(&[LocationDto::new(1, 30.0, 2_000)]);
        
        ctx.advance(Duration::from_millis(2_000));
        assert_eq!(node.clock().now_ms(), 2_500);
        assert_eq!(node.positions()[0].position, Some(30.0));
    }
    
    #[test]
    fn test_ingest_routes_and_counts() {
        let (_ctx, node) = node_at(1_000, &[RosterEntry::new(1, "AAA"), RosterEntry::new(2, "BBB")]);
        
        let report = node.ingest_batch(&[
            LocationDto::new(1, 10.0, 2_000),
            LocationDto::new(1, 10.0, 2_000),
            LocationDto::new(2, 50.0, 2_000),
            LocationDto::new(2, 49.0, 500),
            LocationDto::new(7, 1.0, 2_000),
            LocationDto::new(2, f64::INFINITY, 2_000),
        ]);
        
        assert_eq!(report.inserted, 2);
        assert_eq!(report.duplicate, 1);
        assert_eq!(report.stale, 1);
        assert_eq!(report.unknown_car, 1);
        assert_eq!(report.invalid, 1);
        assert_eq!(report.total(), 6);
        
        assert_eq!(node.registry().lookup(DriverNumber(1)).unwrap().buffered(), 1);
        assert_eq!(node.stats().totals().batches, 1);
    }
    
    #[test]
    fn test_buffer_full_reported_not_fatal() {
        let ctx = ManualContext::shared();
        let config = TrackerConfig { buffer_capacity: 2, ..TrackerConfig::default() };
        let clock = TimeSource::with_epoch(ctx.clone(), 0, config.clock_correction_threshold_ms);
        let registry = CarRegistry::load(&[RosterEntry::new(1, "AAA")], 4, config.buffer_capacity);
        let node = TrackerNode::new(ctx, config, clock, registry);
        
        let report = node.ingest_batch(&[
            LocationDto::new(1, 1.0, 100),
            LocationDto::new(1, 2.0, 200),
            LocationDto::new(1, 3.0, 300),
        ]);
        
        assert_eq!(report.inserted, 2);
        assert_eq!(report.full, 1);
    }
    
    #[test]
    fn test_replayed_batch_corrects_clock_once() {
        // Local clock says 2024, the feed is replaying a race from 2023
        let (ctx, node) = node_at(1_704_067_200_000, &[RosterEntry::new(1, "AAA")]);
        let replay = 1_690_000_000_000u64;
        
        let report = node.ingest_batch(&[
            LocationDto::new(1, 20.0, replay + 1_000),
            LocationDto::new(1, 10.0, replay),
        ]);
        
        assert!(node.clock().is_corrected());
        assert_eq!(node.clock().now_ms(), replay);
        assert_eq!(report.inserted, 2);
        
        // Pruning moves the expired sample ahead of the newer one
        ctx.advance(Duration::from_millis(500));
        assert_relative_eq!(node.positions()[0].position.unwrap(), 15.0);
        
        ctx.advance(Duration::from_millis(600));
        assert_eq!(node.positions()[0].position, Some(20.0));
        
        // A later batch far in the future does not move the clock again
        node.ingest_batch(&[LocationDto::new(1, 30.0, replay + 10_000_000)]);
        assert_eq!(node.clock().now_ms(), replay + 1_100);
    }
    
    #[test]
    fn test_garbage_timestamp_does_not_capture_clock() {
        let (ctx, node) = node_at(0, &[RosterEntry::new(1, "AAA")]);
        
        node.ingest_batch(&[LocationDto::new(1, 10.0, u64::MAX - 5)]);
        assert!(!node.clock().is_corrected());
        
        ctx.advance(Duration::from_millis(10));
        assert_eq!(node.clock().now_ms(), 10);
        assert_eq!(node.positions().len(), 1);
        
        // The latch is still open for a real replay
        let replay = 1_690_000_000_000u64;
        node.ingest_batch(&[LocationDto::new(1, 20.0, replay)]);
        assert!(node.clock().is_corrected());
        assert_eq!(node.clock().now_ms(), replay);
    }
    
    #[test]
    fn test_render_once_paints_frame() {
        let red = Rgb::new(255, 0, 0);
        let (_ctx, node) = node_at(0, &[
            RosterEntry::new(1, "AAA").with_color(red),
            RosterEntry::new(2, "BBB"),
        ]);
        node.ingest_batch(&[LocationDto::new(1, 25.0, 0)]);
        
        let mut sink = CaptureSink::default();
        let placed = node.render_once(&StripRenderer::new(8), &mut sink);
        
        assert_eq!(placed, 1);
        assert_eq!(sink.frames.len(), 1);
        assert_eq!(sink.frames[0].lit().collect::<Vec<_>>(), vec![(2, red)]);
    }
    
    #[tokio::test]
    async fn test_bootstrap_retries_until_roster_arrives() {
        let ctx = ManualContext::shared();
        let feed = ScriptedFeed::new()
            .roster_failures(2)
            .empty_rosters(1)
            .with_roster(vec![RosterEntry::new(16, "LEC")]);
        
        let node = TrackerNode::bootstrap(
            ctx.clone(),
            TrackerConfig::default(),
            &feed,
            &FixedAuthority::ok(1_704_067_200_000),
        )
        .await;
        
        assert_eq!(node.registry().len(), 1);
        assert_eq!(feed.roster_calls(), 4);
        // Three one-second retry sleeps on the virtual clock
        assert_eq!(ctx.now(), Duration::from_secs(3));
        assert_eq!(node.clock().now_ms(), 1_704_067_203_000);
    }
    
    #[tokio::test]
    async fn test_ingest_once_surfaces_fetch_error() {
        let (_ctx, node) = node_at(0, &[RosterEntry::new(1, "AAA")]);
        let feed = ScriptedFeed::new()
            .push_batch(Err(EnvError::Timeout(5_000)))
            .push_batch(Ok(vec![LocationDto::new(1, 5.0, 10)]));
        
        assert!(matches!(node.ingest_once(&feed).await, Err(TrackError::Env(_))));
        assert_eq!(node.ingest_once(&feed).await.unwrap().inserted, 1);
    }
    
    #[tokio::test]
    async fn test_ingest_cycle_counts_failures() {
        let (_ctx, node) = node_at(0, &[RosterEntry::new(1, "AAA")]);
        let feed = ScriptedFeed::new()
            .push_batch(Err(EnvError::network("reset by peer")))
            .push_batch(Ok(vec![LocationDto::new(1, 5.0, 10)]));
        
        assert!(node.ingest_cycle(&feed).await.is_none());
        assert!(node.ingest_cycle(&feed).await.is_some());
        
        let totals = node.stats().totals();
        assert_eq!(totals.fetch_failures, 1);
        assert_eq!(totals.batches, 1);
        assert_eq!(totals.samples.inserted, 1);
    }
}
