//! Scenario runner - drives a tracker node through a simulated race.
//!
//! The runner owns the virtual clock. Bootstrap runs with the node's own
//! retry sleeps advancing time; after that every render tick moves time
//! forward by one frame and every `ingest_interval` worth of ticks pulls
//! one batch from the feed.

use crate::context::SimContext;
use crate::exporter::{CarFrame, SimExport, SimFrame};
use crate::feed::SimFeed;
use crate::oracle::TrackOracle;
use crate::scenarios::ScenarioId;

use laplight_core::{
    cell_index, circular_distance, Frame, FrameSink, StripRenderer, TrackerConfig, TrackerNode,
};
use laplight_env::DriverNumber;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,
    
    /// Seed used
    pub seed: u64,
    
    /// Whether scenario passed all assertions
    pub passed: bool,
    
    /// Render ticks executed
    pub total_ticks: u64,
    
    /// Virtual time at the end of the run (seconds, bootstrap included)
    pub final_time_secs: f64,
    
    /// Cars on the loaded roster
    pub car_count: usize,
    
    /// Failure message if any
    pub failure_reason: Option<String>,
    
    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Roster fetches until one succeeded
    pub roster_attempts: u64,
    
    /// Whether the node clock snapped onto the feed's timeline
    pub clock_corrected: bool,
    
    /// Location batches ingested
    pub batches: u64,
    
    /// Location fetches that failed
    pub fetch_failures: u64,
    
    pub samples_inserted: u64,
    pub samples_duplicate: u64,
    pub samples_stale: u64,
    
    /// Position comparisons made after warm-up
    pub comparisons: u64,
    
    /// Worst circular distance between estimate and truth (track percent)
    pub max_error: f64,
    
    /// Mean circular distance between estimate and truth (track percent)
    pub mean_error: f64,
    
    /// Car-ticks without a position after warm-up
    pub unavailable_ticks: u64,
    
    /// Times a car went from having a position back to none
    pub availability_regressions: u64,
    
    /// Frames handed to the strip
    pub frames_rendered: u64,
}

/// Counts frames and remembers the latest one.
#[derive(Default)]
struct FrameRecorder {
    frames: u64,
    last: Option<Frame>,
}

impl FrameSink for FrameRecorder {
    fn show(&mut self, frame: &Frame) {
        self.frames += 1;
        self.last = Some(frame.clone());
    }
}

/// Runs simulated races.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,
    
    /// Number of cars on the grid
    num_cars: usize,
    
    /// Render rate in Hz
    tick_rate_hz: u32,
    
    /// Render loop duration in seconds
    max_duration_secs: f64,
    
    /// Time after the render loop starts before errors count
    warmup_secs: f64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_cars: usize) -> Self {
        Self {
            seed,
            num_cars,
            tick_rate_hz: 60,
            max_duration_secs: 30.0,
            warmup_secs: 5.0,
        }
    }
    
    /// Sets the tick rate.
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate_hz = hz.max(1);
        self
    }
    
    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.max_duration_secs = secs;
        self
    }
    
    /// Sets the warm-up period.
    pub fn with_warmup(mut self, secs: f64) -> Self {
        self.warmup_secs = secs;
        self
    }
    
    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.block_on(scenario, None)
    }
    
    /// Runs a scenario, sampling every `export_every` ticks into an export.
    pub fn run_with_export(&self, scenario: ScenarioId, export_every: u64) -> (ScenarioResult, SimExport) {
        let mut export = SimExport::new(scenario.name(), self.seed);
        let result = self.block_on(scenario, Some((&mut export, export_every.max(1))));
        export.finalize(result.passed, Some(result.metrics.max_error));
        (result, export)
    }
    
    fn block_on(&self, scenario: ScenarioId, export: Option<(&mut SimExport, u64)>) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        
        match tokio::runtime::Builder::new_current_thread().build() {
            Ok(runtime) => runtime.block_on(self.execute(scenario, export)),
            Err(e) => ScenarioResult {
                scenario,
                seed: self.seed,
                passed: false,
                total_ticks: 0,
                final_time_secs: 0.0,
                car_count: 0,
                failure_reason: Some(format!("runtime: {}", e)),
                metrics: ScenarioMetrics::default(),
            },
        }
    }
    
    async fn execute(
        &self,
        scenario: ScenarioId,
        mut export: Option<(&mut SimExport, u64)>,
    ) -> ScenarioResult {
        let profile = scenario.profile();
        debug!("{}: {}", scenario.name(), scenario.description());
        
        // Separate streams so fault injection never perturbs the race itself
        let physics_seed = self.seed.wrapping_mul(0x9e3779b97f4a7c15);
        let network_seed = self.seed ^ 0x5eed_f00d;
        
        let context = Arc::new(SimContext::with_epoch(self.seed, profile.local_epoch));
        let oracle = Arc::new(TrackOracle::new(
            physics_seed,
            self.num_cars,
            profile.feed.dataset_epoch_ms,
        ));
        let feed = SimFeed::new(context.clone(), oracle.clone(), profile.feed.clone(), network_seed);
        
        let config = TrackerConfig {
            render_rate_hz: self.tick_rate_hz,
            ..TrackerConfig::default()
        };
        let ingest_every = ((config.ingest_interval.as_secs_f64() * self.tick_rate_hz as f64).round() as u64).max(1);
        
        let node = TrackerNode::bootstrap(context.clone(), config, &feed, &feed).await;
        let renderer = StripRenderer::new(node.config().led_count);
        let mut recorder = FrameRecorder::default();
        
        let mut metrics = ScenarioMetrics {
            roster_attempts: feed.roster_calls(),
            ..ScenarioMetrics::default()
        };
        let mut error_sum = 0.0;
        let mut available: HashSet<DriverNumber> = HashSet::new();
        
        let start_ns = context.time_ns();
        let hz = self.tick_rate_hz as u64;
        let target_ticks = (self.max_duration_secs * self.tick_rate_hz as f64) as u64;
        let warmup_ticks = (self.warmup_secs * self.tick_rate_hz as f64) as u64;
        
        for tick in 0..target_ticks {
            context.set_time(start_ns + tick * 1_000_000_000 / hz);
            
            if tick % ingest_every == 0 {
                node.ingest_cycle(&feed).await;
            }
            
            node.render_once(&renderer, &mut recorder);
            
            let now_ms = node.clock().now_ms();
            let positions = node.positions_at(now_ms);
            let mut cars = Vec::with_capacity(positions.len());
            
            for car in &positions {
                let truth = oracle.position_at(car.number, now_ms).unwrap_or(0.0);
                
                match car.position {
                    Some(estimate) => {
                        available.insert(car.number);
                        if tick >= warmup_ticks {
                            let error = circular_distance(estimate, truth);
                            metrics.comparisons += 1;
                            metrics.max_error = metrics.max_error.max(error);
                            error_sum += error;
                        }
                    }
                    None => {
                        if available.contains(&car.number) {
                            metrics.availability_regressions += 1;
                        }
                        if tick >= warmup_ticks {
                            metrics.unavailable_ticks += 1;
                        }
                    }
                }
                
                cars.push(CarFrame {
                    number: car.number.0,
                    truth,
                    estimate: car.position,
                    cell: car.position.map(|p| cell_index(p, renderer.cells())),
                });
            }
            
            if let Some((export, every)) = export.as_mut() {
                if tick % *every == 0 {
                    export.add_frame(SimFrame {
                        time_sec: tick as f64 / self.tick_rate_hz as f64,
                        clock_ms: now_ms,
                        cars,
                        lit_cells: recorder.last.as_ref().map_or(0, |f| f.lit().count()),
                    });
                }
            }
            
            if tick % (hz * 5) == 0 {
                debug!(
                    "  t={:.1}s | clock={} | max_err={:.3}",
                    tick as f64 / self.tick_rate_hz as f64,
                    now_ms,
                    metrics.max_error
                );
            }
        }
        
        let totals = node.stats().totals();
        metrics.clock_corrected = node.clock().is_corrected();
        metrics.batches = totals.batches;
        metrics.fetch_failures = totals.fetch_failures;
        metrics.samples_inserted = totals.samples.inserted;
        metrics.samples_duplicate = totals.samples.duplicate;
        metrics.samples_stale = totals.samples.stale;
        metrics.frames_rendered = recorder.frames;
        if metrics.comparisons > 0 {
            metrics.mean_error = error_sum / metrics.comparisons as f64;
        }
        
        let failure_reason = if metrics.comparisons == 0 {
            Some("no positions compared after warm-up".to_string())
        } else if metrics.availability_regressions > 0 {
            Some(format!("{} cars lost their position", metrics.availability_regressions))
        } else if metrics.unavailable_ticks > 0 {
            Some(format!("{} car-ticks without a position", metrics.unavailable_ticks))
        } else if metrics.max_error >= profile.max_error {
            Some(format!(
                "max error {:.3} exceeds threshold {:.1}",
                metrics.max_error, profile.max_error
            ))
        } else {
            None
        };
        let passed = failure_reason.is_none();
        
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("  {} RESULTS:", scenario.name().to_uppercase());
        info!("    Max error: {:.3} (target < {:.1})", metrics.max_error, profile.max_error);
        info!("    Mean error: {:.4}", metrics.mean_error);
        info!(
            "    Batches: {} ok, {} failed | clock corrected: {}",
            metrics.batches, metrics.fetch_failures, metrics.clock_corrected
        );
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if !passed {
            warn!("{} failed: {}", scenario.name(), failure_reason.as_deref().unwrap_or("unknown"));
        }
        
        ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            total_ticks: target_ticks,
            final_time_secs: context.time_ns() as f64 / 1e9,
            car_count: node.registry().len(),
            failure_reason,
            metrics,
        }
    }
}
