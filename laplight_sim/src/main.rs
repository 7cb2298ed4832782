//! LapLight Simulator CLI
//!
//! Run deterministic race simulations against the tracking core.

use clap::Parser;
use laplight_sim::scenarios::ScenarioId;
use laplight_sim::{ScenarioResult, ScenarioRunner};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Frames sampled into an export: 4 per simulated second at 60 Hz
const EXPORT_EVERY_TICKS: u64 = 15;

/// LapLight deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "laplight-sim")]
#[command(about = "Run deterministic race simulations for LapLight", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,
    
    /// Number of cars on the grid
    #[arg(short, long, default_value = "10")]
    cars: usize,
    
    /// Scenario to run (steady, reordered, flaky_network, replayed_clock, roster_outage, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,
    
    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,
    
    /// Render loop duration in seconds
    #[arg(short, long, default_value = "30")]
    duration: f64,
    
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
    
    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
    
    /// Export sampled frames of a single scenario to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn main() {
    let args = Args::parse();
    
    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
    
    if !args.json {
        info!("LapLight Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
    
    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: steady, reordered, flaky_network, replayed_clock, roster_outage, all");
            std::process::exit(1);
        })]
    };
    
    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default()
    } else {
        args.seed
    };
    
    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }
        
        let runner = ScenarioRunner::new(base_seed, args.cars).with_duration(args.duration);
        let (result, export) = runner.run_with_export(scenarios[0], EXPORT_EVERY_TICKS);
        
        match export.write_to_file(export_path) {
            Ok(()) => info!("Exported {} frames to {}", export.frames.len(), export_path),
            Err(e) => error!("Failed to write export: {:?}", e),
        }
        
        if result.passed {
            info!("✓ {} (seed={}) PASSED", scenarios[0].name(), base_seed);
        } else {
            error!(
                "✗ {} FAILED: {}",
                scenarios[0].name(),
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
            std::process::exit(1);
        }
        return;
    }
    
    // Track results
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;
    
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed, args.cars).with_duration(args.duration);
        
        for scenario in &scenarios {
            let result = runner.run(*scenario);
            
            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
            
            if !result.passed {
                failed_count += 1;
            }
            
            all_results.push(result);
        }
    }
    
    // Summary
    let total = all_results.len();
    let passed = total - failed_count;
    
    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "cars": r.car_count,
                    "failure_reason": r.failure_reason,
                    "metrics": r.metrics,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to encode summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        
        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            
            for result in &all_results {
                if !result.passed {
                    error!(
                        "  - {} seed={}: {}",
                        result.scenario.name(),
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }
    
    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
