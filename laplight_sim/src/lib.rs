//! LapLight Deterministic Simulation Harness
//!
//! This crate provides a controlled race where a `TrackerNode` runs against
//! simulated collaborators and every rendered position can be checked
//! against ground truth.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: Virtual clock advanced tick by tick by the runner
//! - **Network**: Feed faults (loss, reordering, outages) drawn from a seed
//! - **Race**: Lap models derived from a separate physics seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                         │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimContext (virtual clock, local wall-clock epoch)   │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │                                                     │
//! │  ┌────▼────────┐   roster / batches   ┌─────────────┐       │
//! │  │ TrackerNode │◄─────────────────────│   SimFeed   │       │
//! │  └────┬────────┘   network time       └──────▲──────┘       │
//! │       │ positions                            │ samples      │
//! │  ┌────▼──────────────────────────────────────┴──────┐       │
//! │  │                 TrackOracle                      │       │
//! │  │        (ground truth lap positions)              │       │
//! │  └──────────────────────────────────────────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use laplight_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42, 10)
//!     .with_duration(30.0)
//!     .run(ScenarioId::FlakyNetwork);
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod feed;
mod oracle;
mod runner;
pub mod scenarios;

pub use context::{SimContext, DEFAULT_SIM_EPOCH_MS};
pub use exporter::{CarFrame, SimExport, SimFrame};
pub use feed::{FeedConfig, SimFeed};
pub use oracle::{CarProfile, TrackOracle, MAX_SIM_CARS};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
