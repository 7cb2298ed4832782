//! JSON exporter for offline inspection of a run.
//!
//! Exports sampled frames: per car, the true position, the node's
//! estimate and the LED cell it lit.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;

/// A single sampled frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    /// Virtual time since the render loop started (seconds)
    pub time_sec: f64,
    
    /// Node clock reading (Unix ms)
    pub clock_ms: u64,
    
    pub cars: Vec<CarFrame>,
    
    /// Number of lit LED cells
    pub lit_cells: usize,
}

/// One car in a frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarFrame {
    pub number: u16,
    pub truth: f64,
    
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<f64>,
    
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell: Option<usize>,
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,
    
    /// Seed used
    pub seed: u64,
    
    /// Duration in seconds
    pub duration_sec: f64,
    
    /// All frames
    pub frames: Vec<SimFrame>,
    
    /// Final results
    pub passed: bool,
    
    /// Worst tracking error seen after warm-up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_error: Option<f64>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            max_error: None,
        }
    }
    
    /// Adds a frame.
    pub fn add_frame(&mut self, frame: SimFrame) {
        self.duration_sec = frame.time_sec;
        self.frames.push(frame);
    }
    
    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, max_error: Option<f64>) {
        self.passed = passed;
        self.max_error = max_error;
    }
    
    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
