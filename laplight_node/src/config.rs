//! Command-line configuration for the tracker node.

use clap::Parser;
use laplight_core::laplight_buffer::DEFAULT_BUFFER_CAPACITY;
use laplight_core::laplight_time::DEFAULT_CORRECTION_THRESHOLD_MS;
use laplight_core::TrackerConfig;
use laplight_env::DEFAULT_NTP_SERVER;
use std::time::Duration;

/// LapLight tracker node: live race positions on an LED strip
#[derive(Parser, Debug, Clone)]
#[command(name = "laplight-node")]
#[command(about = "Track live race positions and drive an LED strip", long_about = None)]
pub struct NodeConfig {
    /// Roster endpoint (JSON array of drivers)
    #[arg(long, default_value = "http://192.168.1.187:8080/drivers")]
    pub roster_url: String,
    
    /// Location endpoint (JSON batch of samples)
    #[arg(long, default_value = "http://192.168.1.187:8080/locations")]
    pub locations_url: String,
    
    /// SNTP server used once at boot
    #[arg(long, default_value = DEFAULT_NTP_SERVER)]
    pub ntp_server: String,
    
    /// Cells on the LED strip
    #[arg(long, default_value = "100")]
    pub led_count: usize,
    
    /// Render loop rate in Hz
    #[arg(long, default_value = "60")]
    pub render_hz: u32,
    
    /// Samples held per car
    #[arg(long, default_value_t = DEFAULT_BUFFER_CAPACITY)]
    pub buffer_capacity: usize,
    
    /// Drift (ms) that lets the first batch re-base the clock
    #[arg(long, default_value_t = DEFAULT_CORRECTION_THRESHOLD_MS)]
    pub correction_threshold_ms: u64,
    
    /// Per-request HTTP timeout in milliseconds
    #[arg(long, default_value = "5000")]
    pub fetch_timeout_ms: u64,
    
    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl NodeConfig {
    /// Tracker settings derived from the command line.
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            buffer_capacity: self.buffer_capacity,
            clock_correction_threshold_ms: self.correction_threshold_ms,
            render_rate_hz: self.render_hz.max(1),
            led_count: self.led_count.max(1),
            ..TrackerConfig::default()
        }
    }
    
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
