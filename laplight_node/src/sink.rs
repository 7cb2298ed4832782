//! Frame sink that reports the strip through the log.

use laplight_core::{Frame, FrameSink};
use laplight_env::Rgb;
use tracing::trace;

/// Logs occupied cells whenever the strip picture changes.
#[derive(Debug, Default)]
pub struct LogSink {
    frames: u64,
    occupied: Vec<(usize, Rgb)>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
    
    /// Frames shown so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
    
    /// Lit cells of the latest frame.
    pub fn occupied(&self) -> &[(usize, Rgb)] {
        &self.occupied
    }
}

impl FrameSink for LogSink {
    fn show(&mut self, frame: &Frame) {
        self.frames += 1;
        
        let occupied: Vec<_> = frame.lit().collect();
        if occupied != self.occupied {
            let cells: Vec<String> = occupied
                .iter()
                .map(|(idx, rgb)| format!("{}:{}", idx, rgb))
                .collect();
            trace!("frame {}: {}/{} cells lit [{}]", self.frames, occupied.len(), frame.len(), cells.join(" "));
            self.occupied = occupied;
        }
    }
}
