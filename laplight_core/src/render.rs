//! LED strip mapping.
//!
//! Maps each car's lap position onto one of `n` discrete cells. Driving
//! the physical strip (double-buffering, refresh, device I/O) lives behind
//! the `FrameSink` trait.

use laplight_env::{DriverNumber, Rgb};
use serde::Serialize;

use crate::laplight_interp::TRACK_LENGTH;

/// Default number of cells on the strip
pub const DEFAULT_LED_COUNT: usize = 100;

/// `clamp(floor(position / 100 * cells), 0, cells - 1)`
pub fn cell_index(position: f64, cells: usize) -> usize {
    if cells == 0 {
        return 0;
    }
    
    let raw = (position / TRACK_LENGTH * cells as f64).floor();
    if raw <= 0.0 || raw.is_nan() {
        0
    } else {
        (raw as usize).min(cells - 1)
    }
}

/// One car's resolved position at a render instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarPosition {
    pub number: DriverNumber,
    pub color: Option<Rgb>,
    
    /// `None` means nothing renderable yet
    pub position: Option<f64>,
}

/// A rendered strip: one optional colour per cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    cells: Vec<Option<Rgb>>,
}

impl Frame {
    pub fn blank(cells: usize) -> Self {
        Self { cells: vec![None; cells] }
    }
    
    pub fn cells(&self) -> &[Option<Rgb>] {
        &self.cells
    }
    
    /// Lit cells as `(index, colour)`.
    pub fn lit(&self) -> impl Iterator<Item = (usize, Rgb)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(idx, cell)| cell.map(|rgb| (idx, rgb)))
    }
    
    pub fn len(&self) -> usize {
        self.cells.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Turns position snapshots into frames for a fixed-size strip.
#[derive(Debug, Clone)]
pub struct StripRenderer {
    cells: usize,
}

impl StripRenderer {
    /// A zero-length strip is bumped to one cell.
    pub fn new(cells: usize) -> Self {
        Self { cells: cells.max(1) }
    }
    
    pub fn cells(&self) -> usize {
        self.cells
    }
    
    /// Later cars overwrite earlier ones sharing a cell; Unavailable cars
    /// are skipped and cars without a colour draw white.
    pub fn render(&self, positions: &[CarPosition]) -> Frame {
        let mut frame = Frame::blank(self.cells);
        
        for car in positions {
            if let Some(position) = car.position {
                let idx = cell_index(position, self.cells);
                frame.cells[idx] = Some(car.color.unwrap_or(Rgb::WHITE));
            }
        }
        
        frame
    }
}

/// The output device seam.
pub trait FrameSink: Send {
    /// Pushes a finished frame to the device.
    fn show(&mut self, frame: &Frame);
}

#[cfg(test)]
mod tests {
    use super::*;
    
    fn at(number: u16, position: Option<f64>, color: Option<Rgb>) -> CarPosition {
        CarPosition {
            number: DriverNumber(number),
            color,
            position,
        }
    }
    
    #[test]
    fn test_cell_index_mapping() {
        assert_eq!(cell_index(0.0, 60), 0);
        assert_eq!(cell_index(50.0, 60), 30);
        assert_eq!(cell_index(99.999, 60), 59);
        assert_eq!(cell_index(100.0, 60), 59);
        assert_eq!(cell_index(-3.0, 60), 0);
        assert_eq!(cell_index(f64::NAN, 60), 0);
        assert_eq!(cell_index(42.0, 0), 0);
    }
    
    #[test]
    fn test_render_places_cars() {
        let red = Rgb::new(255, 0, 0);
        let renderer = StripRenderer::new(10);
        
        let frame = renderer.render(&[
            at(1, Some(15.0), Some(red)),
            at(2, None, Some(red)),
            at(3, Some(95.0), None),
        ]);
        
        let lit: Vec<(usize, Rgb)> = frame.lit().collect();
        assert_eq!(lit, vec![(1, red), (9, Rgb::WHITE)]);
        assert_eq!(frame.len(), 10);
    }
    
    #[test]
    fn test_shared_cell_last_car_wins() {
        let red = Rgb::new(255, 0, 0);
        let blue = Rgb::new(0, 0, 255);
        let frame = StripRenderer::new(4).render(&[
            at(1, Some(30.0), Some(red)),
            at(2, Some(40.0), Some(blue)),
        ]);
        
        assert_eq!(frame.cells()[1], Some(blue));
        assert_eq!(frame.lit().count(), 1);
    }
}
