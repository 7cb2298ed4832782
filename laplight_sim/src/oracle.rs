//! Ground truth oracle for simulation.
//!
//! The oracle holds the "God's eye view" of the race: every car follows
//! an analytic lap model, so its exact lap position is known at any
//! dataset instant.

use laplight_env::{DriverNumber, LocationDto, RosterEntry, Rgb};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use laplight_core::TRACK_LENGTH;

/// Grid used to populate simulated rosters: number, acronym, team colour.
const GRID: &[(u16, &str, Rgb)] = &[
    (1, "VER", Rgb::new(0x36, 0x71, 0xC6)),
    (16, "LEC", Rgb::new(0xE8, 0x00, 0x20)),
    (44, "HAM", Rgb::new(0x27, 0xF4, 0xD2)),
    (4, "NOR", Rgb::new(0xFF, 0x80, 0x00)),
    (14, "ALO", Rgb::new(0x22, 0x99, 0x71)),
    (63, "RUS", Rgb::new(0x27, 0xF4, 0xD2)),
    (55, "SAI", Rgb::new(0xE8, 0x00, 0x20)),
    (81, "PIA", Rgb::new(0xFF, 0x80, 0x00)),
    (11, "PER", Rgb::new(0x36, 0x71, 0xC6)),
    (18, "STR", Rgb::new(0x22, 0x99, 0x71)),
    (10, "GAS", Rgb::new(0xFF, 0x87, 0xBC)),
    (31, "OCO", Rgb::new(0xFF, 0x87, 0xBC)),
    (23, "ALB", Rgb::new(0x64, 0xC4, 0xFF)),
    (2, "SAR", Rgb::new(0x64, 0xC4, 0xFF)),
    (22, "TSU", Rgb::new(0x66, 0x92, 0xFF)),
    (3, "RIC", Rgb::new(0x66, 0x92, 0xFF)),
    (27, "HUL", Rgb::new(0xB6, 0xBA, 0xBD)),
    (20, "MAG", Rgb::new(0xB6, 0xBA, 0xBD)),
    (77, "BOT", Rgb::new(0x52, 0xE2, 0x52)),
    (24, "ZHO", Rgb::new(0x52, 0xE2, 0x52)),
];

const MEAN_LAP_MS: f64 = 80_000.0;
const LAP_SPREAD_MS: f64 = 1_500.0;

/// Largest roster the oracle can field.
pub const MAX_SIM_CARS: usize = GRID.len();

/// Lap model of one simulated car.
///
/// `position(t) = phase + 100·t/lap_ms + wobble_amplitude·sin(2π·t/wobble_period_ms + wobble_phase)`,
/// taken modulo the track length, with `t` measured from the race origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarProfile {
    pub number: DriverNumber,
    pub name: String,
    pub color: Rgb,
    
    /// Mean lap time (milliseconds)
    pub lap_ms: f64,
    
    /// Position at the race origin (0-100)
    pub phase: f64,
    
    /// Peak deviation from the mean pace (track percent)
    pub wobble_amplitude: f64,
    
    /// Period of the pace variation (milliseconds)
    pub wobble_period_ms: f64,
    
    pub wobble_phase: f64,
}

impl CarProfile {
    /// Exact lap position `elapsed_ms` after the race origin.
    pub fn position_after(&self, elapsed_ms: f64) -> f64 {
        let laps = TRACK_LENGTH * elapsed_ms / self.lap_ms;
        let wobble = self.wobble_amplitude
            * (TAU * elapsed_ms / self.wobble_period_ms + self.wobble_phase).sin();
        let position = (self.phase + laps + wobble).rem_euclid(TRACK_LENGTH);
        // rem_euclid of a tiny negative rounds up to the track length
        if position >= TRACK_LENGTH {
            0.0
        } else {
            position
        }
    }
}

/// The Oracle - ground truth lap positions for every simulated car.
pub struct TrackOracle {
    /// Seed the profiles were drawn from
    physics_seed: u64,
    
    /// Dataset time (Unix ms) of the race origin
    origin_ms: u64,
    
    cars: Vec<CarProfile>,
}

impl TrackOracle {
    /// Creates an oracle with `num_cars` cars drawn from `physics_seed`.
    ///
    /// Lap times are ~80 s with a small spread and the pace variation is
    /// bounded so no car ever drives backwards.
    pub fn new(physics_seed: u64, num_cars: usize, origin_ms: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(physics_seed);
        
        let lap_time = Normal::new(MEAN_LAP_MS, LAP_SPREAD_MS).ok();
        let period = Uniform::new(15_000.0, 30_000.0);
        let amplitude = Uniform::new(0.0, 1.5);
        
        let cars = GRID
            .iter()
            .take(num_cars.min(MAX_SIM_CARS))
            .map(|(number, name, color)| CarProfile {
                number: DriverNumber(*number),
                name: (*name).to_string(),
                color: *color,
                lap_ms: lap_time
                    .as_ref()
                    .map_or(MEAN_LAP_MS, |dist| dist.sample(&mut rng))
                    .clamp(75_000.0, 90_000.0),
                phase: rng.gen_range(0.0..TRACK_LENGTH),
                wobble_amplitude: amplitude.sample(&mut rng),
                wobble_period_ms: period.sample(&mut rng),
                wobble_phase: rng.gen_range(0.0..TAU),
            })
            .collect();
        
        Self {
            physics_seed,
            origin_ms,
            cars,
        }
    }
    
    pub fn physics_seed(&self) -> u64 {
        self.physics_seed
    }
    
    pub fn origin_ms(&self) -> u64 {
        self.origin_ms
    }
    
    pub fn cars(&self) -> &[CarProfile] {
        &self.cars
    }
    
    /// The roster a feed would publish for this race.
    pub fn roster(&self) -> Vec<RosterEntry> {
        self.cars
            .iter()
            .map(|car| RosterEntry::new(car.number.0, &car.name).with_color(car.color))
            .collect()
    }
    
    /// True position of `number` at dataset time `at_ms`.
    pub fn position_at(&self, number: DriverNumber, at_ms: u64) -> Option<f64> {
        self.cars
            .iter()
            .find(|car| car.number == number)
            .map(|car| car.position_after(self.elapsed_ms(at_ms)))
    }
    
    /// One exact sample per car, all stamped `at_ms`.
    pub fn samples_at(&self, at_ms: u64) -> impl Iterator<Item = LocationDto> + '_ {
        let elapsed = self.elapsed_ms(at_ms);
        self.cars
            .iter()
            .map(move |car| LocationDto::new(car.number.0, car.position_after(elapsed), at_ms))
    }
    
    fn elapsed_ms(&self, at_ms: u64) -> f64 {
        at_ms as f64 - self.origin_ms as f64
    }
}
