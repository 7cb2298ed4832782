//! Immutable roster of tracked cars.

use laplight_env::{DriverNumber, RosterEntry};
use std::collections::HashMap;
use tracing::warn;

use crate::car::Car;
use crate::error::TrackError;

/// Default upper bound on roster size
pub const DEFAULT_MAX_CARS: usize = 32;

/// Fixed set of cars keyed by race number, built once at startup.
///
/// No lock: after `load` the registry is only ever read, and each car
/// guards its own mutable state.
#[derive(Debug)]
pub struct CarRegistry {
    /// Cars in roster order
    cars: Vec<Car>,
    
    index: HashMap<DriverNumber, usize>,
}

impl CarRegistry {
    /// Builds the registry from a roster.
    ///
    /// Repeated numbers keep their first entry; entries past `max_cars`
    /// are dropped. Both are logged.
    pub fn load(roster: &[RosterEntry], max_cars: usize, buffer_capacity: usize) -> Self {
        let mut cars = Vec::with_capacity(roster.len().min(max_cars));
        let mut index = HashMap::with_capacity(cars.capacity());
        
        for entry in roster {
            if index.contains_key(&entry.driver_number) {
                warn!("duplicate roster entry for {}, keeping the first", entry.driver_number);
                continue;
            }
            if cars.len() >= max_cars {
                warn!("roster exceeds {} cars, dropping {} {}", max_cars, entry.driver_number, entry.name);
                continue;
            }
            index.insert(entry.driver_number, cars.len());
            cars.push(Car::new(entry, buffer_capacity));
        }
        
        Self { cars, index }
    }
    
    /// Finds a car by number.
    pub fn lookup(&self, number: DriverNumber) -> Result<&Car, TrackError> {
        self.index
            .get(&number)
            .map(|&idx| &self.cars[idx])
            .ok_or(TrackError::UnknownCar(number))
    }
    
    /// Cars in roster order.
    pub fn iter(&self) -> impl Iterator<Item = &Car> {
        self.cars.iter()
    }
    
    pub fn len(&self) -> usize {
        self.cars.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.cars.is_empty()
    }
}
