//! Wire types exchanged with the roster/location feeds.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a car: its race number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverNumber(pub u16);

impl fmt::Display for DriverNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A 24-bit display colour, exchanged as a `RRGGBB` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);
    
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl FromStr for Rgb {
    type Err = String;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("expected RRGGBB, got {:?}", s));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|e| format!("bad colour {:?}: {}", s, e))
        };
        Ok(Rgb::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One driver from the roster endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub driver_number: DriverNumber,
    
    /// Short display name (three-letter acronym on the live feed)
    #[serde(rename = "nameAcronym", alias = "name")]
    pub name: String,
    
    #[serde(rename = "teamColour", alias = "color", default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
}

impl RosterEntry {
    pub fn new(driver_number: u16, name: impl Into<String>) -> Self {
        Self {
            driver_number: DriverNumber(driver_number),
            name: name.into(),
            color: None,
        }
    }
    
    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = Some(color);
        self
    }
}

/// One timestamped position observation from the locations endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDto {
    pub driver_number: DriverNumber,
    
    /// Percentage of the lap, nominally in [0, 100)
    pub location: f64,
    
    /// Unix epoch milliseconds
    pub occurred_at: u64,
}

impl LocationDto {
    pub fn new(driver_number: u16, location: f64, occurred_at: u64) -> Self {
        Self {
            driver_number: DriverNumber(driver_number),
            location,
            occurred_at,
        }
    }
}

/// Body of the locations endpoint.
///
/// The live server wraps the list in `{"locations": [...]}`; replay tools
/// emit the bare array. Both decode to the same batch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LocationBatch {
    Wrapped { locations: Vec<LocationDto> },
    Bare(Vec<LocationDto>),
}

impl LocationBatch {
    pub fn into_locations(self) -> Vec<LocationDto> {
        match self {
            LocationBatch::Wrapped { locations } => locations,
            LocationBatch::Bare(locations) => locations,
        }
    }
}
