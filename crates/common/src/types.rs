//! Domain types shared across the minimiser.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Furthest look-ahead the upstream forecast supports, in hours.
pub const MAX_HORIZON_HOURS: f64 = 47.5;

/// Index of the last half-hour slot of a full forecast.
pub const MAX_SLOT_INDEX: usize = 95;

/// Converts an hour count into a half-hour slot count, capped at the
/// last available slot once the horizon reaches 48 hours.
pub fn half_hour_slots(hours: f64) -> usize {
    if hours < 48.0 {
        (hours * 2.0) as usize
    } else {
        MAX_SLOT_INDEX
    }
}

// ── Regions ───────────────────────────────────────────────────────────

/// Grid sub-regions published by the Carbon Intensity API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Region {
    NScotland,
    SScotland,
    NwEngland,
    NeEngland,
    Yorkshire,
    NWales,
    SWales,
    WMidlands,
    EMidlands,
    EEngland,
    SwEngland,
    SEngland,
    London,
    SeEngland,
    England,
    Scotland,
    Wales,
}

impl Region {
    pub const ALL: [Region; 17] = [
        Region::NScotland,
        Region::SScotland,
        Region::NwEngland,
        Region::NeEngland,
        Region::Yorkshire,
        Region::NWales,
        Region::SWales,
        Region::WMidlands,
        Region::EMidlands,
        Region::EEngland,
        Region::SwEngland,
        Region::SEngland,
        Region::London,
        Region::SeEngland,
        Region::England,
        Region::Scotland,
        Region::Wales,
    ];

    /// Upstream numeric region id.
    pub fn id(self) -> u8 {
        match self {
            Region::NScotland => 1,
            Region::SScotland => 2,
            Region::NwEngland => 3,
            Region::NeEngland => 4,
            Region::Yorkshire => 5,
            Region::NWales => 6,
            Region::SWales => 7,
            Region::WMidlands => 8,
            Region::EMidlands => 9,
            Region::EEngland => 10,
            Region::SwEngland => 11,
            Region::SEngland => 12,
            Region::London => 13,
            Region::SeEngland => 14,
            Region::England => 15,
            Region::Scotland => 16,
            Region::Wales => 17,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Region::NScotland => "N_SCOTLAND",
            Region::SScotland => "S_SCOTLAND",
            Region::NwEngland => "NW_ENGLAND",
            Region::NeEngland => "NE_ENGLAND",
            Region::Yorkshire => "YORKSHIRE",
            Region::NWales => "N_WALES",
            Region::SWales => "S_WALES",
            Region::WMidlands => "W_MIDLANDS",
            Region::EMidlands => "E_MIDLANDS",
            Region::EEngland => "E_ENGLAND",
            Region::SwEngland => "SW_ENGLAND",
            Region::SEngland => "S_ENGLAND",
            Region::London => "LONDON",
            Region::SeEngland => "SE_ENGLAND",
            Region::England => "ENGLAND",
            Region::Scotland => "SCOTLAND",
            Region::Wales => "WALES",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = Error;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Region::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == wanted)
            .ok_or_else(|| Error::UnknownRegion(s.trim().to_string()))
    }
}

// ── Intensity ─────────────────────────────────────────────────────────

/// Qualitative band the upstream attaches to every intensity value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntensityIndex {
    #[serde(rename = "very low")]
    VeryLow,
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "moderate")]
    Moderate,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "very high")]
    VeryHigh,
}

/// A single-point intensity value (gCO2/kWh) with its band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntensityReading {
    pub forecast: f64,
    pub index: IntensityIndex,
}

/// Fuel type → percentage of current generation.
pub type FuelMix = HashMap<String, f64>;

/// One half-hour slot of a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Start of the slot as reported upstream (e.g. `2026-10-18T12:30Z`).
    pub time: String,
    pub forecast: f64,
    pub index: IntensityIndex,
}

/// Chronologically ascending half-hour forecast points.
pub type ForecastSeries = Vec<ForecastPoint>;
