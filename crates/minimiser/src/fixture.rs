//! Scripted forecast source and data builders shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use carbon_client::ForecastSource;
use common::{
    half_hour_slots, ForecastPoint, ForecastSeries, FuelMix, IntensityIndex, IntensityReading,
    Region,
};

/// Offset label for slot `i`: slot 0 is `+00:30`, slot 1 is `+01:00`, ...
pub fn slot_label(i: usize) -> String {
    let minutes = (i + 1) * 30;
    format!("+{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Half-hourly series with the given forecasts and offset labels.
pub fn series(values: &[f64]) -> ForecastSeries {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| ForecastPoint {
            time: slot_label(i),
            forecast: *v,
            index: IntensityIndex::Moderate,
        })
        .collect()
}

pub fn reading(forecast: f64) -> IntensityReading {
    IntensityReading {
        forecast,
        index: IntensityIndex::Moderate,
    }
}

/// In-memory source; anything not scripted comes back absent.
#[derive(Default)]
pub struct ScriptedSource {
    pub intensities: HashMap<Region, IntensityReading>,
    pub mixes: HashMap<Region, FuelMix>,
    pub series: HashMap<Region, ForecastSeries>,
    pub national: Option<ForecastSeries>,
    pub calls: AtomicUsize,
    pub requested_hours: Mutex<Vec<f64>>,
}

impl ScriptedSource {
    pub fn with_series(entries: &[(Region, &[f64])]) -> Self {
        Self {
            series: entries.iter().map(|(r, v)| (*r, series(v))).collect(),
            ..Self::default()
        }
    }

    pub fn with_intensities(entries: &[(Region, f64)]) -> Self {
        Self {
            intensities: entries.iter().map(|(r, v)| (*r, reading(*v))).collect(),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn upto(s: &ForecastSeries, hours: f64) -> ForecastSeries {
        s.iter().take(half_hour_slots(hours) + 1).cloned().collect()
    }
}

#[async_trait]
impl ForecastSource for ScriptedSource {
    async fn current_national_intensity(&self) -> Option<IntensityReading> {
        self.tick();
        self.national
            .as_ref()
            .and_then(|s| s.first())
            .map(|p| reading(p.forecast))
    }

    async fn current_national_mix(&self) -> Option<FuelMix> {
        self.tick();
        None
    }

    async fn current_region_intensity(&self, region: Region) -> Option<IntensityReading> {
        self.tick();
        self.intensities.get(&region).cloned()
    }

    async fn current_region_mix(&self, region: Region) -> Option<FuelMix> {
        self.tick();
        self.mixes.get(&region).cloned()
    }

    async fn national_forecast_single(&self, hours: f64) -> Option<ForecastPoint> {
        self.tick();
        self.national
            .as_ref()
            .and_then(|s| s.get(half_hour_slots(hours)).cloned())
    }

    async fn national_forecast_range(&self, hours: f64) -> Option<ForecastSeries> {
        self.tick();
        self.national.as_ref().map(|s| Self::upto(s, hours))
    }

    async fn region_forecast_single(&self, region: Region, hours: f64) -> Option<ForecastPoint> {
        self.tick();
        self.series
            .get(&region)
            .and_then(|s| s.get(half_hour_slots(hours)).cloned())
    }

    async fn region_forecast_range(&self, region: Region, hours: f64) -> Option<ForecastSeries> {
        self.tick();
        if let Ok(mut requested) = self.requested_hours.lock() {
            requested.push(hours);
        }
        self.series.get(&region).map(|s| Self::upto(s, hours))
    }

    async fn health_status(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
