//! Time and location selection over carbon-intensity forecasts.
//!
//! Every operation works the same whether the data comes from the published
//! snapshot or straight from the source; [`ForecastAccess`] picks which.

use std::ops::Range;
use std::sync::Arc;

use carbon_client::ForecastSource;
use common::{
    half_hour_slots, Error, ForecastPoint, ForecastSeries, IntensityIndex, IntensityReading,
    Region, MAX_HORIZON_HOURS,
};
use serde::Serialize;
use tracing::debug;

use crate::cache::SnapshotCache;

/// Where forecast data is read from.
#[derive(Clone)]
pub enum ForecastAccess {
    /// Published snapshot; fails with `CacheNotReady` before the first one.
    Cached(Arc<SnapshotCache>),
    /// One upstream call per location per query.
    Live(Arc<dyn ForecastSource>),
}

/// Hours-from-now interval a query is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    /// The whole stored forecast: slots 0 through 95 inclusive. The end is
    /// one slot past the last start time so its point is kept.
    pub const FULL: TimeRange = TimeRange {
        start: 0.0,
        end: MAX_HORIZON_HOURS + 0.5,
    };

    pub fn new(start: f64, end: f64) -> Result<Self, Error> {
        if !start.is_finite() || !end.is_finite() {
            return Err(Error::Validation(format!(
                "time range bounds must be finite, got [{}, {}]",
                start, end
            )));
        }
        if start < 0.0 || end < 0.0 {
            return Err(Error::Validation(format!(
                "time range bounds must be >= 0, got [{}, {}]",
                start, end
            )));
        }
        if start > end {
            return Err(Error::Validation(format!(
                "time range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Half-hour slot indices covered: `[start*2, end*2)`.
    pub fn slots(&self) -> Range<usize> {
        (self.start * 2.0) as usize..(self.end * 2.0) as usize
    }

    /// Number of half-hour slots in the range.
    pub fn slot_count(&self) -> usize {
        ((self.end - self.start) * 2.0) as usize
    }

    /// The part of `series` inside the range, clamped to its length.
    pub fn slice<'a>(&self, series: &'a [ForecastPoint]) -> &'a [ForecastPoint] {
        let Range { start, end } = self.slots();
        let start = start.min(series.len());
        let end = end.clamp(start, series.len());
        &series[start..end]
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// Top-K result: a bare item when exactly one survives, a list otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Selection<T> {
    Single(T),
    Many(Vec<T>),
}

impl<T> Selection<T> {
    /// Keep the first `n` of already-sorted `items`.
    pub fn top(mut items: Vec<T>, n: usize) -> Self {
        items.truncate(n);
        if items.len() == 1 {
            Selection::Single(items.remove(0))
        } else {
            Selection::Many(items)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Selection::Single(_) => 1,
            Selection::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first(&self) -> Option<&T> {
        match self {
            Selection::Single(item) => Some(item),
            Selection::Many(items) => items.first(),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            Selection::Single(item) => vec![item],
            Selection::Many(items) => items,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationOption {
    pub location: Region,
    pub forecast: f64,
    pub index: IntensityIndex,
}

/// A forecast point tagged with the region it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedPoint {
    #[serde(flatten)]
    pub point: ForecastPoint,
    pub location: Region,
}

/// A window's start label and its mean intensity, serialized as `forecast`
/// like single-slot results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowCost {
    pub time: String,
    #[serde(rename = "forecast")]
    pub cost: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocatedWindowCost {
    pub location: Region,
    pub time: String,
    #[serde(rename = "forecast")]
    pub cost: i64,
}

/// Mean forecast over the window, rounded half to even.
fn mean_cost(window: &[ForecastPoint]) -> i64 {
    let total: f64 = window.iter().map(|p| p.forecast).sum();
    (total / window.len() as f64).round_ties_even() as i64
}

/// Cost of every full-width window of `slots` points, in series order.
fn window_costs(series: &[ForecastPoint], slots: usize) -> Vec<WindowCost> {
    if slots == 0 {
        return Vec::new();
    }
    series
        .windows(slots)
        .map(|w| WindowCost {
            time: w[0].time.clone(),
            cost: mean_cost(w),
        })
        .collect()
}

fn sort_by_forecast<T>(items: &mut [T], forecast: impl Fn(&T) -> f64) {
    items.sort_by(|a, b| forecast(a).total_cmp(&forecast(b)));
}

pub struct Optimizer {
    access: ForecastAccess,
}

impl Optimizer {
    pub fn new(access: ForecastAccess) -> Self {
        Self { access }
    }

    pub fn access(&self) -> &ForecastAccess {
        &self.access
    }

    /// Current reading per location; locations without one are skipped.
    async fn readings(&self, locations: &[Region]) -> Result<Vec<(Region, IntensityReading)>, Error> {
        let mut out = Vec::with_capacity(locations.len());
        match &self.access {
            ForecastAccess::Cached(cache) => {
                let snapshot = cache.current()?;
                for &region in locations {
                    match snapshot.region_intensity(region)? {
                        Some(reading) => out.push((region, reading.clone())),
                        None => debug!("{}: no cached intensity", region),
                    }
                }
            }
            ForecastAccess::Live(source) => {
                for &region in locations {
                    match source.current_region_intensity(region).await {
                        Some(reading) => out.push((region, reading)),
                        None => debug!("{}: no live intensity", region),
                    }
                }
            }
        }
        Ok(out)
    }

    /// Range-sliced forecast per location; locations without one are skipped.
    ///
    /// The cached path reads every location from the same snapshot. The live
    /// path asks the source for exactly `range.end` hours.
    async fn sliced_series(
        &self,
        locations: &[Region],
        range: TimeRange,
    ) -> Result<Vec<(Region, ForecastSeries)>, Error> {
        let mut out = Vec::with_capacity(locations.len());
        match &self.access {
            ForecastAccess::Cached(cache) => {
                let snapshot = cache.current()?;
                for &region in locations {
                    match snapshot.region_series(region)? {
                        Some(series) => out.push((region, range.slice(series).to_vec())),
                        None => debug!("{}: no cached forecast", region),
                    }
                }
            }
            ForecastAccess::Live(source) => {
                for &region in locations {
                    match source.region_forecast_range(region, range.end).await {
                        Some(series) => out.push((region, range.slice(&series).to_vec())),
                        None => debug!("{}: no live forecast", region),
                    }
                }
            }
        }
        Ok(out)
    }

    /// The location with the lowest intensity right now. Ties go to the
    /// earlier location in `locations`.
    pub async fn optimal_location_now(
        &self,
        locations: &[Region],
    ) -> Result<Option<LocationOption>, Error> {
        let mut options: Vec<LocationOption> = self
            .readings(locations)
            .await?
            .into_iter()
            .map(|(location, r)| LocationOption {
                location,
                forecast: r.forecast,
                index: r.index,
            })
            .collect();
        sort_by_forecast(&mut options, |o| o.forecast);
        Ok(options.into_iter().next())
    }

    /// The `num_options` lowest-intensity half hours for one location.
    pub async fn optimal_time_for_location(
        &self,
        location: Region,
        num_options: usize,
        range: TimeRange,
    ) -> Result<Selection<ForecastPoint>, Error> {
        let mut points: Vec<ForecastPoint> = self
            .sliced_series(&[location], range)
            .await?
            .into_iter()
            .flat_map(|(_, series)| series)
            .collect();
        sort_by_forecast(&mut points, |p| p.forecast);
        Ok(Selection::top(points, num_options))
    }

    /// The `num_options` lowest-intensity half hours across all locations.
    pub async fn optimal_time_and_location(
        &self,
        locations: &[Region],
        num_options: usize,
        range: TimeRange,
    ) -> Result<Selection<LocatedPoint>, Error> {
        let mut points: Vec<LocatedPoint> = self
            .sliced_series(locations, range)
            .await?
            .into_iter()
            .flat_map(|(location, series)| {
                series
                    .into_iter()
                    .map(move |point| LocatedPoint { point, location })
            })
            .collect();
        sort_by_forecast(&mut points, |p| p.point.forecast);
        Ok(Selection::top(points, num_options))
    }

    /// Best start times for a run of `window_hours` in one location.
    pub async fn optimal_time_window_for_location(
        &self,
        location: Region,
        window_hours: f64,
        num_options: usize,
        range: TimeRange,
    ) -> Result<Selection<WindowCost>, Error> {
        let slots = half_hour_slots(window_hours);
        let mut costs: Vec<WindowCost> = self
            .sliced_series(&[location], range)
            .await?
            .iter()
            .flat_map(|(_, series)| window_costs(series, slots))
            .collect();
        costs.sort_by_key(|c| c.cost);
        Ok(Selection::top(costs, num_options))
    }

    /// Best (location, start time) pairs for a run of `window_hours`.
    pub async fn optimal_time_window_and_location(
        &self,
        locations: &[Region],
        window_hours: f64,
        num_options: usize,
        range: TimeRange,
    ) -> Result<Selection<LocatedWindowCost>, Error> {
        let slots = half_hour_slots(window_hours);
        let mut costs: Vec<LocatedWindowCost> = self
            .sliced_series(locations, range)
            .await?
            .iter()
            .flat_map(|(location, series)| {
                window_costs(series, slots)
                    .into_iter()
                    .map(move |w| LocatedWindowCost {
                        location: *location,
                        time: w.time,
                        cost: w.cost,
                    })
            })
            .collect();
        costs.sort_by_key(|c| c.cost);
        Ok(Selection::top(costs, num_options))
    }
}
