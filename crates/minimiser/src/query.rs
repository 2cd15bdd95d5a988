//! Parameter validation in front of the optimizer.
//!
//! Callers hand over raw strings (query-string or CLI values); everything is
//! checked and normalised here so the optimizer only ever sees valid input.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{Error, ForecastPoint, Region};
use serde::Deserialize;
use tracing::debug;

use crate::cache::SnapshotCache;
use crate::optimizer::{
    LocatedPoint, LocatedWindowCost, LocationOption, Optimizer, Selection, TimeRange, WindowCost,
};

/// Optional parameters shared by every time-based query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryParams {
    /// `"start,end"` in hours from now.
    pub range: Option<String>,
    /// Number of options to return.
    pub results: Option<String>,
}

impl QueryParams {
    pub fn new(range: Option<&str>, results: Option<&str>) -> Self {
        Self {
            range: range.map(str::to_string),
            results: results.map(str::to_string),
        }
    }
}

pub fn round_to_half_hour(hours: f64) -> f64 {
    (hours * 2.0).round_ties_even() / 2.0
}

/// Parse `"start,end"`; absent means the full horizon.
pub fn parse_time_range(raw: Option<&str>) -> Result<TimeRange, Error> {
    let Some(raw) = raw else {
        return Ok(TimeRange::FULL);
    };

    let bounds = raw
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|_| Error::Validation(format!("range value {:?} is not a number", part)))
        })
        .collect::<Result<Vec<f64>, Error>>()?;

    match bounds.as_slice() {
        [start, end] => TimeRange::new(round_to_half_hour(*start), round_to_half_hour(*end)),
        _ => Err(Error::Validation(format!(
            "range must be two comma-separated numbers, got {:?}",
            raw
        ))),
    }
}

/// Parse the result count; absent means 1.
pub fn parse_result_count(raw: Option<&str>) -> Result<usize, Error> {
    match raw {
        None => Ok(1),
        Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
            Error::Validation(format!("results must be a non-negative integer, got {:?}", raw))
        }),
    }
}

pub fn parse_window_hours(raw: &str) -> Result<f64, Error> {
    let hours = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Validation(format!("window {:?} is not a number", raw)))?;
    if !hours.is_finite() || hours < 0.0 {
        return Err(Error::Validation(format!(
            "window must be a non-negative number of hours, got {}",
            hours
        )));
    }
    Ok(hours)
}

/// Never ask for more options than the range has half hours. The optimizer
/// further clamps to the points actually available.
pub fn limit_results(requested: usize, range: TimeRange) -> usize {
    requested.min(range.slot_count())
}

pub struct QueryFacade {
    optimizer: Optimizer,
    locations: Vec<Region>,
    cache: Option<Arc<SnapshotCache>>,
}

impl QueryFacade {
    pub fn new(
        optimizer: Optimizer,
        locations: Vec<Region>,
        cache: Option<Arc<SnapshotCache>>,
    ) -> Self {
        Self {
            optimizer,
            locations,
            cache,
        }
    }

    pub fn locations(&self) -> &[Region] {
        &self.locations
    }

    /// Case-insensitive region name that must be in the configured set.
    pub fn resolve_location(&self, raw: &str) -> Result<Region, Error> {
        let region: Region = raw
            .parse()
            .map_err(|_| Error::LocationNotConfigured(raw.to_string()))?;
        if !self.locations.contains(&region) {
            return Err(Error::LocationNotConfigured(raw.to_string()));
        }
        Ok(region)
    }

    fn parse_params(params: &QueryParams) -> Result<(TimeRange, usize), Error> {
        let range = parse_time_range(params.range.as_deref())?;
        let results = limit_results(parse_result_count(params.results.as_deref())?, range);
        debug!("Query range={:?} results={}", range, results);
        Ok((range, results))
    }

    /// Greenest half hours across every configured location.
    pub async fn optimise(&self, params: &QueryParams) -> Result<Selection<LocatedPoint>, Error> {
        let (range, results) = Self::parse_params(params)?;
        self.optimizer
            .optimal_time_and_location(&self.locations, results, range)
            .await
    }

    /// Greenest configured location right now.
    pub async fn optimal_location(&self) -> Result<Option<LocationOption>, Error> {
        self.optimizer.optimal_location_now(&self.locations).await
    }

    /// Greenest half hours in one location.
    pub async fn location(
        &self,
        location: &str,
        params: &QueryParams,
    ) -> Result<Selection<ForecastPoint>, Error> {
        let region = self.resolve_location(location)?;
        let (range, results) = Self::parse_params(params)?;
        self.optimizer
            .optimal_time_for_location(region, results, range)
            .await
    }

    /// Best start times for a `window`-hour run in one location.
    pub async fn location_window(
        &self,
        location: &str,
        window: &str,
        params: &QueryParams,
    ) -> Result<Selection<WindowCost>, Error> {
        let region = self.resolve_location(location)?;
        let hours = parse_window_hours(window)?;
        let (range, results) = Self::parse_params(params)?;
        self.optimizer
            .optimal_time_window_for_location(region, hours, results, range)
            .await
    }

    /// Best (location, start time) pairs for a `window`-hour run.
    pub async fn window(
        &self,
        window: &str,
        params: &QueryParams,
    ) -> Result<Selection<LocatedWindowCost>, Error> {
        let hours = parse_window_hours(window)?;
        let (range, results) = Self::parse_params(params)?;
        self.optimizer
            .optimal_time_window_and_location(&self.locations, hours, results, range)
            .await
    }

    /// When the snapshot being served was built. `CacheNotReady` before the
    /// first snapshot and whenever caching is disabled.
    pub fn timestamp(&self) -> Result<DateTime<Utc>, Error> {
        match &self.cache {
            Some(cache) => cache.created(),
            None => Err(Error::CacheNotReady),
        }
    }
}
