//! The data-source seam between the minimiser and the upstream API.

use async_trait::async_trait;
use common::{ForecastPoint, ForecastSeries, FuelMix, IntensityReading, Region};

/// Async provider of current and forecast carbon-intensity data.
///
/// Every data method degrades instead of failing: transport errors and
/// malformed payloads are logged by the implementation and surface as
/// `None`, so one bad call never takes down a caller iterating many.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn current_national_intensity(&self) -> Option<IntensityReading>;

    async fn current_national_mix(&self) -> Option<FuelMix>;

    async fn current_region_intensity(&self, region: Region) -> Option<IntensityReading>;

    async fn current_region_mix(&self, region: Region) -> Option<FuelMix>;

    /// The slot `hours` ahead, rounded down to the half hour.
    async fn national_forecast_single(&self, hours: f64) -> Option<ForecastPoint>;

    /// Every slot from now up to and including `hours` ahead.
    async fn national_forecast_range(&self, hours: f64) -> Option<ForecastSeries>;

    async fn region_forecast_single(&self, region: Region, hours: f64) -> Option<ForecastPoint>;

    async fn region_forecast_range(&self, region: Region, hours: f64) -> Option<ForecastSeries>;

    /// True when the upstream root answers 200.
    async fn health_status(&self) -> bool;

    /// Source name for logging.
    fn name(&self) -> &str;
}
