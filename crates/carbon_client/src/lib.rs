//! Carbon Intensity API client.
//!
//! Fetches national and regional intensity, fuel mix and 48-hour forecasts
//! from `api.carbonintensity.org.uk` and exposes them through the
//! [`ForecastSource`] trait.

pub mod rate_limit;
pub mod responses;
pub mod source;

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::config::MinimiserConfig;
use common::{Error, ForecastPoint, ForecastSeries, FuelMix, IntensityReading, Region};
use tracing::{debug, warn};
use url::Url;

use crate::rate_limit::RateLimiter;
use crate::responses::{
    parse_national_forecast, parse_national_intensity, parse_national_mix,
    parse_region_forecast, parse_region_intensity, parse_region_mix, select_range,
    select_single,
};

pub use source::ForecastSource;

/// Async client for the Carbon Intensity API with a shared rate limiter.
#[derive(Debug, Clone)]
pub struct CarbonIntensityClient {
    client: reqwest::Client,
    base_url: Url,
    limiter: RateLimiter,
}

impl CarbonIntensityClient {
    /// Build a client from the `api_base_url` and `http` sections of the config.
    pub fn new(cfg: &MinimiserConfig) -> Result<Self, Error> {
        let base_url = Url::parse(&cfg.api_base_url)
            .map_err(|e| Error::Config(format!("invalid api_base_url: {}", e)))?;

        let client = reqwest::Client::builder()
            .user_agent("carbon-minimiser/0.1")
            .pool_max_idle_per_host(4)
            .timeout(Duration::from_secs(cfg.http.timeout_secs))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            limiter: RateLimiter::per_second(cfg.http.requests_per_sec),
        })
    }

    /// GET `endpoint` relative to the base URL and return the body.
    async fn get_text(&self, endpoint: &str) -> Result<String, Error> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| Error::Http(format!("bad endpoint {}: {}", endpoint, e)))?;

        self.limiter.wait().await;
        debug!("Fetching {}", url);

        let resp = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", url, e)))?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Http(format!("{}: {}", url, e)))?;

        if status != 200 {
            // The API still sends a JSON error document; parsing will reject it.
            warn!("Error requesting {} (status {})", url, status);
        }

        Ok(body)
    }

    /// Forecast window start: the current time at minute precision.
    fn forecast_from() -> String {
        Utc::now().format("%Y-%m-%dT%H:%MZ").to_string()
    }

    async fn national_forecast(&self) -> Result<ForecastSeries, Error> {
        let body = self
            .get_text(&format!("intensity/{}/fw48h", Self::forecast_from()))
            .await?;
        parse_national_forecast(&body)
    }

    async fn region_forecast(&self, region: Region) -> Result<ForecastSeries, Error> {
        let body = self
            .get_text(&format!(
                "regional/intensity/{}/fw48h/regionid/{}",
                Self::forecast_from(),
                region.id()
            ))
            .await?;
        parse_region_forecast(&body)
    }

    async fn region_current(&self, region: Region) -> Result<String, Error> {
        self.get_text(&format!("regional/regionid/{}", region.id()))
            .await
    }
}

/// Log a failed collection and hand back an absent result.
fn degrade<T>(what: &str, result: Result<T, Error>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Failed to collect {}: {}", what, e);
            None
        }
    }
}

#[async_trait]
impl ForecastSource for CarbonIntensityClient {
    async fn current_national_intensity(&self) -> Option<IntensityReading> {
        let result = self
            .get_text("intensity")
            .await
            .and_then(|body| parse_national_intensity(&body));
        degrade("national intensity", result)
    }

    async fn current_national_mix(&self) -> Option<FuelMix> {
        let result = self
            .get_text("generation")
            .await
            .and_then(|body| parse_national_mix(&body));
        degrade("national mix", result)
    }

    async fn current_region_intensity(&self, region: Region) -> Option<IntensityReading> {
        let result = self
            .region_current(region)
            .await
            .and_then(|body| parse_region_intensity(&body));
        degrade(&format!("regional intensity for {}", region), result)
    }

    async fn current_region_mix(&self, region: Region) -> Option<FuelMix> {
        let result = self
            .region_current(region)
            .await
            .and_then(|body| parse_region_mix(&body));
        degrade(&format!("regional mix for {}", region), result)
    }

    async fn national_forecast_single(&self, hours: f64) -> Option<ForecastPoint> {
        let result = self
            .national_forecast()
            .await
            .and_then(|series| select_single(series, hours));
        degrade("national forecast", result)
    }

    async fn national_forecast_range(&self, hours: f64) -> Option<ForecastSeries> {
        let result = self
            .national_forecast()
            .await
            .map(|series| select_range(series, hours));
        degrade("national forecast range", result)
    }

    async fn region_forecast_single(&self, region: Region, hours: f64) -> Option<ForecastPoint> {
        let result = self
            .region_forecast(region)
            .await
            .and_then(|series| select_single(series, hours));
        degrade(&format!("region forecast for {}", region), result)
    }

    async fn region_forecast_range(&self, region: Region, hours: f64) -> Option<ForecastSeries> {
        let result = self
            .region_forecast(region)
            .await
            .map(|series| select_range(series, hours));
        degrade(&format!("region forecast range for {}", region), result)
    }

    async fn health_status(&self) -> bool {
        self.limiter.wait().await;
        match self.client.get(self.base_url.clone()).send().await {
            Ok(resp) => resp.status().as_u16() == 200,
            Err(e) => {
                warn!("Health check failed: {}", e);
                false
            }
        }
    }

    fn name(&self) -> &str {
        "carbon-intensity-api"
    }
}
