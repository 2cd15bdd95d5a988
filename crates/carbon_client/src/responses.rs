//! Carbon Intensity API payloads and their conversion into domain types.
//!
//! Parsing is kept apart from transport so every shape can be checked
//! against fixture documents.

use common::{
    half_hour_slots, Error, ForecastPoint, ForecastSeries, FuelMix, IntensityIndex,
    IntensityReading,
};
use serde::Deserialize;

// ── Response types ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct IntensityValues {
    #[serde(default)]
    pub forecast: Option<f64>,
    #[serde(default)]
    pub actual: Option<f64>,
    pub index: IntensityIndex,
}

#[derive(Debug, Deserialize)]
pub struct MixEntry {
    pub fuel: String,
    pub perc: f64,
}

/// One half-hour period; `generationmix` is only present on some endpoints.
#[derive(Debug, Deserialize)]
pub struct Period {
    pub from: String,
    pub intensity: IntensityValues,
    #[serde(default)]
    pub generationmix: Option<Vec<MixEntry>>,
}

/// `GET intensity` and `GET intensity/{from}/fw48h`.
#[derive(Debug, Deserialize)]
pub struct NationalIntensityResponse {
    pub data: Vec<Period>,
}

/// `GET generation`.
#[derive(Debug, Deserialize)]
pub struct GenerationResponse {
    pub data: GenerationPeriod,
}

#[derive(Debug, Deserialize)]
pub struct GenerationPeriod {
    pub generationmix: Vec<MixEntry>,
}

/// `GET regional/regionid/{id}`.
#[derive(Debug, Deserialize)]
pub struct RegionalCurrentResponse {
    pub data: Vec<RegionalBlock>,
}

/// `GET regional/intensity/{from}/fw48h/regionid/{id}`.
#[derive(Debug, Deserialize)]
pub struct RegionalForecastResponse {
    pub data: RegionalBlock,
}

#[derive(Debug, Deserialize)]
pub struct RegionalBlock {
    #[serde(default)]
    pub regionid: Option<u8>,
    pub data: Vec<Period>,
}

// ── Conversions ───────────────────────────────────────────────────────

fn malformed(what: &str) -> Error {
    Error::UpstreamMalformed(what.to_string())
}

fn to_mix(entries: &[MixEntry]) -> FuelMix {
    entries.iter().map(|m| (m.fuel.clone(), m.perc)).collect()
}

fn to_point(period: &Period) -> Result<ForecastPoint, Error> {
    let forecast = period
        .intensity
        .forecast
        .ok_or_else(|| malformed("intensity.forecast missing"))?;
    Ok(ForecastPoint {
        time: period.from.clone(),
        forecast,
        index: period.intensity.index,
    })
}

fn first_regional_period(resp: &RegionalCurrentResponse) -> Result<&Period, Error> {
    resp.data
        .first()
        .and_then(|block| block.data.first())
        .ok_or_else(|| malformed("data[0].data[0] missing"))
}

/// National intensity now. The measured value is preferred; the API leaves
/// `actual` null until the half hour has been settled.
pub fn parse_national_intensity(body: &str) -> Result<IntensityReading, Error> {
    let resp: NationalIntensityResponse = serde_json::from_str(body)?;
    let period = resp.data.first().ok_or_else(|| malformed("data[0] missing"))?;
    let forecast = period
        .intensity
        .actual
        .or(period.intensity.forecast)
        .ok_or_else(|| malformed("intensity.actual and intensity.forecast missing"))?;
    Ok(IntensityReading {
        forecast,
        index: period.intensity.index,
    })
}

pub fn parse_national_mix(body: &str) -> Result<FuelMix, Error> {
    let resp: GenerationResponse = serde_json::from_str(body)?;
    Ok(to_mix(&resp.data.generationmix))
}

pub fn parse_region_intensity(body: &str) -> Result<IntensityReading, Error> {
    let resp: RegionalCurrentResponse = serde_json::from_str(body)?;
    let period = first_regional_period(&resp)?;
    let forecast = period
        .intensity
        .forecast
        .ok_or_else(|| malformed("intensity.forecast missing"))?;
    Ok(IntensityReading {
        forecast,
        index: period.intensity.index,
    })
}

pub fn parse_region_mix(body: &str) -> Result<FuelMix, Error> {
    let resp: RegionalCurrentResponse = serde_json::from_str(body)?;
    let period = first_regional_period(&resp)?;
    let mix = period
        .generationmix
        .as_deref()
        .ok_or_else(|| malformed("generationmix missing"))?;
    Ok(to_mix(mix))
}

pub fn parse_national_forecast(body: &str) -> Result<ForecastSeries, Error> {
    let resp: NationalIntensityResponse = serde_json::from_str(body)?;
    resp.data.iter().map(to_point).collect()
}

pub fn parse_region_forecast(body: &str) -> Result<ForecastSeries, Error> {
    let resp: RegionalForecastResponse = serde_json::from_str(body)?;
    resp.data.data.iter().map(to_point).collect()
}

/// The point `hours` ahead of the first slot.
pub fn select_single(series: ForecastSeries, hours: f64) -> Result<ForecastPoint, Error> {
    let slot = half_hour_slots(hours);
    series
        .into_iter()
        .nth(slot)
        .ok_or_else(|| Error::UpstreamMalformed(format!("no forecast at slot {}", slot)))
}

/// Points from the first slot up to and including the one `hours` ahead.
pub fn select_range(mut series: ForecastSeries, hours: f64) -> ForecastSeries {
    series.truncate(half_hour_slots(hours) + 1);
    series
}

#[cfg(test)]
mod tests {
    use super::*;

    fn national_forecast_fixture() -> &'static str {
        r#"{"data": [
            {"from": "2026-10-18T12:00Z", "to": "2026-10-18T12:30Z",
             "intensity": {"forecast": 233, "actual": null, "index": "moderate"}},
            {"from": "2026-10-18T12:30Z", "to": "2026-10-18T13:00Z",
             "intensity": {"forecast": 231, "actual": null, "index": "moderate"}},
            {"from": "2026-10-18T13:00Z", "to": "2026-10-18T13:30Z",
             "intensity": {"forecast": 223, "actual": null, "index": "moderate"}},
            {"from": "2026-10-18T13:30Z", "to": "2026-10-18T14:00Z",
             "intensity": {"forecast": 118, "actual": null, "index": "low"}}
        ]}"#
    }

    fn regional_forecast_fixture() -> &'static str {
        r#"{"data": {"regionid": 13, "dnoregion": "UKPN London", "shortname": "London",
            "data": [
                {"from": "2026-10-18T12:00Z", "to": "2026-10-18T12:30Z",
                 "intensity": {"forecast": 170, "index": "moderate"},
                 "generationmix": [{"fuel": "gas", "perc": 40.1}]},
                {"from": "2026-10-18T12:30Z", "to": "2026-10-18T13:00Z",
                 "intensity": {"forecast": 45, "index": "very low"},
                 "generationmix": [{"fuel": "wind", "perc": 60.0}]}
            ]}}"#
    }

    #[test]
    fn test_national_intensity_prefers_actual() {
        let body = r#"{"data": [{"from": "x", "intensity": {"forecast": 180, "actual": 170, "index": "moderate"}}]}"#;
        let reading = parse_national_intensity(body).unwrap();
        assert_eq!(reading.forecast, 170.0);
        assert_eq!(reading.index, IntensityIndex::Moderate);
    }

    #[test]
    fn test_national_intensity_falls_back_to_forecast() {
        let body = r#"{"data": [{"from": "x", "intensity": {"forecast": 180, "actual": null, "index": "high"}}]}"#;
        let reading = parse_national_intensity(body).unwrap();
        assert_eq!(reading.forecast, 180.0);
        assert_eq!(reading.index, IntensityIndex::High);
    }

    #[test]
    fn test_national_mix() {
        let body = r#"{"data": {"from": "x", "to": "y", "generationmix": [
            {"fuel": "biomass", "perc": 3.6}, {"fuel": "coal", "perc": 0.4}]}}"#;
        let mix = parse_national_mix(body).unwrap();
        assert_eq!(mix.len(), 2);
        assert_eq!(mix["biomass"], 3.6);
        assert_eq!(mix["coal"], 0.4);
    }

    #[test]
    fn test_region_intensity_and_mix() {
        let body = r#"{"data": [{"regionid": 13, "data": [{"from": "x",
            "intensity": {"forecast": 170, "index": "moderate"},
            "generationmix": [{"fuel": "biomass", "perc": 3.6}, {"fuel": "coal", "perc": 0.4}]}]}]}"#;
        let reading = parse_region_intensity(body).unwrap();
        assert_eq!(reading.forecast, 170.0);
        let mix = parse_region_mix(body).unwrap();
        assert_eq!(mix["coal"], 0.4);
    }

    #[test]
    fn test_region_mix_missing_is_malformed() {
        let body = r#"{"data": [{"data": [{"from": "x", "intensity": {"forecast": 170, "index": "moderate"}}]}]}"#;
        assert!(matches!(
            parse_region_mix(body),
            Err(Error::UpstreamMalformed(_))
        ));
    }

    #[test]
    fn test_region_empty_data_is_malformed() {
        assert!(matches!(
            parse_region_intensity(r#"{"data": []}"#),
            Err(Error::UpstreamMalformed(_))
        ));
    }

    #[test]
    fn test_missing_top_level_field_is_json_error() {
        assert!(matches!(
            parse_national_forecast(r#"{"error": {"code": "400"}}"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_national_forecast_single_and_range() {
        let series = parse_national_forecast(national_forecast_fixture()).unwrap();
        assert_eq!(series.len(), 4);

        let point = select_single(series.clone(), 1.0).unwrap();
        assert_eq!(point.forecast, 223.0);
        assert_eq!(point.time, "2026-10-18T13:00Z");

        let range = select_range(series.clone(), 0.5);
        assert_eq!(range.len(), 2);
        assert_eq!(range[1].forecast, 231.0);

        // Horizons past the payload keep everything available.
        assert_eq!(select_range(series, 47.5).len(), 4);
    }

    #[test]
    fn test_single_beyond_payload_is_malformed() {
        let series = parse_national_forecast(national_forecast_fixture()).unwrap();
        assert!(matches!(
            select_single(series, 10.0),
            Err(Error::UpstreamMalformed(_))
        ));
    }

    #[test]
    fn test_region_forecast_points() {
        let series = parse_region_forecast(regional_forecast_fixture()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].forecast, 45.0);
        assert_eq!(series[1].index, IntensityIndex::VeryLow);
        assert_eq!(series[1].time, "2026-10-18T12:30Z");
    }
}
