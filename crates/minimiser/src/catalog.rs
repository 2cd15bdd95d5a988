//! The fixed table of upstream fetches a snapshot is built from.

use common::{ForecastPoint, ForecastSeries, FuelMix, IntensityReading, Region, MAX_HORIZON_HOURS};
use carbon_client::ForecastSource;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A cached upstream operation. Serialized names double as snapshot keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CurrentNationalIntensity,
    CurrentNationalMix,
    CurrentRegionIntensity,
    CurrentRegionMix,
    NationalForecastSingle,
    NationalForecastRange,
    RegionForecastSingle,
    RegionForecastRange,
}

/// Which parameters an operation is fanned out over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamShape {
    None,
    Region,
    Horizon,
    RegionHorizon,
}

/// Every cached operation, in refresh order.
pub const CATALOG: [(Operation, ParamShape); 8] = [
    (Operation::CurrentNationalIntensity, ParamShape::None),
    (Operation::CurrentNationalMix, ParamShape::None),
    (Operation::CurrentRegionIntensity, ParamShape::Region),
    (Operation::CurrentRegionMix, ParamShape::Region),
    (Operation::NationalForecastSingle, ParamShape::Horizon),
    (Operation::NationalForecastRange, ParamShape::Horizon),
    (Operation::RegionForecastSingle, ParamShape::RegionHorizon),
    (Operation::RegionForecastRange, ParamShape::RegionHorizon),
];

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::CurrentNationalIntensity => "current_national_intensity",
            Operation::CurrentNationalMix => "current_national_mix",
            Operation::CurrentRegionIntensity => "current_region_intensity",
            Operation::CurrentRegionMix => "current_region_mix",
            Operation::NationalForecastSingle => "national_forecast_single",
            Operation::NationalForecastRange => "national_forecast_range",
            Operation::RegionForecastSingle => "region_forecast_single",
            Operation::RegionForecastRange => "region_forecast_range",
        }
    }
}

/// Concrete argument for one catalog invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperationParam {
    None,
    Region(Region),
    Horizon(f64),
    RegionHorizon(Region, f64),
}

impl OperationParam {
    /// Key under which the result is stored in a snapshot.
    pub fn key(&self) -> String {
        match self {
            OperationParam::None => String::new(),
            OperationParam::Region(r) => r.to_string(),
            OperationParam::Horizon(h) => h.to_string(),
            OperationParam::RegionHorizon(r, h) => format!("{}:{}", r, h),
        }
    }
}

/// Expand a shape into the parameters fetched for it. Horizons are always
/// the maximum so narrower queries can be answered by slicing.
pub fn params_for(shape: ParamShape, locations: &[Region]) -> Vec<OperationParam> {
    match shape {
        ParamShape::None => vec![OperationParam::None],
        ParamShape::Region => locations.iter().map(|r| OperationParam::Region(*r)).collect(),
        ParamShape::Horizon => vec![OperationParam::Horizon(MAX_HORIZON_HOURS)],
        ParamShape::RegionHorizon => locations
            .iter()
            .map(|r| OperationParam::RegionHorizon(*r, MAX_HORIZON_HOURS))
            .collect(),
    }
}

/// Full (operation, parameter) list for a location set, in refresh order.
pub fn expand(locations: &[Region]) -> Vec<(Operation, OperationParam)> {
    CATALOG
        .iter()
        .flat_map(|(op, shape)| {
            params_for(*shape, locations)
                .into_iter()
                .map(move |param| (*op, param))
        })
        .collect()
}

/// Any result an operation can produce.
///
/// Untagged so persisted snapshots stay plain JSON; variant order matters
/// for deserialization (a point would also satisfy a reading's fields).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CachedValue {
    Series(ForecastSeries),
    Point(ForecastPoint),
    Reading(IntensityReading),
    Mix(FuelMix),
}

impl CachedValue {
    pub fn as_reading(&self) -> Option<&IntensityReading> {
        match self {
            CachedValue::Reading(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&ForecastSeries> {
        match self {
            CachedValue::Series(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_point(&self) -> Option<&ForecastPoint> {
        match self {
            CachedValue::Point(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_mix(&self) -> Option<&FuelMix> {
        match self {
            CachedValue::Mix(m) => Some(m),
            _ => None,
        }
    }
}

/// Run one catalog entry against the source.
pub async fn invoke(
    source: &dyn ForecastSource,
    op: Operation,
    param: OperationParam,
) -> Option<CachedValue> {
    use OperationParam as P;

    match (op, param) {
        (Operation::CurrentNationalIntensity, P::None) => source
            .current_national_intensity()
            .await
            .map(CachedValue::Reading),
        (Operation::CurrentNationalMix, P::None) => {
            source.current_national_mix().await.map(CachedValue::Mix)
        }
        (Operation::CurrentRegionIntensity, P::Region(r)) => source
            .current_region_intensity(r)
            .await
            .map(CachedValue::Reading),
        (Operation::CurrentRegionMix, P::Region(r)) => {
            source.current_region_mix(r).await.map(CachedValue::Mix)
        }
        (Operation::NationalForecastSingle, P::Horizon(h)) => source
            .national_forecast_single(h)
            .await
            .map(CachedValue::Point),
        (Operation::NationalForecastRange, P::Horizon(h)) => source
            .national_forecast_range(h)
            .await
            .map(CachedValue::Series),
        (Operation::RegionForecastSingle, P::RegionHorizon(r, h)) => source
            .region_forecast_single(r, h)
            .await
            .map(CachedValue::Point),
        (Operation::RegionForecastRange, P::RegionHorizon(r, h)) => source
            .region_forecast_range(r, h)
            .await
            .map(CachedValue::Series),
        (op, param) => {
            warn!("{} does not take parameter {:?}", op.name(), param);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::IntensityIndex;

    #[test]
    fn test_operation_serde_name_matches() {
        for (op, _) in CATALOG {
            assert_eq!(
                serde_json::to_string(&op).unwrap(),
                format!("\"{}\"", op.name())
            );
        }
    }

    #[test]
    fn test_param_keys() {
        assert_eq!(OperationParam::None.key(), "");
        assert_eq!(OperationParam::Region(Region::London).key(), "LONDON");
        assert_eq!(OperationParam::Horizon(47.5).key(), "47.5");
        assert_eq!(
            OperationParam::RegionHorizon(Region::NwEngland, 47.5).key(),
            "NW_ENGLAND:47.5"
        );
    }

    #[test]
    fn test_expand_covers_every_shape() {
        let locations = [Region::London, Region::Wales, Region::Scotland];
        let entries = expand(&locations);
        // 2 national + 2×3 regional + 2 horizon + 2×3 region-horizon
        assert_eq!(entries.len(), 2 + 6 + 2 + 6);
        assert_eq!(entries[0], (Operation::CurrentNationalIntensity, OperationParam::None));
        assert!(entries.contains(&(
            Operation::RegionForecastRange,
            OperationParam::RegionHorizon(Region::Wales, MAX_HORIZON_HOURS)
        )));
        assert_eq!(
            entries.last().map(|(op, _)| *op),
            Some(Operation::RegionForecastRange)
        );
    }

    #[test]
    fn test_cached_value_untagged_variants() {
        let reading: CachedValue =
            serde_json::from_str(r#"{"forecast": 170, "index": "moderate"}"#).unwrap();
        assert_eq!(
            reading,
            CachedValue::Reading(IntensityReading {
                forecast: 170.0,
                index: IntensityIndex::Moderate
            })
        );

        let point: CachedValue =
            serde_json::from_str(r#"{"time": "+00:30", "forecast": 170, "index": "low"}"#)
                .unwrap();
        assert!(point.as_point().is_some());

        let mix: CachedValue = serde_json::from_str(r#"{"gas": 40.5, "wind": 30}"#).unwrap();
        assert_eq!(mix.as_mix().map(|m| m.len()), Some(2));

        let series: CachedValue = serde_json::from_str("[]").unwrap();
        assert_eq!(series.as_series().map(|s| s.len()), Some(0));
    }
}
