//! Immutable point-in-time view of every cached operation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{Error, ForecastSeries, IntensityReading, Region, MAX_HORIZON_HOURS};
use serde::{Deserialize, Serialize};

use crate::catalog::{CachedValue, Operation, OperationParam};

/// One refresh cycle's results.
///
/// Serializes flat: `created` plus one object per operation, each mapping a
/// parameter key to its result (`null` where the fetch failed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub created: DateTime<Utc>,
    #[serde(flatten)]
    entries: BTreeMap<Operation, BTreeMap<String, Option<CachedValue>>>,
}

impl Snapshot {
    pub fn new(created: DateTime<Utc>) -> Self {
        Self {
            created,
            entries: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, op: Operation, param: &OperationParam, value: Option<CachedValue>) {
        self.entries.entry(op).or_default().insert(param.key(), value);
    }

    /// Look up a stored result.
    ///
    /// `Err(NotFound)` when the key was never fetched; `Ok(None)` when it was
    /// fetched but the source had nothing usable.
    pub fn get(&self, op: Operation, param: &OperationParam) -> Result<Option<&CachedValue>, Error> {
        let key = param.key();
        self.entries
            .get(&op)
            .and_then(|by_param| by_param.get(&key))
            .map(Option::as_ref)
            .ok_or_else(|| Error::NotFound {
                operation: op.name().to_string(),
                param: key,
            })
    }

    pub fn region_intensity(&self, region: Region) -> Result<Option<&IntensityReading>, Error> {
        Ok(self
            .get(Operation::CurrentRegionIntensity, &OperationParam::Region(region))?
            .and_then(CachedValue::as_reading))
    }

    /// The full-horizon forecast for a region.
    pub fn region_series(&self, region: Region) -> Result<Option<&ForecastSeries>, Error> {
        let param = OperationParam::RegionHorizon(region, MAX_HORIZON_HOURS);
        Ok(self
            .get(Operation::RegionForecastRange, &param)?
            .and_then(CachedValue::as_series))
    }

    /// Number of stored keys, present or absent.
    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys whose fetch produced nothing.
    pub fn absent_count(&self) -> usize {
        self.entries
            .values()
            .flat_map(BTreeMap::values)
            .filter(|v| v.is_none())
            .count()
    }

    pub fn operations(&self) -> impl Iterator<Item = Operation> + '_ {
        self.entries.keys().copied()
    }
}
