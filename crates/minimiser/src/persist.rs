//! Snapshot persistence as a single flat JSON document.

use std::path::Path;

use common::Error;
use tokio::fs::{read_to_string, rename, write};

use crate::snapshot::Snapshot;

/// Writes the snapshot to `path`, replacing any previous file.
///
/// The document is written next to the target first and then renamed so a
/// reader never sees a half-written file.
pub async fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), Error> {
    let json = serde_json::to_string(snapshot)?;
    let tmp = path.with_extension("json.tmp");
    write(&tmp, json).await?;
    rename(&tmp, path).await?;
    Ok(())
}

/// Tries to read a snapshot from `path`; `Ok(None)` when no file exists.
pub async fn read_snapshot(path: &Path) -> Result<Option<Snapshot>, Error> {
    match read_to_string(path).await {
        Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CachedValue, Operation, OperationParam};
    use crate::fixture::series;
    use chrono::Utc;
    use common::{FuelMix, IntensityIndex, IntensityReading, Region, MAX_HORIZON_HOURS};
    use tempfile::tempdir;

    fn populated() -> Snapshot {
        let mut snap = Snapshot::new(Utc::now());
        snap.insert(
            Operation::CurrentNationalIntensity,
            &OperationParam::None,
            Some(CachedValue::Reading(IntensityReading {
                forecast: 170.0,
                index: IntensityIndex::Moderate,
            })),
        );
        let mix: FuelMix = [("gas".to_string(), 40.5), ("wind".to_string(), 31.0)]
            .into_iter()
            .collect();
        snap.insert(Operation::CurrentNationalMix, &OperationParam::None, Some(CachedValue::Mix(mix)));
        snap.insert(
            Operation::NationalForecastSingle,
            &OperationParam::Horizon(MAX_HORIZON_HOURS),
            Some(CachedValue::Point(series(&[99.0]).remove(0))),
        );
        for region in [Region::London, Region::Wales] {
            snap.insert(
                Operation::RegionForecastRange,
                &OperationParam::RegionHorizon(region, MAX_HORIZON_HOURS),
                Some(CachedValue::Series(series(&[231.0, 23.0, 118.0]))),
            );
            snap.insert(Operation::CurrentRegionMix, &OperationParam::Region(region), None);
        }
        snap
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let result = read_snapshot(&dir.path().join("nope.json")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_write_then_read_reproduces_snapshot() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let snap = populated();

        write_snapshot(&path, &snap).await.unwrap();
        let loaded = read_snapshot(&path).await.unwrap().unwrap();

        assert_eq!(loaded, snap);
        for op in snap.operations() {
            assert!(loaded.operations().any(|o| o == op));
        }
        assert_eq!(loaded.absent_count(), 2);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_previous() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        write_snapshot(&path, &populated()).await.unwrap();
        let empty = Snapshot::new(Utc::now());
        write_snapshot(&path, &empty).await.unwrap();

        let loaded = read_snapshot(&path).await.unwrap().unwrap();
        assert!(loaded.is_empty());
        assert!(!dir.path().join("cache.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_garbage_is_json_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, "not json").await.unwrap();
        assert!(matches!(read_snapshot(&path).await, Err(Error::Json(_))));
    }
}
