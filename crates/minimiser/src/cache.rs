//! Background-refreshed snapshot cache.
//!
//! A single refresh task rebuilds the whole [`Snapshot`] each cycle and hands
//! it over through a `watch` channel. Readers clone the current `Arc` and are
//! never blocked by a refresh in progress.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use carbon_client::ForecastSource;
use chrono::{DateTime, Utc};
use common::config::MinimiserConfig;
use common::{Error, Region};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::catalog::{expand, invoke};
use crate::persist::write_snapshot;
use crate::snapshot::Snapshot;

type Published = Option<Arc<Snapshot>>;

/// Owned by the refresh task; clears the running flag when the task is dropped.
struct RunningGuard(Arc<SnapshotCache>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
        debug!("Refresh loop stopped");
    }
}

pub struct SnapshotCache {
    source: Arc<dyn ForecastSource>,
    locations: Vec<Region>,
    refresh_interval: Duration,
    snapshot_path: Option<PathBuf>,
    tx: watch::Sender<Published>,
    running: AtomicBool,
}

impl SnapshotCache {
    pub fn new(
        source: Arc<dyn ForecastSource>,
        locations: Vec<Region>,
        refresh_interval: Duration,
    ) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            source,
            locations,
            refresh_interval,
            snapshot_path: None,
            tx,
            running: AtomicBool::new(false),
        }
    }

    /// Build a cache from the `locations` and `cache` sections of the config.
    pub fn from_config(source: Arc<dyn ForecastSource>, cfg: &MinimiserConfig) -> Self {
        let cache = Self::new(
            source,
            cfg.locations.clone(),
            Duration::from_secs(cfg.cache.refresh_interval_secs),
        );
        match &cfg.cache.snapshot_path {
            Some(path) => cache.with_snapshot_path(path),
            None => cache,
        }
    }

    /// Also write every published snapshot to `path`.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn locations(&self) -> &[Region] {
        &self.locations
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Run every catalog entry once, in order, into a fresh snapshot.
    ///
    /// A failing entry is stored as absent; it never stops the others.
    pub async fn build_snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new(Utc::now());
        for (op, param) in expand(&self.locations) {
            let value = invoke(self.source.as_ref(), op, param).await;
            if value.is_none() {
                debug!("{} [{}] came back empty", op.name(), param.key());
            }
            snapshot.insert(op, &param, value);
        }
        snapshot
    }

    /// Replace the published snapshot.
    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.tx.send_replace(Some(snapshot.clone()));
        snapshot
    }

    /// One full cycle: build, publish, then persist if configured.
    pub async fn refresh(&self) -> Arc<Snapshot> {
        let started = Instant::now();
        let snapshot = self.publish(self.build_snapshot().await);
        info!(
            "Snapshot refreshed from {}: keys={} absent={} in {:.1}s",
            self.source.name(),
            snapshot.len(),
            snapshot.absent_count(),
            started.elapsed().as_secs_f64()
        );

        if let Some(path) = &self.snapshot_path {
            if let Err(e) = write_snapshot(path, &snapshot).await {
                warn!("Failed to persist snapshot to {}: {}", path.display(), e);
            }
        }
        snapshot
    }

    /// Start the refresh loop: first cycle immediately, then one every
    /// `refresh_interval`. Only one loop may run per cache at a time; once
    /// the task ends or is aborted the cache can be spawned again.
    pub fn spawn(self: &Arc<Self>) -> Result<JoinHandle<()>, Error> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyRunning);
        }

        let guard = RunningGuard(Arc::clone(self));
        Ok(tokio::spawn(async move {
            let cache = &guard.0;
            info!(
                "Refresh loop started: {} locations every {}s",
                cache.locations.len(),
                cache.refresh_interval.as_secs()
            );
            loop {
                cache.refresh().await;
                sleep(cache.refresh_interval).await;
            }
        }))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The latest published snapshot.
    pub fn current(&self) -> Result<Arc<Snapshot>, Error> {
        self.tx.borrow().clone().ok_or(Error::CacheNotReady)
    }

    /// Creation time of the latest snapshot.
    pub fn created(&self) -> Result<DateTime<Utc>, Error> {
        Ok(self.current()?.created)
    }

    /// Resolves once the first snapshot has been published.
    pub async fn wait_ready(&self) -> Result<Arc<Snapshot>, Error> {
        let mut rx = self.tx.subscribe();
        let published = rx
            .wait_for(|s| s.is_some())
            .await
            .map_err(|_| Error::CacheNotReady)?;
        published.clone().ok_or(Error::CacheNotReady)
    }

    /// Receiver that observes every publish.
    pub fn subscribe(&self) -> watch::Receiver<Published> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Operation, OperationParam};
    use crate::fixture::ScriptedSource;
    use crate::persist::read_snapshot;
    use common::MAX_HORIZON_HOURS;
    use tempfile::tempdir;

    fn scripted() -> Arc<ScriptedSource> {
        Arc::new(ScriptedSource {
            national: Some(crate::fixture::series(&[180.0, 170.0, 160.0])),
            ..ScriptedSource::with_series(&[(Region::London, &[231.0, 23.0])])
        })
    }

    fn cache_for(source: Arc<ScriptedSource>, locations: Vec<Region>) -> Arc<SnapshotCache> {
        Arc::new(SnapshotCache::new(
            source,
            locations,
            Duration::from_secs(60),
        ))
    }

    #[tokio::test]
    async fn test_not_ready_before_first_publish() {
        let cache = cache_for(scripted(), vec![Region::London]);
        assert!(matches!(cache.current(), Err(Error::CacheNotReady)));
        assert!(matches!(cache.created(), Err(Error::CacheNotReady)));
    }

    #[tokio::test]
    async fn test_build_covers_catalog_and_isolates_failures() {
        let source = scripted();
        let cache = cache_for(source.clone(), vec![Region::London, Region::Wales]);
        let snap = cache.build_snapshot().await;

        // 2 national + 2×2 regional + 2 horizon + 2×2 region-horizon
        assert_eq!(snap.len(), 12);
        assert_eq!(source.call_count(), 12);

        let london = snap.region_series(Region::London).unwrap().unwrap();
        assert_eq!(london.len(), 2);
        // Wales is not scripted: stored as absent, rest of the snapshot intact.
        assert!(snap.region_series(Region::Wales).unwrap().is_none());
        assert!(snap
            .get(Operation::NationalForecastRange, &OperationParam::Horizon(MAX_HORIZON_HOURS))
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_publish_swaps_whole_snapshot() {
        let cache = cache_for(scripted(), vec![Region::London]);
        let first = cache.refresh().await;
        let held = cache.current().unwrap();
        let second = cache.refresh().await;

        assert!(Arc::ptr_eq(&first, &held));
        assert!(!Arc::ptr_eq(&held, &cache.current().unwrap()));
        assert!(Arc::ptr_eq(&second, &cache.current().unwrap()));
        // An old reader still sees its complete snapshot.
        assert_eq!(held.len(), second.len());
        assert!(cache.created().unwrap() >= held.created);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_refreshes_periodically() {
        let source = scripted();
        let cache = cache_for(source.clone(), vec![Region::London]);
        let mut rx = cache.subscribe();

        let handle = cache.spawn().unwrap();
        let first = cache.wait_ready().await.unwrap();
        let per_cycle = first.len();
        assert_eq!(source.call_count(), per_cycle);

        rx.borrow_and_update();
        sleep(Duration::from_secs(61)).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(source.call_count(), per_cycle * 2);

        handle.abort();
    }

    #[tokio::test]
    async fn test_second_spawn_rejected() {
        let cache = cache_for(scripted(), vec![Region::London]);
        let handle = cache.spawn().unwrap();
        assert!(cache.is_running());
        assert!(matches!(cache.spawn(), Err(Error::AlreadyRunning)));
        handle.abort();
    }

    #[tokio::test]
    async fn test_aborted_loop_can_be_restarted() {
        let cache = cache_for(scripted(), vec![Region::London]);
        let handle = cache.spawn().unwrap();
        cache.wait_ready().await.unwrap();

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(!cache.is_running());

        let handle = cache.spawn().unwrap();
        assert!(cache.is_running());
        handle.abort();
    }

    #[tokio::test]
    async fn test_abort_before_first_poll_clears_flag() {
        let cache = cache_for(scripted(), vec![Region::London]);
        let handle = cache.spawn().unwrap();
        handle.abort();
        let _ = handle.await;
        assert!(!cache.is_running());
    }

    #[tokio::test]
    async fn test_refresh_persists_when_configured() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let cache = SnapshotCache::new(scripted(), vec![Region::London], Duration::from_secs(60))
            .with_snapshot_path(&path);

        let published = cache.refresh().await;
        let loaded = read_snapshot(&path).await.unwrap().unwrap();
        assert_eq!(&loaded, published.as_ref());
    }

    #[tokio::test]
    async fn test_unwritable_snapshot_path_is_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("snapshot.json");
        let cache = SnapshotCache::new(scripted(), vec![Region::London], Duration::from_secs(60))
            .with_snapshot_path(&path);

        cache.refresh().await;
        assert!(cache.current().is_ok());
        assert!(!path.exists());
    }

    #[test]
    fn test_from_config() {
        let mut cfg = MinimiserConfig::default();
        cfg.locations = vec![Region::Wales];
        cfg.cache.refresh_interval_secs = 120;
        cfg.cache.snapshot_path = Some("snap.json".into());
        let cache = SnapshotCache::from_config(scripted(), &cfg);
        assert_eq!(cache.locations(), &[Region::Wales]);
        assert_eq!(cache.refresh_interval(), Duration::from_secs(120));
        assert_eq!(cache.snapshot_path, Some(PathBuf::from("snap.json")));
    }
}
