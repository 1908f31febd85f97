use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use log::{debug, info, warn};
use moka::sync::Cache;

use super::loader::{self, SUPPORTED_EXTENSIONS};
use super::model::Dataset;
use crate::error::{ExplorerError, Result};

// ---------------------------------------------------------------------------
// Dataset cache: version key → immutable dataset snapshot
// ---------------------------------------------------------------------------

/// Memoizes loaded dataset versions with a time-to-live.
///
/// A version key is the stem of a file in the data directory whose extension
/// (in any case) is one of [`SUPPORTED_EXTENSIONS`]; when several files share
/// a stem the earlier extension wins. Entries are `Arc<Dataset>`, so
/// every caller inside the cache window shares the same snapshot. Concurrent
/// misses for one key are coalesced into a single load, and failed loads are
/// never inserted.
#[derive(Clone)]
pub struct DatasetCache {
    data_dir: PathBuf,
    inner: Cache<String, Arc<Dataset>>,
}

impl DatasetCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(600);
    pub const DEFAULT_CAPACITY: u64 = 8;

    pub fn new(data_dir: impl Into<PathBuf>, ttl: Duration, max_capacity: u64) -> Self {
        Self {
            data_dir: data_dir.into(),
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Return the cached dataset for `version_key`, loading it on a miss.
    pub fn get_dataset(&self, version_key: &str) -> Result<Arc<Dataset>> {
        if let Some(dataset) = self.inner.get(version_key) {
            debug!("dataset cache hit for '{version_key}'");
            return Ok(dataset);
        }

        self.inner
            .try_get_with(version_key.to_string(), || self.load(version_key))
            .map_err(|e| {
                log::error!("failed to load dataset '{version_key}': {e:#}");
                ExplorerError::dataset_load(version_key, format!("{e:#}"))
            })
    }

    fn load(&self, version_key: &str) -> anyhow::Result<Arc<Dataset>> {
        let path = self.resolve(version_key)?;
        let dataset = loader::load_file(&path)
            .with_context(|| format!("loading {}", path.display()))?;
        if dataset.is_empty() {
            warn!("dataset '{version_key}' has no rows");
        }
        info!(
            "Loaded dataset '{version_key}' with {} rows, optional columns {:?}",
            dataset.len(),
            dataset.table.columns
        );
        Ok(Arc::new(dataset))
    }

    /// Map a version key onto a file inside the data directory. Only keys
    /// that [`available_versions`](Self::available_versions) lists resolve.
    fn resolve(&self, version_key: &str) -> anyhow::Result<PathBuf> {
        match self.scan()?.remove(version_key) {
            Some(path) => Ok(path),
            None => bail!(
                "no dataset file for version '{version_key}' in {}",
                self.data_dir.display()
            ),
        }
    }

    /// Sorted keys of every loadable file in the data directory.
    pub fn available_versions(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.scan()?.into_keys().collect())
    }

    /// Version key → file, for every supported file directly in the data
    /// directory.
    fn scan(&self) -> anyhow::Result<BTreeMap<String, PathBuf>> {
        let entries = std::fs::read_dir(&self.data_dir)
            .with_context(|| format!("listing {}", self.data_dir.display()))?;

        let mut found: BTreeMap<String, (usize, PathBuf)> = BTreeMap::new();
        for entry in entries {
            let path = entry.context("reading data directory entry")?.path();
            if !path.is_file() {
                continue;
            }
            let Some(rank) = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(|e| {
                    let e = e.to_ascii_lowercase();
                    SUPPORTED_EXTENSIONS.iter().position(|s| *s == e)
                })
            else {
                continue;
            };
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match found.get(stem) {
                Some((best, _)) if *best <= rank => {}
                _ => {
                    found.insert(stem.to_string(), (rank, path));
                }
            }
        }
        Ok(found.into_iter().map(|(key, (_, path))| (key, path)).collect())
    }

    pub fn invalidate(&self, version_key: &str) {
        self.inner.invalidate(version_key);
    }

    /// Approximate number of cached versions.
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::thread;

    use super::*;

    const HEADER: &str = "region,variables,year,val,sector,model,scenario\n";

    fn write_version(dir: &Path, key: &str, rows: usize) {
        let mut text = HEADER.to_string();
        for i in 0..rows {
            text.push_str(&format!("EU,pop,{},1.0,Population,M,SSP2-RCP26\n", 2020 + i));
        }
        std::fs::write(dir.join(format!("{key}.csv")), text).unwrap();
    }

    fn cache_for(dir: &Path) -> DatasetCache {
        DatasetCache::new(dir, DatasetCache::DEFAULT_TTL, DatasetCache::DEFAULT_CAPACITY)
    }

    #[test]
    fn repeated_requests_share_one_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        write_version(dir.path(), "v1", 2);
        let cache = cache_for(dir.path());

        let a = cache.get_dataset("v1").unwrap();
        let b = cache.get_dataset("v1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.len(), 2);
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn concurrent_callers_observe_same_instance() {
        let dir = tempfile::tempdir().unwrap();
        write_version(dir.path(), "v1", 50);
        let cache = Arc::new(cache_for(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get_dataset("v1").unwrap())
            })
            .collect();
        let results: Vec<Arc<Dataset>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for ds in &results[1..] {
            assert!(Arc::ptr_eq(&results[0], ds));
        }
    }

    #[test]
    fn failed_load_does_not_poison_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache_for(dir.path());

        let err = cache.get_dataset("v2").unwrap_err();
        assert!(matches!(err, ExplorerError::DatasetLoad { ref key, .. } if key == "v2"));

        std::fs::write(dir.path().join("v2.csv"), "region,year\nEU,notayear\n").unwrap();
        assert!(matches!(
            cache.get_dataset("v2"),
            Err(ExplorerError::DatasetLoad { .. })
        ));

        write_version(dir.path(), "v2", 3);
        assert_eq!(cache.get_dataset("v2").unwrap().len(), 3);
    }

    #[test]
    fn expired_entries_are_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        write_version(dir.path(), "v1", 1);
        let cache = DatasetCache::new(dir.path(), Duration::from_millis(100), 4);

        let first = cache.get_dataset("v1").unwrap();
        assert_eq!(first.len(), 1);

        write_version(dir.path(), "v1", 3);
        thread::sleep(Duration::from_millis(400));

        let second = cache.get_dataset("v1").unwrap();
        assert_eq!(second.len(), 3);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn invalidate_forces_reload() {
        let dir = tempfile::tempdir().unwrap();
        write_version(dir.path(), "v1", 1);
        let cache = cache_for(dir.path());
        let first = cache.get_dataset("v1").unwrap();

        write_version(dir.path(), "v1", 2);
        assert_eq!(cache.get_dataset("v1").unwrap().len(), 1);

        cache.invalidate("v1");
        let second = cache.get_dataset("v1").unwrap();
        assert_eq!(second.len(), 2);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn punctuated_version_keys() {
        let dir = tempfile::tempdir().unwrap();
        let key = "structured_data_('3.10', '2.1')";
        write_version(dir.path(), key, 1);
        write_version(dir.path(), "plain", 1);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let cache = cache_for(dir.path());

        assert_eq!(cache.get_dataset(key).unwrap().len(), 1);
        assert_eq!(
            cache.available_versions().unwrap(),
            vec!["plain".to_string(), key.to_string()]
        );
    }

    #[test]
    fn every_listed_version_loads() {
        let dir = tempfile::tempdir().unwrap();
        let text = format!("{HEADER}EU,pop,2020,1.0,Population,M,SSP2-RCP26\n");
        std::fs::write(dir.path().join("V1.CSV"), &text).unwrap();
        std::fs::write(dir.path().join("v1..2.csv"), &text).unwrap();
        let cache = cache_for(dir.path());

        let versions = cache.available_versions().unwrap();
        assert_eq!(versions, vec!["V1".to_string(), "v1..2".to_string()]);
        for key in &versions {
            assert_eq!(cache.get_dataset(key).unwrap().len(), 1, "{key}");
        }
    }

    #[test]
    fn earlier_extension_wins_for_a_shared_stem() {
        let dir = tempfile::tempdir().unwrap();
        write_version(dir.path(), "v1", 2);
        std::fs::write(dir.path().join("v1.json"), "[]").unwrap();
        let cache = cache_for(dir.path());

        assert_eq!(cache.available_versions().unwrap(), vec!["v1".to_string()]);
        assert_eq!(cache.get_dataset("v1").unwrap().len(), 2);
    }

    #[test]
    fn keys_cannot_escape_the_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("data");
        std::fs::create_dir(&sub).unwrap();
        write_version(dir.path(), "secret", 1);
        let cache = cache_for(&sub);
        for key in ["../secret", "a/b", "", "..\\x"] {
            assert!(matches!(
                cache.get_dataset(key),
                Err(ExplorerError::DatasetLoad { .. })
            ));
        }
    }
}
