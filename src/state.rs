use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info, warn};

use crate::color::ColorMap;
use crate::config::ExplorerConfig;
use crate::data::cache::DatasetCache;
use crate::data::filter::{build_views, SeriesView};
use crate::data::model::{Category, Dataset, WORLD};
use crate::metadata::ScenarioMetadata;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: ExplorerConfig,

    /// Loaded dataset versions, keyed by version.
    pub cache: DatasetCache,

    /// Units, sector explanations and scenario descriptions.
    pub metadata: ScenarioMetadata,

    /// Version keys found in the data directory.
    pub versions: Vec<String>,

    /// Currently selected version key.
    pub version: Option<String>,

    /// Snapshot of the selected version (None until one loads).
    pub dataset: Option<Arc<Dataset>>,

    /// Colour map of the current snapshot.
    pub color_map: Option<ColorMap>,

    /// Selector options derived from the dataset.
    pub sector_options: Vec<Category>,
    pub combo_options: Vec<String>,
    pub region_options: Vec<Category>,

    /// Current selection.
    pub selected_combos: Vec<String>,
    pub sector: Option<String>,
    pub selected_regions: BTreeSet<String>,

    /// Pipeline output for the current selection.
    pub views: Vec<SeriesView>,

    /// Problems reading the data directory or the metadata files. Kept
    /// until the sources are read again.
    pub source_errors: Vec<String>,

    /// Outcome of the last dataset fetch or pipeline run.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: ExplorerConfig) -> Self {
        let cache = DatasetCache::new(
            config.data_dir.clone(),
            config.cache_ttl(),
            config.cache_capacity,
        );
        let mut state = Self {
            config,
            cache,
            metadata: ScenarioMetadata::default(),
            versions: Vec::new(),
            version: None,
            dataset: None,
            color_map: None,
            sector_options: Vec::new(),
            combo_options: Vec::new(),
            region_options: Vec::new(),
            selected_combos: Vec::new(),
            sector: None,
            selected_regions: BTreeSet::new(),
            views: Vec::new(),
            source_errors: Vec::new(),
            status_message: None,
        };
        state.read_sources();

        let initial = state
            .config
            .default_version
            .clone()
            .or_else(|| state.versions.first().cloned());
        if let Some(version) = initial {
            state.select_version(&version);
        }
        state
    }

    /// Point the viewer at another data directory and start over.
    pub fn set_data_dir(&mut self, dir: PathBuf) {
        info!("switching data directory to {}", dir.display());
        self.config.data_dir = dir;
        self.config.default_version = None;
        *self = Self::new(self.config.clone());
    }

    /// Re-read the metadata files and the list of versions.
    fn read_sources(&mut self) {
        self.source_errors.clear();

        match ScenarioMetadata::load(self.config.metadata_dir()) {
            Ok(metadata) => self.metadata = metadata,
            Err(e) => {
                error!("{e}");
                self.source_errors.push(format!("Error: {e}"));
            }
        }

        match self.cache.available_versions() {
            Ok(versions) => {
                if versions.is_empty() {
                    warn!("no dataset files found in {}", self.config.data_dir.display());
                    self.source_errors.push(format!(
                        "No .csv, .parquet or .json files in {}",
                        self.config.data_dir.display()
                    ));
                }
                self.versions = versions;
            }
            Err(e) => {
                warn!("could not list dataset versions: {e:#}");
                self.versions.clear();
                self.source_errors.push(format!("Error: {e:#}"));
            }
        }
    }

    /// Every message the UI should show, source problems first.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.source_errors
            .iter()
            .map(String::as_str)
            .chain(self.status_message.as_deref())
    }

    /// Switch to another dataset version, resetting the selection.
    pub fn select_version(&mut self, key: &str) {
        self.version = Some(key.to_string());
        self.dataset = None;
        self.color_map = None;
        if !self.fetch_dataset() {
            self.sector_options.clear();
            self.combo_options.clear();
            self.region_options.clear();
            self.views.clear();
            return;
        }
        let Some(dataset) = self.dataset.clone() else {
            return;
        };

        self.sector_options = dataset.sectors_for_display(&self.config.priority_sectors);
        self.combo_options = dataset.combo_options();
        let options = &self.combo_options;
        self.selected_combos.retain(|c| options.contains(c));
        if self.selected_combos.is_empty() {
            self.selected_combos.extend(self.combo_options.first().cloned());
        }

        let sector = self
            .sector
            .clone()
            .filter(|s| dataset.sectors.contains(s.as_str()))
            .or_else(|| self.sector_options.first().map(|s| s.to_string()));
        match sector {
            Some(sector) => self.set_sector(&sector),
            None => {
                self.sector = None;
                self.region_options.clear();
                self.refresh_views();
            }
        }
    }

    /// Re-read the sources, then drop the cached copy of the current version
    /// and load it again.
    pub fn reload(&mut self) {
        self.read_sources();
        if let Some(key) = self.version.clone() {
            self.cache.invalidate(&key);
            info!(
                "reloading '{key}' ({} versions still cached)",
                self.cache.entry_count()
            );
            self.select_version(&key);
        }
    }

    /// Look the current version up in the cache. The colour map is only
    /// rebuilt when the snapshot changes. Returns false on failure.
    fn fetch_dataset(&mut self) -> bool {
        let Some(key) = self.version.clone() else {
            return false;
        };
        match self.cache.get_dataset(&key) {
            Ok(dataset) => {
                let changed = self
                    .dataset
                    .as_ref()
                    .map_or(true, |current| !Arc::ptr_eq(current, &dataset));
                if changed {
                    self.color_map = Some(ColorMap::from_dataset(&dataset));
                    self.dataset = Some(dataset);
                }
                true
            }
            Err(e) => {
                self.status_message = Some(format!("Error: {e}"));
                self.dataset = None;
                self.color_map = None;
                false
            }
        }
    }

    /// Select a sector: refresh its region options, keep the still-valid
    /// selected regions and fall back to the default regions.
    ///
    /// `World` is always offered for a sector with data, since the pipeline
    /// synthesizes it when the file has none.
    pub fn set_sector(&mut self, sector: &str) {
        self.sector = Some(sector.to_string());
        self.region_options = self
            .dataset
            .as_ref()
            .map(|ds| ds.regions_for_sector(sector))
            .unwrap_or_default();
        if !self.region_options.is_empty() && !self.region_options.iter().any(|r| &**r == WORLD) {
            let pos = self.region_options.partition_point(|r| &**r < WORLD);
            self.region_options.insert(pos, Arc::from(WORLD));
        }

        let available: BTreeSet<&str> = self.region_options.iter().map(|r| &**r).collect();
        self.selected_regions.retain(|r| available.contains(r.as_str()));
        if self.selected_regions.is_empty() {
            self.selected_regions = self
                .config
                .default_regions
                .iter()
                .filter(|r| available.contains(r.as_str()))
                .cloned()
                .collect();
        }
        self.refresh_views();
    }

    pub fn toggle_combo(&mut self, combo: &str) {
        if let Some(pos) = self.selected_combos.iter().position(|c| c == combo) {
            self.selected_combos.remove(pos);
        } else {
            self.selected_combos.push(combo.to_string());
        }
        self.refresh_views();
    }

    pub fn toggle_region(&mut self, region: &str) {
        if !self.selected_regions.remove(region) {
            self.selected_regions.insert(region.to_string());
        }
        self.refresh_views();
    }

    /// Run the pipeline for the current selection.
    pub fn refresh_views(&mut self) {
        self.views.clear();
        if !self.fetch_dataset() {
            return;
        }
        let (Some(dataset), Some(sector)) = (&self.dataset, &self.sector) else {
            return;
        };
        let regions: Vec<String> = self.selected_regions.iter().cloned().collect();

        match build_views(dataset, sector, &self.selected_combos, &regions) {
            Ok(views) => {
                self.views = views;
                self.status_message = None;
            }
            Err(e) => {
                error!("{e}");
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }
}
