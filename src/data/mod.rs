/// Data layer: core types, loading, caching and the view pipeline.
///
/// Architecture:
/// ```text
///  <version>.csv / .parquet / .json
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  cache    │  version key → Arc<Dataset>, time-to-live
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  sector → World imputation → regions → SeriesView per combo
///   └──────────┘
/// ```

pub mod cache;
pub mod filter;
pub mod loader;
pub mod model;
