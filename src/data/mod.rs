/// Data layer: listing model, loading, filtering and aggregation.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────────┐
///   │ loader/store │  parse file → Dataset (once per source)
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  FilterParams → FilterSpec (validated constraints)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  query    │  Dataset × FilterSpec → Subset (memoized)
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ aggregate  │  Subset × GroupKey × Metric → Aggregate (memoized)
///   └───────────┘
/// ```
///
/// [`explorer::Explorer`] wires these together and owns the caches.

pub mod aggregate;
pub mod explorer;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod query;
pub mod store;
