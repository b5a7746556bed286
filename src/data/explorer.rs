use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use super::aggregate::{histogram, Aggregate, AggregationEngine, Histogram, Metric, ShareTable};
use super::filter::{FilterParams, FilterSpec, InvalidRangeError, PredicateBuilder};
use super::loader::LoadError;
use super::model::{Dataset, DatasetId, GroupKey, NumericField};
use super::query::{QueryEngine, Subset};
use super::store::DatasetStore;

/// Listings priced at or above this are "expensive".
pub const DEFAULT_EXPENSIVE_THRESHOLD: f64 = 100.0;

/// One dataset store plus the memoized query and aggregation engines that
/// derive views from it. Caches live exactly as long as the dataset identity.
///
/// Only the active dataset (the last one loaded or adopted) is memoized.
/// Queries against any other dataset are evaluated but never cached, so a
/// stale `Arc<Dataset>` held across a reload cannot pin entries in the caches.
pub struct Explorer {
    store: DatasetStore,
    queries: QueryEngine,
    aggregates: AggregationEngine,
    active: RwLock<Option<DatasetId>>,
    expensive_threshold: f64,
}

impl Default for Explorer {
    fn default() -> Self {
        Self::new(DEFAULT_EXPENSIVE_THRESHOLD)
    }
}

impl Explorer {
    pub fn new(expensive_threshold: f64) -> Self {
        Self {
            store: DatasetStore::new(),
            queries: QueryEngine::new(),
            aggregates: AggregationEngine::new(),
            active: RwLock::new(None),
            expensive_threshold,
        }
    }

    /// Load `source` (reusing the current dataset for the same path).
    pub fn load(&self, source: &Path) -> Result<Arc<Dataset>, LoadError> {
        let dataset = self.store.load(source)?;
        self.adopt(&dataset);
        Ok(dataset)
    }

    /// Re-read `source`; every cached subset and aggregate is dropped.
    pub fn reload(&self, source: &Path) -> Result<Arc<Dataset>, LoadError> {
        let dataset = self.store.reload(source)?;
        self.adopt(&dataset);
        Ok(dataset)
    }

    /// Make `dataset` the one whose results are cached. Switching identity
    /// clears both engines.
    pub fn adopt(&self, dataset: &Dataset) {
        let mut active = self.active.write();
        if *active != Some(dataset.id()) {
            if let Some(previous) = active.replace(dataset.id()) {
                log::info!("Dataset {previous} replaced by {}; clearing caches", dataset.id());
            }
            self.queries.invalidate();
            self.aggregates.invalidate();
        }
    }

    pub fn dataset(&self) -> Option<Arc<Dataset>> {
        self.store.current()
    }

    pub fn expensive_threshold(&self) -> f64 {
        self.expensive_threshold
    }

    /// Validate `params` against `dataset`.
    pub fn build(&self, dataset: &Dataset, params: &FilterParams) -> Result<FilterSpec, InvalidRangeError> {
        PredicateBuilder::new(dataset).build(params).inspect_err(|e| {
            log::warn!("Rejected filter parameters: {e}");
        })
    }

    pub fn is_active(&self, id: DatasetId) -> bool {
        *self.active.read() == Some(id)
    }

    pub fn filter(&self, dataset: &Arc<Dataset>, spec: &FilterSpec) -> Arc<Subset> {
        let active = self.active.read();
        if *active == Some(dataset.id()) {
            self.queries.filter(dataset, spec)
        } else {
            log::warn!("{} is not the active dataset; filter result not cached", dataset.id());
            Arc::new(Subset::compute(dataset, spec))
        }
    }

    pub fn aggregate(&self, subset: &Subset, group_key: GroupKey, metric: Metric) -> Arc<Aggregate> {
        let active = self.active.read();
        if *active == Some(subset.key().dataset) {
            self.aggregates.aggregate(subset, group_key, metric)
        } else {
            Arc::new(Aggregate::compute(subset, group_key, metric))
        }
    }

    pub fn share(&self, subset: &Subset, outer: GroupKey, inner: GroupKey) -> Arc<ShareTable> {
        let active = self.active.read();
        if *active == Some(subset.key().dataset) {
            self.aggregates.share(subset, outer, inner)
        } else {
            Arc::new(ShareTable::compute(subset, outer, inner))
        }
    }

    pub fn histogram(
        &self,
        subset: &Subset,
        field: NumericField,
        bins: usize,
        range: (f64, f64),
    ) -> Arc<Histogram> {
        let active = self.active.read();
        if *active == Some(subset.key().dataset) {
            self.aggregates.histogram(subset, field, bins, range)
        } else {
            Arc::new(histogram(subset, field, bins, range))
        }
    }

    /// Availability percentiles for one district, over listings available at
    /// least one day. Unless `include_expensive`, only listings priced below
    /// the expensive threshold count.
    pub fn availability(
        &self,
        dataset: &Arc<Dataset>,
        district: &str,
        include_expensive: bool,
    ) -> Result<Arc<Aggregate>, InvalidRangeError> {
        let mut params = FilterParams::new().district(district).available_only();
        if !include_expensive {
            params = params.price_below(self.expensive_threshold);
        }
        let spec = self.build(dataset, &params)?;
        let subset = self.filter(dataset, &spec);
        Ok(self.aggregate(
            &subset,
            GroupKey::District,
            Metric::Percentiles(NumericField::Availability365),
        ))
    }

    pub fn queries(&self) -> &QueryEngine {
        &self.queries
    }

    pub fn aggregates(&self) -> &AggregationEngine {
        &self.aggregates
    }
}
