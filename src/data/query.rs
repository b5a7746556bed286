use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cache::{CacheStats, MemoizationCache};

use super::filter::FilterSpec;
use super::model::{Column, Dataset, DatasetId, Listing, NumericField};

// ---------------------------------------------------------------------------
// Subset – ordered filtered view of a dataset
// ---------------------------------------------------------------------------

/// Identity of a subset: the dataset it was drawn from and the spec applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubsetKey {
    pub dataset: DatasetId,
    pub spec: FilterSpec,
}

/// Rows of a [`Dataset`] that satisfy a [`FilterSpec`], in dataset order.
#[derive(Debug)]
pub struct Subset {
    dataset: Arc<Dataset>,
    key: SubsetKey,
    indices: Vec<usize>,
}

impl Subset {
    pub(crate) fn compute(dataset: &Arc<Dataset>, spec: &FilterSpec) -> Self {
        let indices = if spec.is_empty() {
            (0..dataset.len()).collect()
        } else {
            dataset
                .listings()
                .iter()
                .enumerate()
                .filter(|(_, listing)| spec.matches(listing))
                .map(|(i, _)| i)
                .collect()
        };
        Subset {
            dataset: Arc::clone(dataset),
            key: SubsetKey {
                dataset: dataset.id(),
                spec: spec.clone(),
            },
            indices,
        }
    }

    pub fn key(&self) -> &SubsetKey {
        &self.key
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.key.spec
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    /// Row positions in the source dataset.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Listing> + '_ {
        let listings = self.dataset.listings();
        self.indices.iter().map(move |&i| &listings[i])
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> impl Iterator<Item = &Listing> + '_ {
        self.iter().take(n)
    }

    /// The `n` listings with the largest `field`; ties keep dataset order.
    /// Listings without a value for `field` are skipped.
    pub fn top_by(&self, field: NumericField, n: usize) -> Vec<&Listing> {
        let mut ranked: Vec<(f64, &Listing)> = self
            .iter()
            .filter_map(|l| l.numeric(field).map(|v| (v, l)))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.into_iter().take(n).map(|(_, l)| l).collect()
    }

    /// Latitude/longitude pairs of rows that have both.
    pub fn coordinates(&self) -> Vec<(f64, f64)> {
        self.iter().filter_map(Listing::coordinates).collect()
    }

    /// First `n` rows rendered as text for the chosen columns.
    pub fn project(&self, columns: &[Column], n: usize) -> Vec<Vec<String>> {
        self.head(n)
            .map(|l| columns.iter().map(|&c| l.value(c).to_string()).collect())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// QueryEngine
// ---------------------------------------------------------------------------

/// Applies filter specs to datasets, memoizing each `(dataset, spec)` result.
#[derive(Default)]
pub struct QueryEngine {
    cache: MemoizationCache<SubsetKey, Subset>,
    evaluations: AtomicUsize,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of `dataset` matching every constraint of `spec`, in dataset order.
    /// Structurally equal specs share one cached [`Subset`].
    pub fn filter(&self, dataset: &Arc<Dataset>, spec: &FilterSpec) -> Arc<Subset> {
        let key = SubsetKey {
            dataset: dataset.id(),
            spec: spec.clone(),
        };
        self.cache.get_or_compute(key, || {
            self.evaluations.fetch_add(1, Ordering::Relaxed);
            let subset = Subset::compute(dataset, spec);
            log::debug!(
                "filter {} [{spec}] -> {}/{} rows",
                dataset.id(),
                subset.len(),
                dataset.len()
            );
            subset
        })
    }

    /// How many times a subset was actually computed.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn invalidate(&self) {
        self.cache.invalidate();
    }
}
