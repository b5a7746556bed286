use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::cache::{CacheStats, MemoizationCache};

use super::model::{GroupKey, NumericField};
use super::query::{Subset, SubsetKey};

/// Percentiles reported by [`Metric::Percentiles`].
pub const PERCENTILES: [f64; 6] = [0.10, 0.25, 0.50, 0.75, 0.90, 0.99];

// ---------------------------------------------------------------------------
// Metric / values
// ---------------------------------------------------------------------------

/// Value computed per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Rows in the group.
    Count,
    Mean(NumericField),
    Sum(NumericField),
    /// Count, mean, std, min, [`PERCENTILES`], max of a field.
    Percentiles(NumericField),
}

/// Summary of one numeric column, in the layout of a describe table.
#[derive(Debug, Clone, PartialEq)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` for fewer than two values.
    pub std: Option<f64>,
    pub min: f64,
    /// Values at [`PERCENTILES`], same order.
    pub percentiles: [f64; PERCENTILES.len()],
    pub max: f64,
}

impl Describe {
    /// `None` when `values` is empty.
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let std = (n > 1).then(|| {
            let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        });

        Some(Describe {
            count: n,
            mean,
            std,
            min: sorted[0],
            percentiles: PERCENTILES.map(|p| quantile(&sorted, p)),
            max: sorted[n - 1],
        })
    }

    /// The 50th percentile.
    pub fn median(&self) -> f64 {
        self.percentiles[2]
    }
}

/// Linear interpolation between closest ranks of an ascending slice.
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupValue {
    Count(usize),
    Mean(f64),
    Sum(f64),
    Describe(Describe),
}

impl GroupValue {
    /// Scalar used for ranking; percentile tables rank by median.
    pub fn score(&self) -> f64 {
        match self {
            GroupValue::Count(n) => *n as f64,
            GroupValue::Mean(v) | GroupValue::Sum(v) => *v,
            GroupValue::Describe(d) => d.median(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    pub label: String,
    /// Subset rows in the group, whether or not they carry the metric field.
    pub rows: usize,
    pub value: GroupValue,
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// Grouped statistics. Groups are in the dataset's first-seen label order;
/// groups with no rows (or no values for the metric field) are absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub group_key: GroupKey,
    pub metric: Metric,
    pub groups: Vec<GroupRow>,
}

impl Aggregate {
    pub(crate) fn compute(subset: &Subset, group_key: GroupKey, metric: Metric) -> Self {
        let field = match metric {
            Metric::Count => None,
            Metric::Mean(f) | Metric::Sum(f) | Metric::Percentiles(f) => Some(f),
        };

        let mut buckets: HashMap<&str, (usize, Vec<f64>)> = HashMap::new();
        for listing in subset.iter() {
            let bucket = buckets.entry(listing.category(group_key)).or_default();
            bucket.0 += 1;
            if let Some(v) = field.and_then(|f| listing.numeric(f)) {
                bucket.1.push(v);
            }
        }

        let dataset = subset.dataset();
        let mut ordered: Vec<(usize, &str, (usize, Vec<f64>))> = buckets
            .into_iter()
            .map(|(label, bucket)| {
                let pos = dataset
                    .category_position(group_key, label)
                    .unwrap_or(usize::MAX);
                (pos, label, bucket)
            })
            .collect();
        ordered.sort_by_key(|(pos, _, _)| *pos);

        let groups = ordered
            .into_iter()
            .filter_map(|(_, label, (rows, values))| {
                let value = match metric {
                    Metric::Count => GroupValue::Count(rows),
                    Metric::Mean(_) if values.is_empty() => return None,
                    Metric::Mean(_) => {
                        GroupValue::Mean(values.iter().sum::<f64>() / values.len() as f64)
                    }
                    Metric::Sum(_) if values.is_empty() => return None,
                    Metric::Sum(_) => GroupValue::Sum(values.iter().sum()),
                    Metric::Percentiles(_) => GroupValue::Describe(Describe::of(&values)?),
                };
                Some(GroupRow {
                    label: label.to_string(),
                    rows,
                    value,
                })
            })
            .collect();

        Aggregate {
            group_key,
            metric,
            groups,
        }
    }

    pub fn get(&self, label: &str) -> Option<&GroupRow> {
        self.groups.iter().find(|g| g.label == label)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups sorted by metric descending, ties in first-seen order, cut at `n`.
    pub fn top(&self, n: usize) -> Vec<&GroupRow> {
        let mut ranked: Vec<&GroupRow> = self.groups.iter().collect();
        ranked.sort_by(|a, b| b.value.score().total_cmp(&a.value.score()));
        ranked.truncate(n);
        ranked
    }
}

// ---------------------------------------------------------------------------
// Share table – percentage of an inner group within an outer group
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ShareRow {
    pub outer: String,
    pub inner: String,
    pub count: usize,
    /// `count / count(outer) * 100`
    pub percentage: f64,
}

/// Counts of `inner` within each `outer` group, e.g. room types per district.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareTable {
    pub outer_key: GroupKey,
    pub inner_key: GroupKey,
    pub rows: Vec<ShareRow>,
}

impl ShareTable {
    pub(crate) fn compute(subset: &Subset, outer_key: GroupKey, inner_key: GroupKey) -> Self {
        let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
        let mut totals: HashMap<&str, usize> = HashMap::new();
        for listing in subset.iter() {
            let outer = listing.category(outer_key);
            *counts.entry((outer, listing.category(inner_key))).or_default() += 1;
            *totals.entry(outer).or_default() += 1;
        }

        let dataset = subset.dataset();
        let position = |key: GroupKey, label: &str| {
            dataset.category_position(key, label).unwrap_or(usize::MAX)
        };

        let mut rows: Vec<ShareRow> = counts
            .into_iter()
            .map(|((outer, inner), count)| ShareRow {
                outer: outer.to_string(),
                inner: inner.to_string(),
                count,
                percentage: 100.0 * count as f64 / totals[outer] as f64,
            })
            .collect();
        rows.sort_by_key(|r| (position(outer_key, &r.outer), position(inner_key, &r.inner)));

        ShareTable {
            outer_key,
            inner_key,
            rows,
        }
    }

    /// Rows belonging to one outer group.
    pub fn within<'a>(&'a self, outer: &'a str) -> impl Iterator<Item = &'a ShareRow> + 'a {
        self.rows.iter().filter(move |r| r.outer == outer)
    }
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

/// Equal-width bin counts over `[low, high]`; the top edge is inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub low: f64,
    pub width: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    /// Lower edge of bin `i`.
    pub fn edge(&self, i: usize) -> f64 {
        self.low + self.width * i as f64
    }
}

/// Bin `field` of `subset`. Values outside the range and rows without the
/// field are ignored. A degenerate range (`low == high`) yields one bin.
pub fn histogram(subset: &Subset, field: NumericField, bins: usize, (low, high): (f64, f64)) -> Histogram {
    if bins == 0 || !(low <= high) {
        return Histogram {
            low,
            width: 0.0,
            counts: Vec::new(),
        };
    }
    let bins = if low == high { 1 } else { bins };
    let width = (high - low) / bins as f64;
    let mut counts = vec![0usize; bins];

    for v in subset.iter().filter_map(|l| l.numeric(field)) {
        if v < low || v > high {
            continue;
        }
        let idx = if width > 0.0 {
            (((v - low) / width) as usize).min(bins - 1)
        } else {
            0
        };
        counts[idx] += 1;
    }

    Histogram { low, width, counts }
}

// ---------------------------------------------------------------------------
// AggregationEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AggregateKey {
    subset: SubsetKey,
    group_key: GroupKey,
    metric: Metric,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ShareKey {
    subset: SubsetKey,
    outer: GroupKey,
    inner: GroupKey,
}

/// Range bounds are keyed by bit pattern, `-0.0` folded into `0.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HistogramKey {
    subset: SubsetKey,
    field: NumericField,
    bins: usize,
    range: (u64, u64),
}

/// Computes grouped statistics over subsets, memoized per
/// `(subset identity, group key, metric)`.
#[derive(Default)]
pub struct AggregationEngine {
    aggregates: MemoizationCache<AggregateKey, Aggregate>,
    shares: MemoizationCache<ShareKey, ShareTable>,
    histograms: MemoizationCache<HistogramKey, Histogram>,
    evaluations: AtomicUsize,
}

impl AggregationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregate(&self, subset: &Subset, group_key: GroupKey, metric: Metric) -> Arc<Aggregate> {
        let key = AggregateKey {
            subset: subset.key().clone(),
            group_key,
            metric,
        };
        self.aggregates.get_or_compute(key, || {
            self.evaluations.fetch_add(1, Ordering::Relaxed);
            let aggregate = Aggregate::compute(subset, group_key, metric);
            log::debug!(
                "aggregate {:?} by {} over {} rows -> {} groups",
                metric,
                group_key.label(),
                subset.len(),
                aggregate.groups.len()
            );
            aggregate
        })
    }

    pub fn share(&self, subset: &Subset, outer: GroupKey, inner: GroupKey) -> Arc<ShareTable> {
        let key = ShareKey {
            subset: subset.key().clone(),
            outer,
            inner,
        };
        self.shares.get_or_compute(key, || {
            self.evaluations.fetch_add(1, Ordering::Relaxed);
            ShareTable::compute(subset, outer, inner)
        })
    }

    pub fn histogram(
        &self,
        subset: &Subset,
        field: NumericField,
        bins: usize,
        (low, high): (f64, f64),
    ) -> Arc<Histogram> {
        let key = HistogramKey {
            subset: subset.key().clone(),
            field,
            bins,
            range: ((low + 0.0).to_bits(), (high + 0.0).to_bits()),
        };
        self.histograms.get_or_compute(key, || {
            self.evaluations.fetch_add(1, Ordering::Relaxed);
            histogram(subset, field, bins, (low, high))
        })
    }

    /// How many aggregates, share tables or histograms were actually computed.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn cache_stats(&self) -> CacheStats {
        let a = self.aggregates.stats();
        let s = self.shares.stats();
        let h = self.histograms.stats();
        CacheStats {
            hits: a.hits + s.hits + h.hits,
            misses: a.misses + s.misses + h.misses,
        }
    }

    pub fn invalidate(&self) {
        self.aggregates.invalidate();
        self.shares.invalidate();
        self.histograms.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::FilterSpec;
    use crate::data::model::{Dataset, Listing};
    use crate::data::query::QueryEngine;

    fn listing(host: &str, district: &str, room_type: &str, price: f64) -> Listing {
        Listing {
            host_name: host.to_string(),
            neighbourhood_group: district.to_string(),
            room_type: room_type.to_string(),
            price,
            ..Listing::default()
        }
    }

    fn subset(listings: Vec<Listing>) -> Arc<Subset> {
        let ds = Arc::new(Dataset::from_listings("mem", listings));
        QueryEngine::new().filter(&ds, &FilterSpec::all())
    }

    #[test]
    fn describe_matches_linear_interpolation() {
        let d = Describe::of(&[4.0, 1.0, 3.0, 2.0, 5.0]).unwrap();
        assert_eq!(d.count, 5);
        assert_eq!(d.mean, 3.0);
        assert_eq!(d.min, 1.0);
        assert_eq!(d.max, 5.0);
        assert!((d.std.unwrap() - 2.5f64.sqrt()).abs() < 1e-12);
        assert!((d.percentiles[0] - 1.4).abs() < 1e-12);
        assert_eq!(d.median(), 3.0);
        assert!((d.percentiles[5] - 4.96).abs() < 1e-12);
        assert!(Describe::of(&[]).is_none());
        assert_eq!(Describe::of(&[7.0]).unwrap().std, None);
    }

    #[test]
    fn groups_follow_dataset_first_seen_order() {
        let s = subset(vec![
            listing("h1", "Queens", "B", 10.0),
            listing("h2", "Bronx", "A", 20.0),
            listing("h3", "Queens", "A", 30.0),
        ]);
        let agg = AggregationEngine::new().aggregate(&s, GroupKey::RoomType, Metric::Mean(NumericField::Price));
        let labels: Vec<&str> = agg.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, ["B", "A"]);
        assert_eq!(agg.get("A").unwrap().value, GroupValue::Mean(25.0));
    }

    #[test]
    fn ranking_ties_are_deterministic() {
        let s = subset(vec![
            listing("zoe", "Queens", "A", 1.0),
            listing("adam", "Queens", "A", 1.0),
            listing("mia", "Queens", "A", 1.0),
            listing("adam", "Queens", "A", 1.0),
            listing("zoe", "Queens", "A", 1.0),
        ]);
        let engine = AggregationEngine::new();
        for _ in 0..3 {
            let agg = engine.aggregate(&s, GroupKey::HostName, Metric::Count);
            let top: Vec<&str> = agg.top(2).iter().map(|g| g.label.as_str()).collect();
            assert_eq!(top, ["zoe", "adam"]);
        }
        assert_eq!(engine.evaluations(), 1);
    }

    #[test]
    fn shares_sum_to_one_hundred_per_district() {
        let s = subset(vec![
            listing("a", "Queens", "Private room", 1.0),
            listing("b", "Queens", "Entire home/apt", 1.0),
            listing("c", "Queens", "Private room", 1.0),
            listing("d", "Bronx", "Shared room", 1.0),
            listing("e", "Queens", "Shared room", 1.0),
            listing("f", "Bronx", "Private room", 1.0),
            listing("g", "Bronx", "Private room", 1.0),
        ]);
        let table = AggregationEngine::new().share(&s, GroupKey::District, GroupKey::RoomType);
        for district in ["Queens", "Bronx"] {
            let total: f64 = table.within(district).map(|r| r.percentage).sum();
            assert!((total - 100.0).abs() < 1e-6, "{district}: {total}");
        }
        let first = &table.rows[0];
        assert_eq!((first.outer.as_str(), first.inner.as_str(), first.count), ("Queens", "Private room", 2));
    }

    #[test]
    fn histogram_includes_top_edge() {
        let s = subset(vec![
            listing("a", "Q", "A", 0.0),
            listing("b", "Q", "A", 5.0),
            listing("c", "Q", "A", 10.0),
            listing("d", "Q", "A", 11.0),
        ]);
        let h = histogram(&s, NumericField::Price, 2, (0.0, 10.0));
        assert_eq!(h.counts, vec![1, 2]);
        assert_eq!(h.edge(1), 5.0);
        assert!(histogram(&s, NumericField::Price, 0, (0.0, 10.0)).counts.is_empty());
    }

    #[test]
    fn histogram_is_memoized_per_range() {
        let s = subset(vec![listing("a", "Q", "A", 3.0), listing("b", "Q", "A", 8.0)]);
        let engine = AggregationEngine::new();
        let first = engine.histogram(&s, NumericField::Price, 10, (0.0, 10.0));
        let again = engine.histogram(&s, NumericField::Price, 10, (0.0, 10.0));
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(engine.evaluations(), 1);

        let narrower = engine.histogram(&s, NumericField::Price, 10, (0.0, 5.0));
        assert_eq!(narrower.counts.iter().sum::<usize>(), 1);
        assert_eq!(engine.evaluations(), 2);
    }
}
