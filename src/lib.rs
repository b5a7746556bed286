//! Filtering, aggregation and memoization engine behind the listings dashboard.

pub mod cache;
pub mod data;

pub use data::aggregate::{Aggregate, AggregationEngine, Describe, GroupRow, GroupValue, Metric, ShareTable};
pub use data::explorer::Explorer;
pub use data::filter::{Constraint, FilterParams, FilterSpec, InvalidRangeError, PredicateBuilder};
pub use data::loader::LoadError;
pub use data::model::{Column, Dataset, DatasetId, GroupKey, Listing, NumericField};
pub use data::query::{QueryEngine, Subset};
