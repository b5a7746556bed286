use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use thiserror::Error;

use super::model::{Dataset, GroupKey, Listing};

// ---------------------------------------------------------------------------
// Bound – an f64 usable inside hashed / ordered cache keys
// ---------------------------------------------------------------------------

/// Finite `f64` with total ordering so constraints can be compared and hashed.
#[derive(Debug, Clone, Copy)]
pub struct Bound(f64);

impl Bound {
    pub fn value(self) -> f64 {
        self.0
    }
}

// -- Manual Eq/Ord/Hash so Bound can sit in a BTreeSet and a HashMap key --

impl PartialEq for Bound {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Bound {}

impl PartialOrd for Bound {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Bound {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Bound {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Constraint – one discrete predicate over a listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Constraint {
    /// `low <= price <= high`
    PriceBetween { low: Bound, high: Bound },
    /// `price < ceiling`, the "not expensive" toggle.
    PriceBelow(Bound),
    MinimumNightsAtMost(u32),
    ReviewsAtLeast(u32),
    ReviewsAtMost(u32),
    RoomType(String),
    District(String),
    /// `availability_365 > 0`
    Available,
    HasLastReview,
    /// `from <= last_review <= to`
    LastReviewBetween { from: NaiveDate, to: NaiveDate },
}

impl Constraint {
    pub fn matches(&self, listing: &Listing) -> bool {
        match self {
            Constraint::PriceBetween { low, high } => {
                low.value() <= listing.price && listing.price <= high.value()
            }
            Constraint::PriceBelow(ceiling) => listing.price < ceiling.value(),
            Constraint::MinimumNightsAtMost(n) => listing.minimum_nights <= *n,
            Constraint::ReviewsAtLeast(n) => listing.number_of_reviews >= *n,
            Constraint::ReviewsAtMost(n) => listing.number_of_reviews <= *n,
            Constraint::RoomType(t) => listing.room_type == *t,
            Constraint::District(d) => listing.neighbourhood_group == *d,
            Constraint::Available => listing.availability_365 > 0,
            Constraint::HasLastReview => listing.last_review.is_some(),
            Constraint::LastReviewBetween { from, to } => listing
                .last_review
                .is_some_and(|date| *from <= date && date <= *to),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::PriceBetween { low, high } => write!(f, "{low} <= price <= {high}"),
            Constraint::PriceBelow(c) => write!(f, "price < {c}"),
            Constraint::MinimumNightsAtMost(n) => write!(f, "minimum_nights <= {n}"),
            Constraint::ReviewsAtLeast(n) => write!(f, "number_of_reviews >= {n}"),
            Constraint::ReviewsAtMost(n) => write!(f, "number_of_reviews <= {n}"),
            Constraint::RoomType(t) => write!(f, "room_type == {t:?}"),
            Constraint::District(d) => write!(f, "neighbourhood_group == {d:?}"),
            Constraint::Available => write!(f, "availability_365 > 0"),
            Constraint::HasLastReview => write!(f, "last_review present"),
            Constraint::LastReviewBetween { from, to } => {
                write!(f, "{from} <= last_review <= {to}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FilterSpec – conjunction of constraints
// ---------------------------------------------------------------------------

/// Immutable conjunction of [`Constraint`]s. Two specs built from the same
/// parameters compare and hash equal regardless of build order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterSpec {
    constraints: BTreeSet<Constraint>,
}

impl FilterSpec {
    /// The empty spec: matches every listing.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        self.constraints.iter().all(|c| c.matches(listing))
    }

    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

impl fmt::Display for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraints.is_empty() {
            return write!(f, "<all>");
        }
        for (i, c) in self.constraints.iter().enumerate() {
            if i > 0 {
                write!(f, " and ")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FilterParams – raw user selections
// ---------------------------------------------------------------------------

/// User-chosen parameter values. Unset fields are not constrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterParams {
    pub price: Option<(f64, f64)>,
    pub price_below: Option<f64>,
    pub max_minimum_nights: Option<u32>,
    pub min_reviews: Option<u32>,
    pub max_reviews: Option<u32>,
    pub room_type: Option<String>,
    pub district: Option<String>,
    pub available_only: bool,
    pub reviewed_only: bool,
    pub last_review: Option<(NaiveDate, NaiveDate)>,
}

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn price(mut self, low: f64, high: f64) -> Self {
        self.price = Some((low, high));
        self
    }

    pub fn price_below(mut self, ceiling: f64) -> Self {
        self.price_below = Some(ceiling);
        self
    }

    pub fn max_minimum_nights(mut self, n: u32) -> Self {
        self.max_minimum_nights = Some(n);
        self
    }

    pub fn min_reviews(mut self, n: u32) -> Self {
        self.min_reviews = Some(n);
        self
    }

    pub fn max_reviews(mut self, n: u32) -> Self {
        self.max_reviews = Some(n);
        self
    }

    pub fn room_type(mut self, room_type: impl Into<String>) -> Self {
        self.room_type = Some(room_type.into());
        self
    }

    pub fn district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    pub fn available_only(mut self) -> Self {
        self.available_only = true;
        self
    }

    pub fn reviewed_only(mut self) -> Self {
        self.reviewed_only = true;
        self
    }

    pub fn last_review(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.last_review = Some((from, to));
        self
    }
}

// ---------------------------------------------------------------------------
// PredicateBuilder
// ---------------------------------------------------------------------------

/// Rejected filter parameters. The caller keeps its previous valid spec.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRangeError {
    #[error("{field}: lower bound {low} exceeds upper bound {high}")]
    Range {
        field: &'static str,
        low: String,
        high: String,
    },

    #[error("{field}: bound is not a finite number")]
    NotFinite { field: &'static str },

    #[error("{field}: '{value}' is not a known category")]
    UnknownCategory { field: &'static str, value: String },
}

/// Validates [`FilterParams`] against a dataset and turns them into a
/// [`FilterSpec`].
pub struct PredicateBuilder<'a> {
    dataset: &'a Dataset,
}

impl<'a> PredicateBuilder<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self { dataset }
    }

    pub fn build(&self, params: &FilterParams) -> Result<FilterSpec, InvalidRangeError> {
        let mut constraints = BTreeSet::new();

        if let Some((low, high)) = params.price {
            let (low, high) = ordered_range("price", low, high)?;
            constraints.insert(Constraint::PriceBetween { low, high });
        }
        if let Some(ceiling) = params.price_below {
            constraints.insert(Constraint::PriceBelow(finite("price", ceiling)?));
        }
        if let Some(n) = params.max_minimum_nights {
            constraints.insert(Constraint::MinimumNightsAtMost(n));
        }
        if let (Some(low), Some(high)) = (params.min_reviews, params.max_reviews) {
            if low > high {
                return Err(range_error("number_of_reviews", low, high));
            }
        }
        if let Some(n) = params.min_reviews {
            constraints.insert(Constraint::ReviewsAtLeast(n));
        }
        if let Some(n) = params.max_reviews {
            constraints.insert(Constraint::ReviewsAtMost(n));
        }
        if let Some(room_type) = &params.room_type {
            self.known(GroupKey::RoomType, room_type)?;
            constraints.insert(Constraint::RoomType(room_type.clone()));
        }
        if let Some(district) = &params.district {
            self.known(GroupKey::District, district)?;
            constraints.insert(Constraint::District(district.clone()));
        }
        if params.available_only {
            constraints.insert(Constraint::Available);
        }
        if params.reviewed_only {
            constraints.insert(Constraint::HasLastReview);
        }
        if let Some((from, to)) = params.last_review {
            if from > to {
                return Err(range_error("last_review", from, to));
            }
            constraints.insert(Constraint::LastReviewBetween { from, to });
        }

        Ok(FilterSpec { constraints })
    }

    fn known(&self, key: GroupKey, value: &str) -> Result<(), InvalidRangeError> {
        if self.dataset.contains_category(key, value) {
            Ok(())
        } else {
            Err(InvalidRangeError::UnknownCategory {
                field: key.label(),
                value: value.to_string(),
            })
        }
    }
}

fn finite(field: &'static str, value: f64) -> Result<Bound, InvalidRangeError> {
    if value.is_finite() {
        // Collapse -0.0 so it keys the same as 0.0.
        Ok(Bound(value + 0.0))
    } else {
        Err(InvalidRangeError::NotFinite { field })
    }
}

fn ordered_range(field: &'static str, low: f64, high: f64) -> Result<(Bound, Bound), InvalidRangeError> {
    let (low, high) = (finite(field, low)?, finite(field, high)?);
    if low > high {
        return Err(range_error(field, low, high));
    }
    Ok((low, high))
}

fn range_error(field: &'static str, low: impl ToString, high: impl ToString) -> InvalidRangeError {
    InvalidRangeError::Range {
        field,
        low: low.to_string(),
        high: high.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        let listing = |price: f64, room_type: &str, district: &str, reviews: u32| Listing {
            price,
            room_type: room_type.to_string(),
            neighbourhood_group: district.to_string(),
            number_of_reviews: reviews,
            ..Listing::default()
        };
        Dataset::from_listings(
            "mem",
            vec![
                listing(50.0, "Private room", "Brooklyn", 3),
                listing(120.0, "Entire home/apt", "Manhattan", 0),
            ],
        )
    }

    #[test]
    fn same_params_build_equal_specs() {
        let ds = dataset();
        let builder = PredicateBuilder::new(&ds);
        let a = FilterParams::new().price(10.0, 200.0).district("Brooklyn").available_only();
        let b = FilterParams::new().available_only().district("Brooklyn").price(10.0, 200.0);
        assert_eq!(builder.build(&a).unwrap(), builder.build(&b).unwrap());
    }

    #[test]
    fn inverted_price_range_is_rejected() {
        let ds = dataset();
        let err = PredicateBuilder::new(&ds)
            .build(&FilterParams::new().price(300.0, 100.0))
            .unwrap_err();
        assert!(matches!(err, InvalidRangeError::Range { field: "price", .. }));
    }

    #[test]
    fn inverted_review_window_is_rejected() {
        let ds = dataset();
        let err = PredicateBuilder::new(&ds)
            .build(&FilterParams::new().min_reviews(10).max_reviews(2))
            .unwrap_err();
        assert!(matches!(err, InvalidRangeError::Range { field: "number_of_reviews", .. }));
    }

    #[test]
    fn nan_bound_is_rejected() {
        let ds = dataset();
        let err = PredicateBuilder::new(&ds)
            .build(&FilterParams::new().price(f64::NAN, 10.0))
            .unwrap_err();
        assert_eq!(err, InvalidRangeError::NotFinite { field: "price" });
    }

    #[test]
    fn unknown_district_is_rejected() {
        let ds = dataset();
        let err = PredicateBuilder::new(&ds)
            .build(&FilterParams::new().district("Atlantis"))
            .unwrap_err();
        assert!(matches!(err, InvalidRangeError::UnknownCategory { field: "neighbourhood_group", .. }));
    }

    #[test]
    fn missing_review_date_never_matches_date_constraints() {
        let listing = Listing::default();
        let from = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2100, 1, 1).unwrap();
        assert!(!Constraint::HasLastReview.matches(&listing));
        assert!(!Constraint::LastReviewBetween { from, to }.matches(&listing));
    }

    #[test]
    fn degenerate_range_matches_exact_price_only() {
        let ds = dataset();
        let spec = PredicateBuilder::new(&ds)
            .build(&FilterParams::new().price(50.0, 50.0))
            .unwrap();
        let matched: Vec<f64> = ds
            .listings()
            .iter()
            .filter(|l| spec.matches(l))
            .map(|l| l.price)
            .collect();
        assert_eq!(matched, vec![50.0]);
    }

    #[test]
    fn spec_displays_as_conjunction() {
        let ds = dataset();
        let spec = PredicateBuilder::new(&ds)
            .build(&FilterParams::new().price_below(100.0).available_only())
            .unwrap();
        assert_eq!(spec.to_string(), "price < 100 and availability_365 > 0");
        assert_eq!(FilterSpec::all().to_string(), "<all>");
    }
}
