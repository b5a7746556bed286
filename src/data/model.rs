use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use chrono::NaiveDate;
use serde::Serialize;

// ---------------------------------------------------------------------------
// DatasetId – identity of one load
// ---------------------------------------------------------------------------

static NEXT_DATASET_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a loaded [`Dataset`]. Every load, including a re-read of the
/// same file, gets a fresh id; all derived results are keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatasetId(u64);

impl DatasetId {
    fn next() -> Self {
        DatasetId(NEXT_DATASET_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ds#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Field selectors
// ---------------------------------------------------------------------------

/// Numeric listing attributes usable in means, percentiles and rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NumericField {
    Price,
    MinimumNights,
    NumberOfReviews,
    Availability365,
    Latitude,
    Longitude,
}

impl NumericField {
    pub fn label(self) -> &'static str {
        match self {
            NumericField::Price => "price",
            NumericField::MinimumNights => "minimum_nights",
            NumericField::NumberOfReviews => "number_of_reviews",
            NumericField::Availability365 => "availability_365",
            NumericField::Latitude => "latitude",
            NumericField::Longitude => "longitude",
        }
    }
}

/// Categorical listing attributes usable as a grouping dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    RoomType,
    /// `neighbourhood_group`
    District,
    Neighbourhood,
    HostName,
}

impl GroupKey {
    pub const ALL: [GroupKey; 4] = [
        GroupKey::RoomType,
        GroupKey::District,
        GroupKey::Neighbourhood,
        GroupKey::HostName,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GroupKey::RoomType => "room_type",
            GroupKey::District => "neighbourhood_group",
            GroupKey::Neighbourhood => "neighbourhood",
            GroupKey::HostName => "host_name",
        }
    }
}

/// Every column of the listings table, in source file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Id,
    Name,
    HostName,
    District,
    Neighbourhood,
    Latitude,
    Longitude,
    RoomType,
    Price,
    MinimumNights,
    NumberOfReviews,
    LastReview,
    Availability365,
}

impl Column {
    pub const ALL: [Column; 13] = [
        Column::Id,
        Column::Name,
        Column::HostName,
        Column::District,
        Column::Neighbourhood,
        Column::Latitude,
        Column::Longitude,
        Column::RoomType,
        Column::Price,
        Column::MinimumNights,
        Column::NumberOfReviews,
        Column::LastReview,
        Column::Availability365,
    ];

    /// Columns shown by default in the "first records" view.
    pub const DEFAULT_VIEW: [Column; 6] = [
        Column::Price,
        Column::MinimumNights,
        Column::RoomType,
        Column::Neighbourhood,
        Column::Name,
        Column::NumberOfReviews,
    ];

    /// Header name in the source file.
    pub fn source_name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Name => "name",
            Column::HostName => "host_name",
            Column::District => "neighbourhood_group",
            Column::Neighbourhood => "neighbourhood",
            Column::Latitude => "latitude",
            Column::Longitude => "longitude",
            Column::RoomType => "room_type",
            Column::Price => "price",
            Column::MinimumNights => "minimum_nights",
            Column::NumberOfReviews => "number_of_reviews",
            Column::LastReview => "last_review",
            Column::Availability365 => "availability_365",
        }
    }

    /// Whether a source file must carry this column. Optional columns may be
    /// missing entirely; their values are then absent on every listing.
    pub fn is_required(self) -> bool {
        !matches!(
            self,
            Column::Name | Column::Latitude | Column::Longitude | Column::LastReview
        )
    }
}

// ---------------------------------------------------------------------------
// FieldValue – a single typed cell, for projection and export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Null,
}

impl fmt::Display for FieldValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Null => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Listing – one row of the source table
// ---------------------------------------------------------------------------

/// A single rental listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Listing {
    pub id: String,
    pub name: String,
    pub host_name: String,
    /// District (`neighbourhood_group`).
    pub neighbourhood_group: String,
    pub neighbourhood: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub room_type: String,
    /// Nightly price, never negative.
    pub price: f64,
    pub minimum_nights: u32,
    pub number_of_reviews: u32,
    /// Absent for listings without reviews.
    pub last_review: Option<NaiveDate>,
    /// Days available in the next year, within `0..=365`.
    pub availability_365: u16,
}

impl Listing {
    pub fn numeric(&self, field: NumericField) -> Option<f64> {
        match field {
            NumericField::Price => Some(self.price),
            NumericField::MinimumNights => Some(f64::from(self.minimum_nights)),
            NumericField::NumberOfReviews => Some(f64::from(self.number_of_reviews)),
            NumericField::Availability365 => Some(f64::from(self.availability_365)),
            NumericField::Latitude => self.latitude,
            NumericField::Longitude => self.longitude,
        }
    }

    pub fn category(&self, key: GroupKey) -> &str {
        match key {
            GroupKey::RoomType => &self.room_type,
            GroupKey::District => &self.neighbourhood_group,
            GroupKey::Neighbourhood => &self.neighbourhood,
            GroupKey::HostName => &self.host_name,
        }
    }

    /// Both coordinates, when the listing has them.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }

    pub fn value(&self, column: Column) -> FieldValue<'_> {
        match column {
            Column::Id => FieldValue::Text(&self.id),
            Column::Name => FieldValue::Text(&self.name),
            Column::HostName => FieldValue::Text(&self.host_name),
            Column::District => FieldValue::Text(&self.neighbourhood_group),
            Column::Neighbourhood => FieldValue::Text(&self.neighbourhood),
            Column::Latitude => self.latitude.map_or(FieldValue::Null, FieldValue::Float),
            Column::Longitude => self.longitude.map_or(FieldValue::Null, FieldValue::Float),
            Column::RoomType => FieldValue::Text(&self.room_type),
            Column::Price => FieldValue::Float(self.price),
            Column::MinimumNights => FieldValue::Integer(i64::from(self.minimum_nights)),
            Column::NumberOfReviews => FieldValue::Integer(i64::from(self.number_of_reviews)),
            Column::LastReview => self.last_review.map_or(FieldValue::Null, FieldValue::Date),
            Column::Availability365 => FieldValue::Integer(i64::from(self.availability_365)),
        }
    }
}

// ---------------------------------------------------------------------------
// Category index – distinct labels in first-seen order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct CategoryIndex {
    labels: Vec<String>,
    positions: HashMap<String, usize>,
}

impl CategoryIndex {
    fn observe(&mut self, label: &str) {
        if !self.positions.contains_key(label) {
            self.positions.insert(label.to_string(), self.labels.len());
            self.labels.push(label.to_string());
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The immutable listing table plus pre-computed category indices.
#[derive(Debug)]
pub struct Dataset {
    id: DatasetId,
    source: PathBuf,
    loaded_at: SystemTime,
    listings: Vec<Listing>,
    categories: BTreeMap<GroupKey, CategoryIndex>,
}

impl Dataset {
    /// Build a dataset with a fresh identity from already validated listings.
    pub fn from_listings(source: impl AsRef<Path>, listings: Vec<Listing>) -> Self {
        let mut categories: BTreeMap<GroupKey, CategoryIndex> = GroupKey::ALL
            .iter()
            .map(|&key| (key, CategoryIndex::default()))
            .collect();

        for listing in &listings {
            for (&key, index) in categories.iter_mut() {
                index.observe(listing.category(key));
            }
        }

        Dataset {
            id: DatasetId::next(),
            source: source.as_ref().to_path_buf(),
            loaded_at: SystemTime::now(),
            listings,
            categories,
        }
    }

    pub fn id(&self) -> DatasetId {
        self.id
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn get(&self, index: usize) -> Option<&Listing> {
        self.listings.get(index)
    }

    /// Number of listings.
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    /// Distinct values of `key` in first-seen order.
    pub fn categories(&self, key: GroupKey) -> &[String] {
        self.categories
            .get(&key)
            .map(|index| index.labels.as_slice())
            .unwrap_or(&[])
    }

    /// Position of `label` in the first-seen order of `key`.
    pub fn category_position(&self, key: GroupKey, label: &str) -> Option<usize> {
        self.categories.get(&key)?.positions.get(label).copied()
    }

    pub fn contains_category(&self, key: GroupKey, label: &str) -> bool {
        self.category_position(key, label).is_some()
    }

    /// Smallest and largest price, `None` when empty.
    pub fn price_range(&self) -> Option<(f64, f64)> {
        self.listings.iter().map(|l| l.price).fold(None, |acc, p| match acc {
            None => Some((p, p)),
            Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
        })
    }
}
