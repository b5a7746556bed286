use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use listing_explorer::data::aggregate::Histogram;
use listing_explorer::data::export::write_subset;
use listing_explorer::{
    Aggregate, Column, Dataset, Explorer, FilterParams, FilterSpec, GroupKey, Metric, NumericField,
    ShareTable, Subset,
};

use crate::color::ColorMap;
use crate::config::Config;

pub const HISTOGRAM_BINS: usize = 100;
pub const TOP_HOSTS: usize = 5;
pub const MOST_RATED_ROWS: usize = 50;

// ---------------------------------------------------------------------------
// Controls – raw widget values
// ---------------------------------------------------------------------------

/// Slider / radio / checkbox values, exactly as the user set them.
#[derive(Debug, Clone, PartialEq)]
pub struct Controls {
    pub map_price: (f64, f64),
    pub map_max_nights: u32,
    pub map_min_reviews: u32,
    pub columns: Vec<Column>,
    pub availability_district: String,
    pub include_expensive: bool,
    pub demand_room_type: String,
    pub all_room_types: bool,
    pub review_dates: (NaiveDate, NaiveDate),
    pub most_rated_max_reviews: u32,
    pub histogram_price: (f64, f64),
}

impl Controls {
    fn for_dataset(dataset: &Dataset, price_cap: f64) -> Self {
        let (lo, hi) = price_bounds(dataset, price_cap);
        let clamp = |v: f64| v.clamp(lo, hi);
        let dates = dataset.listings().iter().filter_map(|l| l.last_review);
        let review_dates = dates
            .clone()
            .min()
            .zip(dates.max())
            .unwrap_or((NaiveDate::MIN, NaiveDate::MAX));

        Self {
            map_price: (clamp(500.0), clamp(1500.0)),
            map_max_nights: 1,
            map_min_reviews: 0,
            columns: Column::DEFAULT_VIEW.to_vec(),
            availability_district: first_category(dataset, GroupKey::District),
            include_expensive: false,
            demand_room_type: first_category(dataset, GroupKey::RoomType),
            all_room_types: false,
            review_dates,
            most_rated_max_reviews: 100,
            histogram_price: (clamp(50.0), clamp(300.0)),
        }
    }
}

fn first_category(dataset: &Dataset, key: GroupKey) -> String {
    dataset.categories(key).first().cloned().unwrap_or_default()
}

/// Slider limits for price: dataset minimum to `min(dataset maximum, cap)`.
pub fn price_bounds(dataset: &Dataset, price_cap: f64) -> (f64, f64) {
    dataset
        .price_range()
        .map(|(lo, hi)| (lo, hi.min(price_cap).max(lo)))
        .unwrap_or((0.0, price_cap))
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// A filtered section: the last accepted spec and its subset.
#[derive(Debug, Default)]
pub struct FilteredView {
    pub spec: FilterSpec,
    pub subset: Option<Arc<Subset>>,
}

/// Everything the panels render, recomputed by [`AppState::refresh`].
#[derive(Debug, Default)]
pub struct Views {
    pub all: Option<Arc<Subset>>,
    pub map: FilteredView,
    pub district_price: Option<Arc<Aggregate>>,
    pub availability: Option<Arc<Aggregate>>,
    pub room_share: Option<Arc<ShareTable>>,
    pub room_price: Option<Arc<Aggregate>>,
    pub top_hosts: Option<Arc<Aggregate>>,
    pub demand: FilteredView,
    pub reviewed: FilteredView,
    pub most_rated: FilteredView,
    pub price_distribution: FilteredView,
    /// Price range of the last accepted distribution spec.
    pub histogram_range: Option<(f64, f64)>,
    pub histogram: Option<Arc<Histogram>>,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    pub config: Config,
    pub explorer: Explorer,
    pub dataset: Option<Arc<Dataset>>,
    pub controls: Option<Controls>,
    pub views: Views,
    /// Colours per district for the scatter plots.
    pub district_colors: Option<ColorMap>,
    pub room_type_colors: Option<ColorMap>,
    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            explorer: Explorer::new(config.expensive_threshold),
            config,
            dataset: None,
            controls: None,
            views: Views::default(),
            district_colors: None,
            room_type_colors: None,
            status_message: None,
        }
    }

    /// Load `path` and make it the active dataset. Errors go to the status bar.
    pub fn load(&mut self, path: &Path) {
        match self.explorer.load(path) {
            Ok(dataset) => self.set_dataset(dataset),
            Err(e) => {
                log::error!("Failed to load {}: {e}", path.display());
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    /// Re-read the current source from disk.
    pub fn reload(&mut self) {
        let Some(path) = self.dataset.as_ref().map(|ds| ds.source().to_path_buf()) else {
            return;
        };
        match self.explorer.reload(&path) {
            Ok(dataset) => self.set_dataset(dataset),
            Err(e) => self.status_message = Some(format!("Error: {e}")),
        }
    }

    /// Ingest a newly loaded dataset, reset controls and recompute.
    pub fn set_dataset(&mut self, dataset: Arc<Dataset>) {
        self.controls = Some(Controls::for_dataset(&dataset, self.config.price_cap));
        self.district_colors = Some(ColorMap::new(
            GroupKey::District.label(),
            dataset.categories(GroupKey::District),
        ));
        self.room_type_colors = Some(ColorMap::new(
            GroupKey::RoomType.label(),
            dataset.categories(GroupKey::RoomType),
        ));
        self.views = Views::default();
        self.explorer.adopt(&dataset);
        self.dataset = Some(dataset);
        self.status_message = None;
        self.refresh();
    }

    /// One recompute pass over every section. Unchanged specs hit the cache.
    pub fn refresh(&mut self) {
        let (Some(dataset), Some(c)) = (self.dataset.clone(), self.controls.clone()) else {
            return;
        };
        let explorer = &self.explorer;
        let mut errors: Vec<String> = Vec::new();

        let all = explorer.filter(&dataset, &FilterSpec::all());

        update(
            explorer,
            &dataset,
            &mut self.views.map,
            &FilterParams::new()
                .price(c.map_price.0, c.map_price.1)
                .max_minimum_nights(c.map_max_nights)
                .min_reviews(c.map_min_reviews),
            &mut errors,
        );

        let price = Metric::Mean(NumericField::Price);
        self.views.district_price = Some(explorer.aggregate(&all, GroupKey::District, price));
        self.views.room_share = Some(explorer.share(&all, GroupKey::District, GroupKey::RoomType));
        self.views.room_price = Some(explorer.aggregate(&all, GroupKey::RoomType, price));
        self.views.top_hosts = Some(explorer.aggregate(&all, GroupKey::HostName, Metric::Count));

        match explorer.availability(&dataset, &c.availability_district, c.include_expensive) {
            Ok(agg) => self.views.availability = Some(agg),
            Err(e) => errors.push(e.to_string()),
        }

        let (from, to) = c.review_dates;
        let reviewed = FilterParams::new().reviewed_only().last_review(from, to);
        let mut demand = reviewed.clone();
        if !c.all_room_types {
            demand = demand.room_type(c.demand_room_type.clone());
        }
        update(explorer, &dataset, &mut self.views.reviewed, &reviewed, &mut errors);
        update(explorer, &dataset, &mut self.views.demand, &demand, &mut errors);

        update(
            explorer,
            &dataset,
            &mut self.views.most_rated,
            &FilterParams::new().max_reviews(c.most_rated_max_reviews),
            &mut errors,
        );

        let (low, high) = c.histogram_price;
        if update(
            explorer,
            &dataset,
            &mut self.views.price_distribution,
            &FilterParams::new().price(low, high),
            &mut errors,
        ) {
            self.views.histogram_range = Some((low, high));
        }
        self.views.histogram = self
            .views
            .price_distribution
            .subset
            .as_ref()
            .zip(self.views.histogram_range)
            .map(|(s, range)| explorer.histogram(s, NumericField::Price, HISTOGRAM_BINS, range));

        self.views.all = Some(all);
        self.status_message = (!errors.is_empty()).then(|| errors.join("; "));
    }

    /// Write the listing-locations subset as a flat export.
    pub fn export(&self, path: &Path) -> Result<usize> {
        let subset = self
            .views
            .map
            .subset
            .as_ref()
            .context("no filtered listings to export")?;
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write_subset(subset, BufWriter::new(file)).context("writing export")?;
        log::info!("Exported {} listings to {}", subset.len(), path.display());
        Ok(subset.len())
    }

    pub fn source(&self) -> Option<PathBuf> {
        self.dataset.as_ref().map(|ds| ds.source().to_path_buf())
    }
}

/// Rebuild `view` from `params`. A rejected spec keeps the previous one;
/// returns whether `params` was accepted.
fn update(
    explorer: &Explorer,
    dataset: &Arc<Dataset>,
    view: &mut FilteredView,
    params: &FilterParams,
    errors: &mut Vec<String>,
) -> bool {
    let accepted = match explorer.build(dataset, params) {
        Ok(spec) => {
            view.spec = spec;
            true
        }
        Err(e) => {
            errors.push(e.to_string());
            false
        }
    };
    view.subset = Some(explorer.filter(dataset, &view.spec));
    accepted
}
