use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Date32Array, Float32Array, Float64Array, Int32Array,
    Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::model::{Column, Dataset, Listing};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure to produce a [`Dataset`] from a source file. Fatal at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data source not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    #[error("CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("{0}")]
    Malformed(String),

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("row {row}: column '{column}' has invalid value '{value}'")]
    InvalidField {
        row: usize,
        column: &'static str,
        value: String,
    },

    #[error("row {row}: column '{column}' value {value} is out of range")]
    OutOfRange {
        row: usize,
        column: &'static str,
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a listings dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row with the listing columns (recommended)
/// * `.json`    – `[{ "id": ..., "price": ..., ... }, ...]`
/// * `.parquet` – flat table with the listing columns
pub fn load_file(path: &Path) -> Result<Dataset, LoadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let listings = match ext.as_str() {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        other => return Err(LoadError::UnsupportedFormat(other.to_string())),
    };

    log::info!("Loaded {} listings from {}", listings.len(), path.display());
    Ok(Dataset::from_listings(path, listings))
}

fn open(path: &Path) -> Result<File, LoadError> {
    File::open(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

// ---------------------------------------------------------------------------
// Column layout shared by all formats
// ---------------------------------------------------------------------------

/// Position of every known column in a source schema (`None` = not present).
struct Layout {
    positions: [Option<usize>; Column::ALL.len()],
}

impl Layout {
    fn resolve<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Self, LoadError> {
        let names: Vec<&str> = names.into_iter().collect();
        let mut positions = [None; Column::ALL.len()];
        for (slot, column) in positions.iter_mut().zip(Column::ALL) {
            *slot = names.iter().position(|n| n.trim() == column.source_name());
            if slot.is_none() && column.is_required() {
                return Err(LoadError::MissingColumn(column.source_name()));
            }
        }
        Ok(Layout { positions })
    }

    fn position(&self, column: Column) -> Option<usize> {
        self.positions[column as usize]
    }
}

/// Raw text cells of one row, indexed by [`Column`]. Empty cells are `None`.
type RawRow = [Option<String>; Column::ALL.len()];

fn empty_row() -> RawRow {
    Default::default()
}

/// One source record as deserialized by serde, before coercion. `C` is the
/// cell type of the format: `String` for CSV, `serde_json::Value` for JSON.
/// Unknown columns are ignored; absent or null cells are `None`.
#[derive(Debug, Deserialize)]
struct RawListing<C> {
    id: Option<C>,
    name: Option<C>,
    host_name: Option<C>,
    neighbourhood_group: Option<C>,
    neighbourhood: Option<C>,
    latitude: Option<C>,
    longitude: Option<C>,
    room_type: Option<C>,
    price: Option<C>,
    minimum_nights: Option<C>,
    number_of_reviews: Option<C>,
    last_review: Option<C>,
    availability_365: Option<C>,
}

impl<C> RawListing<C> {
    /// Cells in [`Column::ALL`] order, rendered by `text`.
    fn into_cells(self, text: impl Fn(C) -> Option<String>) -> RawRow {
        [
            self.id,
            self.name,
            self.host_name,
            self.neighbourhood_group,
            self.neighbourhood,
            self.latitude,
            self.longitude,
            self.room_type,
            self.price,
            self.minimum_nights,
            self.number_of_reviews,
            self.last_review,
            self.availability_365,
        ]
        .map(|cell| cell.and_then(&text))
    }
}

// ---------------------------------------------------------------------------
// Row coercion
// ---------------------------------------------------------------------------

fn parse_row(row: usize, cells: RawRow) -> Result<Listing, LoadError> {
    let [id, name, host_name, district, neighbourhood, latitude, longitude, room_type, price, minimum_nights, number_of_reviews, last_review, availability] =
        cells;

    let price_value = parse_f64(row, Column::Price, price.as_deref())?;
    if price_value < 0.0 {
        return Err(out_of_range(row, Column::Price, price_value));
    }

    let availability_value = parse_i64(row, Column::Availability365, availability.as_deref())?;
    if !(0..=365).contains(&availability_value) {
        return Err(out_of_range(row, Column::Availability365, availability_value));
    }

    Ok(Listing {
        id: required_text(row, Column::Id, id)?,
        name: name.unwrap_or_default(),
        host_name: host_name.unwrap_or_default(),
        neighbourhood_group: required_text(row, Column::District, district)?,
        neighbourhood: neighbourhood.unwrap_or_default(),
        latitude: parse_optional_f64(row, Column::Latitude, latitude.as_deref())?,
        longitude: parse_optional_f64(row, Column::Longitude, longitude.as_deref())?,
        room_type: required_text(row, Column::RoomType, room_type)?,
        price: price_value,
        minimum_nights: parse_count(row, Column::MinimumNights, minimum_nights.as_deref())?,
        number_of_reviews: parse_count(row, Column::NumberOfReviews, number_of_reviews.as_deref())?,
        last_review: parse_date(row, last_review.as_deref())?,
        // Range checked above.
        availability_365: availability_value as u16,
    })
}

fn invalid(row: usize, column: Column, value: Option<&str>) -> LoadError {
    LoadError::InvalidField {
        row,
        column: column.source_name(),
        value: value.unwrap_or("").to_string(),
    }
}

fn out_of_range(row: usize, column: Column, value: impl ToString) -> LoadError {
    LoadError::OutOfRange {
        row,
        column: column.source_name(),
        value: value.to_string(),
    }
}

fn required_text(row: usize, column: Column, value: Option<String>) -> Result<String, LoadError> {
    value.ok_or_else(|| invalid(row, column, None))
}

fn parse_f64(row: usize, column: Column, value: Option<&str>) -> Result<f64, LoadError> {
    value
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(row, column, value))
}

fn parse_optional_f64(row: usize, column: Column, value: Option<&str>) -> Result<Option<f64>, LoadError> {
    value.map(|v| parse_f64(row, column, Some(v))).transpose()
}

fn parse_i64(row: usize, column: Column, value: Option<&str>) -> Result<i64, LoadError> {
    let text = value.ok_or_else(|| invalid(row, column, None))?;
    if let Ok(i) = text.parse::<i64>() {
        return Ok(i);
    }
    // Integer columns written through a float dtype come out as "3.0".
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f.fract() == 0.0 => Ok(f as i64),
        _ => Err(invalid(row, column, value)),
    }
}

fn parse_count(row: usize, column: Column, value: Option<&str>) -> Result<u32, LoadError> {
    let parsed = parse_i64(row, column, value)?;
    u32::try_from(parsed).map_err(|_| out_of_range(row, column, parsed))
}

fn parse_date(row: usize, value: Option<&str>) -> Result<Option<NaiveDate>, LoadError> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map_err(|_| invalid(row, Column::LastReview, Some(v)))
        })
        .transpose()
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout: header row with the listing column names, any order.
/// Extra columns (`host_id`, `reviews_per_month`, ...) are ignored.
fn load_csv(path: &Path) -> Result<Vec<Listing>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(open(path)?));
    Layout::resolve(reader.headers()?.iter())?;

    let mut listings = Vec::new();
    for (row_no, result) in reader.deserialize::<RawListing<String>>().enumerate() {
        let cells = result?.into_cells(|s| non_empty(&s));
        listings.push(parse_row(row_no, cells)?);
    }
    Ok(listings)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `df.to_json(orient='records')`.
fn load_json(path: &Path) -> Result<Vec<Listing>, LoadError> {
    let root: JsonValue = serde_json::from_reader(BufReader::new(open(path)?))?;
    let JsonValue::Array(records) = root else {
        return Err(LoadError::Malformed("expected top-level JSON array".to_string()));
    };

    let mut listings = Vec::with_capacity(records.len());
    for (row_no, rec) in records.into_iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| LoadError::Malformed(format!("row {row_no} is not a JSON object")))?;

        if row_no == 0 {
            // Validates the schema once; later rows may still omit keys.
            Layout::resolve(obj.keys().map(String::as_str))?;
        }

        let raw: RawListing<JsonValue> = serde_json::from_value(rec)?;
        listings.push(parse_row(row_no, raw.into_cells(|v| json_cell(&v)))?);
    }
    Ok(listings)
}

fn json_cell(val: &JsonValue) -> Option<String> {
    match val {
        JsonValue::Null => None,
        JsonValue::String(s) => non_empty(s),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Flat Parquet table as written by `df.to_parquet()` (Pandas) or
/// `df.write_parquet()` (Polars). Column types are coerced the same way as
/// CSV text.
fn load_parquet(path: &Path) -> Result<Vec<Listing>, LoadError> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(open(path)?)?;
    let layout = Layout::resolve(builder.schema().fields().iter().map(|f| f.name().as_str()))?;
    let reader = builder.build()?;

    let mut listings = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        for row in 0..batch.num_rows() {
            let mut cells = empty_row();
            for (cell, column) in cells.iter_mut().zip(Column::ALL) {
                if let Some(idx) = layout.position(column) {
                    *cell = arrow_cell(batch.column(idx), row)?;
                }
            }
            let row_no = listings.len();
            listings.push(parse_row(row_no, cells)?);
        }
    }
    Ok(listings)
}

/// Render one Arrow cell as text for [`parse_row`].
fn arrow_cell(col: &ArrayRef, row: usize) -> Result<Option<String>, LoadError> {
    if col.is_null(row) {
        return Ok(None);
    }
    let any = col.as_any();
    let text = match col.data_type() {
        DataType::Utf8 => any.downcast_ref::<StringArray>().map(|a| a.value(row).to_string()),
        DataType::LargeUtf8 => Some(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => any.downcast_ref::<Int32Array>().map(|a| a.value(row).to_string()),
        DataType::Int64 => any.downcast_ref::<Int64Array>().map(|a| a.value(row).to_string()),
        DataType::Float32 => any.downcast_ref::<Float32Array>().map(|a| a.value(row).to_string()),
        DataType::Float64 => any.downcast_ref::<Float64Array>().map(|a| a.value(row).to_string()),
        DataType::Boolean => any.downcast_ref::<BooleanArray>().map(|a| a.value(row).to_string()),
        DataType::Date32 => any
            .downcast_ref::<Date32Array>()
            .and_then(|a| a.value_as_date(row))
            .map(|d| d.format("%Y-%m-%d").to_string()),
        other => {
            return Err(LoadError::Malformed(format!(
                "unsupported Parquet column type {other:?}"
            )))
        }
    };
    Ok(text.and_then(|t| non_empty(&t)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "id,name,host_id,host_name,neighbourhood_group,neighbourhood,latitude,longitude,room_type,price,minimum_nights,number_of_reviews,last_review,reviews_per_month,availability_365";

    fn write_temp(ext: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(ext)
            .tempfile()
            .expect("temp file");
        file.write_all(body.as_bytes()).expect("write");
        file
    }

    #[test]
    fn loads_csv_with_optional_cells() {
        let file = write_temp(
            ".csv",
            &format!(
                "{HEADER}\n\
                 2539,Clean room,2787,John,Brooklyn,Kensington,40.64749,-73.97237,Private room,149,1,9,2018-10-19,0.21,365\n\
                 3647,Village loft,4632,Elisabeth,Manhattan,Harlem,,,Private room,150,3,0,,,0\n"
            ),
        );
        let ds = load_file(file.path()).expect("load");
        assert_eq!(ds.len(), 2);
        let first = &ds.listings()[0];
        assert_eq!(first.price, 149.0);
        assert_eq!(first.last_review, NaiveDate::from_ymd_opt(2018, 10, 19));
        assert_eq!(first.coordinates(), Some((40.64749, -73.97237)));
        let second = &ds.listings()[1];
        assert_eq!(second.last_review, None);
        assert_eq!(second.latitude, None);
        assert_eq!(second.availability_365, 0);
    }

    #[test]
    fn non_numeric_price_is_a_coercion_error() {
        let file = write_temp(
            ".csv",
            &format!("{HEADER}\n1,a,1,h,Queens,Astoria,,,Shared room,cheap,1,0,,,10\n"),
        );
        match load_file(file.path()) {
            Err(LoadError::InvalidField { row, column, value }) => {
                assert_eq!(row, 0);
                assert_eq!(column, "price");
                assert_eq!(value, "cheap");
            }
            other => panic!("expected InvalidField, got {other:?}"),
        }
    }

    #[test]
    fn availability_outside_year_is_rejected() {
        let file = write_temp(
            ".csv",
            &format!("{HEADER}\n1,a,1,h,Queens,Astoria,,,Shared room,10,1,0,,,366\n"),
        );
        assert!(matches!(
            load_file(file.path()),
            Err(LoadError::OutOfRange { column: "availability_365", .. })
        ));
    }

    #[test]
    fn missing_required_column_is_reported() {
        let file = write_temp(".csv", "id,price\n1,10\n");
        assert!(matches!(
            load_file(file.path()),
            Err(LoadError::MissingColumn("host_name"))
        ));
    }

    #[test]
    fn missing_file_and_unknown_extension() {
        assert!(matches!(
            load_file(Path::new("/definitely/not/here.csv")),
            Err(LoadError::NotFound(_))
        ));
        assert!(matches!(
            load_file(Path::new("listings.xlsx")),
            Err(LoadError::UnsupportedFormat(ext)) if ext == "xlsx"
        ));
    }

    #[test]
    fn padded_headers_and_cells_are_trimmed() {
        let file = write_temp(
            ".csv",
            " id , host_name ,neighbourhood_group,neighbourhood,room_type, price ,minimum_nights,number_of_reviews,availability_365\n\
             7 , Ann ,Queens,Astoria,Private room, 80.5 ,2,3,10\n",
        );
        let ds = load_file(file.path()).expect("load");
        let l = &ds.listings()[0];
        assert_eq!(l.id, "7");
        assert_eq!(l.host_name, "Ann");
        assert_eq!(l.price, 80.5);
        assert_eq!(l.name, "");
        assert_eq!(l.last_review, None);
    }

    #[test]
    fn serialized_listings_load_back() {
        let listing = Listing {
            id: "11".into(),
            name: "Sunny, quiet room".into(),
            host_name: "Ida".into(),
            neighbourhood_group: "Queens".into(),
            neighbourhood: "Flushing".into(),
            latitude: Some(40.76),
            longitude: None,
            room_type: "Private room".into(),
            price: 64.0,
            minimum_nights: 2,
            number_of_reviews: 5,
            last_review: NaiveDate::from_ymd_opt(2019, 3, 2),
            availability_365: 12,
        };
        let file = tempfile::Builder::new().suffix(".csv").tempfile().expect("temp file");
        let mut writer = csv::Writer::from_path(file.path()).expect("writer");
        writer.serialize(&listing).expect("serialize");
        writer.flush().expect("flush");

        let ds = load_file(file.path()).expect("load");
        assert_eq!(ds.listings(), &[listing]);
    }

    #[test]
    fn json_nulls_are_absent_cells() {
        let file = write_temp(
            ".json",
            r#"[{"id": "9", "name": null, "host_name": "Bo", "neighbourhood_group": "Bronx",
                "neighbourhood": "Fordham", "latitude": null, "room_type": "Shared room",
                "price": 30, "minimum_nights": 1.0, "number_of_reviews": 0,
                "last_review": null, "availability_365": 0}]"#,
        );
        let ds = load_file(file.path()).expect("load");
        let l = &ds.listings()[0];
        assert_eq!(l.latitude, None);
        assert_eq!(l.longitude, None);
        assert_eq!(l.minimum_nights, 1);
        assert_eq!(l.price, 30.0);
    }

    #[test]
    fn loads_json_records() {
        let file = write_temp(
            ".json",
            r#"[
                {"id": 1, "name": "Loft", "host_name": "Ann", "neighbourhood_group": "Bronx",
                 "neighbourhood": "Mott Haven", "latitude": 40.8, "longitude": -73.9,
                 "room_type": "Entire home/apt", "price": 95.5, "minimum_nights": 2,
                 "number_of_reviews": 4, "last_review": "2019-06-01", "availability_365": 120}
            ]"#,
        );
        let ds = load_file(file.path()).expect("load");
        let l = &ds.listings()[0];
        assert_eq!(l.id, "1");
        assert_eq!(l.price, 95.5);
        assert_eq!(l.minimum_nights, 2);
        assert_eq!(l.availability_365, 120);
    }
}
