use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, Duration, NaiveDate};
use listing_explorer::{Column, Listing};
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_f64() * n as f64) as usize % n
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.below(items.len())]
    }
}

/// District name, centre (lat, lon), neighbourhoods, log-price offset.
const DISTRICTS: [(&str, (f64, f64), [&str; 3], f64); 5] = [
    ("Manhattan", (40.78, -73.97), ["Harlem", "Midtown", "East Village"], 0.45),
    ("Brooklyn", (40.65, -73.95), ["Williamsburg", "Bushwick", "Kensington"], 0.1),
    ("Queens", (40.72, -73.82), ["Astoria", "Flushing", "Jamaica"], -0.15),
    ("Bronx", (40.84, -73.88), ["Mott Haven", "Fordham", "Riverdale"], -0.3),
    ("Staten Island", (40.58, -74.15), ["St. George", "Tompkinsville", "Arden Heights"], -0.2),
];

/// Room type and log-price offset.
const ROOM_TYPES: [(&str, f64); 4] = [
    ("Entire home/apt", 0.5),
    ("Private room", -0.2),
    ("Shared room", -0.7),
    ("Hotel room", 0.8),
];

const HOSTS: [&str; 12] = [
    "Michael", "David", "John", "Alex", "Sarah", "Maria", "Daniel", "Jessica", "Anna", "Kevin",
    "Sonder (NYC)", "Blueground",
];

fn generate(count: usize, rng: &mut SimpleRng) -> Vec<Listing> {
    let last_day = NaiveDate::from_ymd_opt(2020, 2, 1).unwrap_or_default();

    (0..count)
        .map(|i| {
            let (district, (lat, lon), neighbourhoods, district_offset) = *rng.pick(&DISTRICTS);
            let (room_type, room_offset) = *rng.pick(&ROOM_TYPES);
            let price = (rng.gauss(4.6 + district_offset + room_offset, 0.55).exp()).round();
            let number_of_reviews = (rng.gauss(0.0, 60.0).abs()) as u32;
            let last_review = (number_of_reviews > 0)
                .then(|| last_day - Duration::days(rng.below(3000) as i64));
            let has_coordinates = rng.next_f64() > 0.01;

            Listing {
                id: (2539 + i * 7).to_string(),
                name: format!("{room_type} in {}", rng.pick(&neighbourhoods)),
                host_name: rng.pick(&HOSTS).to_string(),
                neighbourhood_group: district.to_string(),
                neighbourhood: rng.pick(&neighbourhoods).to_string(),
                latitude: has_coordinates.then(|| lat + rng.gauss(0.0, 0.03)),
                longitude: has_coordinates.then(|| lon + rng.gauss(0.0, 0.03)),
                room_type: room_type.to_string(),
                price: price.clamp(10.0, 10_000.0),
                minimum_nights: 1 + rng.below(30) as u32 * (rng.below(4) / 3) as u32,
                number_of_reviews,
                last_review,
                availability_365: if rng.next_f64() < 0.35 { 0 } else { rng.below(366) as u16 },
            }
        })
        .collect()
}

fn write_csv(path: &Path, listings: &[Listing]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating CSV")?;
    for listing in listings {
        writer.serialize(listing).context("writing CSV row")?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &Path, listings: &[Listing]) -> Result<()> {
    let text = |f: fn(&Listing) -> &str| -> ArrayRef {
        Arc::new(StringArray::from(listings.iter().map(f).collect::<Vec<_>>()))
    };
    let opt_float = |f: fn(&Listing) -> Option<f64>| -> ArrayRef {
        Arc::new(Float64Array::from(listings.iter().map(f).collect::<Vec<_>>()))
    };
    let int = |f: fn(&Listing) -> i64| -> ArrayRef {
        Arc::new(Int64Array::from(listings.iter().map(f).collect::<Vec<_>>()))
    };
    let epoch_offset = NaiveDate::from_ymd_opt(1970, 1, 1)
        .map(|d| d.num_days_from_ce())
        .unwrap_or_default();

    let columns: Vec<(Column, DataType, ArrayRef)> = vec![
        (Column::Id, DataType::Utf8, text(|l| l.id.as_str())),
        (Column::Name, DataType::Utf8, text(|l| l.name.as_str())),
        (Column::HostName, DataType::Utf8, text(|l| l.host_name.as_str())),
        (Column::District, DataType::Utf8, text(|l| l.neighbourhood_group.as_str())),
        (Column::Neighbourhood, DataType::Utf8, text(|l| l.neighbourhood.as_str())),
        (Column::Latitude, DataType::Float64, opt_float(|l| l.latitude)),
        (Column::Longitude, DataType::Float64, opt_float(|l| l.longitude)),
        (Column::RoomType, DataType::Utf8, text(|l| l.room_type.as_str())),
        (Column::Price, DataType::Float64, opt_float(|l| Some(l.price))),
        (Column::MinimumNights, DataType::Int64, int(|l| i64::from(l.minimum_nights))),
        (Column::NumberOfReviews, DataType::Int64, int(|l| i64::from(l.number_of_reviews))),
        (
            Column::LastReview,
            DataType::Date32,
            Arc::new(Date32Array::from(
                listings
                    .iter()
                    .map(|l| l.last_review.map(|d| d.num_days_from_ce() - epoch_offset))
                    .collect::<Vec<_>>(),
            )),
        ),
        (Column::Availability365, DataType::Int64, int(|l| i64::from(l.availability_365))),
    ];

    let schema = Arc::new(Schema::new(
        columns
            .iter()
            .map(|(c, ty, _)| Field::new(c.source_name(), ty.clone(), !c.is_required()))
            .collect::<Vec<_>>(),
    ));
    let batch = RecordBatch::try_new(
        schema.clone(),
        columns.into_iter().map(|(_, _, array)| array).collect(),
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).context("creating Parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let output_path = PathBuf::from(args.get(1).map_or("data/listings.csv", String::as_str));
    let count: usize = match args.get(2) {
        Some(raw) => raw.parse().with_context(|| format!("invalid row count '{raw}'"))?,
        None => 2000,
    };

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("creating output directory")?;
    }

    let mut rng = SimpleRng::new(42);
    let listings = generate(count, &mut rng);

    let ext = output_path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" => write_csv(&output_path, &listings)?,
        "parquet" | "pq" => write_parquet(&output_path, &listings)?,
        other => bail!("Unsupported output extension: .{other}"),
    }

    println!("Wrote {} listings to {}", listings.len(), output_path.display());
    Ok(())
}
