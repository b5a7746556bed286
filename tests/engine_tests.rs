use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use listing_explorer::data::export::subset_to_string;
use listing_explorer::{
    Explorer, FilterParams, FilterSpec, GroupKey, GroupValue, InvalidRangeError, Metric,
    NumericField,
};

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/listings_small.csv")
}

const HEADER: &str = "id,name,host_name,neighbourhood_group,neighbourhood,latitude,longitude,room_type,price,minimum_nights,number_of_reviews,last_review,availability_365";

fn write_source(dir: &tempfile::TempDir, name: &str, rows: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    let mut body = String::from(HEADER);
    for row in rows {
        body.push('\n');
        body.push_str(row);
    }
    fs::write(&path, body).expect("fixture should be writable");
    path
}

fn ids<'a>(rows: impl Iterator<Item = &'a listing_explorer::Listing>) -> Vec<&'a str> {
    rows.map(|l| l.id.as_str()).collect()
}

#[test]
fn price_window_then_mean_by_room_type() {
    let explorer = Explorer::default();
    let ds = explorer.load(&fixture()).expect("fixture should load");
    assert_eq!(ds.len(), 5);

    let spec = explorer
        .build(&ds, &FilterParams::new().price(60.0, 310.0))
        .expect("valid range");
    let subset = explorer.filter(&ds, &spec);
    assert_eq!(ids(subset.iter()), vec!["2", "3", "4"]);

    let by_room = explorer.aggregate(&subset, GroupKey::RoomType, Metric::Mean(NumericField::Price));
    let a = by_room.get("A").expect("group A");
    assert_eq!(a.value, GroupValue::Mean(97.5));
    assert_eq!(a.rows, 2);
    let b = by_room.get("B").expect("group B");
    assert_eq!(b.value, GroupValue::Mean(300.0));
    assert_eq!(b.rows, 1);

    let labels: Vec<&str> = by_room.groups.iter().map(|g| g.label.as_str()).collect();
    assert_eq!(labels, vec!["A", "B"]);
}

#[test]
fn equal_bounds_keep_exact_matches() {
    let explorer = Explorer::default();
    let ds = explorer.load(&fixture()).expect("fixture should load");
    let spec = explorer
        .build(&ds, &FilterParams::new().price(120.0, 120.0))
        .expect("lo == hi is valid");
    assert_eq!(ids(explorer.filter(&ds, &spec).iter()), vec!["2"]);
}

#[test]
fn inverted_range_is_rejected() {
    let explorer = Explorer::default();
    let ds = explorer.load(&fixture()).expect("fixture should load");
    let err = explorer
        .build(&ds, &FilterParams::new().price(310.0, 60.0))
        .expect_err("inverted range must fail");
    assert!(matches!(err, InvalidRangeError::Range { field: "price", .. }));
}

#[test]
fn empty_spec_selects_every_row_in_order() {
    let explorer = Explorer::default();
    let ds = explorer.load(&fixture()).expect("fixture should load");
    let spec = explorer.build(&ds, &FilterParams::new()).expect("empty params");
    assert_eq!(spec, FilterSpec::all());

    let subset = explorer.filter(&ds, &spec);
    assert_eq!(subset.indices(), &[0, 1, 2, 3, 4]);
}

#[test]
fn repeated_requests_return_the_cached_instance() {
    let explorer = Explorer::default();
    let ds = explorer.load(&fixture()).expect("fixture should load");

    let first = explorer
        .build(&ds, &FilterParams::new().price(60.0, 310.0).room_type("A"))
        .expect("valid");
    let second = explorer
        .build(&ds, &FilterParams::new().room_type("A").price(60.0, 310.0))
        .expect("valid");
    assert_eq!(first, second);

    let s1 = explorer.filter(&ds, &first);
    let s2 = explorer.filter(&ds, &second);
    assert!(Arc::ptr_eq(&s1, &s2));
    assert_eq!(explorer.queries().evaluations(), 1);

    let a1 = explorer.aggregate(&s1, GroupKey::District, Metric::Count);
    let a2 = explorer.aggregate(&s2, GroupKey::District, Metric::Count);
    assert!(Arc::ptr_eq(&a1, &a2));
    assert_eq!(explorer.aggregates().evaluations(), 1);
}

#[test]
fn concurrent_identical_requests_compute_once() {
    let explorer = Explorer::default();
    let ds = explorer.load(&fixture()).expect("fixture should load");
    let spec = explorer
        .build(&ds, &FilterParams::new().available_only())
        .expect("valid");

    let subsets: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| explorer.filter(&ds, &spec)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker should not panic"))
            .collect()
    });

    assert_eq!(explorer.queries().evaluations(), 1);
    assert!(subsets.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(ids(subsets[0].iter()), vec!["1", "3", "4", "5"]);
}

#[test]
fn loading_another_source_drops_cached_views() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = write_source(
        &dir,
        "first.csv",
        &["1,,Ana,Brooklyn,Bushwick,,,A,80,1,0,,10", "2,,Ben,Queens,Astoria,,,B,90,1,0,,10"],
    );
    let second = write_source(
        &dir,
        "second.csv",
        &["1,,Ana,Brooklyn,Bushwick,,,A,500,1,0,,10", "2,,Ben,Queens,Astoria,,,B,90,1,0,,10"],
    );

    let explorer = Explorer::default();
    let ds1 = explorer.load(&first).expect("first source");
    let spec = explorer
        .build(&ds1, &FilterParams::new().price(0.0, 100.0))
        .expect("valid");
    assert_eq!(explorer.filter(&ds1, &spec).len(), 2);
    assert_eq!(explorer.queries().evaluations(), 1);

    let ds2 = explorer.load(&second).expect("second source");
    assert_ne!(ds1.id(), ds2.id());
    assert_eq!(explorer.queries().cached(), 0);

    let fresh = explorer.filter(&ds2, &spec);
    assert_eq!(ids(fresh.iter()), vec!["2"]);
    assert_eq!(explorer.queries().evaluations(), 2);
}

#[test]
fn reload_after_edit_sees_new_contents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_source(&dir, "listings.csv", &["1,,Ana,Brooklyn,Bushwick,,,A,80,1,0,,10"]);

    let explorer = Explorer::default();
    let before = explorer.load(&path).expect("initial load");
    assert_eq!(explorer.filter(&before, &FilterSpec::all()).len(), 1);

    write_source(
        &dir,
        "listings.csv",
        &["1,,Ana,Brooklyn,Bushwick,,,A,80,1,0,,10", "2,,Ben,Queens,Astoria,,,B,90,1,0,,10"],
    );
    let same = explorer.load(&path).expect("cached load");
    assert!(Arc::ptr_eq(&before, &same));

    let after = explorer.reload(&path).expect("reload");
    assert_ne!(before.id(), after.id());
    assert_eq!(explorer.filter(&after, &FilterSpec::all()).len(), 2);
}

#[test]
fn room_type_shares_sum_to_one_hundred_per_district() {
    let explorer = Explorer::default();
    let ds = explorer.load(&fixture()).expect("fixture should load");
    let all = explorer.filter(&ds, &FilterSpec::all());
    let shares = explorer.share(&all, GroupKey::District, GroupKey::RoomType);

    for district in ds.categories(GroupKey::District) {
        let total: f64 = shares.within(district).map(|r| r.percentage).sum();
        assert!((total - 100.0).abs() < 1e-9, "{district}: {total}");
    }
    let brooklyn: Vec<(&str, usize)> = shares
        .within("Brooklyn")
        .map(|r| (r.inner.as_str(), r.count))
        .collect();
    assert_eq!(brooklyn, vec![("A", 1), ("B", 1)]);
}

#[test]
fn host_ranking_is_deterministic() {
    let explorer = Explorer::default();
    let ds = explorer.load(&fixture()).expect("fixture should load");
    let all = explorer.filter(&ds, &FilterSpec::all());
    let hosts = explorer.aggregate(&all, GroupKey::HostName, Metric::Count);

    let ranked: Vec<&str> = hosts.top(2).iter().map(|g| g.label.as_str()).collect();
    assert_eq!(ranked, vec!["Ana", "Ben"]);
    for _ in 0..5 {
        let again: Vec<&str> = hosts.top(2).iter().map(|g| g.label.as_str()).collect();
        assert_eq!(again, ranked);
    }
}

#[test]
fn availability_percentiles_skip_unavailable_listings() {
    let explorer = Explorer::default();
    let ds = explorer.load(&fixture()).expect("fixture should load");

    let cheap = explorer.availability(&ds, "Manhattan", false).expect("known district");
    assert!(cheap.is_empty());

    let all = explorer.availability(&ds, "Manhattan", true).expect("known district");
    let GroupValue::Describe(d) = &all.get("Manhattan").expect("Manhattan").value else {
        panic!("expected describe");
    };
    assert_eq!(d.count, 1);
    assert_eq!(d.max, 200.0);
}

#[test]
fn export_writes_filtered_rows_without_header() {
    let explorer = Explorer::default();
    let ds = explorer.load(&fixture()).expect("fixture should load");
    let spec = explorer
        .build(&ds, &FilterParams::new().price(60.0, 310.0))
        .expect("valid");
    let text = subset_to_string(&explorer.filter(&ds, &spec)).expect("export");

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    let first: Vec<&str> = lines[0].split('\t').collect();
    assert_eq!(first[0], "2");
    assert_eq!(first[8], "120,0");
    assert!(!text.contains("price"));
}
