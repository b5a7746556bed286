use eframe::egui::{Color32, Ui};
use egui_plot::{Bar, BarChart, Legend, Plot, PlotPoints, Points};
use listing_explorer::data::aggregate::Histogram;
use listing_explorer::{GroupKey, GroupRow, Listing, NumericField, ShareTable, Subset};

use crate::color::{generate_palette, ColorMap};

const CHART_HEIGHT: f32 = 260.0;

// ---------------------------------------------------------------------------
// Bar charts
// ---------------------------------------------------------------------------

/// One bar per group, labelled through the legend.
pub fn group_bars(ui: &mut Ui, id: &str, groups: &[&GroupRow], y_label: &str) {
    if groups.is_empty() {
        ui.label("No matching rows.");
        return;
    }
    let palette = generate_palette(groups.len());
    Plot::new(id)
        .legend(Legend::default())
        .y_axis_label(y_label)
        .height(CHART_HEIGHT)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for (i, (group, color)) in groups.iter().zip(palette).enumerate() {
                let bar = Bar::new(i as f64, group.value.score()).width(0.7);
                plot_ui.bar_chart(BarChart::new(vec![bar]).name(&group.label).color(color));
            }
        });
}

/// Stacked-by-position bars: percentage of each inner group per outer group.
pub fn share_bars(ui: &mut Ui, id: &str, table: &ShareTable, colors: Option<&ColorMap>) {
    if table.rows.is_empty() {
        ui.label("No matching rows.");
        return;
    }
    let mut outers: Vec<&str> = Vec::new();
    let mut inners: Vec<&str> = Vec::new();
    for r in &table.rows {
        if !outers.contains(&r.outer.as_str()) {
            outers.push(&r.outer);
        }
        if !inners.contains(&r.inner.as_str()) {
            inners.push(&r.inner);
        }
    }
    let slot = 0.8 / inners.len() as f64;

    Plot::new(id)
        .legend(Legend::default())
        .y_axis_label("Percentage")
        .include_y(0.0)
        .include_y(100.0)
        .height(CHART_HEIGHT)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for (j, inner) in inners.iter().enumerate() {
                let bars: Vec<Bar> = table
                    .rows
                    .iter()
                    .filter(|r| r.inner == *inner)
                    .filter_map(|r| {
                        let i = outers.iter().position(|o| *o == r.outer)?;
                        let x = i as f64 - 0.4 + slot * (j as f64 + 0.5);
                        Some(Bar::new(x, r.percentage).width(slot * 0.9).name(&r.outer))
                    })
                    .collect();
                let color = colors.map_or(Color32::LIGHT_BLUE, |c| c.color_for(inner));
                plot_ui.bar_chart(BarChart::new(bars).name(*inner).color(color));
            }
        });
}

// ---------------------------------------------------------------------------
// Scatter plots
// ---------------------------------------------------------------------------

/// Listing locations (longitude on x, latitude on y), rows without
/// coordinates are skipped.
pub fn location_map(ui: &mut Ui, id: &str, subset: &Subset) {
    let points: PlotPoints = subset
        .coordinates()
        .into_iter()
        .map(|(lat, lon)| [lon, lat])
        .collect();
    Plot::new(id)
        .data_aspect(1.0)
        .x_axis_label("Longitude")
        .y_axis_label("Latitude")
        .height(CHART_HEIGHT * 1.5)
        .show(ui, |plot_ui| {
            plot_ui.points(Points::new(points).radius(1.5).color(Color32::from_rgb(255, 90, 95)));
        });
}

/// Scatter of `y` against `x` coloured by a category of each listing.
pub fn category_scatter<'a>(
    ui: &mut Ui,
    id: &str,
    rows: impl Iterator<Item = &'a Listing>,
    x: impl Fn(&Listing) -> Option<f64>,
    y: NumericField,
    colors: &ColorMap,
    category: GroupKey,
) {
    let mut series: Vec<(String, Vec<[f64; 2]>)> = Vec::new();
    for l in rows {
        let (Some(px), Some(py)) = (x(l), l.numeric(y)) else {
            continue;
        };
        let label = l.category(category);
        match series.iter_mut().find(|(name, _)| name == label) {
            Some((_, pts)) => pts.push([px, py]),
            None => series.push((label.to_string(), vec![[px, py]])),
        }
    }

    Plot::new(id)
        .legend(Legend::default())
        .y_axis_label(y.label())
        .height(CHART_HEIGHT)
        .show(ui, |plot_ui| {
            for (name, pts) in series {
                let color = colors.color_for(&name);
                plot_ui.points(
                    Points::new(pts.into_iter().collect::<PlotPoints>())
                        .radius(2.0)
                        .color(color)
                        .name(name),
                );
            }
        });
}

// ---------------------------------------------------------------------------
// Histogram
// ---------------------------------------------------------------------------

pub fn histogram_plot(ui: &mut Ui, id: &str, hist: &Histogram) {
    let bars: Vec<Bar> = hist
        .counts
        .iter()
        .enumerate()
        .map(|(i, &n)| Bar::new(hist.edge(i) + hist.width / 2.0, n as f64).width(hist.width))
        .collect();
    Plot::new(id)
        .x_axis_label("Price")
        .y_axis_label("No. of listings")
        .height(CHART_HEIGHT)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).color(Color32::from_rgb(99, 110, 250)));
        });
}
