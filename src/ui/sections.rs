use eframe::egui::{self, Slider, Ui};
use egui_extras::DatePickerButton;
use listing_explorer::{Column, GroupKey, Listing, NumericField};

use crate::state::{price_bounds, AppState, Controls, MOST_RATED_ROWS, TOP_HOSTS};
use crate::ui::{plot, table};

const FIRST_ROWS: usize = 10;

/// Render every dashboard section. Control changes trigger one recompute pass.
pub fn dashboard(ui: &mut Ui, state: &mut AppState) {
    let Some(dataset) = state.dataset.clone() else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a listings file to begin  (File → Open…)");
        });
        return;
    };
    let Some(mut controls) = state.controls.clone() else {
        return;
    };
    let price_limits = price_bounds(&dataset, state.config.price_cap);

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            first_records(ui, state, &mut controls);
            ui.separator();
            listing_locations(ui, state, &mut controls, price_limits);
            ui.separator();
            districts(ui, state, &mut controls, &dataset.categories(GroupKey::District).to_vec());
            ui.separator();
            room_types(ui, state);
            ui.separator();
            demand(ui, state, &mut controls, &dataset.categories(GroupKey::RoomType).to_vec());
            ui.separator();
            most_rated(ui, state, &mut controls);
            ui.separator();
            price_distribution(ui, state, &mut controls, price_limits);
        });

    if state.controls.as_ref() != Some(&controls) {
        state.controls = Some(controls);
        state.refresh();
    }
}

fn first_records(ui: &mut Ui, state: &AppState, controls: &mut Controls) {
    ui.heading("First records");
    ui.horizontal_wrapped(|ui: &mut Ui| {
        for column in Column::ALL {
            let mut shown = controls.columns.contains(&column);
            if ui.checkbox(&mut shown, column.source_name()).changed() {
                if shown {
                    controls.columns.push(column);
                    controls.columns.sort();
                } else {
                    controls.columns.retain(|c| *c != column);
                }
            }
        }
    });
    if let Some(all) = &state.views.all {
        let headers: Vec<String> = controls
            .columns
            .iter()
            .map(|c| c.source_name().to_string())
            .collect();
        table::text_table(ui, "first_records", &headers, &all.project(&controls.columns, FIRST_ROWS));
    }
}

fn listing_locations(ui: &mut Ui, state: &AppState, controls: &mut Controls, (lo, hi): (f64, f64)) {
    ui.heading("Listing locations");
    ui.add(Slider::new(&mut controls.map_price.0, lo..=hi).text("Price from ($)"));
    ui.add(Slider::new(&mut controls.map_price.1, lo..=hi).text("Price to ($)"));
    ui.add(Slider::new(&mut controls.map_max_nights, 0..=30).text("Minimum nights"));
    ui.add(Slider::new(&mut controls.map_min_reviews, 0..=700).text("Minimum reviews"));
    if let Some(subset) = &state.views.map.subset {
        ui.label(format!("{} listings match", subset.len()));
        plot::location_map(ui, "location_map", subset);
    }
}

fn districts(ui: &mut Ui, state: &AppState, controls: &mut Controls, districts: &[String]) {
    ui.heading("Districts");
    if let Some(agg) = &state.views.district_price {
        let ranked = agg.top(agg.groups.len());
        plot::group_bars(ui, "district_price", &ranked, "Mean price ($)");
    }

    ui.heading("Availability by district");
    ui.horizontal_wrapped(|ui: &mut Ui| {
        for d in districts {
            ui.radio_value(&mut controls.availability_district, d.clone(), d.as_str());
        }
    });
    ui.checkbox(&mut controls.include_expensive, "Expensive listings");
    if let Some(agg) = &state.views.availability {
        table::describe_table(ui, "availability", agg);
    }

    if let Some(share) = &state.views.room_share {
        ui.heading("Room types by district");
        plot::share_bars(ui, "room_share", share, state.room_type_colors.as_ref());
        table::share_table(ui, "room_share_table", share);
    }
}

fn room_types(ui: &mut Ui, state: &AppState) {
    ui.heading("Average price by room type");
    if let Some(agg) = &state.views.room_price {
        table::aggregate_table(ui, "room_price", agg, "Average Price ($)");
    }

    ui.heading("Most rated hosts");
    if let Some(agg) = &state.views.top_hosts {
        let top = agg.top(TOP_HOSTS);
        plot::group_bars(ui, "top_hosts", &top, "Listings with reviews counted");
        if let [first, second, ..] = top.as_slice() {
            ui.label(format!(
                "{} is at the top with {}; {} is second with {}.",
                first.label,
                table::format_value(&first.value),
                second.label,
                table::format_value(&second.value)
            ));
        }
    }
}

fn review_day(l: &Listing) -> Option<f64> {
    use chrono::Datelike;
    l.last_review.map(|d| f64::from(d.num_days_from_ce()))
}

fn demand(ui: &mut Ui, state: &AppState, controls: &mut Controls, room_types: &[String]) {
    ui.heading("Demand and price");
    ui.horizontal_wrapped(|ui: &mut Ui| {
        for t in room_types {
            ui.radio_value(&mut controls.demand_room_type, t.clone(), t.as_str());
        }
    });
    ui.checkbox(&mut controls.all_room_types, "All accommodations");
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Last review from");
        ui.add(DatePickerButton::new(&mut controls.review_dates.0).id_salt("review_from"));
        ui.label("to");
        ui.add(DatePickerButton::new(&mut controls.review_dates.1).id_salt("review_to"));
    });

    let (Some(rooms), Some(districts)) = (&state.room_type_colors, &state.district_colors) else {
        return;
    };
    if let Some(subset) = &state.views.demand.subset {
        ui.label("Reviews over last review date");
        plot::category_scatter(
            ui,
            "demand_reviews",
            subset.iter(),
            review_day,
            NumericField::NumberOfReviews,
            rooms,
            GroupKey::RoomType,
        );
    }
    if let Some(subset) = &state.views.reviewed.subset {
        ui.label("Price over last review date");
        plot::category_scatter(
            ui,
            "price_by_date",
            subset.iter(),
            review_day,
            NumericField::Price,
            districts,
            GroupKey::District,
        );
        ui.label("Reviews over last review date, by district");
        plot::category_scatter(
            ui,
            "reviews_by_date",
            subset.iter(),
            review_day,
            NumericField::NumberOfReviews,
            districts,
            GroupKey::District,
        );
        ui.label("Price over number of reviews");
        plot::category_scatter(
            ui,
            "price_by_reviews",
            subset.iter(),
            |l| l.numeric(NumericField::NumberOfReviews),
            NumericField::Price,
            districts,
            GroupKey::District,
        );
    }
}

fn most_rated(ui: &mut Ui, state: &AppState, controls: &mut Controls) {
    ui.heading("Most rated listings");
    ui.add(Slider::new(&mut controls.most_rated_max_reviews, 0..=12_000).text("Reviews at most"));
    if let Some(subset) = &state.views.most_rated.subset {
        let columns = [
            Column::NumberOfReviews,
            Column::Price,
            Column::Neighbourhood,
            Column::RoomType,
            Column::HostName,
        ];
        let headers: Vec<String> = columns.iter().map(|c| c.source_name().to_string()).collect();
        let rows: Vec<Vec<String>> = subset
            .top_by(NumericField::NumberOfReviews, MOST_RATED_ROWS)
            .into_iter()
            .map(|l| columns.iter().map(|&c| l.value(c).to_string()).collect())
            .collect();
        table::text_table(ui, "most_rated", &headers, &rows);
    }
}

fn price_distribution(ui: &mut Ui, state: &AppState, controls: &mut Controls, (lo, hi): (f64, f64)) {
    ui.heading("Price distribution");
    ui.add(Slider::new(&mut controls.histogram_price.0, lo..=hi).text("Price from ($)"));
    ui.add(Slider::new(&mut controls.histogram_price.1, lo..=hi).text("Price to ($)"));
    if let Some(hist) = &state.views.histogram {
        plot::histogram_plot(ui, "price_histogram", hist);
    }
}
