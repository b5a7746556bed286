use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use listing_explorer::GroupKey;

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – dataset overview
// ---------------------------------------------------------------------------

/// Render the left panel: source, counts, category legends.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Dataset");
    ui.separator();

    let Some(dataset) = state.dataset.clone() else {
        ui.label("No dataset loaded.");
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            ui.label(format!("{}", dataset.source().display()));
            ui.label(format!("{} listings ({})", dataset.len(), dataset.id()));
            if let Some((lo, hi)) = dataset.price_range() {
                ui.label(format!("Price ${lo:.0} – ${hi:.0}"));
            }
            ui.separator();

            for colors in [&state.district_colors, &state.room_type_colors].into_iter().flatten() {
                let entries = colors.legend_entries();
                egui::CollapsingHeader::new(
                    RichText::new(format!("{}  ({})", colors.column, entries.len())).strong(),
                )
                .id_salt(&colors.column)
                .default_open(true)
                .show(ui, |ui: &mut Ui| {
                    for (label, color) in entries {
                        ui.label(RichText::new(label).color(color));
                    }
                });
            }
            ui.label(format!(
                "{} hosts",
                dataset.categories(GroupKey::HostName).len()
            ));

            ui.separator();
            let queries = state.explorer.queries().cache_stats();
            let aggregates = state.explorer.aggregates().cache_stats();
            ui.small(format!(
                "cache: subsets {}/{} hit, aggregates {}/{} hit",
                queries.hits,
                queries.hits + queries.misses,
                aggregates.hits,
                aggregates.hits + aggregates.misses
            ));
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(state.dataset.is_some(), egui::Button::new("Reload"))
                .clicked()
            {
                state.reload();
                ui.close_menu();
            }
            if ui
                .add_enabled(state.dataset.is_some(), egui::Button::new("Export filtered…"))
                .clicked()
            {
                export_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let (Some(ds), Some(map)) = (&state.dataset, &state.views.map.subset) {
            ui.label(format!("{} listings loaded, {} on the map", ds.len(), map.len()));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open listings")
        .add_filter("Supported files", &["csv", "json", "parquet", "pq"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.load(&path);
    }
}

pub fn export_file_dialog(state: &mut AppState) {
    let mut dialog = rfd::FileDialog::new()
        .set_title("Export filtered listings")
        .set_file_name("listings_export.tsv")
        .add_filter("Tab-separated", &["tsv", "csv", "txt"]);
    if let Some(dir) = state.source().as_deref().and_then(|p| p.parent()) {
        dialog = dialog.set_directory(dir);
    }

    if let Some(path) = dialog.save_file() {
        match state.export(&path) {
            Ok(n) => state.status_message = Some(format!("Exported {n} listings")),
            Err(e) => {
                log::error!("Export failed: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}
