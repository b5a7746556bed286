use eframe::egui;

use crate::config::Config;
use crate::state::AppState;
use crate::ui::{panels, sections};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct ListingExplorerApp {
    pub state: AppState,
}

impl ListingExplorerApp {
    /// Build the app and load the configured data source.
    pub fn new(config: Config) -> Self {
        let path = config.data_path.clone();
        let mut state = AppState::new(config);
        state.load(&path);
        Self { state }
    }
}

impl eframe::App for ListingExplorerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: dataset overview ----
        egui::SidePanel::left("dataset_panel")
            .default_width(220.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: dashboard sections ----
        egui::CentralPanel::default().show(ctx, |ui| {
            sections::dashboard(ui, &mut self.state);
        });
    }
}
