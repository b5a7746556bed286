mod app;
mod color;
mod config;
mod state;
mod ui;

use app::ListingExplorerApp;
use config::Config;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let config = Config::from_env();
    log::info!("Starting with data source {}", config.data_path.display());

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 900.0])
            .with_min_inner_size([640.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Listing Explorer",
        options,
        Box::new(|_cc| Ok(Box::new(ListingExplorerApp::new(config)))),
    )
}
