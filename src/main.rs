mod app;
mod color;
mod config;
mod data;
mod error;
mod metadata;
mod state;
mod ui;

use app::ScenarioExplorerApp;
use config::ExplorerConfig;
use eframe::egui;
use state::AppState;

fn main() -> eframe::Result {
    env_logger::init();

    let config = ExplorerConfig::discover().unwrap_or_else(|e| {
        log::error!("invalid configuration, using defaults: {e:#}");
        ExplorerConfig::default()
    });
    log::info!("reading datasets from {}", config.data_dir.display());
    let state = AppState::new(config);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([700.0, 450.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Scenario Explorer",
        options,
        Box::new(|_cc| Ok(Box::new(ScenarioExplorerApp::new(state)))),
    )
}
