use eframe::egui;

use crate::state::AppState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct ScenarioExplorerApp {
    pub state: AppState,
}

impl ScenarioExplorerApp {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl eframe::App for ScenarioExplorerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: version selector and status ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: selections ----
        egui::SidePanel::left("selection_panel")
            .default_width(280.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Central panel: explanation and charts ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::charts(ui, &self.state);
        });
    }
}
