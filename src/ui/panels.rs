use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – selection widgets
// ---------------------------------------------------------------------------

/// Render the left selection panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Selection");
    ui.separator();

    if state.dataset.is_none() {
        ui.label("No dataset loaded.");
        return;
    }

    // Clone what we need so we can mutate state inside the closures.
    let combos = state.combo_options.clone();
    let sectors = state.sector_options.clone();
    let regions = state.region_options.clone();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Sector selector ----
            ui.strong("Sector");
            let current = state.sector.clone().unwrap_or_default();
            egui::ComboBox::from_id_salt("sector")
                .selected_text(&current)
                .width(ui.available_width())
                .show_ui(ui, |ui: &mut Ui| {
                    for sector in &sectors {
                        if ui
                            .selectable_label(current == **sector, &**sector)
                            .clicked()
                        {
                            state.set_sector(sector);
                        }
                    }
                });
            ui.separator();

            // ---- Model-scenario combinations ----
            let header = format!(
                "Model-scenario combinations  ({}/{})",
                state.selected_combos.len(),
                combos.len()
            );
            egui::CollapsingHeader::new(RichText::new(header).strong())
                .id_salt("combos")
                .default_open(true)
                .show(ui, |ui: &mut Ui| {
                    for combo in &combos {
                        let mut checked = state.selected_combos.contains(combo);
                        if ui.checkbox(&mut checked, combo).changed() {
                            state.toggle_combo(combo);
                        }
                    }
                });

            // ---- Regions of the selected sector ----
            let header = format!(
                "Regions  ({}/{})",
                state.selected_regions.len(),
                regions.len()
            );
            egui::CollapsingHeader::new(RichText::new(header).strong())
                .id_salt("regions")
                .default_open(true)
                .show(ui, |ui: &mut Ui| {
                    for region in &regions {
                        let mut checked = state.selected_regions.contains(&**region);
                        if ui.checkbox(&mut checked, &**region).changed() {
                            state.toggle_region(region);
                        }
                    }
                });
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open data folder…").clicked() {
                open_folder_dialog(state);
                ui.close_menu();
            }
            if ui.button("Reload").clicked() {
                state.reload();
                ui.close_menu();
            }
        });

        ui.separator();

        // ---- Dataset version selector ----
        let versions = state.versions.clone();
        let current = state.version.clone().unwrap_or_default();
        egui::ComboBox::from_id_salt("version")
            .selected_text(format!("Dataset: {current}"))
            .show_ui(ui, |ui: &mut Ui| {
                for version in &versions {
                    if ui.selectable_label(current == *version, version).clicked() {
                        state.select_version(version);
                    }
                }
            });

        ui.separator();

        if let Some(ds) = &state.dataset {
            ui.label(format!(
                "{} observations, {} charts",
                ds.len(),
                state.views.len()
            ));
        }

        for msg in state.messages() {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Folder dialog
// ---------------------------------------------------------------------------

pub fn open_folder_dialog(state: &mut AppState) {
    let folder = rfd::FileDialog::new()
        .set_title("Open scenario data folder")
        .set_directory(&state.config.data_dir)
        .pick_folder();

    if let Some(dir) = folder {
        state.set_data_dir(dir);
    }
}
