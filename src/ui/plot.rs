use std::collections::BTreeMap;

use eframe::egui::{self, Color32, RichText, Ui};
use egui_plot::{Legend, Line, Plot, PlotPoints};

use crate::data::filter::{ChartStyle, Series, SeriesView};
use crate::state::AppState;

const CHART_HEIGHT: f32 = 350.0;

// ---------------------------------------------------------------------------
// Chart grid (central panel)
// ---------------------------------------------------------------------------

/// Render the sector explanation followed by the charts, two per row.
pub fn charts(ui: &mut Ui, state: &AppState) {
    if state.dataset.is_none() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a data folder to explore scenarios  (File → Open data folder…)");
        });
        return;
    }
    let Some(sector) = state.sector.as_deref() else {
        return;
    };

    let expl_text = state.metadata.explanation(sector);
    if !expl_text.is_empty() {
        ui.vertical_centered(|ui: &mut Ui| {
            ui.label(RichText::new(expl_text).size(16.0));
        });
        ui.add_space(12.0);
    }

    if state.views.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.label("Nothing to show for the current selection.");
        });
        return;
    }

    let style = ChartStyle::for_sector(sector);
    let y_label = state.metadata.y_axis_label(sector);

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for (row, pair) in state.views.chunks(2).enumerate() {
                ui.columns(2, |columns| {
                    for (col, view) in pair.iter().enumerate() {
                        chart(&mut columns[col], state, view, style, y_label, row * 2 + col);
                    }
                });
                ui.add_space(16.0);
            }
        });
}

/// One model-scenario chart: scenario descriptions, then one plot per
/// region side by side.
fn chart(
    ui: &mut Ui,
    state: &AppState,
    view: &SeriesView,
    style: ChartStyle,
    y_label: &str,
    index: usize,
) {
    let ssp = state.metadata.ssp(&view.ssp);
    let rcp = state.metadata.rcp(&view.rcp);
    ui.label(RichText::new(&ssp.name).size(10.0).strong());
    ui.label(RichText::new(&ssp.description).size(8.0));
    ui.label(RichText::new(&rcp.name).size(10.0).strong());
    ui.label(RichText::new(&rcp.description).size(8.0));
    ui.label(RichText::new(view.title()).strong());

    let mut by_region: BTreeMap<String, Vec<Series>> = BTreeMap::new();
    for series in view.series() {
        by_region
            .entry(series.region.to_string())
            .or_default()
            .push(series);
    }
    if by_region.is_empty() {
        ui.label("No data.");
        return;
    }

    let facet_width = ui.available_width() / by_region.len() as f32;
    ui.horizontal(|ui: &mut Ui| {
        for (region, series) in by_region {
            let series = match style {
                ChartStyle::StackedArea => stacked(&series),
                ChartStyle::Line => series,
            };
            ui.vertical(|ui: &mut Ui| {
                ui.label(format!("Region: {region}"));
                Plot::new(format!("chart_{index}_{region}"))
                    .legend(Legend::default())
                    .height(CHART_HEIGHT)
                    .width(facet_width - 8.0)
                    .x_axis_label("Year")
                    .y_axis_label(y_label)
                    .allow_scroll(false)
                    .show(ui, |plot_ui| {
                        // Highest cumulative band first so lower fills stay visible.
                        for s in series.iter().rev() {
                            let color = state
                                .color_map
                                .as_ref()
                                .map_or(Color32::LIGHT_BLUE, |cm| cm.color_for(&s.key));
                            let points: PlotPoints = s.points.iter().copied().collect();
                            let mut line =
                                Line::new(points).name(&*s.key).color(color).width(1.5_f32);
                            if style == ChartStyle::StackedArea {
                                line = line.fill(0.0_f32);
                            }
                            plot_ui.line(line);
                        }
                    });
            });
        }
    });
}

/// Cumulative sums across the series of one region, in series order, over
/// the union of their years. Missing years count as zero.
fn stacked(series: &[Series]) -> Vec<Series> {
    let mut years: Vec<f64> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p[0]))
        .collect();
    years.sort_by(f64::total_cmp);
    years.dedup();

    let mut running = vec![0.0; years.len()];
    series
        .iter()
        .map(|s| {
            for (slot, year) in running.iter_mut().zip(&years) {
                if let Some(p) = s.points.iter().find(|p| p[0] == *year) {
                    *slot += p[1];
                }
            }
            Series {
                region: s.region.clone(),
                key: s.key.clone(),
                points: years.iter().zip(&running).map(|(&x, &y)| [x, y]).collect(),
            }
        })
        .collect()
}
