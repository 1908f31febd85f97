use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use log::{debug, warn};

use super::model::{Category, ColorDimension, Dataset, Observation, Table, WORLD};
use crate::error::{ExplorerError, Result};

/// Separator between model and scenario in a combo label.
pub const COMBO_SEPARATOR: &str = " - ";
/// Separator between the SSP and RCP halves of a scenario code.
pub const SCENARIO_SEPARATOR: char = '-';

// ---------------------------------------------------------------------------
// Model-scenario combinations
// ---------------------------------------------------------------------------

/// A parsed `"<model> - <SSP>-<RCP>"` selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combo {
    pub model: String,
    pub scenario: String,
    pub ssp: String,
    pub rcp: String,
}

pub fn format_combo(model: &str, scenario: &str) -> String {
    format!("{model}{COMBO_SEPARATOR}{scenario}")
}

pub fn parse_combo(combo: &str) -> Result<Combo> {
    let parts: Vec<&str> = combo.split(COMBO_SEPARATOR).collect();
    let [model, scenario] = parts.as_slice() else {
        return Err(ExplorerError::MalformedCombo(combo.to_string()));
    };
    let (ssp, rcp) = split_scenario(scenario)?;
    Ok(Combo {
        model: model.to_string(),
        scenario: scenario.to_string(),
        ssp,
        rcp,
    })
}

/// Split `SSP2-RCP26` into `("SSP2", "RCP26")`.
pub fn split_scenario(scenario: &str) -> Result<(String, String)> {
    let parts: Vec<&str> = scenario.split(SCENARIO_SEPARATOR).collect();
    match parts.as_slice() {
        [ssp, rcp] => Ok((ssp.to_string(), rcp.to_string())),
        _ => Err(ExplorerError::MalformedScenario(scenario.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Output of the pipeline
// ---------------------------------------------------------------------------

/// One chart's worth of data for a single model-scenario combination.
#[derive(Debug, Clone)]
pub struct SeriesView {
    pub model: String,
    pub scenario: String,
    pub ssp: String,
    pub rcp: String,
    /// Filtered, World-imputed rows sorted by year.
    pub table: Table,
    pub color_dimension: ColorDimension,
}

/// Points of one (region, colour value) line, sorted by year.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub region: Category,
    pub key: Category,
    pub points: Vec<[f64; 2]>,
}

impl SeriesView {
    pub fn title(&self) -> String {
        format!("Model: {} | Scenario: {}", self.model, self.scenario)
    }

    /// Chart-ready series: values summed per year within each
    /// (region, colour value) group, which folds away dimensions the chart
    /// does not show (`size`, `construction_year`, or `variables` when
    /// colouring by powertrain). Rows without a colour value or with a
    /// missing value are skipped.
    pub fn series(&self) -> Vec<Series> {
        let mut groups: BTreeMap<(Category, Category), BTreeMap<i32, f64>> = BTreeMap::new();
        for obs in &self.table.rows {
            let Some(key) = self.color_dimension.value_of(obs) else {
                continue;
            };
            if !obs.val.is_finite() {
                continue;
            }
            *groups
                .entry((obs.region.clone(), key.clone()))
                .or_default()
                .entry(obs.year)
                .or_insert(0.0) += f64::from(obs.val);
        }
        groups
            .into_iter()
            .map(|((region, key), by_year)| Series {
                region,
                key,
                points: by_year
                    .into_iter()
                    .map(|(year, val)| [f64::from(year), val])
                    .collect(),
            })
            .collect()
    }
}

/// How a sector's charts are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartStyle {
    StackedArea,
    Line,
}

impl ChartStyle {
    pub fn for_sector(sector: &str) -> Self {
        if sector.contains("Transport") {
            ChartStyle::StackedArea
        } else if sector.to_lowercase().contains("efficiency") {
            ChartStyle::Line
        } else {
            ChartStyle::StackedArea
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Produce one [`SeriesView`] per requested combination.
///
/// Steps: sector filter, per-combo World imputation on a derived copy,
/// region filter, then per-combo cleanup (silent series dropped, rows sorted
/// by year, colour dimension chosen). The cached `dataset` is only read.
///
/// Every combo is validated before any data is touched. An unknown sector
/// yields an empty result, as does an empty region list (empty views).
pub fn build_views(
    dataset: &Dataset,
    sector: &str,
    combinations: &[String],
    regions: &[String],
) -> Result<Vec<SeriesView>> {
    let combos = combinations
        .iter()
        .map(|c| parse_combo(c))
        .collect::<Result<Vec<_>>>()?;

    let mut table = dataset.table.filtered(|o| &*o.sector == sector);
    if table.is_empty() {
        debug!("no rows for sector '{sector}'");
        return Ok(Vec::new());
    }

    for combo in &combos {
        let imputed = impute_world(&mut table, &combo.model, &combo.scenario);
        debug!(
            "imputed {imputed} World rows for {} / {}",
            combo.model, combo.scenario
        );
    }

    let wanted: BTreeSet<&str> = regions.iter().map(String::as_str).collect();
    let table = table.filtered(|o| wanted.contains(&*o.region));

    let color_dimension = ColorDimension::for_sector(sector);
    let mut views = Vec::with_capacity(combos.len());

    for combo in combos {
        let mut sub =
            table.filtered(|o| *o.model == *combo.model && *o.scenario == *combo.scenario);
        drop_silent_series(&mut sub);
        sub.rows
            .sort_by(|a, b| a.year.cmp(&b.year).then_with(|| a.region.cmp(&b.region)));

        // A missing colour column drops the view rather than falling back
        // to `variables`.
        if !color_dimension.is_present_in(&sub) {
            warn!(
                "sector '{sector}' has no '{}' column; skipping {}",
                color_dimension.column_name(),
                format_combo(&combo.model, &combo.scenario)
            );
            continue;
        }

        views.push(SeriesView {
            model: combo.model,
            scenario: combo.scenario,
            ssp: combo.ssp,
            rcp: combo.rcp,
            table: sub,
            color_dimension,
        });
    }

    Ok(views)
}

/// Fill in the World aggregate of one model-scenario pair, year by year.
///
/// Missing (non-finite) values count as absent in every sum.
///
/// Within each year group: World rows whose values sum to something
/// non-zero are kept as-is. Otherwise the non-World values are summed and
/// either written into the existing World rows or, if there are none,
/// appended as a new World row whose `variables` and optional dimensions
/// come from the first row of the group. Returns the number of rows touched.
///
/// Idempotent: a second pass finds either a non-zero World row or a zero
/// one whose recomputed sum is zero again.
pub fn impute_world(table: &mut Table, model: &str, scenario: &str) -> usize {
    let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (idx, obs) in table.rows.iter().enumerate() {
        if &*obs.model == model && &*obs.scenario == scenario {
            groups.entry(obs.year).or_default().push(idx);
        }
    }

    let world: Category = Arc::from(WORLD);
    let mut appended = Vec::new();
    let mut touched = 0;

    for (year, indices) in groups {
        let (world_rows, regional): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| table.rows[i].is_world());

        let world_total: f64 = world_rows.iter().map(|&i| summand(&table.rows[i])).sum();
        if !world_rows.is_empty() && world_total != 0.0 {
            continue;
        }

        let summed = regional.iter().map(|&i| summand(&table.rows[i])).sum::<f64>() as f32;

        if world_rows.is_empty() {
            let template = &table.rows[indices[0]];
            appended.push(Observation {
                region: world.clone(),
                year,
                val: summed,
                ..template.clone()
            });
            touched += 1;
        } else {
            for i in world_rows {
                table.rows[i].val = summed;
                touched += 1;
            }
        }
    }

    table.rows.extend(appended);
    touched
}

/// A row's contribution to a sum; missing values contribute nothing.
fn summand(obs: &Observation) -> f64 {
    if obs.val.is_finite() {
        f64::from(obs.val)
    } else {
        0.0
    }
}

/// Remove every `variables` category whose values sum to exactly zero.
fn drop_silent_series(table: &mut Table) {
    let mut totals: HashMap<Category, f64> = HashMap::new();
    for obs in &table.rows {
        *totals.entry(obs.variables.clone()).or_insert(0.0) += summand(obs);
    }
    table
        .rows
        .retain(|o| totals.get(&o.variables).is_some_and(|t| *t != 0.0));
}
