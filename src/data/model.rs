use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Name of the aggregate region synthesized from its regional components.
pub const WORLD: &str = "World";

// ---------------------------------------------------------------------------
// Category – an interned low-cardinality string cell
// ---------------------------------------------------------------------------

/// A categorical cell. Every distinct value of a column is allocated once
/// and shared by all rows carrying it.
pub type Category = Arc<str>;

/// Hands out one shared allocation per distinct string.
#[derive(Debug, Default)]
pub struct Interner {
    values: HashMap<String, Category>,
}

impl Interner {
    pub fn intern(&mut self, s: &str) -> Category {
        if let Some(existing) = self.values.get(s) {
            return existing.clone();
        }
        let cat: Category = Arc::from(s);
        self.values.insert(s.to_string(), cat.clone());
        cat
    }

    /// Interns non-empty strings; empty cells become `None`.
    pub fn intern_opt(&mut self, s: Option<&str>) -> Option<Category> {
        match s.map(str::trim) {
            Some(v) if !v.is_empty() => Some(self.intern(v)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Optional dimension columns
// ---------------------------------------------------------------------------

/// Columns only some sectors carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionalColumn {
    Powertrain,
    Size,
    ConstructionYear,
}

impl OptionalColumn {
    pub const ALL: [OptionalColumn; 3] = [
        OptionalColumn::Powertrain,
        OptionalColumn::Size,
        OptionalColumn::ConstructionYear,
    ];

    /// Header name in the source file.
    pub fn name(self) -> &'static str {
        match self {
            OptionalColumn::Powertrain => "powertrain",
            OptionalColumn::Size => "size",
            OptionalColumn::ConstructionYear => "construction_year",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for OptionalColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Observation – one row of the dataset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub region: Category,
    pub sector: Category,
    pub model: Category,
    pub scenario: Category,
    pub variables: Category,
    pub year: i32,
    /// NaN when the source cell was empty.
    pub val: f32,
    pub powertrain: Option<Category>,
    pub size: Option<Category>,
    pub construction_year: Option<Category>,
}

impl Observation {
    pub fn is_world(&self) -> bool {
        &*self.region == WORLD
    }

    pub fn dimension(&self, column: OptionalColumn) -> Option<&Category> {
        match column {
            OptionalColumn::Powertrain => self.powertrain.as_ref(),
            OptionalColumn::Size => self.size.as_ref(),
            OptionalColumn::ConstructionYear => self.construction_year.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// ColorDimension – the column charts are grouped and coloured by
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDimension {
    Variables,
    Powertrain,
}

impl ColorDimension {
    /// `powertrain` for transport sectors, `variables` otherwise.
    pub fn for_sector(sector: &str) -> Self {
        if sector.contains("Transport") {
            ColorDimension::Powertrain
        } else {
            ColorDimension::Variables
        }
    }

    pub fn column_name(self) -> &'static str {
        match self {
            ColorDimension::Variables => "variables",
            ColorDimension::Powertrain => OptionalColumn::Powertrain.name(),
        }
    }

    pub fn is_present_in(self, table: &Table) -> bool {
        match self {
            ColorDimension::Variables => true,
            ColorDimension::Powertrain => table.has_column(OptionalColumn::Powertrain),
        }
    }

    pub fn value_of(self, obs: &Observation) -> Option<&Category> {
        match self {
            ColorDimension::Variables => Some(&obs.variables),
            ColorDimension::Powertrain => obs.dimension(OptionalColumn::Powertrain),
        }
    }
}

// ---------------------------------------------------------------------------
// Table – rows plus the set of optional columns the source carried
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: BTreeSet<OptionalColumn>,
    pub rows: Vec<Observation>,
}

impl Table {
    pub fn new(columns: BTreeSet<OptionalColumn>, rows: Vec<Observation>) -> Self {
        Table { columns, rows }
    }

    pub fn has_column(&self, column: OptionalColumn) -> bool {
        self.columns.contains(&column)
    }

    /// A derived table holding clones of the rows matching `pred`.
    pub fn filtered(&self, pred: impl Fn(&Observation) -> bool) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|o| pred(o)).cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Dataset – one loaded version plus pre-computed indices
// ---------------------------------------------------------------------------

/// The full parsed dataset with pre-computed column indices.
/// Shared as `Arc<Dataset>` by the cache and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub table: Table,
    /// Sorted distinct sectors.
    pub sectors: BTreeSet<Category>,
    /// Distinct (model, scenario) pairs in first-appearance order.
    pub combos: Vec<(Category, Category)>,
    /// Sorted distinct regions per sector.
    pub regions_by_sector: BTreeMap<Category, BTreeSet<Category>>,
    pub variables: BTreeSet<Category>,
    pub powertrains: BTreeSet<Category>,
}

impl Dataset {
    /// Build column indices from the loaded table.
    pub fn from_table(table: Table) -> Self {
        let mut sectors = BTreeSet::new();
        let mut seen_combos = BTreeSet::new();
        let mut combos = Vec::new();
        let mut regions_by_sector: BTreeMap<Category, BTreeSet<Category>> = BTreeMap::new();
        let mut variables = BTreeSet::new();
        let mut powertrains = BTreeSet::new();

        for obs in &table.rows {
            sectors.insert(obs.sector.clone());
            if seen_combos.insert((obs.model.clone(), obs.scenario.clone())) {
                combos.push((obs.model.clone(), obs.scenario.clone()));
            }
            regions_by_sector
                .entry(obs.sector.clone())
                .or_default()
                .insert(obs.region.clone());
            variables.insert(obs.variables.clone());
            if let Some(p) = &obs.powertrain {
                powertrains.insert(p.clone());
            }
        }

        Dataset {
            table,
            sectors,
            combos,
            regions_by_sector,
            variables,
            powertrains,
        }
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Sorted sectors with the `priority` ones that exist moved to the front,
    /// in the order given.
    pub fn sectors_for_display(&self, priority: &[String]) -> Vec<Category> {
        let mut out: Vec<Category> = priority
            .iter()
            .filter_map(|p| self.sectors.get(p.as_str()).cloned())
            .collect();
        for sector in &self.sectors {
            if !out.contains(sector) {
                out.push(sector.clone());
            }
        }
        out
    }

    /// `"<model> - <scenario>"` labels, in first-appearance order.
    pub fn combo_options(&self) -> Vec<String> {
        self.combos
            .iter()
            .map(|(m, s)| super::filter::format_combo(m, s))
            .collect()
    }

    pub fn regions_for_sector(&self, sector: &str) -> Vec<Category> {
        self.regions_by_sector
            .get(sector)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Terse row builder shared by the data-layer tests.
    pub(crate) fn obs(
        region: &str,
        sector: &str,
        model: &str,
        scenario: &str,
        variables: &str,
        year: i32,
        val: f32,
    ) -> Observation {
        Observation {
            region: region.into(),
            sector: sector.into(),
            model: model.into(),
            scenario: scenario.into(),
            variables: variables.into(),
            year,
            val,
            powertrain: None,
            size: None,
            construction_year: None,
        }
    }

    #[test]
    fn interner_shares_allocations() {
        let mut interner = Interner::default();
        let a = interner.intern("World");
        let b = interner.intern("World");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(interner.intern_opt(Some("  ")), None);
        assert_eq!(interner.intern_opt(None), None);
    }

    #[test]
    fn dataset_indices() {
        let rows = vec![
            obs("EU", "Population", "M2", "SSP1-Base", "pop", 2020, 1.0),
            obs("US", "Population", "M1", "SSP2-RCP26", "pop", 2020, 2.0),
            obs("World", "Carbon dioxide emissions", "M2", "SSP1-Base", "co2", 2020, 3.0),
            obs("EU", "Population", "M2", "SSP1-Base", "pop", 2030, 1.0),
        ];
        let ds = Dataset::from_table(Table::new(BTreeSet::new(), rows));

        assert_eq!(ds.len(), 4);
        assert_eq!(
            ds.combo_options(),
            vec!["M2 - SSP1-Base".to_string(), "M1 - SSP2-RCP26".to_string()]
        );
        let regions: Vec<String> = ds
            .regions_for_sector("Population")
            .iter()
            .map(|r| r.to_string())
            .collect();
        assert_eq!(regions, vec!["EU", "US"]);
        assert!(ds.regions_for_sector("Nope").is_empty());
    }

    #[test]
    fn priority_sectors_come_first() {
        let rows = vec![
            obs("EU", "Aviation", "M", "SSP2-Base", "a", 2020, 1.0),
            obs("EU", "Population", "M", "SSP2-Base", "p", 2020, 1.0),
            obs("EU", "Biomass", "M", "SSP2-Base", "b", 2020, 1.0),
        ];
        let ds = Dataset::from_table(Table::new(BTreeSet::new(), rows));
        let priority = vec![
            "Carbon dioxide emissions".to_string(),
            "Population".to_string(),
        ];
        let order: Vec<String> = ds
            .sectors_for_display(&priority)
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(order, vec!["Population", "Aviation", "Biomass"]);
    }

    #[test]
    fn colour_values_come_from_the_matching_column() {
        let mut row = obs("EU", "Transport: freight", "M", "SSP2-Base", "truck", 2020, 1.0);
        row.size = Some("40t".into());
        assert_eq!(row.dimension(OptionalColumn::Size).map(|c| &**c), Some("40t"));
        assert_eq!(ColorDimension::Powertrain.value_of(&row), None);
        assert_eq!(ColorDimension::Variables.value_of(&row).map(|c| &**c), Some("truck"));

        row.powertrain = Some("BEV".into());
        assert_eq!(ColorDimension::Powertrain.value_of(&row).map(|c| &**c), Some("BEV"));
    }

    #[test]
    fn color_dimension_by_sector() {
        assert_eq!(
            ColorDimension::for_sector("Transport: freight"),
            ColorDimension::Powertrain
        );
        assert_eq!(
            ColorDimension::for_sector("Population"),
            ColorDimension::Variables
        );
        // The token match is case-sensitive.
        assert_eq!(
            ColorDimension::for_sector("transport"),
            ColorDimension::Variables
        );
    }
}
