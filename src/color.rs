use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::{Category, Dataset};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping: series key → Color32
// ---------------------------------------------------------------------------

/// Stable colour per series key, shared by every chart of a dataset version
/// so the same variable has the same colour everywhere.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<Category, Color32>,
    default_color: Color32,
}

impl ColorMap {
    /// Assign palette colours to `keys` in the order given.
    pub fn new(keys: impl IntoIterator<Item = Category>) -> Self {
        let keys: Vec<Category> = keys.into_iter().collect();
        let palette = generate_palette(keys.len());
        let mapping = keys.into_iter().zip(palette).collect();

        ColorMap {
            mapping,
            default_color: Color32::GRAY,
        }
    }

    /// Sorted distinct `variables`, then any `powertrain` values not
    /// already among them. A pure function of the dataset.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let extra = dataset
            .powertrains
            .iter()
            .filter(|p| !dataset.variables.contains(*p))
            .cloned();
        Self::new(dataset.variables.iter().cloned().chain(extra))
    }

    /// Look up the colour for a given key.
    pub fn color_for(&self, key: &str) -> Color32 {
        self.mapping.get(key).copied().unwrap_or(self.default_color)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::data::model::tests::obs;
    use crate::data::model::Table;

    #[test]
    fn palette_has_requested_size() {
        assert!(generate_palette(0).is_empty());
        let colours = generate_palette(5);
        assert_eq!(colours.len(), 5);
        let distinct: BTreeSet<[u8; 4]> = colours.iter().map(|c| c.to_array()).collect();
        assert_eq!(distinct.len(), 5);
    }

    #[test]
    fn colours_depend_only_on_distinct_values() {
        let a = Dataset::from_table(Table::new(
            BTreeSet::new(),
            vec![
                obs("EU", "S", "M", "SSP2-Base", "wind", 2020, 1.0),
                obs("EU", "S", "M", "SSP2-Base", "coal", 2020, 1.0),
            ],
        ));
        let b = Dataset::from_table(Table::new(
            BTreeSet::new(),
            vec![
                obs("US", "T", "N", "SSP1-Base", "coal", 2050, 9.0),
                obs("US", "T", "N", "SSP1-Base", "wind", 2050, 9.0),
                obs("CN", "T", "N", "SSP1-Base", "coal", 2060, 9.0),
            ],
        ));

        let map_a = ColorMap::from_dataset(&a);
        let map_b = ColorMap::from_dataset(&b);
        assert_eq!(map_a.mapping.len(), 2);
        assert_eq!(map_a.color_for("coal"), map_b.color_for("coal"));
        assert_eq!(map_a.color_for("wind"), map_b.color_for("wind"));
        assert_ne!(map_a.color_for("coal"), map_a.color_for("wind"));
        assert_eq!(map_a.color_for("hydro"), Color32::GRAY);
    }

    #[test]
    fn powertrains_extend_the_map() {
        let mut row = obs("EU", "Transport: freight", "M", "SSP2-Base", "truck", 2020, 1.0);
        row.powertrain = Some("BEV".into());
        let ds = Dataset::from_table(Table::new(BTreeSet::new(), vec![row]));
        let map = ColorMap::from_dataset(&ds);
        assert_eq!(map.mapping.len(), 2);
        assert_ne!(map.color_for("BEV"), Color32::GRAY);
    }
}
