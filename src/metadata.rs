//! Static descriptive tables: per-sector units and explanatory text, and
//! SSP / RCP scenario descriptions. Loaded once at start-up.

use std::collections::BTreeMap;
use std::path::Path;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ExplorerError, Result};

pub const UNITS_FILE: &str = "units.yaml";
pub const SSP_FILE: &str = "ssp_descriptions.yaml";
pub const RCP_FILE: &str = "rcp_descriptions.yaml";

const DEFAULT_Y_LABEL: &str = "Value";

/// Display unit and explanation of one sector.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SectorInfo {
    pub label: Option<String>,
    pub expl_text: Option<String>,
}

/// Name and description of an SSP or RCP code.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScenarioDescription {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioMetadata {
    pub units: BTreeMap<String, SectorInfo>,
    pub ssp: BTreeMap<String, ScenarioDescription>,
    pub rcp: BTreeMap<String, ScenarioDescription>,
}

impl ScenarioMetadata {
    /// Read the three YAML files from `dir`. Missing files give empty
    /// tables; unparseable ones are an error.
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            units: load_table(&dir.join(UNITS_FILE))?,
            ssp: load_table(&dir.join(SSP_FILE))?,
            rcp: load_table(&dir.join(RCP_FILE))?,
        })
    }

    /// Y-axis label for a sector, `"Value"` when none is configured.
    pub fn y_axis_label(&self, sector: &str) -> &str {
        self.units
            .get(sector)
            .and_then(|u| u.label.as_deref())
            .unwrap_or(DEFAULT_Y_LABEL)
    }

    pub fn explanation(&self, sector: &str) -> &str {
        self.units
            .get(sector)
            .and_then(|u| u.expl_text.as_deref())
            .unwrap_or("")
    }

    pub fn ssp(&self, code: &str) -> ScenarioDescription {
        self.ssp.get(code).cloned().unwrap_or_default()
    }

    pub fn rcp(&self, code: &str) -> ScenarioDescription {
        self.rcp.get(code).cloned().unwrap_or_default()
    }
}

fn load_table<T: DeserializeOwned>(path: &Path) -> Result<BTreeMap<String, T>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("metadata file {} not found, using empty table", path.display());
            return Ok(BTreeMap::new());
        }
        Err(e) => {
            return Err(ExplorerError::Metadata {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };
    // An empty document deserializes to unit, not a mapping.
    if text.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_yaml::from_str(&text).map_err(|e| ExplorerError::Metadata {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_all_three_tables() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(UNITS_FILE),
            "Population:\n  label: million people\n  expl_text: Number of inhabitants.\n\
             Carbon dioxide emissions:\n  label: Gt CO2/yr\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(SSP_FILE),
            "SSP2:\n  name: Middle of the road\n  description: Trends follow history.\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(RCP_FILE),
            "RCP26:\n  name: 2.6 W/m2\n  description: Stringent mitigation.\n",
        )
        .unwrap();

        let meta = ScenarioMetadata::load(dir.path()).unwrap();
        assert_eq!(meta.y_axis_label("Population"), "million people");
        assert_eq!(meta.explanation("Population"), "Number of inhabitants.");
        assert_eq!(meta.explanation("Carbon dioxide emissions"), "");
        assert_eq!(meta.ssp("SSP2").name, "Middle of the road");
        assert_eq!(meta.rcp("RCP26").description, "Stringent mitigation.");
    }

    #[test]
    fn missing_entries_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let meta = ScenarioMetadata::load(dir.path()).unwrap();
        assert_eq!(meta.y_axis_label("Anything"), "Value");
        assert_eq!(meta.explanation("Anything"), "");
        assert_eq!(meta.ssp("SSP9"), ScenarioDescription::default());
    }

    #[test]
    fn malformed_yaml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SSP_FILE), "SSP1: [unclosed\n").unwrap();
        let err = ScenarioMetadata::load(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            ExplorerError::Metadata { ref path, .. } if path.ends_with(SSP_FILE)
        ));
    }
}
