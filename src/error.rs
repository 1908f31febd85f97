use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Error taxonomy surfaced to the UI
// ---------------------------------------------------------------------------

/// Errors returned by the dataset cache, the pipeline and metadata loading.
///
/// Loader internals use `anyhow` with context; the chain is flattened into
/// `reason` when it crosses the cache boundary.
#[derive(Debug, thiserror::Error)]
pub enum ExplorerError {
    /// Dataset source missing, unreadable or malformed.
    #[error("failed to load dataset '{key}': {reason}")]
    DatasetLoad { key: String, reason: String },

    /// A combo string that is not `<model> - <scenario>`.
    #[error("malformed model-scenario combination '{0}': expected \"<model> - <scenario>\"")]
    MalformedCombo(String),

    /// A scenario that is not `<SSP>-<RCP>`.
    #[error("malformed scenario '{0}': expected \"<SSP>-<RCP>\"")]
    MalformedScenario(String),

    /// A metadata YAML file exists but could not be parsed.
    #[error("failed to read metadata {}: {reason}", path.display())]
    Metadata { path: PathBuf, reason: String },
}

impl ExplorerError {
    pub fn dataset_load(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DatasetLoad {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ExplorerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_combo_display() {
        let err = ExplorerError::MalformedCombo("ModelOnly".to_string());
        assert_eq!(
            err.to_string(),
            "malformed model-scenario combination 'ModelOnly': expected \"<model> - <scenario>\""
        );
    }

    #[test]
    fn dataset_load_display_names_key() {
        let err = ExplorerError::dataset_load("v1", "no such file");
        assert_eq!(err.to_string(), "failed to load dataset 'v1': no such file");
    }
}
