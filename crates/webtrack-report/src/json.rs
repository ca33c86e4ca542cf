//! JSON export of the full analysis result.

use std::path::{Path, PathBuf};

use tracing::info;
use webtrack_core::error::Result;
use webtrack_data::analysis::AnalysisResult;

use crate::ReportSink;

/// File name of the JSON document inside the output directory.
pub const JSON_FILE_NAME: &str = "analysis.json";

/// Pretty-printed JSON for `result`.
pub fn to_json_string(result: &AnalysisResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Writes the whole [`AnalysisResult`] as one JSON document.
#[derive(Debug, Clone)]
pub struct JsonReport {
    path: PathBuf,
}

impl JsonReport {
    /// Report into `output_dir/analysis.json`.
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            path: output_dir.as_ref().join(JSON_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for JsonReport {
    fn name(&self) -> &str {
        "json"
    }

    fn write(&mut self, result: &AnalysisResult) -> Result<()> {
        let json = to_json_string(result)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write to a temp file first, then rename for an atomic replace.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;

        info!("JSON report written to {}", self.path.display());
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
