//! Report layer for webtrack.
//!
//! Turns a finished [`AnalysisResult`] into CSV tables, a JSON document, or a
//! plain-text console summary. Every output goes through [`ReportSink`], so
//! the analysis crates never see a file format.

pub mod csv;
pub mod json;
pub mod summary;

use webtrack_core::error::Result;
use webtrack_data::analysis::AnalysisResult;

pub use crate::csv::CsvReport;
pub use crate::json::JsonReport;
pub use crate::summary::render_summary;


/// A destination for analysis results.
pub trait ReportSink {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Write `result` out. May be called once per run.
    fn write(&mut self, result: &AnalysisResult) -> Result<()>;
}
