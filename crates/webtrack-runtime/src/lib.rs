//! Runtime layer for webtrack.
//!
//! Fans the per-user analysis pipeline out over tokio blocking workers and
//! gathers the results back into one [`data::analysis::AnalysisResult`].

pub mod orchestrator;

pub use webtrack_data as data;
