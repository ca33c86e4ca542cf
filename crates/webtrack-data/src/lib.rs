//! Log ingestion and the analysis pipeline for webtrack.
//!
//! Reads WebTracker access logs into an [`store::EventStore`], then rebuilds
//! per-user sessions, extracts downloads, chains overlapping downloads and
//! aggregates statistics. Nothing here depends on an output format.

pub mod aggregator;
pub mod analysis;
pub mod downloads;
pub mod overlap;
pub mod reader;
pub mod sessions;
pub mod store;
