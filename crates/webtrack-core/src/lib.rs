//! Shared types for webtrack.
//!
//! Holds the tab-activity data model (events, sessions, downloads, overlap
//! chains), the error type, command-line settings, and the number/duration
//! formatting helpers used by the report layer.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;

pub use error::{Result, TrackerError};
