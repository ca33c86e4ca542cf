//! Main analysis pipeline.
//!
//! Runs sessions → downloads → overlaps → statistics for each user, isolates
//! per-user failures, and finishes with the cross-user [`Totals`].

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use webtrack_core::error::{Result, TrackerError};
use webtrack_core::models::{Download, Event, Overlap, Session};

use crate::aggregator::{Totals, UserAggregator, UserStats};
use crate::downloads::DownloadExtractor;
use crate::overlap::{sort_for_chaining, OverlapDetector};
use crate::sessions::SessionBuilder;
use crate::store::{partition_by_user, UserBatch};

// ── Public types ──────────────────────────────────────────────────────────────

/// Everything computed for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserReport {
    pub userid: String,
    /// Ordered by session key.
    pub sessions: Vec<Session>,
    /// Ordered by `(end, start)`.
    pub downloads: Vec<Download>,
    /// Ordered by anchor.
    pub overlaps: Vec<Overlap>,
    pub stats: UserStats,
}

/// A user whose pipeline was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFailure {
    pub userid: String,
    pub error: String,
}

impl UserFailure {
    pub fn new(userid: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            userid: userid.into(),
            error: error.to_string(),
        }
    }
}

/// Outcome of one user's pipeline.
pub type UserOutcome = std::result::Result<UserReport, UserFailure>;

/// Metadata produced alongside the analysis result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// RFC 3339 timestamp when this result was generated.
    pub generated_at: String,
    /// Events fed into the run.
    pub events_processed: usize,
    pub users_analyzed: usize,
    pub users_failed: usize,
    /// Wall-clock seconds from partitioning to totals.
    pub analysis_time_seconds: f64,
}

/// The complete output of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Ordered by user id.
    pub users: Vec<UserReport>,
    /// Ordered by user id.
    pub failures: Vec<UserFailure>,
    pub totals: Totals,
    pub metadata: AnalysisMetadata,
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run the per-user pipeline over `events`, which must all belong to
/// `userid`.
///
/// Fails with [`TrackerError::InvalidState`] when a foreign event slips in
/// or a session cannot be built.
pub fn analyze_user(userid: &str, events: &[Event]) -> Result<UserReport> {
    if let Some(stray) = events.iter().find(|e| e.userid != userid) {
        return Err(TrackerError::InvalidState(format!(
            "event for user {} in batch of user {}",
            stray.userid, userid
        )));
    }

    let sessions = SessionBuilder::build(events)?.into_sorted_sessions();
    let downloads = sort_for_chaining(DownloadExtractor::extract_all(&sessions));
    let overlaps = OverlapDetector::detect(&downloads);
    let stats = UserAggregator::aggregate(userid, &sessions, &downloads, &overlaps);

    debug!(
        "User {}: {} sessions, {} downloads, {} overlaps",
        userid,
        sessions.len(),
        downloads.len(),
        overlaps.len()
    );

    Ok(UserReport {
        userid: userid.to_string(),
        sessions,
        downloads,
        overlaps,
        stats,
    })
}

/// Run one user's batch, turning an error into a [`UserFailure`].
pub fn analyze_batch(batch: &UserBatch) -> UserOutcome {
    analyze_user(&batch.userid, &batch.events).map_err(|e| {
        warn!("Analysis of user {} failed: {}", batch.userid, e);
        UserFailure::new(&batch.userid, e)
    })
}

/// Merge per-user outcomes into the final result.
///
/// Must only run once every user's outcome is in; `Totals` are computed
/// here.
pub fn finalize(
    outcomes: Vec<UserOutcome>,
    events_processed: usize,
    started: Instant,
) -> AnalysisResult {
    let mut users = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(report) => users.push(report),
            Err(failure) => failures.push(failure),
        }
    }
    users.sort_by(|a, b| a.userid.cmp(&b.userid));
    failures.sort_by(|a, b| a.userid.cmp(&b.userid));

    let totals = Totals::from_reports(&users);

    let metadata = AnalysisMetadata {
        generated_at: Utc::now().to_rfc3339(),
        events_processed,
        users_analyzed: users.len(),
        users_failed: failures.len(),
        analysis_time_seconds: started.elapsed().as_secs_f64(),
    };

    info!(
        "Analyzed {} users ({} failed): {} downloads, {} overlaps",
        metadata.users_analyzed, metadata.users_failed, totals.num_downloads, totals.num_overlaps
    );

    AnalysisResult {
        users,
        failures,
        totals,
        metadata,
    }
}

/// Analyze a complete batch of events on the calling thread.
pub fn analyze_events(events: &[Event]) -> AnalysisResult {
    let started = Instant::now();
    let outcomes = partition_by_user(events).iter().map(analyze_batch).collect();
    finalize(outcomes, events.len(), started)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
