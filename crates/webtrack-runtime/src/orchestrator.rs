//! Concurrent analysis orchestrator.
//!
//! Splits a batch of events by user, deals the users round-robin into
//! shards, and runs each shard on a tokio blocking worker. Workers share
//! nothing: each owns its shard's events outright and hands back its
//! outcomes through the `JoinSet`. Outcomes land in one pre-sized slot per
//! shard, and the cross-user totals are only computed once every slot is
//! filled. A panic inside one user's pipeline fails that user only.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};
use webtrack_core::models::Event;
use webtrack_data::analysis::{
    analyze_batch, finalize, AnalysisResult, UserFailure, UserOutcome,
};
use webtrack_data::store::{partition_by_user, UserBatch};

// ── AnalysisOrchestrator ──────────────────────────────────────────────────────

/// Runs the per-user pipeline across a fixed number of blocking workers.
#[derive(Debug, Clone)]
pub struct AnalysisOrchestrator {
    workers: usize,
}

impl AnalysisOrchestrator {
    /// Create an orchestrator with `workers` shards (at least one).
    ///
    /// Callers resolve "auto" themselves, see `Settings::effective_workers`.
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Analyze `events` and wait for the result.
    ///
    /// Dropping the returned future aborts every shard still queued; results
    /// of shards already finished are discarded with it.
    pub async fn run(&self, events: Vec<Event>) -> AnalysisResult {
        self.run_with(events, analyze_batch).await
    }

    /// Analyze `events` in a background task.
    pub fn spawn(self, events: Vec<Event>) -> AnalysisHandle {
        let handle = tokio::spawn(async move { self.run(events).await });
        AnalysisHandle { handle }
    }

    // ── Private implementation ────────────────────────────────────────────

    async fn run_with<F>(&self, events: Vec<Event>, analyze: F) -> AnalysisResult
    where
        F: Fn(&UserBatch) -> UserOutcome + Send + Copy + 'static,
    {
        let started = Instant::now();
        let events_processed = events.len();
        let batches = partition_by_user(&events);
        drop(events);

        let shards = shard_round_robin(batches, self.workers);
        let shard_users: Vec<Vec<String>> = shards
            .iter()
            .map(|shard| shard.iter().map(|b| b.userid.clone()).collect())
            .collect();
        debug!(
            "Dispatching {} users over {} shards",
            shard_users.iter().map(Vec::len).sum::<usize>(),
            shards.len()
        );

        let mut slots: Vec<Option<Vec<UserOutcome>>> =
            (0..shards.len()).map(|_| None).collect();
        let mut join_set = JoinSet::new();
        for (idx, shard) in shards.into_iter().enumerate() {
            join_set.spawn(async move {
                let outcome = tokio::task::spawn_blocking(move || {
                    shard
                        .iter()
                        .map(|batch| analyze_isolated(analyze, batch))
                        .collect::<Vec<UserOutcome>>()
                })
                .await;
                (idx, outcome)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, Ok(outcomes))) => slots[idx] = Some(outcomes),
                Ok((idx, Err(e))) => {
                    warn!("Shard {} worker failed: {}", idx, e);
                    let reason = format!("worker failed: {}", e);
                    slots[idx] = Some(fail_all(&shard_users[idx], &reason));
                }
                Err(e) => warn!("Shard task failed: {}", e),
            }
        }

        let outcomes = slots
            .into_iter()
            .enumerate()
            .flat_map(|(idx, slot)| {
                slot.unwrap_or_else(|| fail_all(&shard_users[idx], "worker did not complete"))
            })
            .collect();

        finalize(outcomes, events_processed, started)
    }
}

// ── AnalysisHandle ────────────────────────────────────────────────────────────

/// A handle to a background analysis task.
///
/// Call [`AnalysisHandle::abort`] to give up on the run; dropping the handle
/// detaches it instead.
pub struct AnalysisHandle {
    handle: JoinHandle<AnalysisResult>,
}

impl AnalysisHandle {
    /// Abort the run. In-flight results are discarded.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Wait for the run; `None` when it was aborted.
    pub async fn wait(&mut self) -> Option<AnalysisResult> {
        match (&mut self.handle).await {
            Ok(result) => Some(result),
            Err(e) => {
                debug!("analysis task ended without a result: {}", e);
                None
            }
        }
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Deal `batches` into at most `workers` shards, round-robin.
fn shard_round_robin(batches: Vec<UserBatch>, workers: usize) -> Vec<Vec<UserBatch>> {
    let count = workers.max(1).min(batches.len());
    let mut shards: Vec<Vec<UserBatch>> = (0..count).map(|_| Vec::new()).collect();
    for (i, batch) in batches.into_iter().enumerate() {
        shards[i % count].push(batch);
    }
    shards
}

/// Run `analyze` on one user, turning a panic into that user's failure.
fn analyze_isolated<F>(analyze: F, batch: &UserBatch) -> UserOutcome
where
    F: Fn(&UserBatch) -> UserOutcome,
{
    catch_unwind(AssertUnwindSafe(|| analyze(batch))).unwrap_or_else(|payload| {
        let reason = panic_message(payload.as_ref());
        warn!("Analysis of user {} panicked: {}", batch.userid, reason);
        Err(UserFailure::new(&batch.userid, format!("analysis panicked: {}", reason)))
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn fail_all(users: &[String], reason: &str) -> Vec<UserOutcome> {
    users
        .iter()
        .map(|u| Err(UserFailure::new(u, reason)))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
