//! Overlap chaining.
//!
//! Given every download of one user, finds the maximal chains of
//! transitively overlapping downloads. A chain starts at an *anchor*; a
//! later download joins when it starts strictly after the anchor and no
//! later than the chain's *frontier*, the greatest `end` reached so far.
//! Joining pushes the frontier out, which can in turn admit downloads that
//! never touched the anchor directly.
//!
//! # Ordering
//!
//! Downloads are sorted by `(end, start)`, with full ties broken by
//! `(url, tabid, userid)` so the result does not depend on input order. The
//! terminator of a chain is the member latest in that order, which is the
//! member with the greatest `end` (ties: the last one). Scanning resumes
//! from the terminator, which may itself anchor the next chain.
//!
//! # Complexity
//!
//! Sorting is `O(n log n)`. Each anchor scans forward until no remaining
//! download can start inside the frontier, so sparse input stays close to
//! `O(n)` overall. Dense, fully overlapping input degrades to `O(n²)`.
//!
//! Each download is judged once, against the frontier as it stands when the
//! scan reaches it. A download rejected earlier is not revisited when a later
//! member pushes the frontier past its start.

use std::cmp::Ordering;

use tracing::debug;
use webtrack_core::models::{Download, Overlap};

/// Stateless overlap detector.
pub struct OverlapDetector;

impl OverlapDetector {
    /// Every overlap chain among `downloads`, in anchor order.
    ///
    /// `downloads` may arrive in any order.
    pub fn detect(downloads: &[Download]) -> Vec<Overlap> {
        let sorted = sort_for_chaining(downloads.to_vec());
        let n = sorted.len();
        if n < 2 {
            return Vec::new();
        }

        let global_max_end = sorted[n - 1].end_ts();
        let suffix_min_start = suffix_min_start(&sorted);

        let mut overlaps = Vec::new();
        let mut idx = 0;
        while idx < n - 1 {
            let Some(chain) = Chain::grow(&sorted, idx, &suffix_min_start) else {
                idx += 1;
                continue;
            };

            let terminator = chain.terminator();
            overlaps.push(chain.to_overlap(&sorted));

            if chain.frontier == global_max_end {
                break;
            }
            idx = terminator;
        }

        debug!(
            "OverlapDetector: {} overlaps from {} downloads",
            overlaps.len(),
            n
        );
        overlaps
    }
}

/// Sort downloads by `(end, start)`, then `(url, tabid, userid)`.
pub fn sort_for_chaining(mut downloads: Vec<Download>) -> Vec<Download> {
    downloads.sort_by(chaining_order);
    downloads
}

fn chaining_order(a: &Download, b: &Download) -> Ordering {
    a.end_ts()
        .cmp(&b.end_ts())
        .then_with(|| a.start_ts().cmp(&b.start_ts()))
        .then_with(|| a.session.url.cmp(&b.session.url))
        .then_with(|| a.session.tabid.cmp(&b.session.tabid))
        .then_with(|| a.session.userid.cmp(&b.session.userid))
}

/// `out[i]` is the smallest start among `sorted[i..]`.
fn suffix_min_start(sorted: &[Download]) -> Vec<i64> {
    let mut out = vec![i64::MAX; sorted.len() + 1];
    for i in (0..sorted.len()).rev() {
        out[i] = out[i + 1].min(sorted[i].start_ts());
    }
    out
}

/// One chain under construction, as indices into the sorted downloads.
struct Chain {
    anchor: usize,
    members: Vec<usize>,
    frontier: i64,
}

impl Chain {
    /// Grow the chain anchored at `anchor`. `None` if nothing joins.
    fn grow(sorted: &[Download], anchor: usize, suffix_min_start: &[i64]) -> Option<Self> {
        let anchor_start = sorted[anchor].start_ts();
        let mut chain = Chain {
            anchor,
            members: Vec::new(),
            frontier: sorted[anchor].end_ts(),
        };

        // One forward pass: a download is judged against the frontier as it
        // stands when the scan reaches it.
        for j in anchor + 1..sorted.len() {
            if suffix_min_start[j] > chain.frontier {
                break;
            }
            let start = sorted[j].start_ts();
            if start > anchor_start && start <= chain.frontier {
                chain.members.push(j);
                chain.frontier = chain.frontier.max(sorted[j].end_ts());
            }
        }

        if chain.members.is_empty() {
            None
        } else {
            Some(chain)
        }
    }

    /// Index of the member latest in sorted order.
    fn terminator(&self) -> usize {
        self.members.iter().copied().max().unwrap_or(self.anchor)
    }

    fn to_overlap(&self, sorted: &[Download]) -> Overlap {
        let terminator = self.terminator();
        let members = self
            .members
            .iter()
            .filter(|&&i| i != terminator)
            .map(|&i| sorted[i].clone())
            .collect();
        Overlap::new(
            sorted[self.anchor].clone(),
            members,
            sorted[terminator].clone(),
        )
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
