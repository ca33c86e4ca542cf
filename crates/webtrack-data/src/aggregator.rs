//! Per-user statistics and cross-user totals.
//!
//! Everything here is a pure function of already-built sessions, downloads
//! and overlaps. Means over an empty collection are `None`, never zero.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use webtrack_core::models::{Download, Overlap, Session, SessionKey};

use crate::analysis::UserReport;
use crate::downloads::{mean_duration, DownloadExtractor};

// ── UserStats ─────────────────────────────────────────────────────────────────

/// Mean download time of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAverage {
    pub session: SessionKey,
    pub avg_download_time: Option<f64>,
}

/// Mean of the per-session download averages for one URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlAverage {
    pub url: String,
    pub avg_download_time: Option<f64>,
}

/// Scalar statistics for one user. Durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub userid: String,
    pub num_logs: usize,
    pub num_sessions: usize,
    pub num_downloads: usize,
    pub num_overlaps: usize,
    /// Last event timestamp minus the first.
    pub browsing_time: Option<i64>,
    /// Distinct URLs over the user's sessions, in session order.
    pub urls_visited: Vec<String>,
    /// Distinct URLs that yielded at least one download.
    pub urls_in_downloads: Vec<String>,
    pub percent_downloads: Option<f64>,
    pub percent_overlap_logs: Option<f64>,
    pub avg_session_time: Option<f64>,
    pub avg_download_time: Option<f64>,
    pub avg_download_time_per_session: Vec<SessionAverage>,
    pub avg_download_time_per_url: Vec<UrlAverage>,
    pub avg_overlap_duration: Option<f64>,
    pub avg_time_before_overlap_starts: Option<f64>,
    pub avg_num_urls_per_overlap: Option<f64>,
    pub avg_time_between_overlaps: Option<f64>,
}

/// Stateless per-user aggregator.
pub struct UserAggregator;

impl UserAggregator {
    /// Derive `userid`'s statistics.
    ///
    /// `sessions` are expected in key order; `urls_visited` follows it.
    pub fn aggregate(
        userid: &str,
        sessions: &[Session],
        downloads: &[Download],
        overlaps: &[Overlap],
    ) -> UserStats {
        let num_logs: usize = sessions.iter().map(|s| s.events.len()).sum();

        let browsing_time = match (
            sessions.iter().map(|s| s.start).min(),
            sessions.iter().map(|s| s.end).max(),
        ) {
            (Some(first), Some(last)) => Some(last - first),
            _ => None,
        };

        let urls_visited = unique_in_order(sessions.iter().map(|s| s.url()));
        let urls_in_downloads = unique_in_order(downloads.iter().map(|d| d.url()));

        let percent_downloads = if num_logs == 0 || downloads.is_empty() {
            None
        } else {
            Some((downloads.len() * 2) as f64 / num_logs as f64 * 100.0)
        };

        let overlap_logs: usize = overlaps.iter().map(|o| o.members.len()).sum();
        let percent_overlap_logs = if num_logs == 0 {
            None
        } else {
            Some(overlap_logs as f64 / num_logs as f64 * 100.0)
        };

        let avg_download_time_per_session: Vec<SessionAverage> = sessions
            .iter()
            .map(|s| SessionAverage {
                session: s.key.clone(),
                avg_download_time: DownloadExtractor::avg_download_time(s),
            })
            .collect();

        let avg_download_time_per_url = urls_visited
            .iter()
            .map(|url| UrlAverage {
                url: url.clone(),
                avg_download_time: mean(
                    avg_download_time_per_session
                        .iter()
                        .filter(|a| &a.session.url == url)
                        .filter_map(|a| a.avg_download_time),
                ),
            })
            .collect();

        UserStats {
            userid: userid.to_string(),
            num_logs,
            num_sessions: sessions.len(),
            num_downloads: downloads.len(),
            num_overlaps: overlaps.len(),
            browsing_time,
            urls_visited,
            urls_in_downloads,
            percent_downloads,
            percent_overlap_logs,
            avg_session_time: mean(sessions.iter().map(|s| s.duration() as f64)),
            avg_download_time: mean_duration(downloads),
            avg_download_time_per_session,
            avg_download_time_per_url,
            avg_overlap_duration: mean(overlaps.iter().map(|o| o.duration as f64)),
            avg_time_before_overlap_starts: mean(
                overlaps
                    .iter()
                    .filter_map(|o| o.time_before_overlap_starts)
                    .map(|t| t as f64),
            ),
            avg_num_urls_per_overlap: mean(overlaps.iter().map(|o| o.num_urls() as f64)),
            avg_time_between_overlaps: avg_time_between_overlaps(overlaps),
        }
    }
}

/// Mean gap between consecutive overlaps, ordered by anchor start.
///
/// The gap is the next anchor's start minus the previous terminator's end.
/// `None` with fewer than two overlaps.
pub fn avg_time_between_overlaps(overlaps: &[Overlap]) -> Option<f64> {
    let mut ordered: Vec<&Overlap> = overlaps.iter().collect();
    ordered.sort_by_key(|o| o.anchor.start_ts());
    mean(
        ordered
            .windows(2)
            .map(|w| (w[1].anchor.start_ts() - w[0].terminator.end_ts()) as f64),
    )
}

// ── Totals ────────────────────────────────────────────────────────────────────

/// Per-URL row of the cross-user summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlStats {
    pub url: String,
    /// Downloads of this URL across every user.
    pub num_times_downloaded: usize,
    /// Mean of every session's average download time for this URL.
    pub avg_download_time: Option<f64>,
    /// Appears in some overlap's URL set.
    pub involved_in_an_overlap: bool,
    /// Is some overlap's `overlapping_url`.
    pub begins_an_overlap: bool,
}

/// Summary across every successfully analyzed user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub num_users: usize,
    pub num_logs: usize,
    pub num_downloads: usize,
    pub num_overlaps: usize,
    pub all_urls_in_overlaps: Vec<String>,
    pub overlapping_urls: Vec<String>,
    pub most_common_url_that_begins_an_overlap: Option<String>,
    /// Sorted by URL.
    pub urls: Vec<UrlStats>,
    pub avg_overlap_duration: Option<f64>,
    pub avg_time_before_overlap_starts: Option<f64>,
    pub avg_num_urls_per_overlap: Option<f64>,
    /// Mean of the users' own averages, where defined.
    pub avg_time_between_overlaps: Option<f64>,
}

impl Totals {
    /// Summarize `reports`, which must already be complete.
    pub fn from_reports(reports: &[UserReport]) -> Self {
        let overlaps: Vec<&Overlap> = reports.iter().flat_map(|r| r.overlaps.iter()).collect();

        let all_urls_in_overlaps = unique_in_order(
            overlaps
                .iter()
                .flat_map(|o| o.unique_urls.iter().map(String::as_str)),
        );
        let overlapping_urls: Vec<String> = overlaps
            .iter()
            .filter_map(|o| o.overlapping_url.clone())
            .collect();

        let mut downloaded: HashMap<&str, usize> = HashMap::new();
        let mut session_avgs: HashMap<&str, Vec<f64>> = HashMap::new();
        let mut urls: BTreeSet<&str> = BTreeSet::new();
        for report in reports {
            for url in &report.stats.urls_visited {
                urls.insert(url.as_str());
            }
            for download in &report.downloads {
                *downloaded.entry(download.url()).or_default() += 1;
            }
            for avg in &report.stats.avg_download_time_per_session {
                if let Some(value) = avg.avg_download_time {
                    session_avgs
                        .entry(avg.session.url.as_str())
                        .or_default()
                        .push(value);
                }
            }
        }

        let urls = urls
            .into_iter()
            .map(|url| UrlStats {
                url: url.to_string(),
                num_times_downloaded: downloaded.get(url).copied().unwrap_or(0),
                avg_download_time: session_avgs
                    .get(url)
                    .and_then(|v| mean(v.iter().copied())),
                involved_in_an_overlap: all_urls_in_overlaps.iter().any(|u| u == url),
                begins_an_overlap: overlapping_urls.iter().any(|u| u == url),
            })
            .collect();

        Self {
            num_users: reports.len(),
            num_logs: reports.iter().map(|r| r.stats.num_logs).sum(),
            num_downloads: reports.iter().map(|r| r.downloads.len()).sum(),
            num_overlaps: overlaps.len(),
            most_common_url_that_begins_an_overlap: mode(&overlapping_urls),
            all_urls_in_overlaps,
            overlapping_urls,
            urls,
            avg_overlap_duration: mean(overlaps.iter().map(|o| o.duration as f64)),
            avg_time_before_overlap_starts: mean(
                overlaps
                    .iter()
                    .filter_map(|o| o.time_before_overlap_starts)
                    .map(|t| t as f64),
            ),
            avg_num_urls_per_overlap: mean(overlaps.iter().map(|o| o.num_urls() as f64)),
            avg_time_between_overlaps: mean(
                reports
                    .iter()
                    .filter_map(|r| r.stats.avg_time_between_overlaps),
            ),
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Arithmetic mean, `None` for an empty iterator.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Most frequent value; ties go to the one seen first.
fn mode(values: &[String]) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v.as_str()).or_default() += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for v in values {
        let count = counts[v.as_str()];
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((v.as_str(), count));
        }
    }
    best.map(|(v, _)| v.to_string())
}

fn unique_in_order<'a, I>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out: Vec<String> = Vec::new();
    for url in urls {
        if !out.iter().any(|u| u == url) {
            out.push(url.to_string());
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
