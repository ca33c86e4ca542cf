//! Download extraction.
//!
//! A download is a `Started` event immediately followed, within the same
//! session, by a `Finished` event. Anything else (a `Finished` with no
//! preceding `Started`, a `Started` that is never finished, `Closed` events)
//! is ordinary noise in tracker logs and is dropped without complaint.

use webtrack_core::models::{Download, Session, Status};

/// Stateless download extractor.
pub struct DownloadExtractor;

impl DownloadExtractor {
    /// Pair up adjacent `Started` → `Finished` events of `session`.
    pub fn extract(session: &Session) -> Vec<Download> {
        let events = &session.events;
        let mut downloads = Vec::new();
        let mut i = 0;

        while i + 1 < events.len() {
            let (current, next) = (&events[i], &events[i + 1]);
            if current.status == Status::Started && next.status == Status::Finished {
                if let Some(download) =
                    Download::new(session.key.clone(), current.clone(), next.clone())
                {
                    downloads.push(download);
                    i += 2;
                    continue;
                }
            }
            i += 1;
        }

        downloads
    }

    /// Downloads of every session in `sessions`, in session order.
    pub fn extract_all<'a, I>(sessions: I) -> Vec<Download>
    where
        I: IntoIterator<Item = &'a Session>,
    {
        sessions.into_iter().flat_map(Self::extract).collect()
    }

    /// Mean download duration of `session` in milliseconds.
    ///
    /// `None` when the session yields no downloads.
    pub fn avg_download_time(session: &Session) -> Option<f64> {
        mean_duration(&Self::extract(session))
    }
}

/// Mean of `downloads`' durations, `None` when empty.
pub fn mean_duration(downloads: &[Download]) -> Option<f64> {
    if downloads.is_empty() {
        return None;
    }
    let total: i64 = downloads.iter().map(|d| d.duration).sum();
    Some(total as f64 / downloads.len() as f64)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
