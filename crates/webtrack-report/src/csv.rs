//! CSV table export.
//!
//! Five tables, one file each, in the output directory:
//!
//! | file                     | one row per            |
//! |--------------------------|------------------------|
//! | `user_data.csv`          | user                   |
//! | `unique_url_data.csv`    | URL seen by any user   |
//! | `download_data.csv`      | download               |
//! | `overlap_data.csv`       | overlap                |
//! | `total_overlap_data.csv` | (single summary row)   |
//!
//! Durations are converted from milliseconds to the unit named in the
//! column header and rounded to two decimals. Undefined values are empty
//! cells.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use webtrack_core::error::Result;
use webtrack_core::formatting::{
    format_timestamp_ms, ms_to_hours, ms_to_minutes, ms_to_seconds, round2,
};
use webtrack_data::analysis::AnalysisResult;

use crate::ReportSink;

// ── Table ─────────────────────────────────────────────────────────────────────

/// One CSV table, ready to serialize.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// File name inside the output directory.
    pub file_name: &'static str,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Serialize with `\n` line endings, quoting fields per RFC 4180.
    pub fn to_csv_string(&self) -> String {
        let mut out = String::new();
        push_record(&mut out, self.headers.iter().copied());
        for row in &self.rows {
            push_record(&mut out, row.iter().map(String::as_str));
        }
        out
    }
}

fn push_record<'a, I>(out: &mut String, fields: I)
where
    I: IntoIterator<Item = &'a str>,
{
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&quote_field(field));
    }
    out.push('\n');
}

/// Quote `field` when it contains a comma, quote or line break.
pub fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

// ── Table builders ────────────────────────────────────────────────────────────

/// Per-user statistics.
pub fn user_table(result: &AnalysisResult) -> Table {
    let rows = result
        .users
        .iter()
        .map(|u| {
            let s = &u.stats;
            vec![
                u.userid.clone(),
                s.num_logs.to_string(),
                opt_cell(ms_to_hours(s.browsing_time.map(|t| t as f64))),
                s.num_sessions.to_string(),
                opt_cell(ms_to_hours(s.avg_session_time)),
                s.num_downloads.to_string(),
                opt_cell(s.percent_downloads.map(round2)),
                s.urls_visited.len().to_string(),
                s.num_overlaps.to_string(),
                opt_cell(s.percent_overlap_logs.map(round2)),
                opt_cell(ms_to_seconds(s.avg_overlap_duration)),
                opt_cell(ms_to_minutes(s.avg_time_between_overlaps)),
                opt_cell(s.avg_num_urls_per_overlap.map(round2)),
            ]
        })
        .collect();

    Table {
        file_name: "user_data.csv",
        headers: vec![
            "user",
            "num_logs",
            "browsing_time (hrs)",
            "num_sessions",
            "avg_session_time (hrs)",
            "num_downloads",
            "percent_downloads",
            "num_urls_visited",
            "num_overlaps",
            "percent_overlaps",
            "avg_overlap_duration (secs)",
            "avg_time_between_overlaps (mins)",
            "avg_num_urls_per_overlap",
        ],
        rows,
    }
}

/// Per-URL totals across users.
pub fn url_table(result: &AnalysisResult) -> Table {
    let rows = result
        .totals
        .urls
        .iter()
        .map(|u| {
            vec![
                u.url.clone(),
                u.num_times_downloaded.to_string(),
                opt_cell(ms_to_seconds(u.avg_download_time)),
                yes_cell(u.involved_in_an_overlap),
                yes_cell(u.begins_an_overlap),
            ]
        })
        .collect();

    Table {
        file_name: "unique_url_data.csv",
        headers: vec![
            "url",
            "num_times_downloaded",
            "avg_download_time (secs)",
            "involved_in_an_overlap",
            "begins_an_overlap",
        ],
        rows,
    }
}

/// Every download of every user.
pub fn download_table(result: &AnalysisResult) -> Table {
    let rows = result
        .users
        .iter()
        .flat_map(|u| {
            u.downloads.iter().map(move |d| {
                vec![
                    d.url().to_string(),
                    u.userid.clone(),
                    format_timestamp_ms(d.start_ts()),
                    opt_cell(ms_to_seconds(Some(d.duration as f64))),
                ]
            })
        })
        .collect();

    Table {
        file_name: "download_data.csv",
        headers: vec![
            "url",
            "user_who_downloaded",
            "download_start",
            "download_duration (secs)",
        ],
        rows,
    }
}

/// Every overlap of every user.
pub fn overlap_table(result: &AnalysisResult) -> Table {
    let rows = result
        .users
        .iter()
        .flat_map(|u| {
            u.overlaps.iter().map(move |o| {
                vec![
                    u.userid.clone(),
                    format_timestamp_ms(o.anchor.start_ts()),
                    opt_cell(ms_to_seconds(Some(o.duration as f64))),
                    opt_cell(ms_to_seconds(o.time_before_overlap_starts.map(|t| t as f64))),
                    o.overlapping_url.clone().unwrap_or_default(),
                    o.num_urls().to_string(),
                    o.num_downloads().to_string(),
                ]
            })
        })
        .collect();

    Table {
        file_name: "overlap_data.csv",
        headers: vec![
            "user_for_this_overlap",
            "overlap_start",
            "overlap_duration (secs)",
            "time_before_overlap_starts (secs)",
            "url_that_begins_the_overlap",
            "num_urls_per_overlap",
            "num_downloads_per_overlap",
        ],
        rows,
    }
}

/// The single-row cross-user overlap summary.
pub fn total_overlap_table(result: &AnalysisResult) -> Table {
    let t = &result.totals;
    Table {
        file_name: "total_overlap_data.csv",
        headers: vec![
            "avg_time_between_overlaps (mins)",
            "avg_overlap_duration (secs)",
            "avg_time_before_overlap_starts (secs)",
            "avg_num_urls_per_overlap",
            "most_common_url_that_begins_an_overlap",
        ],
        rows: vec![vec![
            opt_cell(ms_to_minutes(t.avg_time_between_overlaps)),
            opt_cell(ms_to_seconds(t.avg_overlap_duration)),
            opt_cell(ms_to_seconds(t.avg_time_before_overlap_starts)),
            opt_cell(t.avg_num_urls_per_overlap.map(round2)),
            t.most_common_url_that_begins_an_overlap
                .clone()
                .unwrap_or_default(),
        ]],
    }
}

/// All five tables, in file order.
pub fn all_tables(result: &AnalysisResult) -> Vec<Table> {
    vec![
        user_table(result),
        url_table(result),
        download_table(result),
        overlap_table(result),
        total_overlap_table(result),
    ]
}

fn opt_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn yes_cell(flag: bool) -> String {
    if flag { "yes" } else { "" }.to_string()
}

// ── CsvReport ─────────────────────────────────────────────────────────────────

/// Writes every table into one directory.
#[derive(Debug, Clone)]
pub struct CsvReport {
    output_dir: PathBuf,
    written: Vec<PathBuf>,
}

impl CsvReport {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            written: Vec::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Files written by the last [`ReportSink::write`].
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl ReportSink for CsvReport {
    fn name(&self) -> &str {
        "csv"
    }

    fn write(&mut self, result: &AnalysisResult) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        self.written.clear();

        for table in all_tables(result) {
            let path = self.output_dir.join(table.file_name);
            std::fs::write(&path, table.to_csv_string())?;
            debug!("Wrote {} rows to {}", table.rows.len(), path.display());
            self.written.push(path);
        }

        info!(
            "CSV report: {} tables in {}",
            self.written.len(),
            self.output_dir.display()
        );
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use webtrack_core::models::{Event, Status};
    use webtrack_data::analysis::analyze_events;

    fn ev(ts: i64, user: &str, tab: i64, url: &str, status: Status) -> Event {
        Event::new(ts, user, tab, url, status)
    }

    fn sample_result() -> AnalysisResult {
        analyze_events(&[
            ev(0, "alice", 1, "a.com", Status::Started),
            ev(5_000, "alice", 2, "b.com", Status::Started),
            ev(10_000, "alice", 1, "a.com", Status::Finished),
            ev(12_000, "alice", 3, "c.com", Status::Started),
            ev(15_000, "alice", 2, "b.com", Status::Finished),
            ev(20_000, "alice", 3, "c.com", Status::Finished),
            ev(0, "bob", 1, "a.com", Status::Closed),
        ])
    }

    // ── quoting ──────────────────────────────────────────────────────────────

    #[test]
    fn test_quote_field() {
        assert_eq!(quote_field("plain"), "plain");
        assert_eq!(quote_field("a,b"), "\"a,b\"");
        assert_eq!(quote_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(quote_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_table_to_csv_string() {
        let table = Table {
            file_name: "t.csv",
            headers: vec!["a", "b"],
            rows: vec![vec!["1".to_string(), "x,y".to_string()]],
        };
        assert_eq!(table.to_csv_string(), "a,b\n1,\"x,y\"\n");
    }

    // ── builders ─────────────────────────────────────────────────────────────

    #[test]
    fn test_user_table_rows() {
        let table = user_table(&sample_result());
        assert_eq!(table.rows.len(), 2);
        let alice = &table.rows[0];
        assert_eq!(alice.len(), table.headers.len());
        assert_eq!(alice[0], "alice");
        assert_eq!(alice[1], "6");
        assert_eq!(alice[5], "3");
        assert_eq!(alice[6], "100");
        // 20s overlap.
        assert_eq!(alice[10], "20");
        // Single overlap: no gap between overlaps.
        assert_eq!(alice[11], "");

        let bob = &table.rows[1];
        assert_eq!(bob[6], "");
        assert_eq!(bob[10], "");
    }

    #[test]
    fn test_url_table_flags() {
        let table = url_table(&sample_result());
        let urls: Vec<&str> = table.rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(urls, vec!["a.com", "b.com", "c.com"]);
        let b = &table.rows[1];
        assert_eq!(b[1], "1");
        assert_eq!(b[2], "10");
        assert_eq!(b[3], "yes");
        assert_eq!(b[4], "yes");
        assert_eq!(table.rows[0][4], "");
    }

    #[test]
    fn test_download_and_overlap_tables() {
        let result = sample_result();
        let downloads = download_table(&result);
        assert_eq!(downloads.rows.len(), 3);
        assert_eq!(downloads.rows[0][1], "alice");

        let overlaps = overlap_table(&result);
        assert_eq!(overlaps.rows.len(), 1);
        let row = &overlaps.rows[0];
        assert_eq!(row[0], "alice");
        assert_eq!(row[2], "20");
        assert_eq!(row[3], "5");
        assert_eq!(row[4], "b.com");
        assert_eq!(row[5], "3");
        assert_eq!(row[6], "3");
    }

    #[test]
    fn test_total_overlap_table_single_row() {
        let table = total_overlap_table(&sample_result());
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][0], "");
        assert_eq!(table.rows[0][1], "20");
        assert_eq!(table.rows[0][4], "b.com");
    }

    // ── CsvReport ────────────────────────────────────────────────────────────

    #[test]
    fn test_csv_report_writes_all_files() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("reports");
        let mut report = CsvReport::new(&out);
        report.write(&sample_result()).unwrap();

        assert_eq!(report.written().len(), 5);
        for name in [
            "user_data.csv",
            "unique_url_data.csv",
            "download_data.csv",
            "overlap_data.csv",
            "total_overlap_data.csv",
        ] {
            assert!(out.join(name).is_file(), "missing {}", name);
        }
        let users = std::fs::read_to_string(out.join("user_data.csv")).unwrap();
        assert!(users.starts_with("user,num_logs,browsing_time (hrs)"));
        assert_eq!(users.lines().count(), 3);
    }
}
