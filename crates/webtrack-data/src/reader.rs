//! WebTracker access-log discovery and line parsing.
//!
//! Each request the tracker makes shows up in the web server's access log as
//! `GET /WebTracker/<timestamp>:<userid>:<tabid>:<url>:<status> HTTP/1.1`.
//! This module pulls those five fields out and turns them into [`Event`]s.
//! Lines that do not carry a well-formed record are skipped here and never
//! reach the analysis pipeline.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};
use webtrack_core::error::{Result, TrackerError};
use webtrack_core::models::{Event, Status};

use crate::store::EventStore;

/// File extensions picked up when scanning a directory.
const LOG_EXTENSIONS: &[&str] = &["log", "txt"];

/// Counters describing one load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadStats {
    /// Files opened successfully.
    pub files_read: usize,
    /// Files that could not be opened (directory scans only).
    pub files_failed: usize,
    /// Lines containing a `/WebTracker/` request.
    pub tracker_lines: usize,
    /// Tracker lines turned into events.
    pub events_parsed: usize,
    /// Tracker lines rejected as malformed.
    pub lines_rejected: usize,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Find all log files recursively under `dir`, sorted by path.
pub fn find_log_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Log path does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| LOG_EXTENSIONS.contains(&ext))
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Load every tracker event from `path`.
///
/// `path` may be a single file (any extension) or a directory, which is
/// scanned recursively for `*.log` / `*.txt`. Events keep file order, then
/// line order.
pub fn load_events(path: &Path) -> Result<(EventStore, ReadStats)> {
    if !path.exists() {
        return Err(TrackerError::LogPathNotFound(path.to_path_buf()));
    }

    let mut store = EventStore::new();
    let mut stats = ReadStats::default();

    if path.is_file() {
        read_log_file(path, &mut store, &mut stats)?;
    } else {
        let files = find_log_files(path);
        if files.is_empty() {
            return Err(TrackerError::NoLogFiles(path.to_path_buf()));
        }
        for file in &files {
            if let Err(e) = read_log_file(file, &mut store, &mut stats) {
                warn!("Skipping {}: {}", file.display(), e);
                stats.files_failed += 1;
            }
        }
    }

    debug!(
        files = stats.files_read,
        events = stats.events_parsed,
        rejected = stats.lines_rejected,
        "log load complete"
    );

    Ok((store, stats))
}

/// Extract the tracker payload from one access-log line, if present.
///
/// Returns the text between `/WebTracker/` and the last ` HTTP`.
pub fn extract_payload(line: &str) -> Option<&str> {
    tracker_regex()
        .captures(line)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str())
}

/// Parse a `timestamp:userid:tabid:url:status` payload into an [`Event`].
pub fn parse_payload(payload: &str) -> Result<Event> {
    let fields: Vec<&str> = payload.split(':').collect();
    let [timestamp, userid, tabid, url, status] = fields.as_slice() else {
        return Err(TrackerError::MalformedLine(format!(
            "expected 5 fields, got {}: {}",
            fields.len(),
            payload
        )));
    };

    let timestamp = parse_int(timestamp, "timestamp", payload)?;
    let tabid = parse_int(tabid, "tabid", payload)?;
    let status = Status::try_from(parse_int(status, "status", payload)?)?;

    Ok(Event::new(timestamp, *userid, tabid, *url, status))
}

/// Parse a whole access-log line.
///
/// `None` when the line is not a tracker request at all; `Some(Err(_))` when
/// it is one but its payload is malformed.
pub fn parse_line(line: &str) -> Option<Result<Event>> {
    extract_payload(line).map(parse_payload)
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn tracker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/WebTracker/(.*) HTTP").expect("regex is valid"))
}

fn parse_int(field: &str, name: &str, payload: &str) -> Result<i64> {
    field.trim().parse::<i64>().map_err(|_| {
        TrackerError::MalformedLine(format!("non-numeric {} {:?}: {}", name, field, payload))
    })
}

/// Append the events of one file to `store`.
fn read_log_file(path: &Path, store: &mut EventStore, stats: &mut ReadStats) -> Result<()> {
    let file = std::fs::File::open(path).map_err(|source| TrackerError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    stats.files_read += 1;

    let reader = std::io::BufReader::new(file);
    let mut parsed = 0usize;
    let mut rejected = 0usize;

    for line_result in reader.lines() {
        // Non-UTF-8 lines cannot carry a record.
        let Ok(line) = line_result else {
            continue;
        };
        match parse_line(&line) {
            None => {}
            Some(Ok(event)) => {
                parsed += 1;
                store.push(event);
            }
            Some(Err(e)) => {
                rejected += 1;
                debug!("{}: {}", path.display(), e);
            }
        }
    }

    stats.tracker_lines += parsed + rejected;
    stats.events_parsed += parsed;
    stats.lines_rejected += rejected;

    debug!(
        "File {}: {} events, {} rejected",
        path.display(),
        parsed,
        rejected
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn access_line(payload: &str) -> String {
        format!(
            "10.0.0.7 - - [12/Mar/2021:10:00:00 +0000] \"GET /WebTracker/{} HTTP/1.1\" 200 0",
            payload
        )
    }

    fn write_log(dir: &Path, name: &str, lines: &[String]) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    // ── extract_payload / parse_payload ──────────────────────────────────────

    #[test]
    fn test_extract_payload_from_access_line() {
        let line = access_line("1615543200000:alice:3:example.com:1");
        assert_eq!(
            extract_payload(&line),
            Some("1615543200000:alice:3:example.com:1")
        );
    }

    #[test]
    fn test_extract_payload_ignores_other_requests() {
        assert!(extract_payload("GET /index.html HTTP/1.1").is_none());
    }

    #[test]
    fn test_parse_payload_valid() {
        let event = parse_payload("1615543200000:alice:3:example.com:2").unwrap();
        assert_eq!(event.timestamp, 1_615_543_200_000);
        assert_eq!(event.userid, "alice");
        assert_eq!(event.tabid, 3);
        assert_eq!(event.url, "example.com");
        assert_eq!(event.status, Status::Finished);
    }

    #[test]
    fn test_parse_payload_wrong_field_count() {
        let err = parse_payload("1615543200000:alice:3:https://example.com:1").unwrap_err();
        assert!(matches!(err, TrackerError::MalformedLine(_)));
        let err = parse_payload("1615543200000:alice:3").unwrap_err();
        assert!(matches!(err, TrackerError::MalformedLine(_)));
    }

    #[test]
    fn test_parse_payload_non_numeric_fields() {
        assert!(matches!(
            parse_payload("soon:alice:3:example.com:1"),
            Err(TrackerError::MalformedLine(_))
        ));
        assert!(matches!(
            parse_payload("1:alice:tab:example.com:1"),
            Err(TrackerError::MalformedLine(_))
        ));
    }

    #[test]
    fn test_parse_payload_unknown_status() {
        assert!(matches!(
            parse_payload("1:alice:3:example.com:9"),
            Err(TrackerError::InvalidStatus(9))
        ));
    }

    // ── find_log_files ───────────────────────────────────────────────────────

    #[test]
    fn test_find_log_files_recursive_and_sorted() {
        let dir = TempDir::new().unwrap();
        write_log(dir.path(), "b.log", &[]);
        write_log(dir.path(), "nested/a.txt", &[]);
        write_log(dir.path(), "ignored.json", &[]);

        let files = find_log_files(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("b.log"));
        assert!(files[1].ends_with("nested/a.txt"));
    }

    #[test]
    fn test_find_log_files_nonexistent_path() {
        assert!(find_log_files(Path::new("/definitely/not/here")).is_empty());
    }

    // ── load_events ──────────────────────────────────────────────────────────

    #[test]
    fn test_load_events_single_file() {
        let dir = TempDir::new().unwrap();
        let path = write_log(
            dir.path(),
            "access.log",
            &[
                access_line("100:alice:1:a.com:1"),
                "GET /favicon.ico HTTP/1.1".to_string(),
                access_line("200:alice:1:a.com:2"),
                access_line("garbage"),
            ],
        );

        let (store, stats) = load_events(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(stats.files_read, 1);
        assert_eq!(stats.tracker_lines, 3);
        assert_eq!(stats.events_parsed, 2);
        assert_eq!(stats.lines_rejected, 1);
    }

    #[test]
    fn test_load_events_directory_keeps_file_order() {
        let dir = TempDir::new().unwrap();
        write_log(dir.path(), "2.log", &[access_line("300:bob:1:b.com:1")]);
        write_log(dir.path(), "1.log", &[access_line("500:alice:1:a.com:1")]);

        let (store, stats) = load_events(dir.path()).unwrap();
        assert_eq!(stats.files_read, 2);
        let users: Vec<&str> = store.events().iter().map(|e| e.userid.as_str()).collect();
        assert_eq!(users, vec!["alice", "bob"]);
    }

    #[test]
    fn test_load_events_missing_path() {
        let err = load_events(Path::new("/definitely/not/here.log")).unwrap_err();
        assert!(matches!(err, TrackerError::LogPathNotFound(_)));
    }

    #[test]
    fn test_load_events_empty_directory() {
        let dir = TempDir::new().unwrap();
        let err = load_events(dir.path()).unwrap_err();
        assert!(matches!(err, TrackerError::NoLogFiles(_)));
    }
}
