//! Plain-text console summary.

use std::fmt::Write;

use webtrack_core::formatting::{format_number, format_optional_duration, format_percent};
use webtrack_data::analysis::AnalysisResult;

const WIDTH: usize = 72;

/// Render `result` as a short human-readable report.
pub fn render_summary(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let t = &result.totals;
    let m = &result.metadata;

    // ── Header ────────────────────────────────────────────────────────────────
    let _ = writeln!(out, "WEBTRACKER DOWNLOAD OVERLAP ANALYSIS");
    let _ = writeln!(out, "{}", "=".repeat(WIDTH));
    let _ = writeln!(out, "Generated:          {}", m.generated_at);
    let _ = writeln!(
        out,
        "Events processed:   {}",
        format_number(m.events_processed as f64, 0)
    );
    let _ = writeln!(
        out,
        "Users analyzed:     {} ({} failed)",
        format_number(m.users_analyzed as f64, 0),
        m.users_failed
    );
    let _ = writeln!(out, "Analysis time:      {:.2}s", m.analysis_time_seconds);
    out.push('\n');

    // ── Totals ────────────────────────────────────────────────────────────────
    let _ = writeln!(out, "Downloads:          {}", format_number(t.num_downloads as f64, 0));
    let _ = writeln!(out, "Overlaps:           {}", format_number(t.num_overlaps as f64, 0));
    let _ = writeln!(
        out,
        "Avg overlap:        {}",
        format_optional_duration(t.avg_overlap_duration)
    );
    let _ = writeln!(
        out,
        "Avg until overlap:  {}",
        format_optional_duration(t.avg_time_before_overlap_starts)
    );
    let _ = writeln!(
        out,
        "Avg between:        {}",
        format_optional_duration(t.avg_time_between_overlaps)
    );
    let _ = writeln!(
        out,
        "Avg URLs/overlap:   {}",
        t.avg_num_urls_per_overlap
            .map(|v| format_number(v, 2))
            .unwrap_or_else(|| "-".to_string())
    );
    let _ = writeln!(
        out,
        "Top overlap URL:    {}",
        t.most_common_url_that_begins_an_overlap
            .as_deref()
            .unwrap_or("-")
    );

    // ── Per user ──────────────────────────────────────────────────────────────
    if !result.users.is_empty() {
        out.push('\n');
        let _ = writeln!(
            out,
            "{:<24} {:>8} {:>10} {:>9} {:>10}",
            "User", "Logs", "Downloads", "Overlaps", "% dloads"
        );
        let _ = writeln!(out, "{}", "-".repeat(WIDTH));
        for user in &result.users {
            let s = &user.stats;
            let _ = writeln!(
                out,
                "{:<24} {:>8} {:>10} {:>9} {:>10}",
                truncate(&user.userid, 24),
                format_number(s.num_logs as f64, 0),
                format_number(s.num_downloads as f64, 0),
                format_number(s.num_overlaps as f64, 0),
                format_percent(s.percent_downloads)
            );
        }
    }

    // ── Failures ──────────────────────────────────────────────────────────────
    if !result.failures.is_empty() {
        out.push('\n');
        let _ = writeln!(out, "Failed users:");
        for failure in &result.failures {
            let _ = writeln!(out, "  - {}: {}", failure.userid, failure.error);
        }
    }

    out
}

/// Cut `s` to at most `max` characters, marking the cut with `…`.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
