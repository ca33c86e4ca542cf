use chrono::DateTime;

const MS_PER_SECOND: f64 = 1_000.0;
const MS_PER_MINUTE: f64 = 60_000.0;
const MS_PER_HOUR: f64 = 3_600_000.0;

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use webtrack_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    // Handle the sign separately so the thousands grouping works on the
    // absolute value.
    let negative = value < 0.0;
    let abs_value = value.abs();

    // Half an ULP at the target precision keeps exact midpoints rounding up.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let frac_part = rounded - rounded.trunc();

    let int_str = integer_part.to_string();
    let grouped = group_thousands(&int_str);

    let result = if decimals == 0 {
        grouped
    } else {
        let frac_str = format!("{:.prec$}", frac_part, prec = decimals as usize);
        // `frac_str` starts with "0.", e.g. "0.50". Strip the leading "0".
        let decimal_digits = &frac_str[1..];
        format!("{}{}", grouped, decimal_digits)
    };

    if negative {
        format!("-{}", result)
    } else {
        result
    }
}

/// Round `value` to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Milliseconds → hours, rounded to two decimals.
///
/// ```
/// use webtrack_core::formatting::ms_to_hours;
///
/// assert_eq!(ms_to_hours(Some(5_400_000.0)), Some(1.5));
/// assert_eq!(ms_to_hours(None), None);
/// ```
pub fn ms_to_hours(ms: Option<f64>) -> Option<f64> {
    ms.map(|v| round2(v / MS_PER_HOUR))
}

/// Milliseconds → minutes, rounded to two decimals.
pub fn ms_to_minutes(ms: Option<f64>) -> Option<f64> {
    ms.map(|v| round2(v / MS_PER_MINUTE))
}

/// Milliseconds → seconds, rounded to two decimals.
pub fn ms_to_seconds(ms: Option<f64>) -> Option<f64> {
    ms.map(|v| round2(v / MS_PER_SECOND))
}

/// Format a millisecond duration as a compact human-readable string.
///
/// * `< 1s` → `"850ms"`
/// * `< 1m` → `"12.5s"`
/// * `< 1h` → `"4m 10s"`
/// * otherwise → `"3h 45m"`
///
/// # Examples
///
/// ```
/// use webtrack_core::formatting::format_duration_ms;
///
/// assert_eq!(format_duration_ms(850.0), "850ms");
/// assert_eq!(format_duration_ms(12_500.0), "12.5s");
/// assert_eq!(format_duration_ms(250_000.0), "4m 10s");
/// assert_eq!(format_duration_ms(13_500_000.0), "3h 45m");
/// ```
pub fn format_duration_ms(ms: f64) -> String {
    let negative = ms < 0.0;
    let abs_ms = ms.abs();

    let body = if abs_ms < MS_PER_SECOND {
        format!("{}ms", abs_ms.round() as i64)
    } else if abs_ms < MS_PER_MINUTE {
        format!("{}s", format_number(abs_ms / MS_PER_SECOND, 1).trim_end_matches(".0"))
    } else if abs_ms < MS_PER_HOUR {
        let total_secs = (abs_ms / MS_PER_SECOND).round() as i64;
        let (mins, secs) = (total_secs / 60, total_secs % 60);
        if secs == 0 {
            format!("{}m", mins)
        } else {
            format!("{}m {}s", mins, secs)
        }
    } else {
        let total_mins = (abs_ms / MS_PER_MINUTE).round() as i64;
        let (hours, mins) = (total_mins / 60, total_mins % 60);
        if mins == 0 {
            format!("{}h", hours)
        } else {
            format!("{}h {}m", hours, mins)
        }
    };

    if negative {
        format!("-{}", body)
    } else {
        body
    }
}

/// Like [`format_duration_ms`], but renders an undefined value as `"-"`.
pub fn format_optional_duration(ms: Option<f64>) -> String {
    ms.map(format_duration_ms).unwrap_or_else(|| "-".to_string())
}

/// Calculate `(part / whole) * 100`.
///
/// Returns `None` when `whole` is zero instead of dividing by zero.
///
/// # Examples
///
/// ```
/// use webtrack_core::formatting::percentage;
///
/// assert_eq!(percentage(6.0, 10.0), Some(60.0));
/// assert_eq!(percentage(1.0, 0.0), None);
/// ```
pub fn percentage(part: f64, whole: f64) -> Option<f64> {
    if whole == 0.0 {
        return None;
    }
    Some((part / whole) * 100.0)
}

/// Render an optional percentage with two decimals, or `"-"`.
pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}%", format_number(v, 2)),
        None => "-".to_string(),
    }
}

/// Render a millisecond Unix timestamp as RFC 3339 (UTC).
///
/// Falls back to the raw integer when it is outside chrono's range.
pub fn format_timestamp_ms(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── format_number ────────────────────────────────────────────────────────

    #[test]
    fn test_format_number_zero() {
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(0.0, 2), "0.00");
    }

    #[test]
    fn test_format_number_with_thousands() {
        assert_eq!(format_number(1_234.5, 1), "1,234.5");
        assert_eq!(format_number(1_000.0, 0), "1,000");
    }

    #[test]
    fn test_format_number_negative() {
        assert_eq!(format_number(-9_876.5, 1), "-9,876.5");
    }

    #[test]
    fn test_format_number_rounds_up() {
        assert_eq!(format_number(1.005, 2), "1.01");
    }

    // ── unit conversion ──────────────────────────────────────────────────────

    #[test]
    fn test_ms_conversions() {
        assert_eq!(ms_to_hours(Some(7_200_000.0)), Some(2.0));
        assert_eq!(ms_to_minutes(Some(90_000.0)), Some(1.5));
        assert_eq!(ms_to_seconds(Some(1_234.0)), Some(1.23));
        assert_eq!(ms_to_seconds(Some(0.0)), Some(0.0));
        assert_eq!(ms_to_minutes(None), None);
    }

    // ── format_duration_ms ───────────────────────────────────────────────────

    #[test]
    fn test_format_duration_sub_second() {
        assert_eq!(format_duration_ms(0.0), "0ms");
        assert_eq!(format_duration_ms(999.0), "999ms");
    }

    #[test]
    fn test_format_duration_seconds() {
        assert_eq!(format_duration_ms(1_000.0), "1s");
        assert_eq!(format_duration_ms(12_500.0), "12.5s");
    }

    #[test]
    fn test_format_duration_minutes() {
        assert_eq!(format_duration_ms(60_000.0), "1m");
        assert_eq!(format_duration_ms(250_000.0), "4m 10s");
    }

    #[test]
    fn test_format_duration_hours() {
        assert_eq!(format_duration_ms(3_600_000.0), "1h");
        assert_eq!(format_duration_ms(5_400_000.0), "1h 30m");
    }

    #[test]
    fn test_format_duration_negative() {
        assert_eq!(format_duration_ms(-2_000.0), "-2s");
    }

    #[test]
    fn test_format_optional_duration() {
        assert_eq!(format_optional_duration(None), "-");
        assert_eq!(format_optional_duration(Some(500.0)), "500ms");
    }

    // ── percentage ───────────────────────────────────────────────────────────

    #[test]
    fn test_percentage_basic() {
        let p = percentage(50.0, 200.0).unwrap();
        assert!((p - 25.0).abs() < 1e-9, "percentage = {p}");
    }

    #[test]
    fn test_percentage_zero_whole_is_undefined() {
        assert_eq!(percentage(10.0, 0.0), None);
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(Some(60.0)), "60.00%");
        assert_eq!(format_percent(None), "-");
    }

    // ── format_timestamp_ms ──────────────────────────────────────────────────

    #[test]
    fn test_format_timestamp_ms() {
        assert_eq!(format_timestamp_ms(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(
            format_timestamp_ms(1_700_000_000_123),
            "2023-11-14T22:13:20.123+00:00"
        );
    }
}
