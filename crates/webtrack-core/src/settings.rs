use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, TrackerError};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Reconstruct browsing sessions and download overlaps from WebTracker logs
#[derive(Parser, Debug, Clone)]
#[command(
    name = "webtrack",
    about = "Reconstruct browsing sessions and download overlaps from WebTracker logs",
    version
)]
pub struct Settings {
    /// Input log file, or a directory scanned recursively for *.log / *.txt
    #[arg(short = 'l', long = "log", value_name = "FILE")]
    pub log: PathBuf,

    /// Directory that receives exported reports
    #[arg(short = 'o', long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Export format
    #[arg(long, default_value = "csv", value_parser = ["csv", "json", "both", "none"])]
    pub format: String,

    /// Number of concurrent analysis workers (0 = available parallelism)
    #[arg(long, default_value = "0")]
    pub workers: usize,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

/// Which report files a run should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFormats {
    pub csv: bool,
    pub json: bool,
}

impl Settings {
    /// Decode `--format` into individual switches.
    pub fn export_formats(&self) -> Result<ExportFormats> {
        match self.format.as_str() {
            "csv" => Ok(ExportFormats {
                csv: true,
                json: false,
            }),
            "json" => Ok(ExportFormats {
                csv: false,
                json: true,
            }),
            "both" => Ok(ExportFormats {
                csv: true,
                json: true,
            }),
            "none" => Ok(ExportFormats {
                csv: false,
                json: false,
            }),
            other => Err(TrackerError::Config(format!("unknown format: {}", other))),
        }
    }

    /// Worker count with `0` resolved to the machine's available parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.webtrack/last_used.json`.
///
/// The input log path is deliberately not persisted.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl LastUsedParams {
    /// Return the default path to the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Return the config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".webtrack").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str(&content) {
            Ok(params) => params,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "ignoring unreadable last-used params");
                Self::default()
            }
        }
    }

    /// Atomically write params to an explicit path, creating parent
    /// directories if needed.
    pub fn save_to(&self, path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        // Write to a temp file then rename for atomicity.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at an explicit path if it exists.
    pub fn clear_at(path: &std::path::Path) -> std::result::Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation – accepts args and an explicit config path so that
    /// tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        // Raw ArgMatches let us query ValueSource.
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::apply_debug_flag(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins. clap keys args by field name, not flag spelling.
        if !is_arg_explicitly_set(&matches, "output_dir") {
            if let Some(v) = last.output_dir {
                settings.output_dir = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "format") {
            if let Some(v) = last.format {
                settings.format = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "workers") {
            if let Some(v) = last.workers {
                settings.workers = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "log_level") {
            if let Some(v) = last.log_level {
                settings.log_level = v;
            }
        }

        // Persist before --debug rewrites the level so it does not stick.
        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        Self::apply_debug_flag(settings)
    }

    /// `--debug` overrides the log level.
    fn apply_debug_flag(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            output_dir: Some(s.output_dir.clone()),
            format: Some(s.format.clone()),
            workers: Some(s.workers),
            log_level: Some(s.log_level.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    fn args(list: &[&str]) -> Vec<std::ffi::OsString> {
        list.iter().map(|s| s.into()).collect()
    }

    // ── LastUsedParams ────────────────────────────────────────────────────────

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            output_dir: Some(PathBuf::from("/tmp/reports")),
            format: Some("json".to_string()),
            workers: Some(4),
            log_level: Some("WARNING".to_string()),
        };
        params.save_to(&path).expect("save");

        let loaded = LastUsedParams::load_from(&path);
        assert_eq!(loaded.output_dir, Some(PathBuf::from("/tmp/reports")));
        assert_eq!(loaded.format, Some("json".to_string()));
        assert_eq!(loaded.workers, Some(4));
        assert_eq!(loaded.log_level, Some("WARNING".to_string()));
    }

    #[test]
    fn test_last_used_params_default_when_missing_or_corrupt() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        assert!(LastUsedParams::load_from(&path).format.is_none());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert!(LastUsedParams::load_from(&path).format.is_none());
    }

    #[test]
    fn test_last_used_params_clear() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&path).expect("save");
        assert!(path.exists());

        LastUsedParams::clear_at(&path).expect("clear");
        assert!(!path.exists());
    }

    // ── Settings parsing ──────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["webtrack", "--log", "access.log"]);

        assert_eq!(settings.log, PathBuf::from("access.log"));
        assert_eq!(settings.output_dir, PathBuf::from("."));
        assert_eq!(settings.format, "csv");
        assert_eq!(settings.workers, 0);
        assert_eq!(settings.log_level, "INFO");
        assert!(settings.log_file.is_none());
        assert!(!settings.debug);
        assert!(!settings.clear);
    }

    #[test]
    fn test_settings_requires_log() {
        assert!(Settings::try_parse_from(["webtrack"]).is_err());
    }

    #[test]
    fn test_settings_rejects_unknown_format() {
        assert!(Settings::try_parse_from(["webtrack", "-l", "a.log", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_export_formats() {
        let mut settings = Settings::parse_from(["webtrack", "-l", "a.log"]);
        assert_eq!(
            settings.export_formats().unwrap(),
            ExportFormats {
                csv: true,
                json: false
            }
        );
        settings.format = "both".to_string();
        assert_eq!(
            settings.export_formats().unwrap(),
            ExportFormats {
                csv: true,
                json: true
            }
        );
        settings.format = "pdf".to_string();
        assert!(matches!(
            settings.export_formats(),
            Err(TrackerError::Config(_))
        ));
    }

    #[test]
    fn test_effective_workers() {
        let mut settings = Settings::parse_from(["webtrack", "-l", "a.log", "--workers", "3"]);
        assert_eq!(settings.effective_workers(), 3);
        settings.workers = 0;
        assert!(settings.effective_workers() >= 1);
    }

    // ── load_with_last_used ───────────────────────────────────────────────────

    #[test]
    fn test_load_with_last_used_merges_persisted_format() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            format: Some("json".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings =
            Settings::load_with_last_used_impl(args(&["webtrack", "-l", "a.log"]), &config_path);
        assert_eq!(settings.format, "json");
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            format: Some("json".to_string()),
            workers: Some(8),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(
            args(&["webtrack", "-l", "a.log", "--format", "both"]),
            &config_path,
        );
        assert_eq!(settings.format, "both");
        assert_eq!(settings.workers, 8);
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams::default()
            .save_to(&config_path)
            .expect("save");

        Settings::load_with_last_used_impl(
            args(&["webtrack", "-l", "a.log", "--clear"]),
            &config_path,
        );
        assert!(!config_path.exists());
    }

    #[test]
    fn test_load_with_last_used_debug_not_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        let settings = Settings::load_with_last_used_impl(
            args(&["webtrack", "-l", "a.log", "--debug"]),
            &config_path,
        );
        assert_eq!(settings.log_level, "DEBUG");

        let loaded = LastUsedParams::load_from(&config_path);
        assert_eq!(loaded.log_level, Some("INFO".to_string()));
    }
}
