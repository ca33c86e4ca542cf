mod bootstrap;

use anyhow::{Context, Result};
use webtrack_core::settings::Settings;
use webtrack_data::reader::load_events;
use webtrack_report::{render_summary, CsvReport, JsonReport, ReportSink};
use webtrack_runtime::orchestrator::AnalysisOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_deref())?;

    tracing::info!("webtrack v{} starting", env!("CARGO_PKG_VERSION"));
    let formats = settings.export_formats()?;

    let (store, stats) = load_events(&settings.log)
        .with_context(|| format!("Failed to load logs from {}", settings.log.display()))?;
    tracing::info!(
        "Loaded {} events from {} files ({} malformed lines skipped)",
        stats.events_parsed,
        stats.files_read,
        stats.lines_rejected
    );
    if stats.files_failed > 0 {
        tracing::warn!("{} log files could not be read", stats.files_failed);
    }

    let orchestrator = AnalysisOrchestrator::new(settings.effective_workers());
    tracing::info!("Analyzing with {} workers", orchestrator.workers());
    let mut handle = orchestrator.spawn(store.into_events());

    // Ctrl+C abandons the run; nothing is written.
    let outcome = tokio::select! {
        result = handle.wait() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C received; aborting analysis");
            None
        }
    };
    handle.abort();

    let Some(result) = outcome else {
        tracing::warn!("Analysis did not complete; no reports written");
        return Ok(());
    };

    let mut sinks: Vec<Box<dyn ReportSink>> = Vec::new();
    if formats.csv {
        sinks.push(Box::new(CsvReport::new(&settings.output_dir)));
    }
    if formats.json {
        sinks.push(Box::new(JsonReport::new(&settings.output_dir)));
    }
    for sink in sinks.iter_mut() {
        let name = sink.name().to_string();
        sink.write(&result)
            .with_context(|| format!("Failed to write {} report", name))?;
    }

    print!("{}", render_summary(&result));
    Ok(())
}
