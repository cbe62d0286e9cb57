//! One visualizer run: select, resolve, export, summarize

use crate::config::VisualizerConfig;
use crate::error::{Result, VisualizerError};
use crate::export::{ExportSummary, PlotExporter};
use crate::report;
use crate::resolver::{self, CategoryResult};
use crate::selector;
use std::fs;
use std::path::PathBuf;

/// What a successful run produced
#[derive(Debug)]
pub struct RunOutcome {
    /// File name of the log that was read
    pub file_name: String,
    pub export_dir: PathBuf,
    pub results: Vec<CategoryResult>,
    pub exports: ExportSummary,
}

/// Run the whole pipeline for `config`
///
/// The log is selected before anything is written, so a directory without a
/// readable log leaves the export directory untouched.
pub fn run(config: &VisualizerConfig) -> Result<RunOutcome> {
    log::info!("Scanning {:?} for .{} files", config.input_dir, config.extension);
    let mut selected = selector::select_latest_mf4(&config.input_dir, &config.extension)?;
    log::debug!(
        "{:?} (modified {:?}): MDF {} written by '{}', started {:?}",
        selected.path,
        selected.modified,
        selected.source.version(),
        selected.source.program(),
        selected.source.start_time()
    );
    log::debug!("Channels: {:?}", selected.source.channel_names());

    fs::create_dir_all(&config.export_dir).map_err(|source| VisualizerError::ExportDirectory {
        path: config.export_dir.clone(),
        source,
    })?;

    let results = resolver::resolve_all(&mut selected.source, &config.categories);
    for result in &results {
        log::info!(
            "{}: {} signal(s) found, {} missing",
            result.label,
            result.records().count(),
            result.unresolved().count()
        );
    }

    let mut exporter = PlotExporter::new(
        &config.export_dir,
        config.chart,
        format!("MF4 plots: {}", selected.file_name),
    );
    for result in results.iter().filter(|result| !result.is_empty()) {
        exporter.export(result)?;
    }
    let exports = exporter.finish(&config.document_path())?;

    report::print_summary(&selected.file_name, &results);

    Ok(RunOutcome {
        file_name: selected.file_name,
        export_dir: config.export_dir.clone(),
        results,
        exports,
    })
}
