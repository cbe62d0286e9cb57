//! MF4 Visualizer
//!
//! Picks the newest readable MF4 log in `./mf4_logfiles`, plots the battery
//! signal categories and writes them to `./mf4_exports`:
//! - one PNG per category that has at least one signal
//! - `all_plots.pdf` with every chart as a page
//!
//! The decoding itself lives in the mf4-decoder library.

use anyhow::{Context, Result};

mod chart;
mod config;
mod error;
mod export;
mod pipeline;
mod report;
mod resolver;
mod selector;
mod viewer;

use config::VisualizerConfig;

fn main() -> Result<()> {
    init_logging();

    log::info!("MF4 Visualizer v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", mf4_decoder::VERSION);

    let config = VisualizerConfig::default();
    let outcome = match pipeline::run(&config) {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("{}", e);
            return Err(e).context("Visualization failed");
        }
    };

    log::info!(
        "Plotted {} of {} categories",
        outcome.exports.charts.len(),
        outcome.results.len()
    );

    println!();
    println!("All plots exported to {}", outcome.export_dir.display());
    match &outcome.exports.document {
        Some(document) => {
            println!("PDF with all plots saved to {}", document.display());
            if let Err(e) = viewer::open_in_viewer(document) {
                log::warn!("Could not open {} in a viewer: {}", document.display(), e);
            }
        }
        None => println!("No signals found in {}, nothing plotted", outcome.file_name),
    }

    Ok(())
}

/// Initialize logging at info level unless `RUST_LOG` says otherwise
fn init_logging() {
    use env_logger::{Builder, Env};
    use std::io::Write;

    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
