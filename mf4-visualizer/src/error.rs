//! Visualizer error type

use std::path::PathBuf;

/// Result type for visualizer operations
pub type Result<T> = std::result::Result<T, VisualizerError>;

/// Errors that end a visualizer run
#[derive(Debug, thiserror::Error)]
pub enum VisualizerError {
    #[error("No readable log file in {dir:?} ({candidates} candidate(s) tried)")]
    NoReadableLogFile { dir: PathBuf, candidates: usize },

    #[error("Cannot read input directory {path:?}: {source}")]
    InputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot create export directory {path:?}: {source}")]
    ExportDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render chart '{title}': {reason}")]
    Render { title: String, reason: String },

    #[error("Failed to write image {path:?}: {reason}")]
    Image { path: PathBuf, reason: String },

    #[error("Failed to write document {path:?}: {reason}")]
    Document { path: PathBuf, reason: String },
}
