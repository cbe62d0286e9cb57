//! Log file selection
//!
//! Picks the newest log file in the input directory that the decoder can
//! actually open, walking back through older files when the newest ones are
//! unreadable.

use crate::error::{Result, VisualizerError};
use chrono::{DateTime, Local};
use mf4_decoder::Mf4File;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// A file that matches the log extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub file_name: String,
    pub modified: SystemTime,
}

/// The opened log file chosen for the run
pub struct SelectedLog<S> {
    pub source: S,
    pub file_name: String,
    pub path: PathBuf,
    pub modified: SystemTime,
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(extension))
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// List files with the given extension, newest first
///
/// Files with equal modification times are ordered by name so the choice is
/// deterministic.
pub fn list_candidates(dir: &Path, extension: &str) -> Result<Vec<Candidate>> {
    let entries = fs::read_dir(dir).map_err(|source| VisualizerError::InputDirectory {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| VisualizerError::InputDirectory {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() || !has_extension(&path, extension) {
            continue;
        }

        let modified = match entry.metadata().and_then(|m| m.modified()) {
            Ok(time) => time,
            Err(e) => {
                log::debug!("No modification time for {:?}: {}", path, e);
                UNIX_EPOCH
            }
        };
        let file_name = entry.file_name().to_string_lossy().into_owned();
        candidates.push(Candidate {
            path,
            file_name,
            modified,
        });
    }

    candidates.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
    Ok(candidates)
}

/// Open the newest candidate that `open` accepts
///
/// Every failed candidate is logged as a warning and skipped. Fails with
/// [`VisualizerError::NoReadableLogFile`] when nothing opens, including when
/// there are no candidates at all.
pub fn select_latest<S, E, F>(dir: &Path, extension: &str, mut open: F) -> Result<SelectedLog<S>>
where
    F: FnMut(&Path) -> std::result::Result<S, E>,
    E: Display,
{
    let candidates = list_candidates(dir, extension)?;
    log::debug!("Found {} .{} candidate(s) in {:?}", candidates.len(), extension, dir);

    for candidate in &candidates {
        match open(&candidate.path) {
            Ok(source) => {
                log::info!(
                    "Loaded file: {} (modified {})",
                    candidate.file_name,
                    format_time(candidate.modified)
                );
                return Ok(SelectedLog {
                    source,
                    file_name: candidate.file_name.clone(),
                    path: candidate.path.clone(),
                    modified: candidate.modified,
                });
            }
            Err(e) => {
                log::warn!("Failed to load {}: {}", candidate.file_name, e);
            }
        }
    }

    Err(VisualizerError::NoReadableLogFile {
        dir: dir.to_path_buf(),
        candidates: candidates.len(),
    })
}

/// Open the newest readable MF4 file in `dir`
pub fn select_latest_mf4(dir: &Path, extension: &str) -> Result<SelectedLog<Mf4File<BufReader<File>>>> {
    select_latest(dir, extension, |path: &Path| Mf4File::open(path))
}
