//! Signal group resolution
//!
//! Looks up every identifier of every category in the opened log, once, in
//! declaration order. Identifiers that cannot be read are kept as explicit
//! `Unresolved` entries instead of aborting the run.

use crate::config::{Category, CategoryMap};
use mf4_decoder::{Signal, SignalSource};

/// Minimum and maximum of a signal's samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrema {
    pub min: f64,
    pub max: f64,
}

impl Extrema {
    /// Extrema over the non-NaN values, `None` if there are none
    pub fn of(values: &[f64]) -> Option<Self> {
        values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc: Option<Extrema>, v| match acc {
                None => Some(Extrema { min: v, max: v }),
                Some(e) => Some(Extrema {
                    min: e.min.min(v),
                    max: e.max.max(v),
                }),
            })
    }

    /// Smallest range covering both
    pub fn merge(self, other: Extrema) -> Extrema {
        Extrema {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// One resolved signal of a category
#[derive(Debug, Clone, PartialEq)]
pub struct SignalRecord {
    pub identifier: String,
    pub unit: Option<String>,
    pub samples: Vec<f64>,
    pub timestamps: Vec<f64>,
    /// `None` when the signal has no (non-NaN) samples
    pub extrema: Option<Extrema>,
}

impl SignalRecord {
    /// Build a record from a decoded signal
    ///
    /// Fails when samples and timestamps differ in length.
    pub fn from_signal(identifier: &str, signal: Signal) -> Result<Self, String> {
        if signal.samples.len() != signal.timestamps.len() {
            return Err(format!(
                "{} samples but {} timestamps",
                signal.samples.len(),
                signal.timestamps.len()
            ));
        }
        let extrema = Extrema::of(&signal.samples);
        Ok(Self {
            identifier: identifier.to_string(),
            unit: signal.unit.filter(|u| !u.trim().is_empty()),
            samples: signal.samples,
            timestamps: signal.timestamps,
            extrema,
        })
    }

    /// (time, value) pairs that can be drawn
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.timestamps
            .iter()
            .copied()
            .zip(self.samples.iter().copied())
            .filter(|(t, v)| t.is_finite() && v.is_finite())
    }
}

/// Outcome of looking up one identifier
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(SignalRecord),
    Unresolved { identifier: String, reason: String },
}

/// All lookups of one category, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryResult {
    pub label: String,
    pub resolutions: Vec<Resolution>,
}

impl CategoryResult {
    /// Resolved records in declaration order
    pub fn records(&self) -> impl Iterator<Item = &SignalRecord> {
        self.resolutions.iter().filter_map(|r| match r {
            Resolution::Resolved(record) => Some(record),
            Resolution::Unresolved { .. } => None,
        })
    }

    /// Identifiers that could not be read
    pub fn unresolved(&self) -> impl Iterator<Item = &str> {
        self.resolutions.iter().filter_map(|r| match r {
            Resolution::Unresolved { identifier, .. } => Some(identifier.as_str()),
            Resolution::Resolved(_) => None,
        })
    }

    /// True if no identifier resolved; such categories are not exported
    pub fn is_empty(&self) -> bool {
        self.records().next().is_none()
    }
}

/// Look up one identifier
pub fn resolve_identifier<S: SignalSource>(source: &mut S, category: &str, identifier: &str) -> Resolution {
    let outcome = source
        .signal(identifier)
        .map_err(|e| e.to_string())
        .and_then(|signal| SignalRecord::from_signal(identifier, signal));

    match outcome {
        Ok(record) => {
            log::debug!(
                "[{}] {}: {} samples, unit {:?}",
                category,
                identifier,
                record.samples.len(),
                record.unit
            );
            Resolution::Resolved(record)
        }
        Err(reason) => {
            log::warn!("Could not extract '{}' for {}: {}", identifier, category, reason);
            Resolution::Unresolved {
                identifier: identifier.to_string(),
                reason,
            }
        }
    }
}

/// Resolve every identifier of one category
pub fn resolve_category<S: SignalSource>(source: &mut S, category: &Category) -> CategoryResult {
    let resolutions = category
        .identifiers
        .iter()
        .map(|identifier| resolve_identifier(source, &category.label, identifier))
        .collect();

    let result = CategoryResult {
        label: category.label.clone(),
        resolutions,
    };
    if result.is_empty() {
        log::warn!("No signals found for {}, skipping its plot", category.label);
    }
    result
}

/// Resolve all categories in declaration order
pub fn resolve_all<S: SignalSource>(source: &mut S, categories: &CategoryMap) -> Vec<CategoryResult> {
    categories
        .iter()
        .map(|category| resolve_category(source, category))
        .collect()
}
