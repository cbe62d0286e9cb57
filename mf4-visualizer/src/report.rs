//! Console summary of a run

use crate::resolver::{CategoryResult, Resolution};
use std::fmt::Write;

const NOT_AVAILABLE: &str = "n/a";

fn format_value(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{:.3}", v))
}

/// Format the per-category signal table
pub fn format_summary(file_name: &str, results: &[CategoryResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Summary for {}", file_name);

    for result in results {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", result.label);
        if result.is_empty() {
            let _ = writeln!(out, "  (no signals found, not plotted)");
        }

        for record in result.records() {
            let _ = writeln!(
                out,
                "  {:<20} {:<8} {:>8} samples  min {:>12}  max {:>12}",
                record.identifier,
                record.unit.as_deref().unwrap_or("-"),
                record.samples.len(),
                format_value(record.extrema.map(|e| e.min)),
                format_value(record.extrema.map(|e| e.max)),
            );
        }
        for resolution in &result.resolutions {
            if let Resolution::Unresolved { identifier, reason } = resolution {
                let _ = writeln!(out, "  {:<20} missing ({})", identifier, reason);
            }
        }
    }
    out
}

pub fn print_summary(file_name: &str, results: &[CategoryResult]) {
    print!("{}", format_summary(file_name, results));
}
