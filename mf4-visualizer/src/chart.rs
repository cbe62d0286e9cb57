//! Category chart rendering
//!
//! Draws all records of a category as lines over a shared time axis into an
//! in-memory RGB buffer. The same pixels feed the standalone PNG and the
//! document page, so both always show the same chart.

use crate::config::ChartStyle;
use crate::error::{Result, VisualizerError};
use crate::resolver::{CategoryResult, Extrema, SignalRecord};
use plotters::prelude::*;
use std::fmt::Display;
use std::ops::Range;

/// Vertical axis label used when the first signal has no unit
pub const DEFAULT_Y_LABEL: &str = "Value";
pub const X_LABEL: &str = "Time (s)";

const FONT: &str = "sans-serif";
const LINE_WIDTH: u32 = 2;
const LEGEND_LINE_LENGTH: i32 = 20;

// Line colors, cycled in record order
const SERIES_COLORS: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];
const GRID_COLOR: RGBColor = RGBColor(220, 220, 220);
const BOLD_GRID_COLOR: RGBColor = RGBColor(190, 190, 190);

/// A rendered chart: raw RGB pixels plus what was drawn
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChart {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Row-major RGB8 pixels, `width * height * 3` bytes
    pub pixels: Vec<u8>,
    /// Legend labels, one per drawn line, in drawing order
    pub series_labels: Vec<String>,
}

/// Chart title for a category label
///
/// `_` and `-` become spaces, then every word is capitalized: the first
/// letter after a non-letter is upper case, the others lower case.
pub fn chart_title(label: &str) -> String {
    let normalized = label.replace(|c: char| c == '_' || c == '-', " ");
    let mut title = String::with_capacity(normalized.len());
    let mut previous_is_letter = false;
    for c in normalized.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                title.extend(c.to_lowercase());
            } else {
                title.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            title.push(c);
            previous_is_letter = false;
        }
    }
    title
}

/// Vertical axis label: the first record's unit, or a generic label
pub fn y_axis_label(records: &[&SignalRecord]) -> String {
    records
        .first()
        .and_then(|record| record.unit.clone())
        .unwrap_or_else(|| DEFAULT_Y_LABEL.to_string())
}

fn padded(extrema: Option<Extrema>, fraction: f64) -> Range<f64> {
    match extrema {
        None => 0.0..1.0,
        Some(Extrema { min, max }) => {
            let span = max - min;
            let padding = if span.abs() < 1e-9 {
                0.5
            } else {
                span * fraction
            };
            (min - padding)..(max + padding)
        }
    }
}

/// Axis ranges covering every drawable point of every record
///
/// The time axis is tight, the value axis gets 5% headroom. Empty or
/// constant data still yields a non-degenerate range.
pub fn axis_ranges(records: &[&SignalRecord]) -> (Range<f64>, Range<f64>) {
    let mut time: Option<Extrema> = None;
    let mut value: Option<Extrema> = None;
    for (t, v) in records.iter().flat_map(|record| record.points()) {
        let tp = Extrema { min: t, max: t };
        let vp = Extrema { min: v, max: v };
        time = Some(time.map_or(tp, |e| e.merge(tp)));
        value = Some(value.map_or(vp, |e| e.merge(vp)));
    }
    (padded(time, 0.0), padded(value, 0.05))
}

fn render_error<E: Display>(title: &str, e: E) -> VisualizerError {
    VisualizerError::Render {
        title: title.to_string(),
        reason: e.to_string(),
    }
}

/// Render one category into an RGB buffer
pub fn render(result: &CategoryResult, style: &ChartStyle) -> Result<RenderedChart> {
    let records: Vec<&SignalRecord> = result.records().collect();
    let title = chart_title(&result.label);
    if records.is_empty() {
        return Err(render_error(&title, "category has no resolved signals"));
    }

    let y_label = y_axis_label(&records);
    let (x_range, y_range) = axis_ranges(&records);
    let mut pixels = vec![0u8; style.width as usize * style.height as usize * 3];
    let mut series_labels = Vec::with_capacity(records.len());

    {
        let root = BitMapBackend::with_buffer(&mut pixels, (style.width, style.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(|e| render_error(&title, e))?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&title, (FONT, 22))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(70)
            .build_cartesian_2d(x_range, y_range)
            .map_err(|e| render_error(&title, e))?;

        chart
            .configure_mesh()
            .x_desc(X_LABEL)
            .y_desc(y_label.as_str())
            .light_line_style(&GRID_COLOR)
            .bold_line_style(&BOLD_GRID_COLOR)
            .label_style((FONT, 14))
            .x_labels(10)
            .y_labels(8)
            .draw()
            .map_err(|e| render_error(&title, e))?;

        for (index, record) in records.iter().enumerate() {
            let color = SERIES_COLORS[index % SERIES_COLORS.len()];
            chart
                .draw_series(LineSeries::new(record.points(), color.stroke_width(LINE_WIDTH)))
                .map_err(|e| render_error(&title, e))?
                .label(record.identifier.as_str())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + LEGEND_LINE_LENGTH, y)], color.stroke_width(LINE_WIDTH))
                });
            series_labels.push(record.identifier.clone());
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .label_font((FONT, 14))
            .draw()
            .map_err(|e| render_error(&title, e))?;

        root.present().map_err(|e| render_error(&title, e))?;
    }

    log::debug!(
        "Rendered '{}' ({}x{}, {} line(s))",
        title,
        style.width,
        style.height,
        series_labels.len()
    );

    Ok(RenderedChart {
        title,
        width: style.width,
        height: style.height,
        pixels,
        series_labels,
    })
}
