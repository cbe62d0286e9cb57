//! Run configuration
//!
//! Everything the visualizer needs to know is baked in here: where logs are
//! read from, where exports go, and which signals belong to which category.
//! The category table is an ordered list, and its order is the processing
//! order and the page order of the combined document.

use std::path::PathBuf;

/// Directory scanned for log files
pub const DEFAULT_INPUT_DIR: &str = "./mf4_logfiles";
/// Directory receiving images and the combined document
pub const DEFAULT_EXPORT_DIR: &str = "./mf4_exports";
/// File name of the combined multi-page document
pub const COMBINED_DOCUMENT_NAME: &str = "all_plots.pdf";

/// Chart size in pixels (10 x 4 inches at 100 dpi)
pub const DEFAULT_CHART_WIDTH: u32 = 1000;
pub const DEFAULT_CHART_HEIGHT: u32 = 400;
/// Resolution used to size document pages from chart pixels
pub const DEFAULT_DPI: f32 = 100.0;

/// A named group of raw signal identifiers plotted together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub label: String,
    pub identifiers: Vec<String>,
}

impl Category {
    pub fn new<I, S>(label: impl Into<String>, identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            identifiers: identifiers.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered, immutable category table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMap {
    categories: Vec<Category>,
}

impl CategoryMap {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    /// Categories in declaration order
    pub fn iter(&self) -> std::slice::Iter<'_, Category> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// The battery-test signal groups
    pub fn battery_defaults() -> Self {
        Self::new(vec![
            Category::new("cell voltage", ["CellVMax", "CellVMin"]),
            Category::new("cell temperature", ["TempAvg", "TempMax", "TempMin"]),
            Category::new("pack voltage", ["PackVolt"]),
            Category::new("coolant temperature", ["CoolantTemp"]),
            Category::new("pack current", ["PackCurr"]),
            Category::new("charge current limit", ["ChargeCurrLim"]),
            Category::new("soc", ["SOC", "SOCMin", "SOCMax"]),
            Category::new("power limit", ["ChargePowerLim", "DischargePowerLim"]),
            Category::new("fault flags", ["FaultFlag"]),
        ])
    }
}

impl<'a> IntoIterator for &'a CategoryMap {
    type Item = &'a Category;
    type IntoIter = std::slice::Iter<'a, Category>;

    fn into_iter(self) -> Self::IntoIter {
        self.categories.iter()
    }
}

/// Chart rendering parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    pub dpi: f32,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            width: DEFAULT_CHART_WIDTH,
            height: DEFAULT_CHART_HEIGHT,
            dpi: DEFAULT_DPI,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct VisualizerConfig {
    pub input_dir: PathBuf,
    pub export_dir: PathBuf,
    /// Log file extension, matched case-insensitively
    pub extension: String,
    pub document_name: String,
    pub chart: ChartStyle,
    pub categories: CategoryMap,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            extension: mf4_decoder::MF4_EXTENSION.to_string(),
            document_name: COMBINED_DOCUMENT_NAME.to_string(),
            chart: ChartStyle::default(),
            categories: CategoryMap::battery_defaults(),
        }
    }
}

impl VisualizerConfig {
    /// Builder method: read logs from another directory
    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    /// Builder method: export into another directory
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    /// Builder method: replace the category table
    pub fn with_categories(mut self, categories: CategoryMap) -> Self {
        self.categories = categories;
        self
    }

    /// Full path of the combined document
    pub fn document_path(&self) -> PathBuf {
        self.export_dir.join(&self.document_name)
    }
}
