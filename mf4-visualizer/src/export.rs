//! Plot export: standalone PNG images and the combined PDF document
//!
//! Each exported category produces one PNG in the export directory and one
//! page in the combined document. Pages are kept in memory and the document
//! is written once by [`PlotExporter::finish`], so a failure part-way through
//! the export loop leaves no half-written document behind.

use crate::chart::{self, RenderedChart};
use crate::config::ChartStyle;
use crate::error::{Result, VisualizerError};
use crate::resolver::CategoryResult;
use image::{DynamicImage, RgbImage};
use printpdf::{Image, ImageTransform, Mm, PdfDocument, PdfDocumentReference};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const IMAGE_EXTENSION: &str = "png";
const WORD_SEPARATOR: &str = "_";
const LAYER_NAME: &str = "Chart";

/// Image file name for a category label (`"cell voltage"` → `cell_voltage.png`)
pub fn image_file_name(label: &str) -> String {
    format!("{}.{}", label.replace(' ', WORD_SEPARATOR), IMAGE_EXTENSION)
}

fn px_to_mm(px: u32, dpi: f32) -> Mm {
    Mm(px as f32 / dpi * 25.4)
}

/// Multi-page PDF with one full-page chart image per page
pub struct CombinedDocument {
    title: String,
    dpi: f32,
    doc: Option<PdfDocumentReference>,
    pages: usize,
}

impl CombinedDocument {
    pub fn new(title: impl Into<String>, dpi: f32) -> Self {
        Self {
            title: title.into(),
            dpi,
            doc: None,
            pages: 0,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages
    }

    /// Append a page sized to the image at the document resolution
    pub fn add_page(&mut self, image: &RgbImage) {
        let width = px_to_mm(image.width(), self.dpi);
        let height = px_to_mm(image.height(), self.dpi);

        let (doc, layer) = match self.doc.take() {
            None => {
                let (doc, page, layer) = PdfDocument::new(self.title.clone(), width, height, LAYER_NAME);
                let layer = doc.get_page(page).get_layer(layer);
                (doc, layer)
            }
            Some(doc) => {
                let (page, layer) = doc.add_page(width, height, LAYER_NAME);
                let layer = doc.get_page(page).get_layer(layer);
                (doc, layer)
            }
        };

        Image::from_dynamic_image(&DynamicImage::ImageRgb8(image.clone())).add_to_layer(
            layer,
            ImageTransform {
                dpi: Some(self.dpi),
                ..Default::default()
            },
        );
        self.doc = Some(doc);
        self.pages += 1;
    }

    /// Write the document; returns `false` without touching the disk when
    /// no page was added
    pub fn save(self, path: &Path) -> Result<bool> {
        let doc = match self.doc {
            Some(doc) => doc,
            None => return Ok(false),
        };
        let file = File::create(path).map_err(|e| VisualizerError::Document {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        doc.save(&mut BufWriter::new(file))
            .map_err(|e| VisualizerError::Document {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(true)
    }
}

/// One exported category
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedChart {
    pub image_path: PathBuf,
    pub series_labels: Vec<String>,
}

/// Files produced by an export run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportSummary {
    pub charts: Vec<ExportedChart>,
    /// Combined document, `None` when no category was exported
    pub document: Option<PathBuf>,
    /// Pages in the combined document, one per exported chart
    pub pages: usize,
}

/// Renders categories and collects them into images and one document
pub struct PlotExporter {
    export_dir: PathBuf,
    style: ChartStyle,
    document: CombinedDocument,
    charts: Vec<ExportedChart>,
}

impl PlotExporter {
    pub fn new(export_dir: &Path, style: ChartStyle, document_title: impl Into<String>) -> Self {
        Self {
            export_dir: export_dir.to_path_buf(),
            style,
            document: CombinedDocument::new(document_title, style.dpi),
            charts: Vec::new(),
        }
    }

    /// Render a non-empty category, write its PNG and append its page
    pub fn export(&mut self, result: &CategoryResult) -> Result<&ExportedChart> {
        let rendered = chart::render(result, &self.style)?;
        let image_path = self.export_dir.join(image_file_name(&result.label));
        let image = to_image(rendered.clone(), &image_path)?;

        image.save(&image_path).map_err(|e| VisualizerError::Image {
            path: image_path.clone(),
            reason: e.to_string(),
        })?;
        self.document.add_page(&image);

        log::info!(
            "Exported {} ({} signal(s)) to {:?}",
            rendered.title,
            rendered.series_labels.len(),
            image_path
        );

        self.charts.push(ExportedChart {
            image_path,
            series_labels: rendered.series_labels,
        });
        Ok(&self.charts[self.charts.len() - 1])
    }

    /// Write the combined document and return everything produced
    pub fn finish(self, document_path: &Path) -> Result<ExportSummary> {
        let pages = self.document.page_count();
        let document = if self.document.save(document_path)? {
            log::info!("Wrote {} page(s) to {:?}", pages, document_path);
            Some(document_path.to_path_buf())
        } else {
            log::warn!("No category had any signal, combined document not written");
            None
        };

        Ok(ExportSummary {
            charts: self.charts,
            document,
            pages,
        })
    }
}

fn to_image(chart: RenderedChart, path: &Path) -> Result<RgbImage> {
    RgbImage::from_raw(chart.width, chart.height, chart.pixels).ok_or_else(|| VisualizerError::Image {
        path: path.to_path_buf(),
        reason: "pixel buffer does not match chart size".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{Extrema, Resolution, SignalRecord};
    use std::fs;

    fn result(label: &str, identifiers: &[&str]) -> CategoryResult {
        let resolutions = identifiers
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let samples: Vec<f64> = (0..10).map(|t| i as f64 + t as f64 * 0.1).collect();
                Resolution::Resolved(SignalRecord {
                    identifier: id.to_string(),
                    unit: Some("V".to_string()),
                    extrema: Extrema::of(&samples),
                    timestamps: (0..10).map(|t| t as f64).collect(),
                    samples,
                })
            })
            .collect();
        CategoryResult {
            label: label.to_string(),
            resolutions,
        }
    }

    fn style() -> ChartStyle {
        ChartStyle {
            width: 300,
            height: 150,
            dpi: 100.0,
        }
    }

    #[test]
    fn test_image_file_name() {
        assert_eq!(image_file_name("cell voltage"), "cell_voltage.png");
        assert_eq!(image_file_name("soc"), "soc.png");
        assert_eq!(image_file_name("charge current limit"), "charge_current_limit.png");
    }

    #[test]
    fn test_page_size_follows_dpi() {
        let mm = px_to_mm(1000, 100.0);
        assert!((mm.0 - 254.0).abs() < 1e-3);
    }

    #[test]
    fn test_one_page_per_added_image() {
        let dir = tempfile::tempdir().unwrap();
        let mut document = CombinedDocument::new("pages", 100.0);
        document.add_page(&RgbImage::from_pixel(200, 80, image::Rgb([255, 255, 255])));
        document.add_page(&RgbImage::from_pixel(200, 80, image::Rgb([0, 0, 0])));
        assert_eq!(document.page_count(), 2);

        let path = dir.path().join("all_plots.pdf");
        assert!(document.save(&path).unwrap());
        assert!(fs::read(&path).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn test_no_pages_writes_no_document() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = PlotExporter::new(dir.path(), style(), "empty");
        let path = dir.path().join("all_plots.pdf");

        let summary = exporter.finish(&path).unwrap();
        assert_eq!(summary, ExportSummary::default());
        assert!(!path.exists());
    }

    #[test]
    fn test_export_writes_images_and_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = PlotExporter::new(dir.path(), style(), "test");

        let chart = exporter
            .export(&result("cell voltage", &["CellVMax", "CellVMin"]))
            .expect("rendering needs a system sans-serif font");
        assert_eq!(chart.series_labels, vec!["CellVMax", "CellVMin"]);
        exporter.export(&result("pack voltage", &["PackVolt"])).unwrap();

        let pdf = dir.path().join("all_plots.pdf");
        let summary = exporter.finish(&pdf).unwrap();

        let images: Vec<PathBuf> = summary.charts.iter().map(|c| c.image_path.clone()).collect();
        assert_eq!(
            images,
            vec![dir.path().join("cell_voltage.png"), dir.path().join("pack_voltage.png")]
        );
        for image in &images {
            let decoded = image::open(image).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (300, 150));
        }

        assert_eq!(summary.document, Some(pdf.clone()));
        assert_eq!(summary.pages, 2);
        let bytes = fs::read(&pdf).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
