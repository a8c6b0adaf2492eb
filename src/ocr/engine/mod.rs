mod parse;
mod preprocess;
mod tesseract;

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use std::time::Duration;

use crate::geometry::{Point, Quad};
use crate::languages::OcrLanguages;
use crate::ocr::{TextDetector, TextFragment};

pub(crate) use tesseract::{list_languages, probe_version};

pub const DEFAULT_TESSERACT_TIMEOUT: Duration = Duration::from_secs(10);
/// Sparse text: slides scatter labels across the canvas.
pub const DEFAULT_PSM: u32 = 11;

#[derive(Debug, Clone, PartialEq)]
pub struct TesseractConfig {
    pub command: String,
    pub timeout: Duration,
    pub psm: u32,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            command: "tesseract".to_string(),
            timeout: DEFAULT_TESSERACT_TIMEOUT,
            psm: DEFAULT_PSM,
        }
    }
}

/// Word-level detector backed by the `tesseract` command-line tool.
#[derive(Debug, Clone, Default)]
pub struct TesseractDetector {
    config: TesseractConfig,
}

impl TesseractDetector {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }
}

impl TextDetector for TesseractDetector {
    fn detect(&self, image: &DynamicImage, languages: &OcrLanguages) -> Result<Vec<TextFragment>> {
        let (width, _) = image.dimensions();
        let scale = preprocess::ocr_scale(width);
        let prepared = preprocess::prepare_for_ocr(image, scale);

        let dir = tempfile::Builder::new()
            .prefix("slide-ocr")
            .tempdir()
            .with_context(|| "failed to create temp dir for OCR")?;
        let input = dir.path().join("input.png");
        prepared
            .save_with_format(&input, image::ImageFormat::Png)
            .with_context(|| "failed to write temp image for OCR")?;

        let tsv = tesseract::run_tsv(&self.config, &input, dir.path(), &languages.joined())?;
        let fragments = parse::parse_tsv_words(&tsv);
        Ok(if scale > 1 {
            scale_fragments(fragments, scale as f32)
        } else {
            fragments
        })
    }
}

fn scale_fragments(fragments: Vec<TextFragment>, scale: f32) -> Vec<TextFragment> {
    fragments
        .into_iter()
        .map(|fragment| {
            let points = fragment
                .quad
                .0
                .map(|point| Point::new(point.x / scale, point.y / scale));
            TextFragment {
                quad: Quad(points),
                ..fragment
            }
        })
        .collect()
}
