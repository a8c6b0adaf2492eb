pub mod engine;

use anyhow::Result;
use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::geometry::{Bounds, Quad};
use crate::languages::OcrLanguages;

pub use engine::{TesseractConfig, TesseractDetector};

pub const DEFAULT_MIN_CONFIDENCE: f32 = 50.0;
pub const DEFAULT_MIN_CHARS: usize = 2;

/// One OCR hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextFragment {
    pub text: String,
    pub quad: Quad,
    /// 0..=100
    pub confidence: f32,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, quad: Quad, confidence: f32) -> Self {
        Self {
            text: text.into(),
            quad,
            confidence,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.quad.bounds()
    }
}

/// Wraps an OCR capability. Implementations may fail; [`detect`] turns any
/// failure into an empty report.
pub trait TextDetector: Send + Sync {
    fn detect(&self, image: &DynamicImage, languages: &OcrLanguages) -> Result<Vec<TextFragment>>;
}

/// Process-wide facts about the OCR capability, probed once at start-up.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    pub enhanced_detection: bool,
    pub installed_languages: Vec<String>,
}

impl Capabilities {
    pub fn probe(config: &TesseractConfig) -> Self {
        match engine::probe_version(config) {
            Ok(version) => {
                let installed_languages = match engine::list_languages(config) {
                    Ok(list) => list,
                    Err(err) => {
                        warn!("failed to list tesseract languages: {:#}", err);
                        Vec::new()
                    }
                };
                info!(
                    version = %version,
                    languages = %installed_languages.join(","),
                    "tesseract available"
                );
                Self {
                    enhanced_detection: true,
                    installed_languages,
                }
            }
            Err(err) => {
                warn!("{}: {:#}", EngineError::DetectionUnavailable, err);
                Self::basic_only()
            }
        }
    }

    pub fn basic_only() -> Self {
        Self {
            enhanced_detection: false,
            installed_languages: Vec::new(),
        }
    }

    pub fn enhanced() -> Self {
        Self {
            enhanced_detection: true,
            installed_languages: Vec::new(),
        }
    }

    /// Requested languages narrowed to what is installed. An empty installed
    /// list means "unknown" and leaves the request untouched.
    pub fn resolve_languages(&self, requested: &OcrLanguages) -> OcrLanguages {
        if self.installed_languages.is_empty() {
            return requested.clone();
        }
        let (kept, missing) = requested.restrict_to(&self.installed_languages);
        if !missing.is_empty() {
            warn!(
                "ocr language(s) not available: {} (available: {})",
                missing.join(", "),
                self.installed_languages.join(", ")
            );
        }
        kept
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    pub min_confidence: f32,
    pub min_chars: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            min_chars: DEFAULT_MIN_CHARS,
        }
    }
}

/// Result of one soft-failing detection call.
#[derive(Debug, Default)]
pub struct DetectionReport {
    pub fragments: Vec<TextFragment>,
    pub raw_count: usize,
    pub failure: Option<EngineError>,
}

impl DetectionReport {
    pub fn is_usable(&self) -> bool {
        self.failure.is_none() && !self.fragments.is_empty()
    }
}

/// Runs the detector and filters its output. Never fails: detector errors
/// are recorded on the report with an empty fragment list.
pub fn detect(
    detector: &dyn TextDetector,
    image: &DynamicImage,
    languages: &OcrLanguages,
    filter: &FilterConfig,
) -> DetectionReport {
    let raw = match detector.detect(image, languages) {
        Ok(raw) => raw,
        Err(err) => {
            warn!("text detection failed: {:#}", err);
            return DetectionReport {
                fragments: Vec::new(),
                raw_count: 0,
                failure: Some(EngineError::DetectionFailed(format!("{:#}", err))),
            };
        }
    };
    let raw_count = raw.len();
    let fragments = filter_fragments(raw, filter);
    debug!(
        raw = raw_count,
        kept = fragments.len(),
        languages = %languages.joined(),
        "text detection finished"
    );
    DetectionReport {
        fragments,
        raw_count,
        failure: None,
    }
}

pub fn filter_fragments(fragments: Vec<TextFragment>, filter: &FilterConfig) -> Vec<TextFragment> {
    fragments
        .into_iter()
        .filter(|fragment| is_fragment_usable(fragment, filter))
        .map(|mut fragment| {
            fragment.text = fragment.text.trim().to_string();
            fragment
        })
        .collect()
}

fn is_fragment_usable(fragment: &TextFragment, filter: &FilterConfig) -> bool {
    if fragment.confidence < filter.min_confidence {
        return false;
    }
    let text = fragment.text.trim();
    let visible = text.chars().filter(|ch| !ch.is_whitespace()).count();
    if visible < filter.min_chars {
        return false;
    }
    if fragment.bounds().is_empty() {
        return false;
    }
    !is_numeric_text(text)
}

/// Numbers, decimals, percentages and comma-grouped figures: chart labels
/// that are never translated.
pub fn is_numeric_text(text: &str) -> bool {
    let text = text.trim();
    let text = text.strip_suffix('%').map(str::trim_end).unwrap_or(text);
    let text = text
        .strip_prefix(['-', '+'])
        .map(str::trim_start)
        .unwrap_or(text);
    if text.is_empty() {
        return false;
    }
    let mut digits = 0usize;
    for ch in text.chars() {
        if ch.is_numeric() {
            digits += 1;
        } else if ch != ',' && ch != '.' {
            return false;
        }
    }
    digits > 0
}
