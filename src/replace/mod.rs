pub mod banner;
pub mod erase;
pub mod group;
pub mod matcher;
pub mod style;

use image::{DynamicImage, ImageFormat, RgbaImage};
use std::any::Any;
use std::fs;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::EngineError;
use crate::languages::{OcrLanguages, ocr_languages_for};
use crate::ocr::{self, Capabilities, TesseractDetector, TextDetector};
use crate::render::{RenderedText, TextRenderer, debug::render_group_boxes};
use crate::settings::Settings;

use self::group::TextGroup;
use self::matcher::UnmatchedPolicy;
use self::style::StyleProfile;

/// Which path produced the output bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Enhanced,
    Basic,
    /// The input bytes were returned unchanged.
    Passthrough,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Enhanced => "enhanced",
            Tier::Basic => "basic",
            Tier::Passthrough => "passthrough",
        }
    }
}

/// Why the enhanced attempt was abandoned for one image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackReason {
    #[error("text detection is not available")]
    DetectionUnavailable,
    #[error("{0}")]
    DetectionFailed(String),
    #[error("detector found no text")]
    NoFragments,
    #[error("all {raw} detected fragment(s) were filtered out")]
    AllFiltered { raw: usize },
    #[error("replacement stage failed: {0}")]
    StageFailed(String),
    #[error("replacement stage panicked: {0}")]
    Panicked(String),
}

/// Per-group record of what the enhanced path did.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupReport {
    pub original_text: String,
    pub segment: String,
    pub style: StyleProfile,
    pub erased: bool,
    /// `None` when the group was left untouched or only erased.
    pub rendered: Option<RenderedText>,
}

#[derive(Debug, Clone)]
pub struct ReplaceOutcome {
    pub bytes: Vec<u8>,
    /// Encoding of `bytes`; `None` when the input came back unchanged.
    pub format: Option<ImageFormat>,
    pub tier: Tier,
    pub fallback: Option<FallbackReason>,
    pub groups: Vec<GroupReport>,
}

/// Successful enhanced pass over one decoded image.
#[derive(Debug, Clone)]
pub struct EnhancedResult {
    pub image: RgbaImage,
    pub groups: Vec<GroupReport>,
}

enum DispatchState {
    AttemptEnhanced,
    FallToBasic(FallbackReason),
    AttemptBasic,
    Success(Tier, RgbaImage, Vec<GroupReport>),
    Unrecoverable(EngineError),
}

/// Image text-replacement engine. Holds no per-image state, so one engine can
/// serve many images concurrently.
pub struct Engine {
    detector: Arc<dyn TextDetector>,
    capabilities: Capabilities,
    settings: Settings,
    renderer: TextRenderer,
    debug_dir: Option<PathBuf>,
    debug_counter: AtomicUsize,
}

impl Engine {
    pub fn new(detector: Arc<dyn TextDetector>, capabilities: Capabilities, settings: Settings) -> Self {
        let renderer = TextRenderer::new(settings.render.clone());
        Self {
            detector,
            capabilities,
            settings,
            renderer,
            debug_dir: None,
            debug_counter: AtomicUsize::new(0),
        }
    }

    /// Tesseract-backed engine; the capability probe runs once here.
    pub fn with_tesseract(settings: Settings) -> Self {
        let capabilities = Capabilities::probe(&settings.tesseract);
        let detector = Arc::new(TesseractDetector::new(settings.tesseract.clone()));
        Self::new(detector, capabilities, settings)
    }

    pub fn with_renderer(mut self, renderer: TextRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Writes a group-box overlay for every enhanced attempt into `dir`.
    pub fn with_debug_dir(mut self, dir: PathBuf) -> Self {
        self.debug_dir = Some(dir);
        self
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replaces the text in an encoded image. Never fails: the worst case is
    /// the original bytes returned unchanged.
    pub fn replace_text(&self, bytes: &[u8], translated: &str, source_lang: &str) -> ReplaceOutcome {
        if !self.settings.image.accepts(bytes.len()) {
            info!(
                size = bytes.len(),
                limit = self.settings.image.max_bytes,
                "image exceeds size limit, leaving it untouched"
            );
            return passthrough(bytes, None);
        }
        let decoded = match codec::decode(bytes) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("{}; returning original bytes", err);
                return passthrough(bytes, None);
            }
        };
        let format = decoded.format;
        let image = codec::downscale_if_needed(decoded.image, self.settings.image.max_dimension);
        let source = image.to_rgba8();

        let mut fallback = None;
        let mut state = if self.capabilities.enhanced_detection {
            DispatchState::AttemptEnhanced
        } else {
            DispatchState::FallToBasic(FallbackReason::DetectionUnavailable)
        };
        loop {
            state = match state {
                DispatchState::AttemptEnhanced => {
                    match self.attempt_enhanced(&image, &source, translated, source_lang) {
                        Ok(result) => DispatchState::Success(Tier::Enhanced, result.image, result.groups),
                        Err(reason) => DispatchState::FallToBasic(reason),
                    }
                }
                DispatchState::FallToBasic(reason) => {
                    info!(reason = %reason, "using basic banner overlay");
                    fallback = Some(reason);
                    DispatchState::AttemptBasic
                }
                DispatchState::AttemptBasic => {
                    DispatchState::Success(Tier::Basic, self.render_basic(&source, translated), Vec::new())
                }
                DispatchState::Success(tier, output, groups) => match codec::encode(&output, format) {
                    Ok(encoded) => {
                        debug!(tier = tier.as_str(), bytes = encoded.len(), "image replaced");
                        return ReplaceOutcome {
                            bytes: encoded,
                            format: Some(format),
                            tier,
                            fallback,
                            groups,
                        };
                    }
                    Err(err) => DispatchState::Unrecoverable(err),
                },
                DispatchState::Unrecoverable(err) => {
                    warn!("{}; returning original bytes", err);
                    return passthrough(bytes, fallback);
                }
            };
        }
    }

    /// Enhanced pipeline on an already decoded image. Panics inside the
    /// pipeline are reported as a fallback reason.
    pub fn replace_enhanced(
        &self,
        image: &DynamicImage,
        translated: &str,
        source_lang: &str,
    ) -> Result<EnhancedResult, FallbackReason> {
        if !self.capabilities.enhanced_detection {
            return Err(FallbackReason::DetectionUnavailable);
        }
        self.attempt_enhanced(image, &image.to_rgba8(), translated, source_lang)
    }

    /// Detected and grouped text, without touching the image. `None` when
    /// the enhanced detector is unavailable or finds nothing usable.
    pub fn detect_text_groups(&self, bytes: &[u8], source_lang: &str) -> Option<Vec<TextGroup>> {
        if !self.capabilities.enhanced_detection || !self.settings.image.accepts(bytes.len()) {
            return None;
        }
        let decoded = match codec::decode(bytes) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("{}", err);
                return None;
            }
        };
        let image = codec::downscale_if_needed(decoded.image, self.settings.image.max_dimension);
        match self.detect_groups(&image, source_lang) {
            Ok(groups) => Some(groups),
            Err(reason) => {
                debug!(reason = %reason, "no text groups");
                None
            }
        }
    }

    /// Detected source text, one group per line, for the translation step.
    pub fn extract_source_text(&self, bytes: &[u8], source_lang: &str) -> Option<String> {
        let groups = self.detect_text_groups(bytes, source_lang)?;
        let text = groups
            .iter()
            .map(|group| group.original_text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() { None } else { Some(text) }
    }

    fn attempt_enhanced(
        &self,
        image: &DynamicImage,
        source: &RgbaImage,
        translated: &str,
        source_lang: &str,
    ) -> Result<EnhancedResult, FallbackReason> {
        catch_unwind(AssertUnwindSafe(|| {
            self.run_enhanced(image, source, translated, source_lang)
        }))
        .unwrap_or_else(|payload| Err(FallbackReason::Panicked(panic_message(payload.as_ref()))))
    }

    fn run_enhanced(
        &self,
        image: &DynamicImage,
        source: &RgbaImage,
        translated: &str,
        source_lang: &str,
    ) -> Result<EnhancedResult, FallbackReason> {
        let groups = self.detect_groups(image, source_lang)?;
        self.write_debug_overlay(source, &groups);

        // Styles come from the pristine pixels, before anything is erased.
        let styles: Vec<StyleProfile> = groups
            .iter()
            .map(|group| style::estimate(group, source, &self.settings.style))
            .collect();
        let plans = matcher::match_segments(&groups, translated);

        let mut working = source.clone();
        let mut reports: Vec<GroupReport> = plans
            .iter()
            .zip(styles)
            .map(|(plan, style)| GroupReport {
                original_text: plan.group.original_text.clone(),
                segment: plan.segment.clone(),
                style,
                erased: false,
                rendered: None,
            })
            .collect();

        // Every group is erased before anything is drawn, so a wrapped
        // segment that runs into the next group is never inpainted away.
        for (plan, report) in plans.iter().zip(reports.iter_mut()) {
            if plan.is_unmatched() {
                debug!(text = %plan.group.original_text, "no translated segment for group");
                if self.settings.unmatched != UnmatchedPolicy::EraseOnly {
                    continue;
                }
            }
            erase::erase(&mut working, plan.group, &self.settings.erase);
            report.erased = true;
        }

        for (plan, report) in plans.iter().zip(reports.iter_mut()) {
            if plan.is_unmatched() {
                continue;
            }
            let rendered = self
                .renderer
                .render(&mut working, plan.group, &report.style, &plan.segment)
                .map_err(|err| FallbackReason::StageFailed(format!("{:#}", err)))?;
            debug!(
                text = %plan.group.original_text,
                lines = rendered.lines.len(),
                font = %rendered.font,
                size = rendered.font_size,
                "group replaced"
            );
            report.rendered = Some(rendered);
        }

        Ok(EnhancedResult {
            image: working,
            groups: reports,
        })
    }

    fn detect_groups(&self, image: &DynamicImage, source_lang: &str) -> Result<Vec<TextGroup>, FallbackReason> {
        let languages = self.languages_for(source_lang);
        let report = ocr::detect(self.detector.as_ref(), image, &languages, &self.settings.filter);
        if let Some(failure) = report.failure {
            return Err(FallbackReason::DetectionFailed(failure.to_string()));
        }
        if report.fragments.is_empty() {
            return Err(if report.raw_count == 0 {
                FallbackReason::NoFragments
            } else {
                FallbackReason::AllFiltered {
                    raw: report.raw_count,
                }
            });
        }
        let groups = group::group(report.fragments, &self.settings.grouping);
        debug!(groups = groups.len(), "grouped fragments");
        Ok(groups)
    }

    fn languages_for(&self, source_lang: &str) -> OcrLanguages {
        let requested = match self.settings.ocr_languages.as_deref() {
            Some(languages) => OcrLanguages::parse(languages),
            None => ocr_languages_for(source_lang),
        };
        self.capabilities.resolve_languages(&requested)
    }

    fn render_basic(&self, source: &RgbaImage, translated: &str) -> RgbaImage {
        let mut working = source.clone();
        let layout = banner::render_banner(&mut working, translated, &self.settings.banner, &self.renderer);
        debug!(lines = layout.lines.len(), height = layout.height, "banner drawn");
        working
    }

    fn write_debug_overlay(&self, source: &RgbaImage, groups: &[TextGroup]) {
        let Some(dir) = &self.debug_dir else {
            return;
        };
        let index = self.debug_counter.fetch_add(1, Ordering::Relaxed);
        let path = dir.join(format!("groups-{:03}.png", index));
        let written = render_group_boxes(source, groups).and_then(|png| {
            fs::create_dir_all(dir)?;
            fs::write(&path, png)?;
            Ok(())
        });
        match written {
            Ok(()) => debug!(path = %path.display(), "wrote group overlay"),
            Err(err) => warn!("failed to write group overlay {}: {:#}", path.display(), err),
        }
    }
}

fn passthrough(bytes: &[u8], fallback: Option<FallbackReason>) -> ReplaceOutcome {
    ReplaceOutcome {
        bytes: bytes.to_vec(),
        format: None,
        tier: Tier::Passthrough,
        fallback,
        groups: Vec::new(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
