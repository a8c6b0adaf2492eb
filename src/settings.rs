use anyhow::{Context, Result, anyhow};
use image::Rgb;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::ImageLimits;
use crate::ocr::FilterConfig;
use crate::ocr::engine::TesseractConfig;
use crate::render::RenderConfig;
use crate::replace::banner::{BannerConfig, BannerFill};
use crate::replace::erase::{EraseConfig, EraseStrategy};
use crate::replace::group::GroupingConfig;
use crate::replace::matcher::UnmatchedPolicy;
use crate::replace::style::StyleConfig;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
const SETTINGS_DIR_NAME: &str = ".slide-image-translator";

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub tesseract: TesseractConfig,
    pub ocr_languages: Option<String>,
    pub filter: FilterConfig,
    pub grouping: GroupingConfig,
    pub style: StyleConfig,
    pub erase: EraseConfig,
    pub render: RenderConfig,
    pub banner: BannerConfig,
    pub unmatched: UnmatchedPolicy,
    pub image: ImageLimits,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    ocr: Option<OcrSection>,
    grouping: Option<GroupingSection>,
    style: Option<StyleSection>,
    erase: Option<EraseSection>,
    render: Option<RenderSection>,
    banner: Option<BannerSection>,
    matching: Option<MatchingSection>,
    image: Option<ImageSection>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSection {
    command: Option<String>,
    timeout_secs: Option<u64>,
    psm: Option<u32>,
    min_confidence: Option<f32>,
    min_chars: Option<usize>,
    languages: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GroupingSection {
    line_gap_px: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct StyleSection {
    height_ratio: Option<f32>,
    min_font_px: Option<u32>,
    max_font_px: Option<u32>,
    tall_image_px: Option<u32>,
    tall_image_scale: Option<f32>,
    bold_ratio: Option<f32>,
    dark_channel_max: Option<u8>,
    light_channel_min: Option<u8>,
    sample_border_px: Option<u32>,
    heading_keywords: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct EraseSection {
    strategy: Option<EraseStrategy>,
    dilation_px: Option<u8>,
    fill_color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSection {
    font_paths: Option<Vec<String>>,
    font_family: Option<String>,
    line_spacing: Option<f32>,
    rotation_threshold_deg: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
struct BannerSection {
    font_size: Option<f32>,
    line_height: Option<f32>,
    padding: Option<f32>,
    fill_color: Option<String>,
    fill_alpha: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchingSection {
    unmatched_groups: Option<UnmatchedPolicy>,
}

#[derive(Debug, Default, Deserialize)]
struct ImageSection {
    max_bytes: Option<usize>,
    max_dimension: Option<u32>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_toml(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    /// Applies one TOML document on top of the current values.
    pub fn merge_toml(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed)
    }

    fn merge(&mut self, incoming: SettingsFile) -> Result<()> {
        if let Some(ocr) = incoming.ocr {
            if let Some(command) = ocr.command {
                if !command.trim().is_empty() {
                    self.tesseract.command = command;
                }
            }
            if let Some(secs) = ocr.timeout_secs {
                if secs > 0 {
                    self.tesseract.timeout = Duration::from_secs(secs);
                }
            }
            if let Some(psm) = ocr.psm {
                self.tesseract.psm = psm;
            }
            if let Some(conf) = ocr.min_confidence {
                self.filter.min_confidence = conf.clamp(0.0, 100.0);
            }
            if let Some(chars) = ocr.min_chars {
                self.filter.min_chars = chars;
            }
            if let Some(languages) = ocr.languages {
                if !languages.trim().is_empty() {
                    self.ocr_languages = Some(languages);
                }
            }
        }
        if let Some(grouping) = incoming.grouping {
            if let Some(gap) = grouping.line_gap_px {
                self.grouping.line_gap_px = gap;
            }
        }
        if let Some(style) = incoming.style {
            if let Some(ratio) = style.height_ratio {
                if ratio > 0.0 {
                    self.style.height_ratio = ratio;
                }
            }
            if let Some(min) = style.min_font_px {
                self.style.min_font_px = min.max(1);
            }
            if let Some(max) = style.max_font_px {
                self.style.max_font_px = max;
            }
            if self.style.max_font_px < self.style.min_font_px {
                return Err(anyhow!(
                    "style.max_font_px ({}) is smaller than style.min_font_px ({})",
                    self.style.max_font_px,
                    self.style.min_font_px
                ));
            }
            if let Some(px) = style.tall_image_px {
                self.style.tall_image_px = px;
            }
            if let Some(scale) = style.tall_image_scale {
                if scale > 0.0 {
                    self.style.tall_image_scale = scale;
                }
            }
            if let Some(ratio) = style.bold_ratio {
                self.style.bold_ratio = ratio;
            }
            if let Some(value) = style.dark_channel_max {
                self.style.dark_channel_max = value;
            }
            if let Some(value) = style.light_channel_min {
                self.style.light_channel_min = value;
            }
            if let Some(border) = style.sample_border_px {
                self.style.sample_border_px = border;
            }
            if let Some(keywords) = style.heading_keywords {
                self.style.heading_keywords = keywords
                    .into_iter()
                    .map(|keyword| keyword.trim().to_lowercase())
                    .filter(|keyword| !keyword.is_empty())
                    .collect();
            }
        }
        if let Some(erase) = incoming.erase {
            if let Some(strategy) = erase.strategy {
                self.erase.strategy = strategy;
            }
            if let Some(radius) = erase.dilation_px {
                self.erase.dilation_px = radius;
            }
            if let Some(color) = erase.fill_color {
                self.erase.fill_color = parse_hex_color(&color)?;
            }
        }
        if let Some(render) = incoming.render {
            if let Some(paths) = render.font_paths {
                self.render.font_paths = paths
                    .into_iter()
                    .filter(|path| !path.trim().is_empty())
                    .map(PathBuf::from)
                    .collect();
            }
            if let Some(family) = render.font_family {
                if !family.trim().is_empty() {
                    self.render.font_family = Some(family);
                }
            }
            if let Some(spacing) = render.line_spacing {
                if spacing > 0.0 {
                    self.render.line_spacing = spacing;
                }
            }
            if let Some(threshold) = render.rotation_threshold_deg {
                self.render.rotation_threshold_deg = threshold.abs();
            }
        }
        if let Some(banner) = incoming.banner {
            if let Some(size) = banner.font_size {
                if size > 0.0 {
                    self.banner.font_size = size;
                }
            }
            if let Some(height) = banner.line_height {
                if height > 0.0 {
                    self.banner.line_height = height;
                }
            }
            if let Some(padding) = banner.padding {
                self.banner.padding = padding.max(0.0);
            }
            if let Some(color) = banner.fill_color {
                self.banner.fill = if color.trim().eq_ignore_ascii_case("auto") {
                    BannerFill::Auto
                } else {
                    BannerFill::Solid(parse_hex_color(&color)?)
                };
            }
            if let Some(alpha) = banner.fill_alpha {
                self.banner.fill_alpha = alpha;
            }
        }
        if let Some(matching) = incoming.matching {
            if let Some(policy) = matching.unmatched_groups {
                self.unmatched = policy;
            }
        }
        if let Some(image) = incoming.image {
            if let Some(max) = image.max_bytes {
                self.image.max_bytes = max;
            }
            if let Some(max) = image.max_dimension {
                self.image.max_dimension = max;
            }
        }
        Ok(())
    }
}

pub(crate) fn parse_hex_color(value: &str) -> Result<Rgb<u8>> {
    let hex = value.trim().trim_start_matches('#');
    let expanded = match hex.len() {
        3 => hex.chars().flat_map(|ch| [ch, ch]).collect::<String>(),
        6 => hex.to_string(),
        _ => return Err(anyhow!("invalid color '{}' (expected #rrggbb)", value)),
    };
    let channel = |idx: usize| {
        u8::from_str_radix(&expanded[idx..idx + 2], 16)
            .map_err(|_| anyhow!("invalid color '{}' (expected #rrggbb)", value))
    };
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(SETTINGS_DIR_NAME))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;

    #[test]
    fn embedded_defaults_match_builtin_defaults() {
        let mut settings = Settings::default();
        settings.merge_toml(DEFAULT_SETTINGS_TOML).expect("defaults parse");
        let builtin = Settings::default();
        assert_eq!(settings.grouping.line_gap_px, builtin.grouping.line_gap_px);
        assert_eq!(settings.style.min_font_px, builtin.style.min_font_px);
        assert_eq!(settings.style.max_font_px, builtin.style.max_font_px);
        assert_eq!(settings.filter.min_confidence, builtin.filter.min_confidence);
        assert_eq!(settings.erase.strategy, builtin.erase.strategy);
        assert_eq!(settings.unmatched, builtin.unmatched);
        assert_eq!(settings.tesseract.timeout, builtin.tesseract.timeout);
    }

    #[test]
    fn merge_overrides_selected_fields() {
        let mut settings = Settings::default();
        settings
            .merge_toml(
                r##"
[grouping]
line_gap_px = 14

[erase]
strategy = "flat"
fill_color = "#eee"

[banner]
fill_color = "#102030"

[matching]
unmatched_groups = "erase"
"##,
            )
            .expect("merge");
        assert_eq!(settings.grouping.line_gap_px, 14);
        assert_eq!(settings.erase.strategy, EraseStrategy::Flat);
        assert_eq!(settings.erase.fill_color, Rgb([0xee, 0xee, 0xee]));
        assert_eq!(settings.banner.fill, BannerFill::Solid(Rgb([0x10, 0x20, 0x30])));
        assert_eq!(settings.unmatched, UnmatchedPolicy::EraseOnly);
        assert_eq!(settings.style.max_font_px, 72);
    }

    #[test]
    fn rejects_inverted_font_range() {
        let mut settings = Settings::default();
        let err = settings
            .merge_toml("[style]\nmin_font_px = 40\nmax_font_px = 20\n")
            .expect_err("inverted range");
        assert!(err.to_string().contains("max_font_px"));
    }

    #[test]
    fn rejects_bad_colors() {
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("zzzzzz").is_err());
        assert_eq!(parse_hex_color("#FFFFFF").expect("white"), Rgb([255, 255, 255]));
    }

    #[test]
    fn load_writes_home_defaults_and_reads_extra_file() {
        with_temp_home(|home| {
            let extra = home.join("extra.toml");
            fs::write(&extra, "[ocr]\ntimeout_secs = 3\nlanguages = \"kor+eng\"\n")
                .expect("write extra");
            let settings = load_settings(Some(&extra)).expect("load");
            assert!(home.join(SETTINGS_DIR_NAME).join("settings.toml").exists());
            assert_eq!(settings.tesseract.timeout, Duration::from_secs(3));
            assert_eq!(settings.ocr_languages.as_deref(), Some("kor+eng"));
        });
    }

    #[test]
    fn missing_extra_file_is_an_error() {
        with_temp_home(|home| {
            let missing = home.join("missing.toml");
            assert!(load_settings(Some(&missing)).is_err());
        });
    }
}
