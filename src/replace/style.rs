use image::{Rgb, RgbaImage};
use std::cmp::Reverse;
use std::collections::HashMap;

use crate::geometry::{Bounds, edge_angle_degrees};
use crate::replace::group::TextGroup;

pub const DEFAULT_HEIGHT_RATIO: f32 = 0.7;
pub const DEFAULT_MIN_FONT_PX: u32 = 12;
pub const DEFAULT_MAX_FONT_PX: u32 = 72;
pub const DEFAULT_TALL_IMAGE_PX: u32 = 1000;
pub const DEFAULT_TALL_IMAGE_SCALE: f32 = 1.2;
/// Average glyph cell width over height above which text reads as bold.
pub const DEFAULT_BOLD_RATIO: f32 = 0.5;
pub const DEFAULT_DARK_CHANNEL_MAX: u8 = 50;
pub const DEFAULT_LIGHT_CHANNEL_MIN: u8 = 200;
pub const DEFAULT_SAMPLE_BORDER_PX: u32 = 2;
pub const DEFAULT_HEADING_KEYWORDS: &[&str] = &[
    "title",
    "heading",
    "agenda",
    "overview",
    "summary",
    "chapter",
    "제목",
    "개요",
    "目次",
    "概要",
    "タイトル",
];

/// Sum of per-channel differences under which a pixel counts as background.
const BACKGROUND_TOLERANCE: u32 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfig {
    pub height_ratio: f32,
    pub min_font_px: u32,
    pub max_font_px: u32,
    pub tall_image_px: u32,
    pub tall_image_scale: f32,
    pub bold_ratio: f32,
    pub dark_channel_max: u8,
    pub light_channel_min: u8,
    pub sample_border_px: u32,
    /// Lowercase substrings that mark a heading.
    pub heading_keywords: Vec<String>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            height_ratio: DEFAULT_HEIGHT_RATIO,
            min_font_px: DEFAULT_MIN_FONT_PX,
            max_font_px: DEFAULT_MAX_FONT_PX,
            tall_image_px: DEFAULT_TALL_IMAGE_PX,
            tall_image_scale: DEFAULT_TALL_IMAGE_SCALE,
            bold_ratio: DEFAULT_BOLD_RATIO,
            dark_channel_max: DEFAULT_DARK_CHANNEL_MAX,
            light_channel_min: DEFAULT_LIGHT_CHANNEL_MIN,
            sample_border_px: DEFAULT_SAMPLE_BORDER_PX,
            heading_keywords: DEFAULT_HEADING_KEYWORDS
                .iter()
                .map(|keyword| keyword.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleProfile {
    pub font_size: u32,
    pub bold: bool,
    /// Degrees, clockwise positive in image coordinates.
    pub rotation: f32,
    pub color: Rgb<u8>,
}

/// Infers rendering attributes for `group` from its geometry and from the
/// pixels of the untouched source image.
pub fn estimate(group: &TextGroup, image: &RgbaImage, config: &StyleConfig) -> StyleProfile {
    StyleProfile {
        font_size: font_size(group.bounds.height(), image.height(), config),
        bold: is_bold(group, config),
        rotation: rotation(group),
        color: ink_color(image, group.bounds, config),
    }
}

/// The tall-image scale is applied before clamping, so the result always
/// lies in `[min_font_px, max_font_px]`.
pub fn font_size(text_height: u32, image_height: u32, config: &StyleConfig) -> u32 {
    let mut size = text_height as f32 * config.height_ratio;
    if image_height > config.tall_image_px {
        size *= config.tall_image_scale;
    }
    (size.round().max(0.0) as u32).clamp(config.min_font_px, config.max_font_px)
}

fn is_bold(group: &TextGroup, config: &StyleConfig) -> bool {
    let text = group.original_text.as_str();
    let glyphs = text.chars().filter(|ch| !ch.is_whitespace()).count();
    let height = group.bounds.height();
    if glyphs > 0 && height > 0 {
        let cell = group.bounds.width() as f32 / glyphs as f32;
        if cell / height as f32 > config.bold_ratio {
            return true;
        }
    }
    if is_all_uppercase(text) {
        return true;
    }
    let lowered = text.to_lowercase();
    config
        .heading_keywords
        .iter()
        .any(|keyword| !keyword.is_empty() && lowered.contains(keyword.as_str()))
}

/// At least one cased letter and no lowercase ones.
fn is_all_uppercase(text: &str) -> bool {
    let mut cased = 0;
    for ch in text.chars() {
        if ch.is_lowercase() {
            return false;
        }
        if ch.is_uppercase() {
            cased += 1;
        }
    }
    cased > 0
}

/// Median angle of the members' own top edges. Words on one line have
/// different tops (ascenders, x-height), so the offsets between members say
/// nothing about rotation.
fn rotation(group: &TextGroup) -> f32 {
    let mut angles: Vec<f32> = group
        .members
        .iter()
        .map(|member| edge_angle_degrees(member.quad.top_left(), member.quad.top_right()))
        .collect();
    if angles.is_empty() {
        return 0.0;
    }
    angles.sort_by(f32::total_cmp);
    let mid = angles.len() / 2;
    if angles.len() % 2 == 0 {
        (angles[mid - 1] + angles[mid]) / 2.0
    } else {
        angles[mid]
    }
}

fn ink_color(image: &RgbaImage, bounds: Bounds, config: &StyleConfig) -> Rgb<u8> {
    let clamped = bounds.clamp_to(image.width(), image.height());
    if clamped.is_empty() {
        return Rgb([0, 0, 0]);
    }
    let interior = clamped.inset(config.sample_border_px).unwrap_or(clamped);
    let background = dominant_color(ring_pixels(image, clamped, config.sample_border_px.max(1)));

    let sampled = background
        .and_then(|background| {
            dominant_color(
                region_pixels(image, interior)
                    .filter(|pixel| color_distance(*pixel, background) > BACKGROUND_TOLERANCE),
            )
        })
        .or_else(|| dominant_color(region_pixels(image, interior)))
        .unwrap_or(Rgb([0, 0, 0]));
    snap_color(sampled, config)
}

/// Pure black or white when two channels agree strongly; otherwise unchanged.
pub fn snap_color(color: Rgb<u8>, config: &StyleConfig) -> Rgb<u8> {
    let dark = color.0.iter().filter(|c| **c < config.dark_channel_max).count();
    if dark >= 2 {
        return Rgb([0, 0, 0]);
    }
    let light = color.0.iter().filter(|c| **c > config.light_channel_min).count();
    if light >= 2 {
        return Rgb([255, 255, 255]);
    }
    color
}

/// Most frequent colour; ties go to the smallest RGB value.
pub(crate) fn dominant_color(pixels: impl Iterator<Item = Rgb<u8>>) -> Option<Rgb<u8>> {
    let mut counts: HashMap<[u8; 3], u32> = HashMap::new();
    for pixel in pixels {
        *counts.entry(pixel.0).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(rgb, count)| (*count, Reverse(*rgb)))
        .map(|(rgb, _)| Rgb(rgb))
}

pub(crate) fn region_pixels(image: &RgbaImage, bounds: Bounds) -> impl Iterator<Item = Rgb<u8>> + '_ {
    let bounds = bounds.clamp_to(image.width(), image.height());
    (bounds.top..bounds.bottom).flat_map(move |y| {
        (bounds.left..bounds.right).map(move |x| {
            let [r, g, b, _] = image.get_pixel(x, y).0;
            Rgb([r, g, b])
        })
    })
}

/// Pixels in a band of `width` just outside `bounds`, clipped to the image.
fn ring_pixels(image: &RgbaImage, bounds: Bounds, width: u32) -> impl Iterator<Item = Rgb<u8>> + '_ {
    let outer = Bounds {
        left: bounds.left.saturating_sub(width),
        top: bounds.top.saturating_sub(width),
        right: bounds.right.saturating_add(width),
        bottom: bounds.bottom.saturating_add(width),
    }
    .clamp_to(image.width(), image.height());
    (outer.top..outer.bottom).flat_map(move |y| {
        (outer.left..outer.right).filter_map(move |x| {
            let inside = x >= bounds.left && x < bounds.right && y >= bounds.top && y < bounds.bottom;
            if inside {
                return None;
            }
            let [r, g, b, _] = image.get_pixel(x, y).0;
            Some(Rgb([r, g, b]))
        })
    })
}

fn color_distance(a: Rgb<u8>, b: Rgb<u8>) -> u32 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(x, y)| (*x as i32 - *y as i32).unsigned_abs())
        .sum()
}
