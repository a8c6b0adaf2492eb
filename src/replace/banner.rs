use image::{Rgb, RgbaImage};
use tracing::warn;

use crate::error::EngineError;
use crate::render::{PlacedLine, TextLayer, TextRenderer, paint_text, wrap_text};
use crate::replace::erase::border_color;

pub const DEFAULT_BANNER_FONT_SIZE: f32 = 24.0;
pub const DEFAULT_BANNER_LINE_HEIGHT: f32 = 30.0;
pub const DEFAULT_BANNER_PADDING: f32 = 10.0;
pub const DEFAULT_BANNER_ALPHA: u8 = 220;

/// Fill luminance above which the banner text is drawn black.
const DARK_TEXT_LUMINANCE: f32 = 140.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BannerFill {
    /// Dominant colour of the image border.
    Auto,
    Solid(Rgb<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BannerConfig {
    pub font_size: f32,
    pub line_height: f32,
    pub padding: f32,
    pub fill: BannerFill,
    pub fill_alpha: u8,
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_BANNER_FONT_SIZE,
            line_height: DEFAULT_BANNER_LINE_HEIGHT,
            padding: DEFAULT_BANNER_PADDING,
            fill: BannerFill::Auto,
            fill_alpha: DEFAULT_BANNER_ALPHA,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BannerLayout {
    pub lines: Vec<String>,
    pub height: u32,
    pub fill: Rgb<u8>,
    pub text_color: Rgb<u8>,
}

/// Basic tier: a translucent band across the top of the image carrying the
/// whole translation, wrapped to the image width and centred. Output depends
/// only on the inputs.
pub fn render_banner(
    image: &mut RgbaImage,
    translated: &str,
    config: &BannerConfig,
    renderer: &TextRenderer,
) -> BannerLayout {
    let (width, height) = image.dimensions();
    let fill = match config.fill {
        BannerFill::Auto => border_color(image).unwrap_or(Rgb([255, 255, 255])),
        BannerFill::Solid(color) => color,
    };
    let text_color = if luminance(fill) > DARK_TEXT_LUMINANCE {
        Rgb([0, 0, 0])
    } else {
        Rgb([255, 255, 255])
    };

    let font = renderer.fonts().select(translated);
    let measure = |value: &str| font.measure(value, config.font_size);
    let max_width = (width as f32 - 2.0 * config.padding).max(1.0);
    let wrapped = wrap_text(translated, max_width, &measure);
    if wrapped.is_empty() || height == 0 {
        return BannerLayout {
            lines: Vec::new(),
            height: 0,
            fill,
            text_color,
        };
    }

    let wanted = wrapped.len() as f32 * config.line_height + 2.0 * config.padding;
    let banner_height = (wanted.ceil() as u32).min(height);
    blend_band(image, banner_height, fill, config.fill_alpha);

    let ascent = font.ascent(config.font_size);
    let lines: Vec<PlacedLine> = wrapped
        .into_iter()
        .enumerate()
        .map(|(idx, text)| {
            let line_width = measure(&text);
            PlacedLine {
                x: ((width as f32 - line_width) / 2.0).max(0.0),
                baseline: config.padding + ascent + config.line_height * idx as f32,
                text,
            }
        })
        .take_while(|line| line.baseline - ascent < banner_height as f32)
        .collect();

    let layer = TextLayer {
        lines,
        font,
        font_size: config.font_size,
        color: text_color,
        bold: false,
        rotation: None,
    };
    if let Err(err) = paint_text(image, &layer) {
        warn!(
            "{}",
            EngineError::RenderingDegraded(format!("banner text not drawn: {:#}", err))
        );
    }

    BannerLayout {
        lines: layer.lines.into_iter().map(|line| line.text).collect(),
        height: banner_height,
        fill,
        text_color,
    }
}

fn blend_band(image: &mut RgbaImage, band_height: u32, fill: Rgb<u8>, alpha: u8) {
    let alpha = alpha as u32;
    let inverse = 255 - alpha;
    for y in 0..band_height.min(image.height()) {
        for x in 0..image.width() {
            let pixel = image.get_pixel_mut(x, y);
            for channel in 0..3 {
                let blended = (fill[channel] as u32 * alpha + pixel[channel] as u32 * inverse + 127) / 255;
                pixel[channel] = blended as u8;
            }
            pixel[3] = (alpha + pixel[3] as u32 * inverse / 255).min(255) as u8;
        }
    }
}

fn luminance(color: Rgb<u8>) -> f32 {
    0.299 * color[0] as f32 + 0.587 * color[1] as f32 + 0.114 * color[2] as f32
}
