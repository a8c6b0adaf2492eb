pub mod builtin;
pub mod debug;
pub mod font;
mod wrap;

use anyhow::{Context, Result, anyhow};
use image::{Rgb, RgbaImage};
use resvg::render;
use std::path::PathBuf;
use tiny_skia::Pixmap;
use usvg::{Options, Tree};

use crate::geometry::Point;
use crate::replace::group::TextGroup;
use crate::replace::style::StyleProfile;

pub use font::{FontChain, FontChoice, FontSource};
pub(crate) use wrap::wrap_text;

pub const DEFAULT_LINE_SPACING: f32 = 1.2;
pub const DEFAULT_ROTATION_THRESHOLD_DEG: f32 = 0.5;
pub const DEFAULT_BUNDLED_FONT: &str = "fonts/NotoSansCJK-Regular.ttc";

#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub font_paths: Vec<PathBuf>,
    pub font_family: Option<String>,
    pub line_spacing: f32,
    pub rotation_threshold_deg: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_paths: vec![PathBuf::from(DEFAULT_BUNDLED_FONT)],
            font_family: None,
            line_spacing: DEFAULT_LINE_SPACING,
            rotation_threshold_deg: DEFAULT_ROTATION_THRESHOLD_DEG,
        }
    }
}

/// What was drawn for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedText {
    pub lines: Vec<String>,
    pub font_size: f32,
    /// Applied rotation in degrees; zero when the block was drawn upright.
    pub rotation: f32,
    pub font: String,
}

pub(crate) struct PlacedLine {
    pub(crate) text: String,
    pub(crate) x: f32,
    pub(crate) baseline: f32,
}

/// Positioned lines sharing one font, size and colour.
pub(crate) struct TextLayer<'a> {
    pub(crate) lines: Vec<PlacedLine>,
    pub(crate) font: FontChoice<'a>,
    pub(crate) font_size: f32,
    pub(crate) color: Rgb<u8>,
    pub(crate) bold: bool,
    pub(crate) rotation: Option<(f32, Point)>,
}

/// Draws translated text into the regions of erased groups.
pub struct TextRenderer {
    config: RenderConfig,
    fonts: FontChain,
}

impl TextRenderer {
    pub fn new(config: RenderConfig) -> Self {
        let fonts = FontChain::standard(&config.font_paths, config.font_family.as_deref());
        Self { config, fonts }
    }

    pub fn with_fonts(config: RenderConfig, fonts: FontChain) -> Self {
        Self { config, fonts }
    }

    pub fn fonts(&self) -> &FontChain {
        &self.fonts
    }

    /// Wraps `text` to the group width and draws it. Upright groups are
    /// anchored at their top-left corner; rotated groups are centred on the
    /// group centre and turned by the group angle.
    pub fn render(
        &self,
        image: &mut RgbaImage,
        group: &TextGroup,
        style: &StyleProfile,
        text: &str,
    ) -> Result<RenderedText> {
        let font = self.fonts.select(text);
        let font_size = style.font_size as f32;
        let bounds = group.bounds;
        let measure = |value: &str| font.measure(value, font_size);
        let lines = wrap_text(text, bounds.width().max(1) as f32, &measure);

        let upright = style.rotation.abs() <= self.config.rotation_threshold_deg;
        let mut rendered = RenderedText {
            lines: lines.clone(),
            font_size,
            rotation: if upright { 0.0 } else { style.rotation },
            font: font.name().to_string(),
        };
        if lines.is_empty() {
            return Ok(rendered);
        }

        let advance = font_size * self.config.line_spacing;
        let ascent = font.ascent(font_size);
        let widths: Vec<f32> = lines.iter().map(|line| measure(line)).collect();
        let (origin, rotation) = if upright {
            (Point::new(bounds.left as f32, bounds.top as f32), None)
        } else {
            let center = bounds.center();
            let block_width = widths.iter().copied().fold(0.0, f32::max);
            // Cap height of the first line plus one advance per extra line.
            let block_height = ascent + advance * (lines.len() - 1) as f32;
            (
                Point::new(center.x - block_width / 2.0, center.y - block_height / 2.0),
                Some((style.rotation, center)),
            )
        };

        let placed = lines
            .into_iter()
            .enumerate()
            .map(|(idx, text)| PlacedLine {
                text,
                x: origin.x,
                baseline: origin.y + ascent + advance * idx as f32,
            })
            .collect();
        let layer = TextLayer {
            lines: placed,
            font,
            font_size,
            color: style.color,
            bold: style.bold,
            rotation,
        };
        paint_text(image, &layer)?;
        rendered.lines = layer.lines.into_iter().map(|line| line.text).collect();
        Ok(rendered)
    }
}

/// Rasterises the layer on a transparent canvas and composites it over `image`.
pub(crate) fn paint_text(image: &mut RgbaImage, layer: &TextLayer<'_>) -> Result<()> {
    if layer.lines.is_empty() {
        return Ok(());
    }
    let (width, height) = image.dimensions();
    let svg = layer_svg(width, height, layer);
    let options = match layer.font {
        FontChoice::Face(font) => Options {
            fontdb: font.database(),
            ..Options::default()
        },
        FontChoice::Builtin => Options::default(),
    };
    let pixmap = rasterize_svg(&svg, &options)?;
    composite(image, &pixmap);
    Ok(())
}

pub(crate) fn rasterize_svg(svg: &str, options: &Options<'_>) -> Result<Pixmap> {
    let tree = Tree::from_str(svg, options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    Ok(pixmap)
}

fn layer_svg(width: u32, height: u32, layer: &TextLayer<'_>) -> String {
    let color = hex_color(layer.color);
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    match layer.rotation {
        Some((angle, center)) => svg.push_str(&format!(
            r#"<g transform="rotate({:.3} {:.2} {:.2})">"#,
            angle, center.x, center.y
        )),
        None => svg.push_str("<g>"),
    }

    for line in &layer.lines {
        match layer.font {
            FontChoice::Face(font) => {
                let weight = if layer.bold { "bold" } else { "normal" };
                // Faux bold for faces without a bold variant.
                let stroke = if layer.bold {
                    format!(
                        r#" stroke="{}" stroke-width="{:.2}""#,
                        color,
                        (layer.font_size * 0.04).max(0.5)
                    )
                } else {
                    String::new()
                };
                svg.push_str(&format!(
                    r#"<text x="{x:.2}" y="{y:.2}" font-family="{family}" font-size="{size:.2}" font-weight="{weight}" fill="{color}"{stroke} xml:space="preserve">{text}</text>"#,
                    x = line.x,
                    y = line.baseline,
                    family = escape_xml(&font.family),
                    size = layer.font_size,
                    weight = weight,
                    color = color,
                    stroke = stroke,
                    text = escape_xml(&line.text)
                ));
            }
            FontChoice::Builtin => {
                let data = builtin::path_data(&line.text, line.x, line.baseline, layer.font_size);
                if data.is_empty() {
                    continue;
                }
                svg.push_str(&format!(
                    r#"<path d="{d}" fill="none" stroke="{color}" stroke-width="{sw:.2}" stroke-linecap="round" stroke-linejoin="round"/>"#,
                    d = data,
                    color = color,
                    sw = builtin::stroke_width(layer.font_size, layer.bold)
                ));
            }
        }
    }

    svg.push_str("</g></svg>");
    svg
}

/// Source-over blend of a premultiplied pixmap onto a straight-alpha image
/// of the same size.
fn composite(image: &mut RgbaImage, layer: &Pixmap) {
    for (pixel, src) in image.pixels_mut().zip(layer.pixels()) {
        let alpha = src.alpha() as u32;
        if alpha == 0 {
            continue;
        }
        let inverse = 255 - alpha;
        let over = |src: u8, dst: u8| (src as u32 + (dst as u32 * inverse + 127) / 255).min(255) as u8;
        let [r, g, b, a] = pixel.0;
        pixel.0 = [
            over(src.red(), r),
            over(src.green(), g),
            over(src.blue(), b),
            (alpha + (a as u32 * inverse + 127) / 255).min(255) as u8,
        ];
    }
}

pub(crate) fn hex_color(color: Rgb<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

pub(crate) fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Quad;
    use crate::ocr::TextFragment;
    use crate::test_util::canvas_with_blocks;

    fn builtin_renderer() -> TextRenderer {
        TextRenderer::with_fonts(RenderConfig::default(), FontChain::builtin_only())
    }

    fn group_at(left: f32, top: f32, width: f32, height: f32, text: &str) -> TextGroup {
        TextGroup::from_members(vec![TextFragment::new(
            text,
            Quad::from_rect(left, top, width, height),
            95.0,
        )])
        .expect("one member")
    }

    fn dark_pixels(image: &RgbaImage) -> usize {
        image.pixels().filter(|pixel| pixel[0] < 128).count()
    }

    #[test]
    fn short_translation_fits_on_one_upright_line() {
        let mut image = canvas_with_blocks(200, 80, [255, 255, 255], [255, 255, 255], &[]);
        let group = group_at(10.0, 10.0, 100.0, 30.0, "HELLO");
        let style = StyleProfile {
            font_size: 21,
            bold: false,
            rotation: 0.0,
            color: Rgb([0, 0, 0]),
        };
        let rendered = builtin_renderer()
            .render(&mut image, &group, &style, "BONJOUR")
            .expect("render");
        assert_eq!(rendered.lines, vec!["BONJOUR"]);
        assert_eq!(rendered.rotation, 0.0);
        assert_eq!(rendered.font, "builtin");
        assert!(dark_pixels(&image) > 0);
        for (x, y, pixel) in image.enumerate_pixels() {
            if pixel[0] < 128 {
                assert!(x < 120 && y < 45, "ink outside the group at ({x}, {y})");
            }
        }
    }

    #[test]
    fn long_translation_wraps_to_group_width() {
        let mut image = canvas_with_blocks(300, 200, [255, 255, 255], [0, 0, 0], &[]);
        let group = group_at(0.0, 0.0, 80.0, 20.0, "Hi");
        let style = StyleProfile {
            font_size: 12,
            bold: true,
            rotation: 0.0,
            color: Rgb([0, 0, 0]),
        };
        let rendered = builtin_renderer()
            .render(&mut image, &group, &style, "one two three four")
            .expect("render");
        assert!(rendered.lines.len() > 1);
        assert!(rendered.lines.iter().all(|line| !line.starts_with(' ')));
    }

    fn ink_center(image: &RgbaImage) -> Option<(f32, f32)> {
        let dark: Vec<(u32, u32)> = image
            .enumerate_pixels()
            .filter(|(_, _, pixel)| pixel[0] < 128)
            .map(|(x, y, _)| (x, y))
            .collect();
        let left = dark.iter().map(|(x, _)| *x).min()?;
        let right = dark.iter().map(|(x, _)| *x).max()?;
        let top = dark.iter().map(|(_, y)| *y).min()?;
        let bottom = dark.iter().map(|(_, y)| *y).max()?;
        Some(((left + right) as f32 / 2.0, (top + bottom) as f32 / 2.0))
    }

    #[test]
    fn rotated_group_is_centred_on_the_group() {
        let mut image = canvas_with_blocks(200, 200, [255, 255, 255], [0, 0, 0], &[]);
        let group = group_at(40.0, 80.0, 120.0, 30.0, "Tilted");
        let style = StyleProfile {
            font_size: 16,
            bold: false,
            rotation: 12.0,
            color: Rgb([0, 0, 0]),
        };
        let rendered = builtin_renderer()
            .render(&mut image, &group, &style, "PENCHE")
            .expect("render");
        assert_eq!(rendered.rotation, 12.0);
        assert_eq!(rendered.lines, vec!["PENCHE"]);

        let (x, y) = ink_center(&image).expect("ink");
        let center = group.bounds.center();
        assert!((x - center.x).abs() <= 3.0, "ink centre x {x} vs {}", center.x);
        assert!((y - center.y).abs() <= 3.0, "ink centre y {y} vs {}", center.y);

        // The ink box of a 12 degree line is taller than the upright cap height.
        let dark_rows = image
            .rows()
            .filter(|row| row.clone().any(|pixel| pixel[0] < 128))
            .count();
        assert!(dark_rows > 20, "only {dark_rows} rows of ink");
    }

    #[test]
    fn rotated_block_of_lines_is_centred_too() {
        let mut image = canvas_with_blocks(240, 240, [255, 255, 255], [0, 0, 0], &[]);
        let group = group_at(75.0, 90.0, 50.0, 40.0, "Tilted");
        let style = StyleProfile {
            font_size: 14,
            bold: false,
            rotation: -20.0,
            color: Rgb([0, 0, 0]),
        };
        let rendered = builtin_renderer()
            .render(&mut image, &group, &style, "HAUT BASE")
            .expect("render");
        assert_eq!(rendered.lines, vec!["HAUT", "BASE"]);
        let (x, y) = ink_center(&image).expect("ink");
        let center = group.bounds.center();
        assert!((x - center.x).abs() <= 4.0, "ink centre x {x} vs {}", center.x);
        assert!((y - center.y).abs() <= 4.0, "ink centre y {y} vs {}", center.y);
    }

    #[test]
    fn blank_text_draws_nothing() {
        let mut image = canvas_with_blocks(50, 50, [255, 255, 255], [0, 0, 0], &[]);
        let before = image.clone();
        let group = group_at(0.0, 0.0, 40.0, 20.0, "x");
        let style = StyleProfile {
            font_size: 12,
            bold: false,
            rotation: 0.0,
            color: Rgb([0, 0, 0]),
        };
        let rendered = builtin_renderer()
            .render(&mut image, &group, &style, "   ")
            .expect("render");
        assert!(rendered.lines.is_empty());
        assert_eq!(image, before);
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_xml("a<b>&\"'"), "a&lt;b&gt;&amp;&quot;&apos;");
        assert_eq!(hex_color(Rgb([255, 0, 16])), "#ff0010");
    }
}
