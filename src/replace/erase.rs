use image::{GrayImage, Luma, Rgb, Rgba, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
use imageproc::morphology::dilate;
use imageproc::point::Point as PixelPoint;
use imageproc::rect::Rect;
use serde::Deserialize;

use crate::geometry::Bounds;
use crate::replace::group::TextGroup;
use crate::replace::style::dominant_color;

pub const DEFAULT_DILATION_PX: u8 = 3;
pub const DEFAULT_FILL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

const MASK_ON: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EraseStrategy {
    /// Fill the dilated glyph mask from the surrounding pixels.
    #[default]
    Inpaint,
    /// Paint the group rectangle with `fill_color`.
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EraseConfig {
    pub strategy: EraseStrategy,
    pub dilation_px: u8,
    pub fill_color: Rgb<u8>,
}

impl Default for EraseConfig {
    fn default() -> Self {
        Self {
            strategy: EraseStrategy::default(),
            dilation_px: DEFAULT_DILATION_PX,
            fill_color: DEFAULT_FILL_COLOR,
        }
    }
}

/// Removes the group's original glyphs from `image`. The caller owns a
/// pristine copy if it needs one.
pub fn erase(image: &mut RgbaImage, group: &TextGroup, config: &EraseConfig) {
    match config.strategy {
        EraseStrategy::Inpaint => inpaint_group(image, group, config),
        EraseStrategy::Flat => fill_bounds(image, group.bounds, config.fill_color),
    }
}

pub fn fill_bounds(image: &mut RgbaImage, bounds: Bounds, color: Rgb<u8>) {
    let bounds = bounds.clamp_to(image.width(), image.height());
    if bounds.is_empty() {
        return;
    }
    let rect = Rect::at(bounds.left as i32, bounds.top as i32).of_size(bounds.width(), bounds.height());
    draw_filled_rect_mut(image, rect, Rgba([color[0], color[1], color[2], 255]));
}

/// Dominant colour of the outermost pixel frame of the image.
pub fn border_color(image: &RgbaImage) -> Option<Rgb<u8>> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return None;
    }
    let frame = (0..height).flat_map(move |y| {
        let xs: Box<dyn Iterator<Item = u32>> = if y == 0 || y + 1 == height {
            Box::new(0..width)
        } else if width > 1 {
            Box::new([0, width - 1].into_iter())
        } else {
            Box::new(std::iter::once(0))
        };
        xs.map(move |x| {
            let [r, g, b, _] = image.get_pixel(x, y).0;
            Rgb([r, g, b])
        })
    });
    dominant_color(frame)
}

fn inpaint_group(image: &mut RgbaImage, group: &TextGroup, config: &EraseConfig) {
    let (width, height) = image.dimensions();
    // Keeps a ring of known pixels around the dilated mask.
    let margin = config.dilation_px as u32 + 2;
    let window = Bounds {
        left: group.bounds.left.saturating_sub(margin),
        top: group.bounds.top.saturating_sub(margin),
        right: group.bounds.right.saturating_add(margin),
        bottom: group.bounds.bottom.saturating_add(margin),
    }
    .clamp_to(width, height);
    if window.is_empty() {
        return;
    }

    let mut mask = GrayImage::new(window.width(), window.height());
    for member in &group.members {
        let points = local_polygon(member.quad.points(), window);
        if points.len() >= 3 {
            draw_polygon_mut(&mut mask, &points, Luma([MASK_ON]));
        } else {
            let bounds = member.bounds();
            let left = bounds.left.saturating_sub(window.left);
            let top = bounds.top.saturating_sub(window.top);
            let rect = Rect::at(left as i32, top as i32)
                .of_size(bounds.width().max(1), bounds.height().max(1));
            draw_filled_rect_mut(&mut mask, rect, Luma([MASK_ON]));
        }
    }
    if config.dilation_px > 0 {
        mask = dilate(&mask, Norm::LInf, config.dilation_px);
    }
    inpaint_masked(image, &mask, window, config.fill_color);
}

/// Polygon in window coordinates with repeated and closing points removed.
fn local_polygon(points: &[crate::geometry::Point; 4], window: Bounds) -> Vec<PixelPoint<i32>> {
    let mut out: Vec<PixelPoint<i32>> = Vec::with_capacity(4);
    for point in points {
        let local = PixelPoint::new(
            point.x.round() as i32 - window.left as i32,
            point.y.round() as i32 - window.top as i32,
        );
        if out.last() != Some(&local) {
            out.push(local);
        }
    }
    while out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}

/// Onion-peel fill: each pass assigns every masked pixel that touches a known
/// pixel the mean of its known 8-neighbours, then marks the pass as known.
fn inpaint_masked(image: &mut RgbaImage, mask: &GrayImage, window: Bounds, fallback: Rgb<u8>) {
    let (w, h) = mask.dimensions();
    let index = |x: u32, y: u32| (y * w + x) as usize;
    let mut known: Vec<bool> = mask.pixels().map(|pixel| pixel[0] != MASK_ON).collect();
    let mut remaining: Vec<(u32, u32)> = mask
        .enumerate_pixels()
        .filter(|(_, _, pixel)| pixel[0] == MASK_ON)
        .map(|(x, y, _)| (x, y))
        .collect();

    while !remaining.is_empty() {
        let mut updates = Vec::new();
        let mut pending = Vec::new();
        for &(x, y) in &remaining {
            let mut sum = [0u32; 4];
            let mut count = 0u32;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                        continue;
                    }
                    if !known[index(nx as u32, ny as u32)] {
                        continue;
                    }
                    let pixel = image.get_pixel(window.left + nx as u32, window.top + ny as u32);
                    for (acc, channel) in sum.iter_mut().zip(pixel.0) {
                        *acc += channel as u32;
                    }
                    count += 1;
                }
            }
            if count == 0 {
                pending.push((x, y));
            } else {
                let mean = sum.map(|total| ((total + count / 2) / count) as u8);
                updates.push((x, y, Rgba(mean)));
            }
        }

        if updates.is_empty() {
            // Nothing known around the remaining pixels.
            let fill = Rgba([fallback[0], fallback[1], fallback[2], 255]);
            for (x, y) in pending {
                image.put_pixel(window.left + x, window.top + y, fill);
            }
            break;
        }
        for (x, y, pixel) in updates {
            image.put_pixel(window.left + x, window.top + y, pixel);
            known[index(x, y)] = true;
        }
        remaining = pending;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Quad;
    use crate::ocr::TextFragment;
    use crate::test_util::canvas_with_blocks;

    fn group_over(left: f32, top: f32, width: f32, height: f32) -> TextGroup {
        TextGroup::from_members(vec![TextFragment::new(
            "Text",
            Quad::from_rect(left, top, width, height),
            90.0,
        )])
        .expect("group")
    }

    #[test]
    fn inpaint_removes_ink_on_flat_background() {
        let mut image = canvas_with_blocks(
            80,
            40,
            [240, 240, 240],
            [0, 0, 0],
            &[(12, 12, 4, 14), (20, 12, 4, 14), (28, 12, 10, 3)],
        );
        let group = group_over(10.0, 10.0, 30.0, 18.0);
        erase(&mut image, &group, &EraseConfig::default());
        assert!(image.pixels().all(|pixel| pixel.0 == [240, 240, 240, 255]));
    }

    #[test]
    fn inpaint_follows_a_background_gradient() {
        let mut image = RgbaImage::from_fn(60, 20, |x, _| Rgba([(x * 4) as u8, 100, 100, 255]));
        for y in 8..12 {
            for x in 20..40 {
                image.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }
        let group = group_over(20.0, 8.0, 20.0, 4.0);
        erase(&mut image, &group, &EraseConfig::default());
        let center = image.get_pixel(30, 10);
        assert!(center[1] == 100 && center[2] == 100);
        assert!(center[0] > 60 && center[0] < 180);
    }

    #[test]
    fn flat_fill_paints_the_bounds() {
        let mut image = canvas_with_blocks(40, 40, [10, 10, 10], [200, 0, 0], &[(5, 5, 10, 10)]);
        let config = EraseConfig {
            strategy: EraseStrategy::Flat,
            ..EraseConfig::default()
        };
        erase(&mut image, &group_over(5.0, 5.0, 10.0, 10.0), &config);
        assert_eq!(image.get_pixel(9, 9).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(20, 20).0, [10, 10, 10, 255]);
    }

    #[test]
    fn fully_masked_image_falls_back_to_fill_color() {
        let mut image = canvas_with_blocks(6, 6, [0, 0, 0], [0, 0, 0], &[]);
        erase(&mut image, &group_over(0.0, 0.0, 6.0, 6.0), &EraseConfig::default());
        assert!(image.pixels().all(|pixel| pixel.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn border_color_reads_the_frame() {
        let image = canvas_with_blocks(20, 10, [12, 34, 56], [255, 255, 255], &[(2, 2, 16, 6)]);
        assert_eq!(border_color(&image), Some(Rgb([12, 34, 56])));
    }
}
