use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::{ImageFormat, RgbaImage};
use usvg::Options;

use super::rasterize_svg;
use crate::codec;
use crate::replace::group::TextGroup;

/// PNG of the source image with every group's bounds outlined, for tuning
/// grouping and filtering.
pub fn render_group_boxes(image: &RgbaImage, groups: &[TextGroup]) -> Result<Vec<u8>> {
    let png = codec::encode(image, ImageFormat::Png)?;
    let svg = group_boxes_svg(&png, image.width(), image.height(), groups);
    let pixmap = rasterize_svg(&svg, &Options::default())?;
    let overlay = RgbaImage::from_raw(pixmap.width(), pixmap.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    Ok(codec::encode(&overlay, ImageFormat::Png)?)
}

fn group_boxes_svg(png: &[u8], width: u32, height: u32, groups: &[TextGroup]) -> String {
    let data_uri = format!(
        "data:{};base64,{}",
        codec::mime_for_format(ImageFormat::Png),
        BASE64.encode(png)
    );
    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));
    for group in groups {
        let bounds = group.bounds;
        svg.push_str(&format!(
            r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="#00c853" stroke-width="2"/>"##,
            x = bounds.left,
            y = bounds.top,
            w = bounds.width(),
            h = bounds.height()
        ));
        for member in &group.members {
            let points = member
                .quad
                .points()
                .iter()
                .map(|point| format!("{:.1},{:.1}", point.x, point.y))
                .collect::<Vec<_>>()
                .join(" ");
            svg.push_str(&format!(
                r##"<polygon points="{}" fill="none" stroke="#ff6d00" stroke-width="1"/>"##,
                points
            ));
        }
    }
    svg.push_str("</svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Quad;
    use crate::ocr::TextFragment;

    #[test]
    fn outlines_groups_and_members() {
        let group = TextGroup::from_members(vec![
            TextFragment::new("Hello", Quad::from_rect(4.0, 4.0, 20.0, 8.0), 90.0),
            TextFragment::new("World", Quad::from_rect(28.0, 5.0, 20.0, 8.0), 90.0),
        ])
        .expect("group");
        let svg = group_boxes_svg(b"png", 64, 32, std::slice::from_ref(&group));
        assert_eq!(svg.matches("<rect").count(), 1);
        assert_eq!(svg.matches("<polygon").count(), 2);
        assert!(svg.contains("data:image/png;base64,"));
    }

    #[test]
    fn overlay_keeps_image_size() {
        let image = RgbaImage::from_pixel(40, 20, image::Rgba([255, 255, 255, 255]));
        let png = render_group_boxes(&image, &[]).expect("overlay");
        let decoded = image::load_from_memory(&png).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (40, 20));
    }
}
