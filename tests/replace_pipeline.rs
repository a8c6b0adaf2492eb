use std::sync::Arc;

use anyhow::{Result, anyhow};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use insta::assert_json_snapshot;
use serde::Serialize;
use slide_image_translator::geometry::Quad;
use slide_image_translator::languages::OcrLanguages;
use slide_image_translator::{
    BatchItem, BatchResult, CancelFlag, Capabilities, Engine, FallbackReason, FontChain, RenderConfig,
    Settings, TextDetector, TextFragment, TextRenderer, Tier, codec, replace_all,
};

struct SlideDetector;

impl TextDetector for SlideDetector {
    fn detect(&self, _image: &DynamicImage, languages: &OcrLanguages) -> Result<Vec<TextFragment>> {
        assert_eq!(languages.joined(), "fra+eng");
        Ok(vec![
            TextFragment::new("Grew strongly", Quad::from_rect(0.0, 50.0, 140.0, 20.0), 88.0),
            TextFragment::new("Revenue", Quad::from_rect(110.0, 0.0, 80.0, 30.0), 93.0),
            TextFragment::new("Quarterly", Quad::from_rect(0.0, 0.0, 100.0, 30.0), 95.0),
            TextFragment::new("12%", Quad::from_rect(200.0, 50.0, 30.0, 20.0), 97.0),
        ])
    }
}

struct BrokenDetector;

impl TextDetector for BrokenDetector {
    fn detect(&self, _image: &DynamicImage, _languages: &OcrLanguages) -> Result<Vec<TextFragment>> {
        Err(anyhow!("tesseract timed out after 10s"))
    }
}

#[derive(Serialize)]
struct GroupSnapshot {
    original: String,
    segment: String,
    font_size: u32,
    bold: bool,
    upright: bool,
    lines: Vec<String>,
}

fn engine(detector: impl TextDetector + 'static, capabilities: Capabilities) -> Engine {
    Engine::new(Arc::new(detector), capabilities, Settings::default()).with_renderer(
        TextRenderer::with_fonts(RenderConfig::default(), FontChain::builtin_only()),
    )
}

fn slide_png() -> Vec<u8> {
    let mut image = RgbaImage::from_pixel(240, 100, Rgba([255, 255, 255, 255]));
    for (left, top, width, height) in [(4, 4, 90, 22), (114, 4, 70, 22), (4, 54, 130, 14), (202, 54, 26, 14)] {
        for y in top..top + height {
            for x in left..left + width {
                image.put_pixel(x, y, Rgba([20, 20, 20, 255]));
            }
        }
    }
    codec::encode(&image, ImageFormat::Png).expect("encode")
}

#[test]
fn slide_text_is_replaced_group_by_group() {
    let outcome = engine(SlideDetector, Capabilities::enhanced()).replace_text(
        &slide_png(),
        "Chiffre d'affaires trimestriel\nForte croissance\ndans toutes les regions",
        "fr",
    );
    assert_eq!(outcome.tier, Tier::Enhanced);
    assert_eq!(outcome.fallback, None);

    let groups: Vec<GroupSnapshot> = outcome
        .groups
        .iter()
        .map(|report| {
            let rendered = report.rendered.as_ref().expect("rendered");
            GroupSnapshot {
                original: report.original_text.clone(),
                segment: report.segment.clone(),
                font_size: report.style.font_size,
                bold: report.style.bold,
                upright: rendered.rotation == 0.0,
                lines: rendered.lines.clone(),
            }
        })
        .collect();
    assert_json_snapshot!(groups, @r###"
    [
      {
        "original": "Quarterly Revenue",
        "segment": "Chiffre d'affaires trimestriel",
        "font_size": 21,
        "bold": false,
        "upright": true,
        "lines": [
          "Chiffre",
          "d'affaires",
          "trimestriel"
        ]
      },
      {
        "original": "Grew strongly",
        "segment": "Forte croissance\ndans toutes les regions",
        "font_size": 14,
        "bold": true,
        "upright": true,
        "lines": [
          "Forte croissance",
          "dans toutes les",
          "regions"
        ]
      }
    ]
    "###);

    let output = image::load_from_memory(&outcome.bytes).expect("decode").to_rgba8();
    assert_eq!(output.dimensions(), (240, 100));
    // The percentage label is never touched.
    assert_eq!(output.get_pixel(215, 60).0, [20, 20, 20, 255]);
}

#[test]
fn detector_failure_yields_the_banner_overlay() {
    let png = slide_png();
    let failed = engine(BrokenDetector, Capabilities::enhanced()).replace_text(&png, "Bonjour", "fr");
    assert_eq!(failed.tier, Tier::Basic);
    assert!(matches!(failed.fallback, Some(FallbackReason::DetectionFailed(_))));

    let forced = engine(BrokenDetector, Capabilities::basic_only()).replace_text(&png, "Bonjour", "fr");
    assert_eq!(forced.bytes, failed.bytes);
    assert_ne!(forced.bytes, png);
}

#[test]
fn extraction_returns_one_line_per_group() {
    let engine = engine(SlideDetector, Capabilities::enhanced());
    assert_eq!(
        engine.extract_source_text(&slide_png(), "fr").as_deref(),
        Some("Quarterly Revenue\nGrew strongly")
    );
    assert_eq!(engine.extract_source_text(b"GIF89a", "fr"), None);
}

#[tokio::test]
async fn batch_runs_every_image_in_order() {
    let engine = Arc::new(engine(SlideDetector, Capabilities::enhanced()));
    let items = vec![
        BatchItem {
            bytes: slide_png(),
            translated: "Un\nDeux".to_string(),
        },
        BatchItem {
            bytes: Vec::new(),
            translated: "Rien".to_string(),
        },
    ];
    let results = replace_all(engine, items, "fr", 2, &CancelFlag::new()).await.expect("batch");
    let tiers: Vec<Tier> = results
        .iter()
        .map(|result| match result {
            BatchResult::Replaced(outcome) => outcome.tier,
            BatchResult::Skipped => Tier::Passthrough,
        })
        .collect();
    assert_eq!(tiers, vec![Tier::Enhanced, Tier::Passthrough]);
}
