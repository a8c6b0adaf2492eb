use crate::geometry::Quad;
use crate::ocr::TextFragment;

const WORD_LEVEL: i32 = 5;

/// Turns tesseract TSV output into one fragment per recognised word.
pub(super) fn parse_tsv_words(tsv: &str) -> Vec<TextFragment> {
    let mut fragments = Vec::new();
    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < 12 {
            continue;
        }
        let level: i32 = cols[0].parse().unwrap_or(0);
        if level != WORD_LEVEL {
            continue;
        }
        let left: f32 = cols[6].parse().unwrap_or(0.0);
        let top: f32 = cols[7].parse().unwrap_or(0.0);
        let width: f32 = cols[8].parse().unwrap_or(0.0);
        let height: f32 = cols[9].parse().unwrap_or(0.0);
        let conf: f32 = cols[10].parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if text.is_empty() || conf < 0.0 || width <= 0.0 || height <= 0.0 {
            continue;
        }
        fragments.push(TextFragment::new(
            text,
            Quad::from_rect(left, top, width, height),
            conf.min(100.0),
        ));
    }
    fragments
}
