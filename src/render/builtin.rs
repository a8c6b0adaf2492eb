//! Minimal stroke font used when no font file can be found.
//!
//! Glyphs live on a 4x6 grid (cap height 6, baseline at y=6) and are drawn as
//! stroked SVG paths, so rendering never depends on the font database.
//! Lowercase letters reuse the capitals; anything else is drawn as a box.

const ADVANCE_EM: f32 = 0.6;
const UNIT_EM: f32 = 0.125;
const CAP_UNITS: f32 = 6.0;

pub fn measure(text: &str, font_size: f32) -> f32 {
    let count = text.chars().filter(|ch| *ch != '\n').count();
    count as f32 * font_size * ADVANCE_EM
}

pub fn ascent(font_size: f32) -> f32 {
    font_size * UNIT_EM * CAP_UNITS
}

pub fn stroke_width(font_size: f32, bold: bool) -> f32 {
    let base = font_size * if bold { 0.14 } else { 0.09 };
    base.max(1.0)
}

/// SVG path data for `text` with its left edge at `x` and baseline at `baseline`.
pub fn path_data(text: &str, x: f32, baseline: f32, font_size: f32) -> String {
    let unit = font_size * UNIT_EM;
    let advance = font_size * ADVANCE_EM;
    let inset = (advance - 4.0 * unit) / 2.0;
    let top = baseline - CAP_UNITS * unit;
    let mut out = String::new();
    for (idx, ch) in text.chars().filter(|ch| *ch != '\n').enumerate() {
        if ch.is_whitespace() {
            continue;
        }
        let origin_x = x + idx as f32 * advance + inset;
        for command in glyph(ch).split_whitespace() {
            let (op, coords) = command.split_at(1);
            if op == "Z" {
                out.push_str("Z ");
                continue;
            }
            let Some((gx, gy)) = coords.split_once(',') else {
                continue;
            };
            let (Ok(gx), Ok(gy)) = (gx.parse::<f32>(), gy.parse::<f32>()) else {
                continue;
            };
            out.push_str(&format!(
                "{}{:.2} {:.2} ",
                op,
                origin_x + gx * unit,
                top + gy * unit
            ));
        }
    }
    out.trim_end().to_string()
}

fn glyph(ch: char) -> &'static str {
    match ch.to_ascii_uppercase() {
        'A' => "M0,6 L0,2 L2,0 L4,2 L4,6 M0,4 L4,4",
        'B' => "M0,0 L0,6 L3,6 L4,5 L4,4 L3,3 L0,3 M0,0 L3,0 L4,1 L4,2 L3,3",
        'C' => "M4,1 L3,0 L1,0 L0,1 L0,5 L1,6 L3,6 L4,5",
        'D' => "M0,0 L0,6 L2,6 L4,4 L4,2 L2,0 Z",
        'E' => "M4,0 L0,0 L0,6 L4,6 M0,3 L3,3",
        'F' => "M4,0 L0,0 L0,6 M0,3 L3,3",
        'G' => "M4,1 L3,0 L1,0 L0,1 L0,5 L1,6 L3,6 L4,5 L4,3 L2,3",
        'H' => "M0,0 L0,6 M4,0 L4,6 M0,3 L4,3",
        'I' => "M1,0 L3,0 M2,0 L2,6 M1,6 L3,6",
        'J' => "M4,0 L4,5 L3,6 L1,6 L0,5",
        'K' => "M0,0 L0,6 M4,0 L0,4 M1,3 L4,6",
        'L' => "M0,0 L0,6 L4,6",
        'M' => "M0,6 L0,0 L2,3 L4,0 L4,6",
        'N' => "M0,6 L0,0 L4,6 L4,0",
        'O' => "M1,0 L3,0 L4,1 L4,5 L3,6 L1,6 L0,5 L0,1 Z",
        'P' => "M0,6 L0,0 L3,0 L4,1 L4,2 L3,3 L0,3",
        'Q' => "M1,0 L3,0 L4,1 L4,5 L3,6 L1,6 L0,5 L0,1 Z M2,4 L4,6",
        'R' => "M0,6 L0,0 L3,0 L4,1 L4,2 L3,3 L0,3 M2,3 L4,6",
        'S' => "M4,1 L3,0 L1,0 L0,1 L0,2 L1,3 L3,3 L4,4 L4,5 L3,6 L1,6 L0,5",
        'T' => "M0,0 L4,0 M2,0 L2,6",
        'U' => "M0,0 L0,5 L1,6 L3,6 L4,5 L4,0",
        'V' => "M0,0 L2,6 L4,0",
        'W' => "M0,0 L1,6 L2,3 L3,6 L4,0",
        'X' => "M0,0 L4,6 M4,0 L0,6",
        'Y' => "M0,0 L2,3 L4,0 M2,3 L2,6",
        'Z' => "M0,0 L4,0 L0,6 L4,6",
        '0' => "M1,0 L3,0 L4,1 L4,5 L3,6 L1,6 L0,5 L0,1 Z M4,1 L0,5",
        '1' => "M1,1 L2,0 L2,6 M1,6 L3,6",
        '2' => "M0,1 L1,0 L3,0 L4,1 L4,2 L0,6 L4,6",
        '3' => "M0,1 L1,0 L3,0 L4,1 L4,2 L3,3 L1,3 M3,3 L4,4 L4,5 L3,6 L1,6 L0,5",
        '4' => "M3,6 L3,0 L0,4 L4,4",
        '5' => "M4,0 L0,0 L0,3 L3,3 L4,4 L4,5 L3,6 L0,6",
        '6' => "M3,0 L1,0 L0,1 L0,5 L1,6 L3,6 L4,5 L4,4 L3,3 L0,3",
        '7' => "M0,0 L4,0 L1,6",
        '8' => "M1,0 L3,0 L4,1 L4,2 L3,3 L1,3 L0,2 L0,1 Z M1,3 L0,4 L0,5 L1,6 L3,6 L4,5 L4,4 L3,3",
        '9' => "M4,3 L1,3 L0,2 L0,1 L1,0 L3,0 L4,1 L4,5 L3,6 L1,6",
        '.' => "M2,5.5 L2,6",
        ',' => "M2,5 L1.5,7",
        ':' => "M2,1.5 L2,2 M2,4.5 L2,5",
        ';' => "M2,1.5 L2,2 M2,4.5 L1.5,6.5",
        '!' => "M2,0 L2,4 M2,5.5 L2,6",
        '?' => "M0,1 L1,0 L3,0 L4,1 L4,2 L2,3.5 L2,4 M2,5.5 L2,6",
        '-' => "M1,3 L3,3",
        '+' => "M0,3 L4,3 M2,1 L2,5",
        '=' => "M0,2 L4,2 M0,4 L4,4",
        '_' => "M0,6 L4,6",
        '*' => "M2,1 L2,5 M0,2 L4,4 M4,2 L0,4",
        '/' => "M4,0 L0,6",
        '(' => "M3,0 L1,2 L1,4 L3,6",
        ')' => "M1,0 L3,2 L3,4 L1,6",
        '\'' => "M2,0 L2,1.5",
        '"' => "M1,0 L1,1.5 M3,0 L3,1.5",
        '%' => "M0,6 L4,0 M0.5,0.5 L1,0.5 M3,5.5 L3.5,5.5",
        _ => "M0,0 L4,0 L4,6 L0,6 Z",
    }
}
