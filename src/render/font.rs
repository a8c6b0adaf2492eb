use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};
use ttf_parser::Face;
use ttf_parser::name_id;
use usvg::fontdb;

use super::builtin;
use crate::error::EngineError;

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    ascender: i16,
    family: Option<String>,
    face_index: u32,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn measure(&self, text: &str, font_size: f32) -> f32 {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return builtin::measure(text, font_size);
        };
        let mut advance = 0u32;
        for ch in text.chars() {
            if ch == '\n' {
                continue;
            }
            if ch == ' ' {
                advance = advance.saturating_add(self.space_advance as u32);
                continue;
            }
            let glyph_advance = face
                .glyph_index(ch)
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .unwrap_or(self.space_advance);
            advance = advance.saturating_add(glyph_advance as u32);
        }
        advance as f32 * (font_size / self.units_per_em.max(1) as f32)
    }

    pub fn ascent(&self, font_size: f32) -> f32 {
        let ratio = self.ascender.max(0) as f32 / self.units_per_em.max(1) as f32;
        if ratio > 0.0 {
            font_size * ratio.min(1.2)
        } else {
            font_size * 0.8
        }
    }

    /// Number of visible characters in `text` that have a glyph.
    pub fn coverage(&self, text: &str) -> (usize, usize) {
        let Ok(face) = Face::parse(&self.data, self.face_index) else {
            return (0, 0);
        };
        let mut covered = 0;
        let mut total = 0;
        for ch in text.chars().filter(|ch| !ch.is_whitespace()) {
            total += 1;
            if face.glyph_index(ch).is_some() {
                covered += 1;
            }
        }
        (covered, total)
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(data, None)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

/// One probe in the fallback chain.
#[derive(Debug, Clone, PartialEq)]
pub enum FontSource {
    File(PathBuf),
    Family(String),
    AnySystemFace,
}

/// A font face ready for measuring and rasterising.
pub struct LoadedFont {
    pub metrics: FontMetrics,
    pub family: String,
    pub origin: String,
    database: Arc<fontdb::Database>,
}

impl LoadedFont {
    pub fn database(&self) -> Arc<fontdb::Database> {
        self.database.clone()
    }
}

#[derive(Clone, Copy)]
pub enum FontChoice<'a> {
    Face(&'a LoadedFont),
    Builtin,
}

impl FontChoice<'_> {
    pub fn measure(&self, text: &str, font_size: f32) -> f32 {
        match self {
            FontChoice::Face(font) => font.metrics.measure(text, font_size),
            FontChoice::Builtin => builtin::measure(text, font_size),
        }
    }

    pub fn ascent(&self, font_size: f32) -> f32 {
        match self {
            FontChoice::Face(font) => font.metrics.ascent(font_size),
            FontChoice::Builtin => builtin::ascent(font_size),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FontChoice::Face(font) => font.family.as_str(),
            FontChoice::Builtin => "builtin",
        }
    }
}

/// Ordered font probes, each resolved at most once and cached for the
/// lifetime of the chain. The built-in stroke font ends every chain.
pub struct FontChain {
    sources: Vec<(FontSource, OnceLock<Option<LoadedFont>>)>,
    system: OnceLock<fontdb::Database>,
}

impl FontChain {
    pub fn new(sources: Vec<FontSource>) -> Self {
        Self {
            sources: sources
                .into_iter()
                .map(|source| (source, OnceLock::new()))
                .collect(),
            system: OnceLock::new(),
        }
    }

    /// Bundled fonts first, then an explicit family, then platform paths and
    /// well-known system families.
    pub fn standard(bundled: &[PathBuf], family: Option<&str>) -> Self {
        let mut sources = Vec::new();
        for path in bundled {
            for candidate in resolve_bundled_path(path) {
                sources.push(FontSource::File(candidate));
            }
        }
        if let Some(family) = family {
            sources.push(FontSource::Family(family.to_string()));
        }
        for path in platform_font_paths() {
            sources.push(FontSource::File(PathBuf::from(path)));
        }
        for family in SYSTEM_FAMILIES {
            sources.push(FontSource::Family(family.to_string()));
        }
        sources.push(FontSource::AnySystemFace);
        Self::new(sources)
    }

    /// Only the built-in font; never touches the file system.
    pub fn builtin_only() -> Self {
        Self::new(Vec::new())
    }

    /// First face that has a glyph for every visible character of `text`;
    /// otherwise the face with the best partial coverage; otherwise the
    /// built-in font.
    pub fn select(&self, text: &str) -> FontChoice<'_> {
        let mut best: Option<(&LoadedFont, usize)> = None;
        for (source, slot) in &self.sources {
            let Some(font) = slot.get_or_init(|| self.load(source)) else {
                continue;
            };
            let (covered, total) = font.metrics.coverage(text);
            if covered == total {
                return FontChoice::Face(font);
            }
            if covered > 0 && best.is_none_or(|(_, count)| covered > count) {
                best = Some((font, covered));
            }
        }
        match best {
            Some((font, _)) => {
                warn!(
                    "{}",
                    EngineError::RenderingDegraded(format!(
                        "no font covers every character, using {}",
                        font.family
                    ))
                );
                FontChoice::Face(font)
            }
            None => {
                debug!("no usable font face, drawing with the built-in stroke font");
                FontChoice::Builtin
            }
        }
    }

    fn load(&self, source: &FontSource) -> Option<LoadedFont> {
        let result = match source {
            FontSource::File(path) => {
                if !path.exists() {
                    return None;
                }
                load_font_metrics(path).map(|metrics| (metrics, path.display().to_string()))
            }
            FontSource::Family(family) => self.load_system_family(family),
            FontSource::AnySystemFace => self.load_any_system_face(),
        };
        match result {
            Ok((metrics, origin)) => {
                let family = metrics
                    .family()
                    .map(str::to_string)
                    .unwrap_or_else(|| "sans-serif".to_string());
                info!(family = %family, origin = %origin, "loaded overlay font");
                let database = face_database(&metrics);
                Some(LoadedFont {
                    metrics,
                    family,
                    origin,
                    database,
                })
            }
            Err(err) => {
                debug!("font probe {:?} failed: {:#}", source, err);
                None
            }
        }
    }

    fn system(&self) -> &fontdb::Database {
        self.system.get_or_init(|| {
            let mut db = fontdb::Database::new();
            db.load_system_fonts();
            db
        })
    }

    fn load_system_family(&self, family: &str) -> Result<(FontMetrics, String)> {
        let db = self.system();
        let is_sans = family.eq_ignore_ascii_case("sans-serif");
        let families = if is_sans {
            vec![fontdb::Family::SansSerif]
        } else {
            vec![fontdb::Family::Name(family)]
        };
        let query = fontdb::Query {
            families: &families,
            ..Default::default()
        };
        let id = db
            .query(&query)
            .ok_or_else(|| anyhow!("font not found: {}", family))?;
        let data = db
            .with_face_data(id, |data, _index| data.to_vec())
            .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
        let preferred = if is_sans { None } else { Some(family) };
        let metrics = load_font_metrics_from_data(data, preferred)?;
        Ok((metrics, format!("system:{}", family)))
    }

    fn load_any_system_face(&self) -> Result<(FontMetrics, String)> {
        let db = self.system();
        let face = db
            .faces()
            .next()
            .ok_or_else(|| anyhow!("no system fonts installed"))?;
        let data = db
            .with_face_data(face.id, |data, _index| data.to_vec())
            .ok_or_else(|| anyhow!("failed to load system font data"))?;
        let metrics = load_font_metrics_from_data(data, None)?;
        Ok((metrics, "system:first-face".to_string()))
    }
}

const SYSTEM_FAMILIES: &[&str] = &[
    "Noto Sans CJK JP",
    "Noto Sans CJK KR",
    "Noto Sans",
    "DejaVu Sans",
    "Liberation Sans",
    "sans-serif",
];

#[cfg(target_os = "macos")]
fn platform_font_paths() -> &'static [&'static str] {
    &[
        "/System/Library/Fonts/AppleSDGothicNeo.ttc",
        "/System/Library/Fonts/Hiragino Sans GB.ttc",
        "/Library/Fonts/Arial Unicode.ttf",
    ]
}

#[cfg(target_os = "windows")]
fn platform_font_paths() -> &'static [&'static str] {
    &[
        "C:\\Windows\\Fonts\\malgun.ttf",
        "C:\\Windows\\Fonts\\seguisym.ttf",
        "C:\\Windows\\Fonts\\arialuni.ttf",
    ]
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_font_paths() -> &'static [&'static str] {
    &[
        "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
        "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    ]
}

/// Relative bundled paths are tried against the working directory and the
/// directory of the running executable.
fn resolve_bundled_path(path: &Path) -> Vec<PathBuf> {
    if path.is_absolute() {
        return vec![path.to_path_buf()];
    }
    let mut candidates = vec![path.to_path_buf()];
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(dir.join(path));
    }
    candidates
}

fn face_database(metrics: &FontMetrics) -> Arc<fontdb::Database> {
    let mut db = fontdb::Database::new();
    let source: Arc<dyn AsRef<[u8]> + Send + Sync> = metrics.data.clone();
    db.load_font_source(fontdb::Source::Binary(source));
    Arc::new(db)
}

fn load_font_metrics_from_data(data: Vec<u8>, preferred_family: Option<&str>) -> Result<FontMetrics> {
    let data = Arc::new(data);
    let mut fallback = None;
    let count = ttf_parser::fonts_in_collection(&data).unwrap_or(1);
    for index in 0..count {
        if let Ok(face) = Face::parse(&data, index) {
            let family = extract_family_name(&face);
            let units_per_em = face.units_per_em().max(1);
            let space_advance = face
                .glyph_index(' ')
                .and_then(|id| face.glyph_hor_advance(id))
                .unwrap_or(units_per_em / 2);
            let metrics = FontMetrics {
                data: data.clone(),
                units_per_em,
                space_advance,
                ascender: face.ascender(),
                family: family.clone(),
                face_index: index,
            };
            if let (Some(preferred), Some(found)) = (preferred_family, &family) {
                if found.eq_ignore_ascii_case(preferred) {
                    return Ok(metrics);
                }
            }
            if fallback.is_none() {
                fallback = Some(metrics);
            }
        }
    }
    fallback.ok_or_else(|| anyhow!("failed to parse font data"))
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_fall_through_to_builtin() {
        let chain = FontChain::new(vec![
            FontSource::File(PathBuf::from("/nonexistent/fonts/NotoSansCJK-Regular.ttc")),
            FontSource::File(PathBuf::from("fonts/missing.ttf")),
        ]);
        let choice = chain.select("Bonjour");
        assert!(matches!(choice, FontChoice::Builtin));
        assert_eq!(choice.name(), "builtin");
    }

    #[test]
    fn garbage_font_file_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").expect("write");
        let chain = FontChain::new(vec![FontSource::File(path)]);
        assert!(matches!(chain.select("abc"), FontChoice::Builtin));
    }

    #[test]
    fn builtin_choice_measures_every_char() {
        let chain = FontChain::builtin_only();
        let choice = chain.select("HELLO");
        assert!((choice.measure("HELLO", 20.0) - 60.0).abs() < 1e-3);
    }

    #[test]
    fn relative_bundled_paths_get_exe_candidate() {
        let candidates = resolve_bundled_path(Path::new("fonts/a.ttf"));
        assert_eq!(candidates[0], PathBuf::from("fonts/a.ttf"));
        assert!(candidates.len() <= 2);
        let absolute = resolve_bundled_path(Path::new("/opt/a.ttf"));
        assert_eq!(absolute, vec![PathBuf::from("/opt/a.ttf")]);
    }
}
