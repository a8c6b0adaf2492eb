/// Tesseract language codes requested for one image, e.g. `["jpn", "eng"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrLanguages(Vec<String>);

impl OcrLanguages {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for code in codes {
            let code = code.into().trim().to_string();
            if !code.is_empty() && !list.contains(&code) {
                list.push(code);
            }
        }
        if list.is_empty() {
            list.push(DEFAULT_OCR_LANGUAGE.to_string());
        }
        OcrLanguages(list)
    }

    /// Parses the `jpn+eng` form accepted by tesseract's `-l` flag.
    pub fn parse(value: &str) -> Self {
        Self::new(value.split(['+', ',', ' ']))
    }

    pub fn codes(&self) -> &[String] {
        &self.0
    }

    pub fn joined(&self) -> String {
        self.0.join("+")
    }

    /// Keeps only installed languages. Falls back to `eng` when nothing is left.
    pub fn restrict_to(&self, installed: &[String]) -> (OcrLanguages, Vec<String>) {
        let mut kept = Vec::new();
        let mut missing = Vec::new();
        for code in &self.0 {
            if installed.iter().any(|value| value == code) {
                kept.push(code.clone());
            } else {
                missing.push(code.clone());
            }
        }
        (OcrLanguages::new(kept), missing)
    }
}

pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

struct LanguageEntry {
    aliases: &'static [&'static str],
    ocr: &'static [&'static str],
}

const LANGUAGE_TABLE: &[LanguageEntry] = &[
    LanguageEntry {
        aliases: &["ja", "jpn", "japanese", "일본어"],
        ocr: &["jpn", "eng"],
    },
    LanguageEntry {
        aliases: &["ko", "kor", "korean", "한국어"],
        ocr: &["kor", "eng"],
    },
    LanguageEntry {
        aliases: &["en", "eng", "english", "영어"],
        ocr: &["eng"],
    },
    LanguageEntry {
        aliases: &[
            "zh",
            "zh-hans",
            "zho-hans",
            "zh-cn",
            "chi_sim",
            "chinese",
            "simplified chinese",
            "중국어간체",
        ],
        ocr: &["chi_sim", "eng"],
    },
    LanguageEntry {
        aliases: &[
            "zh-hant",
            "zho-hant",
            "zh-tw",
            "chi_tra",
            "traditional chinese",
            "중국어번체",
        ],
        ocr: &["chi_tra", "eng"],
    },
    LanguageEntry {
        aliases: &["th", "tha", "thai", "태국어"],
        ocr: &["tha", "eng"],
    },
    LanguageEntry {
        aliases: &["es", "spa", "spanish", "스페인어"],
        ocr: &["spa", "eng"],
    },
    LanguageEntry {
        aliases: &["fr", "fra", "fre", "french", "프랑스어"],
        ocr: &["fra", "eng"],
    },
];

/// Maps a source-language hint to the OCR profile used for detection.
/// Unknown hints (including "auto") use English only.
pub fn ocr_languages_for(source_lang: &str) -> OcrLanguages {
    let key = source_lang.trim().to_lowercase();
    LANGUAGE_TABLE
        .iter()
        .find(|entry| entry.aliases.iter().any(|alias| *alias == key))
        .map(|entry| OcrLanguages::new(entry.ocr.iter().copied()))
        .unwrap_or_else(|| OcrLanguages::new([DEFAULT_OCR_LANGUAGE]))
}
