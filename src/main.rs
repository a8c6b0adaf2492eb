use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use image::ImageFormat;
use tracing::{info, warn};

use slide_image_translator::ocr::TesseractDetector;
use slide_image_translator::{Capabilities, Engine, Settings, Tier};

#[derive(Parser, Debug)]
#[command(
    name = "slide-image-translator",
    version,
    about = "Replace the text inside an image with its translation"
)]
struct Cli {
    /// Image to process (png/jpeg/gif/bmp/webp/tiff)
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output path (default: <input>.translated.<ext>, with the extension of the written format)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Translated text, one line per text group
    #[arg(short = 't', long = "text", conflicts_with = "text_file")]
    text: Option<String>,

    /// Read the translated text from a file
    #[arg(short = 'T', long = "text-file")]
    text_file: Option<PathBuf>,

    /// Source language of the image text (ISO 639 code or language name)
    #[arg(short = 'L', long = "source-lang", default_value = "en")]
    source_lang: String,

    /// Read extra settings from a local TOML file
    #[arg(long = "settings")]
    settings: Option<PathBuf>,

    /// Skip text detection and draw the banner overlay
    #[arg(long = "basic")]
    basic: bool,

    /// Print the detected source text and exit
    #[arg(long = "extract")]
    extract: bool,

    /// With --extract, print the detected groups as JSON
    #[arg(long = "json", requires = "extract")]
    json: bool,

    /// Write detected group overlays into this directory
    #[arg(long = "debug-dir")]
    debug_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    slide_image_translator::logging::init(cli.verbose)?;

    let settings = slide_image_translator::load_settings(cli.settings.as_deref())?;
    let bytes = fs::read(&cli.input)
        .with_context(|| format!("failed to read image: {}", cli.input.display()))?;
    let engine = Arc::new(build_engine(&cli, settings));

    if cli.extract {
        let source_lang = cli.source_lang.clone();
        let groups = tokio::task::spawn_blocking(move || engine.detect_text_groups(&bytes, &source_lang))
            .await
            .map_err(|err| anyhow!("extraction task failed: {}", err))?
            .unwrap_or_default();
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&groups)?);
        } else if groups.is_empty() {
            info!("no text detected");
        } else {
            for group in &groups {
                println!("{}", group.original_text);
            }
        }
        return Ok(());
    }

    let translated = read_translation(&cli)?;
    let source_lang = cli.source_lang.clone();
    let outcome = tokio::task::spawn_blocking(move || engine.replace_text(&bytes, &translated, &source_lang))
        .await
        .map_err(|err| anyhow!("replacement task failed: {}", err))?;

    if let Some(reason) = &outcome.fallback {
        warn!(reason = %reason, "enhanced replacement not used");
    }
    if outcome.tier == Tier::Passthrough {
        warn!("image left unchanged");
    }
    let output = cli.output.clone().unwrap_or_else(|| default_output_path(&cli.input, outcome.format));
    fs::write(&output, &outcome.bytes)
        .with_context(|| format!("failed to write image: {}", output.display()))?;
    println!("{}", output.display());
    Ok(())
}

fn build_engine(cli: &Cli, settings: Settings) -> Engine {
    let engine = if cli.basic {
        Engine::new(
            Arc::new(TesseractDetector::new(settings.tesseract.clone())),
            Capabilities::basic_only(),
            settings,
        )
    } else {
        Engine::with_tesseract(settings)
    };
    match &cli.debug_dir {
        Some(dir) => engine.with_debug_dir(dir.clone()),
        None => engine,
    }
}

fn read_translation(cli: &Cli) -> Result<String> {
    if let Some(text) = &cli.text {
        return Ok(text.clone());
    }
    if let Some(path) = &cli.text_file {
        return fs::read_to_string(path)
            .with_context(|| format!("failed to read text file: {}", path.display()));
    }
    if io::stdin().is_terminal() {
        return Err(anyhow!("no translated text given (use --text, --text-file or stdin)"));
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("stdin must be UTF-8 text")?;
    Ok(buffer)
}

fn default_output_path(input: &Path, format: Option<ImageFormat>) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let input_ext = input.extension().and_then(|value| value.to_str());
    let ext = match (format, input_ext) {
        // GIF and WebP come back as PNG; keep `.jpg` for a JPEG written as JPEG.
        (Some(format), Some(ext))
            if !format
                .extensions_str()
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)) =>
        {
            format.extensions_str().first().copied().unwrap_or("png")
        }
        (Some(format), None) => format.extensions_str().first().copied().unwrap_or("png"),
        (_, Some(ext)) => ext,
        (None, None) => "png",
    };
    input.with_file_name(format!("{}.translated.{}", stem, ext))
}
