//! Replaces the text inside slide and document images with its translation.
//!
//! [`Engine::replace_text`] detects text with tesseract, erases it and draws
//! the translation in a matching style. When detection is unavailable or any
//! stage fails it overlays the whole translation as a banner instead, and an
//! undecodable image comes back unchanged.

pub mod batch;
pub mod codec;
pub mod error;
pub mod geometry;
pub mod languages;
pub mod logging;
pub mod ocr;
pub mod render;
pub mod replace;
pub mod settings;
#[cfg(test)]
mod test_util;

pub use batch::{BatchItem, BatchResult, CancelFlag, replace_all};
pub use error::{EngineError, EngineResult};
pub use ocr::{Capabilities, TextDetector, TextFragment};
pub use render::{FontChain, FontSource, RenderConfig, TextRenderer};
pub use replace::{Engine, EnhancedResult, FallbackReason, GroupReport, ReplaceOutcome, Tier};
pub use settings::{Settings, load_settings};
