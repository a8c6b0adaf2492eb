use anyhow::{Result, anyhow};
use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::replace::{Engine, ReplaceOutcome};

/// One picture of a document job together with its translation.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub bytes: Vec<u8>,
    pub translated: String,
}

#[derive(Debug, Clone)]
pub enum BatchResult {
    Replaced(ReplaceOutcome),
    /// Cancellation was observed before the image was started.
    Skipped,
}

/// Cooperative stop signal shared between the caller and running jobs.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn default_concurrency() -> usize {
    num_cpus::get().max(1)
}

/// Runs the engine over every item on the blocking pool, at most
/// `concurrency` at a time. Results keep the input order. Images already
/// running when `cancel` is raised finish normally.
pub async fn replace_all(
    engine: Arc<Engine>,
    items: Vec<BatchItem>,
    source_lang: &str,
    concurrency: usize,
    cancel: &CancelFlag,
) -> Result<Vec<BatchResult>> {
    let total = items.len();
    let concurrency = concurrency.max(1);
    let results: Vec<Result<(usize, BatchResult)>> = stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| {
            let engine = engine.clone();
            let cancel = cancel.clone();
            let source_lang = source_lang.to_string();
            async move {
                if cancel.is_cancelled() {
                    debug!(index, "cancelled, skipping image");
                    return Ok((index, BatchResult::Skipped));
                }
                let outcome = tokio::task::spawn_blocking(move || {
                    engine.replace_text(&item.bytes, &item.translated, &source_lang)
                })
                .await
                .map_err(|err| anyhow!("image task {} failed: {}", index, err))?;
                Ok((index, BatchResult::Replaced(outcome)))
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut ordered = Vec::with_capacity(total);
    for result in results {
        ordered.push(result?);
    }
    ordered.sort_by_key(|(index, _)| *index);
    let skipped = ordered
        .iter()
        .filter(|(_, result)| matches!(result, BatchResult::Skipped))
        .count();
    info!(total, skipped, "batch finished");
    Ok(ordered.into_iter().map(|(_, result)| result).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::languages::OcrLanguages;
    use crate::ocr::{Capabilities, TextDetector, TextFragment};
    use crate::replace::Tier;
    use crate::settings::Settings;
    use crate::test_util::canvas_with_blocks;
    use image::{DynamicImage, ImageFormat};

    struct NoText;

    impl TextDetector for NoText {
        fn detect(&self, _image: &DynamicImage, _languages: &OcrLanguages) -> Result<Vec<TextFragment>> {
            Ok(Vec::new())
        }
    }

    fn engine() -> Arc<Engine> {
        Arc::new(Engine::new(Arc::new(NoText), Capabilities::basic_only(), Settings::default()))
    }

    fn png(width: u32) -> Vec<u8> {
        let image = canvas_with_blocks(width, 40, [255, 255, 255], [0, 0, 0], &[]);
        codec::encode(&image, ImageFormat::Png).expect("encode")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn results_keep_input_order() {
        let items = vec![
            BatchItem {
                bytes: b"not an image".to_vec(),
                translated: "a".to_string(),
            },
            BatchItem {
                bytes: png(64),
                translated: String::new(),
            },
            BatchItem {
                bytes: png(32),
                translated: String::new(),
            },
        ];
        let results = replace_all(engine(), items, "en", 2, &CancelFlag::new())
            .await
            .expect("batch");
        assert_eq!(results.len(), 3);
        let tiers: Vec<Tier> = results
            .iter()
            .map(|result| match result {
                BatchResult::Replaced(outcome) => outcome.tier,
                BatchResult::Skipped => panic!("nothing was cancelled"),
            })
            .collect();
        assert_eq!(tiers, vec![Tier::Passthrough, Tier::Basic, Tier::Basic]);
        let BatchResult::Replaced(last) = &results[2] else {
            unreachable!()
        };
        let decoded = image::load_from_memory(&last.bytes).expect("decode");
        assert_eq!(decoded.width(), 32);
    }

    #[tokio::test]
    async fn cancelled_jobs_are_skipped() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let items = vec![
            BatchItem {
                bytes: png(16),
                translated: "x".to_string(),
            };
            3
        ];
        let results = replace_all(engine(), items, "en", 4, &cancel).await.expect("batch");
        assert!(results.iter().all(|result| matches!(result, BatchResult::Skipped)));
    }
}
