//! Build-index command - populate the vector index from a labeled corpus.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use docsift_core::index::{EngineFactory, IndexBuilder};
use docsift_core::{OcrEngine, OnnxEmbedder, PureOcrEngine};

/// Arguments for the build-index command.
#[derive(Args)]
pub struct BuildIndexArgs {
    /// Corpus root; one subdirectory per document type
    #[arg(long)]
    corpus_dir: Option<PathBuf>,

    /// Run OCR under every preprocessing variant
    #[arg(long)]
    augment: bool,

    /// Number of OCR worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Checkpoint log path
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

pub async fn run(args: BuildIndexArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = super::load_config(config_path)?;

    if let Some(corpus_dir) = args.corpus_dir {
        config.builder.corpus_dir = corpus_dir;
    }
    if let Some(workers) = args.workers {
        config.builder.workers = workers;
    }
    if let Some(checkpoint) = args.checkpoint {
        config.builder.checkpoint_path = checkpoint;
    }
    config.builder.augment |= args.augment;

    let embedder = OnnxEmbedder::from_files(
        &config.classifier.embedding_model,
        &config.classifier.tokenizer,
        config.classifier.embedding_dim,
        config.classifier.max_tokens,
    )
    .map_err(|e| anyhow::anyhow!("Failed to load embedding model: {}", e))?;

    let ocr_config = config.ocr.clone();
    let factory: EngineFactory = Arc::new(move || {
        let engine = PureOcrEngine::from_config(&ocr_config)?;
        Ok(Arc::new(engine) as Arc<dyn OcrEngine>)
    });

    let builder = IndexBuilder::new(
        config.builder.clone(),
        config.ocr.render_dpi,
        factory,
        Arc::new(embedder),
    );

    // The heavy lifting is CPU-bound; run it off the async runtime.
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb.set_message(format!(
        "Building index from {}...",
        config.builder.corpus_dir.display()
    ));

    let db_path = config.classifier.db_path.clone();
    let collection = config.classifier.collection.clone();
    let report =
        tokio::task::spawn_blocking(move || builder.run(&db_path, &collection)).await??;

    pb.finish_and_clear();

    println!("{} Index build complete", style("✓").green());
    println!("  Corpus files:    {}", report.corpus_files);
    println!("  Resumed:         {}", report.resumed);
    println!("  Recognized:      {}", report.processed);
    println!("  No text:         {}", report.skipped_no_text);
    println!("  Failed:          {}", report.failed);
    println!("  Indexed records: {}", report.indexed);

    debug!("Total build time: {:?}", start.elapsed());
    Ok(())
}
