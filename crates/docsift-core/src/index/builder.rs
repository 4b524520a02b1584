//! Offline index builder: parallel OCR over a labeled corpus, a resumable
//! checkpoint log, then batched embedding and insertion.
//!
//! The corpus layout is one subdirectory per document type, the directory
//! name being the label. OCR runs in a fixed-size worker pool; each worker
//! constructs its own OCR engine once, on its first task, because model load
//! dominates per-task cost. Results flow back to the coordinating thread,
//! which is the checkpoint file's only writer.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{error, info, warn};

use crate::config::BuilderConfig;
use crate::embed::Embedder;
use crate::error::{DocsiftError, IndexError, OcrError};
use crate::index::checkpoint::{CheckpointEntry, CheckpointLog};
use crate::index::store::{Collection, IndexRecord, RecordMetadata};
use crate::ocr::{is_supported_file, OcrEngine, TextExtractor};
use crate::preprocess::Preprocessing;

/// Constructor for worker-local OCR engines. Invoked once per pool worker,
/// on that worker's first task.
pub type EngineFactory = Arc<dyn Fn() -> Result<Arc<dyn OcrEngine>, OcrError> + Send + Sync>;

/// One labeled corpus file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFile {
    pub path: PathBuf,
    pub label: String,
}

/// Counters describing one build run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Supported files found in the corpus.
    pub corpus_files: usize,
    /// Files skipped because a previous run already checkpointed them.
    pub resumed: usize,
    /// (file, variant) tasks that produced text this run.
    pub processed: usize,
    /// Tasks whose document yielded no text.
    pub skipped_no_text: usize,
    /// Tasks that failed outright (unreadable file, engine error).
    pub failed: usize,
    /// Records inserted into the collection.
    pub indexed: usize,
}

struct OcrTask {
    file: CorpusFile,
    variant: Preprocessing,
}

struct OcrTaskResult {
    file: CorpusFile,
    variant: Preprocessing,
    text: Result<Option<String>, String>,
}

/// The offline index build pipeline.
pub struct IndexBuilder {
    config: BuilderConfig,
    render_dpi: u32,
    engine_factory: EngineFactory,
    embedder: Arc<dyn Embedder>,
}

impl IndexBuilder {
    pub fn new(
        config: BuilderConfig,
        render_dpi: u32,
        engine_factory: EngineFactory,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            config,
            render_dpi,
            engine_factory,
            embedder,
        }
    }

    /// Run the full build: enumerate, OCR with resume, embed, insert.
    ///
    /// OCR-phase failures on individual files are logged and excluded;
    /// embedding or insertion failures abort the run (the checkpoint log
    /// survives, so a re-run resumes the OCR phase for free).
    pub fn run(&self, db_root: &Path, collection_name: &str) -> Result<BuildReport, DocsiftError> {
        let corpus = enumerate_corpus(&self.config.corpus_dir, db_root)?;
        info!("Found {} supported files in the corpus", corpus.len());

        let mut report = BuildReport {
            corpus_files: corpus.len(),
            ..BuildReport::default()
        };

        let existing = CheckpointLog::load(&self.config.checkpoint_path)?;
        let done = CheckpointLog::checkpointed_paths(&existing);
        let remaining: Vec<CorpusFile> = corpus
            .into_iter()
            .filter(|f| !done.contains(&f.path))
            .collect();
        report.resumed = report.corpus_files - remaining.len();
        if report.resumed > 0 {
            info!(
                "Resuming: {} files already checkpointed, {} remaining",
                report.resumed,
                remaining.len()
            );
        }

        if remaining.is_empty() {
            info!("Nothing left to recognize, skipping straight to embedding");
        } else {
            self.run_ocr_phase(remaining, &mut report)?;
        }

        let entries = CheckpointLog::load(&self.config.checkpoint_path)?;
        if entries.is_empty() {
            warn!("No text was extracted from any corpus file; index left untouched");
            return Ok(report);
        }

        let embeddings = self.embed_entries(&entries)?;
        report.indexed = self.insert_records(db_root, collection_name, entries, embeddings)?;

        info!(
            "Vector database build complete. Total documents indexed: {}",
            report.indexed
        );
        Ok(report)
    }

    /// OCR every remaining (file, variant) pair across the worker pool,
    /// appending each completed result to the checkpoint log.
    fn run_ocr_phase(
        &self,
        remaining: Vec<CorpusFile>,
        report: &mut BuildReport,
    ) -> Result<(), DocsiftError> {
        let variants: &[Preprocessing] = if self.config.augment {
            &Preprocessing::ALL
        } else {
            &[Preprocessing::None]
        };

        let tasks: Vec<OcrTask> = remaining
            .into_iter()
            .flat_map(|file| {
                variants.iter().map(move |&variant| OcrTask {
                    file: file.clone(),
                    variant,
                })
            })
            .collect();
        let task_count = tasks.len();
        info!(
            "Recognizing {} tasks across {} workers",
            task_count, self.config.workers
        );

        let mut log = CheckpointLog::open(&self.config.checkpoint_path)?;

        let (task_tx, task_rx) = mpsc::channel::<OcrTask>();
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (result_tx, result_rx) = mpsc::channel::<OcrTaskResult>();

        for task in tasks {
            // The receiver is still alive, the send cannot fail.
            let _ = task_tx.send(task);
        }
        drop(task_tx);

        thread::scope(|scope| -> Result<(), DocsiftError> {
            for worker_id in 0..self.config.workers.max(1) {
                let task_rx = Arc::clone(&task_rx);
                let result_tx = result_tx.clone();
                let factory = Arc::clone(&self.engine_factory);
                let render_dpi = self.render_dpi;

                scope.spawn(move || {
                    worker_loop(worker_id, task_rx, result_tx, factory, render_dpi);
                });
            }
            drop(result_tx);

            // Single writer: only this thread touches the checkpoint file.
            for result in result_rx {
                let variant = result.variant;
                match result.text {
                    Ok(Some(text)) => {
                        let metadata = RecordMetadata {
                            document_type: Some(result.file.label.clone()),
                            augmentation: if self.config.augment {
                                Some(variant.label().to_string())
                            } else {
                                None
                            },
                        };
                        log.append(&CheckpointEntry {
                            text,
                            metadata,
                            source_file: result.file.path.clone(),
                        })?;
                        report.processed += 1;
                    }
                    Ok(None) => {
                        warn!(
                            "No text extracted from {} ({}). Skipping.",
                            result.file.path.display(),
                            variant.label()
                        );
                        report.skipped_no_text += 1;
                    }
                    Err(e) => {
                        error!(
                            "Failed to process {} ({}): {}",
                            result.file.path.display(),
                            variant.label(),
                            e
                        );
                        report.failed += 1;
                    }
                }
            }
            Ok(())
        })?;

        info!(
            "OCR phase done: {} checkpointed, {} without text, {} failed (of {} tasks)",
            report.processed, report.skipped_no_text, report.failed, task_count
        );
        Ok(())
    }

    /// Embed all checkpointed texts. Any failure is fatal for the run.
    fn embed_entries(&self, entries: &[CheckpointEntry]) -> Result<Vec<Vec<f32>>, DocsiftError> {
        let chunk_size = self.config.embed_chunk_size.max(1);
        info!(
            "Embedding {} texts in chunks of {}",
            entries.len(),
            chunk_size
        );

        let texts: Vec<String> = entries.iter().map(|e| e.text.clone()).collect();
        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(chunk_size) {
            let vectors = self
                .embedder
                .embed_many(chunk)
                .map_err(|e| IndexError::Embedding(e.to_string()))?;
            embeddings.extend(vectors);
        }
        Ok(embeddings)
    }

    /// Insert embeddings with their metadata in size-bounded batches. Ids
    /// are monotonic within the run, offset past any records the collection
    /// already holds.
    fn insert_records(
        &self,
        db_root: &Path,
        collection_name: &str,
        entries: Vec<CheckpointEntry>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<usize, DocsiftError> {
        let mut collection = Collection::create_or_open(db_root, collection_name)?;
        if !collection.is_empty() {
            warn!(
                "Collection '{}' already holds {} records; new records are appended",
                collection_name,
                collection.len()
            );
        }

        let id_offset = collection.len();
        let records: Vec<IndexRecord> = entries
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(n, (entry, embedding))| IndexRecord {
                id: format!("id_{}", id_offset + n),
                embedding,
                metadata: entry.metadata,
            })
            .collect();

        let total = records.len();
        let batch_size = self.config.insert_batch_size.max(1);
        let mut batches: Vec<Vec<IndexRecord>> = Vec::new();
        let mut records = records.into_iter().peekable();
        while records.peek().is_some() {
            batches.push(records.by_ref().take(batch_size).collect());
        }
        for batch in batches {
            collection.insert(batch)?;
        }
        Ok(total)
    }
}

/// Worker body: pull tasks, recognize, report. The engine is created on the
/// first task and reused for the rest.
fn worker_loop(
    worker_id: usize,
    task_rx: Arc<Mutex<mpsc::Receiver<OcrTask>>>,
    result_tx: mpsc::Sender<OcrTaskResult>,
    factory: EngineFactory,
    render_dpi: u32,
) {
    let mut extractor: Option<TextExtractor> = None;

    loop {
        let task = {
            let rx = match task_rx.lock() {
                Ok(rx) => rx,
                Err(_) => return,
            };
            match rx.recv() {
                Ok(task) => task,
                Err(_) => return,
            }
        };

        let outcome = process_task(worker_id, &task, &mut extractor, &factory, render_dpi);
        let result = OcrTaskResult {
            file: task.file,
            variant: task.variant,
            text: outcome,
        };
        if result_tx.send(result).is_err() {
            return;
        }
    }
}

fn process_task(
    worker_id: usize,
    task: &OcrTask,
    extractor: &mut Option<TextExtractor>,
    factory: &EngineFactory,
    render_dpi: u32,
) -> Result<Option<String>, String> {
    if extractor.is_none() {
        let engine = factory().map_err(|e| format!("engine init failed: {}", e))?;
        info!("Worker {} initialized its OCR engine", worker_id);
        *extractor = Some(TextExtractor::new(engine, render_dpi));
    }
    let extractor = extractor.as_ref().ok_or("engine unavailable")?;

    let bytes = fs::read(&task.file.path).map_err(|e| e.to_string())?;
    let filename = task
        .file
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document.pdf");

    let outcome = extractor.extract(&bytes, filename, task.variant);
    if outcome.has_text() {
        Ok(Some(outcome.as_text().to_string()))
    } else {
        Ok(None)
    }
}

/// Walk the corpus root: each subdirectory is a document type, each
/// supported file inside is a sample. Anything under the index's own
/// storage path is ignored.
fn enumerate_corpus(corpus_dir: &Path, exclude: &Path) -> Result<Vec<CorpusFile>, IndexError> {
    if !corpus_dir.is_dir() {
        return Err(IndexError::Corpus(format!(
            "corpus directory {} does not exist",
            corpus_dir.display()
        )));
    }

    let mut files = Vec::new();
    let type_dirs =
        fs::read_dir(corpus_dir).map_err(|e| IndexError::Corpus(e.to_string()))?;
    for type_dir in type_dirs {
        let type_dir = type_dir.map_err(|e| IndexError::Corpus(e.to_string()))?;
        let type_path = type_dir.path();
        if !type_path.is_dir() || type_path.starts_with(exclude) {
            continue;
        }
        let Some(label) = type_path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let label = label.to_string();

        let samples = fs::read_dir(&type_path).map_err(|e| IndexError::Corpus(e.to_string()))?;
        for sample in samples {
            let sample = sample.map_err(|e| IndexError::Corpus(e.to_string()))?;
            let path = sample.path();
            if !path.is_file() || path.starts_with(exclude) {
                continue;
            }
            let supported = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(is_supported_file)
                .unwrap_or(false);
            if supported {
                files.push(CorpusFile { path, label: label.clone() });
            }
        }
    }

    if files.is_empty() {
        return Err(IndexError::Corpus(format!(
            "no supported documents under {}",
            corpus_dir.display()
        )));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}
