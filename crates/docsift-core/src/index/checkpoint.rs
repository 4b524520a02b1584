//! Resumable OCR checkpoint log for the offline index builder.
//!
//! One newline-delimited JSON record per successfully recognized
//! (file, preprocessing variant) pair. Appends are flushed before the task
//! is acknowledged, so an interrupted build loses at most its in-flight
//! work. The file is plain NDJSON on purpose: operators can inspect it,
//! truncate it, or delete lines to force re-processing.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::IndexError;
use crate::index::store::RecordMetadata;

/// One completed OCR result awaiting embedding and insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    /// Recognized text for one (file, variant) pair.
    pub text: String,
    /// Label metadata to store with the eventual index record.
    pub metadata: RecordMetadata,
    /// Corpus file this entry came from; resume logic keys on it.
    pub source_file: PathBuf,
}

/// Append-only writer over the checkpoint file.
pub struct CheckpointLog {
    path: PathBuf,
    file: File,
}

impl CheckpointLog {
    /// Open the log for appending, creating it (and parent directories)
    /// when missing.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| IndexError::Checkpoint(format!("create {}: {}", parent.display(), e)))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| IndexError::Checkpoint(e.to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Append one entry and flush. The entry is durable when this returns.
    pub fn append(&mut self, entry: &CheckpointEntry) -> Result<(), IndexError> {
        let line =
            serde_json::to_string(entry).map_err(|e| IndexError::Checkpoint(e.to_string()))?;
        writeln!(self.file, "{}", line).map_err(|e| IndexError::Checkpoint(e.to_string()))?;
        self.file
            .flush()
            .map_err(|e| IndexError::Checkpoint(e.to_string()))?;
        debug!("Checkpointed {}", entry.source_file.display());
        Ok(())
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back all entries. A missing file is an empty log; a malformed
    /// line is skipped with a warning rather than aborting the load.
    pub fn load(path: &Path) -> Result<Vec<CheckpointEntry>, IndexError> {
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(path).map_err(|e| IndexError::Checkpoint(e.to_string()))?;
        let reader = BufReader::new(file);

        let mut entries = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| IndexError::Checkpoint(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CheckpointEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(
                        "Skipping malformed checkpoint line {} in {}: {}",
                        line_no + 1,
                        path.display(),
                        e
                    );
                }
            }
        }
        Ok(entries)
    }

    /// Source paths already covered by the given entries.
    pub fn checkpointed_paths(entries: &[CheckpointEntry]) -> HashSet<PathBuf> {
        entries.iter().map(|e| e.source_file.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn entry(text: &str, source: &str) -> CheckpointEntry {
        CheckpointEntry {
            text: text.to_string(),
            metadata: RecordMetadata::for_type("invoice"),
            source_file: PathBuf::from(source),
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let entries = CheckpointLog::load(&dir.path().join("absent.jsonl")).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_append_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.jsonl");

        let mut log = CheckpointLog::open(&path).unwrap();
        log.append(&entry("INVOICE 1", "data/invoice/a.pdf")).unwrap();
        log.append(&entry("INVOICE 2", "data/invoice/b.pdf")).unwrap();

        let entries = CheckpointLog::load(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], entry("INVOICE 1", "data/invoice/a.pdf"));
    }

    #[test]
    fn test_reopen_appends_instead_of_truncating() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.jsonl");

        CheckpointLog::open(&path)
            .unwrap()
            .append(&entry("first", "a.pdf"))
            .unwrap();
        CheckpointLog::open(&path)
            .unwrap()
            .append(&entry("second", "b.pdf"))
            .unwrap();

        let entries = CheckpointLog::load(&path).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_malformed_line_is_skipped_with_survivors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checkpoint.jsonl");
        let good = serde_json::to_string(&entry("ok", "a.pdf")).unwrap();
        fs::write(&path, format!("{}\n{{truncated\n{}\n", good, good)).unwrap();

        let entries = CheckpointLog::load(&path).unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn test_checkpointed_paths_dedupes_variants() {
        let entries = vec![
            CheckpointEntry {
                text: "plain".to_string(),
                metadata: RecordMetadata {
                    document_type: Some("memo".to_string()),
                    augmentation: Some("none".to_string()),
                },
                source_file: PathBuf::from("a.pdf"),
            },
            CheckpointEntry {
                text: "denoised".to_string(),
                metadata: RecordMetadata {
                    document_type: Some("memo".to_string()),
                    augmentation: Some("denoise".to_string()),
                },
                source_file: PathBuf::from("a.pdf"),
            },
        ];
        let paths = CheckpointLog::checkpointed_paths(&entries);
        assert_eq!(paths.len(), 1);
    }
}
