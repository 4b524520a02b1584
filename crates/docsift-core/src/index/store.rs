//! Persisted vector collections with cosine-distance nearest-neighbor
//! queries.
//!
//! A collection is an append-only NDJSON record log under the database
//! root, one [`IndexRecord`] per line, paired with an in-memory HNSW graph
//! rebuilt from the log on open. Records are immutable once inserted; there
//! is no update or delete path.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::IndexError;

/// Metadata stored alongside each reference embedding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Document type label; the classifier's answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,

    /// Preprocessing variant this sample was produced under, when the
    /// builder ran in augmentation mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub augmentation: Option<String>,
}

impl RecordMetadata {
    /// Metadata carrying just a document type.
    pub fn for_type(document_type: impl Into<String>) -> Self {
        Self {
            document_type: Some(document_type.into()),
            augmentation: None,
        }
    }
}

/// One persisted embedding with its identity and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Unique id, monotonic per build run.
    pub id: String,
    /// Fixed-length embedding vector.
    pub embedding: Vec<f32>,
    /// Label metadata.
    pub metadata: RecordMetadata,
}

/// A nearest neighbor returned from a query.
#[derive(Debug, Clone)]
pub struct Neighbor {
    /// Cosine distance to the query (smaller is more similar).
    pub distance: f32,
    /// The stored record's metadata.
    pub metadata: RecordMetadata,
}

// HNSW construction parameters. Collections here hold at most a few
// thousand reference embeddings, so generous search quality is cheap.
const HNSW_MAX_CONNECTIONS: usize = 16;
const HNSW_MAX_LAYERS: usize = 16;
const HNSW_EF_CONSTRUCTION: usize = 200;
const HNSW_EF_SEARCH: usize = 24;
const HNSW_CAPACITY_HEADROOM: usize = 10_000;

/// A named, durable collection of labeled embeddings in cosine space.
pub struct Collection {
    name: String,
    path: PathBuf,
    records: Vec<IndexRecord>,
    hnsw: Hnsw<'static, f32, DistCosine>,
}

impl Collection {
    /// Open an existing collection under the database root. Fails when the
    /// record log does not exist; the serving path never creates
    /// collections.
    pub fn open(db_root: &Path, name: &str) -> Result<Self, IndexError> {
        let path = Self::log_path(db_root, name);
        if !path.exists() {
            return Err(IndexError::CollectionNotFound(name.to_string()));
        }
        Self::load(path, name)
    }

    /// Open a collection, creating an empty one when missing. Used by the
    /// offline builder.
    pub fn create_or_open(db_root: &Path, name: &str) -> Result<Self, IndexError> {
        let path = Self::log_path(db_root, name);
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| IndexError::Load(format!("create {}: {}", parent.display(), e)))?;
            }
            File::create(&path).map_err(|e| IndexError::Load(e.to_string()))?;
            info!("Created collection '{}' at {}", name, path.display());
        }
        Self::load(path, name)
    }

    fn log_path(db_root: &Path, name: &str) -> PathBuf {
        db_root.join(format!("{}.jsonl", name))
    }

    fn load(path: PathBuf, name: &str) -> Result<Self, IndexError> {
        let file = File::open(&path).map_err(|e| IndexError::Load(e.to_string()))?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| IndexError::Load(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<IndexRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        "Skipping malformed record at {}:{}: {}",
                        path.display(),
                        line_no + 1,
                        e
                    );
                }
            }
        }

        let hnsw = Hnsw::<f32, DistCosine>::new(
            HNSW_MAX_CONNECTIONS,
            records.len() + HNSW_CAPACITY_HEADROOM,
            HNSW_MAX_LAYERS,
            HNSW_EF_CONSTRUCTION,
            DistCosine {},
        );
        for (data_id, record) in records.iter().enumerate() {
            hnsw.insert_slice((&record.embedding, data_id));
        }

        info!(
            "Opened collection '{}' with {} records",
            name,
            records.len()
        );

        Ok(Self {
            name: name.to_string(),
            path,
            records,
            hnsw,
        })
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no records are stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids already present, for uniqueness checks.
    pub fn ids(&self) -> HashSet<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }

    /// Return up to `k` nearest neighbors of `vector` by cosine distance.
    pub fn query(&self, vector: &[f32], k: usize) -> Vec<Neighbor> {
        if self.records.is_empty() || k == 0 {
            return Vec::new();
        }

        let ef_search = HNSW_EF_SEARCH.max(k);
        let neighbours = self.hnsw.search(vector, k, ef_search);

        neighbours
            .into_iter()
            .filter_map(|n| {
                self.records.get(n.d_id).map(|record| Neighbor {
                    distance: n.distance,
                    metadata: record.metadata.clone(),
                })
            })
            .collect()
    }

    /// Append a batch of records to the log and the graph. The log write is
    /// flushed before the call returns; a crash after `insert` never loses
    /// acknowledged records.
    pub fn insert(&mut self, batch: Vec<IndexRecord>) -> Result<(), IndexError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| IndexError::Insert(e.to_string()))?;

        for record in &batch {
            let line =
                serde_json::to_string(record).map_err(|e| IndexError::Insert(e.to_string()))?;
            writeln!(file, "{}", line).map_err(|e| IndexError::Insert(e.to_string()))?;
        }
        file.flush().map_err(|e| IndexError::Insert(e.to_string()))?;

        for record in batch {
            let data_id = self.records.len();
            self.hnsw.insert_slice((&record.embedding, data_id));
            self.records.push(record);
        }

        debug!("Collection '{}' now holds {} records", self.name, self.records.len());
        Ok(())
    }
}
