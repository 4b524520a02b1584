//! Vector index: persistent collections, the OCR checkpoint log, and the
//! offline corpus build pipeline.

mod builder;
mod checkpoint;
mod store;

pub use builder::{BuildReport, CorpusFile, EngineFactory, IndexBuilder};
pub use checkpoint::{CheckpointEntry, CheckpointLog};
pub use store::{Collection, IndexRecord, Neighbor, RecordMetadata};
