//! Dataset directory loader

use super::records::{
    AuthorRecord, PaintingRecord, ReferenceData, ReferenceRecord, SealMapping, SealRecord,
    SegmentSimilarityTable, StandardSealRecord,
};
use super::store::ReferenceStore;
use super::{ReferenceError, ReferenceResult};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

pub const PAINTINGS_FILE: &str = "paintings.json";
pub const SEALS_FILE: &str = "seals.json";
pub const STANDARD_SEALS_FILE: &str = "standard_seals.json";
pub const SEAL_MAPPING_FILE: &str = "seal_mapping.json";
pub const SEGMENT_SIMILARITY_FILE: &str = "segment_similarity.json";
pub const PAINTING_REFERENCES_FILE: &str = "painting_references.json";
pub const AUTHOR_FILE: &str = "author.json";

/// Read one JSON table; a missing file yields the default value
fn read_table<T>(dir: &Path, file: &str) -> ReferenceResult<T>
where
    T: DeserializeOwned + Default,
{
    let path = dir.join(file);
    if !path.exists() {
        debug!("{} not found, using empty table", path.display());
        return Ok(T::default());
    }
    let text = std::fs::read_to_string(&path).map_err(|source| ReferenceError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ReferenceError::Parse { path, source })
}

impl ReferenceStore {
    /// Load the dataset from a directory of JSON files
    pub fn load_dir(dir: impl AsRef<Path>) -> ReferenceResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ReferenceError::NotADirectory(dir.to_path_buf()));
        }

        let data = ReferenceData {
            paintings: read_table::<Vec<PaintingRecord>>(dir, PAINTINGS_FILE)?,
            seals: read_table::<Vec<SealRecord>>(dir, SEALS_FILE)?,
            standard_seals: read_table::<Vec<StandardSealRecord>>(dir, STANDARD_SEALS_FILE)?,
            seal_mapping: read_table::<Vec<SealMapping>>(dir, SEAL_MAPPING_FILE)?,
            segment_similarity: read_table::<SegmentSimilarityTable>(dir, SEGMENT_SIMILARITY_FILE)?,
            painting_references: read_table::<BTreeMap<String, Vec<ReferenceRecord>>>(
                dir,
                PAINTING_REFERENCES_FILE,
            )?,
            author: read_table::<AuthorRecord>(dir, AUTHOR_FILE)?,
        };

        let store = ReferenceStore::from_data(data);
        info!(
            "Loaded reference dataset from {}: {} paintings, {} seals, {} standard seals",
            dir.display(),
            store.painting_count(),
            store.seal_count(),
            store.standard_seal_count()
        );
        Ok(store)
    }
}
