//! Reference dataset
//!
//! The immutable catalogue every session reads from: paintings, observed seals,
//! standard seals, seal mappings, segment similarity scores, citations and the
//! author record.

pub mod loader;
pub mod records;
pub mod store;

pub use records::{
    AuthorRecord, PaintingRecord, ReferenceData, ReferenceRecord, SealMapping, SealRecord,
    SegmentSimilarityTable, StandardSealRecord, DEFAULT_AUTHOR_ID,
};
pub use store::{
    base_painting_id, ReferenceStore, SegmentMatch, SimilarityRange, StandardSealMatch,
};

use std::path::PathBuf;
use thiserror::Error;

/// Reference dataset errors
#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Dataset path {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type ReferenceResult<T> = Result<T, ReferenceError>;
