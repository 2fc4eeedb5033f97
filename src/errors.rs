//src/errors.rs

use std::path::PathBuf;
use thiserror::Error;

use crate::types::Rank;

/// Fatal conditions. Everything recoverable (malformed report lines,
/// zero-denominator candidates) is skipped and tallied instead of raised.
#[derive(Debug, Error)]
pub enum BrackenError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report contains no root node (taxid 1)")]
    MissingRoot,

    #[error("taxon {taxid} at depth {depth} has no valid ancestor in the report")]
    InconsistentHierarchy { taxid: String, depth: usize },

    #[error("no taxa at rank {rank} with at least {threshold} reads; nothing to estimate")]
    NoTaxaAboveThreshold { rank: Rank, threshold: u64 },
}

impl BrackenError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BrackenError::Io {
            path: path.into(),
            source,
        }
    }
}
