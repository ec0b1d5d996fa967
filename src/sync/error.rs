use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Failure of a single photo transfer.
///
/// Most variants only cost the photo at hand; [`TransferError::is_fatal`]
/// picks out the store failures that end the run.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("Refusing to overwrite existing staging file {}", .0.display())]
    StagingCollision(PathBuf),

    #[error("Staging file {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TransferError {
    pub fn is_retryable(&self) -> bool {
        match self {
            TransferError::Store(e) => e.is_retryable(),
            TransferError::StagingCollision(_) | TransferError::Staging { .. } => false,
        }
    }

    pub fn is_fatal(&self) -> bool {
        match self {
            TransferError::Store(e) => e.is_fatal(),
            TransferError::StagingCollision(_) | TransferError::Staging { .. } => false,
        }
    }
}
