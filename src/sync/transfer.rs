//! Per-photo transfer: download into a staging file, upload, clean up.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::dedup::{canonical_title, summary};
use super::error::TransferError;
use crate::retry::{self, RetryAction, RetryPolicy};
use crate::store::{
    DestinationAlbum, DestinationStore, PhotoUpload, SourcePhoto, SourceStore, StoreError,
};

/// Local file name for a photo's staging copy.
///
/// Path separators become `_` so the name never points outside the staging
/// directory or implies creating subdirectories.
pub fn staging_name(filename: &str) -> String {
    let name: String = filename
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    match name.as_str() {
        "" | "." | ".." => format!("_{name}"),
        _ => name,
    }
}

/// Removes the staging file when dropped, on every exit path.
struct StagingFile {
    path: PathBuf,
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed staging file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Could not remove staging file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Moves photos from the source store into destination albums.
pub struct Transfer<'a> {
    source: &'a dyn SourceStore,
    destination: &'a dyn DestinationStore,
    staging_dir: &'a Path,
    retry: &'a RetryPolicy,
    dry_run: bool,
}

impl<'a> Transfer<'a> {
    pub fn new(
        source: &'a dyn SourceStore,
        destination: &'a dyn DestinationStore,
        staging_dir: &'a Path,
        retry: &'a RetryPolicy,
        dry_run: bool,
    ) -> Self {
        Self {
            source,
            destination,
            staging_dir,
            retry,
            dry_run,
        }
    }

    /// Transfer one photo into `album`.
    ///
    /// Download and upload are retried independently. The staging file is
    /// removed whether or not either step succeeds. In dry-run mode nothing
    /// is fetched, written or uploaded.
    pub async fn transfer(
        &self,
        photo: &SourcePhoto,
        album: &DestinationAlbum,
    ) -> Result<(), TransferError> {
        if self.dry_run {
            tracing::info!(
                "[DRY RUN] Would transfer {} as '{}' to '{}'",
                photo.filename_original,
                canonical_title(photo),
                album.name
            );
            return Ok(());
        }

        let path = self.staging_dir.join(staging_name(&photo.filename_original));
        let occupied = fs::try_exists(&path)
            .await
            .map_err(|e| TransferError::Staging {
                path: path.clone(),
                source: e,
            })?;
        if occupied {
            return Err(TransferError::StagingCollision(path));
        }

        let staging = StagingFile { path };
        let bytes = self.download(photo, &staging.path).await?;
        tracing::debug!(bytes, path = %staging.path.display(), "downloaded");
        self.upload(photo, album, &staging.path).await
    }

    async fn download(&self, photo: &SourcePhoto, path: &Path) -> Result<u64, TransferError> {
        let source = self.source;
        let label = format!("Download of {}", photo.filename_original);
        retry::retry_with_backoff(
            self.retry,
            &label,
            |e: &TransferError| {
                if e.is_retryable() {
                    RetryAction::Retry
                } else {
                    RetryAction::Abort
                }
            },
            || write_staging(source, photo, path),
        )
        .await
    }

    async fn upload(
        &self,
        photo: &SourcePhoto,
        album: &DestinationAlbum,
        path: &Path,
    ) -> Result<(), TransferError> {
        let destination = self.destination;
        let upload = PhotoUpload {
            title: canonical_title(photo),
            summary: summary(photo),
            tags: photo.tags.clone(),
        };
        let upload = &upload;
        let label = format!("Upload of {}", upload.title);
        retry::retry_with_backoff(
            self.retry,
            &label,
            |e: &StoreError| {
                if e.is_retryable() {
                    RetryAction::Retry
                } else {
                    RetryAction::Abort
                }
            },
            || destination.upload_photo(album, upload, path),
        )
        .await
        .map_err(TransferError::Store)
    }
}

/// One download attempt. Truncates whatever an earlier attempt left behind.
async fn write_staging(
    source: &dyn SourceStore,
    photo: &SourcePhoto,
    path: &Path,
) -> Result<u64, TransferError> {
    let staging_err = |e: std::io::Error| TransferError::Staging {
        path: path.to_path_buf(),
        source: e,
    };

    let mut stream = source.fetch_content(photo).await?;
    let mut file = fs::File::create(path).await.map_err(staging_err)?;
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await.map_err(staging_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(staging_err)?;
    Ok(written)
}
