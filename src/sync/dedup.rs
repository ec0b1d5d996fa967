//! Duplicate detection by canonical title.

use std::collections::HashSet;

use crate::store::{DestinationAlbum, DestinationStore, SourcePhoto, StoreError};

/// Title a source photo carries in the destination; the dedup key.
///
/// Always `<id>-<filename>` so albums filled by earlier runs keep matching.
pub fn canonical_title(photo: &SourcePhoto) -> String {
    format!("{}-{}", photo.id, photo.filename_original)
}

/// Title and description joined by a space, skipping absent or empty parts.
pub fn summary(photo: &SourcePhoto) -> String {
    [photo.title.as_deref(), photo.description.as_deref()]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Titles present in one destination album, listed once per album batch.
///
/// Immutable after the fetch; uploads made during the batch are not added.
#[derive(Debug, Default)]
pub struct TitleSnapshot {
    titles: HashSet<String>,
}

impl TitleSnapshot {
    pub async fn fetch(
        destination: &dyn DestinationStore,
        album: &DestinationAlbum,
    ) -> Result<Self, StoreError> {
        let photos = destination.list_photos(album).await?;
        tracing::debug!(album = %album.name, count = photos.len(), "listed destination photos");
        Ok(Self {
            titles: photos.into_iter().map(|p| p.title).collect(),
        })
    }

    pub fn already_transferred(&self, photo: &SourcePhoto) -> bool {
        self.titles.contains(&canonical_title(photo))
    }

    pub fn title_count(&self) -> usize {
        self.titles.len()
    }
}
