//! Photo store abstractions.
//!
//! The sync engine only ever talks to a [`SourceStore`] and a
//! [`DestinationStore`]. Concrete HTTP implementations live in
//! [`trovebox`] (source) and [`gallery`] (destination).

pub mod error;
pub mod gallery;
mod http;
#[cfg(test)]
pub(crate) mod memory;
pub mod oauth;
pub mod trovebox;

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use error::StoreError;

/// Page size that asks the source for every matching photo in one logical fetch.
pub const ALL_PHOTOS: u32 = 0;

/// Streamed photo content as delivered by the source store.
pub type ContentStream = BoxStream<'static, Result<Bytes, StoreError>>;

/// A photo as it exists in the source store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePhoto {
    pub id: String,
    pub filename_original: String,
    pub path_original: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeSet<String>,
    /// Ids of the source albums this photo belongs to. Empty for loose photos.
    pub albums: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAlbum {
    pub id: String,
    pub name: String,
    /// Only used to order albums during a run.
    pub date_last_photo_added: DateTime<Utc>,
}

/// Who can see a destination album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DestinationAlbum {
    pub id: String,
    pub name: String,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DestinationPhoto {
    pub id: String,
    pub title: String,
}

/// Metadata sent along with the content of an uploaded photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoUpload {
    pub title: String,
    pub summary: String,
    pub tags: BTreeSet<String>,
}

/// Read side of the migration.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn list_albums(&self) -> Result<Vec<SourceAlbum>, StoreError>;

    /// List photos, restricted to one album when `album_id` is given.
    /// A `page_size` of [`ALL_PHOTOS`] returns every match at once.
    async fn list_photos(
        &self,
        album_id: Option<&str>,
        page_size: u32,
    ) -> Result<Vec<SourcePhoto>, StoreError>;

    async fn fetch_content(&self, photo: &SourcePhoto) -> Result<ContentStream, StoreError>;
}

/// Write side of the migration.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    async fn list_albums(&self) -> Result<Vec<DestinationAlbum>, StoreError>;

    async fn create_album(
        &self,
        name: &str,
        visibility: Visibility,
    ) -> Result<DestinationAlbum, StoreError>;

    /// Change an album's visibility, returning the album as the store now sees it.
    async fn update_album_visibility(
        &self,
        album: &DestinationAlbum,
        visibility: Visibility,
    ) -> Result<DestinationAlbum, StoreError>;

    async fn list_photos(
        &self,
        album: &DestinationAlbum,
    ) -> Result<Vec<DestinationPhoto>, StoreError>;

    /// Upload the file at `content` into `album`.
    async fn upload_photo(
        &self,
        album: &DestinationAlbum,
        upload: &PhotoUpload,
        content: &Path,
    ) -> Result<(), StoreError>;
}
