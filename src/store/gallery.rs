//! Gallery destination store: a bearer-token REST/JSON photo service.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::json;
use tokio_util::io::ReaderStream;

use super::http::{ApiClient, Auth};
use super::{
    DestinationAlbum, DestinationPhoto, DestinationStore, PhotoUpload, StoreError, Visibility,
};

pub struct GalleryStore {
    api: ApiClient,
    base_url: String,
}

impl GalleryStore {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let auth = token.map_or(Auth::Anonymous, Auth::Bearer);
        Ok(Self {
            api: ApiClient::new(auth, timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn album_url(&self, album: &DestinationAlbum) -> String {
        format!("{}/albums/{}", self.base_url, album.id)
    }
}

/// Tags travel as a single comma-separated form field.
fn join_tags(upload: &PhotoUpload) -> String {
    upload
        .tags
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl DestinationStore for GalleryStore {
    async fn list_albums(&self) -> Result<Vec<DestinationAlbum>, StoreError> {
        let url = format!("{}/albums", self.base_url);
        self.api.json(self.api.get(&url), &url).await
    }

    async fn create_album(
        &self,
        name: &str,
        visibility: Visibility,
    ) -> Result<DestinationAlbum, StoreError> {
        let url = format!("{}/albums", self.base_url);
        let body = json!({ "name": name, "visibility": visibility });
        self.api.json(self.api.post(&url).json(&body), &url).await
    }

    async fn update_album_visibility(
        &self,
        album: &DestinationAlbum,
        visibility: Visibility,
    ) -> Result<DestinationAlbum, StoreError> {
        let url = self.album_url(album);
        let body = json!({ "visibility": visibility });
        self.api.json(self.api.patch(&url).json(&body), &url).await
    }

    async fn list_photos(
        &self,
        album: &DestinationAlbum,
    ) -> Result<Vec<DestinationPhoto>, StoreError> {
        let url = format!("{}/photos", self.album_url(album));
        self.api.json(self.api.get(&url), &url).await
    }

    async fn upload_photo(
        &self,
        album: &DestinationAlbum,
        upload: &PhotoUpload,
        content: &Path,
    ) -> Result<(), StoreError> {
        let url = format!("{}/photos", self.album_url(album));
        let file = tokio::fs::File::open(content).await?;
        let length = file.metadata().await?.len();
        let file_name = content
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("photo")
            .to_string();

        let part = Part::stream_with_length(
            reqwest::Body::wrap_stream(ReaderStream::new(file)),
            length,
        )
        .file_name(file_name);
        let form = Form::new()
            .text("title", upload.title.clone())
            .text("summary", upload.summary.clone())
            .text("tags", join_tags(upload))
            .part("file", part);

        self.api
            .send(self.api.post(&url).multipart(form), &url)
            .await?;
        tracing::debug!(title = %upload.title, album = %album.name, "uploaded");
        Ok(())
    }
}
