//! Trovebox source store.
//!
//! Talks to the Trovebox JSON API. Every response is wrapped in a
//! `{code, message, result}` envelope whose `code` mirrors an HTTP status.

use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use reqwest::{RequestBuilder, Url};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::http::{decode, ApiClient, Auth};
use super::oauth::OAuthCredentials;
use super::{ContentStream, SourceAlbum, SourcePhoto, SourceStore, StoreError};

pub struct TroveboxStore {
    api: ApiClient,
    base_url: Url,
}

impl TroveboxStore {
    /// API requests are OAuth-signed when `credentials` are given and sent
    /// anonymously otherwise, which only reaches public photos.
    pub fn new(
        host: &str,
        credentials: Option<OAuthCredentials>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let base_url = Url::parse(&base_url(host))
            .with_context(|| format!("Invalid Trovebox host '{host}'"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Invalid Trovebox host '{host}'");
        }
        let auth = credentials.map_or(Auth::Anonymous, Auth::OAuth1);
        Ok(Self {
            api: ApiClient::new(auth, timeout)?,
            base_url,
        })
    }

    /// `{base}/{segments}?pageSize=N`, each segment percent-encoded.
    /// List options such as the album filter travel as path segments.
    fn endpoint(&self, segments: &[&str], page_size: u32) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.query_pairs_mut()
            .append_pair("pageSize", &page_size.to_string());
        url
    }

    fn photos_url(&self, album_id: Option<&str>, page_size: u32) -> Url {
        match album_id {
            Some(id) => {
                let filter = format!("album-{id}");
                self.endpoint(&["photos", &filter, "list.json"], page_size)
            }
            None => self.endpoint(&["photos", "list.json"], page_size),
        }
    }

    /// Originals are often served from another host (a CDN or bucket), which
    /// must never see the API credentials.
    fn content_request(&self, url: &str) -> RequestBuilder {
        if self.is_api_host(url) {
            self.api.get(url)
        } else {
            self.api.get_anonymous(url)
        }
    }

    fn is_api_host(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|u| {
            u.scheme() == self.base_url.scheme()
                && u.host_str() == self.base_url.host_str()
                && u.port_or_known_default() == self.base_url.port_or_known_default()
        })
    }

    async fn envelope<T: serde::de::DeserializeOwned>(
        &self,
        url: &Url,
    ) -> Result<Option<T>, StoreError> {
        let url = url.as_str();
        let response = self.api.send(self.api.get(url), url).await?;
        let body = response.bytes().await.map_err(|e| StoreError::Connection {
            source: e,
            url: url.to_string(),
        })?;
        unwrap_envelope(decode(&body, url)?, url)
    }
}

/// Accept bare hostnames as well as full URLs.
fn base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: u16,
    #[serde(default)]
    message: String,
    result: Option<T>,
}

fn unwrap_envelope<T>(envelope: Envelope<T>, url: &str) -> Result<Option<T>, StoreError> {
    if !(200..300).contains(&envelope.code) {
        tracing::debug!(url, code = envelope.code, message = %envelope.message, "API error");
        return Err(StoreError::from_status(envelope.code, url));
    }
    Ok(envelope.result)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumRecord {
    id: String,
    name: String,
    #[serde(default, deserialize_with = "unix_seconds")]
    date_last_photo_added: Option<i64>,
}

impl From<AlbumRecord> for SourceAlbum {
    fn from(rec: AlbumRecord) -> Self {
        let date_last_photo_added = rec
            .date_last_photo_added
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        SourceAlbum {
            id: rec.id,
            name: rec.name,
            date_last_photo_added,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotoRecord {
    id: String,
    filename_original: String,
    path_original: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    albums: Vec<String>,
}

impl From<PhotoRecord> for SourcePhoto {
    fn from(rec: PhotoRecord) -> Self {
        SourcePhoto {
            id: rec.id,
            filename_original: rec.filename_original,
            path_original: rec.path_original,
            title: rec.title,
            description: rec.description,
            tags: rec.tags.into_iter().collect::<BTreeSet<_>>(),
            albums: rec.albums,
        }
    }
}

/// Trovebox sends timestamps either as numbers or as numeric strings.
fn unix_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

#[async_trait]
impl SourceStore for TroveboxStore {
    async fn list_albums(&self) -> Result<Vec<SourceAlbum>, StoreError> {
        let url = self.endpoint(&["albums", "list.json"], 0);
        let albums: Option<Vec<AlbumRecord>> = self.envelope(&url).await?;
        Ok(albums
            .unwrap_or_default()
            .into_iter()
            .map(SourceAlbum::from)
            .collect())
    }

    async fn list_photos(
        &self,
        album_id: Option<&str>,
        page_size: u32,
    ) -> Result<Vec<SourcePhoto>, StoreError> {
        let url = self.photos_url(album_id, page_size);
        let photos: Option<Vec<PhotoRecord>> = self.envelope(&url).await?;
        Ok(photos
            .unwrap_or_default()
            .into_iter()
            .map(SourcePhoto::from)
            .collect())
    }

    async fn fetch_content(&self, photo: &SourcePhoto) -> Result<ContentStream, StoreError> {
        let url = photo.path_original.clone();
        let response = self.api.send(self.content_request(&url), &url).await?;
        let stream = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| StoreError::Connection {
                source: e,
                url: url.clone(),
            })
        });
        Ok(stream.boxed())
    }
}
