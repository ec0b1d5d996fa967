//! In-memory source and destination store for tests.
//!
//! One [`MemoryStore`] plays both roles and records every call so tests can
//! assert on network behaviour (what was listed, created, fetched, uploaded).

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use futures_util::stream::{self, StreamExt};

use super::{
    ContentStream, DestinationAlbum, DestinationPhoto, DestinationStore, PhotoUpload, SourceAlbum,
    SourcePhoto, SourceStore, StoreError, Visibility,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    ListSourceAlbums,
    ListSourcePhotos(Option<String>),
    FetchContent(String),
    ListAlbums,
    CreateAlbum(String, Visibility),
    UpdateVisibility(String, Visibility),
    ListPhotos(String),
    Upload { album: String, title: String },
}

/// An injected failure, turned into a fresh [`StoreError`] when consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    Transient,
    NotFound,
    Auth,
    Malformed,
    /// Content stream yields one chunk, then a transient error.
    BrokenStream,
}

impl Fault {
    fn to_error(self) -> StoreError {
        match self {
            Fault::Transient | Fault::BrokenStream => StoreError::from_status(503, "memory://"),
            Fault::NotFound => StoreError::from_status(404, "memory://"),
            Fault::Auth => StoreError::from_status(401, "memory://"),
            Fault::Malformed => StoreError::unexpected("memory://", "bad payload"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Uploaded {
    pub album: String,
    pub upload: PhotoUpload,
    pub content: Vec<u8>,
}

#[derive(Default)]
struct State {
    source_albums: Vec<SourceAlbum>,
    source_photos: Vec<SourcePhoto>,
    dest_albums: Vec<DestinationAlbum>,
    dest_photos: HashMap<String, Vec<DestinationPhoto>>,
    uploads: Vec<Uploaded>,
    calls: Vec<Call>,
    fetch_faults: VecDeque<Fault>,
    upload_faults: VecDeque<Fault>,
    album_listing_faults: HashMap<String, Fault>,
    list_albums_fault: Option<Fault>,
    /// Destination photo listing faults, keyed by album name.
    dest_listing_faults: HashMap<String, Fault>,
    /// Called with the number of uploads so far after each successful upload.
    after_upload: Option<Arc<dyn Fn(usize) + Send + Sync>>,
    /// Visibility the store forces onto new albums regardless of the request.
    create_visibility_override: Option<Visibility>,
    next_id: u32,
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<State>,
}

pub(crate) fn photo(id: &str, filename: &str, albums: &[&str]) -> SourcePhoto {
    SourcePhoto {
        id: id.to_string(),
        filename_original: filename.to_string(),
        path_original: format!("memory://{id}/{filename}"),
        title: None,
        description: None,
        tags: BTreeSet::new(),
        albums: albums.iter().map(|a| a.to_string()).collect(),
    }
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn with_album(self, id: &str, name: &str, last_added: i64) -> Self {
        self.lock().source_albums.push(SourceAlbum {
            id: id.to_string(),
            name: name.to_string(),
            date_last_photo_added: Utc.timestamp_opt(last_added, 0).unwrap(),
        });
        self
    }

    pub(crate) fn with_photo(self, photo: SourcePhoto) -> Self {
        self.lock().source_photos.push(photo);
        self
    }

    pub(crate) fn with_dest_album(self, name: &str, visibility: Visibility) -> Self {
        {
            let mut state = self.lock();
            state.next_id += 1;
            let id = format!("d{}", state.next_id);
            state.dest_albums.push(DestinationAlbum {
                id: id.clone(),
                name: name.to_string(),
                visibility,
            });
            state.dest_photos.insert(id, Vec::new());
        }
        self
    }

    pub(crate) fn with_dest_photo(self, album_name: &str, title: &str) -> Self {
        {
            let mut state = self.lock();
            let album_id = state
                .dest_albums
                .iter()
                .find(|a| a.name == album_name)
                .map(|a| a.id.clone())
                .unwrap();
            state.next_id += 1;
            let id = format!("p{}", state.next_id);
            state
                .dest_photos
                .entry(album_id)
                .or_default()
                .push(DestinationPhoto {
                    id,
                    title: title.to_string(),
                });
        }
        self
    }

    pub(crate) fn fail_fetch(&self, faults: &[Fault]) {
        self.lock().fetch_faults.extend(faults.iter().copied());
    }

    pub(crate) fn fail_upload(&self, faults: &[Fault]) {
        self.lock().upload_faults.extend(faults.iter().copied());
    }

    pub(crate) fn fail_album_listing(&self, album_id: &str, fault: Fault) {
        self.lock()
            .album_listing_faults
            .insert(album_id.to_string(), fault);
    }

    pub(crate) fn fail_list_albums(&self, fault: Fault) {
        self.lock().list_albums_fault = Some(fault);
    }

    pub(crate) fn fail_dest_listing(&self, album_name: &str, fault: Fault) {
        self.lock()
            .dest_listing_faults
            .insert(album_name.to_string(), fault);
    }

    pub(crate) fn after_upload(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        self.lock().after_upload = Some(Arc::new(hook));
    }

    pub(crate) fn force_create_visibility(&self, visibility: Visibility) {
        self.lock().create_visibility_override = Some(visibility);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub(crate) fn uploads(&self) -> Vec<Uploaded> {
        self.lock().uploads.clone()
    }

    pub(crate) fn dest_albums(&self) -> Vec<DestinationAlbum> {
        self.lock().dest_albums.clone()
    }

    pub(crate) fn content_of(id: &str) -> Vec<u8> {
        format!("bytes-of-{id}").into_bytes()
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn list_albums(&self) -> Result<Vec<SourceAlbum>, StoreError> {
        let mut state = self.lock();
        state.calls.push(Call::ListSourceAlbums);
        Ok(state.source_albums.clone())
    }

    async fn list_photos(
        &self,
        album_id: Option<&str>,
        _page_size: u32,
    ) -> Result<Vec<SourcePhoto>, StoreError> {
        let mut state = self.lock();
        state
            .calls
            .push(Call::ListSourcePhotos(album_id.map(str::to_string)));
        if let Some(id) = album_id {
            if let Some(fault) = state.album_listing_faults.get(id) {
                return Err(fault.to_error());
            }
        }
        Ok(state
            .source_photos
            .iter()
            .filter(|p| album_id.map_or(true, |id| p.albums.iter().any(|a| a == id)))
            .cloned()
            .collect())
    }

    async fn fetch_content(&self, photo: &SourcePhoto) -> Result<ContentStream, StoreError> {
        let mut state = self.lock();
        state.calls.push(Call::FetchContent(photo.id.clone()));
        let content = Self::content_of(&photo.id);
        match state.fetch_faults.pop_front() {
            None => Ok(stream::iter(vec![Ok(Bytes::from(content))]).boxed()),
            Some(Fault::BrokenStream) => {
                let first = Bytes::from(content[..content.len() / 2].to_vec());
                Ok(stream::iter(vec![Ok(first), Err(Fault::BrokenStream.to_error())]).boxed())
            }
            Some(fault) => Err(fault.to_error()),
        }
    }
}

#[async_trait]
impl DestinationStore for MemoryStore {
    async fn list_albums(&self) -> Result<Vec<DestinationAlbum>, StoreError> {
        let mut state = self.lock();
        state.calls.push(Call::ListAlbums);
        if let Some(fault) = state.list_albums_fault {
            return Err(fault.to_error());
        }
        Ok(state.dest_albums.clone())
    }

    async fn create_album(
        &self,
        name: &str,
        visibility: Visibility,
    ) -> Result<DestinationAlbum, StoreError> {
        let mut state = self.lock();
        state
            .calls
            .push(Call::CreateAlbum(name.to_string(), visibility));
        state.next_id += 1;
        let album = DestinationAlbum {
            id: format!("d{}", state.next_id),
            name: name.to_string(),
            visibility: state.create_visibility_override.unwrap_or(visibility),
        };
        state.dest_albums.push(album.clone());
        state.dest_photos.insert(album.id.clone(), Vec::new());
        Ok(album)
    }

    async fn update_album_visibility(
        &self,
        album: &DestinationAlbum,
        visibility: Visibility,
    ) -> Result<DestinationAlbum, StoreError> {
        let mut state = self.lock();
        state
            .calls
            .push(Call::UpdateVisibility(album.name.clone(), visibility));
        let stored = state
            .dest_albums
            .iter_mut()
            .find(|a| a.id == album.id)
            .ok_or_else(|| StoreError::NotFound(album.id.clone()))?;
        stored.visibility = visibility;
        Ok(stored.clone())
    }

    async fn list_photos(
        &self,
        album: &DestinationAlbum,
    ) -> Result<Vec<DestinationPhoto>, StoreError> {
        let mut state = self.lock();
        state.calls.push(Call::ListPhotos(album.name.clone()));
        if let Some(fault) = state.dest_listing_faults.get(&album.name) {
            return Err(fault.to_error());
        }
        state
            .dest_photos
            .get(&album.id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(album.id.clone()))
    }

    async fn upload_photo(
        &self,
        album: &DestinationAlbum,
        upload: &PhotoUpload,
        content: &Path,
    ) -> Result<(), StoreError> {
        let bytes = std::fs::read(content)?;
        let mut state = self.lock();
        state.calls.push(Call::Upload {
            album: album.name.clone(),
            title: upload.title.clone(),
        });
        if let Some(fault) = state.upload_faults.pop_front() {
            return Err(fault.to_error());
        }
        state.next_id += 1;
        let id = format!("p{}", state.next_id);
        state
            .dest_photos
            .entry(album.id.clone())
            .or_default()
            .push(DestinationPhoto {
                id,
                title: upload.title.clone(),
            });
        state.uploads.push(Uploaded {
            album: album.name.clone(),
            upload: upload.clone(),
            content: bytes,
        });
        let count = state.uploads.len();
        let hook = state.after_upload.clone();
        drop(state);
        if let Some(hook) = hook {
            hook(count);
        }
        Ok(())
    }
}
