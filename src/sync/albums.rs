use std::collections::HashMap;

use crate::store::{DestinationAlbum, DestinationStore, StoreError, Visibility};

/// Maps album names to destination albums for the length of one run.
///
/// The destination is listed once up front; afterwards the cache is only
/// mutated by our own creations and visibility fixes, never re-queried.
pub struct AlbumResolver<'a> {
    destination: &'a dyn DestinationStore,
    visibility: Visibility,
    cache: HashMap<String, DestinationAlbum>,
    created: usize,
    corrected: usize,
}

impl<'a> AlbumResolver<'a> {
    pub async fn load(
        destination: &'a dyn DestinationStore,
        visibility: Visibility,
    ) -> Result<Self, StoreError> {
        let albums = destination.list_albums().await?;
        tracing::debug!(count = albums.len(), "listed destination albums");
        Ok(Self {
            destination,
            visibility,
            cache: albums.into_iter().map(|a| (a.name.clone(), a)).collect(),
            created: 0,
            corrected: 0,
        })
    }

    /// Return the album called `name`, creating it if needed, with its
    /// visibility matching the run's policy.
    pub async fn resolve(&mut self, name: &str) -> Result<DestinationAlbum, StoreError> {
        let album = match self.cache.get(name) {
            Some(album) if album.visibility == self.visibility => return Ok(album.clone()),
            Some(album) => {
                self.corrected += 1;
                album.clone()
            }
            None => {
                tracing::info!("  Creating album '{}'...", name);
                self.created += 1;
                self.destination.create_album(name, self.visibility).await?
            }
        };

        // The store may ignore the requested visibility on creation.
        let album = if album.visibility != self.visibility {
            tracing::info!(
                "  Changing visibility of '{}' from {} to {}",
                name,
                album.visibility,
                self.visibility
            );
            self.destination
                .update_album_visibility(&album, self.visibility)
                .await?
        } else {
            album
        };

        self.cache.insert(name.to_string(), album.clone());
        Ok(album)
    }

    pub fn created(&self) -> usize {
        self.created
    }

    /// Existing albums whose visibility had to be changed.
    pub fn corrected(&self) -> usize {
        self.corrected
    }
}
