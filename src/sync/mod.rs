//! Sync engine: walks source albums oldest-first, mirrors each into a
//! destination album of the same name, then sweeps up photos that belong to
//! no album into "Loose Photos".
//!
//! Nothing is persisted between runs. Each run re-lists both stores and
//! relies on canonical titles to skip photos an earlier run already moved.

pub mod albums;
pub mod dedup;
pub mod error;
pub mod transfer;

use std::collections::HashSet;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use self::albums::AlbumResolver;
use self::dedup::TitleSnapshot;
use self::transfer::Transfer;
use crate::retry::RetryPolicy;
use crate::store::{
    DestinationAlbum, DestinationStore, SourceAlbum, SourcePhoto, SourceStore, StoreError,
    Visibility, ALL_PHOTOS,
};

/// Destination album that receives photos without a source album.
pub const LOOSE_PHOTOS_ALBUM: &str = "Loose Photos";

/// Subset of application config consumed by the sync engine.
/// Decoupled from CLI parsing so the engine can be tested independently.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub visibility: Visibility,
    pub dry_run: bool,
    pub staging_dir: PathBuf,
    pub retry: RetryPolicy,
    pub no_progress_bar: bool,
}

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub albums: usize,
    pub photos_seen: usize,
    /// Photos uploaded, or that would have been in a dry run.
    pub transferred: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub loose_found: usize,
    pub albums_created: usize,
    pub albums_corrected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Done(SyncSummary),
    /// A shutdown signal stopped the run between two photos.
    Interrupted(SyncSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchOutcome {
    Completed,
    Interrupted,
}

/// Single-run orchestrator. Owns the per-run state: the "seen" source ids
/// and, through [`AlbumResolver`], the destination album cache.
pub struct SyncEngine<'a> {
    source: &'a dyn SourceStore,
    destination: &'a dyn DestinationStore,
    config: &'a SyncConfig,
    seen: HashSet<String>,
    summary: SyncSummary,
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        source: &'a dyn SourceStore,
        destination: &'a dyn DestinationStore,
        config: &'a SyncConfig,
    ) -> Self {
        Self {
            source,
            destination,
            config,
            seen: HashSet::new(),
            summary: SyncSummary::default(),
        }
    }

    /// Run the migration to completion, or until `shutdown` is cancelled.
    ///
    /// Per-photo failures are logged and counted. Store-level failures
    /// (listings, album creation, authentication, malformed payloads) abort
    /// the run with an error.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<SyncOutcome> {
        let started = Instant::now();

        if !self.config.dry_run {
            tokio::fs::create_dir_all(&self.config.staging_dir)
                .await
                .with_context(|| {
                    format!(
                        "Failed to create staging directory {}",
                        self.config.staging_dir.display()
                    )
                })?;
        }

        let config = self.config;
        let mut resolver = AlbumResolver::load(self.destination, config.visibility)
            .await
            .context("Failed to list destination albums")?;
        let transfer = Transfer::new(
            self.source,
            self.destination,
            &config.staging_dir,
            &config.retry,
            config.dry_run,
        );

        let albums = self.sorted_source_albums().await?;
        tracing::info!("Transferring {} albums...", albums.len());

        for album in &albums {
            if shutdown.is_cancelled()
                || self
                    .sync_album(album, &mut resolver, &transfer, &shutdown)
                    .await?
                    == BatchOutcome::Interrupted
            {
                self.summary.photos_seen = self.seen.len();
                return Ok(SyncOutcome::Interrupted(self.finish(&resolver, started)));
            }
        }
        self.summary.photos_seen = self.seen.len();

        tracing::info!("Looking for photos without an album...");
        let loose = self.remaining_photos().await?;
        self.summary.loose_found = loose.len();
        tracing::info!("Found {} loose photos", loose.len());

        if !loose.is_empty() && !shutdown.is_cancelled() {
            let album = resolver
                .resolve(LOOSE_PHOTOS_ALBUM)
                .await
                .with_context(|| format!("Failed to resolve album '{}'", LOOSE_PHOTOS_ALBUM))?;
            match self.snapshot(&album).await? {
                Some(snapshot) => {
                    if self
                        .transfer_batch(&loose, &album, &snapshot, &transfer, &shutdown)
                        .await?
                        == BatchOutcome::Interrupted
                    {
                        return Ok(SyncOutcome::Interrupted(self.finish(&resolver, started)));
                    }
                }
                None => {
                    tracing::warn!("{} loose photos not transferred", loose.len());
                    self.summary.failed += loose.len();
                }
            }
        }

        if shutdown.is_cancelled() {
            return Ok(SyncOutcome::Interrupted(self.finish(&resolver, started)));
        }
        Ok(SyncOutcome::Done(self.finish(&resolver, started)))
    }

    /// All source albums, oldest `date_last_photo_added` first. The sort is
    /// stable so ties keep the order the source returned them in.
    async fn sorted_source_albums(&self) -> Result<Vec<SourceAlbum>> {
        let mut albums = self
            .source
            .list_albums()
            .await
            .context("Failed to list source albums")?;
        albums.sort_by_key(|a| a.date_last_photo_added);
        Ok(albums)
    }

    async fn sync_album(
        &mut self,
        album: &SourceAlbum,
        resolver: &mut AlbumResolver<'_>,
        transfer: &Transfer<'_>,
        shutdown: &CancellationToken,
    ) -> Result<BatchOutcome> {
        if album.name.is_empty() {
            tracing::warn!(
                "Source album {} has no name, its photos are handled as loose photos",
                album.id
            );
            return Ok(BatchOutcome::Completed);
        }

        let photos = match self.source.list_photos(Some(&album.id), ALL_PHOTOS).await {
            Ok(photos) => photos,
            Err(StoreError::NotFound(what)) => {
                tracing::warn!("Album '{}' vanished, skipping: {}", album.name, what);
                return Ok(BatchOutcome::Completed);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to list photos of album '{}'", album.name))
            }
        };
        tracing::info!("Album '{}' ({} photos)...", album.name, photos.len());
        self.summary.albums += 1;

        let destination = resolver
            .resolve(&album.name)
            .await
            .with_context(|| format!("Failed to resolve destination album '{}'", album.name))?;

        match self.snapshot(&destination).await? {
            Some(snapshot) => {
                self.transfer_batch(&photos, &destination, &snapshot, transfer, shutdown)
                    .await
            }
            None => {
                // Still album members; keep them out of the loose sweep.
                self.summary.failed += photos.len();
                self.seen.extend(photos.into_iter().map(|p| p.id));
                Ok(BatchOutcome::Completed)
            }
        }
    }

    /// Titles already in `album`; `None` if the album disappeared meanwhile.
    async fn snapshot(&self, album: &DestinationAlbum) -> Result<Option<TitleSnapshot>> {
        match TitleSnapshot::fetch(self.destination, album).await {
            Ok(snapshot) => {
                tracing::debug!(
                    "  '{}' already holds {} photos",
                    album.name,
                    snapshot.title_count()
                );
                Ok(Some(snapshot))
            }
            Err(StoreError::NotFound(what)) => {
                tracing::warn!(
                    "Destination album '{}' vanished, skipping: {}",
                    album.name,
                    what
                );
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| {
                format!("Failed to list photos of destination album '{}'", album.name)
            }),
        }
    }

    async fn transfer_batch(
        &mut self,
        photos: &[SourcePhoto],
        album: &DestinationAlbum,
        snapshot: &TitleSnapshot,
        transfer: &Transfer<'_>,
        shutdown: &CancellationToken,
    ) -> Result<BatchOutcome> {
        let pb = create_progress_bar(self.config.no_progress_bar, photos.len() as u64);

        for photo in photos {
            if shutdown.is_cancelled() {
                pb.finish_and_clear();
                tracing::info!("Shutdown requested, stopping before {}", photo.filename_original);
                return Ok(BatchOutcome::Interrupted);
            }
            pb.set_message(photo.filename_original.clone());

            if snapshot.already_transferred(photo) {
                tracing::debug!(
                    "Skipping {}: already in '{}'",
                    photo.filename_original,
                    album.name
                );
                self.summary.duplicates += 1;
            } else {
                pb.suspend(|| tracing::info!("  Transferring {}...", photo.filename_original));
                match transfer.transfer(photo, album).await {
                    Ok(()) => self.summary.transferred += 1,
                    Err(e) if e.is_fatal() => {
                        pb.finish_and_clear();
                        return Err(e).with_context(|| {
                            format!("Aborting run: transfer of {} failed", photo.filename_original)
                        });
                    }
                    Err(e) => {
                        pb.suspend(|| {
                            tracing::error!(
                                "Transfer failed: {}: {}",
                                photo.filename_original,
                                e
                            )
                        });
                        self.summary.failed += 1;
                    }
                }
            }

            self.seen.insert(photo.id.clone());
            pb.inc(1);
        }

        pb.finish_and_clear();
        Ok(BatchOutcome::Completed)
    }

    /// Every source photo not visited while walking the albums.
    async fn remaining_photos(&self) -> Result<Vec<SourcePhoto>> {
        let photos = self
            .source
            .list_photos(None, ALL_PHOTOS)
            .await
            .context("Failed to list all source photos")?;
        Ok(photos
            .into_iter()
            .filter(|p| !self.seen.contains(&p.id))
            .collect())
    }

    fn finish(mut self, resolver: &AlbumResolver<'_>, started: Instant) -> SyncSummary {
        self.summary.albums_created = resolver.created();
        self.summary.albums_corrected = resolver.corrected();
        let s = &self.summary;

        if self.config.dry_run {
            tracing::info!("── Dry Run Summary ──");
            tracing::info!("  {} photos would be transferred", s.transferred);
        } else {
            tracing::info!("── Summary ──");
            tracing::info!(
                "  {} transferred, {} already present, {} failed",
                s.transferred,
                s.duplicates,
                s.failed
            );
        }
        tracing::info!(
            "  {} albums, {} created, {} visibility changes",
            s.albums,
            s.albums_created,
            s.albums_corrected
        );
        tracing::info!("  {} loose photos", s.loose_found);
        tracing::info!("  elapsed: {}", format_duration(started.elapsed()));

        self.summary
    }
}

/// Progress bar for one album batch.
///
/// Hidden when `--no-progress-bar` was passed or stdout is not a TTY so
/// piped output and cron logs stay clean.
fn create_progress_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    pb.set_style(style);
    pb
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
