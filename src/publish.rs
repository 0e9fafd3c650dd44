use crate::chart::ChartEntry;
use crate::formatting::{refreshed_playlist_description, refreshed_playlist_name};
use crate::matcher::match_entry;
use crate::spotify::Catalog;
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub const BATCH_SIZE: usize = 50;
pub const BATCH_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistTarget {
    New { name: String, description: String },
    Existing { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    pub playlist_id: String,
    pub matched: usize,
    pub total: usize,
}

/// Appends matched tracks in fixed-size batches, pausing after every full batch
/// to stay under the catalog's request rate.
#[derive(Debug, Clone, Copy)]
pub struct Publisher {
    batch_size: usize,
    pause: Duration,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new(BATCH_SIZE, BATCH_PAUSE)
    }
}

impl Publisher {
    pub const fn new(batch_size: usize, pause: Duration) -> Self {
        let batch_size = if batch_size == 0 { 1 } else { batch_size };
        Self { batch_size, pause }
    }

    pub async fn publish<C>(
        &self,
        catalog: &C,
        target: &PlaylistTarget,
        entries: &[ChartEntry],
        chart_name: &str,
        date: &str,
    ) -> Result<PublishSummary>
    where
        C: Catalog + ?Sized,
    {
        match target {
            PlaylistTarget::New { name, description } => {
                self.create_playlist(catalog, name, description, entries)
                    .await
            }
            PlaylistTarget::Existing { id } => {
                self.refresh_playlist(catalog, id, entries, chart_name, date)
                    .await
            }
        }
    }

    pub async fn create_playlist<C>(
        &self,
        catalog: &C,
        name: &str,
        description: &str,
        entries: &[ChartEntry],
    ) -> Result<PublishSummary>
    where
        C: Catalog + ?Sized,
    {
        let user = catalog
            .current_user()
            .await
            .context("failed to resolve the current Spotify user")?;
        let playlist_id = catalog
            .create_playlist(&user.id, name, description, true)
            .await
            .with_context(|| format!("failed to create playlist {name:?}"))?;
        info!(%name, id = %playlist_id, "created playlist");

        let matched = self.fill(catalog, &playlist_id, entries).await?;
        info!(matched, "playlist populated");
        Ok(PublishSummary {
            playlist_id,
            matched,
            total: entries.len(),
        })
    }

    /// Clears and relabels an existing playlist before refilling it. Nothing
    /// else is touched when the clear step fails.
    pub async fn refresh_playlist<C>(
        &self,
        catalog: &C,
        playlist_id: &str,
        entries: &[ChartEntry],
        chart_name: &str,
        date: &str,
    ) -> Result<PublishSummary>
    where
        C: Catalog + ?Sized,
    {
        info!(id = %playlist_id, "clearing existing tracks from playlist");
        catalog
            .replace_playlist_items(playlist_id, &[])
            .await
            .with_context(|| format!("failed to clear playlist {playlist_id}"))?;
        info!("playlist cleared");

        let name = refreshed_playlist_name(chart_name, date);
        let description = refreshed_playlist_description(chart_name, date);
        match catalog
            .change_playlist_details(playlist_id, &name, &description)
            .await
        {
            Ok(()) => info!(%name, "updated playlist name"),
            Err(err) => warn!(error = %err, "failed to update playlist details"),
        }

        let matched = self.fill(catalog, playlist_id, entries).await?;
        info!(matched, "playlist refreshed");
        Ok(PublishSummary {
            playlist_id: playlist_id.to_string(),
            matched,
            total: entries.len(),
        })
    }

    async fn fill<C>(&self, catalog: &C, playlist_id: &str, entries: &[ChartEntry]) -> Result<usize>
    where
        C: Catalog + ?Sized,
    {
        let mut buffer: Vec<String> = Vec::with_capacity(self.batch_size);
        let mut matched = 0;

        for entry in entries {
            let found = match match_entry(catalog, entry).await {
                Ok(found) => found,
                Err(err) => {
                    warn!(
                        title = %entry.title,
                        artist = %entry.artist,
                        error = %err,
                        "search failed; skipping entry"
                    );
                    continue;
                }
            };
            let Some(uri) = found.catalog_uri else {
                debug!(title = %found.entry.title, "left out of playlist");
                continue;
            };
            buffer.push(uri);
            matched += 1;

            if buffer.len() >= self.batch_size {
                self.append(catalog, playlist_id, &buffer).await?;
                buffer.clear();
                sleep(self.pause).await;
            }
        }

        if !buffer.is_empty() {
            self.append(catalog, playlist_id, &buffer).await?;
        }

        Ok(matched)
    }

    async fn append<C>(&self, catalog: &C, playlist_id: &str, uris: &[String]) -> Result<()>
    where
        C: Catalog + ?Sized,
    {
        catalog
            .add_playlist_items(playlist_id, uris)
            .await
            .with_context(|| format!("failed to add {} tracks to {playlist_id}", uris.len()))
    }
}
