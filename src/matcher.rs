use crate::chart::ChartEntry;
use crate::spotify::Catalog;
use anyhow::Result;
use tracing::info;

/// Checked in this order; the artist is cut at the earliest one found.
const FEATURING_MARKERS: [&str; 3] = ["feat.", "featuring", "ft."];
const SEARCH_LIMIT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogMatch {
    pub entry: ChartEntry,
    pub catalog_uri: Option<String>,
}

/// Drops trailing featured-artist clauses, which tend to break scoped searches.
pub fn normalize_artist(artist: &str) -> &str {
    let lowered = artist.to_ascii_lowercase();
    let cut = FEATURING_MARKERS
        .iter()
        .filter_map(|marker| lowered.find(marker))
        .min()
        .unwrap_or(artist.len());
    artist[..cut].trim()
}

pub fn scoped_query(title: &str, artist: &str) -> String {
    format!("track:{title} artist:{artist}")
}

/// Scoped "title + artist" search first, then a title-only search. The fallback
/// accepts whatever the catalog ranks first, so it can pick a different song
/// that shares the title.
pub async fn match_track<C>(catalog: &C, title: &str, artist: &str) -> Result<Option<String>>
where
    C: Catalog + ?Sized,
{
    let artist = normalize_artist(artist);

    let scoped = catalog
        .search_tracks(&scoped_query(title, artist), SEARCH_LIMIT)
        .await?;
    if let Some(track) = scoped.into_iter().next() {
        info!(name = %track.name, artist = track.primary_artist(), "found");
        return Ok(Some(track.uri));
    }

    let loose = catalog.search_tracks(title, SEARCH_LIMIT).await?;
    if let Some(track) = loose.into_iter().next() {
        info!(name = %track.name, artist = track.primary_artist(), "found close match");
        return Ok(Some(track.uri));
    }

    info!(%title, %artist, "could not find track");
    Ok(None)
}

pub async fn match_entry<C>(catalog: &C, entry: &ChartEntry) -> Result<CatalogMatch>
where
    C: Catalog + ?Sized,
{
    let catalog_uri = match_track(catalog, &entry.title, &entry.artist).await?;
    Ok(CatalogMatch {
        entry: entry.clone(),
        catalog_uri,
    })
}
