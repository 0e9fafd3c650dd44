pub mod auth;
pub mod client;
#[cfg(test)]
pub mod fake;

pub use auth::AuthOptions;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

pub const PLAYLIST_SCOPE: &str = "playlist-modify-public playlist-modify-private";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogUser {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTrack {
    pub uri: String,
    pub name: String,
    pub artists: Vec<String>,
}

impl CatalogTrack {
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map_or("unknown artist", String::as_str)
    }
}

/// The catalog operations the matcher and the publisher rely on. Implemented by
/// [`client::SpotifyClient`] and by recording fakes in tests.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn current_user(&self) -> Result<CatalogUser>;

    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<CatalogTrack>>;

    /// Returns the id of the new playlist.
    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<String>;

    async fn replace_playlist_items(&self, playlist_id: &str, uris: &[String]) -> Result<()>;

    async fn change_playlist_details(
        &self,
        playlist_id: &str,
        name: &str,
        description: &str,
    ) -> Result<()>;

    async fn add_playlist_items(&self, playlist_id: &str, uris: &[String]) -> Result<()>;
}

pub fn playlist_url(playlist_id: &str) -> String {
    format!("https://open.spotify.com/playlist/{playlist_id}")
}
