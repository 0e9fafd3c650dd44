use super::{Catalog, CatalogTrack, CatalogUser};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1/";
const HTTP_TIMEOUT_SECONDS: u64 = 20;

pub fn build_api_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("chartify/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
        .build()
        .context("failed to build Spotify HTTP client")
}

/// Spotify Web API client bound to one access token for the whole run.
pub struct SpotifyClient {
    http: Client,
    access_token: String,
    base_url: Url,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<TrackItem>,
}

#[derive(Debug, Deserialize)]
struct TrackItem {
    uri: String,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistItem>,
}

#[derive(Debug, Deserialize)]
struct ArtistItem {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl From<TrackItem> for CatalogTrack {
    fn from(item: TrackItem) -> Self {
        Self {
            uri: item.uri,
            name: item.name,
            artists: item.artists.into_iter().map(|artist| artist.name).collect(),
        }
    }
}

impl SpotifyClient {
    pub fn new(http: Client, access_token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(http, access_token, DEFAULT_API_BASE_URL)
    }

    pub fn with_base_url(
        http: Client,
        access_token: impl Into<String>,
        base_url: &str,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("invalid Spotify API base URL {base_url}"))?;
        Ok(Self {
            http,
            access_token: access_token.into(),
            base_url,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("Spotify API base URL cannot hold a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn ensure_success(response: Response, action: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .ok()
        .filter(|message| !message.is_empty())
        .unwrap_or(body);
    Err(anyhow!("Spotify API failed to {action}: {status} {detail}"))
}

#[async_trait]
impl Catalog for SpotifyClient {
    async fn current_user(&self) -> Result<CatalogUser> {
        let response = self
            .http
            .get(self.endpoint(&["me"])?)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("failed to request current Spotify user")?;
        ensure_success(response, "fetch the current user")
            .await?
            .json::<CatalogUser>()
            .await
            .context("failed to parse current Spotify user")
    }

    async fn search_tracks(&self, query: &str, limit: u32) -> Result<Vec<CatalogTrack>> {
        let limit = limit.to_string();
        let response = self
            .http
            .get(self.endpoint(&["search"])?)
            .bearer_auth(&self.access_token)
            .query(&[("q", query), ("type", "track"), ("limit", limit.as_str())])
            .send()
            .await
            .with_context(|| format!("failed to search Spotify for {query:?}"))?;
        let results: SearchResponse = ensure_success(response, "search tracks")
            .await?
            .json()
            .await
            .context("failed to parse Spotify search results")?;
        Ok(results
            .tracks
            .items
            .into_iter()
            .map(CatalogTrack::from)
            .collect())
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<String> {
        let response = self
            .http
            .post(self.endpoint(&["users", user_id, "playlists"])?)
            .bearer_auth(&self.access_token)
            .json(&json!({
                "name": name,
                "public": public,
                "description": description,
            }))
            .send()
            .await
            .context("failed to request playlist creation")?;
        let created: CreatedPlaylist = ensure_success(response, "create a playlist")
            .await?
            .json()
            .await
            .context("failed to parse created playlist")?;
        Ok(created.id)
    }

    async fn replace_playlist_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let response = self
            .http
            .put(self.endpoint(&["playlists", playlist_id, "tracks"])?)
            .bearer_auth(&self.access_token)
            .json(&json!({ "uris": uris }))
            .send()
            .await
            .with_context(|| format!("failed to request item replacement for {playlist_id}"))?;
        ensure_success(response, "replace playlist items").await?;
        Ok(())
    }

    async fn change_playlist_details(
        &self,
        playlist_id: &str,
        name: &str,
        description: &str,
    ) -> Result<()> {
        let response = self
            .http
            .put(self.endpoint(&["playlists", playlist_id])?)
            .bearer_auth(&self.access_token)
            .json(&json!({
                "name": name,
                "description": description,
            }))
            .send()
            .await
            .with_context(|| format!("failed to request detail change for {playlist_id}"))?;
        ensure_success(response, "change playlist details").await?;
        Ok(())
    }

    async fn add_playlist_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint(&["playlists", playlist_id, "tracks"])?)
            .bearer_auth(&self.access_token)
            .json(&json!({ "uris": uris }))
            .send()
            .await
            .with_context(|| format!("failed to request item append for {playlist_id}"))?;
        ensure_success(response, "add playlist items").await?;
        Ok(())
    }
}
