use super::{Catalog, CatalogTrack, CatalogUser};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Search(String),
    CurrentUser,
    Create { user: String, name: String },
    Replace { playlist: String, uris: Vec<String> },
    Rename { playlist: String, name: String },
    Add { playlist: String, uris: Vec<String> },
}

/// In-memory catalog answering searches from a fixed table and recording
/// every call it receives.
#[derive(Default)]
pub struct FakeCatalog {
    results: HashMap<String, CatalogTrack>,
    failing_searches: Vec<String>,
    pub fail_replace: bool,
    pub fail_rename: bool,
    calls: Mutex<Vec<Call>>,
    add_times: Mutex<Vec<Instant>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, query: &str, uri: &str, name: &str, artist: &str) -> Self {
        self.results.insert(
            query.to_string(),
            CatalogTrack {
                uri: uri.to_string(),
                name: name.to_string(),
                artists: vec![artist.to_string()],
            },
        );
        self
    }

    pub fn with_failing_search(mut self, query: &str) -> Self {
        self.failing_searches.push(query.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn searches(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Search(query) => Some(query),
                _ => None,
            })
            .collect()
    }

    pub fn appended(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Add { uris, .. } => Some(uris),
                _ => None,
            })
            .collect()
    }

    pub fn add_times(&self) -> Vec<Instant> {
        self.add_times.lock().expect("times lock").clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn current_user(&self) -> Result<CatalogUser> {
        self.record(Call::CurrentUser);
        Ok(CatalogUser {
            id: "listener".to_string(),
            display_name: Some("Listener".to_string()),
        })
    }

    async fn search_tracks(&self, query: &str, _limit: u32) -> Result<Vec<CatalogTrack>> {
        self.record(Call::Search(query.to_string()));
        if self.failing_searches.iter().any(|failing| failing == query) {
            return Err(anyhow!("search backend unavailable"));
        }
        Ok(self.results.get(query).cloned().into_iter().collect())
    }

    async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        _description: &str,
        _public: bool,
    ) -> Result<String> {
        self.record(Call::Create {
            user: user_id.to_string(),
            name: name.to_string(),
        });
        Ok("new-playlist".to_string())
    }

    async fn replace_playlist_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        self.record(Call::Replace {
            playlist: playlist_id.to_string(),
            uris: uris.to_vec(),
        });
        if self.fail_replace {
            return Err(anyhow!("playlist not found"));
        }
        Ok(())
    }

    async fn change_playlist_details(
        &self,
        playlist_id: &str,
        name: &str,
        _description: &str,
    ) -> Result<()> {
        self.record(Call::Rename {
            playlist: playlist_id.to_string(),
            name: name.to_string(),
        });
        if self.fail_rename {
            return Err(anyhow!("not allowed"));
        }
        Ok(())
    }

    async fn add_playlist_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        self.record(Call::Add {
            playlist: playlist_id.to_string(),
            uris: uris.to_vec(),
        });
        self.add_times.lock().expect("times lock").push(Instant::now());
        Ok(())
    }
}
