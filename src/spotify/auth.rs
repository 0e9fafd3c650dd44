//! OAuth authorization-code flow against the Spotify accounts service.
//!
//! The token is cached as JSON (spotipy's `.spotifycache` layout) so a cache
//! produced on a machine with a browser can be copied to a headless one.

use super::client::SpotifyClient;
use super::{Catalog, PLAYLIST_SCOPE};
use crate::config::Credentials;
use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use rand::distr::{Alphanumeric, SampleString};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, warn};

pub const DEFAULT_ACCOUNTS_BASE_URL: &str = "https://accounts.spotify.com/";
pub const DEFAULT_TOKEN_CACHE: &str = ".spotifycache";

const EXPIRY_MARGIN_SECONDS: i64 = 60;
const STATE_LENGTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
    pub expires_at: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenInfo {
    pub const fn is_expired(&self, now: i64) -> bool {
        self.expires_at - now < EXPIRY_MARGIN_SECONDS
    }

    /// Every scope in the space-separated `required` list was granted.
    pub fn covers_scope(&self, required: &str) -> bool {
        required
            .split_whitespace()
            .all(|needed| self.scope.split_whitespace().any(|granted| granted == needed))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: i64,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_token(self, now: i64, previous_refresh: Option<String>) -> TokenInfo {
        TokenInfo {
            access_token: self.access_token,
            token_type: self.token_type,
            expires_in: self.expires_in,
            scope: self.scope.unwrap_or_else(|| PLAYLIST_SCOPE.to_string()),
            expires_at: now + self.expires_in,
            refresh_token: self.refresh_token.or(previous_refresh),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthOptions {
    pub headless: bool,
    pub cache_path: PathBuf,
    pub accounts_base_url: String,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            headless: false,
            cache_path: PathBuf::from(DEFAULT_TOKEN_CACHE),
            accounts_base_url: DEFAULT_ACCOUNTS_BASE_URL.to_string(),
        }
    }
}

pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub async fn load(&self) -> Result<Option<TokenInfo>> {
        if !self.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read token cache {}", self.path.display()))?;
        let token = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse token cache {}", self.path.display()))?;
        debug!(path = %self.path.display(), "loaded token cache");
        Ok(Some(token))
    }

    pub async fn save(&self, token: &TokenInfo) -> Result<()> {
        let json = serde_json::to_vec(token).context("failed to serialize token cache")?;
        fs::write(&self.path, json)
            .await
            .with_context(|| format!("failed to write token cache {}", self.path.display()))?;
        debug!(path = %self.path.display(), "saved token cache");
        Ok(())
    }
}

pub struct OAuthFlow<'a> {
    http: &'a Client,
    credentials: &'a Credentials,
    accounts_base_url: Url,
}

impl<'a> OAuthFlow<'a> {
    pub fn new(
        http: &'a Client,
        credentials: &'a Credentials,
        accounts_base_url: &str,
    ) -> Result<Self> {
        let accounts_base_url = Url::parse(accounts_base_url)
            .with_context(|| format!("invalid accounts base URL {accounts_base_url}"))?;
        Ok(Self {
            http,
            credentials,
            accounts_base_url,
        })
    }

    pub fn authorize_url(&self, state: &str) -> Result<Url> {
        let mut url = self
            .accounts_base_url
            .join("authorize")
            .context("failed to build authorize URL")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.credentials.redirect_uri)
            .append_pair("scope", PLAYLIST_SCOPE)
            .append_pair("state", state);
        Ok(url)
    }

    pub async fn exchange_code(&self, code: &str, now: i64) -> Result<TokenInfo> {
        let response = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
            ])
            .await
            .context("failed to exchange authorization code")?;
        Ok(response.into_token(now, None))
    }

    pub async fn refresh(&self, refresh_token: &str, now: i64) -> Result<TokenInfo> {
        let response = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await
            .context("failed to refresh access token")?;
        Ok(response.into_token(now, Some(refresh_token.to_string())))
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let url = self
            .accounts_base_url
            .join("api/token")
            .context("failed to build token URL")?;
        let response = self
            .http
            .post(url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(form)
            .send()
            .await
            .context("token request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("token endpoint returned {status}: {body}");
        }
        response
            .json()
            .await
            .context("failed to parse token response")
    }
}

/// Produces a usable access token: cached, refreshed, or (interactive mode only)
/// freshly authorized through the browser.
pub async fn authorize(
    http: &Client,
    credentials: &Credentials,
    options: &AuthOptions,
) -> Result<TokenInfo> {
    let cache = TokenCache::new(&options.cache_path);
    let flow = OAuthFlow::new(http, credentials, &options.accounts_base_url)?;

    if options.headless {
        info!("using headless authentication mode");
        if !cache.exists() {
            bail!(
                "token cache '{}' not found; run once on a machine with a browser, \
                 then copy the file next to this tool",
                cache.path().display()
            );
        }
    }

    let now = Utc::now().timestamp();
    if let Some(token) = load_cached_token(&cache, options.headless).await? {
        if !token.is_expired(now) {
            return Ok(token);
        }
        if let Some(refresh_token) = token.refresh_token.as_deref() {
            info!("cached access token expired; refreshing");
            match flow.refresh(refresh_token, now).await {
                Ok(refreshed) => {
                    cache.save(&refreshed).await?;
                    return Ok(refreshed);
                }
                Err(err) if options.headless => {
                    return Err(err.context(
                        "token could not be refreshed; \
                         generate a fresh cache on a machine with a browser",
                    ));
                }
                Err(err) => {
                    warn!(error = %err, "token refresh failed; starting a new authorization");
                }
            }
        } else if options.headless {
            bail!("cached token expired and carries no refresh token");
        }
    }

    let token = authorize_interactively(&flow).await?;
    cache.save(&token).await?;
    Ok(token)
}

/// Reads the cache and checks that it grants the playlist scope. A headless
/// run cannot re-authorize, so an unusable cache is an error there; otherwise
/// it is ignored with a warning and treated as absent.
async fn load_cached_token(cache: &TokenCache, headless: bool) -> Result<Option<TokenInfo>> {
    let token = match cache.load().await {
        Ok(token) => token,
        Err(err) if !headless => {
            warn!(error = %format!("{err:#}"), "ignoring unreadable token cache");
            return Ok(None);
        }
        Err(err) => return Err(err),
    };

    match token {
        Some(token) if !token.covers_scope(PLAYLIST_SCOPE) => {
            if headless {
                bail!(
                    "cached token grants '{}' but '{PLAYLIST_SCOPE}' is required; \
                     regenerate the cache on a machine with a browser",
                    token.scope
                );
            }
            warn!(scope = %token.scope, "cached token lacks the playlist scope; re-authorizing");
            Ok(None)
        }
        other => Ok(other),
    }
}

async fn authorize_interactively(flow: &OAuthFlow<'_>) -> Result<TokenInfo> {
    info!(redirect_uri = %flow.credentials.redirect_uri, "using redirect URI");
    info!("make sure this exact URI is listed in your Spotify app's redirect URIs");

    let state = Alphanumeric.sample_string(&mut rand::rng(), STATE_LENGTH);
    let authorize_url = flow.authorize_url(&state)?;
    if webbrowser::open(authorize_url.as_str()).is_err() {
        warn!("could not open a browser; visit the URL below manually");
    }
    println!("Authorize this tool by visiting:\n{authorize_url}");

    let redirected =
        tokio::task::spawn_blocking(|| prompt_line("Paste the URL you were redirected to: "))
            .await
            .context("authorization prompt panicked")??;
    let code = parse_redirect(&redirected, &state)?;
    flow.exchange_code(&code, Utc::now().timestamp()).await
}

fn prompt_line(prompt: &str) -> Result<String> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(prompt.as_bytes())
        .and_then(|()| stdout.flush())
        .context("failed to write prompt")?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read redirected URL")?;
    Ok(line.trim().to_string())
}

pub fn parse_redirect(redirected: &str, expected_state: &str) -> Result<String> {
    let url = Url::parse(redirected.trim())
        .with_context(|| format!("not a valid redirect URL: {redirected}"))?;
    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => bail!("authorization was denied: {value}"),
            _ => {}
        }
    }
    if state.as_deref() != Some(expected_state) {
        bail!("authorization state mismatch; start the authorization again");
    }
    code.filter(|code| !code.is_empty())
        .ok_or_else(|| anyhow!("redirect URL carries no authorization code"))
}

/// Authorizes, builds the one client used for the rest of the run, and checks
/// the session by asking who the current user is.
pub async fn connect(
    http: Client,
    credentials: &Credentials,
    options: &AuthOptions,
) -> Result<SpotifyClient> {
    let token = authorize(&http, credentials, options)
        .await
        .context("Spotify authorization failed")?;
    let client = SpotifyClient::new(http, token.access_token)?;
    match client.current_user().await {
        Ok(user) => {
            info!(
                user = %user.id,
                name = user.display_name.as_deref().unwrap_or("-"),
                "authenticated with Spotify"
            );
            Ok(client)
        }
        Err(err) => {
            if options.headless {
                error!("token may have expired and could not be refreshed automatically");
                error!("try generating a fresh token cache on a machine with a browser");
            }
            Err(err.context("Spotify authentication check failed"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> Credentials {
        Credentials {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_uri: "http://127.0.0.1:8888/callback".to_string(),
        }
    }

    fn token(expires_at: i64, refresh_token: Option<&str>) -> TokenInfo {
        TokenInfo {
            access_token: "cached-access".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            scope: PLAYLIST_SCOPE.to_string(),
            expires_at,
            refresh_token: refresh_token.map(str::to_string),
        }
    }

    fn options(dir: &tempfile::TempDir, headless: bool, accounts: &str) -> AuthOptions {
        AuthOptions {
            headless,
            cache_path: dir.path().join(".spotifycache"),
            accounts_base_url: accounts.to_string(),
        }
    }

    #[test]
    fn authorize_url_carries_client_scope_and_state() {
        let http = Client::new();
        let credentials = credentials();
        let flow = OAuthFlow::new(&http, &credentials, DEFAULT_ACCOUNTS_BASE_URL).expect("flow");
        let url = flow.authorize_url("xyz").expect("url");

        assert_eq!(url.path(), "/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".to_string(), "client-id".to_string())));
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
        assert!(pairs.contains(&("scope".to_string(), PLAYLIST_SCOPE.to_string())));
        assert!(pairs.contains(&("state".to_string(), "xyz".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "http://127.0.0.1:8888/callback".to_string()
        )));
    }

    #[test]
    fn parse_redirect_extracts_code_and_checks_state() {
        let code = parse_redirect("http://127.0.0.1:8888/callback?code=abc123&state=s1", "s1")
            .expect("code");
        assert_eq!(code, "abc123");

        let callback = "http://127.0.0.1:8888/callback";
        assert!(parse_redirect(&format!("{callback}?code=abc&state=other"), "s1").is_err());
        assert!(parse_redirect(&format!("{callback}?error=access_denied&state=s1"), "s1").is_err());
        assert!(parse_redirect("not a url", "s1").is_err());
    }

    #[test]
    fn token_expiry_keeps_a_safety_margin() {
        let now = 1_700_000_000;
        assert!(!token(now + 3600, None).is_expired(now));
        assert!(token(now + 30, None).is_expired(now));
        assert!(token(now - 10, None).is_expired(now));
    }

    #[tokio::test]
    async fn headless_without_cache_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = authorize(
            &Client::new(),
            &credentials(),
            &options(&dir, true, DEFAULT_ACCOUNTS_BASE_URL),
        )
        .await
        .expect_err("missing cache must fail");

        assert!(err.to_string().contains("not found"), "{err}");
    }

    #[tokio::test]
    async fn valid_cached_token_is_reused() {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = options(&dir, true, DEFAULT_ACCOUNTS_BASE_URL);
        let cached = token(Utc::now().timestamp() + 3600, Some("refresh"));
        TokenCache::new(&options.cache_path)
            .save(&cached)
            .await
            .expect("saved");

        let loaded = authorize(&Client::new(), &credentials(), &options)
            .await
            .expect("cached token");

        assert_eq!(loaded, cached);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=old-refresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-access",
                "token_type": "Bearer",
                "expires_in": 3600,
                "scope": PLAYLIST_SCOPE
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let options = options(&dir, true, &format!("{}/", server.uri()));
        let cache = TokenCache::new(&options.cache_path);
        cache
            .save(&token(Utc::now().timestamp() - 100, Some("old-refresh")))
            .await
            .expect("saved");

        let refreshed = authorize(&Client::new(), &credentials(), &options)
            .await
            .expect("refreshed");

        assert_eq!(refreshed.access_token, "fresh-access");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(cache.load().await.expect("load"), Some(refreshed));
    }

    #[tokio::test]
    async fn headless_refresh_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let options = options(&dir, true, &format!("{}/", server.uri()));
        TokenCache::new(&options.cache_path)
            .save(&token(Utc::now().timestamp() - 100, Some("revoked")))
            .await
            .expect("saved");

        let err = authorize(&Client::new(), &credentials(), &options)
            .await
            .expect_err("refresh fails");

        assert!(format!("{err:#}").contains("400"), "{err:#}");
    }

    #[tokio::test]
    async fn spotipy_cache_layout_is_readable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".spotifycache");
        std::fs::write(
            &path,
            r#"{
                "access_token": "a",
                "token_type": "Bearer",
                "expires_in": 3600,
                "scope": "playlist-modify-public playlist-modify-private",
                "expires_at": 1700003600,
                "refresh_token": "r"
            }"#,
        )
        .expect("write");

        let loaded = TokenCache::new(&path).load().await.expect("load").expect("token");

        assert_eq!(loaded.expires_at, 1_700_003_600);
        assert_eq!(loaded.refresh_token.as_deref(), Some("r"));
    }

    #[test]
    fn default_options_use_spotify_accounts_and_local_cache() {
        let options = AuthOptions::default();
        assert!(!options.headless);
        assert_eq!(options.cache_path, PathBuf::from(".spotifycache"));
        assert_eq!(options.accounts_base_url, "https://accounts.spotify.com/");
    }

    #[test]
    fn scope_check_ignores_order_and_extra_grants() {
        let mut token = token(0, None);
        token.scope = "user-read-email playlist-modify-private playlist-modify-public".to_string();
        assert!(token.covers_scope(PLAYLIST_SCOPE));

        token.scope = "playlist-modify-public".to_string();
        assert!(!token.covers_scope(PLAYLIST_SCOPE));

        token.scope = String::new();
        assert!(!token.covers_scope(PLAYLIST_SCOPE));
    }

    #[tokio::test]
    async fn corrupt_cache_is_ignored_interactively_but_fatal_headless() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(".spotifycache");
        std::fs::write(&path, "{not json").expect("write");
        let cache = TokenCache::new(&path);

        assert_eq!(load_cached_token(&cache, false).await.expect("ignored"), None);
        assert!(load_cached_token(&cache, true).await.is_err());
    }

    #[tokio::test]
    async fn narrow_scope_cache_is_ignored_interactively_but_fatal_headless() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = TokenCache::new(dir.path().join(".spotifycache"));
        let mut narrow = token(Utc::now().timestamp() + 3600, Some("refresh"));
        narrow.scope = "user-read-email".to_string();
        cache.save(&narrow).await.expect("saved");

        assert_eq!(load_cached_token(&cache, false).await.expect("ignored"), None);
        let err = load_cached_token(&cache, true)
            .await
            .expect_err("headless cannot re-authorize");
        assert!(err.to_string().contains("user-read-email"), "{err}");
    }

    #[tokio::test]
    async fn usable_cache_is_returned_in_both_modes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = TokenCache::new(dir.path().join(".spotifycache"));
        let cached = token(Utc::now().timestamp() + 3600, Some("refresh"));
        cache.save(&cached).await.expect("saved");

        assert_eq!(
            load_cached_token(&cache, false).await.expect("loaded"),
            Some(cached.clone())
        );
        assert_eq!(load_cached_token(&cache, true).await.expect("loaded"), Some(cached));
    }
}
