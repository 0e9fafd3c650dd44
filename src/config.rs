use anyhow::{Result, anyhow};

pub const CLIENT_ID_VAR: &str = "SPOTIFY_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "SPOTIFY_CLIENT_SECRET";
pub const REDIRECT_URI_VAR: &str = "SPOTIFY_REDIRECT_URI";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

/// One place a configuration value may come from. Sources are consulted in the
/// order they are listed.
#[derive(Debug, Clone, Copy)]
pub enum ConfigSource<'a> {
    Cli(Option<&'a str>),
    Env(&'a str),
    Default(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CredentialOverrides<'a> {
    pub client_id: Option<&'a str>,
    pub client_secret: Option<&'a str>,
    pub redirect_uri: Option<&'a str>,
}

/// First present, non-blank value among `sources`.
pub fn resolve<F>(sources: &[ConfigSource<'_>], lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    sources.iter().find_map(|source| {
        let value = match *source {
            ConfigSource::Cli(value) => value.map(str::to_string),
            ConfigSource::Env(var) => lookup(var),
            ConfigSource::Default(value) => Some(value.to_string()),
        }?;
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

impl Credentials {
    /// Precedence per value: command-line flag, then environment, then default.
    pub fn resolve<F>(overrides: CredentialOverrides<'_>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client_id = resolve(
            &[
                ConfigSource::Cli(overrides.client_id),
                ConfigSource::Env(CLIENT_ID_VAR),
            ],
            &lookup,
        )
        .ok_or_else(|| missing("client id", "--client-id", CLIENT_ID_VAR))?;
        let client_secret = resolve(
            &[
                ConfigSource::Cli(overrides.client_secret),
                ConfigSource::Env(CLIENT_SECRET_VAR),
            ],
            &lookup,
        )
        .ok_or_else(|| missing("client secret", "--client-secret", CLIENT_SECRET_VAR))?;
        let redirect_uri = resolve(
            &[
                ConfigSource::Cli(overrides.redirect_uri),
                ConfigSource::Env(REDIRECT_URI_VAR),
                ConfigSource::Default(DEFAULT_REDIRECT_URI),
            ],
            &lookup,
        )
        .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
        })
    }

    pub fn from_env(overrides: CredentialOverrides<'_>) -> Result<Self> {
        Self::resolve(overrides, |var| std::env::var(var).ok())
    }
}

fn missing(what: &str, flag: &str, var: &str) -> anyhow::Error {
    anyhow!("missing Spotify {what}; pass {flag} or set {var} (a .env file works too)")
}
