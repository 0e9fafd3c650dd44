use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate, generate_to};

use crate::chart::DEFAULT_CHART;
use crate::dates::{DateChoice, parse_date};
use crate::spotify::auth::DEFAULT_TOKEN_CACHE;

pub const DEFAULT_OUTPUT_DIR: &str = ".";

pub const OUTPUT_HELP: &str = "Where the chart goes: a CSV file, the console, or a Spotify playlist.";
pub const PLAYLIST_ID_HELP: &str = "Existing Spotify playlist to clear, rename after the chart and date, and refill. Without it a new playlist is created.";
pub const HEADLESS_HELP: &str = "Never open a browser; requires a token cache created earlier on a machine with one.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    Csv,
    Print,
    Spotify,
}

#[derive(Debug, Parser)]
#[command(
    name = "chartify",
    about = "Scrape a Billboard chart and save it as CSV, print it, or turn it into a Spotify playlist.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    #[arg(
        long,
        value_name = "NAME",
        default_value = DEFAULT_CHART,
        help = "Chart name as it appears in the chart URL (hot-100, billboard-200, alternative-songs, ...)."
    )]
    pub chart: String,
    #[arg(
        long,
        value_name = "YYYY-MM-DD",
        value_parser = parse_date,
        group = "when",
        help = "Chart date. Defaults to the latest chart."
    )]
    pub date: Option<NaiveDate>,
    #[arg(long = "random-90s", group = "when", help = "Use a random date from the 1990s.")]
    pub random_nineties: bool,
    #[arg(
        long,
        group = "when",
        help = "Use a random date between 1950 and five years ago."
    )]
    pub random_historical: bool,
    #[arg(long, value_enum, default_value_t = OutputMode::Spotify, help = OUTPUT_HELP)]
    pub output: OutputMode,
    #[arg(
        long,
        value_name = "DIR",
        default_value = DEFAULT_OUTPUT_DIR,
        help = "Directory for the CSV file written by --output csv."
    )]
    pub output_dir: PathBuf,
    #[arg(
        long,
        value_name = "NAME",
        conflicts_with = "playlist_id",
        help = "Name for a new playlist (defaults to chart name and date)."
    )]
    pub playlist_name: Option<String>,
    #[arg(long, value_name = "ID", help = PLAYLIST_ID_HELP)]
    pub playlist_id: Option<String>,
    #[arg(
        long,
        value_name = "N",
        value_parser = clap::value_parser!(u32).range(1..),
        help = "Only keep the first N chart entries."
    )]
    pub limit: Option<u32>,
    #[arg(long, value_name = "ID", help = "Spotify client ID (overrides SPOTIFY_CLIENT_ID).")]
    pub client_id: Option<String>,
    #[arg(
        long,
        value_name = "SECRET",
        help = "Spotify client secret (overrides SPOTIFY_CLIENT_SECRET)."
    )]
    pub client_secret: Option<String>,
    #[arg(
        long,
        value_name = "URI",
        help = "Spotify redirect URI (overrides SPOTIFY_REDIRECT_URI; default http://127.0.0.1:8888/callback)."
    )]
    pub redirect_uri: Option<String>,
    #[arg(long, help = HEADLESS_HELP)]
    pub headless: bool,
    #[arg(
        long,
        value_name = "FILE",
        default_value = DEFAULT_TOKEN_CACHE,
        help = "Location of the cached Spotify token."
    )]
    pub token_cache: PathBuf,
    #[arg(long, help = "Disable progress spinner output.")]
    pub no_progress: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub const fn date_choice(&self) -> DateChoice {
        if let Some(date) = self.date {
            DateChoice::Explicit(date)
        } else if self.random_nineties {
            DateChoice::RandomNineties
        } else if self.random_historical {
            DateChoice::RandomHistorical
        } else {
            DateChoice::Latest
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print a shell completion script, or write it to a directory.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
        #[arg(long, value_name = "DIR", help = "Write the script into DIR instead of stdout.")]
        output_dir: Option<PathBuf>,
        #[arg(long, help = "Write the script where the shell looks for user completions.")]
        install: bool,
    },
}

pub fn handle_command(command: Commands) -> Result<()> {
    let Commands::Completions {
        shell,
        output_dir,
        install,
    } = command;

    let target = match (output_dir, install) {
        (Some(dir), _) => Some(dir),
        (None, true) => Some(user_completion_dir(shell)?),
        (None, false) => None,
    };
    write_completions(shell, target.as_deref())
}

fn write_completions(shell: Shell, dir: Option<&Path>) -> Result<()> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();

    let Some(dir) = dir else {
        let mut stdout = io::stdout().lock();
        generate(shell, &mut command, name, &mut stdout);
        return stdout.flush().context("failed to flush completion script");
    };

    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let written = generate_to(shell, &mut command, name, dir)
        .with_context(|| format!("failed to write {shell} completions"))?;
    println!("Wrote {shell} completions to {}", written.display());
    Ok(())
}

/// Per-user completion directory, relative to `$HOME`.
const fn completion_subdir(shell: Shell) -> Option<&'static str> {
    match shell {
        Shell::Bash => Some(".local/share/bash-completion/completions"),
        Shell::Zsh => Some(".local/share/zsh/site-functions"),
        Shell::Fish => Some(".config/fish/completions"),
        Shell::Elvish => Some(".elvish/lib/completions"),
        Shell::PowerShell => Some(".local/share/powershell/Scripts"),
        _ => None,
    }
}

fn user_completion_dir(shell: Shell) -> Result<PathBuf> {
    let subdir = completion_subdir(shell)
        .ok_or_else(|| anyhow!("don't know where {shell} keeps completions; pass --output-dir"))?;
    let home = std::env::var_os("HOME")
        .ok_or_else(|| anyhow!("HOME is not set; pass --output-dir"))?;
    Ok(PathBuf::from(home).join(subdir))
}
