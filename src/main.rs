use crate::chart::{
    ChartEntry, ChartRequest, DEFAULT_CHART_BASE_URL, build_chart_client, fetch_chart,
};
use crate::cli::{Cli, OutputMode};
use crate::config::{CredentialOverrides, Credentials};
use crate::dates::format_date;
use crate::formatting::{
    chart_file_name, default_playlist_description, default_playlist_name, format_entry_line,
};
use crate::progress::{ProgressState, fetch_with_spinner};
use crate::publish::{PlaylistTarget, Publisher};
use crate::spotify::AuthOptions;
use crate::spotify::auth::connect;
use crate::spotify::client::build_api_client;
use crate::summary::{SummaryContext, SummarySink, print_summary};
use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use colored::Colorize;
use csv::{Writer, WriterBuilder};
use std::io::IsTerminal;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod chart;
mod cli;
mod config;
mod dates;
mod formatting;
mod matcher;
mod progress;
mod publish;
mod spotify;
mod summary;

const DEFAULT_LOG_FILTER: &str = "chartify=info";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let use_color = std::io::stdout().is_terminal();
    colored::control::set_override(use_color);

    let mut cli = Cli::parse();

    if let Some(command) = cli.command.take() {
        crate::cli::handle_command(command)?;
        return Ok(());
    }

    let run_started_at = Local::now();
    let today = run_started_at.date_naive();

    let choice = cli.date_choice();
    let date = choice.resolve(today, &mut rand::rng());
    if choice.is_random()
        && let Some(date) = date
    {
        info!(date = %format_date(date), "using random chart date");
    }
    let date_label = format_date(date.unwrap_or(today));

    let request = ChartRequest::new(cli.chart.as_str(), date);
    let chart_client = build_chart_client()?;
    let progress = (!cli.no_progress).then(|| ProgressState::new(use_color));
    let label = format!("{} {date_label}", cli.chart);
    let mut entries = fetch_with_spinner(
        progress.as_ref(),
        &label,
        fetch_chart(&chart_client, DEFAULT_CHART_BASE_URL, &request),
    )
    .await;

    if let Some(limit) = cli.limit {
        entries.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    }
    if entries.is_empty() {
        warn!(chart = %cli.chart, date = %date_label, "no chart entries found");
    } else {
        info!(count = entries.len(), "found chart entries");
    }

    let csv_path;
    let publish_summary;
    let sink = match cli.output {
        OutputMode::Csv => {
            csv_path = cli
                .output_dir
                .join(chart_file_name(&cli.chart, &date_label));
            save_chart_csv(&csv_path, &entries).await?;
            info!(count = entries.len(), path = %csv_path.display(), "saved chart CSV");
            SummarySink::Csv(&csv_path)
        }
        OutputMode::Print => {
            print_entries(&entries);
            SummarySink::Console
        }
        OutputMode::Spotify => {
            let credentials = Credentials::from_env(CredentialOverrides {
                client_id: cli.client_id.as_deref(),
                client_secret: cli.client_secret.as_deref(),
                redirect_uri: cli.redirect_uri.as_deref(),
            })?;
            let options = AuthOptions {
                headless: cli.headless,
                cache_path: cli.token_cache.clone(),
                ..AuthOptions::default()
            };
            let catalog = connect(build_api_client()?, &credentials, &options).await?;

            let target = match cli.playlist_id.clone() {
                Some(id) => PlaylistTarget::Existing { id },
                None => PlaylistTarget::New {
                    name: cli
                        .playlist_name
                        .clone()
                        .unwrap_or_else(|| default_playlist_name(&cli.chart, &date_label)),
                    description: default_playlist_description(&cli.chart, &date_label),
                },
            };
            publish_summary = Publisher::default()
                .publish(&catalog, &target, &entries, &cli.chart, &date_label)
                .await?;
            SummarySink::Playlist(&publish_summary)
        }
    };

    print_summary(&SummaryContext {
        chart_name: &cli.chart,
        date_label: &date_label,
        entry_count: entries.len(),
        run_started_at: &run_started_at,
        sink,
    });

    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_entries(entries: &[ChartEntry]) {
    println!("{}", "Chart Entries:".bold().bright_cyan());
    for (idx, entry) in entries.iter().enumerate() {
        println!("{}", format_entry_line(idx + 1, entry));
    }
}

pub(crate) async fn write_output_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}

fn finalize_writer(mut writer: Writer<Vec<u8>>, label: &str) -> Result<Vec<u8>> {
    writer
        .flush()
        .with_context(|| format!("failed to flush {label}"))?;
    writer
        .into_inner()
        .with_context(|| format!("failed to finalize {label}"))
}

fn serialize_chart(entries: &[ChartEntry]) -> Result<Vec<u8>> {
    // Header written by hand so an empty chart still gets one.
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(["title", "artist"])
        .context("failed to write chart CSV header")?;
    for entry in entries {
        writer
            .serialize(entry)
            .context("failed to serialize chart entry")?;
    }
    finalize_writer(writer, "chart CSV")
}

async fn save_chart_csv(path: &Path, entries: &[ChartEntry]) -> Result<()> {
    let serialized = serialize_chart(entries)?;
    write_output_file(path, &serialized).await
}
