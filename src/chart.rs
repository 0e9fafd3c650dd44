pub mod parse;

pub use parse::parse_chart;

use crate::dates::format_date;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_CHART_BASE_URL: &str = "https://www.billboard.com/charts/";
pub const DEFAULT_CHART: &str = "hot-100";

pub const CHART_TIMEOUT: Duration = Duration::from_secs(10);
const BROWSER_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
    "(KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
);

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ChartEntry {
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRequest {
    pub chart_name: String,
    pub date: Option<NaiveDate>,
}

impl ChartRequest {
    pub fn new(chart_name: impl Into<String>, date: Option<NaiveDate>) -> Self {
        Self {
            chart_name: chart_name.into(),
            date,
        }
    }

    pub fn url(&self, base_url: &str) -> String {
        let mut url = format!("{base_url}{}", self.chart_name);
        if let Some(date) = self.date {
            url.push('/');
            url.push_str(&format_date(date));
            url.push('/');
        }
        url
    }
}

pub fn build_chart_client() -> Result<Client> {
    build_chart_client_with_timeout(CHART_TIMEOUT)
}

pub fn build_chart_client_with_timeout(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

    Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .context("failed to build chart HTTP client")
}

/// Downloads and parses one chart. Any transport or status failure is logged and
/// yields an empty chart so the run can finish as a no-op.
pub async fn fetch_chart(
    client: &Client,
    base_url: &str,
    request: &ChartRequest,
) -> Vec<ChartEntry> {
    let url = request.url(base_url);
    debug!(%url, "fetching chart");

    match fetch_text(client, &url).await {
        Ok(body) => parse_chart(&body),
        Err(err) => {
            warn!(%url, error = %describe_error(&err), "error fetching the chart");
            Vec::new()
        }
    }
}

pub async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?
        .error_for_status()
        .with_context(|| format!("{url} returned an error status"))?
        .text()
        .await
        .with_context(|| format!("failed to read response body from {url}"))
}

pub fn describe_error(error: &anyhow::Error) -> String {
    let mut pieces: Vec<String> = Vec::new();
    for (idx, cause) in error.chain().enumerate() {
        let text = cause.to_string();
        if text.is_empty() {
            continue;
        }
        if idx == 0 {
            pieces.push(text);
        } else {
            pieces.push(format!("caused by {text}"));
        }
    }

    if pieces.is_empty() {
        format!("{error:?}")
    } else {
        pieces.join(" | ")
    }
}
