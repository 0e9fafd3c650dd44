use crate::publish::PublishSummary;
use crate::spotify::playlist_url;
use chrono::{DateTime, Local};
use colored::Colorize;
use std::path::Path;

pub enum SummarySink<'a> {
    Csv(&'a Path),
    Console,
    Playlist(&'a PublishSummary),
}

pub struct SummaryContext<'a> {
    pub(crate) chart_name: &'a str,
    pub(crate) date_label: &'a str,
    pub(crate) entry_count: usize,
    pub(crate) run_started_at: &'a DateTime<Local>,
    pub(crate) sink: SummarySink<'a>,
}

pub fn print_summary(context: &SummaryContext<'_>) {
    println!();
    println!(
        "{}",
        "===================== Chartify Run =====================".bold().bright_cyan()
    );
    print_line(
        "Run started",
        &context
            .run_started_at
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string(),
    );
    print_line("Chart", context.chart_name);
    print_line("Date", context.date_label);
    print_line("Entries", &context.entry_count.to_string());

    match &context.sink {
        SummarySink::Csv(path) => print_line("CSV", &path.display().to_string()),
        SummarySink::Console => print_line("Output", "console"),
        SummarySink::Playlist(summary) => {
            let matched = format!("{} of {}", summary.matched, summary.total);
            let matched = if summary.matched == summary.total {
                matched.bright_green()
            } else {
                matched.bright_yellow()
            };
            println!("{} {}", "Matched".bright_yellow().bold(), matched);
            print_line("Playlist", &summary.playlist_id);
            print_line("Open", &playlist_url(&summary.playlist_id));
        }
    }

    println!(
        "{}",
        "========================================================".bright_cyan()
    );
}

fn print_line(label: &str, value: &str) {
    println!("{} {}", label.bright_yellow().bold(), value.bright_white());
}
