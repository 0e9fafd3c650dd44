use crate::chart::ChartEntry;

const CHART_BRAND: &str = "Billboard";

/// "hot-100" -> "Hot 100", "r-b-hip-hop-songs" -> "R B Hip Hop Songs".
pub fn format_chart_title(chart_name: &str) -> String {
    let mut out = String::with_capacity(chart_name.len());
    let mut previous_is_letter = false;
    for ch in chart_name.chars() {
        let ch = if ch == '-' { ' ' } else { ch };
        if ch.is_alphabetic() {
            if previous_is_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(ch);
            previous_is_letter = false;
        }
    }
    out
}

pub fn default_playlist_name(chart_name: &str, date: &str) -> String {
    format!("{CHART_BRAND} {chart_name} - {date}")
}

pub fn default_playlist_description(chart_name: &str, date: &str) -> String {
    format!("{CHART_BRAND} {chart_name} chart from {date}. Created automatically.")
}

pub fn refreshed_playlist_name(chart_name: &str, date: &str) -> String {
    format!(
        "{CHART_BRAND} {} - Week of {date}",
        format_chart_title(chart_name)
    )
}

pub fn refreshed_playlist_description(chart_name: &str, date: &str) -> String {
    format!(
        "{CHART_BRAND} {} chart for the week of {date}. Automatically updated.",
        format_chart_title(chart_name)
    )
}

pub fn chart_file_name(chart_name: &str, date: &str) -> String {
    format!("{chart_name}_{date}.csv")
}

pub fn format_entry_line(position: usize, entry: &ChartEntry) -> String {
    format!("{position}. {} - {}", entry.title, entry.artist)
}
