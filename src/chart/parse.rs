use super::ChartEntry;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Locates the chart entry nodes inside a parsed page. Returns `None` when the
/// layout it knows about is absent.
pub type EntryLocator = for<'a> fn(&'a Html) -> Option<Vec<ElementRef<'a>>>;

/// Tried in order; the first locator that finds any node wins.
pub const ENTRY_LOCATORS: &[(&str, EntryLocator)] = &[
    ("results-list items", results_list_items),
    ("results-list rows", results_list_rows),
    ("legacy chart-list items", legacy_chart_list_items),
];

const TITLE_SELECTORS: [&str; 2] = ["h3.c-title", "span.c-title"];
const ARTIST_SELECTORS: [&str; 2] = ["span.c-label", "span.a-font-primary-s"];
const MIN_FIELD_CHARS: usize = 2;

pub fn parse_chart(html: &str) -> Vec<ChartEntry> {
    let document = Html::parse_document(html);
    parse_document(&document, ENTRY_LOCATORS)
}

pub fn parse_document(document: &Html, locators: &[(&str, EntryLocator)]) -> Vec<ChartEntry> {
    let Some((layout, nodes)) = locators
        .iter()
        .find_map(|(name, locate)| locate(document).map(|nodes| (*name, nodes)))
    else {
        warn!("could not find chart entries; the chart page structure may have changed");
        return Vec::new();
    };
    debug!(layout, nodes = nodes.len(), "matched chart layout");

    let title_selectors = compile(&TITLE_SELECTORS);
    let artist_selectors = compile(&ARTIST_SELECTORS);

    let entries: Vec<ChartEntry> = nodes
        .into_iter()
        .filter_map(|node| {
            let title = first_match_text(node, &title_selectors)?;
            let artist = first_match_text(node, &artist_selectors)?;
            if is_meaningful(&title) && is_meaningful(&artist) {
                Some(ChartEntry { title, artist })
            } else {
                None
            }
        })
        .collect();

    debug!(count = entries.len(), "parsed chart entries");
    entries
}

fn results_list_items(document: &Html) -> Option<Vec<ElementRef<'_>>> {
    select_nonempty(document, "li.o-chart-results-list__item")
}

fn results_list_rows(document: &Html) -> Option<Vec<ElementRef<'_>>> {
    select_nonempty(document, "div.o-chart-results-list-row")
}

fn legacy_chart_list_items(document: &Html) -> Option<Vec<ElementRef<'_>>> {
    select_nonempty(document, "div.chart-list-item")
}

fn select_nonempty<'a>(document: &'a Html, selector: &str) -> Option<Vec<ElementRef<'a>>> {
    let selector = Selector::parse(selector).ok()?;
    let nodes: Vec<ElementRef<'a>> = document.select(&selector).collect();
    if nodes.is_empty() { None } else { Some(nodes) }
}

fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .map(|selector| Selector::parse(selector).expect("valid selector"))
        .collect()
}

fn first_match_text(node: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors
        .iter()
        .find_map(|selector| node.select(selector).next())
        .map(extract_text)
}

fn is_meaningful(value: &str) -> bool {
    value.chars().count() >= MIN_FIELD_CHARS
}

/// Concatenates the element's text nodes as-is, then collapses runs of
/// whitespace. Inline children (`Don<span>'t</span>`) stay glued to their
/// neighbours.
pub fn extract_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
