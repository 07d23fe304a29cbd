//! Candidate price regions from fetched HTML.

use scraper::{Html, Selector};
use tracing::debug;

/// Visible text of every element matching `selectors`, in selector order.
/// When nothing matches, the whole body text is the only region.
///
/// Invalid selectors are skipped.
pub fn html_regions(html: &str, selectors: &[String]) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut regions = Vec::new();

    for raw in selectors {
        let selector = match Selector::parse(raw) {
            Ok(s) => s,
            Err(e) => {
                debug!("Skipping invalid region selector '{}': {:?}", raw, e);
                continue;
            }
        };
        for element in document.select(&selector) {
            let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
            if !text.is_empty() {
                regions.push(text);
            }
        }
    }

    if !regions.is_empty() {
        return regions;
    }

    if let Ok(body) = Selector::parse("body") {
        if let Some(element) = document.select(&body).next() {
            let text = collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "));
            if !text.is_empty() {
                regions.push(text);
            }
        }
    }

    regions
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
