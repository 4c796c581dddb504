//! Extraction of injected article records from board pages.
//!
//! The mobile board renders its article list from inline scripts of the form
//! `articles.push({ ... title: "...", headCont: "...", ... });`. Only those
//! scripts are looked at; the rest of the markup is ignored.

use super::error::IngestError;
use super::types::RawArticle;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

/// Substring that identifies a script carrying article data.
pub const ARTICLES_MARKER: &str = "articles.push";

static SCRIPT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").unwrap());
static ARTICLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)articles\.push\(\{(.*?)\}\);").unwrap());
static TITLE_FIELD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"title:\s*"(.*?)""#).unwrap());
static HEAD_CONT_FIELD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"headCont:\s*"(.*?)""#).unwrap());

/// Pulls every `articles.push({...})` body out of a page.
///
/// # Arguments
/// * `html` - The fetched page
/// * `url` - Where the page came from (for the anomaly report)
///
/// # Returns
/// * `Ok(Vec<String>)` - One raw body per article, in page order. May be empty
///   when the data script exists but lists nothing.
/// * `Err(IngestError::StructuralAnomaly)` - No script contains the marker
pub fn extract_raw_records(html: &str, url: &str) -> Result<Vec<String>, IngestError> {
    let document = Html::parse_document(html);
    let mut found_marker = false;
    let mut records = Vec::new();

    for script in document.select(&SCRIPT_SELECTOR) {
        let content = script.text().collect::<String>();
        if !content.contains(ARTICLES_MARKER) {
            continue;
        }

        found_marker = true;
        records.extend(
            ARTICLE_REGEX
                .captures_iter(&content)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str().to_string()),
        );
    }

    if !found_marker {
        return Err(IngestError::StructuralAnomaly {
            url: url.to_string(),
            marker: ARTICLES_MARKER,
        });
    }

    Ok(records)
}

impl RawArticle {
    /// Reads the `title` and `headCont` fields out of one raw article body.
    pub fn from_raw(raw: &str) -> Self {
        let field = |regex: &Regex| {
            regex
                .captures(raw)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        };

        RawArticle {
            raw: raw.to_string(),
            title: field(&TITLE_FIELD_REGEX),
            head_cont: field(&HEAD_CONT_FIELD_REGEX),
        }
    }

    /// The room label, falling back to the category when the post has none.
    pub fn room_name_or<'a>(&'a self, category: &'a str) -> &'a str {
        match self.head_cont.as_deref() {
            Some(label) if !label.trim().is_empty() => label,
            _ => category,
        }
    }
}
