//! Turns "what happened to the page" into one short observation string.

use serde_json::Value;
use tracing::debug;

use crate::config::{Timings, settle};
use crate::dom::wait_for_dom_loaded;
use crate::error::StepError;
use crate::page::Page;

pub const VISIBLE_TEXT_JS: &str = "document.body ? document.body.innerText : ''";

/// First three short h2/h3 texts, as a JSON string.
pub const RESULT_HEADINGS_JS: &str = r#"
(() => JSON.stringify(
  Array.from(document.querySelectorAll('h2, h3'))
    .map(h => (h.innerText || '').trim().replace(/\s+/g, ' '))
    .filter(t => t.length > 0 && t.length <= 120)
    .slice(0, 3)
))()
"#;

/// Text longer than this is cut down to `VISIBLE_TEXT_KEEP` characters.
pub const VISIBLE_TEXT_LIMIT: usize = 400;
pub const VISIBLE_TEXT_KEEP: usize = 350;
pub const ELLIPSIS: &str = "...";
pub const MAX_RESULT_HINTS: usize = 3;

const SEARCH_URL_MARKERS: &[&str] = &["search", "?q=", "&q=", "query=", "?text=", "&text=", "/s?"];

/// URL and title at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMark {
    pub url: String,
    pub title: String,
}

impl PageMark {
    pub fn capture<P: Page + ?Sized>(page: &P) -> Self {
        Self {
            url: page.url(),
            title: page.title().unwrap_or_else(|_| "untitled".to_string()),
        }
    }
}

/// Compose the observation for a finished step.
///
/// `before` must be captured before the step ran.
pub fn summarize<P: Page + ?Sized>(
    page: &P,
    before: &PageMark,
    outcome: &Result<(), StepError>,
    timings: &Timings,
) -> String {
    if let Err(err) = outcome {
        return format!("ERROR: {err}");
    }

    wait_for_dom_loaded(page, timings);
    settle(timings.post_step_settle);
    let after = PageMark::capture(page);

    let mut lines = vec!["Action completed.".to_string()];
    if after.url != before.url {
        lines.push(format!("URL changed: {} -> {}", before.url, after.url));
    }
    if after.title != before.title {
        lines.push(format!("Title changed: {:?} -> {:?}", before.title, after.title));
    }
    lines.push(format!("URL: {}", after.url));
    lines.push(format!("Title: {:?}", after.title));
    lines.push(format!("Visible text: {}", visible_text(page)));

    if is_search_context(&after.url) {
        let hints = result_headings(page);
        if !hints.is_empty() {
            lines.push(format!("Top results: {}", hints.join(" | ")));
        }
    }

    lines.join("\n")
}

pub fn visible_text<P: Page + ?Sized>(page: &P) -> String {
    match page.evaluate(VISIBLE_TEXT_JS) {
        Ok(Value::String(raw)) => truncate_visible_text(&raw),
        Ok(_) => String::new(),
        Err(e) => {
            debug!("visible text unavailable: {:#}", e);
            "(visible text unavailable)".to_string()
        }
    }
}

/// Collapse all whitespace runs to single spaces, then cut long text.
///
/// The length limit applies to the raw text, before collapsing.
pub fn truncate_visible_text(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if raw.chars().count() <= VISIBLE_TEXT_LIMIT
        || collapsed.chars().count() <= VISIBLE_TEXT_KEEP
    {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(VISIBLE_TEXT_KEEP).collect();
    out.push_str(ELLIPSIS);
    out
}

pub fn is_search_context(url: &str) -> bool {
    let url = url.to_lowercase();
    SEARCH_URL_MARKERS.iter().any(|m| url.contains(m))
}

fn result_headings<P: Page + ?Sized>(page: &P) -> Vec<String> {
    let raw = match page.evaluate(RESULT_HEADINGS_JS) {
        Ok(Value::String(raw)) => raw,
        Ok(_) => return Vec::new(),
        Err(e) => {
            debug!("result headings unavailable: {:#}", e);
            return Vec::new();
        }
    };
    let mut hints: Vec<String> = serde_json::from_str(&raw).unwrap_or_default();
    hints.truncate(MAX_RESULT_HINTS);
    hints
}
