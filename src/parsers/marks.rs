//! Decoding individual mark cells.
//!
//! Both lookup tables here are plain data: teaching the parser a new
//! category colour or summary wording is an edit to a table, not new code.

use crate::models::{Category, MarkEntry, MarkKind, OverallMark};
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// Cell background colour (lowercase, no `#`) to category.
pub const CATEGORY_COLORS: &[(&str, Category)] = &[
    ("ffffaa", Category::Knowledge),
    ("c0fea4", Category::Thinking),
    ("afafff", Category::Communication),
    ("ffd490", Category::Application),
    ("eeeeee", Category::Other),
    ("cccccc", Category::Final),
];

/// Summary-cell markers in priority order. The first marker present decides.
pub const OVERALL_MARK_PATTERNS: &[(&str, MarkKind)] = &[
    ("FINALMARK:", MarkKind::Final),
    ("MIDTERMMARK:", MarkKind::Midterm),
    ("currentmark=", MarkKind::Current),
];

/// Words that flag a mark as not yet finished.
pub const NOT_FINISHED_MARKERS: &[&str] = &["finished"];

static NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)?").unwrap());
static DIVISION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*/\s*(\d+(?:\.\d+)?)").unwrap());
static WEIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)weight\s*=\s*(\d+(?:\.\d+)?)").unwrap());

pub fn category_for_color(color: &str) -> Option<Category> {
    let color = super::extractor::normalize_color(color);
    CATEGORY_COLORS
        .iter()
        .find(|(c, _)| *c == color)
        .map(|(_, category)| *category)
}

/// Reads the overall mark out of a summary-table cell.
///
/// Whitespace is ignored, so `"current mark = 91.5%"` and `"currentmark=91.5"`
/// read the same. Returns `None` when no marker is present or the selected
/// marker is not followed by a number.
pub fn parse_overall_mark(cell_text: &str) -> Option<OverallMark> {
    let compact: String = cell_text.chars().filter(|c| !c.is_whitespace()).collect();
    let lower = compact.to_ascii_lowercase();

    let (marker, kind) = OVERALL_MARK_PATTERNS
        .iter()
        .find(|(marker, _)| lower.contains(&marker.to_ascii_lowercase()))?;

    let start = lower.find(&marker.to_ascii_lowercase())? + marker.len();
    let number = NUMBER.find(&compact[start..])?;
    let mark = number.as_str().parse().ok()?;
    Some(OverallMark { mark, kind: *kind })
}

/// Decodes a category cell such as `"8 / 10 = 80% weight=20"`.
///
/// Missing `weight=` defaults the weight to 1. Text whose division cannot be
/// read yields [`MarkEntry::unknown`], whose zero total keeps it out of every
/// average. Empty cells yield `None`.
pub fn parse_mark_cell(cell_text: &str) -> Option<MarkEntry> {
    let text = cell_text.trim();
    if text.is_empty() {
        return None;
    }

    let Some(division) = DIVISION.captures(text) else {
        warn!(cell = text, "unreadable mark cell");
        return Some(MarkEntry::unknown());
    };
    let (Ok(earned), Ok(total)) = (division[1].parse(), division[2].parse()) else {
        warn!(cell = text, "unreadable mark cell");
        return Some(MarkEntry::unknown());
    };

    let weight = WEIGHT
        .captures(text)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(1.0);

    let lower = text.to_ascii_lowercase();
    let finished = !NOT_FINISHED_MARKERS.iter().any(|m| lower.contains(m));

    Some(MarkEntry::new(earned, total, weight, finished))
}
