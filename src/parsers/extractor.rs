//! Locating tables inside portal pages and flattening their rows.
//!
//! The portal's templates drift between course types (table vs. div wrappers,
//! class names vs. `bgcolor` attributes), so a table is found by trying an
//! ordered list of opening-tag signatures and cutting out the balanced element
//! that follows. Only that fragment is handed to the HTML parser.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// An opening-tag pattern that identifies a table on some template variant.
#[derive(Debug, Clone, Copy)]
pub struct TableSignature {
    /// Stable name reported when diagnosing markup drift.
    pub key: &'static str,
    /// Case-insensitive regex matching the opening tag. Capture group 1 must be the tag name.
    pub opening: &'static str,
}

/// Marks summary table, most specific first.
pub const SUMMARY_SIGNATURES: &[TableSignature] = &[
    TableSignature {
        key: "summary.green_border_message",
        opening: r#"<(table|div)\b[^>]*class\s*=\s*"[^"]*green_border_message[^"]*"[^>]*>"#,
    },
    TableSignature {
        key: "summary.bgcolor_ffffff",
        opening: r#"<(table)\b[^>]*bgcolor\s*=\s*"?#ffffff"?[^>]*>"#,
    },
    TableSignature {
        key: "summary.marks_class",
        opening: r#"<(table)\b[^>]*class\s*=\s*"[^"]*marks[^"]*"[^>]*>"#,
    },
];

/// Per-course assignment table.
pub const DETAIL_SIGNATURES: &[TableSignature] = &[
    TableSignature {
        key: "detail.width_100",
        opening: r#"<(table)\b[^>]*width\s*=\s*"?100%"?[^>]*>"#,
    },
    TableSignature {
        key: "detail.border_1",
        opening: r#"<(table)\b[^>]*border\s*=\s*"?1\b"?[^>]*>"#,
    },
];

/// Rows containing any of these are headers or placeholders, never data.
pub const SENTINEL_ROW_MARKERS: &[&str] = &["Course Name", "Please see teacher"];

struct CompiledSignature {
    key: &'static str,
    regex: Regex,
}

fn compile(signatures: &[TableSignature]) -> Vec<CompiledSignature> {
    signatures
        .iter()
        .map(|s| CompiledSignature {
            key: s.key,
            regex: Regex::new(&format!("(?i){}", s.opening)).expect("built-in table signature"),
        })
        .collect()
}

static SUMMARY: LazyLock<Vec<CompiledSignature>> = LazyLock::new(|| compile(SUMMARY_SIGNATURES));
static DETAIL: LazyLock<Vec<CompiledSignature>> = LazyLock::new(|| compile(DETAIL_SIGNATURES));

static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// A slice of the page covering one complete element, opening tag included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableFragment<'a> {
    /// Which signature matched.
    pub key: &'static str,
    pub html: &'a str,
}

pub fn find_summary_table(html: &str) -> Option<TableFragment<'_>> {
    find_fragment(html, &SUMMARY)
}

pub fn find_detail_table(html: &str) -> Option<TableFragment<'_>> {
    find_fragment(html, &DETAIL)
}

fn find_fragment<'a>(html: &'a str, signatures: &[CompiledSignature]) -> Option<TableFragment<'a>> {
    for signature in signatures {
        let Some(caps) = signature.regex.captures(html) else {
            continue;
        };
        let (Some(whole), Some(tag)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = balanced_end(html, whole.end(), tag.as_str());
        tracing::debug!(key = signature.key, "table signature matched");
        return Some(TableFragment {
            key: signature.key,
            html: &html[whole.start()..end],
        });
    }
    None
}

/// Byte offset just past the closing tag that balances an element opened
/// right before `from`. Unterminated elements run to the end of the page.
fn balanced_end(html: &str, from: usize, tag: &str) -> usize {
    // ASCII lowercasing keeps byte offsets identical to the original.
    let lc = html.to_ascii_lowercase();
    let tag = tag.to_ascii_lowercase();
    let open = format!("<{tag}");
    let close = format!("</{tag}");

    let mut depth = 1usize;
    let mut pos = from;
    loop {
        let next_open = find_tag(&lc, &open, pos);
        let Some(next_close) = find_tag(&lc, &close, pos) else {
            return html.len();
        };
        match next_open {
            Some(o) if o < next_close => {
                depth += 1;
                pos = o + open.len();
            }
            _ => {
                depth -= 1;
                let after = lc[next_close..]
                    .find('>')
                    .map_or(html.len(), |i| next_close + i + 1);
                if depth == 0 {
                    return after;
                }
                pos = after;
            }
        }
    }
}

/// Finds `pat` (e.g. `<table`) at or after `from`, ignoring longer tag names like `<tablex`.
fn find_tag(lc: &str, pat: &str, from: usize) -> Option<usize> {
    let mut pos = from;
    while let Some(rel) = lc.get(pos..)?.find(pat) {
        let at = pos + rel;
        let next = lc.as_bytes().get(at + pat.len()).copied();
        match next {
            Some(b) if b.is_ascii_alphanumeric() => pos = at + pat.len(),
            _ => return Some(at),
        }
    }
    None
}

/// One table cell with its text split into visual lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    pub lines: Vec<String>,
    /// `bgcolor` attribute, lowercased without the leading `#`.
    pub bgcolor: Option<String>,
    pub rowspan: Option<u32>,
}

impl Cell {
    pub fn text(&self) -> String {
        self.lines.join(" ")
    }
}

/// One table row: its own cells plus every link found inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub links: Vec<String>,
    pub bgcolor: Option<String>,
}

impl Row {
    pub fn text(&self) -> String {
        self.cells
            .iter()
            .map(Cell::text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_sentinel(&self) -> bool {
        let text = self.text();
        SENTINEL_ROW_MARKERS.iter().any(|m| text.contains(m))
    }
}

/// Rows of the outermost table in `fragment`. Rows of tables nested inside
/// cells are folded into their parent cell's text instead.
pub fn extract_rows(fragment: &TableFragment<'_>) -> Vec<Row> {
    let document = Html::parse_fragment(fragment.html);
    let rows: Vec<(usize, ElementRef)> = document
        .select(&TR)
        .map(|tr| (table_depth(tr), tr))
        .collect();
    let Some(top) = rows.iter().map(|(d, _)| *d).min() else {
        return Vec::new();
    };
    rows.into_iter()
        .filter(|(d, _)| *d == top)
        .map(|(_, tr)| to_row(tr))
        .collect()
}

/// Like [`extract_rows`] but drops header and placeholder rows.
pub fn extract_data_rows(fragment: &TableFragment<'_>) -> Vec<Row> {
    extract_rows(fragment)
        .into_iter()
        .filter(|row| !row.is_sentinel())
        .collect()
}

/// Every row on the page, at any nesting depth.
pub fn all_rows(html: &str) -> Vec<Row> {
    let document = Html::parse_document(html);
    document.select(&TR).map(to_row).collect()
}

fn table_depth(el: ElementRef<'_>) -> usize {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .filter(|a| a.value().name() == "table")
        .count()
}

fn to_row(tr: ElementRef<'_>) -> Row {
    let cells = tr
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
        .map(to_cell)
        .collect();
    let links = tr
        .select(&LINK)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect();
    Row {
        cells,
        links,
        bgcolor: tr.value().attr("bgcolor").map(normalize_color),
    }
}

fn to_cell(td: ElementRef<'_>) -> Cell {
    let lines = td
        .text()
        .flat_map(str::lines)
        .map(collapse_whitespace)
        .filter(|l| !l.is_empty())
        .collect();
    Cell {
        lines,
        bgcolor: td.value().attr("bgcolor").map(normalize_color),
        rowspan: td.value().attr("rowspan").and_then(|r| r.trim().parse().ok()),
    }
}

/// `"#FFFFAA"` -> `"ffffaa"`.
pub fn normalize_color(raw: &str) -> String {
    raw.trim().trim_start_matches('#').to_ascii_lowercase()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
