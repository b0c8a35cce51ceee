use super::extractor::{self, Row};
use super::marks::parse_overall_mark;
use crate::error::{Result, ScraperError};
use crate::models::{CourseIdentity, CourseSummary};
use regex::Regex;
use std::sync::LazyLock;

/// Reported when none of the summary signatures match.
pub const SUMMARY_TABLE_KEY: &str = "summary.table";

static BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)Block:\s*P(\d+)").unwrap());
static ROOM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)rm\.\s*(\w+)").unwrap());

/// Parses the marks listing page into course summaries.
///
/// A page without a recognisable summary table, or whose table holds no
/// course rows, is an error: it means the portal changed, not that the
/// student has no courses.
pub fn parse_courses_from_html(html: &str) -> Result<Vec<CourseSummary>> {
    let fragment = extractor::find_summary_table(html)
        .ok_or_else(|| ScraperError::ElementNotFound(SUMMARY_TABLE_KEY.to_string()))?;

    let courses: Vec<CourseSummary> = extractor::extract_data_rows(&fragment)
        .iter()
        .filter_map(parse_course_row)
        .collect();

    if courses.is_empty() {
        return Err(ScraperError::ParsingError(format!(
            "summary table ({}) contained no course rows",
            fragment.key
        )));
    }

    tracing::debug!(count = courses.len(), key = fragment.key, "parsed course summaries");
    Ok(courses)
}

/// Reads one summary row, or `None` if it does not look like a course.
pub fn parse_course_row(row: &Row) -> Option<CourseSummary> {
    if row.cells.len() < 3 {
        return None;
    }

    let info = &row.cells[0].lines;
    let identity = CourseIdentity::parse(info.first()?);
    if identity.code.is_empty() {
        return None;
    }

    let details = info[1..].join(" ");
    let period = BLOCK
        .captures(&details)
        .map(|c| c[1].to_string())
        .unwrap_or_default();
    let room = ROOM
        .captures(&details)
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    let overall = parse_overall_mark(&row.cells[2].text());
    if overall.is_none() {
        tracing::debug!(code = %identity.code, "course has no readable mark");
    }

    let detail_link = row.links.iter().find(|l| l.contains("viewReport")).cloned();

    Some(CourseSummary {
        code: identity.code,
        name: identity.name,
        room,
        period,
        overall,
        detail_link,
    })
}
