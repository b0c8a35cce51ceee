use super::extractor::{self, Row};
use super::marks::{category_for_color, parse_mark_cell};
use crate::error::{Result, ScraperError};
use crate::models::{AssignmentRecord, Category, CourseDetail, WeightTable};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Reported when none of the detail signatures match.
pub const DETAIL_TABLE_KEY: &str = "detail.table";

static PERCENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").unwrap());

/// Parses a course detail page into assignments and the course weighting.
pub fn parse_course_detail_from_html(html: &str) -> Result<CourseDetail> {
    let fragment = extractor::find_detail_table(html)
        .ok_or_else(|| ScraperError::ElementNotFound(DETAIL_TABLE_KEY.to_string()))?;

    let assignments = parse_assignments(&extractor::extract_rows(&fragment));
    let weight_table = parse_weight_table(html);

    tracing::debug!(
        assignments = assignments.len(),
        weighted = weight_table.is_some(),
        "parsed course detail"
    );
    Ok(CourseDetail {
        assignments,
        weight_table,
    })
}

fn is_assignment_row(row: &Row) -> bool {
    row.cells.iter().any(|c| c.rowspan == Some(2))
}

/// Turns the rows of an assignment table into records.
///
/// An assignment row is one whose name cell spans two rows; the row beneath
/// it carries the teacher's feedback.
pub fn parse_assignments(rows: &[Row]) -> Vec<AssignmentRecord> {
    let mut assignments = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        let Some(name_cell) = row.cells.iter().find(|c| c.rowspan == Some(2)) else {
            continue;
        };
        let mut assignment = AssignmentRecord::new(name_cell.text());

        for cell in &row.cells {
            let Some(category) = cell.bgcolor.as_deref().and_then(category_for_color) else {
                continue;
            };
            if let Some(entry) = parse_mark_cell(&cell.text()) {
                assignment.push_mark(category, entry);
            }
        }

        assignment.feedback = rows
            .get(i + 1)
            .filter(|next| !is_assignment_row(next))
            .map(Row::text)
            .filter(|text| !text.is_empty());

        assignments.push(assignment);
    }

    assignments
}

/// Reads the category weighting rows anywhere on the page.
///
/// A weighting row is coloured with a weighted category's colour, starts
/// with a label, and has the category weight as a percentage in its second
/// cell. The result is normalized to sum to 100.
pub fn parse_weight_table(html: &str) -> Option<WeightTable> {
    let mut weights: BTreeMap<Category, f64> = BTreeMap::new();

    for row in extractor::all_rows(html) {
        if row.cells.len() < 2 || is_assignment_row(&row) {
            continue;
        }
        let color = row
            .bgcolor
            .as_deref()
            .or(row.cells[0].bgcolor.as_deref());
        let Some(category) = color.and_then(category_for_color) else {
            continue;
        };
        if !Category::WEIGHTED.contains(&category) {
            continue;
        }
        let label = row.cells[0].text();
        if label.is_empty() || percent(&label).is_some() {
            continue;
        }
        if let Some(weight) = percent(&row.cells[1].text()) {
            weights.entry(category).or_insert(weight);
        }
    }

    if weights.is_empty() {
        return None;
    }
    Some(WeightTable::new(weights).normalized())
}

fn percent(text: &str) -> Option<f64> {
    PERCENT.captures(text).and_then(|c| c[1].parse().ok())
}
