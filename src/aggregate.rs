use crate::models::{AssignmentRecord, Category, CourseRecord, CourseSummary, MarkSource, WeightTable};
use std::collections::BTreeMap;

/// Weighted average of one category across all assignments, as a percentage.
///
/// Only finished entries with a released total count. `None` when nothing
/// in the category qualifies.
pub fn category_average(assignments: &[AssignmentRecord], category: Category) -> Option<f64> {
    let mut raw_sum = 0.0;
    let mut weight_sum = 0.0;

    for entry in assignments
        .iter()
        .flat_map(|a| a.marks(category))
        .filter(|e| e.counts_toward_average())
    {
        raw_sum += entry.earned / entry.total * entry.weight;
        weight_sum += entry.weight;
    }

    (weight_sum > 0.0).then(|| raw_sum / weight_sum * 100.0)
}

/// Averages for every category that has data.
pub fn category_averages(assignments: &[AssignmentRecord]) -> BTreeMap<Category, f64> {
    [
        Category::Knowledge,
        Category::Thinking,
        Category::Communication,
        Category::Application,
        Category::Other,
        Category::Final,
    ]
    .into_iter()
    .filter_map(|c| category_average(assignments, c).map(|avg| (c, avg)))
    .collect()
}

/// Course mark from category averages: `Σ avg_c * w_c / Σ w_c` over the
/// weighted categories that have data. `None` when no category does.
pub fn weighted_overall(assignments: &[AssignmentRecord], weights: &WeightTable) -> Option<f64> {
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;

    for (category, weight) in weights.iter() {
        if let Some(avg) = category_average(assignments, category) {
            weighted += avg * weight;
            weight_sum += weight;
        }
    }

    (weight_sum > 0.0).then(|| weighted / weight_sum)
}

/// Assembles the final course record.
///
/// A mark printed on the summary page wins. Otherwise it is derived from the
/// assignments, and if that is impossible too the record carries no mark and
/// is flagged [`MarkSource::Unavailable`] rather than reporting zero.
pub fn aggregate(
    summary: CourseSummary,
    assignments: Vec<AssignmentRecord>,
    weights: Option<WeightTable>,
) -> CourseRecord {
    let (overall_mark, mark_source) = match summary.overall {
        Some(overall) => (Some(overall.mark), MarkSource::Portal),
        None => {
            let table = weights.clone().unwrap_or_default();
            match weighted_overall(&assignments, &table) {
                Some(mark) => (Some(mark), MarkSource::Derived),
                None => (None, MarkSource::Unavailable),
            }
        }
    };

    if mark_source == MarkSource::Unavailable {
        tracing::info!(code = %summary.code, "course has no mark data");
    }

    CourseRecord {
        is_final: summary.overall.is_some_and(|o| o.is_final()),
        is_midterm: summary.overall.is_some_and(|o| o.is_midterm()),
        code: summary.code,
        name: summary.name,
        room: summary.room,
        period: summary.period,
        overall_mark,
        detail_link: summary.detail_link,
        assignments,
        weight_table: weights,
        mark_source,
    }
}
