use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A student number / password pair. Lives only as long as a login attempt.
#[derive(Clone)]
pub struct Credentials {
    /// The student number used as the TeachAssist username.
    pub identifier: String,
    /// The account password. Never logged, never serialized.
    pub secret: String,
}

impl Credentials {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Achievement-chart category a mark is recorded under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "K")]
    Knowledge,
    #[serde(rename = "T")]
    Thinking,
    #[serde(rename = "C")]
    Communication,
    #[serde(rename = "A")]
    Application,
    #[serde(rename = "O")]
    Other,
    #[serde(rename = "F")]
    Final,
}

impl Category {
    /// Categories that carry a course weighting of their own.
    pub const WEIGHTED: [Category; 4] = [
        Category::Knowledge,
        Category::Thinking,
        Category::Communication,
        Category::Application,
    ];

    /// The single-letter code used by the portal and by the UI layer.
    pub fn code(&self) -> char {
        match self {
            Category::Knowledge => 'K',
            Category::Thinking => 'T',
            Category::Communication => 'C',
            Category::Application => 'A',
            Category::Other => 'O',
            Category::Final => 'F',
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One scored entry inside a category cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkEntry {
    /// Points earned.
    pub earned: f64,
    /// Points available. Zero means the mark has not been released.
    pub total: f64,
    /// Relative weight of this entry inside its category.
    pub weight: f64,
    /// False when the portal flags the work as not finished.
    pub finished: bool,
}

impl MarkEntry {
    pub fn new(earned: f64, total: f64, weight: f64, finished: bool) -> Self {
        Self {
            earned,
            total,
            weight,
            finished,
        }
    }

    /// Placeholder used when a cell is present but its division cannot be read.
    pub fn unknown() -> Self {
        Self::new(0.0, 0.0, 0.0, true)
    }

    /// `earned / total * 100`, or `None` when no total has been released.
    pub fn percentage(&self) -> Option<f64> {
        (self.total > 0.0).then(|| self.earned / self.total * 100.0)
    }

    /// Whether the entry takes part in category averages.
    pub fn counts_toward_average(&self) -> bool {
        self.finished && self.total > 0.0
    }
}

/// A single assignment row from a course detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    /// The assignment title as shown on the portal.
    pub name: String,
    /// Teacher feedback from the row below the marks, if any.
    pub feedback: Option<String>,
    /// Marks keyed by category. One assignment may score several categories.
    pub category_marks: BTreeMap<Category, Vec<MarkEntry>>,
}

impl AssignmentRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feedback: None,
            category_marks: BTreeMap::new(),
        }
    }

    pub fn push_mark(&mut self, category: Category, entry: MarkEntry) {
        self.category_marks.entry(category).or_default().push(entry);
    }

    pub fn marks(&self, category: Category) -> &[MarkEntry] {
        self.category_marks
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Category weighting for a course, as percentages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable(BTreeMap<Category, f64>);

impl Default for WeightTable {
    /// Even split across the four weighted categories.
    fn default() -> Self {
        Self(Category::WEIGHTED.iter().map(|c| (*c, 25.0)).collect())
    }
}

impl WeightTable {
    pub fn new(weights: BTreeMap<Category, f64>) -> Self {
        Self(weights)
    }

    pub fn get(&self, category: Category) -> Option<f64> {
        self.0.get(&category).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, f64)> + '_ {
        self.0.iter().map(|(c, w)| (*c, *w))
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    /// Scales every weight by `100 / sum` so the table adds up to 100.
    ///
    /// A table whose weights sum to zero (or that is empty) cannot be scaled
    /// and is replaced by [`WeightTable::default`].
    pub fn normalized(self) -> Self {
        let sum = self.sum();
        if sum <= 0.0 || !sum.is_finite() {
            tracing::warn!(sum, "weight table cannot be normalized, using even split");
            return Self::default();
        }
        if (sum - 100.0).abs() < 1e-9 {
            return self;
        }
        let factor = 100.0 / sum;
        tracing::debug!(sum, factor, "normalizing weight table");
        Self(self.0.into_iter().map(|(c, w)| (c, w * factor)).collect())
    }
}

/// Which of the three summary patterns produced a course mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkKind {
    Final,
    Midterm,
    Current,
}

/// A mark read straight from the summary table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverallMark {
    pub mark: f64,
    pub kind: MarkKind,
}

impl OverallMark {
    pub fn is_final(&self) -> bool {
        self.kind == MarkKind::Final
    }

    pub fn is_midterm(&self) -> bool {
        self.kind == MarkKind::Midterm
    }
}

/// Course code and display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseIdentity {
    pub code: String,
    pub name: String,
}

impl CourseIdentity {
    /// Resolves a code and name from the two fields the portal may fill in.
    ///
    /// Whichever field holds a `"CODE: Name"` string is split at its first
    /// colon. Without a colon the code doubles as the name. Resolving an
    /// already resolved identity returns it unchanged.
    pub fn resolve(code_field: &str, name_field: &str) -> Self {
        let code_field = code_field.trim();
        let name_field = name_field.trim();

        if let Some((code, name)) = code_field.split_once(':') {
            return Self::from_parts(code, name);
        }
        if let Some((code, name)) = name_field.split_once(':') {
            let code = code.trim();
            if code_field.is_empty() || code_field == code {
                return Self::from_parts(code, name);
            }
        }

        let code = if code_field.is_empty() { name_field } else { code_field };
        let name = if name_field.is_empty() { code } else { name_field };
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }

    /// Resolves a single combined string such as `"MHF4U1-01 : Advanced Functions"`.
    pub fn parse(combined: &str) -> Self {
        Self::resolve(combined, "")
    }

    fn from_parts(code: &str, name: &str) -> Self {
        let code = code.trim();
        let name = name.trim();
        let name = if name.is_empty() { code } else { name };
        let code = if code.is_empty() { name } else { code };
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}

/// One row of the marks summary table, before any detail page is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSummary {
    pub code: String,
    pub name: String,
    /// Classroom, e.g. `"212"`. Empty when the portal leaves it out.
    pub room: String,
    /// Timetable block number, e.g. `"1"` for `Block: P1`.
    pub period: String,
    /// `None` when the mark cell matched no known pattern.
    pub overall: Option<OverallMark>,
    /// Relative link to the `viewReport` detail page.
    pub detail_link: Option<String>,
}

/// Where a course's overall mark came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkSource {
    /// Read from the summary table.
    Portal,
    /// Computed from category sub-marks.
    Derived,
    /// No mark anywhere. The UI must not present this as zero.
    Unavailable,
}

/// A fully assembled course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub code: String,
    pub name: String,
    pub room: String,
    pub period: String,
    pub overall_mark: Option<f64>,
    pub is_final: bool,
    pub is_midterm: bool,
    pub detail_link: Option<String>,
    pub assignments: Vec<AssignmentRecord>,
    /// Weighting read from the detail page, already normalized.
    pub weight_table: Option<WeightTable>,
    pub mark_source: MarkSource,
}

impl CourseRecord {
    pub fn has_mark(&self) -> bool {
        self.overall_mark.is_some()
    }
}

/// Everything parsed from one course detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseDetail {
    pub assignments: Vec<AssignmentRecord>,
    pub weight_table: Option<WeightTable>,
}

/// The result of one full fetch cycle. Replaces any earlier snapshot wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub courses: Vec<CourseRecord>,
}
