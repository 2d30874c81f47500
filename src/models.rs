use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKind {
    Stargazers,
    Views,
    Clones,
    Referrers,
}

impl MetricKind {
    /// Fixed sync order for one invocation.
    pub const ALL: [MetricKind; 4] = [Self::Stargazers, Self::Views, Self::Clones, Self::Referrers];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stargazers => "stargazers",
            Self::Views => "views",
            Self::Clones => "clones",
            Self::Referrers => "referrers",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One daily reading of views or clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub date: NaiveDate,
    pub count: u64,
    pub uniques: u64,
}

impl MetricRecord {
    pub fn new(date: NaiveDate, count: u64, uniques: u64) -> Self {
        Self { date, count, uniques }
    }

    /// Zero-valued record standing in for a day the upstream did not report.
    pub fn placeholder(date: NaiveDate) -> Self {
        Self::new(date, 0, 0)
    }

    pub fn to_row(&self) -> Vec<CellValue> {
        vec![
            CellValue::Date(self.date),
            CellValue::count(self.count),
            CellValue::count(self.uniques),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferrerRecord {
    pub date: NaiveDate,
    pub referrer: String,
    pub count: u64,
    pub uniques: u64,
}

impl ReferrerRecord {
    pub fn to_row(&self) -> Vec<CellValue> {
        vec![
            CellValue::Date(self.date),
            CellValue::Text(self.referrer.clone()),
            CellValue::count(self.count),
            CellValue::count(self.uniques),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarEvent {
    pub starred_on: NaiveDate,
    pub user: String,
}

impl StarEvent {
    pub fn to_row(&self) -> Vec<CellValue> {
        vec![CellValue::Date(self.starred_on), CellValue::Text(self.user.clone())]
    }
}

/// Value of a single store cell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Date(NaiveDate),
    Number(i64),
    Text(String),
}

impl CellValue {
    pub fn count(value: u64) -> Self {
        Self::Number(i64::try_from(value).unwrap_or(i64::MAX))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Empty cells and whitespace-only text are structurally blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(date) => Some(*date),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            Self::Number(number) => write!(f, "{}", number),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// One-based cell coordinate (`A1` is column 1, row 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    pub column: u32,
    pub row: u32,
}

impl CellRef {
    pub fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    pub fn offset_rows(self, rows: u32) -> Self {
        Self::new(self.column, self.row + rows)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    Written { sheet: String, anchor: String, rows: usize },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub metric: MetricKind,
    #[serde(flatten)]
    pub status: SyncStatus,
}

// GitHub REST payloads.

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StargazerEntry {
    pub starred_at: DateTime<Utc>,
    pub user: GitHubUser,
}

impl From<StargazerEntry> for StarEvent {
    fn from(entry: StargazerEntry) -> Self {
        Self {
            starred_on: entry.starred_at.date_naive(),
            user: entry.user.login,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrafficEntry {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
    pub uniques: u64,
}

impl From<TrafficEntry> for MetricRecord {
    fn from(entry: TrafficEntry) -> Self {
        Self::new(entry.timestamp.date_naive(), entry.count, entry.uniques)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrafficViews {
    #[serde(default)]
    pub views: Vec<TrafficEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrafficClones {
    #[serde(default)]
    pub clones: Vec<TrafficEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferrerEntry {
    pub referrer: String,
    pub count: u64,
    pub uniques: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationResponse {
    pub id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}
