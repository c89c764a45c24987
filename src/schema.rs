use crate::aggregation::Dimension;
use crate::columns::AliasTable;
use crate::error::Result;
use crate::utils::{exceeds_thresholds, percent_variance};
use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// A raw cell as handed over by a file-reading collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Number(_) => false,
            Self::Text(s) => s.trim().is_empty(),
        }
    }

    /// Display form used for labels and dimension tags.
    pub fn as_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.trim().to_string(),
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    New,
    Investigating,
    Explained,
    Closed,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::New,
        Status::Investigating,
        Status::Explained,
        Status::Closed,
    ];

    /// Explained and closed variances no longer need attention.
    pub fn is_resolved(self) -> bool {
        matches!(self, Status::Explained | Status::Closed)
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::New => "New",
            Status::Investigating => "Investigating",
            Status::Explained => "Explained",
            Status::Closed => "Closed",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum RootCause {
    #[schemars(description = "Spend landed in a different period than planned")]
    Timing,
    #[schemars(description = "More or fewer units than planned")]
    Volume,
    #[schemars(description = "Unit price or rate differed from plan")]
    Price,
    #[schemars(description = "Non-recurring item")]
    OneTime,
    #[schemars(description = "Miscoding, accrual or reclass error")]
    AccountingError,
    Other,
}

impl RootCause {
    pub const ALL: [RootCause; 6] = [
        RootCause::Timing,
        RootCause::Volume,
        RootCause::Price,
        RootCause::OneTime,
        RootCause::AccountingError,
        RootCause::Other,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RootCause::Timing => "Timing",
            RootCause::Volume => "Volume",
            RootCause::Price => "Price",
            RootCause::OneTime => "One-time",
            RootCause::AccountingError => "Accounting error",
            RootCause::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Comment {
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// One budget-vs-actual line item.
///
/// `budget` and `actual` are fixed at creation and the variance fields are
/// always derived from them, so they are only reachable through accessors.
/// Workflow fields are plain data and may be edited at any time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(from = "RecordRepr")]
pub struct VarianceRecord {
    pub id: Uuid,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_center: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gl_account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    budget: f64,
    actual: f64,
    dollar_variance: f64,
    percent_variance: f64,
    is_significant: bool,
    pub is_starred: bool,
    pub status: Status,
    pub owner: String,
    pub root_cause: Option<RootCause>,
    pub due_date: Option<NaiveDate>,
    pub explanation: String,
    pub comments: Vec<Comment>,
}

#[derive(Deserialize, JsonSchema)]
struct RecordRepr {
    id: Uuid,
    category: String,
    #[serde(default)]
    cost_center: Option<String>,
    #[serde(default)]
    gl_account: Option<String>,
    #[serde(default)]
    period: Option<String>,
    budget: f64,
    actual: f64,
    #[serde(default)]
    is_significant: bool,
    #[serde(default)]
    is_starred: bool,
    #[serde(default)]
    status: Status,
    #[serde(default)]
    owner: String,
    #[serde(default)]
    root_cause: Option<RootCause>,
    #[serde(default)]
    due_date: Option<NaiveDate>,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    comments: Vec<Comment>,
}

impl From<RecordRepr> for VarianceRecord {
    fn from(r: RecordRepr) -> Self {
        let mut record = VarianceRecord::new(r.category, r.budget, r.actual);
        record.id = r.id;
        record.cost_center = r.cost_center;
        record.gl_account = r.gl_account;
        record.period = r.period;
        record.is_significant = r.is_significant;
        record.is_starred = r.is_starred;
        record.status = r.status;
        record.owner = r.owner;
        record.root_cause = r.root_cause;
        record.due_date = r.due_date;
        record.explanation = r.explanation;
        record.comments = r.comments;
        record
    }
}

impl VarianceRecord {
    /// A fresh, unclassified record with zero-state workflow fields.
    pub fn new(category: impl Into<String>, budget: f64, actual: f64) -> Self {
        let dollar_variance = actual - budget;
        Self {
            id: Uuid::new_v4(),
            category: category.into(),
            cost_center: None,
            gl_account: None,
            period: None,
            budget,
            actual,
            dollar_variance,
            percent_variance: percent_variance(budget, dollar_variance),
            is_significant: false,
            is_starred: false,
            status: Status::New,
            owner: String::new(),
            root_cause: None,
            due_date: None,
            explanation: String::new(),
            comments: Vec::new(),
        }
    }

    pub fn with_cost_center(mut self, cost_center: impl Into<String>) -> Self {
        self.cost_center = Some(cost_center.into());
        self
    }

    pub fn with_gl_account(mut self, gl_account: impl Into<String>) -> Self {
        self.gl_account = Some(gl_account.into());
        self
    }

    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }

    /// Replaces the actual amount and re-derives both variances. The
    /// significance flag is left for the caller to reclassify.
    pub fn with_actual(mut self, actual: f64) -> Self {
        self.actual = actual;
        self.dollar_variance = actual - self.budget;
        self.percent_variance = percent_variance(self.budget, self.dollar_variance);
        self
    }

    pub fn classified(mut self, thresholds: &Thresholds) -> Self {
        self.is_significant =
            exceeds_thresholds(self.dollar_variance, self.percent_variance, thresholds);
        self
    }

    /// Manual override of the significance flag. It holds until the next
    /// classification pass.
    pub(crate) fn set_significant(&mut self, is_significant: bool) {
        self.is_significant = is_significant;
    }

    /// Same record under a new identifier.
    pub fn rekeyed(mut self) -> Self {
        self.id = Uuid::new_v4();
        self
    }

    pub fn budget(&self) -> f64 {
        self.budget
    }

    pub fn actual(&self) -> f64 {
        self.actual
    }

    pub fn dollar_variance(&self) -> f64 {
        self.dollar_variance
    }

    pub fn percent_variance(&self) -> f64 {
        self.percent_variance
    }

    pub fn is_significant(&self) -> bool {
        self.is_significant
    }

    pub fn dimension(&self, dimension: Dimension) -> Option<&str> {
        match dimension {
            Dimension::CostCenter => self.cost_center.as_deref(),
            Dimension::GlAccount => self.gl_account.as_deref(),
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        match self.due_date {
            Some(due) => due < today && !self.status.is_resolved(),
            None => false,
        }
    }
}

/// An ordered set of records plus the metadata describing which optional
/// dimensions they carry. The metadata is always derived from the records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(from = "DatasetRepr")]
pub struct ParsedDataset {
    records: Vec<VarianceRecord>,
    columns: Vec<String>,
    has_cost_center: bool,
    has_gl_account: bool,
    has_period: bool,
    periods: Vec<String>,
}

#[derive(Deserialize, JsonSchema)]
struct DatasetRepr {
    records: Vec<VarianceRecord>,
    #[serde(default)]
    columns: Vec<String>,
}

impl From<DatasetRepr> for ParsedDataset {
    fn from(r: DatasetRepr) -> Self {
        ParsedDataset::new(r.records, r.columns)
    }
}

impl ParsedDataset {
    pub fn new(records: Vec<VarianceRecord>, columns: Vec<String>) -> Self {
        let has_cost_center = records.iter().any(|r| r.cost_center.is_some());
        let has_gl_account = records.iter().any(|r| r.gl_account.is_some());
        let has_period = records.iter().any(|r| r.period.is_some());
        let periods: BTreeSet<String> = records.iter().filter_map(|r| r.period.clone()).collect();

        Self {
            records,
            columns,
            has_cost_center,
            has_gl_account,
            has_period,
            periods: periods.into_iter().collect(),
        }
    }

    pub fn records(&self) -> &[VarianceRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<VarianceRecord> {
        self.records
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_cost_center(&self) -> bool {
        self.has_cost_center
    }

    pub fn has_gl_account(&self) -> bool {
        self.has_gl_account
    }

    pub fn has_period(&self) -> bool {
        self.has_period
    }

    pub fn periods(&self) -> &[String] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&VarianceRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Rebuilds the dataset from transformed records, keeping the columns.
    pub fn map_records<F>(self, f: F) -> Self
    where
        F: FnMut(VarianceRecord) -> VarianceRecord,
    {
        let records = self.records.into_iter().map(f).collect();
        Self::new(records, self.columns)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ParsedDataset)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Thresholds {
    #[schemars(description = "Absolute percent variance above which a line is significant")]
    pub variance_threshold_percent: f64,

    #[schemars(description = "Absolute dollar variance above which a line is significant")]
    pub variance_threshold_dollar: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            variance_threshold_percent: 10.0,
            variance_threshold_dollar: 50_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    None,
    CostCenter,
    GlAccount,
}

impl GroupBy {
    pub fn dimension(self) -> Option<Dimension> {
        match self {
            GroupBy::None => None,
            GroupBy::CostCenter => Some(Dimension::CostCenter),
            GroupBy::GlAccount => Some(Dimension::GlAccount),
        }
    }
}

fn default_extraction_error_prefix() -> String {
    "ERROR:".to_string()
}

/// Everything the pipeline reads from its host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct VarianceConfig {
    pub thresholds: Thresholds,

    #[schemars(description = "Dimension used to roll records up; 'none' disables grouping")]
    pub group_by: GroupBy,

    #[schemars(description = "Case-insensitive header substrings per column role")]
    pub aliases: AliasTable,

    #[schemars(
        description = "Prefix an AI extraction service uses to signal failure instead of returning CSV"
    )]
    pub extraction_error_prefix: String,
}

impl Default for VarianceConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            group_by: GroupBy::default(),
            aliases: AliasTable::default(),
            extraction_error_prefix: default_extraction_error_prefix(),
        }
    }
}

impl VarianceConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(VarianceConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}
