use crate::aggregation::GroupedRollup;
use crate::error::{Result, VarianceError};
use crate::schema::{ParsedDataset, VarianceRecord};

const RECORD_HEADERS: [&str; 14] = [
    "Category",
    "Cost Center",
    "GL Account",
    "Period",
    "Budget",
    "Actual",
    "Variance $",
    "Variance %",
    "Significant",
    "Status",
    "Owner",
    "Root Cause",
    "Due Date",
    "Explanation",
];

/// Flat CSV of the given records, one line per record.
pub fn records_to_csv<'a, I>(records: I) -> Result<String>
where
    I: IntoIterator<Item = &'a VarianceRecord>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(RECORD_HEADERS)?;

    for r in records {
        writer.write_record([
            r.category.clone(),
            r.cost_center.clone().unwrap_or_default(),
            r.gl_account.clone().unwrap_or_default(),
            r.period.clone().unwrap_or_default(),
            format!("{:.2}", r.budget()),
            format!("{:.2}", r.actual()),
            format!("{:.2}", r.dollar_variance()),
            format!("{:.1}", r.percent_variance()),
            if r.is_significant() { "Yes" } else { "No" }.to_string(),
            r.status.label().to_string(),
            r.owner.clone(),
            r.root_cause.map(|c| c.label().to_string()).unwrap_or_default(),
            r.due_date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default(),
            r.explanation.clone(),
        ])?;
    }

    finish(writer)
}

pub fn dataset_to_csv(dataset: &ParsedDataset) -> Result<String> {
    records_to_csv(dataset.records())
}

pub fn rollups_to_csv(rollups: &[GroupedRollup]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "Group",
        "Records",
        "Budget",
        "Actual",
        "Variance $",
        "Variance %",
        "Significant",
    ])?;

    for g in rollups {
        writer.write_record([
            g.key.clone(),
            g.records.len().to_string(),
            format!("{:.2}", g.total_budget),
            format!("{:.2}", g.total_actual),
            format!("{:.2}", g.total_dollar_variance),
            format!("{:.1}", g.total_percent_variance),
            g.significant_count.to_string(),
        ])?;
    }

    finish(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| VarianceError::Export(format!("Failed to flush CSV output: {}", e)))?;
    utf8_output(bytes)
}

fn utf8_output(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes)
        .map_err(|e| VarianceError::Export(format!("CSV output was not UTF-8: {}", e)))
}
