use crate::columns::ValidatedMapping;
use crate::ingestion::{RawRow, RawTable};
use crate::schema::{CellValue, ParsedDataset, Thresholds, VarianceRecord};
use crate::utils::normalize_cell;
use log::{debug, info};

/// Turns raw rows into classified variance records under one mapping.
pub struct RecordBuilder<'a> {
    mapping: &'a ValidatedMapping,
    thresholds: &'a Thresholds,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(mapping: &'a ValidatedMapping, thresholds: &'a Thresholds) -> Self {
        Self {
            mapping,
            thresholds,
        }
    }

    /// `index` is the zero-based position of the row; it names rows that
    /// have no category.
    pub fn build(&self, index: usize, row: &RawRow) -> VarianceRecord {
        let category = row
            .get(&self.mapping.category)
            .map(CellValue::as_text)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("Row {}", index + 1));

        let budget = row.get(&self.mapping.budget).map(normalize_cell).unwrap_or(0.0);
        let actual = row.get(&self.mapping.actual).map(normalize_cell).unwrap_or(0.0);

        let mut record = VarianceRecord::new(category, budget, actual);
        record.cost_center = dimension_value(row, self.mapping.cost_center.as_deref());
        record.gl_account = dimension_value(row, self.mapping.gl_account.as_deref());
        record.period = dimension_value(row, self.mapping.period.as_deref());

        record.classified(self.thresholds)
    }

    pub fn build_dataset(&self, table: &RawTable) -> ParsedDataset {
        let records: Vec<VarianceRecord> = table
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| self.build(i, row))
            .collect();

        let significant = records.iter().filter(|r| r.is_significant()).count();
        debug!(
            "Built {} record(s), {} significant",
            records.len(),
            significant
        );

        ParsedDataset::new(records, table.headers.clone())
    }
}

/// A mapped but blank cell counts as absent.
fn dimension_value(row: &RawRow, header: Option<&str>) -> Option<String> {
    let cell = row.get(header?)?;
    Some(cell.as_text()).filter(|s| !s.is_empty())
}

/// Recomputes every significance flag under `thresholds`. Nothing else
/// changes, so running it twice with the same thresholds is a no-op.
pub fn classify(dataset: &ParsedDataset, thresholds: &Thresholds) -> ParsedDataset {
    info!(
        "Reclassifying {} record(s) at {}% / ${}",
        dataset.len(),
        thresholds.variance_threshold_percent,
        thresholds.variance_threshold_dollar
    );
    dataset
        .clone()
        .map_records(|record| record.classified(thresholds))
}
