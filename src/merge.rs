use crate::error::{Result, VarianceError};
use crate::schema::{ParsedDataset, Thresholds, VarianceRecord};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Concatenate every source's records.
    #[schemars(description = "Concatenate all records from every source")]
    Stack,
    /// First source supplies budgets, second supplies actuals, joined by key.
    #[schemars(
        description = "Join a budget source and an actual source on category, cost center, GL account and period"
    )]
    BudgetActualPairing,
}

/// Combines parsed datasets into one.
///
/// A single source comes back unchanged whatever the strategy. Pairing needs
/// exactly two sources and uses `thresholds` to reclassify the joined rows.
pub fn merge_datasets(
    mut datasets: Vec<ParsedDataset>,
    strategy: MergeStrategy,
    thresholds: &Thresholds,
) -> Result<ParsedDataset> {
    match datasets.len() {
        0 => Err(VarianceError::Merge("No datasets to merge".to_string())),
        1 => Ok(datasets.remove(0)),
        n => {
            info!("Merging {} datasets with {:?}", n, strategy);
            match strategy {
                MergeStrategy::Stack => Ok(stack(datasets)),
                MergeStrategy::BudgetActualPairing => {
                    let mut iter = datasets.into_iter();
                    match (iter.next(), iter.next(), iter.next()) {
                        (Some(budget), Some(actual), None) => {
                            Ok(pair(budget, &actual, thresholds))
                        }
                        _ => Err(VarianceError::Merge(format!(
                            "Budget/actual pairing needs exactly 2 datasets, got {}",
                            n
                        ))),
                    }
                }
            }
        }
    }
}

fn stack(datasets: Vec<ParsedDataset>) -> ParsedDataset {
    let mut columns: Vec<String> = Vec::new();
    let mut records: Vec<VarianceRecord> = Vec::new();

    for dataset in datasets {
        for column in dataset.columns() {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
        records.extend(dataset.into_records().into_iter().map(VarianceRecord::rekeyed));
    }

    ParsedDataset::new(records, columns)
}

/// Composite join key. Absent dimensions are left out; present ones are
/// tagged so a cost center never collides with a GL account of the same
/// text.
pub fn join_key(record: &VarianceRecord) -> String {
    let mut parts = vec![format!("category={}", record.category.trim())];
    if let Some(cc) = &record.cost_center {
        parts.push(format!("cost_center={}", cc.trim()));
    }
    if let Some(gl) = &record.gl_account {
        parts.push(format!("gl_account={}", gl.trim()));
    }
    if let Some(period) = &record.period {
        parts.push(format!("period={}", period.trim()));
    }
    parts.join("|")
}

fn pair(budget: ParsedDataset, actual: &ParsedDataset, thresholds: &Thresholds) -> ParsedDataset {
    let mut actuals: HashMap<String, f64> = HashMap::new();
    for record in actual.records() {
        // First occurrence of a key wins.
        actuals.entry(join_key(record)).or_insert(record.actual());
    }

    let mut unmatched = 0usize;
    let merged = budget.map_records(|record| {
        let value = match actuals.get(&join_key(&record)) {
            Some(value) => *value,
            None => {
                unmatched += 1;
                record.budget()
            }
        };
        record.with_actual(value).classified(thresholds)
    });

    if unmatched > 0 {
        debug!(
            "{} budget record(s) had no matching actual; variance set to zero",
            unmatched
        );
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn dataset(records: Vec<VarianceRecord>, columns: &[&str]) -> ParsedDataset {
        ParsedDataset::new(records, columns.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn test_no_datasets_is_merge_error() {
        let err = merge_datasets(vec![], MergeStrategy::Stack, &Thresholds::default()).unwrap_err();
        assert!(matches!(err, VarianceError::Merge(_)));
    }

    #[test]
    fn test_single_dataset_is_unchanged() {
        let only = dataset(vec![VarianceRecord::new("Rent", 1.0, 2.0)], &["Category"]);
        let merged = merge_datasets(
            vec![only.clone()],
            MergeStrategy::BudgetActualPairing,
            &Thresholds::default(),
        )
        .unwrap();
        assert_eq!(merged, only);
    }

    #[test]
    fn test_stack_concatenates_and_rekeys() {
        let first = dataset(
            vec![
                VarianceRecord::new("Rent", 1.0, 2.0).with_period("2024-02"),
                VarianceRecord::new("Fuel", 1.0, 2.0),
            ],
            &["Category", "Budget", "Actual", "Period"],
        );
        let second = dataset(
            vec![VarianceRecord::new("Food", 1.0, 2.0)
                .with_cost_center("Ops")
                .with_period("2024-01")],
            &["Category", "Dept", "Budget", "Actual"],
        );
        let original_ids: HashSet<_> = first
            .records()
            .iter()
            .chain(second.records())
            .map(|r| r.id)
            .collect();

        let merged = merge_datasets(
            vec![first, second],
            MergeStrategy::Stack,
            &Thresholds::default(),
        )
        .unwrap();

        assert_eq!(merged.len(), 3);
        assert!(merged.has_cost_center());
        assert!(merged.has_period());
        assert_eq!(merged.periods(), &["2024-01", "2024-02"]);
        assert_eq!(
            merged.columns(),
            &["Category", "Budget", "Actual", "Period", "Dept"]
        );
        assert!(merged.records().iter().all(|r| !original_ids.contains(&r.id)));
    }

    #[test]
    fn test_pairing_substitutes_matching_actuals() {
        let budget = dataset(
            vec![
                VarianceRecord::new("Rent", 1000.0, 0.0).with_cost_center("Ops"),
                VarianceRecord::new("Fuel", 200.0, 0.0).with_cost_center("Ops"),
                VarianceRecord::new("Rent", 500.0, 0.0).with_cost_center("Sales"),
            ],
            &["Category", "Cost Center", "Budget"],
        );
        let actual = dataset(
            vec![
                VarianceRecord::new("Rent", 0.0, 1300.0).with_cost_center("Ops"),
                VarianceRecord::new("Rent", 0.0, 450.0).with_cost_center("Sales"),
                VarianceRecord::new("Rent", 0.0, 9999.0).with_cost_center("Ops"),
            ],
            &["Category", "Cost Center", "Actual"],
        );
        let budget_ids: Vec<_> = budget.records().iter().map(|r| r.id).collect();

        let merged = merge_datasets(
            vec![budget, actual],
            MergeStrategy::BudgetActualPairing,
            &Thresholds::default(),
        )
        .unwrap();

        let rent_ops = &merged.records()[0];
        assert_eq!(rent_ops.actual(), 1300.0);
        assert_eq!(rent_ops.dollar_variance(), 300.0);
        assert_eq!(rent_ops.percent_variance(), 30.0);
        assert!(rent_ops.is_significant());

        let fuel = &merged.records()[1];
        assert_eq!(fuel.actual(), 200.0);
        assert_eq!(fuel.dollar_variance(), 0.0);
        assert!(!fuel.is_significant());

        assert_eq!(merged.records()[2].actual(), 450.0);
        assert_eq!(merged.columns(), &["Category", "Cost Center", "Budget"]);
        let merged_ids: Vec<_> = merged.records().iter().map(|r| r.id).collect();
        assert_eq!(merged_ids, budget_ids);
    }

    #[test]
    fn test_pairing_requires_two_sources() {
        let make = || dataset(vec![VarianceRecord::new("a", 1.0, 1.0)], &[]);
        let err = merge_datasets(
            vec![make(), make(), make()],
            MergeStrategy::BudgetActualPairing,
            &Thresholds::default(),
        )
        .unwrap_err();
        assert!(matches!(err, VarianceError::Merge(_)));
    }

    #[test]
    fn test_join_key_omits_absent_fields() {
        let plain = VarianceRecord::new("Rent", 0.0, 0.0);
        assert_eq!(join_key(&plain), "category=Rent");

        let cc = VarianceRecord::new("Rent", 0.0, 0.0).with_cost_center("100");
        let gl = VarianceRecord::new("Rent", 0.0, 0.0).with_gl_account("100");
        assert_ne!(join_key(&cc), join_key(&gl));
    }
}
